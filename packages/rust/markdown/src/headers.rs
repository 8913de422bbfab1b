//! Level-1 header handling: title extraction and removal.

use vaultdown_shared::{StageError, TransformError};

use crate::scan::{scan_header, scan_verbatim};
use crate::stage::{self, Edit, Stage};

#[derive(Default)]
struct TitleFinder {
    title: Option<String>,
    done: bool,
}

impl Stage for TitleFinder {
    const NAME: &'static str = "title finder";

    fn probe(&mut self, raw: &[char], ptr: usize) -> Result<Option<Edit>, TransformError> {
        if self.done {
            return Ok(Edit::keep(raw.len() - ptr));
        }
        if let Some(edit) = Edit::keep(scan_verbatim(raw, ptr)) {
            return Ok(Some(edit));
        }
        let Some(header) = scan_header(raw, ptr) else {
            return Ok(None);
        };
        if header.level == 1 {
            // The first H1 decides, even when it is blank.
            self.done = true;
            self.title = Some(header.text).filter(|text| !text.is_empty());
        }
        Ok(Edit::keep(header.advance))
    }
}

struct H1Remover;

impl Stage for H1Remover {
    const NAME: &'static str = "h1 remover";

    fn probe(&mut self, raw: &[char], ptr: usize) -> Result<Option<Edit>, TransformError> {
        if let Some(edit) = Edit::keep(scan_verbatim(raw, ptr)) {
            return Ok(Some(edit));
        }
        Ok(scan_header(raw, ptr).and_then(|header| match header.level {
            1 => Edit::replace(header.advance, ""),
            _ => Edit::keep(header.advance),
        }))
    }
}

/// Text of the first level-1 header outside code and math, if it has any.
pub fn find_title(raw: &[char]) -> Result<Option<String>, StageError> {
    let mut finder = TitleFinder::default();
    stage::run(&mut finder, raw)?;
    Ok(finder.title)
}

/// Delete every level-1 header line, newline included.
pub fn remove_h1(raw: &[char]) -> Result<Vec<char>, StageError> {
    stage::run(&mut H1Remover, raw)
}
