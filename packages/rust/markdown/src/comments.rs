//! `%%...%%` and `<!--...-->` comment erasure.

use vaultdown_shared::{StageError, TransformError};

use crate::scan::{scan_comment, scan_html_comment, scan_verbatim};
use crate::stage::{self, Edit, Stage};

struct CommentEraser;

impl Stage for CommentEraser {
    const NAME: &'static str = "comment eraser";

    fn probe(&mut self, raw: &[char], ptr: usize) -> Result<Option<Edit>, TransformError> {
        if let Some(edit) = Edit::keep(scan_verbatim(raw, ptr)) {
            return Ok(Some(edit));
        }
        let advance = match scan_comment(raw, ptr) {
            0 => scan_html_comment(raw, ptr),
            n => n,
        };
        Ok(Edit::replace(advance, ""))
    }
}

/// Delete every comment of `raw`. Comments inside code and math survive.
pub fn erase_comments(raw: &[char]) -> Result<Vec<char>, StageError> {
    stage::run(&mut CommentEraser, raw)
}
