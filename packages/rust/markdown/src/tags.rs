//! Inline `#tag` extraction and removal.

use std::collections::BTreeSet;

use vaultdown_shared::{StageError, TransformError};

use crate::scan::{
    scan_embed, scan_external_link, scan_internal_link, scan_repeat, scan_tag, scan_verbatim,
};
use crate::stage::{self, Edit, Stage};

/// Regions in which `#` never starts a tag.
fn shielded(raw: &[char], ptr: usize) -> usize {
    let advance = scan_verbatim(raw, ptr);
    if advance > 0 {
        return advance;
    }
    if let Some(link) = scan_embed(raw, ptr).or_else(|| scan_internal_link(raw, ptr)) {
        return link.advance;
    }
    if let Some(link) = scan_external_link(raw, ptr) {
        return link.advance;
    }
    // `##`, `###`, ...: header markers, never a tag.
    match scan_repeat(raw, ptr, '#') {
        run if run > 1 => run,
        _ => 0,
    }
}

struct TagFinder {
    tags: BTreeSet<String>,
}

impl Stage for TagFinder {
    const NAME: &'static str = "tag finder";

    fn probe(&mut self, raw: &[char], ptr: usize) -> Result<Option<Edit>, TransformError> {
        if let Some(edit) = Edit::keep(shielded(raw, ptr)) {
            return Ok(Some(edit));
        }
        Ok(scan_tag(raw, ptr).and_then(|tag| {
            self.tags.insert(tag.name);
            Edit::keep(tag.advance)
        }))
    }
}

struct TagRemover;

impl Stage for TagRemover {
    const NAME: &'static str = "tag remover";

    fn probe(&mut self, raw: &[char], ptr: usize) -> Result<Option<Edit>, TransformError> {
        if let Some(edit) = Edit::keep(shielded(raw, ptr)) {
            return Ok(Some(edit));
        }
        Ok(scan_tag(raw, ptr).and_then(|tag| Edit::replace(tag.advance, "")))
    }
}

/// Collect every inline tag of `raw`.
pub fn find_tags(raw: &[char]) -> Result<BTreeSet<String>, StageError> {
    let mut finder = TagFinder {
        tags: BTreeSet::new(),
    };
    stage::run(&mut finder, raw)?;
    Ok(finder.tags)
}

/// Delete every inline tag of `raw`, `#` included.
pub fn remove_tags(raw: &[char]) -> Result<Vec<char>, StageError> {
    stage::run(&mut TagRemover, raw)
}
