//! The shared rewrite loop every transform stage runs on.
//!
//! A stage walks the body left to right. At each position it may claim a
//! construct and either copy it through or replace it; unclaimed runes are
//! copied one at a time.

use vaultdown_shared::{StageError, TransformError};

use crate::scan::line_at;

/// What a stage does with the runes it claimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Output {
    /// Copy the claimed runes unchanged.
    Keep,
    /// Emit this text instead. Empty deletes the construct.
    Replace(String),
}

/// A claimed construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Edit {
    pub advance: usize,
    pub output: Output,
}

impl Edit {
    /// Copy `advance` runes through. `None` when nothing was claimed.
    pub fn keep(advance: usize) -> Option<Self> {
        (advance > 0).then_some(Self {
            advance,
            output: Output::Keep,
        })
    }

    /// Replace `advance` runes with `text`. `None` when nothing was claimed.
    pub fn replace(advance: usize, text: impl Into<String>) -> Option<Self> {
        (advance > 0).then(|| Self {
            advance,
            output: Output::Replace(text.into()),
        })
    }
}

/// One rewrite pass over a document body.
pub(crate) trait Stage {
    /// Name used in error reports.
    const NAME: &'static str;

    /// Claim the construct starting at `ptr`, if any.
    fn probe(&mut self, raw: &[char], ptr: usize) -> Result<Option<Edit>, TransformError>;
}

/// Drive `stage` over `raw` and collect the rewritten body.
pub(crate) fn run<S: Stage>(stage: &mut S, raw: &[char]) -> Result<Vec<char>, StageError> {
    let mut out = Vec::with_capacity(raw.len());
    let mut ptr = 0;
    while ptr < raw.len() {
        let edit = stage.probe(raw, ptr).map_err(|source| StageError {
            stage: S::NAME,
            line: line_at(raw, ptr),
            source,
        })?;
        match edit {
            Some(Edit { advance, output }) => {
                let end = (ptr + advance).min(raw.len());
                match output {
                    Output::Keep => out.extend_from_slice(&raw[ptr..end]),
                    Output::Replace(text) => out.extend(text.chars()),
                }
                ptr = end;
            }
            None => {
                out.push(raw[ptr]);
                ptr += 1;
            }
        }
    }
    Ok(out)
}
