//! Core domain types shared by the conversion crates.

use std::collections::BTreeSet;

/// What the body pipeline learns about a document besides its rewritten text.
///
/// Depends only on the document's own content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMeta {
    /// Text of the first level-1 header, when there is one and it is not blank.
    pub title: Option<String>,
    /// Inline tags without the leading `#`.
    pub tags: BTreeSet<String>,
}
