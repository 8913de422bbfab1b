//! Vault conversion orchestration for vaultdown.
//!
//! This crate ties the link index and the markdown body pipeline together
//! into document conversion ([`convert_document`], [`MarkdownProcessor`]) and
//! whole-tree conversion ([`convert_tree`]).

pub mod document;
pub mod engine;
pub mod frontmatter;

pub use document::{ConvertedDocument, MarkdownProcessor, convert_document};
pub use engine::{
    ConversionJob, DocumentProcessor, Processed, ProgressReporter, SilentProgress, SkipPredicate,
    TreeOptions, TreeSummary, convert_tree, is_document,
};
pub use frontmatter::{FrontMatterError, FrontMatterRewriter, YamlFrontMatter, split_front_matter};
