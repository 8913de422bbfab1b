//! Wiki markdown body conversion.
//!
//! Scans a document body as a rune sequence and rewrites the dialect
//! constructs (tags, comments, wiki links, embeds, level-1 headers) into plain
//! markdown. [`scan`] holds the construct probes; each stage module builds one
//! rewrite pass on them; [`Pipeline`] chains the passes a [`ConvertConfig`]
//! turns on.
//!
//! [`ConvertConfig`]: vaultdown_shared::ConvertConfig

mod body;
mod comments;
mod headers;
mod links;
pub mod scan;
mod stage;
mod tags;

pub use body::{BodyConverter, Pipeline};
pub use comments::erase_comments;
pub use headers::{find_title, remove_h1};
pub use links::{LinkOptions, WikiLink, convert_links, format_anchor, links_to_plain_text};
pub use tags::{find_tags, remove_tags};
