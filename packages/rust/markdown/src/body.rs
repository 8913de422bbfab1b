//! Ordered application of the body stages to one document.

use tracing::{instrument, trace};
use vaultdown_index::PathLookup;
use vaultdown_shared::{ConvertConfig, DocumentMeta, StageError};

use crate::comments::erase_comments;
use crate::headers::{find_title, remove_h1};
use crate::links::{LinkOptions, convert_links, links_to_plain_text};
use crate::tags::{find_tags, remove_tags};

/// Rewrites a document body and reports what it extracted.
pub trait BodyConverter: Send + Sync {
    fn convert_body(&self, raw: &[char]) -> Result<(Vec<char>, DocumentMeta), StageError>;
}

/// The production body converter.
///
/// Stages run in a fixed order: tag extraction, tag removal, comment removal,
/// title extraction, H1 removal, link conversion. Title extraction reads a
/// copy of the body with tags stripped and links flattened; the body itself
/// keeps them.
pub struct Pipeline<'a> {
    config: &'a ConvertConfig,
    lookup: &'a dyn PathLookup,
    links: LinkOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a ConvertConfig, lookup: &'a dyn PathLookup) -> Self {
        Self {
            config,
            lookup,
            links: LinkOptions {
                format_link: config.format_link,
                anchor_style: config.anchor_style,
                self_path: None,
            },
        }
    }

    /// Vault-relative path of the document, used to complete `[[#heading]]`.
    pub fn with_self_path(mut self, path: impl Into<String>) -> Self {
        self.links.self_path = Some(path.into());
        self
    }
}

impl BodyConverter for Pipeline<'_> {
    #[instrument(level = "trace", skip_all, fields(doc = self.links.self_path.as_deref(), runes = raw.len()))]
    fn convert_body(&self, raw: &[char]) -> Result<(Vec<char>, DocumentMeta), StageError> {
        let config = self.config;
        let mut meta = DocumentMeta::default();
        let mut body = raw.to_vec();

        if config.copy_tags {
            meta.tags = find_tags(&body)?;
        }
        if config.remove_tags {
            body = remove_tags(&body)?;
        }
        if config.remove_comments {
            body = erase_comments(&body)?;
        }
        if config.copy_title || config.copy_alias {
            let plain = links_to_plain_text(&remove_tags(&body)?)?;
            meta.title = find_title(&plain)?;
        }
        if config.remove_h1 {
            body = remove_h1(&body)?;
        }
        if config.convert_links {
            body = convert_links(&body, self.lookup, &self.links)?;
        }

        trace!(title = ?meta.title, tags = meta.tags.len(), "body converted");
        Ok((body, meta))
    }
}
