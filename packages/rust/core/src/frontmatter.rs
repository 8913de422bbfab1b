//! YAML front matter: splitting it off the body and folding extracted
//! metadata back into it.

use serde_yaml::{Mapping, Value};

use vaultdown_shared::{ConvertConfig, DocumentMeta};

const FENCE: &str = "---";

/// Split `text` into its front matter block (without fences) and body.
///
/// Leading blank lines are skipped. Without an opening or closing fence the
/// front matter is empty and the whole text is the body.
pub fn split_front_matter(text: &str) -> (&str, &str) {
    let mut cursor = 0;
    let mut opened_at = None;
    for line in text.split_inclusive('\n') {
        let start = cursor;
        cursor += line.len();
        let content = line.trim_end();
        match opened_at {
            None if content.is_empty() => {}
            None if content == FENCE => opened_at = Some(cursor),
            None => break,
            Some(block) if content == FENCE => return (&text[block..start], &text[cursor..]),
            Some(_) => {}
        }
    }
    ("", text)
}

#[derive(Debug, thiserror::Error)]
pub enum FrontMatterError {
    #[error("{0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("front matter is not a YAML mapping")]
    NotAMapping,

    #[error("field {field:?} must be a string or a list")]
    FieldType { field: &'static str },
}

/// Folds a document's extracted metadata into its front matter.
pub trait FrontMatterRewriter: Send + Sync {
    /// The new front matter block, or `None` when the document must not be
    /// written at all.
    fn rewrite(
        &self,
        front_matter: &str,
        meta: &DocumentMeta,
        config: &ConvertConfig,
    ) -> Result<Option<String>, FrontMatterError>;
}

/// [`FrontMatterRewriter`] backed by `serde_yaml`.
///
/// An untouched block is returned verbatim; a touched one is re-serialized.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlFrontMatter;

impl FrontMatterRewriter for YamlFrontMatter {
    fn rewrite(
        &self,
        front_matter: &str,
        meta: &DocumentMeta,
        config: &ConvertConfig,
    ) -> Result<Option<String>, FrontMatterError> {
        let mut map = parse_mapping(front_matter)?;
        let mut changed = false;

        if config.publishable {
            match publish_state(&map) {
                Publish::Yes => {
                    map.insert("draft".into(), false.into());
                    changed = true;
                }
                Publish::NotDraft => {}
                Publish::No => return Ok(None),
            }
        }

        if let Some(title) = meta.title.as_deref() {
            if config.copy_alias {
                let mut aliases = string_list(&map, "aliases")?;
                let previous = map
                    .get("title")
                    .and_then(Value::as_str)
                    .filter(|_| config.sync_title_alias);
                if let Some(previous) = previous {
                    aliases.retain(|alias| alias.as_str() != Some(previous));
                }
                if !aliases.iter().any(|alias| alias.as_str() == Some(title)) {
                    aliases.push(title.into());
                }
                map.insert("aliases".into(), Value::Sequence(aliases));
                changed = true;
            }
            if config.copy_title {
                map.insert("title".into(), title.into());
                changed = true;
            }
        }

        if config.copy_tags && (config.sync_tags || !meta.tags.is_empty()) {
            let mut tags = if config.sync_tags {
                Vec::new()
            } else {
                string_list(&map, "tags")?
            };
            for tag in &meta.tags {
                if !tags.iter().any(|t| t.as_str() == Some(tag.as_str())) {
                    tags.push(tag.as_str().into());
                }
            }
            map.insert("tags".into(), Value::Sequence(tags));
            changed = true;
        }

        if !changed {
            return Ok(Some(front_matter.to_string()));
        }
        Ok(Some(serde_yaml::to_string(&map)?))
    }
}

enum Publish {
    /// `publish: true`
    Yes,
    /// `draft: false`
    NotDraft,
    No,
}

fn publish_state(map: &Mapping) -> Publish {
    if map.get("publish").and_then(Value::as_bool) == Some(true) {
        Publish::Yes
    } else if map.get("draft").and_then(Value::as_bool) == Some(false) {
        Publish::NotDraft
    } else {
        Publish::No
    }
}

fn parse_mapping(front_matter: &str) -> Result<Mapping, FrontMatterError> {
    if front_matter.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str::<Value>(front_matter)? {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(map) => Ok(map),
        _ => Err(FrontMatterError::NotAMapping),
    }
}

/// A field that may hold a single string or a list of them.
fn string_list(map: &Mapping, field: &'static str) -> Result<Vec<Value>, FrontMatterError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Sequence(items)) => Ok(items.clone()),
        Some(Value::String(single)) => Ok(vec![single.as_str().into()]),
        Some(_) => Err(FrontMatterError::FieldType { field }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn meta(title: Option<&str>, tags: &[&str]) -> DocumentMeta {
        DocumentMeta {
            title: title.map(String::from),
            tags: tags.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>(),
        }
    }

    fn list(map: &Mapping, field: &str) -> Vec<String> {
        map.get(field)
            .and_then(Value::as_sequence)
            .map(|items| items.iter().filter_map(Value::as_str).map(String::from).collect())
            .unwrap_or_default()
    }

    fn rewrite(front_matter: &str, meta: &DocumentMeta, config: &ConvertConfig) -> Option<Mapping> {
        YamlFrontMatter
            .rewrite(front_matter, meta, config)
            .unwrap()
            .map(|block| serde_yaml::from_str(&block).unwrap())
    }

    #[test]
    fn split_with_and_without_leading_blank_lines() {
        let (fm, body) = split_front_matter("---\ntitle: \"This is a test\"\n---\n# This is a test\n");
        assert_eq!(fm, "title: \"This is a test\"\n");
        assert_eq!(body, "# This is a test\n");

        let (fm, body) =
            split_front_matter("\n\n---\ntitle: \"This is a test\"\n---\n# This is a test\n");
        assert_eq!(fm, "title: \"This is a test\"\n");
        assert_eq!(body, "# This is a test\n");
    }

    #[test]
    fn split_without_fences_keeps_everything_in_body() {
        assert_eq!(split_front_matter("# Title\n---\n"), ("", "# Title\n---\n"));
        assert_eq!(split_front_matter("---\nopen: true\n"), ("", "---\nopen: true\n"));
        assert_eq!(split_front_matter(""), ("", ""));
    }

    #[test]
    fn untouched_block_is_verbatim() {
        let block = "title:   spaced\n# comment\n";
        let out = YamlFrontMatter
            .rewrite(block, &meta(None, &[]), &ConvertConfig::default())
            .unwrap();
        assert_eq!(out.as_deref(), Some(block));
    }

    #[test]
    fn copies_title_and_alias() {
        let config = ConvertConfig {
            copy_title: true,
            copy_alias: true,
            ..Default::default()
        };
        let map = rewrite("aliases: old\n", &meta(Some("New"), &[]), &config).unwrap();
        assert_eq!(map.get("title").and_then(Value::as_str), Some("New"));
        let aliases = list(&map, "aliases");
        assert_eq!(aliases, vec!["old", "New"]);
    }

    #[test]
    fn sync_title_alias_drops_previous_title() {
        let config = ConvertConfig {
            copy_title: true,
            copy_alias: true,
            sync_title_alias: true,
            ..Default::default()
        };
        let block = "title: Old\naliases: [Old, Other]\n";
        let map = rewrite(block, &meta(Some("New"), &[]), &config).unwrap();
        let aliases = list(&map, "aliases");
        assert_eq!(aliases, vec!["Other", "New"]);
    }

    #[test]
    fn tags_merge_or_sync() {
        let found = meta(None, &["b", "a"]);
        let merge = ConvertConfig {
            copy_tags: true,
            ..Default::default()
        };
        let map = rewrite("tags: [z, a]\n", &found, &merge).unwrap();
        let tags = list(&map, "tags");
        assert_eq!(tags, vec!["z", "a", "b"]);

        let sync = ConvertConfig {
            sync_tags: true,
            ..merge
        };
        let map = rewrite("tags: [z, a]\n", &found, &sync).unwrap();
        let tags = list(&map, "tags");
        assert_eq!(tags, vec!["a", "b"]);
    }

    #[test]
    fn publishable_gating() {
        let config = ConvertConfig {
            publishable: true,
            ..Default::default()
        };
        let none = meta(None, &[]);
        assert!(rewrite("title: x\n", &none, &config).is_none());
        assert!(rewrite("draft: true\n", &none, &config).is_none());
        assert!(rewrite("draft: false\n", &none, &config).is_some());

        let map = rewrite("publish: true\n", &none, &config).unwrap();
        assert_eq!(map.get("draft").and_then(Value::as_bool), Some(false));
    }

    #[test]
    fn non_mapping_is_rejected() {
        let err = YamlFrontMatter
            .rewrite("- a\n- b\n", &meta(None, &[]), &ConvertConfig::default())
            .unwrap_err();
        assert!(matches!(err, FrontMatterError::NotAMapping));

        let config = ConvertConfig {
            copy_tags: true,
            ..Default::default()
        };
        let err = YamlFrontMatter
            .rewrite("tags: 3\n", &meta(None, &["x"]), &config)
            .unwrap_err();
        assert!(err.to_string().contains("\"tags\""));
    }
}
