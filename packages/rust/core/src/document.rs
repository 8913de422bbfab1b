//! Per-document conversion: front matter split, body pipeline, front matter
//! rewrite, output rendering.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, instrument};

use vaultdown_index::{PathLookup, strict};
use vaultdown_markdown::{BodyConverter, Pipeline};
use vaultdown_shared::{ConvertConfig, Result, VaultdownError};

use crate::engine::{ConversionJob, DocumentProcessor, Processed};
use crate::frontmatter::{FrontMatterRewriter, YamlFrontMatter, split_front_matter};

/// A converted document, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedDocument {
    /// YAML block without fences. Empty when the document has none.
    pub front_matter: String,
    pub body: String,
}

impl ConvertedDocument {
    /// Front matter between `---` fences, followed by the body.
    pub fn render(&self) -> String {
        if self.front_matter.is_empty() {
            return self.body.clone();
        }
        let newline = if self.front_matter.ends_with('\n') { "" } else { "\n" };
        format!("---\n{}{newline}---\n{}", self.front_matter, self.body)
    }
}

/// Convert the document at `source`.
///
/// `root` is the vault root; the document's path relative to it completes
/// fragment-only links. `Ok(None)` means the front matter rewriter gated the
/// document out. Stage errors report lines of the whole file, front matter
/// included.
#[instrument(skip_all, fields(path = %source.display()))]
pub fn convert_document(
    root: &Path,
    source: &Path,
    config: &ConvertConfig,
    lookup: &dyn PathLookup,
    rewriter: &dyn FrontMatterRewriter,
) -> Result<Option<ConvertedDocument>> {
    let text = std::fs::read_to_string(source).map_err(|e| VaultdownError::io(source, e))?;
    let (front_matter, body) = split_front_matter(&text);
    let body_line = text[..text.len() - body.len()].matches('\n').count();

    let mut pipeline = Pipeline::new(config, lookup);
    if let Ok(relative) = source.strip_prefix(root) {
        let relative = relative
            .to_string_lossy()
            .replace(std::path::MAIN_SEPARATOR, "/");
        pipeline = pipeline.with_self_path(relative);
    }
    let raw: Vec<char> = body.chars().collect();
    let (body, meta) = pipeline.convert_body(&raw).map_err(|mut e| {
        e.line += body_line;
        VaultdownError::stage(source, e)
    })?;

    let front_matter = rewriter
        .rewrite(front_matter, &meta, config)
        .map_err(|e| VaultdownError::FrontMatter {
            path: source.to_path_buf(),
            message: e.to_string(),
        })?;
    let Some(front_matter) = front_matter else {
        debug!("not publishable, skipped");
        return Ok(None);
    };

    Ok(Some(ConvertedDocument {
        front_matter,
        body: body.into_iter().collect(),
    }))
}

/// The production [`DocumentProcessor`]: converts through the vault's link
/// index and writes the rendered document.
pub struct MarkdownProcessor {
    root: PathBuf,
    lookup: Arc<dyn PathLookup>,
    rewriter: Arc<dyn FrontMatterRewriter>,
}

impl MarkdownProcessor {
    pub fn new(root: impl Into<PathBuf>, lookup: Arc<dyn PathLookup>) -> Self {
        Self {
            root: root.into(),
            lookup,
            rewriter: Arc::new(YamlFrontMatter),
        }
    }

    /// Replace the front matter rewriter.
    pub fn with_rewriter(mut self, rewriter: Arc<dyn FrontMatterRewriter>) -> Self {
        self.rewriter = rewriter;
        self
    }

    /// Convert `job.source` without writing anything.
    pub fn convert(&self, job: &ConversionJob) -> Result<Option<ConvertedDocument>> {
        let lookup: &dyn PathLookup = &*self.lookup;
        if job.config.strict_ref {
            convert_document(&self.root, &job.source, &job.config, &strict(lookup), &*self.rewriter)
        } else {
            convert_document(&self.root, &job.source, &job.config, lookup, &*self.rewriter)
        }
    }
}

impl DocumentProcessor for MarkdownProcessor {
    fn process(&self, job: &ConversionJob) -> Result<Processed> {
        let Some(document) = self.convert(job)? else {
            return Ok(Processed::Skipped);
        };
        std::fs::write(&job.destination, document.render())
            .map_err(|e| VaultdownError::io(&job.destination, e))?;
        Ok(Processed::Written)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;

    use vaultdown_shared::{Preset, TransformError};

    use super::*;

    struct FakeLookup(HashMap<&'static str, &'static str>);

    impl PathLookup for FakeLookup {
        fn lookup(&self, file_id: &str) -> std::result::Result<Option<String>, TransformError> {
            Ok(self.0.get(file_id).map(|p| p.to_string()))
        }
    }

    fn processor(root: &Path) -> MarkdownProcessor {
        let lookup = FakeLookup(HashMap::from([("target", "notes/target.md")]));
        MarkdownProcessor::new(root, Arc::new(lookup))
    }

    fn job(root: &Path, name: &str, content: &str, config: ConvertConfig) -> ConversionJob {
        let source = root.join(name);
        fs::write(&source, content).unwrap();
        ConversionJob {
            source,
            destination: root.join(format!("out-{name}")),
            config: Arc::new(config),
        }
    }

    fn standard() -> ConvertConfig {
        let mut config = ConvertConfig::default();
        config.apply_preset(Preset::Standard);
        config
    }

    #[test]
    fn render_with_and_without_front_matter() {
        let doc = ConvertedDocument {
            front_matter: String::new(),
            body: "body\n".into(),
        };
        assert_eq!(doc.render(), "body\n");

        let doc = ConvertedDocument {
            front_matter: "a: 1".into(),
            body: "body\n".into(),
        };
        assert_eq!(doc.render(), "---\na: 1\n---\nbody\n");
    }

    #[test]
    fn converts_and_writes_document() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(
            dir.path(),
            "page.md",
            "---\ndraft: false\n---\n# Page #tag\nSee [[target]].\n",
            standard(),
        );

        let processed = processor(dir.path()).process(&job).unwrap();
        assert_eq!(processed, Processed::Written);

        let written = fs::read_to_string(&job.destination).unwrap();
        let (front_matter, body) = split_front_matter(&written);
        assert_eq!(body, "# Page \nSee [target](notes/target.md).\n");
        let map: serde_yaml::Mapping = serde_yaml::from_str(front_matter).unwrap();
        assert_eq!(map.get("title").and_then(|v| v.as_str()), Some("Page"));
        assert!(map.get("tags").is_some());
    }

    #[test]
    fn stage_error_line_counts_front_matter() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(
            dir.path(),
            "broken.md",
            "---\na: 1\n---\nline\n[[missing]]\n",
            standard(),
        );

        let err = processor(dir.path()).process(&job).unwrap_err();
        assert_eq!(err.line(), Some(5));
        let report = err.into_report(&job.source, false).to_string();
        assert!(report.ends_with("line: 5 | failed to resolve ref \"missing\""));
        assert!(!job.destination.exists());
    }

    #[test]
    fn gated_document_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConvertConfig {
            publishable: true,
            ..Default::default()
        };
        let job = job(dir.path(), "private.md", "---\ndraft: true\n---\nsecret\n", config);

        let processed = processor(dir.path()).process(&job).unwrap();
        assert_eq!(processed, Processed::Skipped);
        assert!(!job.destination.exists());
    }

    #[test]
    fn bad_front_matter_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), "list.md", "---\n- a\n---\nbody\n", standard());

        let err = processor(dir.path()).convert(&job).unwrap_err();
        assert!(matches!(err, VaultdownError::FrontMatter { .. }));
        let report = err.into_report(&job.source, false).to_string();
        assert!(report.contains("front matter: front matter is not a YAML mapping"));
    }

    #[test]
    fn custom_rewriter_receives_extracted_meta() {
        struct TitleOnly;

        impl FrontMatterRewriter for TitleOnly {
            fn rewrite(
                &self,
                _front_matter: &str,
                meta: &vaultdown_shared::DocumentMeta,
                _config: &ConvertConfig,
            ) -> std::result::Result<Option<String>, crate::frontmatter::FrontMatterError> {
                Ok(Some(format!("heading: {}\n", meta.title.as_deref().unwrap_or_default())))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let config = ConvertConfig {
            copy_title: true,
            ..Default::default()
        };
        let job = job(dir.path(), "t.md", "# Hello\ntext\n", config);
        let document = processor(dir.path())
            .with_rewriter(Arc::new(TitleOnly))
            .convert(&job)
            .unwrap()
            .unwrap();
        assert_eq!(document.render(), "---\nheading: Hello\n---\n# Hello\ntext\n");
    }
}
