//! Error types for vaultdown.
//!
//! Library crates use [`VaultdownError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::error::Error as _;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Stage-level errors
// ---------------------------------------------------------------------------

/// Why a transform stage could not rewrite a construct.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    /// `[[file #heading]]`: the file id carries whitespace before `#`.
    #[error("invalid internal link content: {content:?}")]
    InvalidLinkContent { content: String },

    /// The link index has no path for the reference.
    #[error("failed to resolve ref {reference:?}")]
    PathNotFound { reference: String },

    /// Anything the stages do not expect (lookup malfunction and the like).
    #[error("unexpected: {0}")]
    Unexpected(String),
}

/// A [`TransformError`] located in the document it came from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{stage} failed at line {line}")]
pub struct StageError {
    /// Name of the failing stage.
    pub stage: &'static str,
    /// 1-based line of the offending construct.
    pub line: usize,
    #[source]
    pub source: TransformError,
}

// ---------------------------------------------------------------------------
// VaultdownError
// ---------------------------------------------------------------------------

/// Top-level error type for all vaultdown operations.
#[derive(Debug, thiserror::Error)]
pub enum VaultdownError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Directory traversal error.
    #[error("failed to walk {path:?}: {message}")]
    Walk { path: PathBuf, message: String },

    /// A transform stage rejected the document body.
    #[error("{stage} failed at {path:?}, line {line}")]
    Stage {
        path: PathBuf,
        stage: &'static str,
        line: usize,
        #[source]
        source: TransformError,
    },

    /// Front matter could not be parsed or rewritten.
    #[error("front matter error in {path:?}: {message}")]
    FrontMatter { path: PathBuf, message: String },

    /// Rendered failure report of one document, as handed to the run coordinator.
    #[error("{}", render_document(.path, .line, .message))]
    Document {
        path: PathBuf,
        line: Option<usize>,
        message: String,
    },

    /// Broken internal invariant (task panic, dropped channel, ...).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, VaultdownError>;

fn render_document(path: &Path, line: &Option<usize>, message: &str) -> String {
    match line {
        Some(line) => format!("[ERROR] path: {}, line: {line} | {message}", path.display()),
        None => format!("[ERROR] path: {} | {message}", path.display()),
    }
}

impl VaultdownError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an internal error from any displayable message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Attach the document path to a stage failure.
    pub fn stage(path: impl Into<PathBuf>, err: StageError) -> Self {
        Self::Stage {
            path: path.into(),
            stage: err.stage,
            line: err.line,
            source: err.source,
        }
    }

    /// 1-based line number, when the error points into a document.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Stage { line, .. } => Some(*line),
            Self::Document { line, .. } => *line,
            _ => None,
        }
    }

    /// Render this error as the report of the document at `path`.
    ///
    /// The default rendering keeps only the root cause; `debug` keeps the whole
    /// `source()` chain.
    pub fn into_report(self, path: &Path, debug: bool) -> Self {
        if let Self::Document { .. } = self {
            return self;
        }
        let line = self.line();
        let message = if debug { self.chain() } else { self.terse() };
        Self::Document {
            path: path.to_path_buf(),
            line,
            message,
        }
    }

    fn terse(&self) -> String {
        match self {
            Self::Stage { source, .. } => source.to_string(),
            Self::Io { source, .. } => source.to_string(),
            Self::FrontMatter { message, .. } => format!("front matter: {message}"),
            other => other.to_string(),
        }
    }

    fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut cause = self.source();
        while let Some(err) = cause {
            out.push_str(": ");
            out.push_str(&err.to_string());
            cause = err.source();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unresolved() -> VaultdownError {
        VaultdownError::stage(
            "vault/note.md",
            StageError {
                stage: "link converter",
                line: 4,
                source: TransformError::PathNotFound {
                    reference: "missing".into(),
                },
            },
        )
    }

    #[test]
    fn error_display_formatting() {
        let err = VaultdownError::config("strictref set but not link");
        assert_eq!(err.to_string(), "config error: strictref set but not link");

        let err = TransformError::InvalidLinkContent {
            content: "note #head".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid internal link content: \"note #head\""
        );
    }

    #[test]
    fn terse_report_keeps_root_cause_and_line() {
        let report = unresolved().into_report(Path::new("vault/note.md"), false);
        assert_eq!(report.line(), Some(4));
        assert_eq!(
            report.to_string(),
            "[ERROR] path: vault/note.md, line: 4 | failed to resolve ref \"missing\""
        );
    }

    #[test]
    fn debug_report_keeps_the_chain() {
        let report = unresolved().into_report(Path::new("vault/note.md"), true);
        let text = report.to_string();
        assert!(text.contains("link converter failed"));
        assert!(text.ends_with("failed to resolve ref \"missing\""));
    }

    #[test]
    fn report_without_line() {
        let err = VaultdownError::internal("coordinator gone");
        let report = err.into_report(Path::new("a.md"), false);
        assert_eq!(
            report.to_string(),
            "[ERROR] path: a.md | internal error: coordinator gone"
        );
    }
}
