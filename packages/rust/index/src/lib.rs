//! Link resolution index.
//!
//! Maps the bare identifier of a wiki link (`note`, `dir/note`, `image.png`) to a
//! concrete vault-relative path by fuzzy suffix matching against every file in
//! the vault.
//!
//! The index is built once, before any document is converted, and is read-only
//! afterwards. Conversions share it through [`PathLookup`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::WalkBuilder;
use tracing::{debug, instrument};
use unicode_normalization::UnicodeNormalization;

use vaultdown_shared::{Result, TransformError, VaultdownError};

/// Extension appended to identifiers that carry none.
const DOCUMENT_EXTENSION: &str = "md";

// ---------------------------------------------------------------------------
// PathLookup
// ---------------------------------------------------------------------------

/// Resolves a link identifier to a vault-relative path.
pub trait PathLookup: Send + Sync {
    /// `Ok(None)` means "not found"; `Err` means the lookup itself broke.
    fn lookup(&self, file_id: &str) -> std::result::Result<Option<String>, TransformError>;
}

impl<L: PathLookup + ?Sized> PathLookup for Arc<L> {
    fn lookup(&self, file_id: &str) -> std::result::Result<Option<String>, TransformError> {
        (**self).lookup(file_id)
    }
}

impl<L: PathLookup + ?Sized> PathLookup for &L {
    fn lookup(&self, file_id: &str) -> std::result::Result<Option<String>, TransformError> {
        (**self).lookup(file_id)
    }
}

/// A lookup that turns "not found" into [`TransformError::PathNotFound`].
#[derive(Debug, Clone)]
pub struct Strict<L> {
    inner: L,
}

/// Wrap `inner` so unresolved identifiers become hard errors.
pub fn strict<L: PathLookup>(inner: L) -> Strict<L> {
    Strict { inner }
}

impl<L: PathLookup> PathLookup for Strict<L> {
    fn lookup(&self, file_id: &str) -> std::result::Result<Option<String>, TransformError> {
        match self.inner.lookup(file_id)? {
            Some(path) => Ok(Some(path)),
            None => Err(TransformError::PathNotFound {
                reference: file_id.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// PathIndex
// ---------------------------------------------------------------------------

/// Every file of a vault, grouped by normalized base file name.
#[derive(Debug, Clone, Default)]
pub struct PathIndex {
    root: PathBuf,
    by_name: HashMap<String, Vec<PathBuf>>,
}

impl PathIndex {
    /// Walk `root` and record every file under it. Directories are not indexed.
    #[instrument(skip_all, fields(root = %root.display()))]
    pub fn build(root: &Path) -> Result<Self> {
        if !root.exists() {
            return Err(VaultdownError::io(
                root,
                std::io::Error::new(std::io::ErrorKind::NotFound, "vault not found"),
            ));
        }

        let mut files = Vec::new();
        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .follow_links(false)
            .build();
        for entry in walker {
            let entry = entry.map_err(|e| VaultdownError::Walk {
                path: root.to_path_buf(),
                message: e.to_string(),
            })?;
            // Symlinks are not followed, but a link to a file is still a file.
            let is_file = entry
                .file_type()
                .is_some_and(|ft| ft.is_file() || (ft.is_symlink() && entry.path().is_file()));
            if is_file {
                files.push(entry.into_path());
            }
        }

        let index = Self::from_paths(root, files);
        debug!(names = index.by_name.len(), "link index built");
        Ok(index)
    }

    /// Build an index from an explicit file list rooted at `root`.
    pub fn from_paths(root: impl Into<PathBuf>, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut by_name: HashMap<String, Vec<PathBuf>> = HashMap::new();
        for path in paths {
            let Some(name) = path.file_name() else {
                continue;
            };
            let name = normalize(&name.to_string_lossy());
            by_name.entry(name).or_default().push(path);
        }
        Self {
            root: root.into(),
            by_name,
        }
    }

    /// Number of indexed files.
    pub fn len(&self) -> usize {
        self.by_name.values().map(Vec::len).sum()
    }

    /// Whether the index holds no file at all.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    fn best_match(&self, file_id: &str) -> Option<&PathBuf> {
        let requested = if Path::new(file_id).extension().is_none() {
            format!("{file_id}.{DOCUMENT_EXTENSION}")
        } else {
            file_id.to_string()
        };
        let requested = normalize(&requested);
        let base = requested.rsplit('/').next().unwrap_or(&requested);

        self.by_name
            .get(base)?
            .iter()
            .filter_map(|candidate| {
                let relative = candidate.strip_prefix(&self.root).unwrap_or(candidate);
                let joined = normalize(&to_slash(relative));
                match_score(&joined, &requested).map(|score| (score, joined, candidate))
            })
            .min_by(|(sa, pa, _), (sb, pb, _)| sa.cmp(sb).then_with(|| pa.cmp(pb)))
            .map(|(_, _, candidate)| candidate)
    }
}

impl PathLookup for PathIndex {
    fn lookup(&self, file_id: &str) -> std::result::Result<Option<String>, TransformError> {
        let Some(found) = self.best_match(file_id) else {
            return Ok(None);
        };
        let relative = found.strip_prefix(&self.root).map_err(|_| {
            TransformError::Unexpected(format!(
                "{} is not under {}",
                found.display(),
                self.root.display()
            ))
        })?;
        Ok(Some(to_slash(relative)))
    }
}

/// Number of candidate segments left over once `requested` is matched against
/// the tail of `candidate`; `None` if any compared segment differs.
fn match_score(candidate: &str, requested: &str) -> Option<usize> {
    let have: Vec<&str> = candidate.split('/').collect();
    let want: Vec<&str> = requested.split('/').collect();
    if have.len() < want.len() {
        return None;
    }
    let matched = have
        .iter()
        .rev()
        .zip(want.iter().rev())
        .all(|(h, w)| h == w);
    matched.then(|| have.len() - want.len())
}

fn normalize(s: &str) -> String {
    s.nfc().collect()
}

fn to_slash(path: &Path) -> String {
    path.to_string_lossy()
        .replace(std::path::MAIN_SEPARATOR, "/")
}
