//! Tree conversion: mirror a vault into a destination directory.
//!
//! Traversal is lexicographic and runs on one blocking thread that feeds
//! entries to the async dispatcher. Directories are created when absent and
//! left alone when present, other files are copied byte for byte, and `.md`
//! documents go to a bounded pool of conversion tasks. Symlinks are not
//! followed, but a symlink to a file is handled like that file.
//!
//! The run is fail-fast. A coordinator task drains the pool's results; the
//! first error it sees raises a cancellation signal that stops traversal.
//! Conversions already admitted finish, but their results are discarded, and
//! the run reports exactly that first error.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ignore::WalkBuilder;
use tokio::sync::{Semaphore, mpsc, watch};
use tracing::{debug, info, instrument, warn};

use vaultdown_shared::{ConvertConfig, DEFAULT_CONCURRENCY, Result, VaultdownError};

/// Upper bound on admission slots, whatever the configuration asks for.
const MAX_CONCURRENCY: usize = 1024;

const DOCUMENT_EXTENSION: &str = "md";

/// Walk entries buffered ahead of the dispatcher.
const WALK_BUFFER: usize = 64;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// One document to convert.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub config: Arc<ConvertConfig>,
}

/// What a [`DocumentProcessor`] did with a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Processed {
    /// The destination file was written.
    Written,
    /// The document was gated out and nothing was written.
    Skipped,
}

/// Converts one document and writes its destination file.
pub trait DocumentProcessor: Send + Sync + 'static {
    fn process(&self, job: &ConversionJob) -> Result<Processed>;
}

impl<F> DocumentProcessor for F
where
    F: Fn(&ConversionJob) -> Result<Processed> + Send + Sync + 'static,
{
    fn process(&self, job: &ConversionJob) -> Result<Processed> {
        self(job)
    }
}

/// Decides which source paths are left out of the run entirely.
pub trait SkipPredicate: Send + Sync + 'static {
    fn skip(&self, path: &Path) -> bool;
}

impl<F> SkipPredicate for F
where
    F: Fn(&Path) -> bool + Send + Sync + 'static,
{
    fn skip(&self, path: &Path) -> bool {
        self(path)
    }
}

/// Trait for reporting progress during a tree run.
///
/// Implemented by the CLI (terminal spinner) and by [`SilentProgress`].
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after a non-document file is copied.
    fn file_copied(&self, path: &Path);
    /// Called when a document conversion succeeds.
    fn document_converted(&self, path: &Path, done: usize);
    /// Called when the run completes successfully.
    fn done(&self, summary: &TreeSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn file_copied(&self, _path: &Path) {}
    fn document_converted(&self, _path: &Path, _done: usize) {}
    fn done(&self, _summary: &TreeSummary) {}
}

// ---------------------------------------------------------------------------
// Options and results
// ---------------------------------------------------------------------------

/// Settings of one tree run.
#[derive(Debug, Clone)]
pub struct TreeOptions {
    /// Subtree of the source actually walked. `None` walks the whole source.
    pub target: Option<PathBuf>,
    /// Admission slots of the conversion pool.
    pub concurrency: usize,
    /// Shared by every job.
    pub config: Arc<ConvertConfig>,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            target: None,
            concurrency: DEFAULT_CONCURRENCY,
            config: Arc::new(ConvertConfig::default()),
        }
    }
}

/// What a successful run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeSummary {
    /// Directories created in the destination.
    pub directories: usize,
    /// Non-document files copied.
    pub copied: usize,
    /// Documents converted and written.
    pub documents: usize,
    /// Documents converted but gated out, so not written.
    pub skipped: usize,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Mirror `src` (or `options.target` inside it) into `dst`.
///
/// Paths are mapped relative to `src`. The destination root is never
/// traversed, even when it lies inside the source.
#[instrument(skip_all, fields(src = %src.display(), dst = %dst.display()))]
pub async fn convert_tree(
    src: &Path,
    dst: &Path,
    skip: Arc<dyn SkipPredicate>,
    processor: Arc<dyn DocumentProcessor>,
    options: &TreeOptions,
    progress: Arc<dyn ProgressReporter>,
) -> Result<TreeSummary> {
    let start = Instant::now();
    let target = options.target.as_deref().unwrap_or(src);
    let slots = options.concurrency.clamp(1, MAX_CONCURRENCY);

    info!(target = %target.display(), concurrency = slots, "starting tree conversion");
    progress.phase("Converting");

    let semaphore = Arc::new(Semaphore::new(slots));
    let (result_tx, mut result_rx) = mpsc::channel::<Result<(PathBuf, Processed)>>(slots);
    let (cancel_tx, mut cancel_rx) = watch::channel(false);

    // Coordinator: the first error cancels the run and becomes its outcome.
    let reporter = Arc::clone(&progress);
    let coordinator = tokio::spawn(async move {
        let mut counts = Counts::default();
        while let Some(result) = result_rx.recv().await {
            match result {
                Ok((path, Processed::Written)) => {
                    counts.written += 1;
                    reporter.document_converted(&path, counts.written);
                }
                Ok((path, Processed::Skipped)) => {
                    counts.skipped += 1;
                    debug!(path = %path.display(), "document gated out");
                }
                Err(err) => {
                    warn!(error = %err, "conversion failed, cancelling run");
                    let _ = cancel_tx.send(true);
                    return Err(err);
                }
            }
        }
        Ok(counts)
    });

    // The walk does blocking I/O, so it runs off the runtime and streams
    // entries back. Dropping `entries` stops it.
    let (entry_tx, mut entries) = mpsc::channel(WALK_BUFFER);
    let walk_root = target.to_path_buf();
    let excluded = dst.to_path_buf();
    let walker = tokio::task::spawn_blocking(move || {
        let walk = WalkBuilder::new(&walk_root)
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| entry.path() != excluded && !skip.skip(entry.path()))
            .build();
        for entry in walk {
            if entry_tx.blocking_send(entry).is_err() {
                break;
            }
        }
    });

    let mut summary = TreeSummary::default();
    let mut walk_error = None;

    while let Some(entry) = entries.recv().await {
        if *cancel_rx.borrow() {
            debug!("cancelled, stopping traversal");
            break;
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                walk_error = Some(VaultdownError::Walk {
                    path: target.to_path_buf(),
                    message: e.to_string(),
                });
                break;
            }
        };

        let path = entry.path();
        let destination = match path.strip_prefix(src) {
            Ok(relative) => dst.join(relative),
            Err(_) => {
                walk_error = Some(VaultdownError::internal(format!(
                    "{} is not under {}",
                    path.display(),
                    src.display()
                )));
                break;
            }
        };

        match entry_kind(&entry).await {
            EntryKind::Dir => match mirror_dir(&destination, entry.depth() == 0).await {
                Ok(true) => summary.directories += 1,
                Ok(false) => {}
                Err(e) => {
                    walk_error = Some(e);
                    break;
                }
            },
            EntryKind::File if is_document(path) => {
                // Admission: wait for a slot unless the run gets cancelled first.
                let permit = tokio::select! {
                    biased;
                    _ = cancel_rx.changed() => break,
                    permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => {
                            walk_error = Some(VaultdownError::internal("admission semaphore closed"));
                            break;
                        }
                    },
                };

                let job = ConversionJob {
                    source: path.to_path_buf(),
                    destination,
                    config: Arc::clone(&options.config),
                };
                let processor = Arc::clone(&processor);
                let results = result_tx.clone();
                tokio::spawn(async move {
                    let source = job.source.clone();
                    let debug = job.config.debug;
                    let outcome =
                        match tokio::task::spawn_blocking(move || processor.process(&job)).await {
                            Ok(outcome) => outcome,
                            Err(e) => Err(VaultdownError::internal(format!(
                                "conversion task failed: {e}"
                            ))),
                        };
                    let report = match outcome {
                        Ok(processed) => Ok((source, processed)),
                        Err(err) => Err(err.into_report(&source, debug)),
                    };
                    // The coordinator is gone once it has seen an error.
                    let _ = results.send(report).await;
                    drop(permit);
                });
            }
            EntryKind::File => match tokio::fs::copy(path, &destination).await {
                Ok(_) => {
                    summary.copied += 1;
                    progress.file_copied(path);
                }
                Err(e) => {
                    walk_error = Some(VaultdownError::io(path, e));
                    break;
                }
            },
            EntryKind::Other => {
                warn!(path = %path.display(), "not a regular file or directory, skipped");
            }
        }
    }
    drop(entries);

    // Wait for every admitted conversion, then close the result stream.
    let all_slots = u32::try_from(slots).unwrap_or(u32::MAX);
    let _drained = semaphore
        .acquire_many(all_slots)
        .await
        .map_err(|_| VaultdownError::internal("admission semaphore closed"))?;
    drop(result_tx);

    let counts = coordinator
        .await
        .map_err(|e| VaultdownError::internal(format!("coordinator task failed: {e}")))?;
    walker
        .await
        .map_err(|e| VaultdownError::internal(format!("traversal task failed: {e}")))?;

    if let Some(err) = walk_error {
        return Err(err);
    }
    let counts = counts?;
    summary.documents = counts.written;
    summary.skipped = counts.skipped;
    summary.elapsed = start.elapsed();

    info!(
        directories = summary.directories,
        copied = summary.copied,
        documents = summary.documents,
        skipped = summary.skipped,
        elapsed_ms = summary.elapsed.as_millis(),
        "tree conversion completed"
    );
    progress.done(&summary);
    Ok(summary)
}

#[derive(Debug, Default)]
struct Counts {
    written: usize,
    skipped: usize,
}

enum EntryKind {
    Dir,
    File,
    Other,
}

/// Classify an entry. A symlink takes the kind of its target, except that
/// symlinked directories are never descended into.
async fn entry_kind(entry: &ignore::DirEntry) -> EntryKind {
    let Some(file_type) = entry.file_type() else {
        return EntryKind::Other;
    };
    if file_type.is_dir() {
        EntryKind::Dir
    } else if file_type.is_file() {
        EntryKind::File
    } else if file_type.is_symlink() {
        match tokio::fs::metadata(entry.path()).await {
            Ok(meta) if meta.is_file() => EntryKind::File,
            _ => EntryKind::Other,
        }
    } else {
        EntryKind::Other
    }
}

/// Create `dir` unless it exists. Returns whether it was created.
async fn mirror_dir(dir: &Path, root: bool) -> Result<bool> {
    if tokio::fs::try_exists(dir).await.unwrap_or(false) {
        debug!(path = %dir.display(), "destination directory exists, left untouched");
        return Ok(false);
    }
    let created = if root {
        tokio::fs::create_dir_all(dir).await
    } else {
        tokio::fs::create_dir(dir).await
    };
    match created {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(VaultdownError::io(dir, e)),
    }
}

/// Whether `path` names a markdown document.
pub fn is_document(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == DOCUMENT_EXTENSION)
}
