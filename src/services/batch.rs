use crate::metrics::{BatchMetrics, BatchSummary};
use crate::models::ProgressState;
use crate::services::archive::{ArchiveError, ArchiveFile, ArchiveFormat, EntryLister};
use crate::services::classifier::{Classification, Classifier};
use crate::services::naming;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::{Semaphore, mpsc};

/// What a batch does to each file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOperation {
    /// Classify and prepend the category tag
    Tag,
    /// Prepend the given tag to every file without classifying
    SetTag(String),
    /// Prepend literal text and a space
    Prefix(String),
    /// Insert a space and literal text before the extension
    Suffix(String),
}

impl RenameOperation {
    pub fn label(&self) -> &'static str {
        match self {
            RenameOperation::Tag => "tagging",
            RenameOperation::SetTag(_) => "retagging",
            RenameOperation::Prefix(_) => "prefixing",
            RenameOperation::Suffix(_) => "suffixing",
        }
    }

    /// Trim the literal text, reject empty prefixes/suffixes and unknown tags
    fn validated(self, classifier: &Classifier) -> Result<Self, BatchError> {
        match self {
            RenameOperation::Tag => Ok(RenameOperation::Tag),
            RenameOperation::SetTag(tag) => {
                let tag = tag.trim();
                if !classifier.vocabulary().iter().any(|known| known == tag) {
                    return Err(BatchError::UnknownTag(tag.to_string()));
                }
                Ok(RenameOperation::SetTag(tag.to_string()))
            }
            RenameOperation::Prefix(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(BatchError::EmptyPrefix);
                }
                Ok(RenameOperation::Prefix(text.to_string()))
            }
            RenameOperation::Suffix(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(BatchError::EmptySuffix);
                }
                Ok(RenameOperation::Suffix(text.to_string()))
            }
        }
    }
}

/// Errors that prevent a batch from starting
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("No directory selected")]
    MissingDirectory,

    #[error("Directory not found: {0}")]
    DirectoryNotFound(Utf8PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(Utf8PathBuf),

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No zip, rar or 7z archives found in {0}")]
    NoArchives(Utf8PathBuf),

    #[error("Prefix text must not be empty")]
    EmptyPrefix,

    #[error("Suffix text must not be empty")]
    EmptySuffix,

    #[error("Unknown tag {0:?}")]
    UnknownTag(String),

    #[error("A batch is already running")]
    AlreadyRunning,
}

/// Errors from renaming a single file
#[derive(Error, Debug)]
pub enum RenameError {
    #[error("target {0} already exists")]
    TargetExists(Utf8PathBuf),

    #[error("target {0} is already claimed by another file in this batch")]
    TargetReserved(Utf8PathBuf),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Result of scanning a directory for archives
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveScan {
    /// Archives to process, sorted by name
    pub files: Vec<ArchiveFile>,
    /// Archives whose names are not valid UTF-8, lossily converted for reporting
    pub invalid_names: Vec<String>,
}

impl ArchiveScan {
    /// Number of jobs the batch will report on
    pub fn total(&self) -> usize {
        self.files.len() + self.invalid_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Scan `directory` (non-recursively) for supported archives
pub fn discover_archives(directory: &Utf8Path) -> Result<ArchiveScan, BatchError> {
    if directory.as_str().trim().is_empty() {
        return Err(BatchError::MissingDirectory);
    }
    if !directory.exists() {
        return Err(BatchError::DirectoryNotFound(directory.to_path_buf()));
    }
    if !directory.is_dir() {
        return Err(BatchError::NotADirectory(directory.to_path_buf()));
    }

    let read_error = |source| BatchError::ReadDirectory {
        path: directory.to_path_buf(),
        source,
    };
    let directory = directory.canonicalize_utf8().map_err(read_error)?;
    // std entries rather than read_dir_utf8, so non-UTF-8 names can still be reported
    let entries = fs::read_dir(&directory).map_err(read_error)?;

    let mut scan = ArchiveScan::default();
    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry in {}: {}", directory, e);
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        match Utf8PathBuf::from_path_buf(path) {
            Ok(path) => {
                if let Some(file) = ArchiveFile::from_path(path) {
                    scan.files.push(file);
                }
            }
            Err(path) => {
                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.to_string_lossy().into_owned());
                if ArchiveFormat::from_path(Utf8Path::new(&name)).is_some() {
                    tracing::warn!("Archive name in {} is not valid UTF-8: {}", directory, name);
                    scan.invalid_names.push(name);
                }
            }
        }
    }

    if scan.is_empty() {
        return Err(BatchError::NoArchives(directory));
    }

    scan.files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    scan.invalid_names.sort();
    tracing::debug!("Discovered {} archives in {}", scan.total(), directory);
    Ok(scan)
}

/// Target paths claimed so far in one batch.
///
/// Two files that compute the same target name cannot both be renamed to it:
/// the first to claim wins, later claims fail.
#[derive(Debug, Default)]
pub struct TargetReservations {
    claimed: Mutex<HashSet<Utf8PathBuf>>,
}

impl TargetReservations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the target was already claimed
    pub fn claim(&self, target: &Utf8Path) -> bool {
        let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);
        claimed.insert(target.to_path_buf())
    }
}

/// Rename `from` to `to` after claiming `to`; never replaces an existing file
pub fn rename_reserved(
    from: &Utf8Path,
    to: &Utf8Path,
    reservations: &TargetReservations,
) -> Result<(), RenameError> {
    if !reservations.claim(to) {
        return Err(RenameError::TargetReserved(to.to_path_buf()));
    }
    if fs::symlink_metadata(to).is_ok() {
        return Err(RenameError::TargetExists(to.to_path_buf()));
    }
    fs::rename(from, to)?;
    Ok(())
}

/// Result of one job; its `Display` form is the log line for the file
#[derive(Debug)]
pub enum JobOutcome {
    Renamed { from: String, to: String },
    Unchanged { file: String },
    Untagged { file: String },
    Unreadable { file: String, error: ArchiveError },
    Failed { file: String, error: RenameError },
}

impl JobOutcome {
    fn record(&self, metrics: &BatchMetrics) {
        match self {
            JobOutcome::Renamed { .. } => metrics.record_renamed(),
            JobOutcome::Unchanged { .. } => metrics.record_unchanged(),
            JobOutcome::Untagged { .. } | JobOutcome::Unreadable { .. } => {
                metrics.record_unclassified()
            }
            JobOutcome::Failed { .. } => metrics.record_failed(),
        }
    }

    fn trace(&self) {
        match self {
            JobOutcome::Renamed { .. } => tracing::info!("{}", self),
            JobOutcome::Unchanged { .. } | JobOutcome::Untagged { .. } => tracing::debug!("{}", self),
            JobOutcome::Unreadable { .. } | JobOutcome::Failed { .. } => tracing::warn!("{}", self),
        }
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::Renamed { from, to } => write!(f, "Renamed: {} -> {}", from, to),
            JobOutcome::Unchanged { file } => write!(f, "Unchanged: {}", file),
            JobOutcome::Untagged { file } => write!(f, "No tag found for {}, left untouched", file),
            JobOutcome::Unreadable { file, error } => {
                write!(f, "Could not read archive {}, left untouched: {}", file, error)
            }
            JobOutcome::Failed { file, error } => write!(f, "Error processing {}: {}", file, error),
        }
    }
}

/// State shared by every job of one batch
struct JobContext {
    classifier: Arc<Classifier>,
    lister: Arc<dyn EntryLister>,
    operation: RenameOperation,
    reservations: TargetReservations,
    metrics: BatchMetrics,
}

/// One file's unit of work, owned by the worker running it
struct RenameJob {
    file: ArchiveFile,
}

impl RenameJob {
    /// Blocking body of the job: classify (for tagging), compute the target, rename
    fn run(&self, ctx: &JobContext) -> JobOutcome {
        let file = &self.file;
        let target_name = match &ctx.operation {
            RenameOperation::Tag => match ctx.classifier.classify(file, ctx.lister.as_ref()) {
                Classification::Tagged { tag, source } => {
                    tracing::debug!("{} tagged {} ({:?})", file.file_name, tag, source);
                    ctx.classifier.tagged_name(&tag, &file.file_name)
                }
                Classification::Untagged => {
                    return JobOutcome::Untagged {
                        file: file.file_name.clone(),
                    };
                }
                Classification::Unreadable(error) => {
                    return JobOutcome::Unreadable {
                        file: file.file_name.clone(),
                        error,
                    };
                }
            },
            RenameOperation::SetTag(tag) => ctx.classifier.tagged_name(tag, &file.file_name),
            RenameOperation::Prefix(prefix) => naming::with_prefix(&file.file_name, prefix),
            RenameOperation::Suffix(suffix) => naming::with_suffix(&file.file_name, suffix),
        };

        let target = file.path.with_file_name(&target_name);
        if target == file.path {
            return JobOutcome::Unchanged {
                file: file.file_name.clone(),
            };
        }

        match rename_reserved(&file.path, &target, &ctx.reservations) {
            Ok(()) => JobOutcome::Renamed {
                from: file.file_name.clone(),
                to: target_name,
            },
            Err(error) => JobOutcome::Failed {
                file: file.file_name.clone(),
                error,
            },
        }
    }

    fn execute(self, ctx: &JobContext) -> String {
        let outcome = self.run(ctx);
        outcome.record(&ctx.metrics);
        outcome.trace();
        outcome.to_string()
    }
}

/// Events emitted by a running batch, in emission order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    Started { total: usize },
    /// Human-readable description of one action or error
    Log(String),
    Progress { completed: usize, total: usize },
    /// Emitted once, when every discovered file has completed
    Finished(BatchSummary),
}

/// Messages from workers to the aggregator
enum JobMessage {
    Log(String),
    Completed,
}

/// Everything a batch emitted, collected by [`BatchHandle::collect`]
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub total: usize,
    pub log: Vec<String>,
    /// `completed` value of every progress event, in order
    pub progress: Vec<usize>,
    /// `None` only if the batch stopped before all files completed
    pub summary: Option<BatchSummary>,
}

/// Receiving end of a started batch
pub struct BatchHandle {
    total: usize,
    events: mpsc::UnboundedReceiver<BatchEvent>,
}

impl BatchHandle {
    /// Number of files discovered for this batch
    pub fn total(&self) -> usize {
        self.total
    }

    /// Next event, or `None` once the batch has finished and all events were read
    pub async fn next_event(&mut self) -> Option<BatchEvent> {
        self.events.recv().await
    }

    /// Drain every event until the batch finishes
    pub async fn collect(mut self) -> BatchReport {
        let mut report = BatchReport {
            total: self.total,
            ..BatchReport::default()
        };
        while let Some(event) = self.next_event().await {
            match event {
                BatchEvent::Started { .. } => {}
                BatchEvent::Log(line) => report.log.push(line),
                BatchEvent::Progress { completed, .. } => report.progress.push(completed),
                BatchEvent::Finished(summary) => report.summary = Some(summary),
            }
        }
        report
    }
}

/// Clears the renamer's running flag when the batch ends
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs rename batches over a directory with a bounded number of workers
///
/// Each discovered file gets its own tokio task. Tasks queue on a semaphore
/// sized by `concurrency`; the permit holder runs its blocking
/// classify-and-rename body on the blocking thread pool. A single aggregator
/// task counts completions and emits [`BatchEvent`]s.
///
/// # Example
/// ```ignore
/// let classifier = Classifier::from_settings(&settings)?;
/// let renamer = BatchRenamer::new(classifier, Arc::new(ArchiveReader::new()), 4);
///
/// let mut batch = renamer.start(Utf8Path::new("/archives"), RenameOperation::Tag)?;
/// while let Some(event) = batch.next_event().await {
///     println!("{:?}", event);
/// }
/// ```
pub struct BatchRenamer {
    classifier: Arc<Classifier>,
    lister: Arc<dyn EntryLister>,
    concurrency: usize,
    running: Arc<AtomicBool>,
}

impl BatchRenamer {
    pub fn new(classifier: Classifier, lister: Arc<dyn EntryLister>, concurrency: usize) -> Self {
        Self {
            classifier: Arc::new(classifier),
            lister,
            concurrency: concurrency.max(1),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Discover archives in `directory` and start processing them.
    ///
    /// Validation and discovery errors are returned before any job is scheduled.
    /// Must be called from within a tokio runtime.
    pub fn start(&self, directory: &Utf8Path, operation: RenameOperation) -> Result<BatchHandle, BatchError> {
        let operation = operation.validated(&self.classifier)?;
        let scan = discover_archives(directory)?;
        self.spawn_batch(scan, operation)
    }

    /// Start a batch over an already-discovered file set
    pub fn start_with_files(
        &self,
        files: Vec<ArchiveFile>,
        operation: RenameOperation,
    ) -> Result<BatchHandle, BatchError> {
        let operation = operation.validated(&self.classifier)?;
        if files.is_empty() {
            return Err(BatchError::NoArchives(Utf8PathBuf::new()));
        }
        let scan = ArchiveScan {
            files,
            invalid_names: Vec::new(),
        };
        self.spawn_batch(scan, operation)
    }

    fn spawn_batch(&self, scan: ArchiveScan, operation: RenameOperation) -> Result<BatchHandle, BatchError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(BatchError::AlreadyRunning);
        }
        let guard = RunningGuard(self.running.clone());

        let total = scan.total();
        tracing::info!(
            "Starting {} of {} archives (max concurrent: {})",
            operation.label(),
            total,
            self.concurrency
        );

        let ctx = Arc::new(JobContext {
            classifier: self.classifier.clone(),
            lister: self.lister.clone(),
            operation,
            reservations: TargetReservations::new(),
            metrics: BatchMetrics::new(),
        });

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (job_tx, job_rx) = mpsc::unbounded_channel();

        tokio::spawn(aggregate(ProgressState::new(total), job_rx, event_tx, ctx.clone(), guard));

        // Reported as failures up front; they can never be renamed through a UTF-8 path
        for name in scan.invalid_names {
            ctx.metrics.record_failed();
            let line = format!("Error processing {}: file name is not valid UTF-8", name);
            let _ = job_tx.send(JobMessage::Log(line));
            let _ = job_tx.send(JobMessage::Completed);
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        for file in scan.files {
            let ctx = ctx.clone();
            let semaphore = semaphore.clone();
            let job_tx = job_tx.clone();

            tokio::spawn(async move {
                let file_name = file.file_name.clone();
                let job = RenameJob { file };

                let line = match semaphore.acquire_owned().await {
                    Ok(permit) => {
                        let worker_ctx = ctx.clone();
                        let result = tokio::task::spawn_blocking(move || {
                            let _permit = permit;
                            job.execute(&worker_ctx)
                        })
                        .await;

                        match result {
                            Ok(line) => line,
                            Err(e) => {
                                tracing::error!("Worker for {} stopped: {}", file_name, e);
                                ctx.metrics.record_failed();
                                format!("Error processing {}: worker stopped: {}", file_name, e)
                            }
                        }
                    }
                    Err(e) => {
                        ctx.metrics.record_failed();
                        format!("Error processing {}: {}", file_name, e)
                    }
                };

                // Receiver lives until the last completion, so sends cannot fail before then
                let _ = job_tx.send(JobMessage::Log(line));
                let _ = job_tx.send(JobMessage::Completed);
            });
        }

        Ok(BatchHandle {
            total,
            events: event_rx,
        })
    }
}

/// Fan-in of worker messages; the batch ends when completed == total
async fn aggregate(
    mut progress: ProgressState,
    mut job_rx: mpsc::UnboundedReceiver<JobMessage>,
    event_tx: mpsc::UnboundedSender<BatchEvent>,
    ctx: Arc<JobContext>,
    guard: RunningGuard,
) {
    // Send errors only mean nobody is listening anymore
    let _ = event_tx.send(BatchEvent::Started {
        total: progress.total(),
    });

    while let Some(message) = job_rx.recv().await {
        match message {
            JobMessage::Log(line) => {
                let _ = event_tx.send(BatchEvent::Log(line));
            }
            JobMessage::Completed => {
                let finished = progress.record_completion();
                tracing::debug!(
                    "Progress {}/{} ({}%)",
                    progress.completed(),
                    progress.total(),
                    progress.percent()
                );
                let _ = event_tx.send(BatchEvent::Progress {
                    completed: progress.completed(),
                    total: progress.total(),
                });

                if finished {
                    ctx.metrics.log_summary();
                    drop(guard);
                    let _ = event_tx.send(BatchEvent::Log("All files processed".to_string()));
                    let _ = event_tx.send(BatchEvent::Finished(ctx.metrics.summary()));
                    return;
                }
            }
        }
    }

    if progress.is_complete() {
        return;
    }
    tracing::error!(
        "Workers stopped after {}/{} files",
        progress.completed(),
        progress.total()
    );
}
