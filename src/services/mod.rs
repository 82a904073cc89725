//! Services module - classification and batch rename logic.
//!
//! Everything here is framework-agnostic: no CLI parsing or terminal output,
//! only filesystem access, archive listing and the worker pool.
//!
//! # Components
//!
//! - [`archive`]: container formats, [`ArchiveFile`], the [`EntryLister`] trait and
//!   the default [`ArchiveReader`] (zip, rar, 7z)
//! - [`classifier`]: [`Classifier`] decides a file's tag from its name, falling back
//!   to the extensions of the entries inside the archive
//! - [`naming`]: pure target-name construction for tag, prefix and suffix
//! - [`batch`]: [`BatchRenamer`] discovers archives and renames them on a bounded
//!   worker pool, reporting [`BatchEvent`]s
//!
//! # Usage Example
//!
//! ```ignore
//! use archive_tagger::services::{ArchiveReader, BatchRenamer, Classifier, RenameOperation};
//!
//! let classifier = Classifier::from_settings(&settings)?;
//! let renamer = BatchRenamer::new(classifier, Arc::new(ArchiveReader::new()), 4);
//!
//! let report = renamer
//!     .start(Utf8Path::new("/archives"), RenameOperation::Tag)?
//!     .collect()
//!     .await;
//! ```

pub mod archive;
pub mod batch;
pub mod classifier;
pub mod naming;

pub use archive::{ArchiveError, ArchiveFile, ArchiveFormat, ArchiveReader, EntryLister};
pub use batch::{
    ArchiveScan, BatchError, BatchEvent, BatchHandle, BatchRenamer, BatchReport, JobOutcome,
    RenameError, RenameOperation, TargetReservations, discover_archives, rename_reserved,
};
pub use classifier::{Classification, Classifier, TagSource};
