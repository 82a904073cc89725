//! Data models for archive-tagger.
//!
//! - [`UserConfig`] / [`RenameSettings`]: tag vocabulary, extension→tag mapping,
//!   prefix/suffix text and worker count, persisted as YAML
//! - [`ExtensionTagMap`]: normalized extension→tag lookup used by the content fallback
//! - [`ProgressState`]: per-batch completion counter owned by the batch aggregator

pub mod config;
pub mod progress;

pub use self::config::{
    ConfigValidationError, DATE_PLACEHOLDERS, DEFAULT_CONCURRENCY, ExtensionTagMap,
    RenameSettings, UserConfig, expand_placeholders, normalize_extension,
};
pub use self::progress::ProgressState;
