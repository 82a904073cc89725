// archive-tagger - Batch-rename archives with category tags
//
// This is the library crate containing the classification and rename logic.
// The binary crate (main.rs) provides the command-line entry point.

pub mod cli;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;

// Re-export commonly used types for convenience
pub use crate::config::ConfigManager;
pub use metrics::{BatchMetrics, BatchSummary};
pub use models::{ExtensionTagMap, RenameSettings, UserConfig};
pub use services::{BatchEvent, BatchRenamer, Classifier, RenameOperation};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
