//! Command-line interface definitions and parsing
//!
//! # Commands
//!
//! - **tag**: classify every archive in a directory and prepend its tag, or
//!   apply one tag to all of them with `--as`
//! - **prefix** / **suffix**: add literal text to every archive name
//! - **config**: show or edit the persisted settings
//!
//! Prefix and suffix text is taken from the command line, a named preset
//! (`--preset`), or the configured default, in that order. Presets may contain
//! `{date}`, `{time}` or `{datetime}`, stamped when the command runs.

use crate::models::RenameSettings;
use crate::services::RenameOperation;
use anyhow::{Result, anyhow};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "archive-tagger", version, about = "Batch-rename zip/rar/7z archives with category tags")]
pub struct Cli {
    /// Directory holding the configuration file
    #[arg(long, global = true, value_name = "DIR")]
    pub config_dir: Option<Utf8PathBuf>,

    /// Directory for rotating log files (defaults to <config dir>/logs)
    #[arg(long, global = true, value_name = "DIR")]
    pub log_dir: Option<Utf8PathBuf>,

    /// Enable debug-level logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Also echo log records to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final summary
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Prepend each archive's category tag
    #[command(alias = "t")]
    Tag {
        directory: Utf8PathBuf,

        /// Apply this tag to every archive instead of classifying
        #[arg(long = "as", value_name = "TAG")]
        set_tag: Option<String>,

        /// Number of files processed concurrently
        #[arg(short = 'j', long)]
        jobs: Option<usize>,
    },

    /// Prepend literal text and a space to each archive name
    Prefix {
        directory: Utf8PathBuf,

        /// Text to add (defaults to the configured prefix)
        text: Option<String>,

        /// Use a named prefix preset
        #[arg(long, conflicts_with = "text")]
        preset: Option<String>,

        #[arg(short = 'j', long)]
        jobs: Option<usize>,
    },

    /// Insert a space and literal text before each archive's extension
    Suffix {
        directory: Utf8PathBuf,

        /// Text to add (defaults to the configured suffix)
        text: Option<String>,

        /// Use a named suffix preset
        #[arg(long, conflicts_with = "text")]
        preset: Option<String>,

        #[arg(short = 'j', long)]
        jobs: Option<usize>,
    },

    /// Show or edit the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Map an archive entry extension to a tag
    Map { extension: String, tag: String },
    /// Remove an extension mapping
    Unmap { extension: String },
    /// Add a tag to the vocabulary
    AddTag { tag: String },
    /// Remove a tag from the vocabulary
    RemoveTag { tag: String },
    /// Set the default prefix text
    SetPrefix { text: String },
    /// Set the default suffix text
    SetSuffix { text: String },
    /// Set the default worker count
    SetConcurrency { concurrency: usize },
}

/// A resolved batch request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCommand {
    pub directory: Utf8PathBuf,
    pub operation: RenameOperation,
    pub jobs: Option<usize>,
}

impl Commands {
    /// Resolve a batch subcommand against the settings; `None` for `config`
    pub fn batch_command(&self, settings: &RenameSettings) -> Result<Option<BatchCommand>> {
        let command = match self {
            Commands::Tag {
                directory,
                set_tag,
                jobs,
            } => BatchCommand {
                directory: directory.clone(),
                operation: match set_tag {
                    Some(tag) => RenameOperation::SetTag(tag.clone()),
                    None => RenameOperation::Tag,
                },
                jobs: *jobs,
            },
            Commands::Prefix {
                directory,
                text,
                preset,
                jobs,
            } => {
                let text = resolve_text(text, preset, &settings.prefix, |label| {
                    settings.prefix_preset(label)
                })?;
                BatchCommand {
                    directory: directory.clone(),
                    operation: RenameOperation::Prefix(text),
                    jobs: *jobs,
                }
            }
            Commands::Suffix {
                directory,
                text,
                preset,
                jobs,
            } => {
                let text = resolve_text(text, preset, &settings.suffix, |label| {
                    settings.suffix_preset(label)
                })?;
                BatchCommand {
                    directory: directory.clone(),
                    operation: RenameOperation::Suffix(text),
                    jobs: *jobs,
                }
            }
            Commands::Config { .. } => return Ok(None),
        };
        Ok(Some(command))
    }
}

fn resolve_text<F>(
    text: &Option<String>,
    preset: &Option<String>,
    default: &str,
    lookup: F,
) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(text) = text {
        return Ok(text.clone());
    }
    if let Some(label) = preset {
        return lookup(label).ok_or_else(|| anyhow!("Unknown preset: {}", label));
    }
    Ok(default.to_string())
}
