//! archive-tagger - batch-rename zip/rar/7z archives with category tags
//!
//! Main entry point for the command-line front end.
//!
//! # Execution Flow
//!
//! 1. Parse arguments ([`Cli`])
//! 2. Load `Archive Tagger.yaml` plus `ARCHIVE_TAGGER_*` overrides ([`ConfigManager`])
//! 3. Initialize logging → `<log dir>/archive-tagger.<date>`
//! 4. Either edit the configuration, or build a tokio runtime and run one
//!    batch ([`BatchRenamer`]), printing its events as they arrive
//! 5. Shutdown the tokio runtime with a 5s timeout
//!
//! Per-file failures never fail the process; only errors that stop a batch
//! from starting (bad directory, empty prefix/suffix, invalid settings) do.

use anyhow::{Context, Result};
use archive_tagger::cli::{BatchCommand, Cli, Commands, ConfigAction};
use archive_tagger::services::{ArchiveReader, BatchEvent};
use archive_tagger::{APP_NAME, BatchRenamer, Classifier, ConfigManager, UserConfig, VERSION};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config_dir = cli.config_dir.clone().unwrap_or_else(ConfigManager::default_dir);
    let config_manager = ConfigManager::new(&config_dir)?;
    let mut user_config = config_manager.load_user_config()?;

    let log_dir = cli.log_dir.clone().unwrap_or_else(|| config_dir.join("logs"));
    let debug = cli.debug || user_config.settings.debug_mode;
    let _guard = archive_tagger::logging::setup_logging_with_console(&log_dir, APP_NAME, debug, cli.verbose)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    tracing::debug!("Configuration directory: {}", config_manager.config_dir());

    match &cli.command {
        Commands::Config { action } => {
            run_config(&config_manager, &mut user_config, action)?;
            Ok(ExitCode::SUCCESS)
        }
        command => match command.batch_command(&user_config.settings)? {
            Some(batch) => run_batch(&user_config, batch, cli.quiet),
            None => Ok(ExitCode::SUCCESS),
        },
    }
}

fn run_config(manager: &ConfigManager, user_config: &mut UserConfig, action: &ConfigAction) -> Result<()> {
    let settings = &mut user_config.settings;
    let message = match action {
        ConfigAction::Show => {
            let yaml = serde_yaml_ng::to_string(&*user_config).context("Failed to serialize configuration")?;
            println!("# {}", manager.user_config_path());
            print!("{}", yaml);
            return Ok(());
        }
        ConfigAction::Map { extension, tag } => {
            settings.set_extension_tag(extension, tag)?;
            format!("Mapped {} to {}", extension, tag)
        }
        ConfigAction::Unmap { extension } => match settings.remove_extension_tag(extension) {
            Some(tag) => format!("Removed mapping {} -> {}", extension, tag),
            None => {
                println!("No mapping for {}", extension);
                return Ok(());
            }
        },
        ConfigAction::AddTag { tag } => {
            if !settings.add_tag(tag)? {
                println!("Tag {} is already configured", tag);
                return Ok(());
            }
            format!("Added tag {}", tag)
        }
        ConfigAction::RemoveTag { tag } => {
            if !settings.remove_tag(tag) {
                println!("Tag {} is not configured", tag);
                return Ok(());
            }
            format!("Removed tag {}", tag)
        }
        ConfigAction::SetPrefix { text } => {
            settings.prefix = text.trim().to_string();
            format!("Default prefix set to {:?}", settings.prefix)
        }
        ConfigAction::SetSuffix { text } => {
            settings.suffix = text.trim().to_string();
            format!("Default suffix set to {:?}", settings.suffix)
        }
        ConfigAction::SetConcurrency { concurrency } => {
            settings.set_concurrency(*concurrency)?;
            format!("Default concurrency set to {}", concurrency)
        }
    };

    manager.save_user_config(user_config)?;
    println!("{}", message);
    Ok(())
}

fn run_batch(user_config: &UserConfig, batch: BatchCommand, quiet: bool) -> Result<ExitCode> {
    let settings = &user_config.settings;
    let concurrency = settings.resolve_concurrency(batch.jobs);
    let classifier = Classifier::from_settings(settings).context("Invalid tag vocabulary")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("archive-tagger-worker")
        .build()?;

    let code = runtime.block_on(async {
        let renamer = BatchRenamer::new(classifier, Arc::new(ArchiveReader::new()), concurrency);

        let mut handle = match renamer.start(&batch.directory, batch.operation) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!("Batch not started: {}", e);
                eprintln!("Error: {}", e);
                return ExitCode::from(2);
            }
        };

        while let Some(event) = handle.next_event().await {
            match event {
                BatchEvent::Started { total } => {
                    if !quiet {
                        println!("Processing {} archives with {} workers", total, concurrency);
                    }
                }
                BatchEvent::Log(line) => {
                    if !quiet {
                        println!("{}", line);
                    }
                }
                BatchEvent::Progress { completed, total } => {
                    if !quiet {
                        println!("[{}/{}]", completed, total);
                    }
                }
                BatchEvent::Finished(summary) => println!("{}", summary),
            }
        }

        ExitCode::SUCCESS
    });

    runtime.shutdown_timeout(Duration::from_secs(5));
    tracing::info!("Shutdown complete");

    Ok(code)
}
