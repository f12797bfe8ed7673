use anyhow::Result;
use clap::{Parser, Subcommand};
use release_mirror_core::watch::DEFAULT_DEBOUNCE;
use std::path::PathBuf;
use std::time::Duration;

use crate::app::App;
use crate::load_config::ConfigLoader;
use crate::scaffold::{write_if_absent, DEFAULT_CONFIG_YAML, DEFAULT_ENV};

/// CLI for release-mirror: mirror release directories into an S3-compatible bucket.
#[derive(Parser)]
#[clap(
    name = "release-mirror",
    version,
    about = "Mirror remote release directories into R2/S3 and keep index pages in sync"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Mirror every configured release once
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Mirror once, then again whenever the config file changes
    Watch {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Quiet period after the last change before re-running
        #[clap(long, default_value_t = DEFAULT_DEBOUNCE.as_millis() as u64)]
        debounce_ms: u64,
    },
    /// Write default config and .env files if they do not exist
    Init {
        #[clap(long, default_value = "config.yaml")]
        config: PathBuf,
        #[clap(long, default_value = ".env")]
        env_file: PathBuf,
    },
}

/// Async CLI entrypoint shared by main() and integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync { config } => {
            let app = App::new(ConfigLoader::new(config));
            println!("Synchronise starting...");
            match app.sync_once().await {
                Ok(report) => {
                    println!(
                        "Synchronise complete: {} release(s) mirrored, {} failed.",
                        report.releases.len(),
                        report.failed.len()
                    );
                    for failed in &report.failed {
                        println!("  {}: {}", failed.version, failed.error);
                    }
                    Ok(())
                }
                Err(e) => {
                    eprintln!("[ERROR] Synchronisation failed: {e:#}");
                    Err(e)
                }
            }
        }
        Commands::Watch {
            config,
            debounce_ms,
        } => {
            let app = App::new(ConfigLoader::new(config));
            app.watch(Duration::from_millis(debounce_ms)).await
        }
        Commands::Init { config, env_file } => {
            if write_if_absent(&config, DEFAULT_CONFIG_YAML)? {
                println!(
                    "Created {}. Set your bucket name before running.",
                    config.display()
                );
            }
            if write_if_absent(&env_file, DEFAULT_ENV)? {
                println!(
                    "Created {}. Fill in your storage credentials.",
                    env_file.display()
                );
            }
            Ok(())
        }
    }
}
