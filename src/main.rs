use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use appvault::cli::{
    handle_backup_command, handle_encrypt_command, handle_restore_command, handle_view_backups,
    ServiceFlags,
};
use appvault::config::Settings;

#[derive(Parser)]
#[command(
    name = "appvault",
    version,
    about = "Point-in-time backup and restore for application configuration and data directories",
    long_about = "appvault creates retention-bounded, timestamped archives of an \
                  application's configuration and data directories, replicates them \
                  to remote storage on independent schedules, and restores a prior \
                  archive after snapshotting the current state."
)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = "appvault.yml", env = "APPVAULT_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create backups for all definitions, or a single named one
    Backup {
        /// Stop services before the backup runs (default)
        #[arg(long, overrides_with = "no_pre_stop_services")]
        pre_stop_services: bool,
        /// Do not stop services before the backup runs
        #[arg(long)]
        no_pre_stop_services: bool,

        /// Start services after the backup completes (default)
        #[arg(long, overrides_with = "no_post_start_services")]
        post_start_services: bool,
        /// Do not start services after the backup completes
        #[arg(long)]
        no_post_start_services: bool,

        /// Definition to back up; omit to run all definitions
        definition_name: Option<String>,
    },

    /// Restore application data and configuration from a backup archive
    Restore {
        /// Stop services before the restore runs (default)
        #[arg(long, overrides_with = "no_pre_stop_services")]
        pre_stop_services: bool,
        /// Do not stop services before the restore runs
        #[arg(long)]
        no_pre_stop_services: bool,

        /// Start services after the restore completes (default)
        #[arg(long, overrides_with = "no_post_start_services")]
        post_start_services: bool,
        /// Do not start services after the restore completes
        #[arg(long)]
        no_post_start_services: bool,

        /// Archive file to restore; bare filenames resolve against the
        /// backup directory
        archive_file: PathBuf,
    },

    /// List the archive files in the backup directory
    ViewBackups,

    /// Wrap a secret value in an encrypted envelope
    Encrypt {
        /// The plaintext value to encrypt
        value: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)?;

    match cli.command {
        Commands::Backup {
            pre_stop_services,
            no_pre_stop_services,
            post_start_services,
            no_post_start_services,
            definition_name,
        } => {
            let flags = ServiceFlags {
                pre_stop: pre_stop_services || !no_pre_stop_services,
                post_start: post_start_services || !no_post_start_services,
            };
            let succeeded = handle_backup_command(&settings, flags, definition_name.as_deref())?;
            if !succeeded {
                std::process::exit(1);
            }
        }

        Commands::Restore {
            pre_stop_services,
            no_pre_stop_services,
            post_start_services,
            no_post_start_services,
            archive_file,
        } => {
            let flags = ServiceFlags {
                pre_stop: pre_stop_services || !no_pre_stop_services,
                post_start: post_start_services || !no_post_start_services,
            };
            let succeeded = handle_restore_command(&settings, flags, &archive_file)?;
            if !succeeded {
                std::process::exit(1);
            }
        }

        Commands::ViewBackups => {
            handle_view_backups(&settings)?;
        }

        Commands::Encrypt { value } => {
            handle_encrypt_command(&settings, &value)?;
        }
    }

    Ok(())
}
