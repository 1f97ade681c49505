//! Backup and restore CLI commands
//!
//! Handlers behind the `backup`, `restore`, `view-backups` and `encrypt`
//! subcommands. Library modules log through tracing; the operator-facing
//! status summary is printed here. Each handler returns whether every
//! attempted step succeeded so the process exit code can aggregate failures.

use std::path::Path;

use chrono::Utc;
use tracing::warn;

use crate::backup::manager::{BackupManager, DefinitionStatus, RunReport};
use crate::backup::restore::{RestoreEngine, RestoreReport};
use crate::backup::archive;
use crate::config::{Settings, VaultContext};
use crate::error::{VaultError, VaultResult};
use crate::orchestrator::{self, Orchestrator};
use crate::remote::{RemoteStatus, StrategyRegistry};
use crate::secrets::{FileKeyStore, MissingKeyStore, SecretStore};

/// Service pause behavior around a backup or restore
#[derive(Debug, Clone, Copy)]
pub struct ServiceFlags {
    /// Stop services before the operation
    pub pre_stop: bool,
    /// Start services after the operation
    pub post_start: bool,
}

/// Run the backup pipeline, optionally for a single definition.
///
/// Returns whether every attempted definition and remote succeeded.
pub fn handle_backup_command(
    settings: &Settings,
    flags: ServiceFlags,
    definition_name: Option<&str>,
) -> VaultResult<bool> {
    let ctx = VaultContext::from_settings(settings);
    let orchestrator = orchestrator::for_hooks(settings.services.clone());

    if flags.pre_stop {
        orchestrator.stop()?;
    }

    let registry = StrategyRegistry::with_defaults();
    let secrets = secret_store(&ctx);
    let manager = BackupManager::new(&ctx, &settings.backups, &registry, secrets.as_ref());

    let report = manager.run(definition_name, Utc::now())?;

    if flags.post_start {
        orchestrator.start()?;
    }
    if flags.pre_stop && !flags.post_start {
        warn!("Services were stopped for the backup and intentionally not restarted");
    }

    print_run_report(&report);

    Ok(report.success())
}

/// Restore an archive, snapshotting the current state first.
pub fn handle_restore_command(
    settings: &Settings,
    flags: ServiceFlags,
    archive_file: &Path,
) -> VaultResult<bool> {
    let ctx = VaultContext::from_settings(settings);
    let orchestrator = orchestrator::for_hooks(settings.services.clone());

    if flags.pre_stop {
        orchestrator.stop()?;
    }

    let engine = RestoreEngine::new(&ctx, &settings.backups);
    let report = engine.restore(archive_file, Utc::now())?;

    if flags.post_start {
        orchestrator.start()?;
    }
    if flags.pre_stop && !flags.post_start {
        warn!("Services were stopped for the restore and intentionally not restarted");
    }

    print_restore_report(&report);

    Ok(report.success())
}

/// List the archive files currently present in the backup directory.
pub fn handle_view_backups(settings: &Settings) -> VaultResult<()> {
    let ctx = VaultContext::from_settings(settings);
    let archives = archive::list_archives(&ctx)?;

    if archives.is_empty() {
        println!("No backups found.");
        return Ok(());
    }

    for archive in &archives {
        println!("{}", archive.file_name());
    }
    println!();
    println!("Total: {} backup(s)", archives.len());

    Ok(())
}

/// Wrap a secret value in an encrypted envelope for use in remote
/// configurations.
pub fn handle_encrypt_command(settings: &Settings, value: &str) -> VaultResult<()> {
    let key_file = settings.key_file.as_ref().ok_or_else(|| {
        VaultError::Config("No key_file configured; set one to encrypt secrets".to_string())
    })?;

    let store = FileKeyStore::load_or_generate(key_file)?;
    println!("{}", store.encrypt(value)?);

    Ok(())
}

fn secret_store(ctx: &VaultContext) -> Box<dyn SecretStore> {
    match &ctx.key_file {
        Some(path) => match FileKeyStore::load(path) {
            Ok(store) => Box::new(store),
            Err(e) => {
                // Strategies that need the key will fail individually.
                warn!("{}", e);
                Box::new(MissingKeyStore)
            }
        },
        None => Box::new(MissingKeyStore),
    }
}

fn print_run_report(report: &RunReport) {
    println!("Backup Summary");
    println!("==============");

    for outcome in &report.definitions {
        match &outcome.status {
            DefinitionStatus::Skipped => {
                println!("  {}: skipped (frequency did not match today)", outcome.name);
            }
            DefinitionStatus::Completed { archive, rotated } => {
                println!("  {}: created {}", outcome.name, archive.display());
                if *rotated > 0 {
                    println!("     removed {} old archive(s)", rotated);
                }
            }
            DefinitionStatus::Failed { reason } => {
                println!("  {}: FAILED - {}", outcome.name, reason);
            }
        }

        for remote in &outcome.remotes {
            match &remote.status {
                RemoteStatus::Skipped => {
                    println!("     remote {}: skipped (frequency did not match today)", remote.name);
                }
                RemoteStatus::Uploaded { location } => {
                    println!("     remote {}: uploaded to {}", remote.name, location);
                }
                RemoteStatus::Failed { reason } => {
                    println!("     remote {}: FAILED - {}", remote.name, reason);
                }
            }
        }
    }

    println!();
    println!("{} definition(s) processed", report.definitions.len());
}

fn print_restore_report(report: &RestoreReport) {
    println!("Restore Summary");
    println!("===============");
    println!("  Archive: {}", report.archive.display());

    for archive in &report.safety_archives {
        println!("  Pre-restore backup: {}", archive.file_name());
    }

    println!("  Restored: {} file(s)", report.restored.len());

    if !report.failed.is_empty() {
        println!("  Failed: {} file(s)", report.failed.len());
        for (path, reason) in &report.failed {
            println!("    {}: {}", path.display(), reason);
        }
    }
}
