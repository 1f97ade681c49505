//! Restore from a backup archive
//!
//! Restores a prior archive back onto a live installation without being
//! destructive: before any live file is touched, a fresh safety backup of
//! the *current* state is taken through the same builder/retention path the
//! `backup` command uses. Extraction then writes every entry back to its
//! original relative path under the matching root, creating missing parent
//! directories and overwriting existing files. Files present on disk but
//! absent from the archive are left alone.
//!
//! Service pausing around a restore is the caller's responsibility via the
//! orchestrator; this engine never starts or stops anything.

use std::fs;
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use tracing::{info, warn};

use crate::backup::archive::BackupArchive;
use crate::backup::manager::BackupManager;
use crate::config::{BackupDefinition, VaultContext};
use crate::error::{VaultError, VaultResult};
use crate::remote::StrategyRegistry;
use crate::secrets::MissingKeyStore;

/// Restores archives into the live configuration and data roots
pub struct RestoreEngine<'a> {
    ctx: &'a VaultContext,
    definitions: &'a [BackupDefinition],
}

impl<'a> RestoreEngine<'a> {
    /// Create a restore engine over the loaded definitions.
    pub fn new(ctx: &'a VaultContext, definitions: &'a [BackupDefinition]) -> Self {
        Self { ctx, definitions }
    }

    /// Restore the archive at `archive_file` at time `now`.
    ///
    /// `archive_file` may be a path or a bare filename resolved against the
    /// backup directory. A missing archive aborts the whole restore. Partial
    /// extraction failures are collected in the report, never rolled back.
    pub fn restore(&self, archive_file: &Path, now: DateTime<Utc>) -> VaultResult<RestoreReport> {
        let archive_path = self.resolve(archive_file)?;

        info!("Initiating restore from {}", archive_path.display());

        let safety_archives = self.safety_backup(now)?;

        let report = self.extract(&archive_path, safety_archives)?;

        info!(
            "Restore complete: {} file(s) restored, {} failure(s)",
            report.restored.len(),
            report.failed.len()
        );

        Ok(report)
    }

    fn resolve(&self, archive_file: &Path) -> VaultResult<PathBuf> {
        if archive_file.is_file() {
            return Ok(archive_file.to_path_buf());
        }

        let in_backup_dir = self.ctx.backup_dir.join(archive_file);
        if in_backup_dir.is_file() {
            return Ok(in_backup_dir);
        }

        Err(VaultError::Restore(format!(
            "Backup file {} not found",
            archive_file.display()
        )))
    }

    /// Snapshot the current state before touching anything.
    fn safety_backup(&self, now: DateTime<Utc>) -> VaultResult<Vec<BackupArchive>> {
        if self.definitions.is_empty() {
            warn!("No backup definitions configured; restoring without a safety backup");
            return Ok(Vec::new());
        }

        info!("Creating backup of existing application data and configuration");

        // Remotes are never dispatched for safety backups, so the registry
        // and secret store are inert here.
        let registry = StrategyRegistry::new();
        let manager = BackupManager::new(self.ctx, self.definitions, &registry, &MissingKeyStore);

        manager.safety_backup_all(now).map_err(|e| {
            VaultError::Restore(format!("Aborting restore: safety backup failed: {}", e))
        })
    }

    fn extract(
        &self,
        archive_path: &Path,
        safety_archives: Vec<BackupArchive>,
    ) -> VaultResult<RestoreReport> {
        let file = fs::File::open(archive_path).map_err(|e| {
            VaultError::Restore(format!("Failed to open {}: {}", archive_path.display(), e))
        })?;
        let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));

        let mut report = RestoreReport {
            archive: archive_path.to_path_buf(),
            safety_archives,
            restored: Vec::new(),
            failed: Vec::new(),
        };

        let entries = archive.entries().map_err(|e| {
            VaultError::Restore(format!("Failed to read {}: {}", archive_path.display(), e))
        })?;

        for entry in entries {
            let mut entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    report
                        .failed
                        .push((PathBuf::from("<archive entry>"), e.to_string()));
                    continue;
                }
            };

            let entry_path = match entry.path() {
                Ok(path) => path.into_owned(),
                Err(e) => {
                    report
                        .failed
                        .push((PathBuf::from("<archive entry>"), e.to_string()));
                    continue;
                }
            };

            let (root, relative) = match self.split_root(&entry_path) {
                Some(split) => split,
                None => {
                    report.failed.push((
                        entry_path,
                        "entry is outside the data and conf roots".to_string(),
                    ));
                    continue;
                }
            };

            // The bare `data/` or `conf/` directory entry.
            if relative.as_os_str().is_empty() {
                continue;
            }

            let target = root.join(&relative);

            if entry.header().entry_type().is_dir() {
                if let Err(e) = fs::create_dir_all(&target) {
                    report.failed.push((entry_path, e.to_string()));
                }
                continue;
            }

            let unpacked = target
                .parent()
                .map(fs::create_dir_all)
                .unwrap_or(Ok(()))
                .and_then(|_| entry.unpack(&target).map(|_| ()));

            match unpacked {
                Ok(()) => report.restored.push(entry_path),
                Err(e) => {
                    warn!("Failed to restore {}: {}", entry_path.display(), e);
                    report.failed.push((entry_path, e.to_string()));
                }
            }
        }

        Ok(report)
    }

    /// Map an archive entry path onto its live root.
    ///
    /// Entries are namespaced `data/...` or `conf/...`; anything else, and
    /// any path containing non-normal components, is rejected.
    fn split_root(&self, entry_path: &Path) -> Option<(PathBuf, PathBuf)> {
        let mut components = entry_path.components();

        let root = match components.next()? {
            Component::Normal(first) if first == "data" => self.ctx.data_dir.clone(),
            Component::Normal(first) if first == "conf" => self.ctx.conf_dir.clone(),
            _ => return None,
        };

        let relative = components.as_path().to_path_buf();
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }

        Some((root, relative))
    }
}

/// Result of a restore operation
#[derive(Debug)]
pub struct RestoreReport {
    /// The archive that was restored
    pub archive: PathBuf,
    /// Safety archives created before extraction
    pub safety_archives: Vec<BackupArchive>,
    /// Entries written back, as archive-relative paths
    pub restored: Vec<PathBuf>,
    /// Entries that could not be restored, with the reason
    pub failed: Vec<(PathBuf, String)>,
}

impl RestoreReport {
    /// True when every entry was restored.
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }
}
