//! Rolling archive retention
//!
//! Deletes the oldest archives for a definition beyond its configured limit.
//! A limit of 0 means unlimited retention. Retention only ever considers
//! files whose names parse as archives for the given definition slug, so
//! foreign files and other definitions' archives are never touched. Because
//! archives are sorted newest-first by embedded timestamp, the archive
//! created in the current invocation is never a deletion candidate of its
//! own retention pass.

use std::fs;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::backup::archive::list_archives;
use crate::config::VaultContext;
use crate::error::{VaultError, VaultResult};

/// Applies a definition's retention limit to the backup directory
pub struct RetentionManager<'a> {
    ctx: &'a VaultContext,
}

impl<'a> RetentionManager<'a> {
    /// Create a retention manager for the given context.
    pub fn new(ctx: &'a VaultContext) -> Self {
        Self { ctx }
    }

    /// Delete all but the newest `backup_limit` archives for `slug`.
    ///
    /// Returns the deleted paths. A failure to delete one archive is logged
    /// and does not block deletion of the others.
    pub fn apply(&self, slug: &str, backup_limit: u32) -> VaultResult<Vec<PathBuf>> {
        if backup_limit == 0 {
            return Ok(Vec::new());
        }

        info!(
            "Removing old backups for [{}], keeping the newest {}",
            slug, backup_limit
        );

        let archives = list_archives(self.ctx)
            .map_err(|e| VaultError::Retention(format!("Failed to list archives: {}", e)))?;

        let mut deleted = Vec::new();

        for archive in archives
            .into_iter()
            .filter(|archive| archive.definition_slug == slug)
            .skip(backup_limit as usize)
        {
            match fs::remove_file(&archive.path) {
                Ok(()) => {
                    info!("Deleted old backup {}", archive.path.display());
                    deleted.push(archive.path);
                }
                Err(e) => {
                    warn!("Failed to delete old backup {}: {}", archive.path.display(), e);
                }
            }
        }

        Ok(deleted)
    }
}
