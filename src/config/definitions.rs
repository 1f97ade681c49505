//! Backup definitions
//!
//! A backup definition is a named, independently scheduled backup covering
//! the data and configuration roots. Definitions are loaded once per
//! invocation from the persisted configuration and are read-only for the
//! duration of the run.

use serde::{Deserialize, Serialize};

use crate::backup::frequency::Frequency;
use crate::backup::selector::FileSelector;
use crate::error::{VaultError, VaultResult};

/// Derive the filesystem/shell-safe identifier for a display name.
///
/// The name is lowercased and every character outside `[a-z0-9-]` is
/// replaced with `-`. The result is embedded in archive filenames, so it can
/// never contain `_` (the filename segment separator).
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Include/exclude glob lists for one directory root
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirFilter {
    /// Glob patterns selecting files; empty means everything (`**/*`)
    #[serde(default)]
    pub include_list: Vec<String>,
    /// Glob patterns removing files from the selection; empty means none
    #[serde(default)]
    pub exclude_list: Vec<String>,
}

/// Per-root file filters for a definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileFilter {
    /// Filter applied to the data root
    #[serde(default)]
    pub data_dir: DirFilter,
    /// Filter applied to the configuration root
    #[serde(default)]
    pub conf_dir: DirFilter,
}

/// A remote replication target attached to a definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteBackupSpec {
    /// Descriptive name, used in logs and the run summary
    pub name: String,
    /// Selects the strategy implementation from the registry (e.g. `S3`)
    pub strategy_type: String,
    /// Independent schedule; the strategy only runs when both this and the
    /// owning definition's frequency match today
    #[serde(default)]
    pub frequency: Frequency,
    /// Opaque key/value payload handed to the strategy
    #[serde(default)]
    pub configuration: serde_yaml::Mapping,
}

/// A named, independently scheduled backup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupDefinition {
    /// Unique, human-chosen identifier
    pub name: String,
    /// Number of local archives to keep; 0 means unlimited
    #[serde(default)]
    pub backup_limit: u32,
    /// Include/exclude globs per root
    #[serde(default)]
    pub file_filter: FileFilter,
    /// Day-granularity schedule for the local backup
    #[serde(default)]
    pub frequency: Frequency,
    /// Remote replication targets, in dispatch order
    #[serde(default)]
    pub remote_backups: Vec<RemoteBackupSpec>,
}

impl BackupDefinition {
    /// The filesystem-safe identifier embedded in archive filenames
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }
}

/// Validate a loaded definition list.
///
/// Two distinct names that slugify identically would make their archives
/// indistinguishable and corrupt each other's retention counting, so slug
/// collisions are a configuration error rather than a silent merge.
pub fn validate_definitions(definitions: &[BackupDefinition]) -> VaultResult<()> {
    let mut seen: std::collections::HashMap<String, &str> = std::collections::HashMap::new();

    for definition in definitions {
        if definition.name.trim().is_empty() {
            return Err(VaultError::Config(
                "backup definition has an empty name".to_string(),
            ));
        }

        let slug = definition.slug();
        if let Some(existing) = seen.insert(slug.clone(), &definition.name) {
            return Err(VaultError::Config(format!(
                "backup definitions [{}] and [{}] both reduce to slug [{}]",
                existing, definition.name, slug
            )));
        }

        // Compile the glob lists now so malformed patterns fail the load,
        // not the first backup that uses them.
        for filter in [
            &definition.file_filter.data_dir,
            &definition.file_filter.conf_dir,
        ] {
            FileSelector::new(filter).map_err(|e| {
                VaultError::Config(format!("definition [{}]: {}", definition.name, e))
            })?;
        }

        for remote in &definition.remote_backups {
            if remote.strategy_type.trim().is_empty() {
                return Err(VaultError::Config(format!(
                    "remote backup [{}] on definition [{}] has no strategy_type",
                    remote.name, definition.name
                )));
            }
        }
    }

    Ok(())
}
