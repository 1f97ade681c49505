//! Persisted configuration for appvault
//!
//! Configuration lives in a single YAML file (`appvault.yml` by default):
//! application identity, the directory roots being protected, optional
//! service stop/start hooks, the optional secret key file, and the list of
//! backup definitions. It is loaded once per invocation and validated before
//! any archiving begins.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::definitions::{validate_definitions, BackupDefinition};
use crate::error::{VaultError, VaultResult};

/// Identity of the application being backed up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationInfo {
    /// Application name, embedded (slugified) in archive filenames
    pub name: String,
    /// Application version recorded on archives created this run
    pub version: String,
}

/// The directory roots this tool operates on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Directories {
    /// Root of the live configuration tree
    pub conf_dir: PathBuf,
    /// Root of the live data tree
    pub data_dir: PathBuf,
    /// Directory receiving archive files (flat, no subdirectories)
    pub backup_dir: PathBuf,
}

/// Commands used to pause services around a backup or restore
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceHooks {
    /// Argv to stop the application's services
    #[serde(default)]
    pub stop_command: Vec<String>,
    /// Argv to start them again
    #[serde(default)]
    pub start_command: Vec<String>,
}

/// Root configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub application: ApplicationInfo,
    pub directories: Directories,

    /// Key file for decrypting secret envelopes in remote configurations
    #[serde(default)]
    pub key_file: Option<PathBuf>,

    /// Optional service stop/start hooks
    #[serde(default)]
    pub services: Option<ServiceHooks>,

    /// Backup definitions, processed in order
    #[serde(default)]
    pub backups: Vec<BackupDefinition>,
}

impl Settings {
    /// Load and validate settings from a YAML file.
    pub fn load(path: &Path) -> VaultResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            VaultError::Config(format!(
                "Failed to read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;

        let settings: Settings = serde_yaml::from_str(&contents).map_err(|e| {
            VaultError::Config(format!(
                "Failed to parse configuration file {}: {}",
                path.display(),
                e
            ))
        })?;

        validate_definitions(&settings.backups)?;

        Ok(settings)
    }

    /// Find a definition by its display name.
    pub fn definition(&self, name: &str) -> Option<&BackupDefinition> {
        self.backups.iter().find(|d| d.name == name)
    }
}
