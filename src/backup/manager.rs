//! Backup pipeline
//!
//! Drives the `backup` command across the configured definitions. Each
//! definition moves independently through check-frequency, build-archive,
//! rotate and dispatch-remotes; a failure in one definition's pipeline never
//! prevents the others from running, and remote outcomes never affect the
//! local archive. Definitions are processed sequentially so archive naming
//! and retention bookkeeping stay deterministic.
//!
//! The current time is injected by the caller, keeping every run
//! reproducible under test.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{error, info, warn};

use crate::backup::archive::{ArchiveBuilder, BackupArchive};
use crate::backup::retention::RetentionManager;
use crate::config::{BackupDefinition, VaultContext};
use crate::error::{VaultError, VaultResult};
use crate::remote::{RemoteDispatcher, RemoteOutcome, RemoteStatus, StrategyRegistry};
use crate::secrets::SecretStore;

/// Orchestrates local backups, retention and remote dispatch
pub struct BackupManager<'a> {
    ctx: &'a VaultContext,
    definitions: &'a [BackupDefinition],
    registry: &'a StrategyRegistry,
    secrets: &'a dyn SecretStore,
}

impl<'a> BackupManager<'a> {
    /// Create a manager over the loaded definitions.
    pub fn new(
        ctx: &'a VaultContext,
        definitions: &'a [BackupDefinition],
        registry: &'a StrategyRegistry,
        secrets: &'a dyn SecretStore,
    ) -> Self {
        Self {
            ctx,
            definitions,
            registry,
            secrets,
        }
    }

    /// Run the backup pipeline at time `now`.
    ///
    /// With `only` set, runs just that definition; naming an unknown
    /// definition is a configuration error.
    pub fn run(&self, only: Option<&str>, now: DateTime<Utc>) -> VaultResult<RunReport> {
        let selected: Vec<&BackupDefinition> = match only {
            Some(name) => {
                let definition = self
                    .definitions
                    .iter()
                    .find(|d| d.name == name)
                    .ok_or_else(|| {
                        VaultError::Config(format!("No backup definition named [{}]", name))
                    })?;
                vec![definition]
            }
            None => self.definitions.iter().collect(),
        };

        let today = now.date_naive();
        let mut outcomes = Vec::new();

        for definition in selected {
            outcomes.push(self.run_definition(definition, now, today));
        }

        Ok(RunReport {
            definitions: outcomes,
        })
    }

    fn run_definition(
        &self,
        definition: &BackupDefinition,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> DefinitionOutcome {
        if !definition.frequency.matches(today) {
            info!(
                "Backup [{}] skipped: frequency [{}] does not match today",
                definition.name, definition.frequency
            );
            return DefinitionOutcome {
                name: definition.name.clone(),
                status: DefinitionStatus::Skipped,
                remotes: Vec::new(),
            };
        }

        let archive = match ArchiveBuilder::new(self.ctx).build(definition, now) {
            Ok(archive) => archive,
            Err(e) => {
                error!("Backup [{}] failed: {}", definition.name, e);
                return DefinitionOutcome {
                    name: definition.name.clone(),
                    status: DefinitionStatus::Failed {
                        reason: e.to_string(),
                    },
                    remotes: Vec::new(),
                };
            }
        };

        let deleted = self.rotate(definition);

        let remotes = RemoteDispatcher::new(self.registry, self.secrets).dispatch(
            &archive,
            &definition.remote_backups,
            today,
        );

        DefinitionOutcome {
            name: definition.name.clone(),
            status: DefinitionStatus::Completed {
                archive: archive.path.clone(),
                rotated: deleted,
            },
            remotes,
        }
    }

    /// Apply retention for one definition; failures are logged, not fatal.
    fn rotate(&self, definition: &BackupDefinition) -> usize {
        match RetentionManager::new(self.ctx).apply(&definition.slug(), definition.backup_limit) {
            Ok(deleted) => deleted.len(),
            Err(e) => {
                warn!("Retention for [{}] failed: {}", definition.name, e);
                0
            }
        }
    }

    /// Snapshot the current state of every definition, ignoring frequencies.
    ///
    /// Used by restore before any live file is touched. Retention runs as
    /// usual (the fresh archive is always among the newest), remotes are
    /// never dispatched, and any failure aborts the caller.
    pub fn safety_backup_all(&self, now: DateTime<Utc>) -> VaultResult<Vec<BackupArchive>> {
        let mut archives = Vec::new();

        for definition in self.definitions {
            let archive = ArchiveBuilder::new(self.ctx).build(definition, now)?;
            self.rotate(definition);
            archives.push(archive);
        }

        Ok(archives)
    }
}

/// Aggregate status of one `backup` invocation
#[derive(Debug)]
pub struct RunReport {
    /// Outcome per processed definition, in configuration order
    pub definitions: Vec<DefinitionOutcome>,
}

impl RunReport {
    /// True when every attempted definition and remote strategy succeeded.
    pub fn success(&self) -> bool {
        self.definitions.iter().all(|outcome| {
            !matches!(outcome.status, DefinitionStatus::Failed { .. })
                && outcome
                    .remotes
                    .iter()
                    .all(|remote| !matches!(remote.status, RemoteStatus::Failed { .. }))
        })
    }
}

/// Terminal state of one definition's pipeline
#[derive(Debug)]
pub struct DefinitionOutcome {
    /// The definition's display name
    pub name: String,
    pub status: DefinitionStatus,
    /// Remote outcomes; empty when the local backup did not run
    pub remotes: Vec<RemoteOutcome>,
}

/// Status of a definition after its pipeline finished
#[derive(Debug)]
pub enum DefinitionStatus {
    /// The definition's frequency did not match today
    Skipped,
    /// Archive created; `rotated` counts the stale archives deleted
    Completed {
        archive: std::path::PathBuf,
        rotated: usize,
    },
    /// The archive could not be written; rotation and remotes were skipped
    Failed { reason: String },
}
