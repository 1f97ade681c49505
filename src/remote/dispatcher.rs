//! Remote dispatch
//!
//! For each remote backup spec on a definition that just produced a local
//! archive, the dispatcher checks the spec's own frequency and, when it
//! matches, builds the strategy and uploads. A strategy's failure is caught
//! and recorded; it never prevents the remaining strategies from running and
//! never rolls back the local archive.
//!
//! A remote pattern may name a day on which the owning definition's local
//! pattern never matches; that remote simply never runs. This is an accepted
//! consequence of gating remotes on the local backup having run.

use chrono::NaiveDate;
use tracing::{debug, error, info};

use crate::backup::archive::BackupArchive;
use crate::config::RemoteBackupSpec;
use crate::remote::{RemoteOutcome, RemoteStatus, StrategyRegistry};
use crate::secrets::SecretStore;

/// Runs a definition's remote backup specs against a fresh local archive
pub struct RemoteDispatcher<'a> {
    registry: &'a StrategyRegistry,
    secrets: &'a dyn SecretStore,
}

impl<'a> RemoteDispatcher<'a> {
    /// Create a dispatcher over the given registry and secret store.
    pub fn new(registry: &'a StrategyRegistry, secrets: &'a dyn SecretStore) -> Self {
        Self { registry, secrets }
    }

    /// Dispatch every spec whose frequency matches `today`, sequentially.
    pub fn dispatch(
        &self,
        archive: &BackupArchive,
        specs: &[RemoteBackupSpec],
        today: NaiveDate,
    ) -> Vec<RemoteOutcome> {
        specs
            .iter()
            .map(|spec| self.dispatch_one(archive, spec, today))
            .collect()
    }

    fn dispatch_one(
        &self,
        archive: &BackupArchive,
        spec: &RemoteBackupSpec,
        today: NaiveDate,
    ) -> RemoteOutcome {
        if !spec.frequency.matches(today) {
            debug!(
                "Remote backup [{}] skipped: frequency [{}] does not match today",
                spec.name, spec.frequency
            );
            return RemoteOutcome {
                name: spec.name.clone(),
                status: RemoteStatus::Skipped,
            };
        }

        info!("Initiating remote backup [{}] ({})", spec.name, spec.strategy_type);

        let result = self
            .registry
            .build(&spec.strategy_type, &spec.configuration, self.secrets)
            .and_then(|strategy| strategy.upload(archive));

        match result {
            Ok(location) => {
                info!("Remote backup [{}] uploaded to {}", spec.name, location);
                RemoteOutcome {
                    name: spec.name.clone(),
                    status: RemoteStatus::Uploaded { location },
                }
            }
            Err(e) => {
                error!("Remote backup [{}] failed: {}", spec.name, e);
                RemoteOutcome {
                    name: spec.name.clone(),
                    status: RemoteStatus::Failed {
                        reason: e.to_string(),
                    },
                }
            }
        }
    }
}
