//! Remote backup strategies
//!
//! A remote strategy is a pluggable backend that uploads a completed local
//! archive to off-host storage. Strategies are selected by the
//! `strategy_type` string on a definition's remote backup spec, resolved
//! through a registry: new backends are added by registration, never by any
//! reflection or plugin-loading mechanism.
//!
//! - `RemoteStrategy`: the capability every backend implements
//! - `StrategyRegistry`: maps `strategy_type` strings to strategy factories
//! - `RemoteDispatcher`: gates each spec on its frequency and isolates
//!   per-strategy failures
//! - `s3`: the object-storage strategy

pub mod dispatcher;
pub mod s3;

use std::collections::HashMap;

use crate::backup::archive::BackupArchive;
use crate::error::{VaultError, VaultResult};
use crate::secrets::SecretStore;

pub use dispatcher::RemoteDispatcher;

/// Capability implemented by every remote backend
pub trait RemoteStrategy {
    /// Upload the archive, returning a human-readable remote location.
    fn upload(&self, archive: &BackupArchive) -> VaultResult<String>;
}

/// Builds a strategy from a spec's opaque configuration payload.
///
/// The secret store is available so credential fields can be decrypted
/// immediately before use; a decrypted secret must never be persisted or
/// logged.
pub type StrategyFactory =
    Box<dyn Fn(&serde_yaml::Mapping, &dyn SecretStore) -> VaultResult<Box<dyn RemoteStrategy>> + Send + Sync>;

/// Registry of remote strategy factories keyed by `strategy_type`
pub struct StrategyRegistry {
    factories: HashMap<String, StrategyFactory>,
}

impl StrategyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// The registry with all built-in strategies registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("S3", Box::new(s3::S3Strategy::from_configuration));
        registry
    }

    /// Register a strategy factory under a type name.
    pub fn register(&mut self, strategy_type: impl Into<String>, factory: StrategyFactory) {
        self.factories.insert(strategy_type.into(), factory);
    }

    /// Build a strategy for `strategy_type` from its configuration payload.
    pub fn build(
        &self,
        strategy_type: &str,
        configuration: &serde_yaml::Mapping,
        secrets: &dyn SecretStore,
    ) -> VaultResult<Box<dyn RemoteStrategy>> {
        let factory = self.factories.get(strategy_type).ok_or_else(|| {
            VaultError::RemoteUpload(format!(
                "No remote backup strategy registered for type [{}]",
                strategy_type
            ))
        })?;

        factory(configuration, secrets)
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Result of one remote backup spec during a dispatch
#[derive(Debug, Clone)]
pub struct RemoteOutcome {
    /// The spec's descriptive name
    pub name: String,
    pub status: RemoteStatus,
}

/// Terminal state of one remote backup spec
#[derive(Debug, Clone)]
pub enum RemoteStatus {
    /// The spec's frequency did not match today
    Skipped,
    /// Upload succeeded
    Uploaded { location: String },
    /// Upload failed; siblings and the local archive are unaffected
    Failed { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::PlaintextStore;

    #[test]
    fn test_unknown_strategy_type_rejected() {
        let registry = StrategyRegistry::with_defaults();
        let err = registry
            .build("FTP", &serde_yaml::Mapping::new(), &PlaintextStore)
            .err()
            .unwrap();
        assert!(matches!(err, VaultError::RemoteUpload(_)));
        assert!(err.to_string().contains("FTP"));
    }

    #[test]
    fn test_registration_adds_strategy() {
        struct NullStrategy;
        impl RemoteStrategy for NullStrategy {
            fn upload(&self, _archive: &BackupArchive) -> VaultResult<String> {
                Ok("null://".to_string())
            }
        }

        let mut registry = StrategyRegistry::new();
        registry.register("null", Box::new(|_, _| Ok(Box::new(NullStrategy))));

        assert!(registry
            .build("null", &serde_yaml::Mapping::new(), &PlaintextStore)
            .is_ok());
    }

    #[test]
    fn test_defaults_include_s3() {
        let registry = StrategyRegistry::default();
        // Building fails on the empty configuration, but the type resolves.
        let err = registry
            .build("S3", &serde_yaml::Mapping::new(), &PlaintextStore)
            .err()
            .unwrap();
        assert!(!err.to_string().contains("No remote backup strategy"));
    }
}
