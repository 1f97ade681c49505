//! appvault - point-in-time backup and restore for application
//! configuration and data directories
//!
//! This library implements an operator-facing backup/restore subsystem: it
//! creates retention-bounded, timestamped archives of selected files from a
//! configuration root and a data root, evaluates day-granularity schedules
//! for local archiving and independent remote replication, dispatches
//! archives to pluggable remote storage backends, and restores a prior
//! archive onto a live installation after snapshotting its current state.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: the persisted YAML configuration, backup definitions and the
//!   per-invocation context value
//! - `error`: custom error types
//! - `backup`: selection, scheduling, archiving, retention and restore
//! - `remote`: pluggable remote strategies and their dispatcher
//! - `secrets`: encrypted-value envelopes for remote credentials
//! - `orchestrator`: service stop/start hooks
//! - `cli`: command handlers behind the binary's subcommands
//!
//! # Example
//!
//! ```rust,ignore
//! use appvault::config::{Settings, VaultContext};
//! use appvault::backup::BackupManager;
//! use appvault::remote::StrategyRegistry;
//! use appvault::secrets::MissingKeyStore;
//!
//! let settings = Settings::load(std::path::Path::new("appvault.yml"))?;
//! let ctx = VaultContext::from_settings(&settings);
//! let registry = StrategyRegistry::with_defaults();
//! let manager = BackupManager::new(&ctx, &settings.backups, &registry, &MissingKeyStore);
//! let report = manager.run(None, chrono::Utc::now())?;
//! ```

pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod remote;
pub mod secrets;

pub use error::{VaultError, VaultResult};
