//! Backup subsystem
//!
//! Creates retention-bounded, point-in-time archives of the configuration
//! and data roots, and restores them without being destructive.
//!
//! # Architecture
//!
//! - `selector`: resolves include/exclude globs into the files to archive
//! - `frequency`: day-granularity cron-like schedule matching
//! - `archive`: packs selections into named, compressed archives
//! - `retention`: rolling deletion of stale archives per definition
//! - `manager`: the per-definition backup pipeline and its run report
//! - `restore`: safety-backup-then-extract restore engine
//!
//! Archives live flat in the backup directory, named
//! `<app_slug>_<definition_slug>_<timestamp>.tgz`. Durable state is entirely
//! the set of archive files on disk plus the configuration file; nothing is
//! carried in memory across invocations.

pub mod archive;
pub mod frequency;
pub mod manager;
pub mod restore;
pub mod retention;
pub mod selector;

pub use archive::{list_archives, ArchiveBuilder, BackupArchive};
pub use frequency::Frequency;
pub use manager::{BackupManager, DefinitionOutcome, DefinitionStatus, RunReport};
pub use restore::{RestoreEngine, RestoreReport};
pub use retention::RetentionManager;
pub use selector::FileSelector;
