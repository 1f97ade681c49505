//! Configuration and invocation context
//!
//! - `settings`: the persisted YAML configuration document
//! - `definitions`: backup definitions and their validation
//! - `context`: the resolved per-invocation context value

pub mod context;
pub mod definitions;
pub mod settings;

pub use context::VaultContext;
pub use definitions::{slugify, BackupDefinition, DirFilter, FileFilter, RemoteBackupSpec};
pub use settings::Settings;
