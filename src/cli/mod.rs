//! CLI command handlers
//!
//! Implements the operator-facing commands; argument parsing lives in the
//! binary entrypoint.

mod backup;

pub use backup::{
    handle_backup_command, handle_encrypt_command, handle_restore_command, handle_view_backups,
    ServiceFlags,
};
