//! Service orchestration hooks
//!
//! Backups of a live application are usually taken with its services paused.
//! The orchestrator is a thin collaborator interface over whatever actually
//! manages those services; the backup and restore pipelines never call it
//! themselves, the CLI layer decides when to pause and resume around them.

use std::process::Command;

use tracing::{debug, info};

use crate::config::settings::ServiceHooks;
use crate::error::{VaultError, VaultResult};

/// Stops and starts the application's services
pub trait Orchestrator {
    /// Stop the services.
    fn stop(&self) -> VaultResult<()>;

    /// Start the services.
    fn start(&self) -> VaultResult<()>;
}

/// Orchestrator that runs configured stop/start commands
pub struct CommandOrchestrator {
    hooks: ServiceHooks,
}

impl CommandOrchestrator {
    /// Create an orchestrator from the configured service hooks.
    pub fn new(hooks: ServiceHooks) -> Self {
        Self { hooks }
    }

    fn run(&self, argv: &[String], action: &str) -> VaultResult<()> {
        let (program, args) = argv.split_first().ok_or_else(|| {
            VaultError::Orchestrator(format!("No {} command configured", action))
        })?;

        debug!("Running {:?}", argv);
        let status = Command::new(program).args(args).status().map_err(|e| {
            VaultError::Orchestrator(format!("Failed to run {} command [{}]: {}", action, program, e))
        })?;

        if !status.success() {
            return Err(VaultError::Orchestrator(format!(
                "{} command [{}] exited with {}",
                action, program, status
            )));
        }

        Ok(())
    }
}

impl Orchestrator for CommandOrchestrator {
    fn stop(&self) -> VaultResult<()> {
        info!("Stopping application services ...");
        self.run(&self.hooks.stop_command, "stop")
    }

    fn start(&self) -> VaultResult<()> {
        info!("Starting application services ...");
        self.run(&self.hooks.start_command, "start")
    }
}

/// Orchestrator used when no service hooks are configured
pub struct NullOrchestrator;

impl Orchestrator for NullOrchestrator {
    fn stop(&self) -> VaultResult<()> {
        info!("No services to stop");
        Ok(())
    }

    fn start(&self) -> VaultResult<()> {
        info!("No services to start");
        Ok(())
    }
}

/// Pick the orchestrator for the configured hooks.
pub fn for_hooks(hooks: Option<ServiceHooks>) -> Box<dyn Orchestrator> {
    match hooks {
        Some(hooks) => Box::new(CommandOrchestrator::new(hooks)),
        None => Box::new(NullOrchestrator),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_orchestrator_is_inert() {
        assert!(NullOrchestrator.stop().is_ok());
        assert!(NullOrchestrator.start().is_ok());
    }

    #[test]
    fn test_empty_command_is_error() {
        let orchestrator = CommandOrchestrator::new(ServiceHooks::default());
        assert!(orchestrator.stop().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_success_and_failure() {
        let orchestrator = CommandOrchestrator::new(ServiceHooks {
            stop_command: vec!["true".to_string()],
            start_command: vec!["false".to_string()],
        });

        assert!(orchestrator.stop().is_ok());

        let err = orchestrator.start().unwrap_err();
        assert!(matches!(err, VaultError::Orchestrator(_)));
    }

    #[test]
    fn test_missing_program_is_error() {
        let orchestrator = CommandOrchestrator::new(ServiceHooks {
            stop_command: vec!["definitely-not-a-real-command-xyz".to_string()],
            start_command: vec![],
        });

        assert!(orchestrator.stop().is_err());
    }
}
