//! Seam over the service supervisor.

use std::process::Command;

use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("could not execute systemctl: {0}")]
    Exec(#[from] std::io::Error),
    #[error("restarting `{unit}` failed ({status}): {stderr}")]
    Failed {
        unit: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Restarts a named unit. The only operation the supervisor exposes to
/// this tool.
#[cfg_attr(test, mockall::automock)]
pub trait ServiceManager {
    fn restart(&self, unit: &str) -> Result<(), ServiceError>;
}

/// Restarts units by invoking `systemctl restart`, synchronously.
pub struct Systemctl {
    program: String,
}

impl Default for Systemctl {
    fn default() -> Self {
        Self {
            program: "systemctl".to_string(),
        }
    }
}

impl Systemctl {
    /// Replaces the invoked binary. Tests point this at commands with a
    /// known exit status.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl ServiceManager for Systemctl {
    fn restart(&self, unit: &str) -> Result<(), ServiceError> {
        info!(unit, "restarting service");
        let output = Command::new(&self.program)
            .arg("restart")
            .arg(unit)
            .output()?;

        if !output.status.success() {
            return Err(ServiceError::Failed {
                unit: unit.to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        debug!(unit, "restart command completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[cfg(target_family = "unix")]
    #[test]
    fn succeeding_command_restarts() {
        let manager = Systemctl::with_program("true");
        assert!(manager.restart("some.service").is_ok());
    }

    #[cfg(target_family = "unix")]
    #[test]
    fn failing_command_reports_status() {
        let manager = Systemctl::with_program("false");
        let err = manager.restart("some.service").unwrap_err();
        assert_matches!(err, ServiceError::Failed { unit, status, .. } => {
            assert_eq!(unit, "some.service");
            assert!(!status.success());
        });
    }

    #[test]
    fn missing_binary_is_an_exec_error() {
        let manager = Systemctl::with_program("/nonexistent/systemctl-for-sure");
        let err = manager.restart("some.service").unwrap_err();
        assert_matches!(err, ServiceError::Exec(_));
    }
}
