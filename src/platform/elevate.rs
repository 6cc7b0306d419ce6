use crate::error::SparkError;
use std::path::PathBuf;
use std::process::Command;
use tracing::info;

/// Re-runs the whole command with elevated privileges.
pub trait ElevatedRunner {
    fn available(&self) -> bool;

    /// Runs `args` elevated and returns the child's exit code.
    fn rerun(&self, args: &[String]) -> Result<i32, SparkError>;
}

/// `sudo --preserve-env`, when `sudo` is on `PATH` and we are not root.
pub struct SudoRunner {
    sudo: Option<PathBuf>,
}

impl SudoRunner {
    pub fn detect() -> Self {
        let sudo = if cfg!(unix) && !already_root() {
            which::which("sudo").ok()
        } else {
            None
        };
        Self { sudo }
    }
}

fn already_root() -> bool {
    std::env::var("USER").map(|user| user == "root").unwrap_or(false)
        || std::env::var("SUDO_UID").is_ok()
}

impl ElevatedRunner for SudoRunner {
    fn available(&self) -> bool {
        self.sudo.is_some()
    }

    fn rerun(&self, args: &[String]) -> Result<i32, SparkError> {
        let sudo = self
            .sudo
            .as_ref()
            .ok_or_else(|| SparkError::OperationCancelled("sudo is not available".into()))?;
        info!("retrying with {}", sudo.display());
        let status = Command::new(sudo).arg("--preserve-env").args(args).status()?;
        Ok(status.code().unwrap_or(1))
    }
}
