use crate::Error;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};

pub const SERVICE_NAME: &str = "cloudflared";
pub const DEFAULT_BINARY: &str = "cloudflared";

const INSTALL_MARKER: &str = "installed successfully";
const UNINSTALL_MARKER: &str = "uninstalled successfully";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status reported success.
    pub success: bool,
    /// Stdout followed by stderr.
    pub output: String,
}

/// Local service manager the connector daemon is registered with.
#[async_trait]
pub trait ServiceManager: Send + Sync {
    async fn is_available(&self, service: &str) -> Result<bool, Error>;
    async fn run_command(&self, program: &str, args: &[&str]) -> Result<CommandOutput, Error>;
}

pub struct SystemServiceManager;

#[async_trait]
impl ServiceManager for SystemServiceManager {
    async fn is_available(&self, service: &str) -> Result<bool, Error> {
        let unit = format!("{}.service", service);
        let output = self
            .run_command("systemctl", &["list-unit-files", "--no-legend", unit.as_str()])
            .await?;

        Ok(output.success && output.output.lines().any(|line| line.starts_with(&unit)))
    }

    async fn run_command(&self, program: &str, args: &[&str]) -> Result<CommandOutput, Error> {
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|source| Error::Command {
                command: program.to_owned(),
                source,
            })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput {
            success: output.status.success(),
            output: text,
        })
    }
}

/// Installs and removes the connector daemon as a system service.
///
/// A run counts as successful only when the process exits cleanly and its
/// output carries the daemon's success phrase.
pub struct ConnectorManager<S> {
    service_manager: Arc<S>,
    binary: String,
}

impl<S: ServiceManager> ConnectorManager<S> {
    pub fn new(service_manager: Arc<S>, binary: impl Into<String>) -> Self {
        Self {
            service_manager,
            binary: binary.into(),
        }
    }

    pub async fn is_installed(&self) -> Result<bool, Error> {
        self.service_manager.is_available(SERVICE_NAME).await
    }

    pub async fn install(&self, token: &str) -> Result<bool, Error> {
        let output = self
            .service_manager
            .run_command(&self.binary, &["service", "install", token])
            .await?;

        if output.success && output.output.contains(INSTALL_MARKER) {
            info!(service = SERVICE_NAME, "installed connector");
            return Ok(true);
        }

        Err(Error::ConnectorInstall(summary(&output, Some(token))))
    }

    pub async fn uninstall(&self) -> Result<bool, Error> {
        if !self.is_installed().await? {
            debug!(service = SERVICE_NAME, "connector not installed, nothing to remove");
            return Ok(true);
        }

        let output = self
            .service_manager
            .run_command(&self.binary, &["service", "uninstall"])
            .await?;

        if output.success && output.output.contains(UNINSTALL_MARKER) {
            info!(service = SERVICE_NAME, "uninstalled connector");
            return Ok(true);
        }

        Err(Error::ConnectorUninstall(summary(&output, None)))
    }
}

// Last non-empty line of output, with the token scrubbed.
fn summary(output: &CommandOutput, token: Option<&str>) -> String {
    let line = output
        .output
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("no output");

    let line = match token {
        Some(token) if !token.is_empty() => line.replace(token, "<redacted>"),
        _ => line.to_owned(),
    };

    if output.success {
        line
    } else {
        format!("command exited unsuccessfully: {}", line)
    }
}
