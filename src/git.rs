use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tracing::{error, info};

use crate::config::Config;

/// Git operations handler performing clone-or-pull reconciliation
pub struct GitClient {
    program: PathBuf,
    timeout: Duration,
}

/// The reconciliation step a destination path calls for.
///
/// Directory existence is the sole discriminator: a missing destination needs
/// a fresh clone, an existing one is refreshed in place. A partial clone left
/// behind by an interrupted run therefore gets a pull on the next pass, which
/// may fail and is reported like any other git failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Clone,
    Pull,
}

/// Result of a sync operation
#[derive(Debug, Clone)]
pub enum SyncResult {
    /// Repository was successfully cloned
    Cloned { path: PathBuf },
    /// Repository was successfully pulled
    Pulled { path: PathBuf },
    /// Repository was skipped before any git invocation
    Skipped { path: PathBuf, reason: String },
    /// Operation failed; the local state is left as-is
    Failed { path: PathBuf, error: String },
}

/// Exit status and captured diagnostics of a finished git invocation
#[derive(Debug)]
struct GitOutcome {
    status: std::process::ExitStatus,
    stderr: String,
}

impl GitClient {
    /// Create a new git client with the given configuration
    pub fn new(config: &Config) -> Self {
        Self {
            program: PathBuf::from("git"),
            timeout: Duration::from_secs(config.sync.git_timeout),
        }
    }

    /// Create a client driving an alternative git program (used by tests)
    pub fn with_program(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Decide whether a destination needs a clone or a pull
    pub fn plan_action(path: &Path) -> SyncAction {
        if path.exists() {
            SyncAction::Pull
        } else {
            SyncAction::Clone
        }
    }

    /// Ensure `path` holds an up-to-date clone of `remote_url`.
    ///
    /// Failures are terminal but contained at this call: the error is logged
    /// and carried in the returned [`SyncResult`], never raised to the caller.
    pub async fn sync_repository(&self, remote_url: &str, path: &Path) -> SyncResult {
        let action = Self::plan_action(path);

        let outcome = match action {
            SyncAction::Clone => {
                info!("Cloning: {}", path.display());

                let mut command = AsyncCommand::new(&self.program);
                command.arg("clone").arg(remote_url).arg(path);
                self.run(command).await
            }
            SyncAction::Pull => {
                info!("Pulling: {}", path.display());

                let mut command = AsyncCommand::new(&self.program);
                command.arg("-C").arg(path).arg("pull");
                self.run(command).await
            }
        };

        match outcome {
            Ok(outcome) if outcome.status.success() => match action {
                SyncAction::Clone => SyncResult::Cloned {
                    path: path.to_path_buf(),
                },
                SyncAction::Pull => SyncResult::Pulled {
                    path: path.to_path_buf(),
                },
            },
            Ok(outcome) => {
                error!("Git error on {}: {}", path.display(), outcome.stderr);
                SyncResult::Failed {
                    path: path.to_path_buf(),
                    error: outcome.stderr,
                }
            }
            Err(e) => {
                let error = format!("{:#}", e);
                error!("Git error on {}: {}", path.display(), error);
                SyncResult::Failed {
                    path: path.to_path_buf(),
                    error,
                }
            }
        }
    }

    /// Run a prepared git command, discarding stdout and capturing stderr
    async fn run(&self, mut command: AsyncCommand) -> Result<GitOutcome> {
        command
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .with_context(|| format!("Git operation timed out after {:?}", self.timeout))?
            .context("Failed to execute git")?;

        Ok(GitOutcome {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_plan_action_missing_destination() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let dest = temp_dir.path().join("repo");

        assert_eq!(GitClient::plan_action(&dest), SyncAction::Clone);
    }

    #[test]
    fn test_plan_action_existing_destination() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let dest = temp_dir.path().join("repo");
        std::fs::create_dir_all(&dest).expect("Failed to create dest");

        assert_eq!(GitClient::plan_action(&dest), SyncAction::Pull);
    }

    #[tokio::test]
    async fn test_missing_git_binary_is_contained() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let dest = temp_dir.path().join("repo");

        let client =
            GitClient::with_program("/nonexistent/definitely-not-git", Duration::from_secs(5));
        let result = client
            .sync_repository("https://example.com/team/repo.git", &dest)
            .await;

        match result {
            SyncResult::Failed { path, error } => {
                assert_eq!(path, dest);
                assert!(!error.is_empty());
            }
            other => panic!("Expected Failed, got {:?}", other),
        }
    }
}
