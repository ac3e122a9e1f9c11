//! # Job Actions
//!
//! The capability executors use to perform a job's external effect. The
//! scheduler only sees success or failure; how an effect is carried out is an
//! implementation binding behind [`JobAction`].

use async_trait::async_trait;
use std::path::Path;
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

use super::types::JobSpec;
use crate::config::ActionsConfig;
use crate::constants::DOWNLOAD_TEMPORARY_SUFFIX;
use crate::error::ActionError;

/// Diagnostic output of a successful action
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionReport {
    pub output: String,
}

impl ActionReport {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
        }
    }
}

/// Performs the external effect of a job. Runs exactly once per dispatched
/// job and never retries internally.
#[async_trait]
pub trait JobAction: Send + Sync + 'static {
    async fn run(&self, spec: &JobSpec) -> Result<ActionReport, ActionError>;
}

/// [`JobAction`] backed by external programs
#[derive(Debug, Clone)]
pub struct CommandJobAction {
    config: ActionsConfig,
}

impl CommandJobAction {
    pub fn new(config: ActionsConfig) -> Self {
        Self { config }
    }

    /// Arguments for the downloader. It writes to `<target>.temporary` and
    /// renames into place only once the download finished.
    pub fn download_args(locator: &str, target: &Path) -> Vec<String> {
        let temporary = format!("{}.{}", target.display(), DOWNLOAD_TEMPORARY_SUFFIX);
        vec![
            locator.to_string(),
            "--max-downloads=1".to_string(),
            "-o".to_string(),
            temporary,
            "--exec".to_string(),
            format!("mv {{}} {}", target.display()),
        ]
    }

    pub fn transcode_args(&self, source: &Path, target: &Path) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            source.display().to_string(),
        ];
        args.extend(self.config.transcode_args.iter().cloned());
        args.push(target.display().to_string());
        args
    }

    async fn run_program(&self, program: &str, args: Vec<String>) -> Result<ActionReport, ActionError> {
        debug!(program = program, args = ?args, "Starting external program");

        let output = Command::new(program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ActionError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let combined = combined_output(&output);
        debug!(program = program, output = %combined, "Command output");

        if !output.status.success() {
            return Err(ActionError::NonZeroExit {
                program: program.to_string(),
                status: output.status.to_string(),
                output: combined,
            });
        }
        Ok(ActionReport::new(combined))
    }

    async fn remove_file(&self, path: &Path) -> Result<ActionReport, ActionError> {
        debug!(path = %path.display(), "Removing file");
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(ActionReport::new(format!("removed {}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(ActionReport::new(format!("{} already absent", path.display())))
            }
            Err(source) => Err(ActionError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

#[async_trait]
impl JobAction for CommandJobAction {
    async fn run(&self, spec: &JobSpec) -> Result<ActionReport, ActionError> {
        match spec {
            JobSpec::Download { locator, target } => {
                let args = Self::download_args(locator.as_str(), target);
                self.run_program(&self.config.downloader, args).await
            }
            JobSpec::Transcode { source, target } => {
                let args = self.transcode_args(source, target);
                self.run_program(&self.config.transcoder, args).await
            }
            JobSpec::DeleteFile { path } => self.remove_file(path).await,
        }
    }
}

fn combined_output(output: &Output) -> String {
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_download_args() {
        let args = CommandJobAction::download_args("https://example.com/v", Path::new("/tmp/ledweb1"));
        assert_eq!(
            args,
            vec![
                "https://example.com/v",
                "--max-downloads=1",
                "-o",
                "/tmp/ledweb1.temporary",
                "--exec",
                "mv {} /tmp/ledweb1",
            ]
        );
    }

    #[test]
    fn test_transcode_args_wrap_configured_filters() {
        let action = CommandJobAction::new(ActionsConfig::default());
        let args = action.transcode_args(Path::new("/tmp/in"), Path::new("/data/out.webm"));
        assert_eq!(&args[..3], &["-y", "-i", "/tmp/in"]);
        assert_eq!(args.last().map(String::as_str), Some("/data/out.webm"));
        assert!(args.contains(&"libvpx".to_string()));
    }

    #[tokio::test]
    async fn test_delete_file_action() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scratch");
        std::fs::write(&path, b"data").unwrap();

        let action = CommandJobAction::new(ActionsConfig::default());
        let spec = JobSpec::DeleteFile { path: path.clone() };

        assert!(action.run(&spec).await.is_ok());
        assert!(!path.exists());
        // Removing an absent file still succeeds
        assert!(action.run(&spec).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_program_is_a_spawn_error() {
        let config = ActionsConfig {
            transcoder: "webled-definitely-not-installed".to_string(),
            ..ActionsConfig::default()
        };
        let action = CommandJobAction::new(config);
        let spec = JobSpec::Transcode {
            source: PathBuf::from("/tmp/in"),
            target: PathBuf::from("/tmp/out"),
        };

        let result = action.run(&spec).await;
        assert!(matches!(result, Err(ActionError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_a_failure() {
        let config = ActionsConfig {
            transcoder: "false".to_string(),
            transcode_args: vec![],
            ..ActionsConfig::default()
        };
        let action = CommandJobAction::new(config);
        let spec = JobSpec::Transcode {
            source: PathBuf::from("/tmp/in"),
            target: PathBuf::from("/tmp/out"),
        };

        let result = action.run(&spec).await;
        assert!(matches!(result, Err(ActionError::NonZeroExit { .. })));
    }
}
