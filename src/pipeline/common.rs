//! Command value object + async runner, and the preconditions shared by
//! both build pipelines (SPEC_FULL.md §4.5.1).

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use super::error::{PipelineError, Result};

/// `{argv, cwd, env, timeout}` — a subprocess invocation described as data,
/// so the heartbeat decorator can wrap the future it produces uniformly.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub argv: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(argv: Vec<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            argv,
            cwd: cwd.into(),
            env: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn summary(&self) -> String {
        self.argv.join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub status: i32,
}

/// Runs `spec`, surfacing a non-zero exit as [`PipelineError::CommandFailed`].
/// One log line per invocation (argv summary, exit code, duration); full
/// stdout/stderr only at debug level.
pub async fn run_command(spec: &CommandSpec) -> Result<CommandOutput> {
    let started = std::time::Instant::now();
    let (program, args) = spec
        .argv
        .split_first()
        .ok_or_else(|| PipelineError::CommandFailed {
            argv: String::new(),
            status: -1,
            stderr: "empty argv".to_string(),
        })?;

    let mut command = Command::new(program);
    command.args(args).current_dir(&spec.cwd);
    for (key, value) in &spec.env {
        command.env(key, value);
    }

    let run = command.output();
    let output = match spec.timeout {
        Some(timeout) => tokio::time::timeout(timeout, run)
            .await
            .map_err(|_| PipelineError::CommandTimedOut(spec.summary()))??,
        None => run.await?,
    };

    let duration = started.elapsed();
    let status = output.status.code().unwrap_or(-1);
    tracing::info!(
        argv = %spec.summary(),
        status,
        duration_ms = duration.as_millis() as u64,
        "external command completed"
    );
    debug!(stdout = %String::from_utf8_lossy(&output.stdout), "command stdout");
    debug!(stderr = %String::from_utf8_lossy(&output.stderr), "command stderr");

    if !output.status.success() {
        return Err(PipelineError::CommandFailed {
            argv: spec.summary(),
            status,
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    Ok(CommandOutput {
        stdout: output.stdout,
        stderr: output.stderr,
        status,
    })
}

/// Candidate environment variables and common OS locations checked, in
/// order, to resolve the Android SDK root.
const SDK_ENV_VARS: &[&str] = &["ANDROID_SDK_ROOT", "ANDROID_HOME"];

pub fn resolve_android_sdk_root() -> Result<PathBuf> {
    for var in SDK_ENV_VARS {
        if let Ok(value) = std::env::var(var) {
            let path = PathBuf::from(value);
            if path.is_dir() {
                return Ok(path);
            }
        }
    }

    let home = std::env::var("HOME").unwrap_or_default();
    let candidates = [
        format!("{home}/Android/Sdk"),
        format!("{home}/Library/Android/sdk"),
        "/opt/android-sdk".to_string(),
        "/usr/lib/android-sdk".to_string(),
    ];
    for candidate in candidates {
        let path = PathBuf::from(&candidate);
        if path.is_dir() {
            return Ok(path);
        }
    }

    Err(PipelineError::SdkNotFound)
}

/// Process env additions exposing the SDK, platform-tools, and
/// command-line tools to child subprocesses.
pub fn sdk_env(sdk_root: &Path) -> Vec<(String, String)> {
    let path = std::env::var("PATH").unwrap_or_default();
    let extra = format!(
        "{}/platform-tools:{}/cmdline-tools/latest/bin:{}",
        sdk_root.display(),
        sdk_root.display(),
        path
    );
    vec![
        ("ANDROID_SDK_ROOT".to_string(), sdk_root.display().to_string()),
        ("ANDROID_HOME".to_string(), sdk_root.display().to_string()),
        ("PATH".to_string(), extra),
    ]
}

/// Creates a clean workspace directory under `<builds>/<safeAppName>-build/`,
/// removing any prior directory with the same name.
pub fn prepare_workspace(builds_dir: &Path, safe_app_name: &str) -> Result<PathBuf> {
    let workspace = builds_dir.join(format!("{safe_app_name}-build"));
    if workspace.exists() {
        std::fs::remove_dir_all(&workspace)?;
    }
    std::fs::create_dir_all(&workspace)?;
    Ok(workspace)
}

/// The suffixed artifact name shared by both pipelines: `<appName>--<taskId>.apk`
/// (SPEC_FULL.md §3 Open Questions — unifies what upstream treated as two
/// different naming schemes per pipeline).
pub fn artifact_path(output_dir: &Path, app_name: &str, task_id: &str) -> PathBuf {
    output_dir.join(format!("{app_name}--{task_id}.apk"))
}

pub fn warn_if_sdk_missing() {
    if resolve_android_sdk_root().is_err() {
        warn!("Android SDK root not resolved from any known location");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn run_command_captures_stdout() {
        let spec = CommandSpec::new(
            vec!["echo".to_string(), "hello".to_string()],
            std::env::temp_dir(),
        );
        let output = run_command(&spec).await.unwrap();
        assert_eq!(output.status, 0);
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }

    #[tokio::test]
    async fn run_command_surfaces_nonzero_exit() {
        let spec = CommandSpec::new(
            vec!["sh".to_string(), "-c".to_string(), "exit 3".to_string()],
            std::env::temp_dir(),
        );
        let err = run_command(&spec).await.unwrap_err();
        assert!(matches!(err, PipelineError::CommandFailed { status: 3, .. }));
    }

    #[test]
    fn prepare_workspace_removes_prior_directory() {
        let temp = TempDir::new().unwrap();
        let stale = temp.path().join("App-build");
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("stale.txt"), b"old").unwrap();

        let workspace = prepare_workspace(temp.path(), "App").unwrap();
        assert!(workspace.is_dir());
        assert!(!workspace.join("stale.txt").exists());
    }
}
