//! Packaging-tool execution and artifact verification.

use super::{
    artifact::{artifact_size, calculate_sha256, expected_artifact},
    command::PackagerCommand,
    error::{Error, Result},
    platform::Platform,
    request::BuildRequest,
};
use crate::cli::OutputManager;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// A successfully produced and verified artifact.
#[derive(Debug, Clone)]
pub struct BuildResult {
    /// Executable file or output directory
    pub artifact: PathBuf,
    /// Size in bytes (sum over all files for directory builds)
    pub size: u64,
    /// Wall-clock duration of the packaging run
    pub elapsed: Duration,
    pub timestamp: DateTime<Local>,
    pub platform: Platform,
    pub sha256: String,
}

impl BuildResult {
    /// Size in megabytes.
    pub fn size_mb(&self) -> f64 {
        self.size as f64 / (1024.0 * 1024.0)
    }
}

/// Exit status and captured stderr of a finished process.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stderr: String,
}

/// Runs the packaging tool inside a working directory.
#[derive(Debug, Clone)]
pub struct BuildRunner {
    working_dir: PathBuf,
    platform: Platform,
}

impl BuildRunner {
    pub fn new(working_dir: impl Into<PathBuf>, platform: Platform) -> Self {
        Self {
            working_dir: working_dir.into(),
            platform,
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Run `command` and verify the artifact it should have produced.
    ///
    /// # Errors
    ///
    /// - [`Error::BuildFailed`] on a non-zero exit, carrying captured stderr
    /// - [`Error::ArtifactMissing`] when the exit code is zero but the
    ///   expected artifact does not exist
    pub async fn run(
        &self,
        command: &PackagerCommand,
        request: &BuildRequest,
        output: &OutputManager,
    ) -> Result<BuildResult> {
        let started = Instant::now();
        let finished = self.execute(command, output).await?;
        let elapsed = started.elapsed();

        if !finished.status.success() {
            return Err(Error::BuildFailed {
                code: finished.status.code(),
                stderr: finished.stderr,
            });
        }

        let artifact = expected_artifact(&self.working_dir, request, self.platform);
        if !tokio::fs::try_exists(&artifact).await.unwrap_or(false) {
            return Err(Error::ArtifactMissing { path: artifact });
        }

        let size = artifact_size(&artifact).await?;
        let sha256 = calculate_sha256(&artifact).await?;
        log::debug!(
            "Artifact {} ({} bytes, sha256 {}) built in {:.2?}",
            artifact.display(),
            size,
            sha256,
            elapsed
        );

        Ok(BuildResult {
            artifact,
            size,
            elapsed,
            timestamp: Local::now(),
            platform: self.platform,
            sha256,
        })
    }

    /// Spawn the command, stream stdout, capture stderr, wait for exit.
    ///
    /// The child is killed if the returned future is dropped.
    pub async fn execute(
        &self,
        command: &PackagerCommand,
        output: &OutputManager,
    ) -> Result<ProcessOutput> {
        log::info!("Running: {}", command.display());

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|error| Error::CommandFailed {
                command: command.program.display().to_string(),
                error,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Drain both pipes together so neither can fill up and stall the child
        let (_, stderr_lines) = tokio::join!(
            async {
                if let Some(stdout) = stdout {
                    drain_lines(stdout, |line| output.indent(&line)).await;
                }
            },
            async {
                let mut captured = Vec::new();
                if let Some(stderr) = stderr {
                    drain_lines(stderr, |line| {
                        output.verbose(&line);
                        captured.push(line);
                    })
                    .await;
                }
                captured
            }
        );

        let status = child.wait().await.map_err(|error| Error::CommandFailed {
            command: command.program.display().to_string(),
            error,
        })?;

        Ok(ProcessOutput {
            status,
            stderr: stderr_lines.join("\n"),
        })
    }
}

/// Read `reader` to EOF line by line, decoding lossily.
///
/// Output in a non-UTF-8 codepage must not stop the drain: closing the pipe
/// early would kill the child with SIGPIPE.
async fn drain_lines<R>(reader: R, mut on_line: impl FnMut(String))
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                on_line(line.trim_end_matches(['\n', '\r']).to_string());
            }
            Err(e) => {
                log::debug!("Stopped reading packaging tool output: {e}");
                break;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::builder::request::PackagingMode;
    use std::os::unix::fs::PermissionsExt;

    fn fake_tool(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-packager");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn command(program: PathBuf) -> PackagerCommand {
        PackagerCommand {
            program,
            args: vec!["--name".into(), "app".into()],
            skipped: Vec::new(),
        }
    }

    fn quiet() -> OutputManager {
        OutputManager::new(false, true)
    }

    #[tokio::test]
    async fn non_zero_exit_is_build_failed() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_tool(dir.path(), "echo 'bad hook' >&2\nexit 3");
        let request = BuildRequest::builder("app.py").build().unwrap();

        let err = BuildRunner::new(dir.path(), Platform::Linux)
            .run(&command(tool), &request, &quiet())
            .await
            .unwrap_err();

        match err {
            Error::BuildFailed { code, stderr } => {
                assert_eq!(code, Some(3));
                assert!(stderr.contains("bad hook"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn zero_exit_without_artifact_is_artifact_missing() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_tool(dir.path(), "exit 0");
        let request = BuildRequest::builder("app.py").build().unwrap();

        let err = BuildRunner::new(dir.path(), Platform::Linux)
            .run(&command(tool), &request, &quiet())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ArtifactMissing { .. }));
    }

    #[tokio::test]
    async fn produced_artifact_is_measured() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_tool(dir.path(), "mkdir -p dist\nprintf 'binary' > dist/app");
        let request = BuildRequest::builder("app.py").build().unwrap();

        let result = BuildRunner::new(dir.path(), Platform::Linux)
            .run(&command(tool), &request, &quiet())
            .await
            .unwrap();

        assert_eq!(result.artifact, dir.path().join("dist").join("app"));
        assert_eq!(result.size, 6);
        assert_eq!(result.platform, Platform::Linux);
        assert_eq!(result.sha256.len(), 64);
    }

    #[tokio::test]
    async fn directory_artifact_is_measured() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_tool(
            dir.path(),
            "mkdir -p dist/app/_internal\nprintf '1234' > dist/app/app\nprintf '56' > dist/app/_internal/lib",
        );
        let request = BuildRequest::builder("app.py")
            .mode(PackagingMode::Directory)
            .build()
            .unwrap();

        let result = BuildRunner::new(dir.path(), Platform::Linux)
            .run(&command(tool), &request, &quiet())
            .await
            .unwrap();
        assert_eq!(result.size, 6);
    }

    #[tokio::test]
    async fn unknown_program_is_command_failed() {
        let dir = tempfile::tempdir().unwrap();
        let request = BuildRequest::builder("app.py").build().unwrap();
        let err = BuildRunner::new(dir.path(), Platform::Linux)
            .run(&command(dir.path().join("missing-tool")), &request, &quiet())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn non_utf8_output_does_not_stop_the_drain() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_tool(
            dir.path(),
            "printf 'warn \\377\\n' >&2\nsleep 0.3\ni=0\nwhile [ $i -lt 200 ]; do echo \"line $i\" >&2; i=$((i+1)); done\nmkdir -p dist\nprintf 'binary' > dist/app",
        );
        let request = BuildRequest::builder("app.py").build().unwrap();
        let runner = BuildRunner::new(dir.path(), Platform::Linux);

        let finished = runner.execute(&command(tool.clone()), &quiet()).await.unwrap();
        assert!(finished.status.success());
        assert!(finished.stderr.starts_with("warn \u{FFFD}"));
        assert!(finished.stderr.contains("line 199"));

        let result = runner.run(&command(tool), &request, &quiet()).await.unwrap();
        assert_eq!(result.size, 6);
    }
}
