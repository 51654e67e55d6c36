//! kubectl-backed cluster client.
//!
//! Every operation shells out to kubectl with the configured context,
//! namespace and global flags. Command output is streamed line by line to
//! the caller's writer, stdout and stderr alike, with the bytes passed
//! through untouched.

use std::io::Write;
use std::process::Stdio;

use async_trait::async_trait;
use kdeploy_manifest::{ManifestList, Workload};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::client::{cancelled, CancelSignal, ClusterClient, ClusterVersion};
use crate::config::KubectlOptions;
use crate::error::{RunnerError, RunnerResult};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionOutput {
    server_version: Option<ClusterVersion>,
}

/// Cluster client driving the kubectl CLI.
pub struct KubectlCli {
    options: KubectlOptions,
    version: OnceCell<ClusterVersion>,
}

impl KubectlCli {
    pub fn new(options: KubectlOptions) -> Self {
        Self {
            options,
            version: OnceCell::new(),
        }
    }

    pub fn options(&self) -> &KubectlOptions {
        &self.options
    }

    /// Build the full argument list for a kubectl command.
    pub fn command_args(&self, namespace: Option<&str>, command: &[&str], flags: &[String]) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(context) = &self.options.context {
            args.push(format!("--context={}", context));
        }
        if let Some(namespace) = namespace.or(self.options.namespace.as_deref()) {
            args.push(format!("--namespace={}", namespace));
        }
        args.extend(self.options.flags.global.iter().cloned());
        args.extend(command.iter().map(|s| s.to_string()));
        args.extend(flags.iter().cloned());

        args
    }

    /// Format command for logging.
    fn format_command(&self, args: &[String]) -> String {
        let mut cmd = self.options.binary.clone();
        for arg in args {
            if arg.contains(' ') {
                cmd.push_str(&format!(" '{}'", arg));
            } else {
                cmd.push_str(&format!(" {}", arg));
            }
        }
        cmd
    }

    async fn fetch_version(&self) -> RunnerResult<ClusterVersion> {
        let args = self.command_args(None, &["version", "--output=json"], &[]);
        if self.options.dry_run {
            info!("[DRY-RUN] Would execute: {}", self.format_command(&args));
            return Ok(ClusterVersion::default());
        }

        debug!("Executing: {}", self.format_command(&args));
        let output = Command::new(&self.options.binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| RunnerError::ExecutionFailed(e.to_string()))?;

        // kubectl exits non-zero when the server is unreachable but still
        // prints the client half of the document.
        let parsed: VersionOutput = serde_json::from_slice(&output.stdout)?;
        parsed.server_version.ok_or_else(|| {
            RunnerError::VersionUnavailable(String::from_utf8_lossy(&output.stderr).trim().to_string())
        })
    }

    /// Run kubectl, streaming combined output to `output`.
    async fn run_streaming(
        &self,
        args: Vec<String>,
        stdin: Option<Vec<u8>>,
        output: &mut (dyn Write + Send),
        mut cancel: CancelSignal,
    ) -> RunnerResult<()> {
        let cmd_str = self.format_command(&args);
        if self.options.dry_run {
            info!("[DRY-RUN] Would execute: {}", cmd_str);
            return Ok(());
        }
        debug!("Executing: {}", cmd_str);

        let mut child = Command::new(&self.options.binary)
            .args(&args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                RunnerError::ExecutionFailed(format!("Failed to spawn {}: {}", self.options.binary, e))
            })?;

        if let Some(input) = stdin {
            let mut pipe = child
                .stdin
                .take()
                .ok_or_else(|| RunnerError::ExecutionFailed("stdin not captured".to_string()))?;
            tokio::spawn(async move {
                if let Err(e) = pipe.write_all(&input).await {
                    warn!("Failed to write manifests to kubectl: {}", e);
                }
            });
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::ExecutionFailed("stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RunnerError::ExecutionFailed("stderr not captured".to_string()))?;

        let mut stdout = BufReader::new(stdout).split(b'\n');
        let mut stderr = BufReader::new(stderr).split(b'\n');
        let (mut stdout_open, mut stderr_open) = (true, true);

        while stdout_open || stderr_open {
            tokio::select! {
                line = stdout.next_segment(), if stdout_open => match line? {
                    Some(line) => write_line(output, line)?,
                    None => stdout_open = false,
                },
                line = stderr.next_segment(), if stderr_open => match line? {
                    Some(line) => write_line(output, line)?,
                    None => stderr_open = false,
                },
                _ = cancelled(&mut cancel) => {
                    warn!("Cancelling: {}", cmd_str);
                    child.kill().await?;
                    return Err(RunnerError::Cancelled(cmd_str));
                }
            }
        }

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancelled(&mut cancel) => {
                child.kill().await?;
                return Err(RunnerError::Cancelled(cmd_str));
            }
        };

        if !status.success() {
            return Err(RunnerError::CommandFailed {
                command: cmd_str,
                code: status.code().unwrap_or(-1),
            });
        }
        Ok(())
    }
}

/// Write one output line as a single chunk, so prefixing writers see it whole.
fn write_line(output: &mut (dyn Write + Send), mut line: Vec<u8>) -> std::io::Result<()> {
    line.push(b'\n');
    output.write_all(&line)
}

#[async_trait]
impl ClusterClient for KubectlCli {
    /// Never fails: an unreachable cluster is remembered as version 0.0.
    async fn server_version(&self) -> RunnerResult<ClusterVersion> {
        let version = self
            .version
            .get_or_init(|| async {
                self.fetch_version().await.unwrap_or_else(|e| {
                    warn!("Unable to determine cluster version: {}", e);
                    ClusterVersion::default()
                })
            })
            .await;
        Ok(version.clone())
    }

    async fn rollout_status(
        &self,
        workload: &Workload,
        output: &mut (dyn Write + Send),
        cancel: CancelSignal,
    ) -> RunnerResult<()> {
        let args = self.command_args(
            workload.namespace(),
            &["rollout", "status", workload.kind(), workload.name()],
            &[],
        );
        self.run_streaming(args, None, output, cancel).await
    }

    async fn apply(
        &self,
        manifests: &ManifestList,
        output: &mut (dyn Write + Send),
        cancel: CancelSignal,
    ) -> RunnerResult<()> {
        if manifests.is_empty() {
            debug!("No manifests to apply");
            return Ok(());
        }
        let args = self.command_args(None, &["apply", "-f", "-"], &self.options.flags.apply);
        info!("Applying {} manifests", manifests.len());
        self.run_streaming(args, Some(manifests.join()), output, cancel).await
    }
}
