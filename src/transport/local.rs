use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use log::debug;
use tokio::process::Command;
use tokio::runtime::{Builder, Runtime};

use crate::constants::TRANSPORT_FAILURE_EXIT_CODE;
use crate::transport::{CommandOutput, Shell};

/// Runs local commands through `sh -c` with a hard timeout.
///
/// The child is killed when the timeout fires.
pub struct LocalShell {
    runtime: Runtime,
}

impl LocalShell {
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .context("Failed to create Tokio runtime")?;
        Ok(Self { runtime })
    }

    async fn run_async(command: &str, timeout: Duration) -> CommandOutput {
        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(timeout, child).await {
            Err(_) => CommandOutput::timed_out(format!("command timed out after {:?}: {}", timeout, command)),
            Ok(Err(e)) => CommandOutput::failure(
                TRANSPORT_FAILURE_EXIT_CODE,
                format!("failed to execute {}: {}", command, e),
            ),
            Ok(Ok(output)) => CommandOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                code: output.status.code().unwrap_or(-1),
            },
        }
    }
}

impl Shell for LocalShell {
    fn run(&self, command: &str, timeout: Duration) -> CommandOutput {
        debug!("local: {}", command);
        self.runtime.block_on(Self::run_async(command, timeout))
    }
}
