//! Collaborators that reach outside the process.
//!
//! Remote command execution and remote file sync go through [`RemoteExec`],
//! local archive tools through [`Shell`]. Neither returns an error: every
//! failure is folded into a [`CommandOutput`] with a non-zero code, and a
//! timeout is always reported as [`TIMEOUT_EXIT_CODE`].

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{TIMEOUT_EXIT_CODE, TRANSPORT_FAILURE_EXIT_CODE};

/// SSH implementation of [`RemoteExec`]
pub mod ssh;

/// Local process implementation of [`Shell`]
pub mod local;

pub use local::LocalShell;
pub use ssh::SshTransport;

/// What to run on the remote side.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCommand {
    /// A command line run as is
    Inline(String),
    /// A local script file streamed to a remote shell
    Script(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecRequest {
    pub address: String,
    pub command: RemoteCommand,
    pub env: BTreeMap<String, String>,
    pub timeout: Duration,
    /// Local file fed to the command's stdin (inline commands only)
    pub input: Option<PathBuf>,
    /// Local file receiving stdout instead of capturing it
    pub output: Option<PathBuf>,
}

impl ExecRequest {
    pub fn inline(address: &str, command: impl Into<String>, timeout: Duration) -> Self {
        Self::new(address, RemoteCommand::Inline(command.into()), timeout)
    }

    pub fn script(address: &str, script: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self::new(address, RemoteCommand::Script(script.into()), timeout)
    }

    fn new(address: &str, command: RemoteCommand, timeout: Duration) -> Self {
        Self {
            address: address.to_string(),
            command,
            env: BTreeMap::new(),
            timeout,
            input: None,
            output: None,
        }
    }

    pub fn with_env(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env = env.clone();
        self
    }

    pub fn with_input(mut self, input: impl Into<PathBuf>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }
}

/// Copy remote paths (files or directories) under a local destination
#[derive(Debug, Clone, PartialEq)]
pub struct SyncRequest {
    pub address: String,
    pub sources: Vec<String>,
    pub destination: PathBuf,
    pub timeout: Duration,
}

/// Outcome of a remote or local call
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            code: 0,
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            code,
        }
    }

    pub fn timed_out(stderr: impl Into<String>) -> Self {
        Self::failure(TIMEOUT_EXIT_CODE, stderr)
    }

    pub fn transport_failure(stderr: impl Into<String>) -> Self {
        Self::failure(TRANSPORT_FAILURE_EXIT_CODE, stderr)
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    pub fn is_timeout(&self) -> bool {
        self.code == TIMEOUT_EXIT_CODE
    }
}

/// Remote command execution and file sync against one node address
#[cfg_attr(test, mockall::automock)]
pub trait RemoteExec: Send + Sync {
    fn exec(&self, request: &ExecRequest) -> CommandOutput;
    fn sync(&self, request: &SyncRequest) -> CommandOutput;
}

/// Local command runner used for archive tools
#[cfg_attr(test, mockall::automock)]
pub trait Shell: Send + Sync {
    fn run(&self, command: &str, timeout: Duration) -> CommandOutput;
}

/// Quote a value for a POSIX shell command line
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
