use std::fs;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use ssh2::{ErrorCode, Session, Sftp};

use crate::config::SshConf;
use crate::constants::{
    ERROR_AUTHENTICATION_FAILED, ERROR_FAILED_TO_CREATE_SESSION, ERROR_FAILED_TO_CREATE_SFTP,
};
use crate::transport::{shell_quote, CommandOutput, ExecRequest, RemoteCommand, RemoteExec, SyncRequest};

// libssh2 session error raised when a blocking call exceeds the session timeout
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;

// Exit code reported when some of the requested paths could not be copied
const PARTIAL_TRANSFER_EXIT_CODE: i32 = 23;

/// Runs commands and copies files over SSH.
///
/// Every call opens its own session, so a transport is freely shared between
/// worker threads. The request timeout bounds the TCP connect and each
/// blocking SSH operation.
#[derive(Clone, Debug)]
pub struct SshTransport {
    config: SshConf,
}

impl SshTransport {
    pub fn new(config: SshConf) -> Self {
        Self { config }
    }

    /// Create a new authenticated SSH session
    fn create_session(&self, address: &str, timeout: Duration) -> Result<Session> {
        let socket = (address, self.config.port)
            .to_socket_addrs()
            .context(format!("Failed to resolve {}:{}", address, self.config.port))?
            .next()
            .ok_or_else(|| anyhow!("No address found for {}", address))?;

        let tcp = TcpStream::connect_timeout(&socket, timeout)
            .context(format!("Failed to connect to {}", socket))?;
        tcp.set_read_timeout(Some(timeout))
            .context("Failed to set read timeout")?;
        tcp.set_write_timeout(Some(timeout))
            .context("Failed to set write timeout")?;

        let mut session = Session::new().context(ERROR_FAILED_TO_CREATE_SESSION)?;
        session.set_tcp_stream(tcp);
        session.set_timeout(timeout.as_millis().min(u32::MAX as u128) as u32);
        session.handshake()
            .context("Failed to perform SSH handshake")?;

        match &self.config.private_key {
            Some(key) => session
                .userauth_pubkey_file(&self.config.user, None, key, None)
                .context(format!("Failed to authenticate with private key: {}", key.display()))?,
            None => session
                .userauth_agent(&self.config.user)
                .context("Failed to authenticate with SSH agent")?,
        }

        if !session.authenticated() {
            return Err(anyhow!(ERROR_AUTHENTICATION_FAILED));
        }

        Ok(session)
    }

    /// Build the remote command line with the request environment in front
    fn command_line(request: &ExecRequest) -> String {
        let mut line = String::new();
        for (key, value) in &request.env {
            line.push_str(&format!("{}={} ", key, shell_quote(value)));
        }
        match &request.command {
            RemoteCommand::Inline(command) => line.push_str(command),
            RemoteCommand::Script(_) => line.push_str("bash -s"),
        }
        line
    }

    fn run_exec(&self, request: &ExecRequest) -> Result<CommandOutput> {
        let session = self.create_session(&request.address, request.timeout)?;
        let mut channel = session.channel_session()
            .context("Failed to open SSH channel")?;

        let command_line = Self::command_line(request);
        debug!("ssh {}: {}", request.address, command_line);
        channel.exec(&command_line)
            .context("Failed to start remote command")?;

        match &request.command {
            RemoteCommand::Script(path) => {
                let script = fs::read(path)
                    .context(format!("Failed to read script {}", path.display()))?;
                channel.write_all(&script)
                    .context("Failed to send script")?;
            }
            RemoteCommand::Inline(_) => {
                if let Some(input) = &request.input {
                    let mut file = fs::File::open(input)
                        .context(format!("Failed to open input file {}", input.display()))?;
                    io::copy(&mut file, &mut channel)
                        .context("Failed to send input")?;
                }
            }
        }
        channel.send_eof().context("Failed to close remote stdin")?;

        let mut stdout = Vec::new();
        match &request.output {
            Some(path) => {
                let mut file = fs::File::create(path)
                    .context(format!("Failed to create output file {}", path.display()))?;
                io::copy(&mut channel, &mut file)
                    .context("Failed to receive output")?;
            }
            None => {
                channel.read_to_end(&mut stdout)
                    .context("Failed to read remote stdout")?;
            }
        }

        let mut stderr = Vec::new();
        channel.stderr().read_to_end(&mut stderr)
            .context("Failed to read remote stderr")?;

        channel.wait_close().context("Failed to close SSH channel")?;
        let code = channel.exit_status().context("Failed to read exit status")?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            code,
        })
    }

    fn run_sync(&self, request: &SyncRequest) -> Result<CommandOutput> {
        let session = self.create_session(&request.address, request.timeout)?;
        let sftp = session.sftp().context(ERROR_FAILED_TO_CREATE_SFTP)?;

        fs::create_dir_all(&request.destination)
            .context(format!("Failed to create {}", request.destination.display()))?;

        let mut failures = Vec::new();
        for source in &request.sources {
            if let Err(e) = download(&sftp, Path::new(source), &request.destination) {
                if is_timeout(&e) {
                    return Err(e);
                }
                warn!("sync {}: {}: {:#}", request.address, source, e);
                failures.push(format!("{}: {:#}", source, e));
            }
        }

        if failures.is_empty() {
            Ok(CommandOutput::success(String::new()))
        } else {
            Ok(CommandOutput::failure(PARTIAL_TRANSFER_EXIT_CODE, failures.join("\n")))
        }
    }
}

impl RemoteExec for SshTransport {
    fn exec(&self, request: &ExecRequest) -> CommandOutput {
        self.run_exec(request).unwrap_or_else(|e| failure_output(&request.address, e))
    }

    fn sync(&self, request: &SyncRequest) -> CommandOutput {
        self.run_sync(request).unwrap_or_else(|e| failure_output(&request.address, e))
    }
}

fn failure_output(address: &str, error: anyhow::Error) -> CommandOutput {
    let message = format!("{}: {:#}", address, error);
    if is_timeout(&error) {
        CommandOutput::timed_out(message)
    } else {
        CommandOutput::transport_failure(message)
    }
}

/// Copy a remote file or directory tree, keeping its absolute layout
fn download(sftp: &Sftp, remote: &Path, destination: &Path) -> Result<()> {
    let stat = sftp.stat(remote)
        .context(format!("Failed to stat {}", remote.display()))?;
    let local = destination.join(remote.strip_prefix("/").unwrap_or(remote));

    if stat.is_dir() {
        fs::create_dir_all(&local)
            .context(format!("Failed to create {}", local.display()))?;
        for (child, child_stat) in sftp.readdir(remote)
            .context(format!("Failed to list {}", remote.display()))?
        {
            if child_stat.file_type().is_symlink() {
                debug!("skipping symlink {}", child.display());
                continue;
            }
            download(sftp, &child, destination)?;
        }
        return Ok(());
    }

    if let Some(parent) = local.parent() {
        fs::create_dir_all(parent)
            .context(format!("Failed to create {}", parent.display()))?;
    }
    let mut remote_file = sftp.open(remote)
        .context(format!("Failed to open {}", remote.display()))?;
    let mut local_file = fs::File::create(&local)
        .context(format!("Failed to create {}", local.display()))?;
    io::copy(&mut remote_file, &mut local_file)
        .context(format!("Failed to copy {}", remote.display()))?;
    Ok(())
}

/// True when any cause in the chain is an SSH or socket timeout
fn is_timeout(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        if let Some(e) = cause.downcast_ref::<ssh2::Error>() {
            return e.code() == ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT);
        }
        if let Some(e) = cause.downcast_ref::<io::Error>() {
            return matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock);
        }
        false
    })
}
