//! Secure-copy transfers with a fixed attempt budget.
//!
//! Every transfer is a fresh `scp -B <source> <destination>` invocation.
//! `-B` (batch mode) makes scp fail instead of prompting for a password or
//! passphrase, so a missing key shows up as a non-zero exit.
//!
//! # Retry policy
//!
//! - Non-zero exit: retried immediately, up to the attempt budget (3 by default).
//! - The program cannot be launched at all: fails fast with
//!   [`TransferError::LaunchFailed`]. Retrying a missing binary cannot succeed.

use std::io;
use std::path::PathBuf;
use std::process::Command;
use std::time::Instant;

use thiserror::Error;

use super::origin::RemoteOrigin;

/// Destination used to capture downloaded bytes on our own stdout pipe.
pub const CAPTURE_DESTINATION: &str = "/dev/stdout";

/// Errors from a transfer.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Transfer {source_arg} -> {destination} failed after {attempts} attempts: {detail}")]
    Failed {
        source_arg: String,
        destination: String,
        attempts: u32,
        detail: String,
    },

    #[error("Failed to execute {program}: {source}")]
    LaunchFailed {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// What to move and in which direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferDirective {
    /// Pull `origin` into memory.
    Download { origin: RemoteOrigin },
    /// Push `local_path` to `origin`.
    Upload {
        local_path: PathBuf,
        origin: RemoteOrigin,
    },
}

impl TransferDirective {
    pub fn download(origin: RemoteOrigin) -> Self {
        Self::Download { origin }
    }

    pub fn upload(local_path: impl Into<PathBuf>, origin: RemoteOrigin) -> Self {
        Self::Upload {
            local_path: local_path.into(),
            origin,
        }
    }

    pub fn origin(&self) -> &RemoteOrigin {
        match self {
            Self::Download { origin } | Self::Upload { origin, .. } => origin,
        }
    }

    /// First positional argument for scp.
    pub fn source(&self) -> String {
        match self {
            Self::Download { origin } => origin.spec(),
            Self::Upload { local_path, .. } => local_path.to_string_lossy().into_owned(),
        }
    }

    /// Second positional argument for scp.
    pub fn destination(&self) -> String {
        match self {
            Self::Download { .. } => CAPTURE_DESTINATION.to_string(),
            Self::Upload { origin, .. } => origin.spec(),
        }
    }
}

/// Outcome of one attempt that managed to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    /// Exit status 0, with whatever the process wrote to stdout.
    Succeeded(Vec<u8>),
    /// Non-zero exit (or killed by a signal when `code` is `None`).
    Failed { code: Option<i32>, stderr: String },
}

/// Runs a single transfer attempt.
///
/// `Err` means the transfer could not be started at all.
pub trait Transport: Send + Sync {
    /// Name of the external program, for error messages.
    fn program(&self) -> &str;

    fn attempt(&self, directive: &TransferDirective) -> io::Result<Attempt>;
}

/// [`Transport`] backed by the `scp` executable.
#[derive(Debug, Clone)]
pub struct ScpTransport {
    program: String,
}

impl ScpTransport {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for ScpTransport {
    fn default() -> Self {
        Self::new("scp")
    }
}

impl Transport for ScpTransport {
    fn program(&self) -> &str {
        &self.program
    }

    fn attempt(&self, directive: &TransferDirective) -> io::Result<Attempt> {
        let output = Command::new(&self.program)
            .arg("-B")
            .arg(directive.source())
            .arg(directive.destination())
            .output()?;

        if output.status.success() {
            Ok(Attempt::Succeeded(output.stdout))
        } else {
            Ok(Attempt::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

/// Run `directive` up to `max_attempts` times, stopping at the first success.
///
/// Returns the captured stdout of the successful attempt.
pub fn transfer_with_retry(
    transport: &dyn Transport,
    directive: &TransferDirective,
    max_attempts: u32,
) -> Result<Vec<u8>, TransferError> {
    let max_attempts = max_attempts.max(1);
    let source = directive.source();
    let destination = directive.destination();
    let start = Instant::now();
    let mut detail = String::new();

    for attempt in 1..=max_attempts {
        tracing::debug!(
            program = transport.program(),
            source = %source,
            destination = %destination,
            attempt,
            "starting transfer"
        );

        let result = transport
            .attempt(directive)
            .map_err(|e| TransferError::LaunchFailed {
                program: transport.program().to_string(),
                source: e,
            })?;

        match result {
            Attempt::Succeeded(stdout) => {
                tracing::info!(
                    source = %source,
                    destination = %destination,
                    attempt,
                    bytes = stdout.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "transfer completed"
                );
                return Ok(stdout);
            }
            Attempt::Failed { code, stderr } => {
                detail = describe_failure(code, &stderr);
                tracing::warn!(
                    source = %source,
                    destination = %destination,
                    attempt,
                    max_attempts,
                    error = %detail,
                    "transfer attempt failed"
                );
            }
        }
    }

    Err(TransferError::Failed {
        source_arg: source,
        destination,
        attempts: max_attempts,
        detail,
    })
}

fn describe_failure(code: Option<i32>, stderr: &str) -> String {
    let status = match code {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    };
    if stderr.is_empty() {
        status
    } else {
        format!("{status}: {stderr}")
    }
}
