//! Process execution with a bounded timeout.
//!
//! Every external tool the panel drives goes through [`CommandRunner`]. The
//! runner never fails: launch errors, non-zero exits and timeouts all come back
//! as a [`CommandResult`] so callers can treat a broken tool as ordinary data.

use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const TIMED_OUT: &str = "Command timed out";

/// What to execute: a full shell line, or a program with an argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    Shell(String),
    Argv {
        program: String,
        args: Vec<String>,
        /// Argument positions replaced by `***` whenever the command is displayed.
        masked: Vec<usize>,
    },
}

impl CommandLine {
    pub fn shell(line: impl Into<String>) -> Self {
        CommandLine::Shell(line.into())
    }

    pub fn argv<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandLine::Argv {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            masked: Vec::new(),
        }
    }

    /// Hides the argument at `index` from logs.
    pub fn masking(mut self, index: usize) -> Self {
        if let CommandLine::Argv { masked, .. } = &mut self {
            masked.push(index);
        }
        self
    }

    pub fn program(&self) -> &str {
        match self {
            CommandLine::Shell(_) => "/bin/sh",
            CommandLine::Argv { program, .. } => program,
        }
    }

    pub fn args(&self) -> Vec<&str> {
        match self {
            CommandLine::Shell(line) => vec!["-c", line.as_str()],
            CommandLine::Argv { args, .. } => args.iter().map(String::as_str).collect(),
        }
    }

    fn to_command(&self) -> Command {
        match self {
            CommandLine::Shell(line) => {
                let mut cmd = Command::new("/bin/sh");
                cmd.arg("-c").arg(line);
                cmd
            }
            CommandLine::Argv { program, args, .. } => {
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandLine::Shell(line) => f.write_str(line),
            CommandLine::Argv {
                program,
                args,
                masked,
            } => {
                f.write_str(program)?;
                for (i, arg) in args.iter().enumerate() {
                    if masked.contains(&i) {
                        f.write_str(" ***")?;
                    } else {
                        write!(f, " {}", arg)?;
                    }
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn completed(exit_code: i32, stdout: &[u8], stderr: &[u8]) -> Self {
        Self {
            success: exit_code == 0,
            stdout: String::from_utf8_lossy(stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
            exit_code,
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: -1,
        }
    }

    pub fn timed_out() -> Self {
        Self::failed(TIMED_OUT)
    }

    /// Turns a failed invocation into `AppError::CommandFailed` prefixed with `context`.
    pub fn require(self, context: &str) -> AppResult<String> {
        if self.success {
            Ok(self.stdout)
        } else {
            Err(AppError::CommandFailed(format!("{}: {}", context, self.stderr)))
        }
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &CommandLine, timeout: Duration) -> CommandResult;
}

/// Runs commands as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, command: &CommandLine, timeout: Duration) -> CommandResult {
        debug!(command = %command, timeout = ?timeout, "running command");

        let mut cmd = command.to_command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(command = %command, "failed to launch: {}", e);
                return CommandResult::failed(e.to_string());
            }
        };

        let pid = child.id();
        let deadline = Instant::now() + timeout;
        let stdout = tokio::spawn(read_pipe(child.stdout.take()));
        let stderr = tokio::spawn(read_pipe(child.stderr.take()));

        let status = match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                warn!(command = %command, "failed waiting for child: {}", e);
                terminate(&mut child, pid).await;
                return CommandResult::failed(e.to_string());
            }
            Err(_) => {
                warn!(command = %command, "command timed out after {:?}", timeout);
                terminate(&mut child, pid).await;
                stdout.abort();
                stderr.abort();
                return CommandResult::timed_out();
            }
        };

        // A backgrounded grandchild can hold the pipes open past the parent's exit.
        let output = tokio::time::timeout_at(deadline, async {
            let out = stdout.await.unwrap_or_default();
            let err = stderr.await.unwrap_or_default();
            (out, err)
        })
        .await;

        let Ok((out, err)) = output else {
            warn!(command = %command, "output pipes still open after {:?}", timeout);
            terminate(&mut child, pid).await;
            return CommandResult::timed_out();
        };

        let exit_code = status.code().unwrap_or(-1);
        let result = CommandResult::completed(exit_code, &out, &err);
        if result.success {
            debug!(command = %command, "command succeeded");
        } else {
            warn!(command = %command, exit_code, stderr = %result.stderr, "command failed");
        }
        result
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    buf
}

/// Kills the whole process group, then reaps the direct child. `pid` is captured
/// at spawn time because tokio forgets it once the child has been waited on.
async fn terminate(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
    }
    let _ = child.kill().await;
}
