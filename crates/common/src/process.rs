//! External script execution
//!
//! Build, training and serving scripts, and the platform command line
//! tools, all run through the [`ScriptRunner`] capability so callers can
//! swap in a recording double under test.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::utils::execute_with_timeout;

/// Where the child's standard output goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Share the terminal with the parent
    Inherit,
    /// Collect stdout and stderr into the returned [`ScriptOutput`]
    Capture,
    /// Write stdout to a file, truncating it first
    File(PathBuf),
}

/// A single program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInvocation {
    /// Program to run
    pub program: PathBuf,
    /// Arguments, passed verbatim (no shell)
    pub args: Vec<String>,
    /// Working directory of the child; the parent's never changes
    pub working_dir: Option<PathBuf>,
    /// Output handling
    pub output: OutputMode,
}

impl ScriptInvocation {
    /// Creates an invocation that inherits the terminal
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            output: OutputMode::Inherit,
        }
    }

    /// Runs a script that lives in `dir`, with `dir` as its working directory
    pub fn script_in(dir: &Path, script: &str) -> Self {
        Self::new(dir.join(script)).current_dir(dir)
    }

    /// Appends an argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the child's working directory
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Sets the output mode
    pub fn output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    /// Short label for logs and error messages
    pub fn display_name(&self) -> String {
        let program = self
            .program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string());

        if self.args.is_empty() {
            program
        } else {
            format!("{} {}", program, self.args.join(" "))
        }
    }
}

/// Completion status of an invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptOutput {
    /// Exit code, `None` if the child was killed by a signal
    pub exit_code: Option<i32>,
    /// Captured stdout, empty unless [`OutputMode::Capture`]
    pub stdout: String,
    /// Captured stderr, empty unless [`OutputMode::Capture`]
    pub stderr: String,
}

impl ScriptOutput {
    /// A successful, empty completion
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            ..Self::default()
        }
    }

    /// Returns true if the child exited with status zero
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Turns a non-zero exit into [`Error::ExternalTool`]
    pub fn check(self, invocation: &ScriptInvocation) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }

        let status = match self.exit_code {
            Some(code) => format!("exit status {}", code),
            None => "termination by signal".to_string(),
        };
        let stderr = self.stderr.trim();

        Err(Error::ExternalTool(if stderr.is_empty() {
            format!("{} failed with {}", invocation.display_name(), status)
        } else {
            format!("{} failed with {}: {}", invocation.display_name(), status, stderr)
        }))
    }
}

/// Capability for running external programs to completion
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Runs the invocation and waits for it to finish
    async fn run(&self, invocation: &ScriptInvocation) -> Result<ScriptOutput>;
}

/// [`ScriptRunner`] backed by real child processes
///
/// With a timeout, each child leads its own process group and the whole
/// group is killed when the limit is hit, so nothing the script started
/// outlives the reported timeout. Without one, children stay in the
/// terminal's foreground group and can read from it.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    /// Upper bound on a single invocation; unbounded when `None`
    timeout: Option<Duration>,
}

impl ProcessRunner {
    /// Creates a new process runner
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    fn spawn(&self, invocation: &ScriptInvocation) -> Result<Child> {
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args).kill_on_drop(true);

        if let Some(dir) = &invocation.working_dir {
            command.current_dir(dir);
        }

        #[cfg(unix)]
        if self.timeout.is_some() {
            command.process_group(0);
        }

        match &invocation.output {
            OutputMode::Inherit => {
                command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
            OutputMode::Capture => {
                command.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
            OutputMode::File(path) => {
                let file = std::fs::File::create(path)?;
                command.stdout(Stdio::from(file)).stderr(Stdio::inherit());
            }
        }

        command.spawn().map_err(|e| {
            Error::ExternalTool(format!("failed to start {}: {}", invocation.program.display(), e))
        })
    }
}

/// Sends SIGKILL to every process in the group led by `leader`
#[cfg(unix)]
fn kill_process_group(leader: Option<u32>) {
    let Some(pgid) = leader.and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
        return;
    };

    // SAFETY: killpg has no memory-safety preconditions; a stale group id only yields ESRCH.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc == 0 {
        debug!("Killed process group {}", pgid);
    } else {
        debug!("Process group {} already gone: {}", pgid, std::io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn kill_process_group(_leader: Option<u32>) {}

#[async_trait]
impl ScriptRunner for ProcessRunner {
    async fn run(&self, invocation: &ScriptInvocation) -> Result<ScriptOutput> {
        let name = invocation.display_name();
        info!("Running {}", name);
        debug!("Invocation: {:?}", invocation);

        let child = self.spawn(invocation)?;
        let leader = child.id();

        let output = match self.timeout {
            Some(limit) => {
                let waited = execute_with_timeout(
                    async move { child.wait_with_output().await.map_err(Error::from) },
                    limit,
                    &name,
                )
                .await;

                match waited {
                    Ok(output) => output,
                    Err(e) => {
                        if e.is_timeout() {
                            warn!("{} timed out, killing its process group", name);
                            kill_process_group(leader);
                        }
                        return Err(e);
                    }
                }
            }
            None => child.wait_with_output().await?,
        };

        debug!("{} finished with {:?}", name, output.status.code());

        Ok(ScriptOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
