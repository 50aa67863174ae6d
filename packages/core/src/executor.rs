//! Command execution abstraction with privilege escalation support.
//!
//! Everything the tool does outside its own process (mount helpers, rsync,
//! the playlist checker, the editor) goes through [`CommandRunner`], so the
//! orchestration logic can be driven by an in-memory runner in tests.

use std::process::{Command, Stdio};

use serde::Deserialize;
use tracing::debug;

use crate::error::{IoResultExt, Result};

/// Privilege escalation method for executing commands that require root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivilegeEscalation {
    /// Execute directly without privilege escalation.
    #[default]
    None,
    /// Use `pkexec` for GUI-based privilege escalation (polkit).
    Pkexec,
    /// Use `sudo` for TTY-based privilege escalation.
    Sudo,
}

impl PrivilegeEscalation {
    fn wrapper(self) -> Option<&'static str> {
        match self {
            PrivilegeEscalation::None => None,
            PrivilegeEscalation::Pkexec => Some("pkexec"),
            PrivilegeEscalation::Sudo => Some("sudo"),
        }
    }
}

/// Where a command's output goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Capture stdout/stderr; the user sees nothing.
    #[default]
    Captured,
    /// Share the terminal with the child (progress output, editors).
    Inherited,
}

/// A single external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Run through the configured escalation wrapper.
    pub privileged: bool,
    pub output: OutputMode,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            privileged: false,
            output: OutputMode::Captured,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    pub fn output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    /// Human-readable command line, used in logs and error messages.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Exit code; -1 when the process was killed by a signal.
    pub code: i32,
    /// Captured stderr (empty for inherited output).
    pub stderr: String,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Capability to run external commands, one blocking call at a time.
pub trait CommandRunner {
    /// Runs the command to completion.
    ///
    /// Only a failure to spawn is an `Err`; a non-zero exit is reported
    /// through [`CommandOutcome::code`] for the caller to classify.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutcome>;
}

/// Runs commands on the host system.
///
/// # Example
///
/// ```
/// use mp3ctl_core::executor::{PrivilegeEscalation, SystemRunner};
///
/// let runner = SystemRunner::new();
/// assert_eq!(runner.escalation(), PrivilegeEscalation::None);
///
/// let tty_runner = SystemRunner::with_escalation(PrivilegeEscalation::Sudo);
/// assert_eq!(tty_runner.escalation(), PrivilegeEscalation::Sudo);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    escalation: PrivilegeEscalation,
}

impl SystemRunner {
    /// Creates a runner with no privilege escalation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a runner that wraps privileged commands with `escalation`.
    pub fn with_escalation(escalation: PrivilegeEscalation) -> Self {
        Self { escalation }
    }

    /// Returns the current privilege escalation method.
    pub fn escalation(&self) -> PrivilegeEscalation {
        self.escalation
    }

    fn build(&self, spec: &CommandSpec) -> Command {
        let wrapper = if spec.privileged {
            self.escalation.wrapper()
        } else {
            None
        };

        match wrapper {
            Some(wrapper) => {
                let mut cmd = Command::new(wrapper);
                cmd.arg(&spec.program).args(&spec.args);
                cmd
            }
            None => {
                let mut cmd = Command::new(&spec.program);
                cmd.args(&spec.args);
                cmd
            }
        }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutcome> {
        debug!("running: {}", spec.display());
        let mut cmd = self.build(spec);

        match spec.output {
            OutputMode::Inherited => {
                let status = cmd.status().command_context(&spec.program)?;
                Ok(CommandOutcome {
                    code: status.code().unwrap_or(-1),
                    stderr: String::new(),
                })
            }
            OutputMode::Captured => {
                let output = cmd
                    .stdin(Stdio::null())
                    .output()
                    .command_context(&spec.program)?;
                Ok(CommandOutcome {
                    code: output.status.code().unwrap_or(-1),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                })
            }
        }
    }
}
