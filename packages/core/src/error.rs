//! Unified error types for the mp3ctl-core library.
//!
//! Uses SNAFU for context-rich error handling, especially useful when the same
//! underlying error type (like `std::io::Error`) appears in different contexts.
//! Every variant maps onto a stable process exit code, see [`Error::exit_code`].

use snafu::{ResultExt, Snafu};
use std::path::PathBuf;

/// Result type alias using the library's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Exit code for device mount/unmount failures.
pub const EXIT_DEVICE: i32 = 3;
/// Exit code for bad caller-supplied arguments.
pub const EXIT_ARGS: i32 = 4;
/// Exit code for malformed scrobble logs and submission failures.
pub const EXIT_SCROBBLER: i32 = 5;
/// Exit code for internal and configuration errors.
pub const EXIT_INTERNAL: i32 = 10;
/// Exit code for a failed playlist check.
pub const EXIT_PLAYLIST_CHECK: i32 = 11;
/// Exit code for mirroring failures.
pub const EXIT_SYNC: i32 = 12;

/// Unified error type for all core library operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Failed to spawn a system command.
    #[snafu(display("failed to execute command '{command}'"))]
    CommandExecution {
        command: String,
        source: std::io::Error,
    },

    /// Mount, unmount or mountpoint preparation failed.
    #[snafu(display("{message}"))]
    Device { message: String },

    /// A caller-supplied path was not usable.
    #[snafu(display("not a file: {}", path.display()))]
    Arg { path: PathBuf },

    /// Scrobble log could not be parsed or submitted.
    #[snafu(display("{message}"))]
    Scrobbler { message: String },

    /// HTTP transport failure while talking to the tracking service.
    #[snafu(display("scrobble request to {endpoint} failed: {source}"))]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },

    /// The mirroring primitive exited non-zero.
    #[snafu(display("rsync copy to {} failed with exit code {code}", destination.display()))]
    Sync { destination: PathBuf, code: i32 },

    /// The external playlist checker exited non-zero.
    #[snafu(display("error checking playlists with '{command}' (exit code {code})"))]
    PlaylistCheck { command: String, code: i32 },

    /// Missing or invalid configuration.
    #[snafu(display("{message}"))]
    Config { message: String },

    /// Config file could not be read.
    #[snafu(display("failed to read config at {}", path.display()))]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Config file is not valid TOML for the expected schema.
    #[snafu(display("failed to parse config at {}", path.display()))]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Filesystem operation failed.
    #[snafu(display("{action} {}", path.display()))]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Error {
    /// Returns the process exit code associated with this error.
    ///
    /// These values are stable so calling scripts can branch on them.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Device { .. } => EXIT_DEVICE,
            Error::Arg { .. } => EXIT_ARGS,
            Error::Scrobbler { .. } | Error::Http { .. } => EXIT_SCROBBLER,
            Error::Sync { .. } => EXIT_SYNC,
            Error::PlaylistCheck { .. } => EXIT_PLAYLIST_CHECK,
            Error::CommandExecution { .. }
            | Error::Config { .. }
            | Error::ConfigRead { .. }
            | Error::ConfigParse { .. }
            | Error::Io { .. } => EXIT_INTERNAL,
        }
    }

    pub(crate) fn device(message: impl Into<String>) -> Self {
        Error::Device {
            message: message.into(),
        }
    }

    pub(crate) fn scrobbler(message: impl Into<String>) -> Self {
        Error::Scrobbler {
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }
}

/// Extension trait for adding context to io::Error results.
pub trait IoResultExt<T> {
    /// Add context for command execution errors.
    fn command_context(self, command: impl Into<String>) -> Result<T>;

    /// Add context for a failed filesystem operation on `path`.
    fn io_context(self, action: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::result::Result<T, std::io::Error> {
    fn command_context(self, command: impl Into<String>) -> Result<T> {
        self.context(CommandExecutionSnafu {
            command: command.into(),
        })
    }

    fn io_context(self, action: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.context(IoSnafu {
            action,
            path: path.into(),
        })
    }
}
