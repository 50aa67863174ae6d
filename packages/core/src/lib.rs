//! mp3ctl-core: Core library for portable music player maintenance.
//!
//! This library mounts the player's partitions, stages transformed copies of
//! the local library, mirrors them onto the device and submits the player's
//! play history to Last.fm.
//!
//! # Modules
//!
//! - [`config`]: TOML configuration and default locations
//! - [`device`]: Named mountable devices
//! - [`mount`]: Scoped mount/unmount through [`mount::MountGuard`]
//! - [`stage`]: Scratch-area staging of playlists and lyrics
//! - [`transform`]: Pure content rules (playlist lines, lyric names, episode dates)
//! - [`sync`]: One-way mirroring with rsync
//! - [`scrobble`]: Scrobble log archiving, parsing and submission
//! - [`orchestrator`]: Top-level commands
//! - [`executor`]: External command execution and privilege escalation
//! - [`error`]: Error types and exit codes
//!
//! # Example
//!
//! ```no_run
//! use mp3ctl_core::config::Config;
//! use mp3ctl_core::executor::SystemRunner;
//! use mp3ctl_core::orchestrator::{Command, Mp3Ctl};
//!
//! let config = Config::load(None).unwrap();
//! let runner = SystemRunner::with_escalation(config.mount_escalation);
//! let mut ctl = Mp3Ctl::new(config, &runner, 1).unwrap();
//! ctl.run(&Command::CopyPlaylists).unwrap();
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod executor;
pub mod mount;
pub mod orchestrator;
pub mod scrobble;
pub mod stage;
pub mod sync;
pub mod transform;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use config::Config;
pub use device::Device;
pub use error::{Error, Result};
pub use executor::{CommandRunner, SystemRunner};
pub use orchestrator::{Command, Mp3Ctl};
