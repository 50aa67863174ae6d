//! Per-log scrobble processing.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use super::{ScrobbleEvent, ScrobbleLog, Scrobbler};
use crate::device::Device;
use crate::error::{Error, IoResultExt, Result};
use crate::executor::{CommandRunner, CommandSpec, OutputMode};
use crate::mount;

/// Play-history file at the root of the player's system partition.
pub const DEVICE_LOG_NAME: &str = ".scrobbler.log";

/// Editor used when neither the config nor `$EDITOR` names one.
pub const DEFAULT_EDITOR: &str = "vim";

/// Outcome of one submitted log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrobbleReport {
    pub log: PathBuf,
    /// Events submitted.
    pub listened: usize,
    /// Event lines in the log, skipped ones included.
    pub total: usize,
}

/// A log on local disk, ready to be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedLog {
    path: PathBuf,
}

impl ArchivedLog {
    /// Wraps a caller-supplied log, which must be a regular file.
    pub fn existing(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(Error::Arg { path });
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the log in `editor` and blocks until it exits.
    pub fn edit(&self, runner: &dyn CommandRunner, editor: &str) -> Result<()> {
        info!("editing scrobble log {}...", self.path.display());
        let spec = CommandSpec::new(editor)
            .arg(self.path.to_string_lossy())
            .output(OutputMode::Inherited);
        let outcome = runner.run(&spec)?;
        if !outcome.success() {
            warn!("editor exited with code {}", outcome.code);
        }
        Ok(())
    }

    /// Parses the whole log. Any malformed line rejects the log.
    pub fn parse(self) -> Result<ParsedLog> {
        let content = fs::read_to_string(&self.path).io_context("failed to read scrobble log", &self.path)?;
        let log = ScrobbleLog::new(content);

        let mut total = 0;
        let mut listened = Vec::new();
        for event in log.events() {
            let event = event.map_err(|e| {
                Error::scrobbler(format!("{}: {e}", self.path.display()))
            })?;
            total += 1;
            debug!(
                "{:?} {} {} - {}",
                event.status,
                event.timestamp,
                event.artist.as_deref().unwrap_or(""),
                event.title.as_deref().unwrap_or("")
            );
            if event.is_listened() {
                listened.push(event);
            }
        }

        Ok(ParsedLog {
            path: self.path,
            listened,
            total,
        })
    }
}

/// A fully parsed log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLog {
    path: PathBuf,
    listened: Vec<ScrobbleEvent>,
    total: usize,
}

impl ParsedLog {
    /// Listened events in log order.
    pub fn listened(&self) -> &[ScrobbleEvent] {
        &self.listened
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Hands all listened events to `scrobbler` as one batch.
    pub fn submit(self, scrobbler: &dyn Scrobbler) -> Result<ScrobbleReport> {
        info!("scrobbling {}...", self.path.display());
        scrobbler.submit_many(&self.listened)?;

        let report = ScrobbleReport {
            log: self.path,
            listened: self.listened.len(),
            total: self.total,
        };
        info!(
            "scrobbled tracks: {} listened, {} total",
            report.listened, report.total
        );
        Ok(report)
    }
}

/// Archive file name for a log taken off the device at `now`.
pub fn archive_file_name(now: DateTime<Local>) -> String {
    format!("{}-scrobbler-log.txt", now.format("%Y-%m-%d-%H:%M:%S"))
}

/// Moves the device's play-history log into `archive_dir`.
///
/// Mounts `device` for the duration of the move. Returns `None` when the
/// device holds no log. The archived copy has its execute bits cleared.
pub fn archive_device_log(
    device: &mut Device,
    runner: &dyn CommandRunner,
    archive_dir: &Path,
    now: DateTime<Local>,
) -> Result<Option<ArchivedLog>> {
    info!("grabbing device scrobble log...");
    let archive = archive_dir.join(archive_file_name(now));

    let moved = mount::with_mounted(device, runner, |mountpoint| {
        let source = mountpoint.join(DEVICE_LOG_NAME);
        fs::create_dir_all(archive_dir).io_context("failed to create archive directory", archive_dir)?;
        match move_file(&source, &archive) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).io_context("failed to archive scrobble log", &source),
        }
    })?;

    if !moved {
        info!("no scrobbler log present");
        return Ok(None);
    }

    strip_exec_bits(&archive)?;
    info!("log moved from device -> {}", archive.display());
    Ok(Some(ArchivedLog { path: archive }))
}

/// Renames `src` to `dst`, copying across filesystems.
fn move_file(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::rename(src, dst) {
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(src, dst)?;
            fs::remove_file(src)
        }
        other => other,
    }
}

#[cfg(unix)]
fn strip_exec_bits(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)
        .io_context("failed to read permissions of", path)?
        .permissions();
    perms.set_mode(perms.mode() & !0o111);
    fs::set_permissions(path, perms).io_context("failed to set permissions of", path)
}

#[cfg(not(unix))]
fn strip_exec_bits(_path: &Path) -> Result<()> {
    Ok(())
}

/// Editor for `--edit`: configured, then `$EDITOR`, then `vim`.
pub fn resolve_editor(configured: Option<&str>) -> String {
    configured
        .map(str::to_string)
        .or_else(|| std::env::var("EDITOR").ok().filter(|e| !e.is_empty()))
        .unwrap_or_else(|| DEFAULT_EDITOR.to_string())
}
