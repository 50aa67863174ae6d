//! Command sequencing.
//!
//! [`Mp3Ctl`] owns the configuration, devices and scratch area for one
//! process run and implements each top-level command. Every command fails
//! fast; a mounted device is always unmounted before an error propagates.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use crate::config::{Config, Location, MEDIA_DEVICE, SYS_DEVICE, ScrobblingConfig};
use crate::device::{Device, Devices};
use crate::error::{Error, IoResultExt, Result};
use crate::executor::{CommandRunner, CommandSpec, OutputMode};
use crate::mount;
use crate::scrobble::processor::{self, ArchivedLog, ScrobbleReport};
use crate::scrobble::{LastFmClient, Scrobbler};
use crate::stage::ContentStager;
use crate::sync::SyncEngine;
use crate::transform::{self, PlaylistRules};

/// Creates the remote tracking client when a log is ready to submit.
pub type ScrobblerFactory<'a> = Box<dyn Fn(&ScrobblingConfig) -> Result<Box<dyn Scrobbler + 'a>> + 'a>;

/// Top-level commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Archive and submit the device log, or the given logs instead.
    ProcessScrobbles { files: Vec<PathBuf>, edit: bool },
    CopyPlaylists,
    CopyLyrics,
    CopyMusic,
    CopyPodcasts,
    /// Everything above, in order, stopping at the first failure.
    Maintenance,
}

/// What a command did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub scrobbles: Vec<ScrobbleReport>,
    /// Podcast episodes copied.
    pub episodes: usize,
}

pub struct Mp3Ctl<'a> {
    config: Config,
    runner: &'a dyn CommandRunner,
    connect: ScrobblerFactory<'a>,
    devices: Devices,
    stager: ContentStager,
    verbosity: u8,
}

impl<'a> Mp3Ctl<'a> {
    /// Sets up devices and the scratch area. Scrobbles go to Last.fm.
    pub fn new(config: Config, runner: &'a dyn CommandRunner, verbosity: u8) -> Result<Self> {
        Ok(Self {
            devices: Devices::from_config(&config),
            stager: ContentStager::new()?,
            config,
            runner,
            connect: Box::new(connect_lastfm),
            verbosity,
        })
    }

    /// Replaces how the scrobble client is created.
    pub fn with_scrobbler_factory(mut self, connect: ScrobblerFactory<'a>) -> Self {
        self.connect = connect;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn devices(&self) -> &Devices {
        &self.devices
    }

    pub fn run(&mut self, command: &Command) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        match command {
            Command::ProcessScrobbles { files, edit } => {
                summary.scrobbles = self.process_scrobbles(files, *edit)?;
            }
            Command::CopyPlaylists => self.copy_playlists()?,
            Command::CopyLyrics => self.copy_lyrics()?,
            Command::CopyMusic => self.copy_music()?,
            Command::CopyPodcasts => summary.episodes = self.copy_podcasts()?,
            Command::Maintenance => {
                summary.scrobbles = self.process_scrobbles(&[], false)?;
                self.copy_playlists()?;
                self.copy_lyrics()?;
                self.copy_music()?;
                summary.episodes = self.copy_podcasts()?;
            }
        }
        Ok(summary)
    }

    fn sync_engine(&self) -> SyncEngine<'a> {
        SyncEngine::new(self.runner, &self.config.sync, self.verbosity)
    }

    pub fn process_scrobbles(&mut self, files: &[PathBuf], edit: bool) -> Result<Vec<ScrobbleReport>> {
        info!("processing scrobbles...");
        let from_device = files.is_empty();
        let logs = if from_device {
            let archive_dir = self.config.location(Location::Scrobbles)?.to_path_buf();
            let device = self.devices.get_mut(SYS_DEVICE)?;
            match processor::archive_device_log(device, self.runner, &archive_dir, Local::now())? {
                Some(log) => vec![log],
                None => return Ok(Vec::new()),
            }
        } else {
            files
                .iter()
                .map(ArchivedLog::existing)
                .collect::<Result<Vec<_>>>()?
        };

        let creds = match self.config.scrobbling() {
            Ok(creds) => creds,
            Err(e) if from_device => {
                let archived: Vec<_> = logs.iter().map(|l| l.path().display().to_string()).collect();
                return Err(Error::config(format!(
                    "{e}; log archived at {}, resubmit with `mp3ctl scrobble <file>`",
                    archived.join(", ")
                )));
            }
            Err(e) => return Err(e),
        };
        let scrobbler = (self.connect)(creds)?;
        let editor = processor::resolve_editor(creds.editor.as_deref());

        let mut reports = Vec::with_capacity(logs.len());
        for log in logs {
            if edit {
                log.edit(self.runner, &editor)?;
            }
            reports.push(log.parse()?.submit(scrobbler.as_ref())?);
        }
        Ok(reports)
    }

    pub fn copy_playlists(&mut self) -> Result<()> {
        info!("copying playlists to device...");
        if let Some(check) = &self.config.playlists.check_command {
            self.check_playlists(check)?;
        }

        let source = self.config.location(Location::Playlists)?.to_path_buf();
        let playlists = &self.config.playlists;
        let rules = PlaylistRules {
            prefix: playlists.device_prefix.clone(),
            converted_extensions: playlists.converted_extensions.clone(),
            substitute_extension: playlists.substitute_extension.clone(),
        };
        let extension = playlists.extension.clone();

        let engine = self.sync_engine();
        let stager = &mut self.stager;
        let device = self.devices.get_mut(MEDIA_DEVICE)?;
        mount::with_mounted(device, self.runner, |mountpoint| {
            let staged = stager.stage_playlists(&source, &extension, &rules)?;
            info!("copying playlists over...");
            engine.mirror(&staged, &mountpoint.join("playlists"))
        })
    }

    fn check_playlists(&self, check: &[String]) -> Result<()> {
        let Some((program, args)) = check.split_first() else {
            return Ok(());
        };
        info!("checking playlists with {program}...");
        let spec = CommandSpec::new(program.as_str())
            .args(args.iter().cloned())
            .output(OutputMode::Inherited);
        let outcome = self.runner.run(&spec)?;
        if !outcome.success() {
            return Err(Error::PlaylistCheck {
                command: spec.display(),
                code: outcome.code,
            });
        }
        Ok(())
    }

    pub fn copy_lyrics(&mut self) -> Result<()> {
        let source = self.config.location(Location::Lyrics)?.to_path_buf();
        let markers = self.config.lyrics.unwanted_markers.clone();

        let engine = self.sync_engine();
        let stager = &mut self.stager;
        let device = self.devices.get_mut(MEDIA_DEVICE)?;
        mount::with_mounted(device, self.runner, |mountpoint| {
            let staged = stager.stage_lyrics(&source, &markers)?;
            info!("copying lyrics over...");
            engine.mirror(&staged, &mountpoint.join("lyrics"))
        })
    }

    pub fn copy_music(&mut self) -> Result<()> {
        info!("copying music over (from portable library)...");
        let source = self.config.location(Location::MusicPortable)?.to_path_buf();

        let engine = self.sync_engine();
        let device = self.devices.get_mut(MEDIA_DEVICE)?;
        mount::with_mounted(device, self.runner, |mountpoint| {
            engine.mirror(&source, &mountpoint.join("music"))
        })
    }

    /// Copies recent episodes of every feed; returns the number copied.
    pub fn copy_podcasts(&mut self) -> Result<usize> {
        let archive = self.config.location(Location::Podcasts)?.to_path_buf();
        match self.config.podcasts.remote.clone() {
            Some(remote) => {
                info!("mounting podcast archive...");
                let mut archive_device = Device::remote("podcast-archive", &archive, &remote);
                let runner = self.runner;
                mount::with_mounted(&mut archive_device, runner, |_| self.push_podcasts())
            }
            None => self.push_podcasts(),
        }
    }

    fn push_podcasts(&mut self) -> Result<usize> {
        let archive = self.config.location(Location::Podcasts)?.to_path_buf();
        let prefixes =
            transform::episode_date_prefixes(Local::now().date_naive(), self.config.podcasts.window_days);

        let mut selections = Vec::new();
        for feed in &self.config.podcasts.feeds {
            let episodes_dir = archive.join(&feed.episodes);
            let names = list_file_names(&episodes_dir)?;
            let selected: Vec<PathBuf> = transform::select_episodes(names.iter().map(String::as_str), &prefixes)
                .into_iter()
                .map(|name| episodes_dir.join(name))
                .collect();
            info!("{}: {} episodes selected", feed.name, selected.len());
            if !selected.is_empty() {
                selections.push((feed.name.clone(), selected));
            }
        }

        if selections.is_empty() {
            info!("no podcasts selected, skipping device mount");
            return Ok(0);
        }

        let engine = self.sync_engine();
        let device = self.devices.get_mut(MEDIA_DEVICE)?;
        mount::with_mounted(device, self.runner, |mountpoint| {
            let mut copied = 0;
            for (name, files) in &selections {
                let dest = mountpoint.join("podcasts").join(name);
                match fs::remove_dir_all(&dest) {
                    Err(e) if e.kind() != io::ErrorKind::NotFound => {
                        return Err(e).io_context("failed to clear", &dest);
                    }
                    _ => {}
                }
                engine.mirror_files(files, &dest)?;
                copied += files.len();
            }
            Ok(copied)
        })
    }
}

fn connect_lastfm<'a>(creds: &ScrobblingConfig) -> Result<Box<dyn Scrobbler + 'a>> {
    Ok(Box::new(LastFmClient::connect(creds)?))
}

/// File names in `dir`; a missing directory has none.
fn list_file_names(dir: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).io_context("failed to read directory", dir),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.io_context("failed to read directory", dir)?;
        if entry.path().is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}
