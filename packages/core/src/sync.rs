//! One-way additive mirroring with rsync.
//!
//! Files are copied archive-style (`-a`) and overwritten when changed;
//! nothing at the destination is ever deleted by the mirror itself.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::executor::{CommandRunner, CommandSpec, OutputMode};

/// Mirrors directories and file sets into a destination.
pub struct SyncEngine<'a> {
    runner: &'a dyn CommandRunner,
    modify_window: u32,
    copy_links: bool,
    verbosity: u8,
}

impl<'a> SyncEngine<'a> {
    /// `verbosity` 0 is quiet; 2 shows overall progress, 3+ per-file progress.
    pub fn new(runner: &'a dyn CommandRunner, config: &SyncConfig, verbosity: u8) -> Self {
        Self {
            runner,
            modify_window: config.modify_window,
            copy_links: config.copy_links,
            verbosity,
        }
    }

    fn base_command(&self) -> CommandSpec {
        let mut spec = CommandSpec::new("rsync")
            .arg("-a")
            .arg(format!("--modify-window={}", self.modify_window));
        if self.copy_links {
            spec = spec.arg("-L");
        }

        match self.verbosity {
            0 | 1 => spec,
            2 => spec.arg("--info=progress2").output(OutputMode::Inherited),
            _ => spec.arg("-P").output(OutputMode::Inherited),
        }
    }

    /// Copies the contents of `src` into `dst` (created if missing).
    pub fn mirror(&self, src: &Path, dst: &Path) -> Result<()> {
        // Trailing slash: copy the directory's contents, not the directory
        let mut source = src.to_string_lossy().into_owned();
        if !source.ends_with('/') {
            source.push('/');
        }
        let spec = self
            .base_command()
            .arg(source)
            .arg(dst.to_string_lossy());
        self.run(spec, dst)
    }

    /// Copies `files` into the directory `dst` (created if missing).
    pub fn mirror_files(&self, files: &[PathBuf], dst: &Path) -> Result<()> {
        let spec = self
            .base_command()
            .args(files.iter().map(|f| f.to_string_lossy().into_owned()))
            .arg(format!("{}/", dst.to_string_lossy().trim_end_matches('/')));
        self.run(spec, dst)
    }

    fn run(&self, spec: CommandSpec, dst: &Path) -> Result<()> {
        let outcome = self.runner.run(&spec)?;
        if !outcome.success() {
            if !outcome.stderr.is_empty() {
                error!("{}", outcome.stderr);
            }
            return Err(Error::Sync {
                destination: dst.to_path_buf(),
                code: outcome.code,
            });
        }
        info!("copy to {} finished", dst.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingRunner;

    fn config() -> SyncConfig {
        SyncConfig::default()
    }

    #[test]
    fn test_mirror_command() {
        let runner = RecordingRunner::new();
        let engine = SyncEngine::new(&runner, &config(), 1);

        engine
            .mirror(Path::new("/tmp/scratch/lyrics-1"), Path::new("/mnt-set/mp3-sd/lyrics"))
            .unwrap();

        let calls = runner.calls();
        assert_eq!(
            calls[0].display(),
            "rsync -a --modify-window=10 /tmp/scratch/lyrics-1/ /mnt-set/mp3-sd/lyrics"
        );
        assert_eq!(calls[0].output, OutputMode::Captured);
        assert!(!calls[0].privileged);
    }

    #[test]
    fn test_mirror_files_command() {
        let runner = RecordingRunner::new();
        let sync = SyncConfig {
            modify_window: 2,
            copy_links: true,
        };
        let engine = SyncEngine::new(&runner, &sync, 1);

        let files = vec![PathBuf::from("/p/20240101.mp3"), PathBuf::from("/p/20240102.mp3")];
        engine
            .mirror_files(&files, Path::new("/mnt-set/mp3-sd/podcasts/news"))
            .unwrap();

        assert_eq!(
            runner.calls()[0].display(),
            "rsync -a --modify-window=2 -L /p/20240101.mp3 /p/20240102.mp3 /mnt-set/mp3-sd/podcasts/news/"
        );
    }

    #[test]
    fn test_verbosity_flags() {
        let runner = RecordingRunner::new();
        SyncEngine::new(&runner, &config(), 2)
            .mirror(Path::new("/a"), Path::new("/b"))
            .unwrap();
        SyncEngine::new(&runner, &config(), 3)
            .mirror(Path::new("/a"), Path::new("/b"))
            .unwrap();

        let calls = runner.calls();
        assert!(calls[0].args.contains(&"--info=progress2".to_string()));
        assert_eq!(calls[0].output, OutputMode::Inherited);
        assert!(calls[1].args.contains(&"-P".to_string()));
    }

    #[test]
    fn test_nonzero_exit_is_sync_error() {
        let runner = RecordingRunner::new().exit_with("rsync", 23);
        let engine = SyncEngine::new(&runner, &config(), 1);

        let err = engine
            .mirror(Path::new("/a"), Path::new("/mnt-set/mp3-sd/music"))
            .unwrap_err();

        match err {
            Error::Sync { destination, code } => {
                assert_eq!(destination, PathBuf::from("/mnt-set/mp3-sd/music"));
                assert_eq!(code, 23);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
