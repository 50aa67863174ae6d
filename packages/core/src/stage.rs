//! Scratch-area staging.
//!
//! Source directories are copied into a process-wide scratch directory and
//! transformed there, so the library itself is never modified. The scratch
//! directory is removed when the [`ContentStager`] is dropped.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info};

use crate::error::{IoResultExt, Result};
use crate::transform::{self, PlaylistRules};

/// A file placed in the scratch area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedItem {
    /// File name in the source directory.
    pub original_name: String,
    /// Path of the staged copy.
    pub path: PathBuf,
}

/// What to do with one source entry while staging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageAction {
    /// Copy under the given file name.
    Copy(String),
    Skip,
}

/// Output of one staging call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedDir {
    /// Fresh scratch subdirectory holding the staged files.
    pub dir: PathBuf,
    pub items: Vec<StagedItem>,
}

/// Owner of the scratch directory.
pub struct ContentStager {
    root: TempDir,
    next_id: usize,
}

impl ContentStager {
    /// Creates the scratch root under the system temp directory.
    pub fn new() -> Result<Self> {
        let root = tempfile::Builder::new()
            .prefix("tmp-mp3ctl-")
            .tempdir()
            .io_context("failed to create scratch directory in", std::env::temp_dir())?;
        debug!("scratch directory: {}", root.path().display());
        Ok(Self { root, next_id: 0 })
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Creates a fresh, empty scratch subdirectory named after `label`.
    fn fresh_dir(&mut self, label: &str) -> Result<PathBuf> {
        let dir = self.root.path().join(format!("{label}-{}", self.next_id));
        self.next_id += 1;
        fs::create_dir(&dir).io_context("failed to create scratch directory", &dir)?;
        Ok(dir)
    }

    /// Copies every regular file of `source` into a fresh scratch directory.
    ///
    /// `decide` sees each file name and its path and chooses the staged name
    /// or skips the file. A later file staged under an existing name replaces
    /// the earlier one.
    pub fn stage_with<F>(&mut self, label: &str, source: &Path, mut decide: F) -> Result<StagedDir>
    where
        F: FnMut(&str, &Path) -> Result<StageAction>,
    {
        let dir = self.fresh_dir(label)?;
        let mut entries = fs::read_dir(source)
            .io_context("failed to read directory", source)?
            .collect::<std::io::Result<Vec<_>>>()
            .io_context("failed to read directory", source)?;
        entries.sort_by_key(|e| e.file_name());

        let mut staged = Vec::with_capacity(entries.len());
        for entry in entries {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let original_name = entry.file_name().to_string_lossy().into_owned();

            let StageAction::Copy(target_name) = decide(&original_name, &path)? else {
                debug!("skipping {original_name}");
                continue;
            };

            let target = dir.join(&target_name);
            fs::copy(&path, &target).io_context("failed to copy into scratch", &target)?;
            staged.retain(|item: &StagedItem| item.path != target);
            staged.push(StagedItem {
                original_name,
                path: target,
            });
        }
        Ok(StagedDir { dir, items: staged })
    }

    /// Stages playlists with the player's playlist extension and rewritten tracks.
    ///
    /// Returns the scratch directory holding the playlists.
    pub fn stage_playlists(&mut self, source: &Path, extension: &str, rules: &PlaylistRules) -> Result<PathBuf> {
        let staged = self.stage_with("playlists", source, |name, _| {
            Ok(StageAction::Copy(transform::with_extension(name, extension)))
        })?;

        for item in &staged.items {
            let content = fs::read_to_string(&item.path)
                .io_context("failed to read playlist", &item.path)?;
            fs::write(&item.path, rules.rewrite_playlist(&content))
                .io_context("failed to write playlist", &item.path)?;
        }
        info!("staged {} playlists", staged.items.len());
        Ok(staged.dir)
    }

    /// Stages lyric files, dropping placeholder-only files and renaming
    /// `"<artist> - <title>.txt"` to `"<title>.txt"`.
    pub fn stage_lyrics(&mut self, source: &Path, unwanted_markers: &[String]) -> Result<PathBuf> {
        info!("filtering unwanted lyrics...");
        let staged = self.stage_with("lyrics", source, |name, path| {
            let content = fs::read(path).io_context("failed to read lyrics", path)?;
            if transform::is_unwanted_lyric(&String::from_utf8_lossy(&content), unwanted_markers) {
                return Ok(StageAction::Skip);
            }
            Ok(StageAction::Copy(
                transform::lyric_file_name(name).unwrap_or_else(|| name.to_string()),
            ))
        })?;
        info!("staged {} lyric files", staged.items.len());
        Ok(staged.dir)
    }
}
