//! Configuration schema and loading.
//!
//! All paths, device identifiers and transformation rules live in one
//! [`Config`] value that is passed explicitly to every component. The file is
//! TOML, every section is optional and falls back to the defaults below.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use snafu::ResultExt;

use crate::error::{ConfigParseSnafu, ConfigReadSnafu, Error, Result};
use crate::executor::PrivilegeEscalation;

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "MP3CTL_CONFIG";

/// Name of the removable media partition.
pub const MEDIA_DEVICE: &str = "media";

/// Name of the player's system partition (holds the scrobble log).
pub const SYS_DEVICE: &str = "sys";

/// A named library location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    Music,
    MusicPortable,
    Playlists,
    Lyrics,
    Scrobbles,
    Podcasts,
}

impl Location {
    pub fn name(self) -> &'static str {
        match self {
            Location::Music => "music",
            Location::MusicPortable => "music-portable",
            Location::Playlists => "playlists",
            Location::Lyrics => "lyrics",
            Location::Scrobbles => "scrobbles",
            Location::Podcasts => "podcasts",
        }
    }
}

/// Mount configuration for one device.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceConfig {
    /// Directory listed in fstab; `mount <dir>` attaches the device there.
    pub mount_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PlaylistConfig {
    /// Device-relative path prepended to every track.
    pub device_prefix: String,
    /// Extension given to staged playlist files.
    pub extension: String,
    /// Source extensions that were transcoded for the player.
    pub converted_extensions: Vec<String>,
    /// Extension the transcoded tracks carry on the player.
    pub substitute_extension: String,
    /// Optional checker run before copying, e.g. `["musctl.py", "maintenance"]`.
    pub check_command: Option<Vec<String>>,
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            device_prefix: "/<microSD1>/music".to_string(),
            // Rockbox only reads Unicode playlists with this extension
            extension: "m3u8".to_string(),
            converted_extensions: vec!["flac".to_string()],
            substitute_extension: "ogg".to_string(),
            check_command: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LyricsConfig {
    /// Lyric files whose trimmed content equals one of these are not copied.
    pub unwanted_markers: Vec<String>,
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            unwanted_markers: vec!["[instrumental]".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Timestamp tolerance in seconds (FAT truncates modification times).
    pub modify_window: u32,
    /// Dereference symlinks in the source.
    pub copy_links: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            modify_window: 10,
            copy_links: false,
        }
    }
}

/// A podcast whose recent episodes are pushed to the player.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PodcastFeed {
    /// Destination directory name under `podcasts/` on the device.
    pub name: String,
    /// Episode directory, relative to the podcasts location.
    pub episodes: PathBuf,
}

/// Network archive mounted over the podcasts location.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteArchive {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub dir: String,
}

fn default_ssh_port() -> u16 {
    22
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PodcastConfig {
    /// Number of days (counting today) whose episodes are selected.
    pub window_days: u32,
    pub feeds: Vec<PodcastFeed>,
    pub remote: Option<RemoteArchive>,
}

impl Default for PodcastConfig {
    fn default() -> Self {
        Self {
            window_days: 3,
            feeds: vec![PodcastFeed {
                name: "nhk-radio-news".to_string(),
                episodes: PathBuf::from("nhk-radio-news").join("episodes"),
            }],
            remote: None,
        }
    }
}

/// Last.fm credentials.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScrobblingConfig {
    pub api_key: String,
    pub api_secret: String,
    pub username: String,
    /// md5 hex digest of the account password.
    pub password_hash: String,
    /// Editor for `--edit`; falls back to `$EDITOR`, then `vim`.
    #[serde(default)]
    pub editor: Option<String>,
}

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub devices: BTreeMap<String, DeviceConfig>,
    pub locations: BTreeMap<String, PathBuf>,
    pub mount_escalation: PrivilegeEscalation,
    pub playlists: PlaylistConfig,
    pub lyrics: LyricsConfig,
    pub sync: SyncConfig,
    pub podcasts: PodcastConfig,
    pub scrobbling: Option<ScrobblingConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let devices = [(MEDIA_DEVICE, "mp3-sd"), (SYS_DEVICE, "mp3-sys")]
            .into_iter()
            .map(|(name, dir)| {
                (
                    name.to_string(),
                    DeviceConfig {
                        mount_dir: Path::new("/mnt-set").join(dir),
                    },
                )
            })
            .collect();

        Self {
            devices,
            locations: default_locations(),
            mount_escalation: PrivilegeEscalation::None,
            playlists: PlaylistConfig::default(),
            lyrics: LyricsConfig::default(),
            sync: SyncConfig::default(),
            podcasts: PodcastConfig::default(),
            scrobbling: None,
        }
    }
}

/// Library locations under `$HOME/media`. Empty when no home directory is known.
fn default_locations() -> BTreeMap<String, PathBuf> {
    let Some(home) = dirs::home_dir() else {
        return BTreeMap::new();
    };
    let media = home.join("media");
    let etc = media.join("music-etc");

    [
        (Location::Music, media.join("music")),
        (Location::MusicPortable, etc.join("music-portable")),
        (Location::Playlists, etc.join("playlists")),
        (Location::Lyrics, etc.join("lyrics")),
        (Location::Scrobbles, etc.join("mp3-scrobbles")),
        (Location::Podcasts, media.join("podcasts").join("archive")),
    ]
    .into_iter()
    .map(|(location, path)| (location.name().to_string(), path))
    .collect()
}

impl Config {
    /// Loads the config from `path`, or from the default location when `None`.
    ///
    /// A missing file yields the defaults; any other read or parse failure is
    /// an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => resolve_config_path(),
        };

        let Some(path) = path else {
            return Ok(Self::default());
        };

        match fs::read_to_string(&path) {
            Ok(content) => Self::from_toml(&content, &path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).context(ConfigReadSnafu { path }),
        }
    }

    /// Parses TOML content; `path` is only used for error messages.
    pub fn from_toml(content: &str, path: &Path) -> Result<Self> {
        let config: Config = toml::from_str(content).context(ConfigParseSnafu { path })?;
        config.validate()?;
        Ok(config)
    }

    /// Perform basic validation checks on loaded settings.
    pub fn validate(&self) -> Result<()> {
        if self.playlists.device_prefix.is_empty() {
            return Err(Error::config("playlists.device_prefix must not be empty"));
        }
        if self.playlists.substitute_extension.is_empty() {
            return Err(Error::config(
                "playlists.substitute_extension must not be empty",
            ));
        }
        if self.podcasts.window_days == 0 {
            return Err(Error::config("podcasts.window_days must be >= 1"));
        }
        Ok(())
    }

    /// Returns the configured path for `location`.
    pub fn location(&self, location: Location) -> Result<&Path> {
        self.locations
            .get(location.name())
            .map(PathBuf::as_path)
            .ok_or_else(|| {
                Error::config(format!(
                    "no configured media location '{}'",
                    location.name()
                ))
            })
    }

    /// Returns the mount configuration of the named device.
    pub fn device(&self, name: &str) -> Result<&DeviceConfig> {
        self.devices
            .get(name)
            .ok_or_else(|| Error::config(format!("no such configured media device '{name}'")))
    }

    /// Returns the Last.fm credentials, required only when submitting.
    pub fn scrobbling(&self) -> Result<&ScrobblingConfig> {
        self.scrobbling
            .as_ref()
            .ok_or_else(|| Error::config("missing [scrobbling] credentials in config"))
    }
}

/// Resolve the config path from `MP3CTL_CONFIG` or XDG defaults.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(p));
    }
    default_config_path()
}

/// `$XDG_CONFIG_HOME/mp3ctl/config.toml`, or `~/.config/mp3ctl/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mp3ctl").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_player_layout() {
        let config = Config::default();

        assert_eq!(
            config.device(MEDIA_DEVICE).unwrap().mount_dir,
            PathBuf::from("/mnt-set/mp3-sd")
        );
        assert_eq!(
            config.device(SYS_DEVICE).unwrap().mount_dir,
            PathBuf::from("/mnt-set/mp3-sys")
        );
        assert_eq!(config.playlists.extension, "m3u8");
        assert_eq!(config.playlists.converted_extensions, vec!["flac"]);
        assert_eq!(config.sync.modify_window, 10);
        assert_eq!(config.podcasts.window_days, 3);
        assert!(config.scrobbling.is_none());
    }

    #[test]
    fn test_parse_partial_file() {
        let content = r#"
mount_escalation = "sudo"

[devices.media]
mount_dir = "/media/player"

[locations]
lyrics = "/srv/lyrics"

[playlists]
device_prefix = "/sd/music"

[scrobbling]
api_key = "key"
api_secret = "secret"
username = "raehik"
password_hash = "5f4dcc3b5aa765d61d8327deb882cf99"
"#;
        let config = Config::from_toml(content, Path::new("test.toml")).unwrap();

        assert_eq!(config.mount_escalation, PrivilegeEscalation::Sudo);
        assert_eq!(
            config.device(MEDIA_DEVICE).unwrap().mount_dir,
            PathBuf::from("/media/player")
        );
        // Replaced maps do not keep the defaults
        assert!(config.device(SYS_DEVICE).is_err());
        assert_eq!(
            config.location(Location::Lyrics).unwrap(),
            Path::new("/srv/lyrics")
        );
        assert!(config.location(Location::Music).is_err());
        assert_eq!(config.playlists.device_prefix, "/sd/music");
        assert_eq!(config.playlists.extension, "m3u8");
        assert_eq!(config.scrobbling().unwrap().username, "raehik");
    }

    #[test]
    fn test_missing_device_is_config_error() {
        let config = Config::default();
        let err = config.device("usb").unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INTERNAL);
        assert!(err.to_string().contains("usb"));
    }

    #[test]
    fn test_missing_credentials_is_config_error() {
        let err = Config::default().scrobbling().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let content = "[podcasts]\nwindow_days = 0\n";
        let err = Config::from_toml(content, Path::new("test.toml")).unwrap_err();
        assert!(err.to_string().contains("window_days"));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_invalid_file_is_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[sync]\nmodify_window = \"ten\"\n").unwrap();

        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }

    #[test]
    fn test_podcast_feeds_and_remote() {
        let content = r#"
[podcasts]
window_days = 5

[[podcasts.feeds]]
name = "news"
episodes = "news/episodes"

[podcasts.remote]
host = "example.net"
port = 6176
dir = "/mnt/media/podcasts"
"#;
        let config = Config::from_toml(content, Path::new("test.toml")).unwrap();
        assert_eq!(config.podcasts.window_days, 5);
        assert_eq!(config.podcasts.feeds.len(), 1);
        assert_eq!(config.podcasts.feeds[0].name, "news");
        let remote = config.podcasts.remote.unwrap();
        assert_eq!(remote.port, 6176);
    }
}
