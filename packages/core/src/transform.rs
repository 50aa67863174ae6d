//! Content transformation rules for the player's firmware.
//!
//! Pure functions with no filesystem access: playlist line rewriting, lyric
//! file naming and filtering, and podcast episode date windows.

use chrono::{Days, NaiveDate};

/// Date format used as the prefix of podcast episode filenames.
pub const EPISODE_DATE_FORMAT: &str = "%Y%m%d";

/// Playlist rewriting rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistRules {
    /// Device-relative path prepended to every track.
    pub prefix: String,
    /// Extensions whose tracks were transcoded for the player.
    pub converted_extensions: Vec<String>,
    /// Extension of the transcoded tracks on the player.
    pub substitute_extension: String,
}

impl PlaylistRules {
    /// Rewrites one playlist line for the player.
    ///
    /// The track is prefixed with the device path, and a converted extension
    /// (case-sensitive, text after the final `.` of the file name) is swapped
    /// for the substitute. Blank lines and `#` directives are returned as-is.
    ///
    /// ```
    /// use mp3ctl_core::transform::PlaylistRules;
    ///
    /// let rules = PlaylistRules {
    ///     prefix: "/<microSD1>/music".to_string(),
    ///     converted_extensions: vec!["flac".to_string()],
    ///     substitute_extension: "ogg".to_string(),
    /// };
    /// assert_eq!(
    ///     rules.rewrite_line("Artist/Album/01 Song.flac"),
    ///     "/<microSD1>/music/Artist/Album/01 Song.ogg"
    /// );
    /// ```
    pub fn rewrite_line(&self, line: &str) -> String {
        let track = line.trim();
        if track.is_empty() || track.starts_with('#') {
            return track.to_string();
        }

        let prefixed = format!("{}/{}", self.prefix, track);
        match split_extension(&prefixed) {
            Some((stem, ext)) if self.converted_extensions.iter().any(|c| c == ext) => {
                format!("{}.{}", stem, self.substitute_extension)
            }
            _ => prefixed,
        }
    }

    /// Rewrites every line of a playlist, one track per output line.
    pub fn rewrite_playlist(&self, content: &str) -> String {
        let mut output = String::with_capacity(content.len());
        for line in content.lines() {
            output.push_str(&self.rewrite_line(line));
            output.push('\n');
        }
        output
    }
}

/// Splits `path` at the extension of its final component.
///
/// Returns `None` when the file name has no extension; a leading dot (hidden
/// file) does not start an extension.
fn split_extension(path: &str) -> Option<(&str, &str)> {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    let name = &path[name_start..];
    let dot = name.rfind('.').filter(|&i| i > 0)?;
    let split = name_start + dot;
    Some((&path[..split], &path[split + 1..]))
}

/// Replaces the extension of a file name, or appends one if it has none.
pub fn with_extension(file_name: &str, extension: &str) -> String {
    let stem = split_extension(file_name).map_or(file_name, |(stem, _)| stem);
    format!("{stem}.{extension}")
}

/// Maps `"<artist> - <title>.txt"` to `"<title>.txt"`.
///
/// Names that do not split into exactly two parts on `" - "` return `None`
/// and are left unrenamed.
pub fn lyric_file_name(file_name: &str) -> Option<String> {
    let stem = file_name.strip_suffix(".txt")?;
    let mut parts = stem.split(" - ");
    let (_artist, title) = (parts.next()?, parts.next()?);
    if parts.next().is_some() || title.is_empty() {
        return None;
    }
    Some(format!("{title}.txt"))
}

/// True if a lyric file's content is only a placeholder marker.
pub fn is_unwanted_lyric(content: &str, markers: &[String]) -> bool {
    let content = content.trim();
    markers.iter().any(|m| m == content)
}

/// Date prefixes for the trailing window of `days` days ending `today`,
/// newest first.
pub fn episode_date_prefixes(today: NaiveDate, days: u32) -> Vec<String> {
    (0..days)
        .filter_map(|offset| today.checked_sub_days(Days::new(u64::from(offset))))
        .map(|date| date.format(EPISODE_DATE_FORMAT).to_string())
        .collect()
}

/// Selects episode file names starting with any of `prefixes`.
///
/// The result is sorted so the copy order is stable.
pub fn select_episodes<'a, I>(file_names: I, prefixes: &[String]) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut selected: Vec<&str> = file_names
        .into_iter()
        .filter(|name| prefixes.iter().any(|p| name.starts_with(p.as_str())))
        .collect();
    selected.sort_unstable();
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> PlaylistRules {
        PlaylistRules {
            prefix: "/<microSD1>/music".to_string(),
            converted_extensions: vec!["flac".to_string()],
            substitute_extension: "ogg".to_string(),
        }
    }

    #[test]
    fn test_rewrite_converted_extension() {
        assert_eq!(
            rules().rewrite_line("Boards of Canada/Geogaddi/01 Ready Lets Go.flac"),
            "/<microSD1>/music/Boards of Canada/Geogaddi/01 Ready Lets Go.ogg"
        );
    }

    #[test]
    fn test_rewrite_keeps_other_extensions() {
        for track in ["a/b.mp3", "a/b.ogg", "a/b.FLAC", "a/b.flac.mp3"] {
            let rewritten = rules().rewrite_line(track);
            assert_eq!(rewritten, format!("/<microSD1>/music/{track}"));
        }
    }

    #[test]
    fn test_rewrite_always_prefixed_with_player_extension() {
        let rules = rules();
        let lines = ["x.flac", "dir.flac/x", "y.mp3", "z", "a b/c.d.flac", ".hidden"];
        for line in lines {
            let rewritten = rules.rewrite_line(line);
            assert!(rewritten.starts_with("/<microSD1>/music/"));
            assert!(!rewritten.ends_with(".flac"));
        }
    }

    #[test]
    fn test_rewrite_no_extension_and_directory_dots() {
        assert_eq!(rules().rewrite_line("Artist/Track"), "/<microSD1>/music/Artist/Track");
        assert_eq!(
            rules().rewrite_line("Art.flac/Track"),
            "/<microSD1>/music/Art.flac/Track"
        );
        assert_eq!(rules().rewrite_line("Artist/.flac"), "/<microSD1>/music/Artist/.flac");
    }

    #[test]
    fn test_rewrite_strips_line_ending_and_keeps_directives() {
        assert_eq!(rules().rewrite_line("a/b.flac\r\n"), "/<microSD1>/music/a/b.ogg");
        assert_eq!(rules().rewrite_line("#EXTM3U"), "#EXTM3U");
        assert_eq!(rules().rewrite_line("   "), "");
    }

    #[test]
    fn test_rewrite_playlist() {
        let content = "a/1.flac\nb/2.mp3\n";
        assert_eq!(
            rules().rewrite_playlist(content),
            "/<microSD1>/music/a/1.ogg\n/<microSD1>/music/b/2.mp3\n"
        );
    }

    #[test]
    fn test_with_extension() {
        assert_eq!(with_extension("chill.m3u", "m3u8"), "chill.m3u8");
        assert_eq!(with_extension("chill", "m3u8"), "chill.m3u8");
        assert_eq!(with_extension("a.b.m3u", "m3u8"), "a.b.m3u8");
    }

    #[test]
    fn test_lyric_file_name() {
        assert_eq!(
            lyric_file_name("Radiohead - Reckoner.txt").as_deref(),
            Some("Reckoner.txt")
        );
        assert_eq!(lyric_file_name("Reckoner.txt"), None);
        assert_eq!(lyric_file_name("A - B - C.txt"), None);
        assert_eq!(lyric_file_name("Radiohead - Reckoner.lrc"), None);
        assert_eq!(lyric_file_name("Radiohead - .txt"), None);
    }

    #[test]
    fn test_lyric_rename_idempotent() {
        for name in ["Artist - Title.txt", "Sigur Rós - Hoppípolla.txt"] {
            let renamed = lyric_file_name(name).unwrap();
            assert_eq!(lyric_file_name(&renamed), None);
        }
    }

    #[test]
    fn test_unwanted_lyric() {
        let markers = vec!["[instrumental]".to_string()];
        assert!(is_unwanted_lyric("[instrumental]\n", &markers));
        assert!(is_unwanted_lyric("  [instrumental]  ", &markers));
        assert!(!is_unwanted_lyric("[instrumental] intro\nla la la", &markers));
        assert!(!is_unwanted_lyric("", &markers));
    }

    #[test]
    fn test_episode_date_prefixes() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(
            episode_date_prefixes(today, 3),
            vec!["20240301", "20240229", "20240228"]
        );
        assert_eq!(episode_date_prefixes(today, 1), vec!["20240301"]);
    }

    #[test]
    fn test_select_episodes() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let prefixes = episode_date_prefixes(today, 3);
        let names = [
            "20240102-0700.mp3",
            "20231231-1900.mp3",
            "20231230-0700.mp3",
            "20240101-1900.mp3",
            "20240103-0700.mp3",
            "notes.txt",
        ];
        assert_eq!(
            select_episodes(names, &prefixes),
            vec!["20231231-1900.mp3", "20240101-1900.mp3", "20240102-0700.mp3"]
        );
    }

    #[test]
    fn test_select_episodes_empty_when_nothing_recent() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let prefixes = episode_date_prefixes(today, 3);
        assert!(select_episodes(["20240601-0700.mp3", "20240611-0700.mp3"], &prefixes).is_empty());
    }
}
