//! mp3ctl - keep a portable music player in sync with a local library.
//!
//! Every command mounts the player's partitions only for as long as it
//! needs them. Errors are printed to stderr and mapped to an exit code.

mod logging;

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use mp3ctl_core::config::{CONFIG_PATH_ENV, Config};
use mp3ctl_core::executor::SystemRunner;
use mp3ctl_core::orchestrator::{Command, Mp3Ctl};
use mp3ctl_core::Result;
use tracing::info;

/// Portable music player maintenance.
#[derive(Parser)]
#[command(name = "mp3ctl", version)]
#[command(about = "Sync music, playlists, lyrics and podcasts to a portable player and submit its scrobbles", long_about = None)]
struct Cli {
    /// Be more verbose (repeatable).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only print warnings and errors; overrides -v.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    quiet: u8,

    /// Configuration file.
    #[arg(short, long, global = true, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive the player's scrobble log and submit it, or submit the given logs.
    #[command(visible_alias = "scrobble")]
    ProcessScrobbles {
        /// Previously archived logs to submit instead of the device log.
        file: Vec<PathBuf>,

        /// Open each log in an editor before submitting it.
        #[arg(short, long)]
        edit: bool,
    },
    /// Mirror the portable music library to the player.
    #[command(visible_alias = "music")]
    CpMusic,
    /// Check, convert and copy playlists to the player.
    #[command(visible_alias = "playlists")]
    CpPlaylists,
    /// Filter, rename and copy lyrics to the player.
    #[command(visible_alias = "lyrics")]
    CpLyrics,
    /// Copy recent podcast episodes to the player.
    #[command(visible_alias = "podcasts")]
    CpPodcasts,
    /// Process scrobbles, then copy playlists, lyrics, music and podcasts.
    #[command(visible_alias = "maint")]
    Maintenance,
}

impl From<Commands> for Command {
    fn from(command: Commands) -> Self {
        match command {
            Commands::ProcessScrobbles { file, edit } => Command::ProcessScrobbles { files: file, edit },
            Commands::CpMusic => Command::CopyMusic,
            Commands::CpPlaylists => Command::CopyPlaylists,
            Commands::CpLyrics => Command::CopyLyrics,
            Commands::CpPodcasts => Command::CopyPodcasts,
            Commands::Maintenance => Command::Maintenance,
        }
    }
}

impl Cli {
    fn verbosity(&self) -> u8 {
        if self.quiet > 0 {
            0
        } else {
            self.verbose.saturating_add(1)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let verbosity = cli.verbosity();
    let config = Config::load(cli.config.as_deref())?;
    let runner = SystemRunner::with_escalation(config.mount_escalation);

    let mut ctl = Mp3Ctl::new(config, &runner, verbosity)?;
    let summary = ctl.run(&cli.command.into())?;
    for report in &summary.scrobbles {
        info!(
            "{}: {}/{} tracks scrobbled",
            report.log.display(),
            report.listened,
            report.total
        );
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbosity());

    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        process::exit(e.exit_code());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_aliases_map_to_commands() {
        let cli = Cli::try_parse_from(["mp3ctl", "maint"]).unwrap();
        assert_eq!(Command::from(cli.command), Command::Maintenance);

        let cli = Cli::try_parse_from(["mp3ctl", "scrobble", "-e", "a.txt", "b.txt"]).unwrap();
        assert_eq!(
            Command::from(cli.command),
            Command::ProcessScrobbles {
                files: vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")],
                edit: true,
            }
        );
    }

    #[test]
    fn test_verbosity() {
        let cli = Cli::try_parse_from(["mp3ctl", "music"]).unwrap();
        assert_eq!(cli.verbosity(), 1);
        let cli = Cli::try_parse_from(["mp3ctl", "-vv", "music"]).unwrap();
        assert_eq!(cli.verbosity(), 3);
        let cli = Cli::try_parse_from(["mp3ctl", "lyrics", "-q"]).unwrap();
        assert_eq!(cli.verbosity(), 0);
        let cli = Cli::try_parse_from(["mp3ctl", "-v", "-q", "music"]).unwrap();
        assert_eq!(cli.verbosity(), 0);
    }
}
