use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;

use telecine::player::{self, Options};

#[derive(Debug, Parser)]
#[command(
    name = "telecine",
    about = "Play video in the terminal as ASCII art",
    version = build_version()
)]
struct Cli {
    /// Video file to play
    file: PathBuf,

    /// Start playback immediately instead of paused
    #[arg(long)]
    auto_play: bool,

    /// Loop back to the first frame at the end instead of pausing
    #[arg(long)]
    auto_repeat: bool,
}

fn build_version() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("TELECINE_GIT_HASH") {
        Some(hash) => format!("{version} ({hash})"),
        None => version.to_owned(),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(err) = fs::metadata(&cli.file) {
        if err.kind() == io::ErrorKind::NotFound {
            bail!("file does not exist: {}", cli.file.display());
        }
        return Err(err).context(format!("failed to read {}", cli.file.display()));
    }

    player::run(Options {
        path: cli.file,
        auto_play: cli.auto_play,
        auto_repeat: cli.auto_repeat,
    })
}
