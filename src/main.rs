// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
mod catalog;
mod config;
mod controller;
mod display;
mod engine;
mod media;
mod player;
mod playsync;
mod state;
mod synth;
#[cfg(test)]
mod testutil;
mod util;

use std::error::Error;
use std::path::PathBuf;

use clap::{crate_version, Parser, Subcommand};
use tracing::info;

use crate::engine::Engine;
use crate::playsync::CancelHandle;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A headless MIDI player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the soundfont categories and soundfonts under the given directory.
    Soundfonts {
        /// The soundfont root, containing one directory per category.
        root: String,
    },
    /// Lists the MIDI files in the given directory in play order.
    Tracks {
        /// The path to the media, normally its mount point.
        path: String,
    },
    /// Start will start the MIDI player.
    Start {
        /// The path to the player config.
        config_path: String,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Soundfonts { root } => {
            let catalog = catalog::scan(&PathBuf::from(root))?;
            if catalog.is_empty() {
                println!("No soundfont categories found.");
            }
            for category in catalog.categories() {
                println!("{} ({} soundfonts)", category.name(), category.soundfonts().len());
                for soundfont in category.soundfonts() {
                    println!("  {} ({})", soundfont.name(), soundfont.file_name());
                }
            }
        }
        Commands::Tracks { path } => {
            let media = media::scan(&PathBuf::from(path))?;
            if media.is_empty() {
                println!("{}", display::NO_MEDIA);
            }
            for track in media.tracks() {
                println!(
                    "{:>3}. {} ({})",
                    track.position() + 1,
                    track.name(),
                    track.file_name()
                );
            }
        }
        Commands::Start { config_path } => {
            let config = config::load(&PathBuf::from(config_path))?;
            let engine = Engine::from_config(&config)?;

            let cancel = CancelHandle::new();
            {
                let cancel = cancel.clone();
                ctrlc::set_handler(move || {
                    info!("Received shutdown signal.");
                    cancel.cancel();
                })?;
            }

            engine.run(cancel)?;
        }
    }

    Ok(())
}
