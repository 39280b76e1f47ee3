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
use std::path::Path;

use config::{Config, Environment, File};

mod controller;
mod display;
pub mod error;
mod player;
mod synthesizer;

pub use self::controller::{Controller, Gpio, GpioPins};
pub use self::display::{Console, Display, Lcd};
pub use self::error::ConfigError;
pub use self::player::Player;
pub use self::synthesizer::{Fluidsynth, Synthesizer};

/// Environment variables starting with this override the file, e.g. MIDIBLASTER_MEDIA_PATH or
/// MIDIBLASTER_SYNTHESIZER__GAIN.
pub const ENV_PREFIX: &str = "MIDIBLASTER";

/// Loads the player configuration from a YAML file, applying environment overrides.
pub fn load(path: &Path) -> Result<Player, ConfigError> {
    let player = Config::builder()
        .add_source(File::from(path))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?
        .try_deserialize::<Player>()?;
    player.validate()?;
    Ok(player)
}
