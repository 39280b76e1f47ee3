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
use serde::Deserialize;

const DEFAULT_FLUIDSYNTH_BINARY: &str = "fluidsynth";
const DEFAULT_GAIN: f32 = 2.0;

/// The synthesizer that renders tracks.
#[derive(Deserialize, Clone, Debug)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Synthesizer {
    Fluidsynth(Fluidsynth),
    Mock,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Synthesizer::Fluidsynth(Fluidsynth::default())
    }
}

/// Runs the fluidsynth command line synthesizer once per track.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Fluidsynth {
    /// The fluidsynth executable. Looked up on the PATH if not absolute.
    binary: Option<String>,
    /// Extra arguments placed before the generated ones.
    #[serde(default)]
    args: Vec<String>,
    gain: Option<f32>,
    /// The fluidsynth audio driver (-a), e.g. alsa or pulseaudio.
    audio_driver: Option<String>,
}

impl Fluidsynth {
    pub fn new(binary: &str, args: Vec<String>) -> Fluidsynth {
        Fluidsynth {
            binary: Some(binary.to_string()),
            args,
            gain: None,
            audio_driver: None,
        }
    }

    pub fn binary(&self) -> &str {
        self.binary.as_deref().unwrap_or(DEFAULT_FLUIDSYNTH_BINARY)
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn gain(&self) -> f32 {
        self.gain.unwrap_or(DEFAULT_GAIN)
    }

    pub fn audio_driver(&self) -> Option<&str> {
        self.audio_driver.as_deref()
    }
}
