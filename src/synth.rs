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
use std::{error::Error, fmt, io, path::Path, path::PathBuf, sync::Arc};

use crate::config;

pub mod fluidsynth;
pub mod mock;

#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error("unable to load soundfont {path}: {reason}")]
    SoundFontLoadFailed { path: PathBuf, reason: String },

    #[error("unable to play track {path}: {reason}")]
    TrackLoadFailed { path: PathBuf, reason: String },

    #[error("no soundfont has been loaded")]
    NoSoundFont,

    #[error("synthesizer process error: {0}")]
    Process(#[from] io::Error),

    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
}

/// What the synthesizer is currently doing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Status {
    /// Nothing has been started, or playback was stopped.
    #[default]
    Idle,
    Playing,
    Paused,
    /// The track reached its end.
    Finished,
    /// Playback ended abnormally.
    Failed(String),
}

/// A synthesizer renders a MIDI file through a soundfont to the audio output. Only one soundfont
/// is loaded at a time; loading another replaces it.
pub trait Synthesizer: fmt::Display + Send + Sync {
    /// Loads the soundfont used by subsequent calls to play.
    fn load(&self, soundfont: &Path) -> Result<(), SynthError>;

    /// Starts streaming the given track, replacing anything that is playing.
    fn play(&self, track: &Path) -> Result<(), SynthError>;

    /// Pauses the current track.
    fn pause(&self) -> Result<(), SynthError>;

    /// Resumes a paused track.
    fn resume(&self) -> Result<(), SynthError>;

    /// Halts playback.
    fn stop(&self) -> Result<(), SynthError>;

    /// Reports the playback status, including end-of-stream.
    fn status(&self) -> Status;
}

/// Gets the synthesizer described by the configuration.
pub fn get_synthesizer(
    config: &config::Synthesizer,
) -> Result<Arc<dyn Synthesizer>, Box<dyn Error>> {
    match config {
        config::Synthesizer::Fluidsynth(fluidsynth) => Ok(Arc::new(
            fluidsynth::Synthesizer::new(fluidsynth)?,
        )),
        config::Synthesizer::Mock => Ok(Arc::new(mock::Synthesizer::get("mock-synthesizer"))),
    }
}
