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
use std::{
    collections::HashSet,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use tracing::info;

use super::{Status, SynthError};

#[derive(Default)]
struct State {
    soundfont: Option<PathBuf>,
    track: Option<PathBuf>,
    status: Status,
    #[cfg(test)]
    loads: Vec<PathBuf>,
    #[cfg(test)]
    plays: Vec<PathBuf>,
    failing: HashSet<PathBuf>,
}

/// A mock synthesizer. Doesn't make any sound; tracks finish only when told to.
#[derive(Clone)]
pub struct Synthesizer {
    name: String,
    state: Arc<Mutex<State>>,
}

impl Synthesizer {
    /// Gets the given mock synthesizer.
    pub fn get(name: &str) -> Synthesizer {
        Synthesizer {
            name: name.to_string(),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Simulates the end of the current track.
    #[cfg(test)]
    pub fn finish(&self) {
        let mut state = self.state.lock();
        if state.status == Status::Playing {
            state.status = Status::Finished;
        }
    }

    /// Simulates the synthesizer dying during playback.
    #[cfg(test)]
    pub fn crash(&self, reason: &str) {
        self.state.lock().status = Status::Failed(reason.to_string());
    }

    /// Makes every subsequent load or play of the given path fail.
    #[cfg(test)]
    pub fn fail(&self, path: &Path) {
        self.state.lock().failing.insert(path.to_path_buf());
    }

    /// Returns true if the synthesizer is currently playing.
    #[cfg(test)]
    pub fn is_playing(&self) -> bool {
        self.state.lock().status == Status::Playing
    }

    /// The track most recently started.
    #[cfg(test)]
    pub fn track(&self) -> Option<PathBuf> {
        self.state.lock().track.clone()
    }

    /// The soundfont currently loaded.
    #[cfg(test)]
    pub fn soundfont(&self) -> Option<PathBuf> {
        self.state.lock().soundfont.clone()
    }

    /// Every track started so far, in order.
    #[cfg(test)]
    pub fn plays(&self) -> Vec<PathBuf> {
        self.state.lock().plays.clone()
    }

    /// Every soundfont loaded so far, in order.
    #[cfg(test)]
    pub fn loads(&self) -> Vec<PathBuf> {
        self.state.lock().loads.clone()
    }
}

impl super::Synthesizer for Synthesizer {
    fn load(&self, soundfont: &Path) -> Result<(), SynthError> {
        let mut state = self.state.lock();
        if state.failing.contains(soundfont) {
            return Err(SynthError::SoundFontLoadFailed {
                path: soundfont.to_path_buf(),
                reason: "mock failure".to_string(),
            });
        }

        info!(synthesizer = self.name, soundfont = %soundfont.display(), "Loading soundfont.");
        state.soundfont = Some(soundfont.to_path_buf());
        #[cfg(test)]
        state.loads.push(soundfont.to_path_buf());
        Ok(())
    }

    fn play(&self, track: &Path) -> Result<(), SynthError> {
        let mut state = self.state.lock();
        if state.soundfont.is_none() {
            return Err(SynthError::NoSoundFont);
        }
        if state.failing.contains(track) {
            return Err(SynthError::TrackLoadFailed {
                path: track.to_path_buf(),
                reason: "mock failure".to_string(),
            });
        }

        info!(synthesizer = self.name, track = %track.display(), "Playing track.");
        state.track = Some(track.to_path_buf());
        #[cfg(test)]
        state.plays.push(track.to_path_buf());
        state.status = Status::Playing;
        Ok(())
    }

    fn pause(&self) -> Result<(), SynthError> {
        let mut state = self.state.lock();
        if state.status == Status::Playing {
            info!(synthesizer = self.name, track = ?state.track, "Pausing track.");
            state.status = Status::Paused;
        }
        Ok(())
    }

    fn resume(&self) -> Result<(), SynthError> {
        let mut state = self.state.lock();
        if state.status == Status::Paused {
            info!(synthesizer = self.name, track = ?state.track, "Resuming track.");
            state.status = Status::Playing;
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), SynthError> {
        let mut state = self.state.lock();
        if matches!(state.status, Status::Playing | Status::Paused) {
            info!(synthesizer = self.name, track = ?state.track, "Stopping track.");
        }
        state.status = Status::Idle;
        Ok(())
    }

    fn status(&self) -> Status {
        self.state.lock().status.clone()
    }
}

impl fmt::Display for Synthesizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
