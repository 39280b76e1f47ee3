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
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use rand::Rng;
use tracing::{debug, error, info, span, warn, Level, Span};

use crate::{
    catalog::{Catalog, Category, SoundFont},
    media::{MediaIndex, Track},
    state::{Preferences, StateStore},
    synth::{Status, Synthesizer},
};

/// The playback status of the player.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackStatus {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// A category that has been browsed to but not yet selected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Preview {
    category: usize,
    deadline: Instant,
}

/// The selection and status shared between the input, display and main threads. Indices are
/// always valid for the catalog and media snapshots held alongside them.
#[derive(Clone, Debug, Default)]
pub struct PlaybackState {
    status: PlaybackStatus,
    track: Option<usize>,
    category: Option<usize>,
    soundfont: Option<usize>,
    preview: Option<Preview>,
    catalog: Arc<Catalog>,
    media: Arc<MediaIndex>,
}

impl PlaybackState {
    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    #[cfg(test)]
    pub fn track_index(&self) -> Option<usize> {
        self.track
    }

    pub fn track(&self) -> Option<&Track> {
        self.track.and_then(|index| self.media.track(index))
    }

    #[cfg(test)]
    pub fn category_index(&self) -> Option<usize> {
        self.category
    }

    pub fn category(&self) -> Option<&Category> {
        self.category.and_then(|index| self.catalog.category(index))
    }

    #[cfg(test)]
    pub fn soundfont_index(&self) -> Option<usize> {
        self.soundfont
    }

    pub fn soundfont(&self) -> Option<&SoundFont> {
        self.category()
            .zip(self.soundfont)
            .and_then(|(category, index)| category.soundfont(index))
    }

    /// The category being browsed, if a category change is waiting for confirmation.
    pub fn preview(&self) -> Option<&Category> {
        self.preview
            .and_then(|preview| self.catalog.category(preview.category))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn media(&self) -> &MediaIndex {
        &self.media
    }

    fn preferences(&self) -> Preferences {
        Preferences {
            category: self.category().map(|category| category.name().to_string()),
            soundfont: self.soundfont().map(|soundfont| soundfont.name().to_string()),
        }
    }

    /// Selects the given category and its first soundfont.
    fn select_category(&mut self, index: usize) {
        self.category = Some(index);
        self.soundfont = self
            .catalog
            .category(index)
            .filter(|category| !category.is_empty())
            .map(|_| 0);
    }
}

/// What the synthesizer has been told to do.
#[derive(Default)]
struct Transport {
    /// The soundfont loaded into the synthesizer.
    soundfont: Option<PathBuf>,
    /// The track the synthesizer is playing or paused on.
    track: Option<PathBuf>,
    /// Consecutive tracks that ended abnormally.
    failures: usize,
}

/// The playback state machine. Selection changes are made under the state lock and synthesizer
/// commands are issued under the transport lock, so displays never wait on the synthesizer.
/// The transport lock is always taken before the state lock.
pub struct Player {
    synthesizer: Arc<dyn Synthesizer>,
    state: Mutex<PlaybackState>,
    transport: Mutex<Transport>,
    store: Arc<StateStore>,
    /// How long a browsed category is previewed before it is selected.
    category_confirm_delay: Duration,
    changes_tx: Sender<()>,
    changes_rx: Receiver<()>,
    span: Span,
}

impl Player {
    /// Creates a new player, restoring the category and soundfont from the stored preferences.
    /// Playback always starts stopped at the first track.
    pub fn new(
        synthesizer: Arc<dyn Synthesizer>,
        store: Arc<StateStore>,
        catalog: Catalog,
        media: MediaIndex,
        default_category: Option<&str>,
        category_confirm_delay: Duration,
    ) -> Player {
        let span = span!(Level::INFO, "player");
        let _enter = span.enter();

        let preferences = store.load();
        let category = preferences
            .category
            .as_deref()
            .and_then(|name| catalog.position(name))
            .or_else(|| default_category.and_then(|name| catalog.position(name)))
            .and_then(|index| catalog.clamp(index))
            .or_else(|| catalog.first_selectable());

        let mut state = PlaybackState {
            track: if media.is_empty() { None } else { Some(0) },
            catalog: Arc::new(catalog),
            media: Arc::new(media),
            ..Default::default()
        };
        if let Some(category) = category {
            state.select_category(category);
            if let Some(soundfont) = state
                .category()
                .zip(preferences.soundfont.as_deref())
                .and_then(|(category, name)| category.position(name))
            {
                state.soundfont = Some(soundfont);
            }
        }

        info!(
            category = ?state.category().map(|category| category.name()),
            soundfont = ?state.soundfont().map(|soundfont| soundfont.name()),
            tracks = state.media.len(),
            "Restored selection."
        );

        let (changes_tx, changes_rx) = crossbeam_channel::bounded(1);
        drop(_enter);
        Player {
            synthesizer,
            state: Mutex::new(state),
            transport: Mutex::new(Transport::default()),
            store,
            category_confirm_delay,
            changes_tx,
            changes_rx,
            span,
        }
    }

    /// Returns a consistent copy of the current state.
    pub fn snapshot(&self) -> PlaybackState {
        self.state.lock().clone()
    }

    /// Returns a receiver that is signalled whenever the state changes. Signals are coalesced.
    pub fn changes(&self) -> Receiver<()> {
        self.changes_rx.clone()
    }

    /// Plays the selected track.
    pub fn play(&self) {
        let _enter = self.span.enter();
        self.play_locked(&mut self.transport.lock());
    }

    fn play_locked(&self, transport: &mut Transport) {
        {
            let mut state = self.state.lock();
            if state.track.is_none() && !state.media.is_empty() {
                state.track = Some(0);
            }
        }
        self.start(transport);
    }

    /// Pauses playback. Does nothing unless playing.
    pub fn pause(&self) {
        let _enter = self.span.enter();
        self.pause_locked(&mut self.transport.lock());
    }

    fn pause_locked(&self, transport: &mut Transport) {
        if self.state.lock().status != PlaybackStatus::Playing {
            debug!("Not playing, nothing to pause.");
            return;
        }

        match self.synthesizer.pause() {
            Ok(()) => {
                self.state.lock().status = PlaybackStatus::Paused;
                info!("Paused.");
                self.changed();
            }
            Err(e) => {
                error!(err = %e, "Unable to pause, stopping instead.");
                self.halt(transport);
            }
        }
    }

    /// Resumes playback. If the selection changed while paused, the new selection is started
    /// instead.
    pub fn resume(&self) {
        let _enter = self.span.enter();
        self.resume_locked(&mut self.transport.lock());
    }

    fn resume_locked(&self, transport: &mut Transport) {
        let unchanged = {
            let state = self.state.lock();
            if state.status != PlaybackStatus::Paused {
                debug!("Not paused, nothing to resume.");
                return;
            }
            transport.track.as_deref() == state.track().map(|track| track.path())
                && transport.soundfont.as_deref()
                    == state.soundfont().map(|soundfont| soundfont.path())
        };

        if !unchanged {
            info!("Selection changed while paused, restarting.");
            self.start(transport);
            return;
        }

        match self.synthesizer.resume() {
            Ok(()) => {
                self.state.lock().status = PlaybackStatus::Playing;
                info!("Resumed.");
                self.changed();
            }
            Err(e) => {
                error!(err = %e, "Unable to resume, restarting the track.");
                self.start(transport);
            }
        }
    }

    /// Stops playback.
    pub fn stop(&self) {
        let _enter = self.span.enter();
        let mut transport = self.transport.lock();
        info!("Stopping playback.");
        self.halt(&mut transport);
    }

    /// Toggles between playing and paused, starting playback if stopped.
    pub fn toggle_play(&self) {
        let _enter = self.span.enter();
        let mut transport = self.transport.lock();
        let status = self.state.lock().status;
        match status {
            PlaybackStatus::Playing => self.pause_locked(&mut transport),
            PlaybackStatus::Paused => self.resume_locked(&mut transport),
            PlaybackStatus::Stopped => self.play_locked(&mut transport),
        }
    }

    /// Moves to the next track, wrapping to the first.
    pub fn next(&self) {
        self.navigate(|current, len| (current + 1) % len);
    }

    /// Moves to the previous track, wrapping to the last.
    pub fn prev(&self) {
        self.navigate(|current, len| (current + len - 1) % len);
    }

    /// Moves to a random track other than the current one.
    pub fn random(&self) {
        self.navigate(|current, len| {
            if len < 2 {
                return 0;
            }
            let index = rand::thread_rng().gen_range(0..len - 1);
            if index >= current {
                index + 1
            } else {
                index
            }
        });
    }

    /// Changes the selected track. Playback follows the selection only while playing.
    fn navigate<F>(&self, choose: F)
    where
        F: FnOnce(usize, usize) -> usize,
    {
        let _enter = self.span.enter();
        let mut transport = self.transport.lock();
        let playing = {
            let mut state = self.state.lock();
            let len = state.media.len();
            if len == 0 {
                info!("No tracks to navigate.");
                return;
            }
            let index = choose(state.track.unwrap_or(0).min(len - 1), len);
            state.track = Some(index);
            info!(
                track = ?state.track().map(|track| track.name()),
                index, "Selected track."
            );
            state.status == PlaybackStatus::Playing
        };

        if playing {
            self.start(&mut transport);
        } else {
            self.changed();
        }
    }

    /// Advances to the next track after the current one ended. Ignored unless playing.
    fn on_track_finished(&self, transport: &mut Transport) {
        {
            let mut state = self.state.lock();
            if state.status != PlaybackStatus::Playing {
                debug!(status = ?state.status, "Ignoring end of track while not playing.");
                return;
            }
            let len = state.media.len();
            if len == 0 {
                drop(state);
                self.halt(transport);
                return;
            }
            state.track = Some(state.track.map_or(0, |track| (track + 1) % len));
            info!(
                track = ?state.track().map(|track| track.name()),
                "Advancing to the next track."
            );
        }
        self.start(transport);
    }

    /// Checks the synthesizer for the end of the current track and advances if it has ended.
    pub fn poll_synthesizer(&self) {
        let _enter = self.span.enter();
        let mut transport = self.transport.lock();
        let (playing, tracks) = {
            let state = self.state.lock();
            (state.status == PlaybackStatus::Playing, state.media.len())
        };
        if !playing {
            return;
        }

        match self.synthesizer.status() {
            Status::Playing | Status::Paused => {}
            Status::Finished => {
                transport.failures = 0;
                self.on_track_finished(&mut transport);
            }
            Status::Failed(reason) => {
                transport.failures += 1;
                if transport.failures >= tracks {
                    error!(reason = %reason, "Every track failed, stopping.");
                    transport.failures = 0;
                    self.halt(&mut transport);
                    return;
                }
                error!(reason = %reason, "Track failed, skipping it.");
                self.on_track_finished(&mut transport);
            }
            Status::Idle => {
                warn!("Synthesizer stopped unexpectedly.");
                self.halt(&mut transport);
            }
        }
    }

    /// Selects a soundfont within a category. If playing, the current track restarts with it. A
    /// category being previewed stays previewed.
    pub fn set_soundfont(&self, category: usize, soundfont: usize) {
        let _enter = self.span.enter();
        let mut transport = self.transport.lock();
        let playing = {
            let mut state = self.state.lock();
            let Some(selected) = state.catalog.category(category) else {
                warn!(category, "No such category.");
                return;
            };
            if soundfont >= selected.soundfonts().len() {
                warn!(category = selected.name(), soundfont, "No such soundfont.");
                return;
            }
            state.category = Some(category);
            state.soundfont = Some(soundfont);
            info!(soundfont = ?state.soundfont().map(|s| s.name()), "Selected soundfont.");
            state.status == PlaybackStatus::Playing
        };
        self.selection_changed(&mut transport, playing);
    }

    /// Selects the next soundfont in the current category, wrapping to the first.
    pub fn next_soundfont(&self) {
        self.step_soundfont(|current, len| (current + 1) % len);
    }

    /// Selects the previous soundfont in the current category, wrapping to the last.
    pub fn prev_soundfont(&self) {
        self.step_soundfont(|current, len| (current + len - 1) % len);
    }

    /// Moves within the current category. The category is read and the soundfont written under
    /// the same hold of the state lock.
    fn step_soundfont<F>(&self, choose: F)
    where
        F: FnOnce(usize, usize) -> usize,
    {
        let _enter = self.span.enter();
        let mut transport = self.transport.lock();
        let playing = {
            let mut state = self.state.lock();
            let len = state.category().map_or(0, |c| c.soundfonts().len());
            if len == 0 {
                info!("No soundfonts in the current category.");
                return;
            }
            let current = state.soundfont.unwrap_or(0).min(len - 1);
            state.soundfont = Some(choose(current, len));
            info!(soundfont = ?state.soundfont().map(|s| s.name()), "Selected soundfont.");
            state.status == PlaybackStatus::Playing
        };
        self.selection_changed(&mut transport, playing);
    }

    /// Browses to the next category holding soundfonts. The category is selected once no further
    /// presses arrive within the confirmation delay, or immediately if there is no delay.
    pub fn next_category(&self) {
        self.next_category_at(Instant::now());
    }

    fn next_category_at(&self, now: Instant) {
        let _enter = self.span.enter();
        let mut transport = self.transport.lock();
        let playing = {
            let mut state = self.state.lock();
            let from = state
                .preview
                .map(|preview| preview.category)
                .or(state.category)
                .unwrap_or(0);
            let Some(next) = state.catalog.next_selectable(from) else {
                info!("No categories to browse.");
                return;
            };

            if !self.category_confirm_delay.is_zero() {
                state.preview = Some(Preview {
                    category: next,
                    deadline: now + self.category_confirm_delay,
                });
                debug!(
                    category = ?state.preview().map(|category| category.name()),
                    "Previewing category."
                );
                drop(state);
                self.changed();
                return;
            }

            state.select_category(next);
            info!(category = ?state.category().map(|c| c.name()), "Selected category.");
            state.status == PlaybackStatus::Playing
        };
        self.selection_changed(&mut transport, playing);
    }

    /// Selects the previewed category if its confirmation delay has passed.
    pub fn confirm_category(&self, now: Instant) {
        let _enter = self.span.enter();
        let mut transport = self.transport.lock();
        let playing = {
            let mut state = self.state.lock();
            let Some(preview) = state.preview.filter(|preview| now >= preview.deadline) else {
                return;
            };
            state.preview = None;
            state.select_category(preview.category);
            info!(category = ?state.category().map(|c| c.name()), "Selected category.");
            state.status == PlaybackStatus::Playing
        };
        self.selection_changed(&mut transport, playing);
    }

    /// Swaps in a rescanned media index. The current track keeps playing if it is still present;
    /// otherwise playback stops at the first track. Returns true if the media changed.
    pub fn replace_media(&self, media: MediaIndex) -> bool {
        let _enter = self.span.enter();
        let mut transport = self.transport.lock();
        let vanished = {
            let mut state = self.state.lock();
            if *state.media == media {
                return false;
            }

            let current = state.track().map(|track| track.path().to_path_buf());
            let remapped = current.as_deref().and_then(|path| media.position(path));
            info!(
                tracks = media.len(),
                generation = media.generation(),
                "Media changed."
            );
            state.media = Arc::new(media);
            match remapped {
                Some(index) => {
                    state.track = Some(index);
                    false
                }
                None => {
                    state.track = if state.media.is_empty() { None } else { Some(0) };
                    current.is_some() && state.status != PlaybackStatus::Stopped
                }
            }
        };

        if vanished {
            warn!("The current track is gone, stopping.");
            self.halt(&mut transport);
        } else {
            self.changed();
        }
        true
    }

    /// Swaps in a rescanned catalog, keeping the selection by name where possible and clamping
    /// it otherwise. Returns true if the catalog changed.
    pub fn replace_catalog(&self, catalog: Catalog) -> bool {
        let _enter = self.span.enter();
        let mut transport = self.transport.lock();
        let restart = {
            let mut state = self.state.lock();
            if *state.catalog == catalog {
                return false;
            }

            let category_name = state.category().map(|c| c.name().to_string());
            let soundfont_path = state.soundfont().map(|s| s.path().to_path_buf());
            let soundfont_name = state.soundfont().map(|s| s.name().to_string());
            let preview_name = state.preview().map(|c| c.name().to_string());

            let category = category_name
                .as_deref()
                .and_then(|name| catalog.position(name))
                .or(state.category)
                .and_then(|index| catalog.clamp(index))
                .or_else(|| catalog.first_selectable());
            let preview = state.preview.and_then(|preview| {
                preview_name
                    .as_deref()
                    .and_then(|name| catalog.position(name))
                    .map(|category| Preview {
                        category,
                        deadline: preview.deadline,
                    })
            });

            info!(categories = catalog.len(), "Soundfont catalog changed.");
            state.catalog = Arc::new(catalog);
            state.preview = preview;
            state.category = None;
            state.soundfont = None;
            if let Some(category) = category {
                state.select_category(category);
                if let Some(soundfont) = state
                    .category()
                    .zip(soundfont_name.as_deref())
                    .and_then(|(category, name)| category.position(name))
                {
                    state.soundfont = Some(soundfont);
                }
            }

            state.status == PlaybackStatus::Playing
                && state.soundfont().map(|s| s.path()) != soundfont_path.as_deref()
        };

        if restart {
            self.start(&mut transport);
        } else {
            self.changed();
        }
        true
    }

    /// Persists the selection and restarts playback with it if playing.
    fn selection_changed(&self, transport: &mut Transport, playing: bool) {
        let preferences = self.state.lock().preferences();
        self.store.schedule(preferences);
        if playing {
            self.start(transport);
        } else {
            self.changed();
        }
    }

    /// Starts the selected track with the selected soundfont. Soundfonts and tracks that the
    /// synthesizer rejects are skipped, each at most once; if nothing can be played, playback
    /// stops.
    fn start(&self, transport: &mut Transport) {
        let mut rejected_soundfonts = 0;
        let mut rejected_tracks = 0;

        if transport.track.take().is_some() {
            if let Err(e) = self.synthesizer.stop() {
                warn!(err = %e, "Unable to stop the previous track.");
            }
        }

        loop {
            let (soundfont, track) = {
                let state = self.state.lock();
                match (state.soundfont(), state.track()) {
                    (Some(soundfont), Some(track)) => {
                        (soundfont.path().to_path_buf(), track.path().to_path_buf())
                    }
                    (None, _) => {
                        drop(state);
                        warn!("No soundfont selected, unable to play.");
                        self.halt(transport);
                        return;
                    }
                    (_, None) => {
                        drop(state);
                        warn!("No tracks available, unable to play.");
                        self.halt(transport);
                        return;
                    }
                }
            };

            if transport.soundfont.as_ref() != Some(&soundfont) {
                transport.soundfont = None;
                if let Err(e) = self.synthesizer.load(&soundfont) {
                    error!(err = %e, "Synthesizer rejected the soundfont.");
                    rejected_soundfonts += 1;
                    if !self.skip_soundfont(rejected_soundfonts) {
                        error!("No soundfont in this category could be loaded, stopping.");
                        self.halt(transport);
                        return;
                    }
                    continue;
                }
                transport.soundfont = Some(soundfont);
            }

            match self.synthesizer.play(&track) {
                Ok(()) => {
                    info!(track = %track.display(), "Playing.");
                    transport.track = Some(track);
                    self.state.lock().status = PlaybackStatus::Playing;
                    self.changed();
                    return;
                }
                Err(e) => {
                    error!(err = %e, "Synthesizer rejected the track.");
                    rejected_tracks += 1;
                    if !self.skip_track(rejected_tracks) {
                        error!("No track could be played, stopping.");
                        self.halt(transport);
                        return;
                    }
                }
            }
        }
    }

    /// Moves to the next soundfont in the category unless every one has been rejected.
    fn skip_soundfont(&self, rejected: usize) -> bool {
        let preferences = {
            let mut state = self.state.lock();
            let len = state.category().map_or(0, |c| c.soundfonts().len());
            if rejected >= len {
                return false;
            }
            state.soundfont = Some(state.soundfont.map_or(0, |index| (index + 1) % len));
            state.preferences()
        };
        self.store.schedule(preferences);
        true
    }

    /// Moves to the next track unless every one has been rejected.
    fn skip_track(&self, rejected: usize) -> bool {
        let mut state = self.state.lock();
        let len = state.media.len();
        if rejected >= len {
            return false;
        }
        state.track = Some(state.track.map_or(0, |index| (index + 1) % len));
        true
    }

    /// Stops the synthesizer and marks playback as stopped.
    fn halt(&self, transport: &mut Transport) {
        if let Err(e) = self.synthesizer.stop() {
            error!(err = %e, "Unable to stop the synthesizer.");
        }
        transport.track = None;
        self.state.lock().status = PlaybackStatus::Stopped;
        self.changed();
    }

    fn changed(&self) {
        // A pending signal already covers this change.
        let _ = self.changes_tx.try_send(());
    }
}
