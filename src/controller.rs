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
    error::Error,
    io,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{RecvTimeoutError, Sender};
use tracing::{error, info, span, Level};

use crate::{config, player::Player, playsync::CancelHandle};

pub mod gpio;
pub mod keyboard;
#[cfg(test)]
pub mod mock;
pub mod multi;

/// How often the controller checks for cancellation while waiting for events.
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Button presses that trigger behavior in the player. Drivers emit one event per press.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    /// Toggles between playing and paused, or starts playing if stopped.
    PlayPause,

    /// Moves to the next track.
    NextTrack,

    /// Moves to the previous track.
    PrevTrack,

    /// Selects the next soundfont in the current category.
    NextSoundFont,

    /// Selects the previous soundfont in the current category.
    PrevSoundFont,

    /// Browses to the next category.
    NextCategory,

    /// Moves to a random track.
    RandomTrack,
}

/// A source of button events, such as GPIO pins or a keyboard.
pub trait Driver: Send + Sync + 'static {
    /// Starts monitoring for events on a new thread, sending them to events_tx until cancelled.
    fn monitor_events(
        &self,
        events_tx: Sender<Event>,
        cancel: CancelHandle,
    ) -> JoinHandle<Result<(), io::Error>>;
}

/// Gets the driver described by the configuration.
pub fn get_driver(config: &config::Controller) -> Result<Arc<dyn Driver>, Box<dyn Error>> {
    Ok(match config {
        config::Controller::Keyboard => Arc::new(keyboard::Driver::new()),
        config::Controller::Gpio(gpio) => Arc::new(gpio::Driver::new(gpio)?),
        config::Controller::Multi(controllers) => {
            let mut drivers = Vec::with_capacity(controllers.len());
            for (name, controller) in controllers.iter() {
                if matches!(controller, config::Controller::Multi(_)) {
                    return Err(
                        format!("nested multi controller {} is not supported", name).into()
                    );
                }
                drivers.push(get_driver(controller)?);
            }
            Arc::new(multi::Driver::new(drivers))
        }
    })
}

/// Applies button events to the player on a dedicated thread.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver. Events are handled until the cancel
    /// handle is cancelled or the driver stops.
    pub fn new(player: Arc<Player>, driver: Arc<dyn Driver>, cancel: CancelHandle) -> Controller {
        Controller {
            handle: thread::spawn(move || Controller::trigger_events(player, driver, cancel)),
        }
    }

    /// Consumes the controller, returning its thread handle.
    pub fn into_handle(self) -> JoinHandle<()> {
        self.handle
    }

    /// Triggers player events by watching the driver and getting events from it.
    fn trigger_events(player: Arc<Player>, driver: Arc<dyn Driver>, cancel: CancelHandle) {
        let span = span!(Level::INFO, "controller");
        let _enter = span.enter();

        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let join_handle = driver.monitor_events(events_tx, cancel.clone());

        info!("Controller started.");

        loop {
            if cancel.is_cancelled() {
                info!("Controller cancelled.");
                // Drivers blocked on input may never return, so they are not waited on.
                return;
            }

            match events_rx.recv_timeout(CANCEL_CHECK_INTERVAL) {
                Ok(event) => {
                    info!(event = ?event, "Received event.");
                    Controller::apply(&player, event);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    info!("Controller closing.");
                    match join_handle.join() {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => error!(err = %e, "Event monitor failed."),
                        Err(_) => error!("Event monitor panicked."),
                    }
                    return;
                }
            }
        }
    }

    fn apply(player: &Player, event: Event) {
        match event {
            Event::PlayPause => player.toggle_play(),
            Event::NextTrack => player.next(),
            Event::PrevTrack => player.prev(),
            Event::NextSoundFont => player.next_soundfont(),
            Event::PrevSoundFont => player.prev_soundfont(),
            Event::NextCategory => player.next_category(),
            Event::RandomTrack => player.random(),
        }
    }
}

#[cfg(test)]
mod test {
    use std::{path::PathBuf, sync::Arc, time::Duration};

    use crate::{
        catalog::Catalog,
        media::MediaIndex,
        player::{PlaybackStatus, Player},
        playsync::CancelHandle,
        state::StateStore,
        synth,
        testutil::{category, eventually},
    };

    use super::{mock, Controller, Event};

    #[test]
    fn test_controller() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let synthesizer = synth::mock::Synthesizer::get("mock-synthesizer");
        let store = Arc::new(StateStore::new(
            dir.path().join("state.json"),
            Duration::from_secs(10),
        ));
        let player = Arc::new(Player::new(
            Arc::new(synthesizer.clone()),
            store,
            Catalog::new(vec![
                category("Classical", &["Strings.sf2"]),
                category("Jazz", &["Brass.sf2", "PianoX.sf2"]),
            ]),
            MediaIndex::new(vec![
                PathBuf::from("/media/mididisk/01 First.mid"),
                PathBuf::from("/media/mididisk/02 Second.mid"),
                PathBuf::from("/media/mididisk/03 Third.mid"),
            ]),
            None,
            Duration::ZERO,
        ));
        let driver = Arc::new(mock::Driver::new());
        let cancel = CancelHandle::new();
        let controller = Controller::new(player.clone(), driver.clone(), cancel.clone());

        eventually(|| driver.is_monitoring(), "Driver never started");

        driver.press(Event::NextTrack);
        eventually(
            || player.snapshot().track_index() == Some(1),
            "Never moved to the second track",
        );
        driver.press(Event::PrevTrack);
        eventually(
            || player.snapshot().track_index() == Some(0),
            "Never moved back to the first track",
        );

        driver.press(Event::PlayPause);
        eventually(|| synthesizer.is_playing(), "Track never started playing");
        driver.press(Event::PlayPause);
        eventually(
            || player.snapshot().status() == PlaybackStatus::Paused,
            "Playback never paused",
        );

        driver.press(Event::NextCategory);
        eventually(
            || player.snapshot().category().map(|c| c.name()) == Some("Jazz"),
            "Category never changed",
        );
        driver.press(Event::NextSoundFont);
        eventually(
            || player.snapshot().soundfont().map(|s| s.name()) == Some("PianoX"),
            "Soundfont never changed",
        );
        driver.press(Event::PrevSoundFont);
        eventually(
            || player.snapshot().soundfont().map(|s| s.name()) == Some("Brass"),
            "Soundfont never changed back",
        );

        driver.press(Event::RandomTrack);
        eventually(
            || player.snapshot().track_index() != Some(0),
            "Random never moved",
        );

        cancel.cancel();
        assert!(controller.into_handle().join().is_ok());
        Ok(())
    }
}
