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

//! Wires the player to its devices and runs the housekeeping loop: noticing the end of tracks,
//! committing category previews and picking up media or soundfont changes.

use std::{
    error::Error,
    path::{Path, PathBuf},
    sync::Arc,
    thread::JoinHandle,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use tracing::{debug, error, info, span, warn, Level};

use crate::{
    catalog::{self, Catalog},
    config,
    controller::{self, Controller, Driver},
    display::{self, Device, DisplayController, Screen},
    media::{MediaIndex, Mount},
    player::Player,
    playsync::CancelHandle,
    state::StateStore,
    synth::{self, Synthesizer},
    util,
};

/// How long the title screen is shown before the player takes over the display.
const SPLASH_DURATION: Duration = Duration::from_secs(2);

/// The running MIDI player.
pub struct Engine {
    player: Arc<Player>,
    store: Arc<StateStore>,
    driver: Arc<dyn Driver>,
    device: Arc<dyn Device>,
    mount: Mutex<Mount>,
    soundfont_root: PathBuf,
    poll_interval: Duration,
    media_refresh_interval: Duration,
    display_refresh_interval: Duration,
    shutdown_timeout: Duration,
}

impl Engine {
    /// Creates the engine and its devices from the configuration. Failing to reach the display or
    /// the buttons is fatal.
    pub fn from_config(config: &config::Player) -> Result<Engine, Box<dyn Error>> {
        let device = display::get_device(config.display())?;
        let driver = controller::get_driver(config.controller())?;
        let synthesizer = synth::get_synthesizer(config.synthesizer())?;
        Engine::new(config, synthesizer, driver, device)
    }

    /// Creates the engine with the given devices, restoring the saved selection.
    pub fn new(
        config: &config::Player,
        synthesizer: Arc<dyn Synthesizer>,
        driver: Arc<dyn Driver>,
        device: Arc<dyn Device>,
    ) -> Result<Engine, Box<dyn Error>> {
        let span = span!(Level::INFO, "engine");
        let _enter = span.enter();

        let media_path = config.media_path();
        let soundfont_root = config.soundfont_root();
        info!(
            synthesizer = %synthesizer,
            display = %device,
            media_path = %media_path.display(),
            soundfont_root = %soundfont_root.display(),
            "Starting MIDI player."
        );

        let mut mount = Mount::new(media_path);
        let store = Arc::new(StateStore::new(config.state_file(), config.save_delay()?));
        let player = Arc::new(Player::new(
            synthesizer,
            store.clone(),
            scan_catalog(&soundfont_root),
            scan_media(&mut mount).unwrap_or_default(),
            config.default_category(),
            config.category_confirm_delay()?,
        ));

        Ok(Engine {
            player,
            store,
            driver,
            device,
            mount: Mutex::new(mount),
            soundfont_root,
            poll_interval: config.poll_interval()?,
            media_refresh_interval: config.media_refresh_interval()?,
            display_refresh_interval: config.display_refresh_interval()?,
            shutdown_timeout: config.shutdown_timeout()?,
        })
    }

    pub fn player(&self) -> Arc<Player> {
        self.player.clone()
    }

    /// Runs until the cancel handle is cancelled, then shuts down cleanly. Returns an error if the
    /// buttons stop working, so that a supervisor can restart the player.
    pub fn run(&self, cancel: CancelHandle) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::INFO, "engine");
        let _enter = span.enter();

        let mut screen = Screen::new(self.device.clone());
        screen.show(display::splash(screen.width()));
        cancel.wait_timeout(SPLASH_DURATION);

        let display = DisplayController::new(
            self.player.clone(),
            screen,
            self.display_refresh_interval,
            cancel.clone(),
        )
        .into_handle();
        let controller =
            Controller::new(self.player.clone(), self.driver.clone(), cancel.clone())
                .into_handle();

        let result = self.housekeeping(&controller, &cancel);
        self.shutdown(&cancel, vec![("display", display), ("controller", controller)]);
        result
    }

    fn housekeeping(
        &self,
        controller: &JoinHandle<()>,
        cancel: &CancelHandle,
    ) -> Result<(), Box<dyn Error>> {
        info!("MIDI player running.");
        let mut last_refresh = Instant::now();
        let mut media_available = self.mount.lock().path().is_dir();

        while !cancel.is_cancelled() {
            self.player.poll_synthesizer();
            self.player.confirm_category(Instant::now());

            if last_refresh.elapsed() >= self.media_refresh_interval {
                last_refresh = Instant::now();
                media_available = self.refresh(media_available);
            }

            if controller.is_finished() && !cancel.is_cancelled() {
                error!("Buttons stopped responding.");
                return Err("input controller stopped".into());
            }

            cancel.wait_timeout(self.poll_interval);
        }

        Ok(())
    }

    /// Rescans the media and the soundfonts, swapping in whatever changed. Returns whether the
    /// media is mounted, so that mounting and unmounting are only logged once.
    fn refresh(&self, was_available: bool) -> bool {
        let scanned = self.mount.lock().scan();
        let media = match scanned {
            Ok(media) => {
                if !was_available {
                    info!(tracks = media.len(), "Media mounted.");
                }
                Some(media)
            }
            Err(e) => {
                if was_available {
                    warn!(err = %e, "Media went away.");
                }
                None
            }
        };
        let available = media.is_some();
        self.player.replace_media(media.unwrap_or_default());

        let catalog = catalog::scan(&self.soundfont_root).unwrap_or_else(|e| {
            debug!(err = %e, "Unable to rescan soundfonts.");
            Catalog::default()
        });
        self.player.replace_catalog(catalog);
        available
    }

    /// Stops taking input, saves any pending selection, silences the synthesizer and waits a
    /// bounded time for the worker threads.
    fn shutdown(&self, cancel: &CancelHandle, handles: Vec<(&str, JoinHandle<()>)>) {
        info!("Shutting down.");
        cancel.cancel();
        self.store.shutdown(self.shutdown_timeout);
        self.player.stop();

        for (name, handle) in handles.into_iter() {
            if !util::join_with_timeout(handle, self.shutdown_timeout) {
                warn!(thread = name, "Thread did not stop in time.");
            }
        }
        info!("MIDI player stopped.");
    }
}

/// Scans the soundfont root. A missing root leaves the player with no soundfonts rather than
/// stopping it.
fn scan_catalog(root: &Path) -> Catalog {
    catalog::scan(root).unwrap_or_else(|e| {
        warn!(err = %e, "Unable to read soundfonts.");
        Catalog::default()
    })
}

/// Scans the media mount. Nothing mounted is normal and only logged.
fn scan_media(mount: &mut Mount) -> Option<MediaIndex> {
    match mount.scan() {
        Ok(media) => Some(media),
        Err(e) => {
            warn!(err = %e, "No media available.");
            None
        }
    }
}
