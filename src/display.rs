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
    fmt,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::RecvTimeoutError;
use tracing::{debug, info, span, warn, Level};

use crate::{
    config,
    player::{PlaybackState, PlaybackStatus, Player},
    playsync::CancelHandle,
    util,
};

pub mod console;
pub mod lcd;
#[cfg(test)]
pub mod mock;

pub const NO_MEDIA: &str = "No MIDI Files";
pub const NO_SOUNDFONTS: &str = "No Soundfonts";
const CATEGORY_PROMPT: &str = "Category:";

/// A line on a two line display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Line {
    First,
    Second,
}

impl Line {
    pub const ALL: [Line; 2] = [Line::First, Line::Second];

    pub fn index(self) -> usize {
        match self {
            Line::First => 0,
            Line::Second => 1,
        }
    }
}

/// A two line character display.
pub trait Device: fmt::Display + Send + Sync {
    /// The number of characters on each line.
    fn width(&self) -> usize;

    /// Replaces the contents of a line. The text is at most the display width.
    fn write_line(&self, line: Line, text: &str) -> Result<(), Box<dyn Error>>;
}

/// Gets the display described by the configuration.
pub fn get_device(config: &config::Display) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    Ok(match config {
        config::Display::Lcd(lcd) => Arc::new(lcd::Lcd::open(lcd)?),
        config::Display::Console(console) => Arc::new(console::Display::new(console.width())),
    })
}

/// The status shown in the last column of the track line.
fn indicator(status: PlaybackStatus) -> char {
    match status {
        PlaybackStatus::Playing => '>',
        PlaybackStatus::Paused => '=',
        PlaybackStatus::Stopped => ' ',
    }
}

/// Renders the state as two lines of exactly `width` characters.
pub fn render(state: &PlaybackState, width: usize) -> [String; 2] {
    if let Some(category) = state.preview() {
        return [
            util::fit(CATEGORY_PROMPT, width),
            util::fit(category.name(), width),
        ];
    }

    let track = match state.track() {
        Some(track) => track.name(),
        None => NO_MEDIA,
    };
    let soundfont = match state.soundfont() {
        Some(soundfont) => soundfont.name(),
        None => NO_SOUNDFONTS,
    };

    let mut first = util::fit(track, width.saturating_sub(1));
    if width > 0 {
        first.push(indicator(state.status()));
    }
    [first, util::fit(soundfont, width)]
}

/// The title screen shown while starting up.
pub fn splash(width: usize) -> [String; 2] {
    ["MIDI", "BLASTER"].map(|text| {
        util::fit(&format!("{:^width$}", text, width = width), width)
    })
}

/// Writes lines to the device, skipping lines that are already showing. A failed line is retried
/// on the next refresh.
pub struct Screen {
    device: Arc<dyn Device>,
    shown: [Option<String>; 2],
}

impl Screen {
    pub fn new(device: Arc<dyn Device>) -> Screen {
        Screen {
            device,
            shown: [None, None],
        }
    }

    pub fn width(&self) -> usize {
        self.device.width()
    }

    /// Shows the lines, returning the number of lines written.
    pub fn show(&mut self, lines: [String; 2]) -> usize {
        let mut written = 0;
        for (line, text) in Line::ALL.into_iter().zip(lines) {
            let shown = &mut self.shown[line.index()];
            if shown.as_deref() == Some(text.as_str()) {
                continue;
            }

            match self.device.write_line(line, &text) {
                Ok(()) => {
                    *shown = Some(text);
                    written += 1;
                }
                Err(e) => {
                    warn!(
                        device = %self.device,
                        line = ?line,
                        err = %e,
                        "Unable to write to display."
                    );
                    *shown = None;
                }
            }
        }
        written
    }
}

/// Keeps the display in step with the player on its own thread, so slow display writes never
/// hold up playback or input.
pub struct DisplayController {
    handle: JoinHandle<()>,
}

impl DisplayController {
    /// Starts rendering. The display is refreshed on every change and at least once per refresh
    /// interval.
    pub fn new(
        player: Arc<Player>,
        screen: Screen,
        refresh_interval: Duration,
        cancel: CancelHandle,
    ) -> DisplayController {
        DisplayController {
            handle: thread::spawn(move || {
                DisplayController::run(player, screen, refresh_interval, cancel)
            }),
        }
    }

    /// Consumes the controller, returning its thread handle.
    pub fn into_handle(self) -> JoinHandle<()> {
        self.handle
    }

    fn run(
        player: Arc<Player>,
        mut screen: Screen,
        refresh_interval: Duration,
        cancel: CancelHandle,
    ) {
        let span = span!(Level::INFO, "display");
        let _enter = span.enter();

        let changes = player.changes();
        info!("Display started.");

        while !cancel.is_cancelled() {
            let lines = render(&player.snapshot(), screen.width());
            if screen.show(lines) > 0 {
                debug!("Display updated.");
            }

            match changes.recv_timeout(refresh_interval) {
                Ok(()) | Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        info!("Display stopped.");
    }
}
