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
use std::{env, path::PathBuf, time::Duration};

use serde::Deserialize;

use super::{
    controller::Controller,
    display::Display,
    error::{self, ConfigError},
    synthesizer::Synthesizer,
};

const DEFAULT_MEDIA_PATH: &str = "/media/mididisk";
const DEFAULT_SOUNDFONT_DIR: &str = "soundfonts";
const DEFAULT_STATE_FILE: &str = ".midiblaster_state.json";
const DEFAULT_SAVE_DELAY: Duration = Duration::from_secs(10);
const DEFAULT_MEDIA_REFRESH_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_DISPLAY_REFRESH_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const DEFAULT_CATEGORY_CONFIRM_DELAY: Duration = Duration::from_secs(3);
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// The configuration for the MIDI player.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Player {
    /// Where the removable media is mounted.
    media_path: Option<String>,
    /// The directory holding one sub-directory per soundfont category.
    soundfont_root: Option<String>,
    /// The file the last selected category and soundfont are saved to.
    state_file: Option<String>,
    /// How long the selection must be left alone before it is saved.
    save_delay: Option<String>,
    media_refresh_interval: Option<String>,
    display_refresh_interval: Option<String>,
    /// How often the synthesizer is checked for the end of a track.
    poll_interval: Option<String>,
    /// How long a category preview is shown before it is switched to. Zero switches immediately.
    category_confirm_delay: Option<String>,
    /// The category selected when there is no saved selection.
    default_category: Option<String>,
    shutdown_timeout: Option<String>,

    #[serde(default)]
    synthesizer: Synthesizer,
    #[serde(default)]
    controller: Controller,
    #[serde(default)]
    display: Display,
}

/// Resolves a path relative to the home directory.
fn home(file: &str) -> PathBuf {
    match env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(file),
        None => PathBuf::from(file),
    }
}

/// Expands a leading ~ to the home directory.
fn expand(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => home(rest),
        None => PathBuf::from(path),
    }
}

impl Player {
    /// Checks every value that can only be checked after parsing, so a bad file fails at start up
    /// rather than part way through.
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        self.save_delay()?;
        self.media_refresh_interval()?;
        self.display_refresh_interval()?;
        self.poll_interval()?;
        self.category_confirm_delay()?;
        self.shutdown_timeout()?;
        self.display.validate()?;
        validate_controller(&self.controller)
    }

    pub fn media_path(&self) -> PathBuf {
        expand(self.media_path.as_deref().unwrap_or(DEFAULT_MEDIA_PATH))
    }

    pub fn soundfont_root(&self) -> PathBuf {
        match &self.soundfont_root {
            Some(path) => expand(path),
            None => home(DEFAULT_SOUNDFONT_DIR),
        }
    }

    pub fn state_file(&self) -> PathBuf {
        match &self.state_file {
            Some(path) => expand(path),
            None => home(DEFAULT_STATE_FILE),
        }
    }

    pub fn save_delay(&self) -> Result<Duration, ConfigError> {
        error::duration("save_delay", self.save_delay.as_ref(), DEFAULT_SAVE_DELAY)
    }

    pub fn media_refresh_interval(&self) -> Result<Duration, ConfigError> {
        non_zero(
            "media_refresh_interval",
            error::duration(
                "media_refresh_interval",
                self.media_refresh_interval.as_ref(),
                DEFAULT_MEDIA_REFRESH_INTERVAL,
            )?,
        )
    }

    pub fn display_refresh_interval(&self) -> Result<Duration, ConfigError> {
        non_zero(
            "display_refresh_interval",
            error::duration(
                "display_refresh_interval",
                self.display_refresh_interval.as_ref(),
                DEFAULT_DISPLAY_REFRESH_INTERVAL,
            )?,
        )
    }

    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        non_zero(
            "poll_interval",
            error::duration(
                "poll_interval",
                self.poll_interval.as_ref(),
                DEFAULT_POLL_INTERVAL,
            )?,
        )
    }

    pub fn category_confirm_delay(&self) -> Result<Duration, ConfigError> {
        error::duration(
            "category_confirm_delay",
            self.category_confirm_delay.as_ref(),
            DEFAULT_CATEGORY_CONFIRM_DELAY,
        )
    }

    pub fn default_category(&self) -> Option<&str> {
        self.default_category.as_deref()
    }

    pub fn shutdown_timeout(&self) -> Result<Duration, ConfigError> {
        error::duration(
            "shutdown_timeout",
            self.shutdown_timeout.as_ref(),
            DEFAULT_SHUTDOWN_TIMEOUT,
        )
    }

    pub fn synthesizer(&self) -> &Synthesizer {
        &self.synthesizer
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn display(&self) -> &Display {
        &self.display
    }
}

fn non_zero(key: &str, duration: Duration) -> Result<Duration, ConfigError> {
    if duration.is_zero() {
        return Err(ConfigError::Invalid(format!(
            "{} must be greater than zero",
            key
        )));
    }
    Ok(duration)
}

fn validate_controller(controller: &Controller) -> Result<(), ConfigError> {
    match controller {
        Controller::Keyboard => Ok(()),
        Controller::Gpio(gpio) => {
            gpio.pins()?;
            gpio.debounce()?;
            gpio.poll_interval()?;
            Ok(())
        }
        Controller::Multi(controllers) => {
            for controller in controllers.values() {
                if matches!(controller, Controller::Multi(_)) {
                    return Err(ConfigError::Invalid(
                        "multi controllers cannot be nested".to_string(),
                    ));
                }
                validate_controller(controller)?;
            }
            Ok(())
        }
    }
}
