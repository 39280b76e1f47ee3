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
use std::{collections::HashMap, time::Duration};

use serde::Deserialize;

use super::error::{self, ConfigError};
use crate::controller::Event;

const DEFAULT_SYSFS_PATH: &str = "/sys/class/gpio";
const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(400);
const DEFAULT_GPIO_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Allows users to specify various controllers.
#[derive(Deserialize, Clone, Debug)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Controller {
    Keyboard,
    Gpio(Gpio),
    Multi(HashMap<String, Controller>),
}

impl Default for Controller {
    fn default() -> Self {
        Controller::Gpio(Gpio::default())
    }
}

/// Buttons on sysfs GPIO pins.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Gpio {
    sysfs_path: Option<String>,
    #[serde(default)]
    pins: GpioPins,
    debounce: Option<String>,
    poll_interval: Option<String>,
}

impl Gpio {
    pub fn new(sysfs_path: &str, pins: GpioPins, debounce: &str, poll_interval: &str) -> Gpio {
        Gpio {
            sysfs_path: Some(sysfs_path.to_string()),
            pins,
            debounce: Some(debounce.to_string()),
            poll_interval: Some(poll_interval.to_string()),
        }
    }

    pub fn sysfs_path(&self) -> &str {
        self.sysfs_path.as_deref().unwrap_or(DEFAULT_SYSFS_PATH)
    }

    /// The pin for each button. A pin may only be wired to one button.
    pub fn pins(&self) -> Result<Vec<(Event, u32)>, ConfigError> {
        let pins = self.pins.assignments();
        for (i, (event, pin)) in pins.iter().enumerate() {
            if let Some((other, _)) = pins[..i].iter().find(|(_, other)| other == pin) {
                return Err(ConfigError::Invalid(format!(
                    "GPIO pin {} is assigned to both {:?} and {:?}",
                    pin, other, event
                )));
            }
        }
        Ok(pins.to_vec())
    }

    /// Presses closer together than this are treated as contact bounce.
    pub fn debounce(&self) -> Result<Duration, ConfigError> {
        error::duration("debounce", self.debounce.as_ref(), DEFAULT_DEBOUNCE)
    }

    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        let poll_interval = error::duration(
            "poll_interval",
            self.poll_interval.as_ref(),
            DEFAULT_GPIO_POLL_INTERVAL,
        )?;
        if poll_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "GPIO poll_interval must be greater than zero".to_string(),
            ));
        }
        Ok(poll_interval)
    }
}

/// The BCM pin number wired to each button.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct GpioPins {
    pub play: u32,
    pub next: u32,
    pub prev: u32,
    pub soundfont_next: u32,
    pub soundfont_prev: u32,
    pub category: u32,
    pub random: u32,
}

impl Default for GpioPins {
    fn default() -> Self {
        GpioPins {
            play: 26,
            next: 27,
            prev: 22,
            soundfont_next: 23,
            soundfont_prev: 24,
            category: 19,
            random: 6,
        }
    }
}

impl GpioPins {
    fn assignments(&self) -> [(Event, u32); 7] {
        [
            (Event::PlayPause, self.play),
            (Event::NextTrack, self.next),
            (Event::PrevTrack, self.prev),
            (Event::NextSoundFont, self.soundfont_next),
            (Event::PrevSoundFont, self.soundfont_prev),
            (Event::NextCategory, self.category),
            (Event::RandomTrack, self.random),
        ]
    }

    /// Every configured pin number.
    pub fn numbers(&self) -> Vec<u32> {
        self.assignments().iter().map(|(_, pin)| *pin).collect()
    }
}
