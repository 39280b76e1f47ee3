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

use super::error::ConfigError;

const DEFAULT_I2C_BUS: u8 = 1;
const DEFAULT_I2C_ADDRESS: u16 = 0x27;
const DEFAULT_WIDTH: usize = 16;

/// The two line display.
#[derive(Deserialize, Clone, Debug)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Display {
    Lcd(Lcd),
    Console(Console),
}

impl Default for Display {
    fn default() -> Self {
        Display::Lcd(Lcd::default())
    }
}

impl Display {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        let width = match self {
            Display::Lcd(lcd) => {
                if lcd.address() > 0x7F {
                    return Err(ConfigError::Invalid(format!(
                        "I2C address {:#x} is not a 7 bit address",
                        lcd.address()
                    )));
                }
                lcd.width()
            }
            Display::Console(console) => console.width(),
        };
        if width == 0 {
            return Err(ConfigError::Invalid(
                "display width must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// A character LCD behind an I2C backpack.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Lcd {
    /// The N in /dev/i2c-N.
    bus: Option<u8>,
    address: Option<u16>,
    width: Option<usize>,
}

impl Lcd {
    pub fn bus(&self) -> u8 {
        self.bus.unwrap_or(DEFAULT_I2C_BUS)
    }

    pub fn address(&self) -> u16 {
        self.address.unwrap_or(DEFAULT_I2C_ADDRESS)
    }

    pub fn width(&self) -> usize {
        self.width.unwrap_or(DEFAULT_WIDTH)
    }
}

/// Writes display lines to the log.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Console {
    width: Option<usize>,
}

impl Console {
    pub fn width(&self) -> usize {
        self.width.unwrap_or(DEFAULT_WIDTH)
    }
}
