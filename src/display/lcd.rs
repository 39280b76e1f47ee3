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

//! An HD44780 character LCD behind a PCF8574 I2C backpack, driven in 4-bit mode.
//!
//! Each byte sent to the backpack sets the four data lines (high nibble), the enable line, the
//! register select line and the backlight. Every LCD byte goes out as two nibbles, each latched
//! by pulsing enable.

use std::{error::Error, fmt, io, thread, time::Duration};

use parking_lot::Mutex;
use tracing::info;

use super::Line;
use crate::config;

/// Register select: command.
const MODE_COMMAND: u8 = 0x00;
/// Register select: character data.
const MODE_CHARACTER: u8 = 0x01;
const ENABLE: u8 = 0b0000_0100;
const BACKLIGHT: u8 = 0b0000_1000;

/// DDRAM addresses of the two lines.
const LINE_1: u8 = 0x80;
const LINE_2: u8 = 0xC0;

/// Initialization: 4-bit mode, entry mode, display on with the cursor off, two lines, clear.
const INIT_SEQUENCE: [u8; 6] = [0x33, 0x32, 0x06, 0x0C, 0x28, 0x01];
/// Clearing the display takes about 1.5ms.
const INIT_DELAY: Duration = Duration::from_millis(5);

/// Writes single bytes to a device on an I2C bus.
pub trait Bus: Send {
    fn write_byte(&mut self, byte: u8) -> Result<(), io::Error>;
}

/// A character LCD.
pub struct Lcd<B: Bus> {
    bus: Mutex<B>,
    width: usize,
    name: String,
}

impl Lcd<LinuxI2c> {
    /// Opens and initializes the configured LCD.
    pub fn open(config: &config::Lcd) -> Result<Lcd<LinuxI2c>, Box<dyn Error>> {
        let bus = LinuxI2c::open(config.bus(), config.address()).map_err(|e| {
            format!(
                "unable to open LCD at I2C bus {} address {:#04x}: {}",
                config.bus(),
                config.address(),
                e
            )
        })?;
        let name = format!("lcd (i2c-{} {:#04x})", config.bus(), config.address());
        Ok(Lcd::new(bus, config.width(), name)?)
    }
}

impl<B: Bus> Lcd<B> {
    /// Initializes the LCD on the given bus.
    pub fn new(bus: B, width: usize, name: String) -> Result<Lcd<B>, io::Error> {
        let lcd = Lcd {
            bus: Mutex::new(bus),
            width,
            name,
        };
        {
            let mut bus = lcd.bus.lock();
            for command in INIT_SEQUENCE {
                send(&mut *bus, command, MODE_COMMAND)?;
            }
        }
        thread::sleep(INIT_DELAY);
        info!(lcd = lcd.name, "LCD initialized.");
        Ok(lcd)
    }
}

/// Sends one byte to the LCD as two nibbles.
fn send<B: Bus + ?Sized>(bus: &mut B, bits: u8, mode: u8) -> Result<(), io::Error> {
    for nibble in [bits & 0xF0, (bits << 4) & 0xF0] {
        let byte = mode | nibble | BACKLIGHT;
        bus.write_byte(byte | ENABLE)?;
        bus.write_byte(byte)?;
    }
    Ok(())
}

/// Maps a character to the LCD character ROM, which matches ASCII for printable characters.
fn to_rom(c: char) -> u8 {
    if c.is_ascii() && !c.is_ascii_control() {
        c as u8
    } else {
        b'?'
    }
}

impl<B: Bus> super::Device for Lcd<B> {
    fn width(&self) -> usize {
        self.width
    }

    fn write_line(&self, line: Line, text: &str) -> Result<(), Box<dyn Error>> {
        let address = match line {
            Line::First => LINE_1,
            Line::Second => LINE_2,
        };

        let mut bus = self.bus.lock();
        send(&mut *bus, address, MODE_COMMAND)?;
        for c in text.chars().chain(std::iter::repeat(' ')).take(self.width) {
            send(&mut *bus, to_rom(c), MODE_CHARACTER)?;
        }
        Ok(())
    }
}

impl<B: Bus> fmt::Display for Lcd<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// An I2C device opened through the Linux i2c-dev interface.
pub struct LinuxI2c {
    file: std::fs::File,
}

#[cfg(target_os = "linux")]
impl LinuxI2c {
    /// Selects the peripheral address for subsequent reads and writes.
    const I2C_SLAVE: libc::c_ulong = 0x0703;

    pub fn open(bus: u8, address: u16) -> Result<LinuxI2c, io::Error> {
        use std::os::fd::AsRawFd;

        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(format!("/dev/i2c-{}", bus))?;
        // SAFETY: the descriptor is open for the lifetime of the call, and I2C_SLAVE takes the
        // address as an integer argument rather than a pointer.
        let result = unsafe {
            libc::ioctl(
                file.as_raw_fd(),
                Self::I2C_SLAVE as _,
                libc::c_ulong::from(address),
            )
        };
        if result < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(LinuxI2c { file })
    }
}

#[cfg(not(target_os = "linux"))]
impl LinuxI2c {
    pub fn open(_bus: u8, _address: u16) -> Result<LinuxI2c, io::Error> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "I2C displays are only supported on Linux",
        ))
    }
}

impl Bus for LinuxI2c {
    fn write_byte(&mut self, byte: u8) -> Result<(), io::Error> {
        use std::io::Write;

        self.file.write_all(&[byte])
    }
}

#[cfg(test)]
mod test {
    use std::{io, sync::Arc};

    use parking_lot::Mutex;

    use crate::display::{Device, Line};

    use super::{Bus, Lcd};

    #[derive(Clone, Default)]
    struct Recorder {
        bytes: Arc<Mutex<Vec<u8>>>,
        failing: bool,
    }

    impl Bus for Recorder {
        fn write_byte(&mut self, byte: u8) -> Result<(), io::Error> {
            if self.failing {
                return Err(io::Error::new(io::ErrorKind::Other, "bus unplugged"));
            }
            self.bytes.lock().push(byte);
            Ok(())
        }
    }

    #[test]
    fn test_init_sequence() -> Result<(), io::Error> {
        let recorder = Recorder::default();
        let _lcd = Lcd::new(recorder.clone(), 16, "test".to_string())?;

        let bytes = recorder.bytes.lock().clone();
        // Six commands, two nibbles each, each nibble with and without enable.
        assert_eq!(24, bytes.len());
        // 0x33: high nibble 0x3, low nibble 0x3, backlight on.
        assert_eq!(vec![0x3C, 0x38, 0x3C, 0x38], bytes[0..4]);
        // 0x01 (clear) is last.
        assert_eq!(vec![0x0C, 0x08, 0x1C, 0x18], bytes[20..24]);
        Ok(())
    }

    #[test]
    fn test_write_line() -> Result<(), Box<dyn std::error::Error>> {
        let recorder = Recorder::default();
        let lcd = Lcd::new(recorder.clone(), 4, "test".to_string())?;
        recorder.bytes.lock().clear();

        lcd.write_line(Line::Second, "Hé")?;
        let bytes = recorder.bytes.lock().clone();
        // Address command plus four characters.
        assert_eq!(20, bytes.len());
        assert_eq!(vec![0xCC, 0xC8, 0x0C, 0x08], bytes[0..4]);
        // 'H' (0x48) as character data.
        assert_eq!(vec![0x4D, 0x49, 0x8D, 0x89], bytes[4..8]);
        // 'é' is not in the character ROM and becomes '?' (0x3F).
        assert_eq!(vec![0x3D, 0x39, 0xFD, 0xF9], bytes[8..12]);
        // Padding with spaces (0x20).
        assert_eq!(vec![0x2D, 0x29, 0x0D, 0x09], bytes[16..20]);
        Ok(())
    }

    #[test]
    fn test_bus_failure() {
        let recorder = Recorder {
            failing: true,
            ..Default::default()
        };
        assert!(Lcd::new(recorder, 16, "test".to_string()).is_err());
    }
}
