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

//! Buttons wired between GPIO pins and ground, read through the Linux sysfs GPIO interface.
//! The pins are expected to be pulled up, so a press is a falling edge.

use std::{
    error::Error,
    fs, io,
    path::{Path, PathBuf},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::Sender;
use tracing::{debug, error, info, span, Level};

use super::Event;
use crate::{config, playsync::CancelHandle};

/// Turns sampled pin levels into debounced presses.
#[derive(Debug)]
pub struct EdgeDetector {
    /// The last sampled level. High means released.
    level: bool,
    /// When the last press was reported.
    last_press: Option<Instant>,
    debounce: Duration,
}

impl EdgeDetector {
    pub fn new(level: bool, debounce: Duration) -> EdgeDetector {
        EdgeDetector {
            level,
            last_press: None,
            debounce,
        }
    }

    /// Records a sample. Returns true if it completes a press: a high to low transition at least
    /// the debounce window after the previous press.
    pub fn update(&mut self, level: bool, now: Instant) -> bool {
        let falling = self.level && !level;
        self.level = level;
        if !falling {
            return false;
        }

        if self
            .last_press
            .is_some_and(|last| now.saturating_duration_since(last) < self.debounce)
        {
            return false;
        }
        self.last_press = Some(now);
        true
    }
}

/// A driver that polls sysfs GPIO pins for button presses.
pub struct Driver {
    /// The sysfs GPIO directory, normally /sys/class/gpio.
    sysfs_path: PathBuf,
    /// The pin wired to each button.
    pins: Vec<(Event, u32)>,
    debounce: Duration,
    poll_interval: Duration,
}

impl Driver {
    /// Creates a new driver, exporting and configuring every pin as an input.
    pub fn new(config: &config::Gpio) -> Result<Driver, Box<dyn Error>> {
        let driver = Driver {
            sysfs_path: PathBuf::from(config.sysfs_path()),
            pins: config.pins()?,
            debounce: config.debounce()?,
            poll_interval: config.poll_interval()?,
        };

        for (event, pin) in driver.pins.iter() {
            driver.export(*pin).map_err(|e| {
                format!(
                    "unable to set up GPIO pin {} for {:?} under {}: {}",
                    pin,
                    event,
                    driver.sysfs_path.display(),
                    e
                )
            })?;
        }

        info!(pins = driver.pins.len(), "GPIO buttons ready.");
        Ok(driver)
    }

    fn pin_path(&self, pin: u32) -> PathBuf {
        self.sysfs_path.join(format!("gpio{}", pin))
    }

    fn export(&self, pin: u32) -> Result<(), io::Error> {
        let pin_path = self.pin_path(pin);
        if !pin_path.exists() {
            fs::write(self.sysfs_path.join("export"), pin.to_string())?;
        }
        fs::write(pin_path.join("direction"), "in")
    }
}

/// Reads a pin level from its sysfs value file.
fn read_level(path: &Path) -> Result<bool, io::Error> {
    match fs::read_to_string(path)?.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unexpected GPIO value {:?} in {}", other, path.display()),
        )),
    }
}

impl super::Driver for Driver {
    fn monitor_events(
        &self,
        events_tx: Sender<Event>,
        cancel: CancelHandle,
    ) -> JoinHandle<Result<(), io::Error>> {
        let buttons = self
            .pins
            .iter()
            .map(|(event, pin)| (*event, *pin, self.pin_path(*pin).join("value")))
            .collect::<Vec<_>>();
        let debounce = self.debounce;
        let poll_interval = self.poll_interval;

        thread::spawn(move || {
            let span = span!(Level::INFO, "gpio driver");
            let _enter = span.enter();

            let mut detectors = Vec::with_capacity(buttons.len());
            for (event, pin, path) in buttons.into_iter() {
                let level = read_level(&path).inspect_err(|e| {
                    error!(pin, err = %e, "Unable to read GPIO pin.");
                })?;
                detectors.push((event, pin, path, EdgeDetector::new(level, debounce)));
            }

            info!("GPIO driver started.");

            loop {
                let now = Instant::now();
                for (event, pin, path, detector) in detectors.iter_mut() {
                    let level = read_level(path).inspect_err(|e| {
                        error!(pin = *pin, err = %e, "Unable to read GPIO pin.");
                    })?;
                    if detector.update(level, now) {
                        debug!(pin = *pin, event = ?event, "Button pressed.");
                        if events_tx.send(*event).is_err() {
                            return Ok(());
                        }
                    }
                }

                if cancel.wait_timeout(poll_interval) {
                    return Ok(());
                }
            }
        })
    }
}

#[cfg(test)]
mod test {
    use std::{
        error::Error,
        fs, io,
        path::Path,
        thread,
        time::{Duration, Instant},
    };

    use crate::{
        config,
        controller::{Driver as _, Event},
        playsync::CancelHandle,
    };

    use super::{Driver, EdgeDetector};

    /// Replaces a pin's value file in one step so the driver never reads a partial write.
    fn set_level(sysfs: &Path, pin: u32, level: bool) -> Result<(), io::Error> {
        let pin_dir = sysfs.join(format!("gpio{}", pin));
        fs::write(pin_dir.join("value.tmp"), if level { "1\n" } else { "0\n" })?;
        fs::rename(pin_dir.join("value.tmp"), pin_dir.join("value"))
    }

    #[test]
    fn test_edge_detector() {
        let start = Instant::now();
        let debounce = Duration::from_millis(400);
        let mut detector = EdgeDetector::new(true, debounce);

        // A held button counts once and releases never count.
        assert!(!detector.update(true, start));
        assert!(detector.update(false, start));
        assert!(!detector.update(false, start + Duration::from_millis(50)));
        assert!(!detector.update(true, start + Duration::from_millis(100)));

        // Contact bounce inside the window is ignored.
        assert!(!detector.update(false, start + Duration::from_millis(300)));
        assert!(!detector.update(true, start + Duration::from_millis(350)));
        assert!(detector.update(false, start + Duration::from_millis(800)));

        // A button held at start up is not a press until it is released.
        let mut held = EdgeDetector::new(false, debounce);
        assert!(!held.update(false, start));
        assert!(!held.update(true, start));
        assert!(held.update(false, start));
    }

    #[test]
    fn test_gpio_driver() -> Result<(), Box<dyn Error>> {
        let sysfs = tempfile::tempdir()?;
        let pins = config::GpioPins::default();
        for pin in pins.numbers() {
            fs::create_dir(sysfs.path().join(format!("gpio{}", pin)))?;
            set_level(sysfs.path(), pin, true)?;
        }

        let driver = Driver::new(&config::Gpio::new(
            &sysfs.path().to_string_lossy(),
            pins,
            "50ms",
            "5ms",
        ))?;
        assert_eq!(
            "in",
            fs::read_to_string(sysfs.path().join("gpio26").join("direction"))?
        );

        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let cancel = CancelHandle::new();
        let handle = driver.monitor_events(events_tx, cancel.clone());

        // Give the driver time to take its initial readings.
        thread::sleep(Duration::from_millis(50));
        set_level(sysfs.path(), 27, false)?;
        assert_eq!(
            Ok(Event::NextTrack),
            events_rx.recv_timeout(Duration::from_secs(5))
        );

        set_level(sysfs.path(), 27, true)?;
        thread::sleep(Duration::from_millis(100));
        set_level(sysfs.path(), 26, false)?;
        assert_eq!(
            Ok(Event::PlayPause),
            events_rx.recv_timeout(Duration::from_secs(5))
        );

        cancel.cancel();
        assert!(matches!(handle.join(), Ok(Ok(()))));
        assert!(events_rx.try_recv().is_err());
        Ok(())
    }

    #[test]
    fn test_missing_pin_is_an_error() -> Result<(), Box<dyn Error>> {
        let sysfs = tempfile::tempdir()?;
        let result = Driver::new(&config::Gpio::new(
            &sysfs.path().to_string_lossy(),
            config::GpioPins::default(),
            "400ms",
            "10ms",
        ));
        assert!(result.is_err());
        Ok(())
    }
}
