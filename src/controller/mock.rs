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
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::Sender;
use parking_lot::Mutex;

use super::Event;
use crate::playsync::CancelHandle;

/// A driver whose button presses are made by the test.
pub struct Driver {
    events_tx: Mutex<Option<Sender<Event>>>,
    disconnected: Arc<AtomicBool>,
}

impl Driver {
    pub fn new() -> Driver {
        Driver {
            events_tx: Mutex::new(None),
            disconnected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns true once the controller has started monitoring this driver.
    pub fn is_monitoring(&self) -> bool {
        self.events_tx.lock().is_some()
    }

    /// Simulates a button press.
    pub fn press(&self, event: Event) {
        if let Some(events_tx) = self.events_tx.lock().as_ref() {
            assert!(events_tx.send(event).is_ok(), "controller went away");
        }
    }

    /// Simulates the buttons going away, as if the device were unplugged.
    pub fn disconnect(&self) {
        self.disconnected.store(true, Ordering::Relaxed);
        self.events_tx.lock().take();
    }
}

impl super::Driver for Driver {
    fn monitor_events(
        &self,
        events_tx: Sender<Event>,
        cancel: CancelHandle,
    ) -> JoinHandle<Result<(), io::Error>> {
        *self.events_tx.lock() = Some(events_tx);
        let disconnected = self.disconnected.clone();
        thread::spawn(move || {
            while !disconnected.load(Ordering::Relaxed) {
                if cancel.wait_timeout(Duration::from_millis(10)) {
                    break;
                }
            }
            Ok(())
        })
    }
}
