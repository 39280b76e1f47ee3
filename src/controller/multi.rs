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
    sync::Arc,
    thread::{self, JoinHandle},
};

use crossbeam_channel::Sender;
use tracing::error;

use super::Event;
use crate::playsync::CancelHandle;

/// A driver that merges the events of several other drivers.
pub struct Driver {
    /// The drivers to monitor.
    sub_drivers: Vec<Arc<dyn super::Driver>>,
}

impl Driver {
    pub fn new(sub_drivers: Vec<Arc<dyn super::Driver>>) -> Driver {
        Driver { sub_drivers }
    }
}

impl super::Driver for Driver {
    fn monitor_events(
        &self,
        events_tx: Sender<Event>,
        cancel: CancelHandle,
    ) -> JoinHandle<Result<(), io::Error>> {
        let join_handles = self
            .sub_drivers
            .iter()
            .map(|driver| driver.monitor_events(events_tx.clone(), cancel.clone()))
            .collect::<Vec<_>>();
        drop(events_tx);

        thread::spawn(move || {
            let mut failed = 0;
            for handle in join_handles {
                match handle.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        error!(err = %e, "Driver failed.");
                        failed += 1;
                    }
                    Err(_) => {
                        error!("Driver panicked.");
                        failed += 1;
                    }
                }
            }

            if failed == 0 {
                Ok(())
            } else {
                Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("{} drivers failed", failed),
                ))
            }
        })
    }
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, time::Duration};

    use crate::{
        controller::{mock, Driver as _, Event},
        playsync::CancelHandle,
        testutil::eventually,
    };

    #[test]
    fn test_multi_driver() {
        let first = Arc::new(mock::Driver::new());
        let second = Arc::new(mock::Driver::new());
        let driver = super::Driver::new(vec![first.clone(), second.clone()]);

        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let cancel = CancelHandle::new();
        let handle = driver.monitor_events(events_tx, cancel.clone());
        eventually(
            || first.is_monitoring() && second.is_monitoring(),
            "Drivers never started",
        );

        first.press(Event::NextTrack);
        second.press(Event::PlayPause);
        assert_eq!(
            Ok(Event::NextTrack),
            events_rx.recv_timeout(Duration::from_secs(1))
        );
        assert_eq!(
            Ok(Event::PlayPause),
            events_rx.recv_timeout(Duration::from_secs(1))
        );

        cancel.cancel();
        assert!(matches!(handle.join(), Ok(Ok(()))));
    }
}
