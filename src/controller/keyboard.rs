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
    thread::{self, JoinHandle},
};

use crossbeam_channel::Sender;
use tracing::{info, span, warn, Level};

use super::Event;
use crate::playsync::CancelHandle;

const PLAY: &str = "play";
const NEXT: &str = "next";
const PREV: &str = "prev";
const SOUNDFONT_NEXT: &str = "sf_next";
const SOUNDFONT_PREV: &str = "sf_prev";
const CATEGORY: &str = "category";
const RANDOM: &str = "random";

/// A driver that reads button presses as words typed on standard input. Useful for development
/// away from the hardware.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads one command. Returns false once the input is exhausted.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({}, {}, {}, {}, {}, {}, {}): ",
            PLAY, NEXT, PREV, SOUNDFONT_NEXT, SOUNDFONT_PREV, CATEGORY, RANDOM,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        let event = match input.trim().to_lowercase().as_str() {
            PLAY => Event::PlayPause,
            NEXT => Event::NextTrack,
            PREV => Event::PrevTrack,
            SOUNDFONT_NEXT => Event::NextSoundFont,
            SOUNDFONT_PREV => Event::PrevSoundFont,
            CATEGORY => Event::NextCategory,
            RANDOM => Event::RandomTrack,
            _ => {
                warn!(input = input.trim(), "Unrecognized input");
                return Ok(true);
            }
        };

        events_tx
            .send(event)
            .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e))?;
        Ok(true)
    }
}

impl super::Driver for Driver {
    fn monitor_events(
        &self,
        events_tx: Sender<Event>,
        cancel: CancelHandle,
    ) -> JoinHandle<Result<(), io::Error>> {
        thread::spawn(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while !cancel.is_cancelled() {
                if !Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {
                    info!("Standard input closed.");
                    break;
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader};

    use crate::controller::Event;

    use super::*;

    fn get_event(input: &str) -> Result<(bool, Option<Event>), io::Error> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Event>();

        let reader = BufReader::new(input.as_bytes());
        let mut writer: Vec<u8> = Vec::new();
        let more = Driver::monitor_io(&sender, reader, &mut writer)?;
        assert!(String::from_utf8_lossy(&writer).starts_with("Command ("));

        drop(sender);
        Ok((more, receiver.recv().ok()))
    }

    #[test]
    fn test_keyboard_events() -> Result<(), io::Error> {
        assert_eq!((true, Some(Event::PlayPause)), get_event("play\n")?);
        assert_eq!((true, Some(Event::NextTrack)), get_event("NEXT\n")?);
        assert_eq!((true, Some(Event::PrevTrack)), get_event(" prev \n")?);
        assert_eq!((true, Some(Event::NextSoundFont)), get_event(SOUNDFONT_NEXT)?);
        assert_eq!((true, Some(Event::PrevSoundFont)), get_event(SOUNDFONT_PREV)?);
        assert_eq!((true, Some(Event::NextCategory)), get_event(CATEGORY)?);
        assert_eq!((true, Some(Event::RandomTrack)), get_event(RANDOM)?);
        assert_eq!((true, None), get_event("unrecognized\n")?);
        assert_eq!((false, None), get_event("")?);
        Ok(())
    }
}
