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
use std::{error::Error, fmt};

use parking_lot::Mutex;

use super::Line;

#[derive(Default)]
struct State {
    lines: [String; 2],
    writes: usize,
    failing: bool,
}

/// A display that remembers what was written to it.
pub struct Display {
    width: usize,
    state: Mutex<State>,
}

impl Display {
    pub fn new(width: usize) -> Display {
        Display {
            width,
            state: Mutex::new(State::default()),
        }
    }

    /// The current contents of both lines.
    pub fn lines(&self) -> [String; 2] {
        self.state.lock().lines.clone()
    }

    /// The number of successful line writes.
    pub fn writes(&self) -> usize {
        self.state.lock().writes
    }

    /// Makes writes fail until reset.
    pub fn fail(&self, failing: bool) {
        self.state.lock().failing = failing;
    }
}

impl super::Device for Display {
    fn width(&self) -> usize {
        self.width
    }

    fn write_line(&self, line: Line, text: &str) -> Result<(), Box<dyn Error>> {
        let mut state = self.state.lock();
        if state.failing {
            return Err("mock display failure".into());
        }
        state.lines[line.index()] = text.to_string();
        state.writes += 1;
        Ok(())
    }
}

impl fmt::Display for Display {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mock display ({} columns)", self.width)
    }
}
