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

use tracing::info;

use super::Line;

/// A display that logs its lines instead of drawing them, for running without the LCD attached.
pub struct Display {
    width: usize,
}

impl Display {
    pub fn new(width: usize) -> Display {
        Display { width }
    }
}

impl super::Device for Display {
    fn width(&self) -> usize {
        self.width
    }

    fn write_line(&self, line: Line, text: &str) -> Result<(), Box<dyn Error>> {
        info!(line = line.index() + 1, text = ?text, "Display");
        Ok(())
    }
}

impl fmt::Display for Display {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "console ({} columns)", self.width)
    }
}
