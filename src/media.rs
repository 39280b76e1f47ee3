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

//! The media index: the playable MIDI files found directly under the media mount path.

use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::util;

/// File extensions recognized as playable tracks.
pub const MIDI_EXTENSIONS: &[&str] = &["mid", "midi"];

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("media at {path} is unavailable: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A playable file on the mounted media.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
    /// The path to the MIDI file.
    path: PathBuf,
    /// The name shown on the display, without ordering prefix or extension.
    name: String,
    /// The position of the track within its index.
    position: usize,
}

impl Track {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_name(&self) -> &str {
        util::filename_display(&self.path)
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

/// An ordered, immutable list of tracks. Rebuilt wholesale whenever the media changes. Indexes
/// scanned from different mounts differ even when their listings match.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MediaIndex {
    tracks: Vec<Track>,
    /// The mount generation the tracks were found on.
    generation: u64,
}

impl fmt::Display for MediaIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tracks (count: {}):", self.tracks.len())?;
        for track in self.tracks.iter() {
            writeln!(f, "{:>3}. {} ({})", track.position + 1, track.name, track.file_name())?;
        }
        Ok(())
    }
}

impl MediaIndex {
    /// Builds an index from the given paths, sorting them by their file names.
    pub fn new(mut paths: Vec<PathBuf>) -> MediaIndex {
        paths.sort_by(|a, b| {
            compare_file_names(util::filename_display(a), util::filename_display(b))
        });
        MediaIndex {
            tracks: paths
                .into_iter()
                .enumerate()
                .map(|(position, path)| Track {
                    name: display_name(util::stem_display(&path)).to_string(),
                    path,
                    position,
                })
                .collect(),
            generation: 0,
        }
    }

    /// Stamps the index with the mount generation it was scanned from.
    pub fn with_generation(mut self, generation: u64) -> MediaIndex {
        self.generation = generation;
        self
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// Finds the track with the given path.
    pub fn position(&self, path: &Path) -> Option<usize> {
        self.tracks.iter().position(|track| track.path == path)
    }
}

/// Lists the playable files directly under the mount path. A missing mount path means that no
/// media is inserted.
pub fn scan(mount_path: &Path) -> Result<MediaIndex, MediaError> {
    let unavailable = |source: io::Error| MediaError::Unavailable {
        path: mount_path.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(mount_path).map_err(unavailable)? {
        let path = entry.map_err(unavailable)?.path();
        if util::filename_display(&path).starts_with('.') {
            continue;
        }
        if path.is_file() && util::has_extension(&path, MIDI_EXTENSIONS) {
            paths.push(path);
        }
    }

    Ok(MediaIndex::new(paths))
}

/// The media mount path, counting each time new media appears at it.
pub struct Mount {
    path: PathBuf,
    device: Option<u64>,
    generation: u64,
}

impl Mount {
    pub fn new(path: PathBuf) -> Mount {
        let device = device_id(&path);
        Mount {
            path,
            device,
            generation: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scans the mount. The path reappearing, or a different filesystem showing up at it, starts
    /// a new generation.
    pub fn scan(&mut self) -> Result<MediaIndex, MediaError> {
        let device = device_id(&self.path);
        if device.is_some() && device != self.device {
            self.generation += 1;
        }
        self.device = device;
        scan(&self.path).map(|media| media.with_generation(self.generation))
    }
}

#[cfg(unix)]
fn device_id(path: &Path) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;

    fs::metadata(path).ok().map(|metadata| metadata.dev())
}

#[cfg(not(unix))]
fn device_id(path: &Path) -> Option<u64> {
    path.is_dir().then_some(0)
}

/// Splits a recognized ordering prefix (one or two digits followed by `_`, `-` or a space) from
/// the rest of the name.
pub fn ordering_prefix(name: &str) -> Option<(u8, &str)> {
    let bytes = name.as_bytes();
    let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    if !(1..=2).contains(&digits) {
        return None;
    }

    match bytes.get(digits) {
        Some(b'_' | b'-' | b' ') => {
            let number = name[..digits].parse().ok()?;
            Some((number, &name[digits + 1..]))
        }
        _ => None,
    }
}

/// Strips the ordering prefix from a name, if it has one.
pub fn display_name(name: &str) -> &str {
    ordering_prefix(name).map_or(name, |(_, rest)| rest)
}

/// Orders file names with numeric prefixes by their number, then by the full name. Names
/// without a prefix sort after every prefixed name.
pub fn compare_file_names(a: &str, b: &str) -> Ordering {
    match (ordering_prefix(a), ordering_prefix(b)) {
        (Some((a_num, _)), Some((b_num, _))) => a_num.cmp(&b_num).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}
