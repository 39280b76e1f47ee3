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

use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Extracts a displayable file name from a path, returning a fallback if the name is unreadable.
pub fn filename_display(path: &Path) -> &str {
    path.file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("unreadable file name")
}

/// Extracts the file name without its extension, returning a fallback if the name is unreadable.
pub fn stem_display(path: &Path) -> &str {
    path.file_stem()
        .and_then(|f| f.to_str())
        .unwrap_or("unreadable file name")
}

/// Returns true if the path has one of the given extensions, ignoring case.
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// Truncates the text to at most `width` characters.
pub fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

/// Truncates or pads the text so that it is exactly `width` characters.
pub fn fit(text: &str, width: usize) -> String {
    format!("{:<width$}", truncate(text, width), width = width)
}

/// Waits for the thread to finish for at most `timeout`. Returns false if the thread was still
/// running when the timeout expired, in which case it is detached.
pub fn join_with_timeout<T>(handle: JoinHandle<T>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
    handle.join().is_ok()
}

#[cfg(test)]
mod test {
    use std::{path::Path, thread, time::Duration};

    use super::*;

    #[test]
    fn test_fit() {
        assert_eq!("abc   ", fit("abc", 6));
        assert_eq!("abcdef", fit("abcdefgh", 6));
        assert_eq!("", fit("abc", 0));
        // Multi-byte characters count as one column each.
        assert_eq!("ñañ", truncate("ñañaña", 3));
    }

    #[test]
    fn test_has_extension() {
        assert!(has_extension(Path::new("/a/b/song.MID"), &["mid"]));
        assert!(has_extension(Path::new("piano.sf2"), &["sf2", "sf3"]));
        assert!(!has_extension(Path::new("readme.txt"), &["mid"]));
        assert!(!has_extension(Path::new("mid"), &["mid"]));
    }

    #[test]
    fn test_join_with_timeout() {
        let quick = thread::spawn(|| {});
        assert!(join_with_timeout(quick, Duration::from_secs(1)));

        let slow = thread::spawn(|| thread::sleep(Duration::from_millis(500)));
        assert!(!join_with_timeout(slow, Duration::from_millis(10)));
    }
}
