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

//! Persistence of the selected category and soundfont.
//!
//! Writes are debounced through a single-slot deadline: scheduling new preferences replaces
//! whatever was pending and pushes the deadline out, so a burst of changes results in one write
//! of the last selection. Writes go to a temporary file that is renamed over the state file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, span, warn, Level};

use crate::util;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("unable to write preferences to {path}: {source}")]
    PersistenceWriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("preferences file {path} is malformed: {source}")]
    MalformedPreferences {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unable to read preferences from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to serialize preferences: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The persisted user selection. Unknown fields are ignored and missing fields fall back to
/// defaults so older or newer state files still load.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// The name of the selected category.
    pub category: Option<String>,
    /// The display name of the selected soundfont.
    pub soundfont: Option<String>,
}

impl Preferences {
    pub fn new(category: &str, soundfont: &str) -> Preferences {
        Preferences {
            category: Some(category.to_string()),
            soundfont: Some(soundfont.to_string()),
        }
    }
}

/// Reads preferences from the given path. Returns None if the file does not exist.
pub fn read(path: &Path) -> Result<Option<Preferences>, StateError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StateError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| StateError::MalformedPreferences {
            path: path.to_path_buf(),
            source,
        })
}

/// Writes the preferences next to the destination and renames them into place, so that the
/// destination always holds either the old or the new contents.
pub fn write_atomic(path: &Path, preferences: &Preferences) -> Result<(), StateError> {
    let contents = serde_json::to_string_pretty(preferences)?;
    let tmp_path = temporary_path(path);
    let write_failed = |source: io::Error| StateError::PersistenceWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_failed)?;
    }

    let result = (|| {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(write_failed(e));
    }
    Ok(())
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = util::filename_display(path).to_string();
    name.push_str(".tmp");
    path.with_file_name(name)
}

/// A write waiting for its deadline.
struct Scheduled {
    deadline: Instant,
    preferences: Preferences,
    sequence: u64,
}

#[derive(Default)]
struct Pending {
    /// The single outstanding write, if any.
    scheduled: Option<Scheduled>,
    /// Incremented on every schedule call.
    sequence: u64,
    shutdown: bool,
}

struct Inner {
    path: PathBuf,
    delay: Duration,
    pending: Mutex<Pending>,
    condvar: Condvar,
    /// Serializes writes and holds the sequence of the last successful one.
    written: Mutex<u64>,
    writes: AtomicUsize,
}

impl Inner {
    fn write(&self, scheduled: Scheduled) {
        let mut written = self.written.lock();
        if scheduled.sequence <= *written {
            debug!(sequence = scheduled.sequence, "Skipping superseded write.");
            return;
        }

        match write_atomic(&self.path, &scheduled.preferences) {
            Ok(()) => {
                *written = scheduled.sequence;
                self.writes.fetch_add(1, Ordering::Relaxed);
                info!(
                    path = %self.path.display(),
                    category = ?scheduled.preferences.category,
                    soundfont = ?scheduled.preferences.soundfont,
                    "Saved preferences."
                );
            }
            Err(e) => error!(
                err = %e,
                "Unable to save preferences, keeping the selection in memory."
            ),
        }
    }

    fn take_scheduled(&self) -> Option<Scheduled> {
        self.pending.lock().scheduled.take()
    }
}

/// Debounces and persists preference changes on a dedicated thread.
pub struct StateStore {
    inner: Arc<Inner>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl StateStore {
    /// Creates a new store for the given path and starts its timer thread.
    pub fn new(path: PathBuf, delay: Duration) -> StateStore {
        let inner = Arc::new(Inner {
            path,
            delay,
            pending: Mutex::new(Pending::default()),
            condvar: Condvar::new(),
            written: Mutex::new(0),
            writes: AtomicUsize::new(0),
        });

        let handle = {
            let inner = inner.clone();
            thread::spawn(move || StateStore::run(inner))
        };

        StateStore {
            inner,
            handle: Mutex::new(Some(handle)),
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Loads the stored preferences. A missing or malformed file yields the defaults.
    pub fn load(&self) -> Preferences {
        match read(&self.inner.path) {
            Ok(Some(preferences)) => {
                info!(
                    category = ?preferences.category,
                    soundfont = ?preferences.soundfont,
                    "Loaded preferences."
                );
                preferences
            }
            Ok(None) => {
                warn!(
                    path = %self.inner.path.display(),
                    "No preferences found, using defaults."
                );
                Preferences::default()
            }
            Err(e) => {
                warn!(err = %e, "Unable to load preferences, using defaults.");
                Preferences::default()
            }
        }
    }

    /// Replaces any pending write with these preferences and restarts the debounce delay.
    pub fn schedule(&self, preferences: Preferences) {
        let mut pending = self.inner.pending.lock();
        if pending.shutdown {
            drop(pending);
            warn!("Preferences changed after shutdown, writing immediately.");
            self.write_now(preferences);
            return;
        }

        pending.sequence += 1;
        let sequence = pending.sequence;
        pending.scheduled = Some(Scheduled {
            deadline: Instant::now() + self.inner.delay,
            preferences,
            sequence,
        });
        self.inner.condvar.notify_all();
    }

    /// Writes any pending preferences immediately.
    pub fn flush(&self) {
        if let Some(scheduled) = self.inner.take_scheduled() {
            self.inner.write(scheduled);
        }
    }

    /// Stops the timer thread and flushes a pending write so that no change is lost.
    pub fn shutdown(&self, timeout: Duration) {
        {
            let mut pending = self.inner.pending.lock();
            pending.shutdown = true;
            self.inner.condvar.notify_all();
        }

        if let Some(handle) = self.handle.lock().take() {
            if !util::join_with_timeout(handle, timeout) {
                warn!("Preferences thread did not stop in time.");
            }
        }

        self.flush();
    }

    /// The number of successful writes so far.
    #[cfg(test)]
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::Relaxed)
    }

    fn write_now(&self, preferences: Preferences) {
        let sequence = {
            let mut pending = self.inner.pending.lock();
            pending.sequence += 1;
            pending.sequence
        };
        self.inner.write(Scheduled {
            deadline: Instant::now(),
            preferences,
            sequence,
        });
    }

    fn run(inner: Arc<Inner>) {
        let span = span!(Level::INFO, "state store");
        let _enter = span.enter();

        loop {
            let due = {
                let mut pending = inner.pending.lock();
                loop {
                    if pending.shutdown {
                        return;
                    }

                    match pending.scheduled.as_ref().map(|s| s.deadline) {
                        None => inner.condvar.wait(&mut pending),
                        Some(deadline) if Instant::now() >= deadline => {
                            break pending.scheduled.take();
                        }
                        Some(deadline) => {
                            let _ = inner.condvar.wait_until(&mut pending, deadline);
                        }
                    }
                }
            };

            // The file is written without holding the pending lock so that schedule never waits
            // on storage.
            if let Some(due) = due {
                inner.write(due);
            }
        }
    }
}

impl Drop for StateStore {
    fn drop(&mut self) {
        let mut pending = self.inner.pending.lock();
        pending.shutdown = true;
        self.inner.condvar.notify_all();
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, fs, thread, time::Duration};

    use crate::testutil::eventually;

    use super::*;

    #[test]
    fn test_read_missing_and_malformed() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state.json");
        assert_eq!(None, read(&path)?);

        fs::write(&path, "{ not json")?;
        assert!(matches!(
            read(&path),
            Err(StateError::MalformedPreferences { .. })
        ));

        let store = StateStore::new(path, Duration::from_secs(10));
        assert_eq!(Preferences::default(), store.load());
        Ok(())
    }

    #[test]
    fn test_forward_compatible_schema() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"category": "Jazz", "volume": 11}"#)?;

        let preferences = read(&path)?.expect("expected preferences");
        assert_eq!(Some("Jazz".to_string()), preferences.category);
        assert_eq!(None, preferences.soundfont);
        Ok(())
    }

    #[test]
    fn test_debounce_writes_last_selection_once() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state.json");
        let store = StateStore::new(path.clone(), Duration::from_millis(300));

        for i in 0..5 {
            store.schedule(Preferences::new("Jazz", &format!("Piano{}", i)));
            thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(0, store.write_count());

        eventually(|| store.write_count() == 1, "Preferences were never written");
        assert_eq!(Some(Preferences::new("Jazz", "Piano4")), read(&path)?);

        // Nothing else is pending, so the count stays at one.
        thread::sleep(Duration::from_millis(400));
        assert_eq!(1, store.write_count());
        Ok(())
    }

    #[test]
    fn test_shutdown_flushes_pending_write() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state.json");
        let store = StateStore::new(path.clone(), Duration::from_secs(10));

        store.schedule(Preferences::new("Rock", "Guitar"));
        store.shutdown(Duration::from_secs(1));

        assert_eq!(1, store.write_count());
        assert_eq!(Some(Preferences::new("Rock", "Guitar")), read(&path)?);
        Ok(())
    }

    #[test]
    fn test_interrupted_write_keeps_previous_value() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state.json");
        write_atomic(&path, &Preferences::new("Jazz", "PianoX"))?;
        assert!(!temporary_path(&path).exists());

        // A crash mid-write leaves a partial temporary file behind but never touches the
        // destination.
        fs::write(temporary_path(&path), r#"{"category": "Ro"#)?;
        assert_eq!(Some(Preferences::new("Jazz", "PianoX")), read(&path)?);

        // The next write replaces both.
        write_atomic(&path, &Preferences::new("Rock", "Guitar"))?;
        assert_eq!(Some(Preferences::new("Rock", "Guitar")), read(&path)?);
        assert!(!temporary_path(&path).exists());
        Ok(())
    }

    #[test]
    fn test_write_failure_is_not_fatal() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let blocker = dir.path().join("not-a-directory");
        fs::write(&blocker, "")?;
        let path = blocker.join("state.json");

        assert!(matches!(
            write_atomic(&path, &Preferences::new("Jazz", "PianoX")),
            Err(StateError::PersistenceWriteFailed { .. })
        ));

        let store = StateStore::new(path, Duration::from_millis(10));
        store.schedule(Preferences::new("Jazz", "PianoX"));
        store.shutdown(Duration::from_secs(1));
        assert_eq!(0, store.write_count());
        Ok(())
    }
}
