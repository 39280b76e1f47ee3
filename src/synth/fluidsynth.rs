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

//! Drives the fluidsynth command line player. Each track runs in its own fluidsynth process;
//! the process exiting is the end-of-stream signal.

use std::{
    error::Error,
    fmt,
    fs::File,
    io::Read,
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use tracing::{debug, info, span, warn, Level, Span};

use super::{Status, SynthError};
use crate::config;

/// How long a stopped process has to exit before it is killed.
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

struct Process {
    child: Child,
    track: PathBuf,
    paused: bool,
}

/// A synthesizer backed by fluidsynth processes.
pub struct Synthesizer {
    /// The fluidsynth binary.
    binary: String,
    /// Arguments placed before the standard ones.
    args: Vec<String>,
    /// The output gain.
    gain: f32,
    /// The fluidsynth audio driver, if not the default.
    audio_driver: Option<String>,
    /// The soundfont passed to the next process.
    soundfont: Mutex<Option<PathBuf>>,
    /// The process rendering the current track.
    process: Mutex<Option<Process>>,
    span: Span,
}

impl Synthesizer {
    pub fn new(config: &config::Fluidsynth) -> Result<Synthesizer, Box<dyn Error>> {
        if !(0.0..=10.0).contains(&config.gain()) {
            return Err(format!("fluidsynth gain {} is out of range 0-10", config.gain()).into());
        }

        Ok(Synthesizer {
            binary: config.binary().to_string(),
            args: config.args().to_vec(),
            gain: config.gain(),
            audio_driver: config.audio_driver().map(str::to_string),
            soundfont: Mutex::new(None),
            process: Mutex::new(None),
            span: span!(Level::INFO, "fluidsynth"),
        })
    }

    fn command(&self, soundfont: &Path, track: &Path) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .args(&self.args)
            .arg("-ni")
            .arg("-g")
            .arg(self.gain.to_string());
        if let Some(audio_driver) = &self.audio_driver {
            command.arg("-a").arg(audio_driver);
        }
        command
            .arg(soundfont)
            .arg(track)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
    }

    /// Stops the process, giving it a chance to exit on its own before killing it.
    fn terminate(mut process: Process) -> Result<(), SynthError> {
        if process.child.try_wait()?.is_some() {
            return Ok(());
        }

        if process.paused {
            signal::resume(&process.child)?;
        }
        signal::terminate(&mut process.child)?;

        let deadline = Instant::now() + STOP_TIMEOUT;
        while Instant::now() < deadline {
            if process.child.try_wait()?.is_some() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(10));
        }

        warn!(track = %process.track.display(), "fluidsynth did not exit, killing it.");
        process.child.kill()?;
        process.child.wait()?;
        Ok(())
    }
}

/// Checks that the file is readable and carries a RIFF soundfont header.
fn verify_soundfont(path: &Path) -> Result<(), SynthError> {
    let failed = |reason: String| SynthError::SoundFontLoadFailed {
        path: path.to_path_buf(),
        reason,
    };

    let mut header = [0u8; 12];
    File::open(path)
        .and_then(|mut file| file.read_exact(&mut header))
        .map_err(|e| failed(e.to_string()))?;
    if &header[0..4] != b"RIFF" || &header[8..12] != b"sfbk" {
        return Err(failed("not a soundfont file".to_string()));
    }
    Ok(())
}

/// Checks that the track exists and can be read.
fn verify_track(path: &Path) -> Result<(), SynthError> {
    let mut byte = [0u8; 1];
    File::open(path)
        .and_then(|mut file| file.read_exact(&mut byte))
        .map_err(|e| SynthError::TrackLoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

impl super::Synthesizer for Synthesizer {
    fn load(&self, soundfont: &Path) -> Result<(), SynthError> {
        let _enter = self.span.enter();
        verify_soundfont(soundfont)?;
        info!(soundfont = %soundfont.display(), "Loaded soundfont.");
        *self.soundfont.lock() = Some(soundfont.to_path_buf());
        Ok(())
    }

    fn play(&self, track: &Path) -> Result<(), SynthError> {
        let _enter = self.span.enter();
        let soundfont = self.soundfont.lock().clone().ok_or(SynthError::NoSoundFont)?;
        verify_track(track)?;

        let mut process = self.process.lock();
        if let Some(previous) = process.take() {
            Synthesizer::terminate(previous)?;
        }

        let child = self.command(&soundfont, track).spawn()?;
        info!(
            pid = child.id(),
            soundfont = %soundfont.display(),
            track = %track.display(),
            "Started fluidsynth."
        );
        *process = Some(Process {
            child,
            track: track.to_path_buf(),
            paused: false,
        });
        Ok(())
    }

    fn pause(&self) -> Result<(), SynthError> {
        let mut process = self.process.lock();
        if let Some(process) = process.as_mut().filter(|process| !process.paused) {
            signal::pause(&process.child)?;
            process.paused = true;
        }
        Ok(())
    }

    fn resume(&self) -> Result<(), SynthError> {
        let mut process = self.process.lock();
        if let Some(process) = process.as_mut().filter(|process| process.paused) {
            signal::resume(&process.child)?;
            process.paused = false;
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), SynthError> {
        let _enter = self.span.enter();
        match self.process.lock().take() {
            Some(process) => {
                debug!(track = %process.track.display(), "Stopping fluidsynth.");
                Synthesizer::terminate(process)
            }
            None => Ok(()),
        }
    }

    fn status(&self) -> Status {
        let mut process = self.process.lock();
        let Some(process) = process.as_mut() else {
            return Status::Idle;
        };

        match process.child.try_wait() {
            Ok(Some(exit)) if exit.success() => Status::Finished,
            Ok(Some(exit)) => Status::Failed(format!("fluidsynth exited with {}", exit)),
            Ok(None) if process.paused => Status::Paused,
            Ok(None) => Status::Playing,
            Err(e) => Status::Failed(e.to_string()),
        }
    }
}

impl Drop for Synthesizer {
    fn drop(&mut self) {
        if let Some(process) = self.process.lock().take() {
            if let Err(e) = Synthesizer::terminate(process) {
                warn!(err = %e, "Unable to stop fluidsynth.");
            }
        }
    }
}

impl fmt::Display for Synthesizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (fluidsynth, gain {})", self.binary, self.gain)
    }
}

#[cfg(unix)]
mod signal {
    use std::{io, process::Child};

    use crate::synth::SynthError;

    fn send(child: &Child, signal: libc::c_int) -> Result<(), SynthError> {
        let pid = libc::pid_t::try_from(child.id())
            .map_err(|_| SynthError::Unsupported("signalling this process id"))?;
        // SAFETY: kill takes no pointers. The child has not been reaped, so the pid still
        // refers to it.
        if unsafe { libc::kill(pid, signal) } == 0 {
            Ok(())
        } else {
            Err(SynthError::Process(io::Error::last_os_error()))
        }
    }

    pub fn pause(child: &Child) -> Result<(), SynthError> {
        send(child, libc::SIGSTOP)
    }

    pub fn resume(child: &Child) -> Result<(), SynthError> {
        send(child, libc::SIGCONT)
    }

    pub fn terminate(child: &mut Child) -> Result<(), SynthError> {
        send(child, libc::SIGTERM)
    }
}

#[cfg(not(unix))]
mod signal {
    use std::process::Child;

    use crate::synth::SynthError;

    pub fn pause(_: &Child) -> Result<(), SynthError> {
        Err(SynthError::Unsupported("pausing fluidsynth"))
    }

    pub fn resume(_: &Child) -> Result<(), SynthError> {
        Err(SynthError::Unsupported("resuming fluidsynth"))
    }

    pub fn terminate(child: &mut Child) -> Result<(), SynthError> {
        Ok(child.kill()?)
    }
}

#[cfg(all(test, unix))]
mod test {
    use std::{error::Error, fs, path::PathBuf};

    use tempfile::TempDir;

    use crate::{
        config,
        synth::{Status, SynthError, Synthesizer as _},
        testutil::eventually,
    };

    use super::Synthesizer;

    /// Uses the shell in place of fluidsynth so that tests control how long "playback" takes.
    fn synthesizer(script: &str) -> Result<Synthesizer, Box<dyn Error>> {
        Synthesizer::new(&config::Fluidsynth::new(
            "/bin/sh",
            vec!["-c".to_string(), script.to_string(), "fluidsynth".to_string()],
        ))
    }

    fn fixtures() -> Result<(TempDir, PathBuf, PathBuf), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let soundfont = dir.path().join("Piano.sf2");
        let mut contents = b"RIFF".to_vec();
        contents.extend_from_slice(&[0, 0, 0, 0]);
        contents.extend_from_slice(b"sfbk");
        fs::write(&soundfont, contents)?;
        let track = dir.path().join("01 Song.mid");
        fs::write(&track, b"MThd")?;
        Ok((dir, soundfont, track))
    }

    #[test]
    fn test_rejects_bad_files() -> Result<(), Box<dyn Error>> {
        let (dir, soundfont, _) = fixtures()?;
        let synthesizer = synthesizer("exit 0")?;

        let corrupt = dir.path().join("Corrupt.sf2");
        fs::write(&corrupt, b"this is not a soundfont")?;
        assert!(matches!(
            synthesizer.load(&corrupt),
            Err(SynthError::SoundFontLoadFailed { .. })
        ));
        assert!(matches!(
            synthesizer.load(&dir.path().join("Missing.sf2")),
            Err(SynthError::SoundFontLoadFailed { .. })
        ));
        assert!(matches!(
            synthesizer.play(&dir.path().join("missing.mid")),
            Err(SynthError::NoSoundFont)
        ));

        synthesizer.load(&soundfont)?;
        assert!(matches!(
            synthesizer.play(&dir.path().join("missing.mid")),
            Err(SynthError::TrackLoadFailed { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_track_finishes() -> Result<(), Box<dyn Error>> {
        let (_dir, soundfont, track) = fixtures()?;
        let synthesizer = synthesizer("exit 0")?;
        assert_eq!(Status::Idle, synthesizer.status());

        synthesizer.load(&soundfont)?;
        synthesizer.play(&track)?;
        eventually(
            || synthesizer.status() == Status::Finished,
            "Track never finished",
        );

        synthesizer.stop()?;
        assert_eq!(Status::Idle, synthesizer.status());
        Ok(())
    }

    #[test]
    fn test_failed_process() -> Result<(), Box<dyn Error>> {
        let (_dir, soundfont, track) = fixtures()?;
        let synthesizer = synthesizer("exit 3")?;

        synthesizer.load(&soundfont)?;
        synthesizer.play(&track)?;
        eventually(
            || matches!(synthesizer.status(), Status::Failed(_)),
            "Process failure never reported",
        );
        Ok(())
    }

    #[test]
    fn test_pause_resume_stop() -> Result<(), Box<dyn Error>> {
        let (_dir, soundfont, track) = fixtures()?;
        let synthesizer = synthesizer("sleep 30")?;

        synthesizer.load(&soundfont)?;
        synthesizer.play(&track)?;
        assert_eq!(Status::Playing, synthesizer.status());

        synthesizer.pause()?;
        assert_eq!(Status::Paused, synthesizer.status());
        synthesizer.resume()?;
        assert_eq!(Status::Playing, synthesizer.status());

        synthesizer.pause()?;
        synthesizer.stop()?;
        assert_eq!(Status::Idle, synthesizer.status());
        Ok(())
    }
}
