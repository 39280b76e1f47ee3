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
    error::Error,
    fs,
    path::PathBuf,
    thread,
    time::{Duration, SystemTime},
};

use tempfile::TempDir;

use crate::catalog::{Category, SoundFont};

/// Wait for the given predicate to return true or fail.
#[inline]
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = SystemTime::now();
    let mut tick = Duration::from_millis(5);
    let timeout = Duration::from_secs(10);
    let max_tick = Duration::from_millis(100);

    loop {
        let elapsed = start.elapsed().expect("System time error");
        if elapsed > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }

        thread::sleep(tick);
        tick = std::cmp::min(tick * 2, max_tick);
    }
}

/// Creates a soundfont root with one directory per category, each containing the given files.
pub fn soundfont_root(categories: &[(&str, &[&str])]) -> Result<TempDir, Box<dyn Error>> {
    let root = tempfile::tempdir()?;
    for (category, files) in categories {
        let dir = root.path().join(category);
        fs::create_dir(&dir)?;
        for file in files.iter() {
            fs::write(dir.join(file), b"sfbk")?;
        }
    }
    Ok(root)
}

/// Creates a media directory containing the given files.
pub fn media_dir(files: &[&str]) -> Result<TempDir, Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    for file in files.iter() {
        fs::write(dir.path().join(file), b"MThd")?;
    }
    Ok(dir)
}

/// Builds an in-memory category without touching the filesystem.
pub fn category(name: &str, files: &[&str]) -> Category {
    Category::new(
        name.to_string(),
        files
            .iter()
            .map(|file| SoundFont::new(PathBuf::from("/soundfonts").join(name).join(file)))
            .collect(),
    )
}
