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

//! The soundfont catalog: one category per subdirectory of the soundfont root.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::util;

/// File extensions recognized as soundfonts.
pub const SOUNDFONT_EXTENSIONS: &[&str] = &["sf2", "sf3"];

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("soundfont root {root} is unavailable: {source}")]
    Unavailable {
        root: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A soundfont file within a category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoundFont {
    /// The path to the soundfont file.
    path: PathBuf,
    /// The file name without its extension.
    name: String,
}

impl SoundFont {
    /// Creates a soundfont entry from its path.
    pub fn new(path: PathBuf) -> SoundFont {
        let name = util::stem_display(&path).to_string();
        SoundFont { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The file name including its extension.
    pub fn file_name(&self) -> &str {
        util::filename_display(&self.path)
    }
}

/// A named group of soundfonts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Category {
    name: String,
    soundfonts: Vec<SoundFont>,
}

impl Category {
    pub fn new(name: String, soundfonts: Vec<SoundFont>) -> Category {
        Category { name, soundfonts }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn soundfonts(&self) -> &[SoundFont] {
        &self.soundfonts
    }

    pub fn is_empty(&self) -> bool {
        self.soundfonts.is_empty()
    }

    pub fn soundfont(&self, index: usize) -> Option<&SoundFont> {
        self.soundfonts.get(index)
    }

    /// Finds a soundfont by display name or by file name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.soundfonts
            .iter()
            .position(|soundfont| soundfont.name() == name || soundfont.file_name() == name)
    }
}

/// An immutable snapshot of every category found under the soundfont root.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Catalog {
    categories: Vec<Category>,
}

impl fmt::Display for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Categories (count: {}):", self.categories.len())?;
        for category in self.categories.iter() {
            writeln!(
                f,
                "- {} ({} soundfonts)",
                category.name,
                category.soundfonts.len()
            )?;
            for soundfont in category.soundfonts.iter() {
                writeln!(f, "  - {}", soundfont.name)?;
            }
        }
        Ok(())
    }
}

impl Catalog {
    pub fn new(categories: Vec<Category>) -> Catalog {
        Catalog { categories }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn category(&self, index: usize) -> Option<&Category> {
        self.categories.get(index)
    }

    /// Finds a category by name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.categories
            .iter()
            .position(|category| category.name == name)
    }

    /// Returns the first category that holds at least one soundfont, or the first category if
    /// they are all empty.
    pub fn first_selectable(&self) -> Option<usize> {
        self.categories
            .iter()
            .position(|category| !category.is_empty())
            .or(if self.is_empty() { None } else { Some(0) })
    }

    /// Returns the category after `from`, wrapping to the start and skipping empty categories.
    /// If every category is empty, the plain next category is returned.
    pub fn next_selectable(&self, from: usize) -> Option<usize> {
        let len = self.categories.len();
        if len == 0 {
            return None;
        }

        let any_selectable = self.categories.iter().any(|category| !category.is_empty());
        (1..=len)
            .map(|offset| (from + offset) % len)
            .find(|index| !any_selectable || !self.categories[*index].is_empty())
    }

    /// Clamps a possibly stale category index to one that is valid for this catalog, preferring
    /// a non-empty category.
    pub fn clamp(&self, index: usize) -> Option<usize> {
        if self.is_empty() {
            return None;
        }

        let clamped = index.min(self.categories.len() - 1);
        if self.categories[clamped].is_empty() {
            self.first_selectable()
        } else {
            Some(clamped)
        }
    }
}

/// Scans the soundfont root. Each immediate subdirectory becomes a category containing its
/// soundfont files sorted by file name. Categories are sorted by name, ignoring case.
pub fn scan(root: &Path) -> Result<Catalog, CatalogError> {
    let unavailable = |source: io::Error| CatalogError::Unavailable {
        root: root.to_path_buf(),
        source,
    };

    let mut categories: Vec<Category> = Vec::new();
    for entry in fs::read_dir(root).map_err(unavailable)? {
        let entry = entry.map_err(unavailable)?;
        let path = entry.path();
        let name = util::filename_display(&path).to_string();
        if !path.is_dir() || name.starts_with('.') {
            continue;
        }

        let soundfonts = match list_soundfonts(&path) {
            Ok(soundfonts) => soundfonts,
            Err(e) => {
                warn!(category = name, err = %e, "Unable to read category, treating as empty.");
                Vec::new()
            }
        };
        debug!(category = name, soundfonts = soundfonts.len(), "Found category.");
        categories.push(Category::new(name, soundfonts));
    }

    categories.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });

    Ok(Catalog::new(categories))
}

fn list_soundfonts(category_path: &Path) -> Result<Vec<SoundFont>, io::Error> {
    let mut soundfonts = fs::read_dir(category_path)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && util::has_extension(path, SOUNDFONT_EXTENSIONS))
        .map(SoundFont::new)
        .collect::<Vec<_>>();
    soundfonts.sort_by(|a, b| a.file_name().cmp(b.file_name()));
    Ok(soundfonts)
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use crate::testutil::{category, soundfont_root};

    use super::*;

    #[test]
    fn test_scan() -> Result<(), Box<dyn Error>> {
        let root = soundfont_root(&[
            ("jazz", &["PianoX.sf2", "Brass.sf2", "notes.txt"]),
            ("Classical", &["Strings.SF2"]),
            ("Empty", &[]),
        ])?;

        let catalog = scan(root.path())?;
        let names: Vec<&str> = catalog.categories().iter().map(|c| c.name()).collect();
        assert_eq!(vec!["Classical", "Empty", "jazz"], names);

        let jazz = catalog.category(2).expect("expected jazz");
        let soundfonts: Vec<&str> = jazz.soundfonts().iter().map(|s| s.name()).collect();
        assert_eq!(vec!["Brass", "PianoX"], soundfonts);
        assert_eq!(Some(1), jazz.position("PianoX"));
        assert_eq!(Some(1), jazz.position("PianoX.sf2"));

        assert!(catalog.category(1).expect("expected empty").is_empty());
        Ok(())
    }

    #[test]
    fn test_scan_missing_root() {
        let result = scan(Path::new("/definitely/not/a/soundfont/root"));
        assert!(matches!(result, Err(CatalogError::Unavailable { .. })));
    }

    #[test]
    fn test_navigation_skips_empty_categories() {
        let catalog = Catalog::new(vec![
            category("A", &[]),
            category("B", &["one.sf2"]),
            category("C", &[]),
            category("D", &["two.sf2"]),
        ]);

        assert_eq!(Some(1), catalog.first_selectable());
        assert_eq!(Some(3), catalog.next_selectable(1));
        assert_eq!(Some(1), catalog.next_selectable(3));
        assert_eq!(Some(1), catalog.clamp(2));
        assert_eq!(Some(3), catalog.clamp(10));
    }

    #[test]
    fn test_navigation_all_empty() {
        let catalog = Catalog::new(vec![category("A", &[]), category("B", &[])]);
        assert_eq!(Some(0), catalog.first_selectable());
        assert_eq!(Some(1), catalog.next_selectable(0));
        assert_eq!(Some(0), catalog.next_selectable(1));

        let empty = Catalog::default();
        assert_eq!(None, empty.first_selectable());
        assert_eq!(None, empty.next_selectable(0));
        assert_eq!(None, empty.clamp(3));
    }
}
