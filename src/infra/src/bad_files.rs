// Copyright 2025 OpenObserve Inc.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Quarantine registry for files that keep failing to scan.
//!
//! Keyed by `dirIndex/name`. An entry suppresses rescanning only while the
//! file's lastModified still matches; touching the file lets it try again.

use config::{meta::file::path_key, RwHashMap};
use hashbrown::HashSet;

#[derive(Clone, Debug, PartialEq)]
pub struct BadFileEntry {
    pub last_modified: i64,
    pub reason: String,
}

#[derive(Default)]
pub struct BadFileRegistry {
    entries: RwHashMap<String, BadFileEntry>,
}

impl BadFileRegistry {
    pub fn new() -> BadFileRegistry {
        BadFileRegistry::default()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn insert(&self, dir_index: i16, name: &str, last_modified: i64, reason: &str) {
        self.entries.insert(
            path_key(dir_index, name),
            BadFileEntry {
                last_modified,
                reason: reason.to_string(),
            },
        );
    }

    pub fn remove(&self, dir_index: i16, name: &str) {
        self.entries.remove(&path_key(dir_index, name));
    }

    /// True while the file is quarantined: an entry exists and the file has
    /// not been modified since it was recorded.
    pub fn matches(&self, dir_index: i16, name: &str, last_modified: i64) -> bool {
        self.entries
            .get(&path_key(dir_index, name))
            .is_some_and(|e| e.last_modified == last_modified)
    }

    /// Drop entries whose files are no longer present on disk.
    pub fn retain_present(&self, present: &HashSet<String>) {
        self.entries.retain(|key, _| present.contains(key.as_str()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stable snapshot for persistence and notification summaries.
    pub fn snapshot(&self) -> Vec<(String, BadFileEntry)> {
        let mut rows: Vec<(String, BadFileEntry)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }

    pub fn hydrate(&self, rows: Vec<(String, BadFileEntry)>) {
        for (key, entry) in rows {
            self.entries.insert(key, entry);
        }
    }
}
