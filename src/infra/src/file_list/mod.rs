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

//! The file catalog: one record per known file, with per-column ranges.
//!
//! The catalog is rebuilt into a fresh immutable [`CatalogState`] by each
//! update pass and swapped in atomically, so the query path reads it without
//! locking.

pub mod store;

use config::meta::{
    file::FileRecord,
    value::{ColumnRange, ColumnType, Value},
};

/// Append-only table of directory path strings. File records carry positions
/// into it, so positions must stay stable for the life of the catalog.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DirTable {
    dirs: Vec<String>,
}

impl DirTable {
    pub fn new() -> DirTable {
        DirTable::default()
    }

    pub fn from_rows(dirs: Vec<String>) -> DirTable {
        DirTable { dirs }
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    pub fn get(&self, index: i16) -> Option<&str> {
        self.dirs.get(index as usize).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.dirs.iter().map(|s| s.as_str())
    }

    /// Return the existing position of `path` or append it. The linear scan
    /// is fine: distinct directories are bounded by filesystem depth, not
    /// file count.
    pub fn intern(&mut self, path: &str) -> i16 {
        if let Some(i) = self.dirs.iter().position(|d| d == path) {
            return i as i16;
        }
        self.dirs.push(path.to_string());
        (self.dirs.len() - 1) as i16
    }
}

/// One immutable catalog generation.
#[derive(Clone, Debug, Default)]
pub struct CatalogState {
    pub dirs: DirTable,
    /// Sorted by `(dir_index, name)`, unique.
    pub files: Vec<FileRecord>,
    /// Per-column min of mins / max of maxes / OR of missing bits.
    pub aggregates: Vec<ColumnRange>,
    /// File visitation order for queries, a permutation of `files` indices.
    pub visit_order: Vec<u32>,
}

impl CatalogState {
    pub fn empty(column_types: &[ColumnType]) -> CatalogState {
        CatalogState {
            dirs: DirTable::new(),
            files: Vec::new(),
            aggregates: column_types
                .iter()
                .map(|t| ColumnRange::all_missing(*t))
                .collect(),
            visit_order: Vec::new(),
        }
    }

    pub fn find(&self, dir_index: i16, name: &str) -> Option<usize> {
        self.files
            .binary_search_by(|f| f.sort_key().cmp(&(dir_index, name)))
            .ok()
    }

    pub fn is_sorted_unique(&self) -> bool {
        self.files
            .windows(2)
            .all(|w| w[0].sort_key() < w[1].sort_key())
    }

    /// Rebuild the aggregate min/max table. Ranges of files that hold no
    /// real cell for a column do not contribute bounds.
    pub fn recompute_aggregates(&mut self, column_types: &[ColumnType]) {
        self.aggregates = column_types
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let mut min: Option<Value> = None;
                let mut max: Option<Value> = None;
                let mut has_missing = self.files.is_empty();
                for f in &self.files {
                    let r = &f.ranges[i];
                    has_missing |= r.has_missing;
                    if t.is_missing(&r.min) || t.is_missing(&r.max) {
                        continue;
                    }
                    min = Some(match min {
                        Some(m) if m.compare(&r.min).is_le() => m,
                        _ => r.min.clone(),
                    });
                    max = Some(match max {
                        Some(m) if m.compare(&r.max).is_ge() => m,
                        _ => r.max.clone(),
                    });
                }
                match (min, max) {
                    (Some(lo), Some(hi)) => ColumnRange {
                        min: lo,
                        max: hi,
                        has_missing,
                    },
                    _ => ColumnRange::all_missing(*t),
                }
            })
            .collect();
    }

    /// Order files for query visitation by the configured columns' per-file
    /// minimums, tie-broken by `(dir_index, name)`.
    pub fn compute_visit_order(&mut self, sort_columns: &[usize]) {
        let mut order: Vec<u32> = (0..self.files.len() as u32).collect();
        order.sort_by(|&a, &b| {
            let fa = &self.files[a as usize];
            let fb = &self.files[b as usize];
            for &c in sort_columns {
                let ord = fa.ranges[c].min.compare(&fb.ranges[c].min);
                if !ord.is_eq() {
                    return ord;
                }
            }
            fa.sort_key().cmp(&fb.sort_key())
        });
        self.visit_order = order;
    }
}
