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

use serde::{Deserialize, Serialize};

use crate::meta::value::{almost_equal, ColumnRange};

/// Sorted-column state: the file is not ascending.
pub const SPACING_UNSORTED: f64 = -1.0;
/// Sorted-column state: ascending but unevenly spaced.
pub const SPACING_UNEVEN: f64 = 0.0;

/// One catalog row: a file's identity plus the per-column ranges gathered
/// from its last scan. `ranges` is parallel to the dataset's column list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub dir_index: i16,
    pub name: String,
    /// Wall-clock modification time, milliseconds.
    pub last_modified: i64,
    pub sorted_spacing: f64,
    pub ranges: Vec<ColumnRange>,
}

impl FileRecord {
    pub fn sort_key(&self) -> (i16, &str) {
        (self.dir_index, self.name.as_str())
    }

    /// Registry key, stable across runs because directory indices are
    /// append-only.
    pub fn path_key(&self) -> String {
        path_key(self.dir_index, &self.name)
    }
}

pub fn path_key(dir_index: i16, name: &str) -> String {
    format!("{dir_index}/{name}")
}

/// Classify a file's sorted column: `-1` not ascending, `0` ascending but
/// uneven, `δ > 0` strictly ascending with stride `δ`.
pub fn sorted_spacing(values: &[f64]) -> f64 {
    if values.iter().any(|v| v.is_nan()) {
        return SPACING_UNSORTED;
    }
    for w in values.windows(2) {
        if w[1] < w[0] {
            return SPACING_UNSORTED;
        }
    }
    let n = values.len();
    if n < 2 {
        return SPACING_UNEVEN;
    }
    let stride = (values[n - 1] - values[0]) / (n - 1) as f64;
    if stride <= 0.0 {
        return SPACING_UNEVEN;
    }
    for w in values.windows(2) {
        if !almost_equal(w[1] - w[0], stride) {
            return SPACING_UNEVEN;
        }
    }
    stride
}
