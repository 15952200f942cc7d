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

//! Attribute bags carried by tables and columns.
//!
//! One definition serves both the attributes a file reader reports and the
//! override layers from dataset configuration. Overlays win on conflict; the
//! literal string `"null"` deletes the underlying attribute.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

pub const ATTR_SCALE_FACTOR: &str = "scale_factor";
pub const ATTR_ADD_OFFSET: &str = "add_offset";
pub const ATTR_FILL_VALUE: &str = "_FillValue";
pub const ATTR_MISSING_VALUE: &str = "missing_value";
pub const ATTR_UNITS: &str = "units";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Number(f64),
    Text(String),
    NumberList(Vec<f64>),
    TextList(Vec<String>),
}

impl AttrValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Number(v) => Some(*v),
            AttrValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    fn is_null_marker(&self) -> bool {
        matches!(self, AttrValue::Text(s) if s == "null")
    }
}

pub type AttrMap = HashMap<String, AttrValue>;

/// Apply `overlay` on top of `base` in place.
pub fn merge(base: &mut AttrMap, overlay: &AttrMap) {
    for (key, value) in overlay {
        if value.is_null_marker() {
            base.remove(key);
        } else {
            base.insert(key.clone(), value.clone());
        }
    }
}
