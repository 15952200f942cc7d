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

//! Linearization of raw source cells into standardized values.
//!
//! `standard = raw * scale + offset`, with raw cells equal to the fill or
//! missing sentinel (or NaN) mapped to the column type's missing value.

use serde::{Deserialize, Serialize};

use crate::meta::{
    attr::{self, AttrMap},
    value::{ColumnData, ColumnRange, ColumnType, Value},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Packing {
    pub scale: Option<f64>,
    pub offset: Option<f64>,
    pub fill: Option<f64>,
    pub missing: Option<f64>,
}

impl Packing {
    pub fn from_attrs(attrs: &AttrMap) -> Packing {
        Packing {
            scale: attrs.get(attr::ATTR_SCALE_FACTOR).and_then(|v| v.as_f64()),
            offset: attrs.get(attr::ATTR_ADD_OFFSET).and_then(|v| v.as_f64()),
            fill: attrs.get(attr::ATTR_FILL_VALUE).and_then(|v| v.as_f64()),
            missing: attrs.get(attr::ATTR_MISSING_VALUE).and_then(|v| v.as_f64()),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.scale.is_none() && self.offset.is_none()
    }

    pub fn is_missing_raw(&self, raw: f64) -> bool {
        raw.is_nan()
            || self.fill.is_some_and(|f| raw == f)
            || self.missing.is_some_and(|m| raw == m)
    }

    pub fn apply(&self, raw: f64) -> f64 {
        raw * self.scale.unwrap_or(1.0) + self.offset.unwrap_or(0.0)
    }

    /// Map a standardized value back into raw source encoding. Used to hand
    /// range bounds to a file reader in the file's own units.
    pub fn unapply(&self, standard: f64) -> f64 {
        let scale = self.scale.unwrap_or(1.0);
        if scale == 0.0 {
            return standard;
        }
        (standard - self.offset.unwrap_or(0.0)) / scale
    }
}

/// Standardize one raw column: apply packing and replace raw sentinels with
/// the destination type's missing value.
pub fn standardize_column(
    raw: &ColumnData,
    packing: &Packing,
    dest_type: ColumnType,
) -> ColumnData {
    let n = raw.len();
    if dest_type == ColumnType::String {
        let values = match raw {
            ColumnData::String(v) => v.clone(),
            _ => (0..n).map(|i| raw.get(i).to_string()).collect(),
        };
        return ColumnData::String(values);
    }
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let v = raw.as_f64(i);
        if packing.is_missing_raw(v) {
            out.push(dest_type.missing_f64());
        } else {
            out.push(packing.apply(v));
        }
    }
    match dest_type {
        ColumnType::Byte => ColumnData::Byte(out.into_iter().map(|v| v.round() as i8).collect()),
        ColumnType::Short => ColumnData::Short(out.into_iter().map(|v| v.round() as i16).collect()),
        ColumnType::Int => ColumnData::Int(out.into_iter().map(|v| v.round() as i32).collect()),
        ColumnType::Long => ColumnData::Long(out.into_iter().map(|v| v.round() as i64).collect()),
        ColumnType::Float => ColumnData::Float(out.into_iter().map(|v| v as f32).collect()),
        ColumnType::Double | ColumnType::Timestamp => ColumnData::Double(out),
        ColumnType::String => unreachable!(),
    }
}

/// Compute the (min, max, hasMissing) triple of one raw column in
/// standardized space.
pub fn compute_range(raw: &ColumnData, packing: &Packing, dest_type: ColumnType) -> ColumnRange {
    let n = raw.len();
    if dest_type == ColumnType::String {
        let mut min: Option<&str> = None;
        let mut max: Option<&str> = None;
        let mut has_missing = n == 0;
        for i in 0..n {
            let s = raw.as_str(i).unwrap_or("");
            if s.is_empty() {
                has_missing = true;
                continue;
            }
            min = Some(match min {
                Some(m) if m <= s => m,
                _ => s,
            });
            max = Some(match max {
                Some(m) if m >= s => m,
                _ => s,
            });
        }
        return match (min, max) {
            (Some(lo), Some(hi)) => ColumnRange {
                min: Value::String(lo.to_string()),
                max: Value::String(hi.to_string()),
                has_missing,
            },
            _ => ColumnRange::all_missing(ColumnType::String),
        };
    }

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut has_missing = n == 0;
    for i in 0..n {
        let v = raw.as_f64(i);
        if packing.is_missing_raw(v) {
            has_missing = true;
            continue;
        }
        let v = packing.apply(v);
        if v < min {
            min = v;
        }
        if v > max {
            max = v;
        }
    }
    if min > max {
        return ColumnRange::all_missing(dest_type);
    }
    ColumnRange {
        min: Value::from_f64(dest_type, min),
        max: Value::from_f64(dest_type, max),
        has_missing,
    }
}
