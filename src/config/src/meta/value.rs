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

//! Typed scalar values and column arrays.
//!
//! Every column of the aggregation table has one logical type. Scalars cross
//! module boundaries as [`Value`], whole columns as [`ColumnData`], so per-file
//! min/max can be kept in the column's own type without boxing each cell.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    #[serde(rename = "byte")]
    Byte,
    #[serde(rename = "short")]
    Short,
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "long")]
    Long,
    #[serde(rename = "float")]
    Float,
    #[default]
    #[serde(rename = "double")]
    Double,
    #[serde(rename = "string")]
    String,
    /// Canonical form is epoch seconds as f64. Source encoding may differ and
    /// is linearized through the column's packing.
    #[serde(rename = "timestamp")]
    Timestamp,
}

impl ColumnType {
    pub fn is_numeric(&self) -> bool {
        !matches!(self, ColumnType::String)
    }

    pub fn is_floating(&self) -> bool {
        matches!(
            self,
            ColumnType::Float | ColumnType::Double | ColumnType::Timestamp
        )
    }

    /// The sentinel standing for a missing cell in standardized space.
    /// Integer widths use their max value, floats use NaN, text uses "".
    pub fn missing_value(&self) -> Value {
        match self {
            ColumnType::Byte => Value::Byte(i8::MAX),
            ColumnType::Short => Value::Short(i16::MAX),
            ColumnType::Int => Value::Int(i32::MAX),
            ColumnType::Long => Value::Long(i64::MAX),
            ColumnType::Float => Value::Float(f32::NAN),
            ColumnType::Double | ColumnType::Timestamp => Value::Double(f64::NAN),
            ColumnType::String => Value::String(String::new()),
        }
    }

    pub fn missing_f64(&self) -> f64 {
        match self {
            ColumnType::Byte => i8::MAX as f64,
            ColumnType::Short => i16::MAX as f64,
            ColumnType::Int => i32::MAX as f64,
            ColumnType::Long => i64::MAX as f64,
            _ => f64::NAN,
        }
    }

    /// Does `v` stand for a missing cell of this column?
    pub fn is_missing(&self, v: &Value) -> bool {
        match v {
            Value::String(s) => s.is_empty(),
            _ => {
                let x = v.as_f64();
                x.is_nan() || x == self.missing_f64()
            }
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            ColumnType::Byte => "byte",
            ColumnType::Short => "short",
            ColumnType::Int => "int",
            ColumnType::Long => "long",
            ColumnType::Float => "float",
            ColumnType::Double => "double",
            ColumnType::String => "string",
            ColumnType::Timestamp => "timestamp",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

impl Value {
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Byte(v) => *v as f64,
            Value::Short(v) => *v as f64,
            Value::Int(v) => *v as f64,
            Value::Long(v) => *v as f64,
            Value::Float(v) => *v as f64,
            Value::Double(v) => *v,
            Value::String(_) => f64::NAN,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    /// Cast a standardized f64 back into the column's own width. NaN on an
    /// integer column falls back to that width's missing sentinel.
    pub fn from_f64(column_type: ColumnType, v: f64) -> Value {
        if v.is_nan() && !column_type.is_floating() {
            return column_type.missing_value();
        }
        match column_type {
            ColumnType::Byte => Value::Byte(v.round() as i8),
            ColumnType::Short => Value::Short(v.round() as i16),
            ColumnType::Int => Value::Int(v.round() as i32),
            ColumnType::Long => Value::Long(v.round() as i64),
            ColumnType::Float => Value::Float(v as f32),
            ColumnType::Double | ColumnType::Timestamp => Value::Double(v),
            ColumnType::String => Value::String(format_f64(v)),
        }
    }

    /// Total order: strings lexicographic, everything else through f64.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a.cmp(b),
            _ => self.as_f64().total_cmp(&other.as_f64()),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Value::Byte(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
        }
    }
}

fn format_f64(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        format!("{v}")
    }
}

/// One column's worth of cells, kept in the column's own width.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnData {
    Byte(Vec<i8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    String(Vec<String>),
}

impl ColumnData {
    pub fn with_capacity(column_type: ColumnType, n: usize) -> ColumnData {
        match column_type {
            ColumnType::Byte => ColumnData::Byte(Vec::with_capacity(n)),
            ColumnType::Short => ColumnData::Short(Vec::with_capacity(n)),
            ColumnType::Int => ColumnData::Int(Vec::with_capacity(n)),
            ColumnType::Long => ColumnData::Long(Vec::with_capacity(n)),
            ColumnType::Float => ColumnData::Float(Vec::with_capacity(n)),
            ColumnType::Double | ColumnType::Timestamp => ColumnData::Double(Vec::with_capacity(n)),
            ColumnType::String => ColumnData::String(Vec::with_capacity(n)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Byte(v) => v.len(),
            ColumnData::Short(v) => v.len(),
            ColumnData::Int(v) => v.len(),
            ColumnData::Long(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Double(v) => v.len(),
            ColumnData::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> Value {
        match self {
            ColumnData::Byte(v) => Value::Byte(v[i]),
            ColumnData::Short(v) => Value::Short(v[i]),
            ColumnData::Int(v) => Value::Int(v[i]),
            ColumnData::Long(v) => Value::Long(v[i]),
            ColumnData::Float(v) => Value::Float(v[i]),
            ColumnData::Double(v) => Value::Double(v[i]),
            ColumnData::String(v) => Value::String(v[i].clone()),
        }
    }

    pub fn as_f64(&self, i: usize) -> f64 {
        match self {
            ColumnData::Byte(v) => v[i] as f64,
            ColumnData::Short(v) => v[i] as f64,
            ColumnData::Int(v) => v[i] as f64,
            ColumnData::Long(v) => v[i] as f64,
            ColumnData::Float(v) => v[i] as f64,
            ColumnData::Double(v) => v[i],
            ColumnData::String(_) => f64::NAN,
        }
    }

    pub fn as_str(&self, i: usize) -> Option<&str> {
        match self {
            ColumnData::String(v) => Some(v[i].as_str()),
            _ => None,
        }
    }

    pub fn push_value(&mut self, value: &Value) -> Result<(), anyhow::Error> {
        match (self, value) {
            (ColumnData::Byte(v), Value::Byte(x)) => v.push(*x),
            (ColumnData::Short(v), Value::Short(x)) => v.push(*x),
            (ColumnData::Int(v), Value::Int(x)) => v.push(*x),
            (ColumnData::Long(v), Value::Long(x)) => v.push(*x),
            (ColumnData::Float(v), Value::Float(x)) => v.push(*x),
            (ColumnData::Double(v), Value::Double(x)) => v.push(*x),
            (ColumnData::String(v), Value::String(x)) => v.push(x.clone()),
            // numeric widths are interchangeable through f64
            (col, val) if !matches!(col, ColumnData::String(_)) && !val.is_string() => {
                let x = val.as_f64();
                match col {
                    ColumnData::Byte(v) => v.push(x.round() as i8),
                    ColumnData::Short(v) => v.push(x.round() as i16),
                    ColumnData::Int(v) => v.push(x.round() as i32),
                    ColumnData::Long(v) => v.push(x.round() as i64),
                    ColumnData::Float(v) => v.push(x as f32),
                    ColumnData::Double(v) => v.push(x),
                    ColumnData::String(_) => unreachable!(),
                }
            }
            (col, val) => {
                return Err(anyhow::anyhow!(
                    "cannot push {val:?} into a {} column",
                    col.column_type()
                ));
            }
        }
        Ok(())
    }

    pub fn from_values(column_type: ColumnType, values: &[Value]) -> Result<ColumnData, anyhow::Error> {
        let mut data = ColumnData::with_capacity(column_type, values.len());
        for v in values {
            data.push_value(v)?;
        }
        Ok(data)
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnData::Byte(_) => ColumnType::Byte,
            ColumnData::Short(_) => ColumnType::Short,
            ColumnData::Int(_) => ColumnType::Int,
            ColumnData::Long(_) => ColumnType::Long,
            ColumnData::Float(_) => ColumnType::Float,
            ColumnData::Double(_) => ColumnType::Double,
            ColumnData::String(_) => ColumnType::String,
        }
    }

    pub fn filter(&self, keep: &[bool]) -> ColumnData {
        fn sieve<T: Clone>(v: &[T], keep: &[bool]) -> Vec<T> {
            v.iter()
                .zip(keep.iter())
                .filter(|(_, k)| **k)
                .map(|(x, _)| x.clone())
                .collect()
        }
        match self {
            ColumnData::Byte(v) => ColumnData::Byte(sieve(v, keep)),
            ColumnData::Short(v) => ColumnData::Short(sieve(v, keep)),
            ColumnData::Int(v) => ColumnData::Int(sieve(v, keep)),
            ColumnData::Long(v) => ColumnData::Long(sieve(v, keep)),
            ColumnData::Float(v) => ColumnData::Float(sieve(v, keep)),
            ColumnData::Double(v) => ColumnData::Double(sieve(v, keep)),
            ColumnData::String(v) => ColumnData::String(sieve(v, keep)),
        }
    }
}

/// Per-file range of one column: min, max and a missing-cell indicator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnRange {
    pub min: Value,
    pub max: Value,
    pub has_missing: bool,
}

impl ColumnRange {
    /// The range of a column no file has any real cell for.
    pub fn all_missing(column_type: ColumnType) -> ColumnRange {
        ColumnRange {
            min: column_type.missing_value(),
            max: column_type.missing_value(),
            has_missing: true,
        }
    }

    pub fn of_constant(value: Value, has_missing: bool) -> ColumnRange {
        ColumnRange {
            min: value.clone(),
            max: value,
            has_missing,
        }
    }
}

/// Five-significant-digit equality. Min/max aggregated over packed source
/// values drift in the last bits; exclusion decisions must not hinge on them.
pub fn almost_equal(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    if !a.is_finite() || !b.is_finite() {
        return a.is_nan() && b.is_nan();
    }
    (a - b).abs() <= a.abs().max(b.abs()) * 1e-5
}

pub fn almost_le(a: f64, b: f64) -> bool {
    a <= b || almost_equal(a, b)
}

pub fn almost_ge(a: f64, b: f64) -> bool {
    a >= b || almost_equal(a, b)
}
