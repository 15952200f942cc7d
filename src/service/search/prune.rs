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

//! Range-level predicate evaluation.
//!
//! Given a column's (min, max, hasMissing) and one constraint, decide
//! whether any row in that range *could* satisfy it. The answer must never
//! be a false "no": min/max are aggregated from possibly-packed source
//! values, so comparisons lean tolerant and spurious admission is only a
//! performance cost.

use config::meta::value::{almost_ge, almost_le, ColumnRange, ColumnType, Value};
use regex::Regex;

use crate::meta::search::Operator;

pub fn range_may_match(
    column_type: ColumnType,
    range: &ColumnRange,
    op: Operator,
    value: &Value,
    regex: Option<&Regex>,
) -> bool {
    if column_type == ColumnType::String || op == Operator::Regex {
        string_may_match(range, op, value, regex)
    } else {
        numeric_may_match(column_type, range, op, value)
    }
}

fn string_may_match(range: &ColumnRange, op: Operator, value: &Value, regex: Option<&Regex>) -> bool {
    let value = value.to_string();
    let min = range.min.to_string();
    let max = range.max.to_string();

    // a missing cell is the empty string; check what it alone satisfies
    if range.has_missing {
        match op {
            Operator::Eq | Operator::Ge if value.is_empty() => return true,
            Operator::Lt | Operator::Ne if !value.is_empty() => return true,
            Operator::Le => return true,
            Operator::Regex => {
                if regex.map(|re| re.is_match("")).unwrap_or(value.is_empty()) {
                    return true;
                }
            }
            _ => {}
        }
    }

    match op {
        Operator::Eq => min.as_str() <= value.as_str() && max.as_str() >= value.as_str(),
        Operator::Ne => !(min == max && min == value),
        Operator::Lt => min < value,
        Operator::Le => min <= value,
        Operator::Gt => max > value,
        Operator::Ge => max >= value,
        Operator::Regex => {
            if min == max {
                regex.map(|re| re.is_match(&min)).unwrap_or(true)
            } else {
                true
            }
        }
    }
}

fn numeric_may_match(
    column_type: ColumnType,
    range: &ColumnRange,
    op: Operator,
    value: &Value,
) -> bool {
    let v = value.as_f64();
    let min = range.min.as_f64();
    let max = range.max.as_f64();
    let range_all_missing =
        column_type.is_missing(&range.min) && column_type.is_missing(&range.max);

    if column_type.is_missing(value) {
        return match op {
            Operator::Eq | Operator::Le | Operator::Ge => range.has_missing || range_all_missing,
            Operator::Ne => !range_all_missing,
            _ => false,
        };
    }
    if range_all_missing {
        return op == Operator::Ne;
    }

    match op {
        Operator::Eq => almost_le(min, v) && almost_ge(max, v),
        Operator::Ne => range.has_missing || !(min == max && min == v),
        Operator::Lt => min < v,
        Operator::Le => almost_le(min, v),
        Operator::Gt => max > v,
        Operator::Ge => almost_ge(max, v),
        Operator::Regex => unreachable!("regex constraints take the string path"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num_range(min: f64, max: f64, has_missing: bool) -> ColumnRange {
        ColumnRange {
            min: Value::Double(min),
            max: Value::Double(max),
            has_missing,
        }
    }

    fn str_range(min: &str, max: &str, has_missing: bool) -> ColumnRange {
        ColumnRange {
            min: Value::String(min.to_string()),
            max: Value::String(max.to_string()),
            has_missing,
        }
    }

    fn check_num(range: &ColumnRange, op: Operator, v: f64) -> bool {
        range_may_match(ColumnType::Double, range, op, &Value::Double(v), None)
    }

    #[test]
    fn test_numeric_disjoint_ranges_reject_eq() {
        // two files [0,10] and [20,30], constraint time=15 opens neither
        assert!(!check_num(&num_range(0.0, 10.0, false), Operator::Eq, 15.0));
        assert!(!check_num(&num_range(20.0, 30.0, false), Operator::Eq, 15.0));
        assert!(check_num(&num_range(10.0, 20.0, false), Operator::Eq, 15.0));
    }

    #[test]
    fn test_numeric_inequalities() {
        let r = num_range(10.0, 20.0, false);
        assert!(!check_num(&r, Operator::Lt, 10.0));
        assert!(check_num(&r, Operator::Lt, 10.5));
        assert!(check_num(&r, Operator::Le, 10.0));
        assert!(!check_num(&r, Operator::Gt, 20.0));
        assert!(check_num(&r, Operator::Ge, 20.0));
        assert!(!check_num(&r, Operator::Ge, 20.5));
    }

    #[test]
    fn test_numeric_tolerance_admits_boundary_drift() {
        // bounds computed through packing may be off in the last digits
        let r = num_range(10.000001, 20.0, false);
        assert!(check_num(&r, Operator::Le, 10.0));
        assert!(check_num(&r, Operator::Eq, 10.0));
        assert!(!check_num(&r, Operator::Lt, 10.0));
    }

    #[test]
    fn test_numeric_ne_uniform_file() {
        assert!(!check_num(&num_range(5.0, 5.0, false), Operator::Ne, 5.0));
        assert!(check_num(&num_range(5.0, 6.0, false), Operator::Ne, 5.0));
        // a missing cell differs from 5, so the file may still match
        assert!(check_num(&num_range(5.0, 5.0, true), Operator::Ne, 5.0));
    }

    #[test]
    fn test_numeric_missing_value_constraint() {
        let with_missing = num_range(1.0, 2.0, true);
        let without = num_range(1.0, 2.0, false);
        let nan = Value::Double(f64::NAN);
        for op in [Operator::Eq, Operator::Le, Operator::Ge] {
            assert!(range_may_match(ColumnType::Double, &with_missing, op, &nan, None));
            assert!(!range_may_match(ColumnType::Double, &without, op, &nan, None));
        }
        assert!(range_may_match(ColumnType::Double, &without, Operator::Ne, &nan, None));
        assert!(!range_may_match(ColumnType::Double, &with_missing, Operator::Lt, &nan, None));
    }

    #[test]
    fn test_numeric_all_missing_range() {
        let r = ColumnRange::all_missing(ColumnType::Double);
        assert!(!check_num(&r, Operator::Eq, 5.0));
        assert!(!check_num(&r, Operator::Lt, 5.0));
        assert!(check_num(&r, Operator::Ne, 5.0));
        let nan = Value::Double(f64::NAN);
        assert!(range_may_match(ColumnType::Double, &r, Operator::Eq, &nan, None));
        assert!(!range_may_match(ColumnType::Double, &r, Operator::Ne, &nan, None));
    }

    #[test]
    fn test_integer_missing_sentinel() {
        let r = ColumnRange {
            min: Value::Int(1),
            max: Value::Int(9),
            has_missing: true,
        };
        let sentinel = Value::Int(i32::MAX);
        assert!(range_may_match(ColumnType::Int, &r, Operator::Eq, &sentinel, None));
        assert!(!range_may_match(ColumnType::Int, &r, Operator::Gt, &sentinel, None));
    }

    #[test]
    fn test_string_ops() {
        let v = |s: &str| Value::String(s.to_string());
        let r = str_range("B", "D", false);
        assert!(range_may_match(ColumnType::String, &r, Operator::Eq, &v("C"), None));
        assert!(!range_may_match(ColumnType::String, &r, Operator::Eq, &v("E"), None));
        assert!(range_may_match(ColumnType::String, &r, Operator::Lt, &v("C"), None));
        assert!(!range_may_match(ColumnType::String, &r, Operator::Lt, &v("B"), None));
        assert!(range_may_match(ColumnType::String, &r, Operator::Ge, &v("D"), None));
        assert!(!range_may_match(ColumnType::String, &r, Operator::Gt, &v("D"), None));
        let uniform = str_range("A", "A", false);
        assert!(!range_may_match(ColumnType::String, &uniform, Operator::Ne, &v("A"), None));
    }

    #[test]
    fn test_string_missing_rules() {
        let v = |s: &str| Value::String(s.to_string());
        let r = str_range("B", "D", true);
        // the empty string stands for a missing cell
        assert!(range_may_match(ColumnType::String, &r, Operator::Eq, &v(""), None));
        assert!(range_may_match(ColumnType::String, &r, Operator::Lt, &v("A"), None));
        assert!(range_may_match(ColumnType::String, &r, Operator::Le, &v(""), None));
        assert!(range_may_match(ColumnType::String, &r, Operator::Le, &v("A"), None));
        assert!(!range_may_match(ColumnType::String, &r, Operator::Ge, &v("E"), None));
        let no_missing = str_range("B", "D", false);
        assert!(!range_may_match(ColumnType::String, &no_missing, Operator::Eq, &v(""), None));
        assert!(!range_may_match(ColumnType::String, &no_missing, Operator::Lt, &v("A"), None));
    }

    #[test]
    fn test_regex_uniform_file_decides() {
        let v = Value::String("A.*".to_string());
        let re = Regex::new("^(?:A.*)$").unwrap();
        let uniform = str_range("A1", "A1", false);
        assert!(range_may_match(ColumnType::String, &uniform, Operator::Regex, &v, Some(&re)));
        let other = str_range("B1", "B1", false);
        assert!(!range_may_match(ColumnType::String, &other, Operator::Regex, &v, Some(&re)));
        // a spread of values cannot be decided from the range
        let spread = str_range("A1", "B1", false);
        assert!(range_may_match(ColumnType::String, &spread, Operator::Regex, &v, Some(&re)));
    }

    #[test]
    fn test_regex_on_numeric_goes_through_text() {
        let v = Value::String("4.*".to_string());
        let re = Regex::new("^(?:4.*)$").unwrap();
        let uniform = num_range(42.0, 42.0, false);
        assert!(range_may_match(ColumnType::Double, &uniform, Operator::Regex, &v, Some(&re)));
        let other = num_range(7.0, 7.0, false);
        assert!(!range_may_match(ColumnType::Double, &other, Operator::Regex, &v, Some(&re)));
    }
}
