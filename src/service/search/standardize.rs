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

//! Turn one raw sub-table into result rows: apply packing, re-evaluate every
//! constraint exactly (range pruning only narrowed the file set), project to
//! the requested columns and rename them.

use config::meta::{
    attr::{self, AttrMap},
    dataset::DatasetConfig,
    table::{Column, Table},
    value::{almost_equal, ColumnData, ColumnType, Value},
};
use infra::errors::{Error, ErrorCodes, Result};
use regex::Regex;

use crate::meta::search::{Operator, Query};

/// A query predicate bound to a dataset column.
#[derive(Debug)]
pub struct CompiledPredicate {
    pub var_index: usize,
    pub op: Operator,
    pub value: Value,
    pub regex: Option<Regex>,
}

pub fn compile_predicates(cfg: &DatasetConfig, query: &Query) -> Result<Vec<CompiledPredicate>> {
    query
        .predicates
        .iter()
        .map(|p| {
            let var_index = cfg.var_index_by_name(&p.column).ok_or_else(|| {
                Error::ErrorCode(ErrorCodes::BadRequest(format!(
                    "unknown column {:?}",
                    p.column
                )))
            })?;
            let regex = if p.op == Operator::Regex {
                // whole-cell match, like the rest of the operator set
                let pattern = format!("^(?:{})$", p.value);
                Some(Regex::new(&pattern).map_err(|e| {
                    Error::ErrorCode(ErrorCodes::BadRequest(format!(
                        "invalid regex {:?}: {e}",
                        p.value.to_string()
                    )))
                })?)
            } else {
                None
            };
            Ok(CompiledPredicate {
                var_index,
                op: p.op,
                value: p.value.clone(),
                regex,
            })
        })
        .collect()
}

/// Exact row-level evaluation of one predicate against a standardized cell.
pub fn cell_matches(
    column_type: ColumnType,
    data: &ColumnData,
    row: usize,
    pred: &CompiledPredicate,
    expanded_fp_eq: bool,
) -> bool {
    if column_type == ColumnType::String || pred.op == Operator::Regex {
        let cell = match data.as_str(row) {
            Some(s) => s.to_string(),
            None => data.get(row).to_string(),
        };
        let value = pred.value.to_string();
        return match pred.op {
            Operator::Eq => cell == value,
            Operator::Ne => cell != value,
            Operator::Lt => cell < value,
            Operator::Le => cell <= value,
            Operator::Gt => cell > value,
            Operator::Ge => cell >= value,
            Operator::Regex => pred
                .regex
                .as_ref()
                .map(|re| re.is_match(&cell))
                .unwrap_or(false),
        };
    }

    let x = data.as_f64(row);
    let v = pred.value.as_f64();
    let missing = column_type.missing_f64();
    let x_missing = x.is_nan() || x == missing;
    let v_missing = v.is_nan() || v == missing;
    if v_missing {
        return match pred.op {
            Operator::Eq => x_missing,
            Operator::Ne => !x_missing,
            _ => false,
        };
    }
    if x_missing {
        return pred.op == Operator::Ne;
    }
    match pred.op {
        Operator::Eq => {
            if expanded_fp_eq && column_type.is_floating() {
                almost_equal(x, v)
            } else {
                x == v
            }
        }
        Operator::Ne => x != v,
        Operator::Lt => x < v,
        Operator::Le => x <= v,
        Operator::Gt => x > v,
        Operator::Ge => x >= v,
        Operator::Regex => unreachable!("regex constraints take the string path"),
    }
}

/// Standardized data for every column a query touches, parallel to
/// `cfg.data_variables` (untouched slots are None).
fn standardize_needed(
    cfg: &DatasetConfig,
    raw: &Table,
    needed: &[usize],
    id_value: Option<&str>,
) -> Vec<Option<ColumnData>> {
    let nrows = raw.num_rows();
    let mut out: Vec<Option<ColumnData>> = (0..cfg.data_variables.len()).map(|_| None).collect();
    let id_var = cfg.id_var_index();
    for &i in needed {
        let var = &cfg.data_variables[i];
        let data = if Some(i) == id_var {
            ColumnData::String(vec![id_value.unwrap_or("").to_string(); nrows])
        } else {
            match raw.column(&var.source_name) {
                Some(col) => {
                    let packing = var.packing(&col.attrs);
                    config::meta::packing::standardize_column(&col.data, &packing, var.column_type)
                }
                // a file lacking the column contributes only missing cells
                None => {
                    let missing = var.column_type.missing_value();
                    let mut data = ColumnData::with_capacity(var.column_type, nrows);
                    for _ in 0..nrows {
                        data.push_value(&missing).expect("missing value fits its own type");
                    }
                    data
                }
            }
        };
        out[i] = Some(data);
    }
    out
}

pub(crate) fn presented_attrs(cfg: &DatasetConfig, raw: &Table, var_index: usize) -> AttrMap {
    let var = &cfg.data_variables[var_index];
    let mut attrs = raw
        .column(&var.source_name)
        .map(|c| c.attrs.clone())
        .unwrap_or_default();
    // packing is applied, so its bookkeeping attributes no longer hold
    attrs.remove(attr::ATTR_SCALE_FACTOR);
    attrs.remove(attr::ATTR_ADD_OFFSET);
    attrs.remove(attr::ATTR_FILL_VALUE);
    attrs.remove(attr::ATTR_MISSING_VALUE);
    attr::merge(&mut attrs, &var.add_attributes);
    attrs
}

/// Full pipeline for one file's raw table.
pub fn standardize(
    cfg: &DatasetConfig,
    raw: &Table,
    preds: &[CompiledPredicate],
    result_vars: &[usize],
    id_value: Option<&str>,
) -> Result<Table> {
    let mut needed: Vec<usize> = result_vars.to_vec();
    for p in preds {
        if !needed.contains(&p.var_index) {
            needed.push(p.var_index);
        }
    }
    let standardized = standardize_needed(cfg, raw, &needed, id_value);

    let nrows = raw.num_rows();
    let mut keep = vec![true; nrows];
    for p in preds {
        let var = &cfg.data_variables[p.var_index];
        let data = standardized[p.var_index]
            .as_ref()
            .expect("predicate column was standardized");
        for (row, k) in keep.iter_mut().enumerate() {
            if *k && !cell_matches(var.column_type, data, row, p, cfg.source_needs_expanded_fp_eq) {
                *k = false;
            }
        }
    }

    let mut out = Table::new();
    for &i in result_vars {
        let var = &cfg.data_variables[i];
        let data = standardized[i]
            .as_ref()
            .expect("result column was standardized")
            .filter(&keep);
        out.push_column(Column::with_attrs(
            &var.name,
            data,
            presented_attrs(cfg, raw, i),
        ))
        .map_err(|e| Error::Message(e.to_string()))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use config::meta::attr::AttrValue;

    use super::*;
    use crate::meta::search::Predicate;

    fn test_config() -> DatasetConfig {
        let mut cfg: DatasetConfig = serde_json::from_value(serde_json::json!({
            "datasetId": "t",
            "fileDir": "/data",
            "dataVariable": [
                {"sourceName": "time", "type": "timestamp"},
                {"sourceName": "temp", "name": "temperature", "type": "double"},
                {"sourceName": "station", "type": "string"},
            ],
        }))
        .unwrap();
        cfg.validate().unwrap();
        cfg
    }

    fn raw_table() -> Table {
        let mut t = Table::new();
        t.push_column(Column::new(
            "time",
            ColumnData::Double(vec![0.0, 10.0, 20.0]),
        ))
        .unwrap();
        // packed: standardized = raw * 0.5, -99 is the fill
        let mut temp = Column::new("temp", ColumnData::Double(vec![30.0, -99.0, 50.0]));
        temp.attrs
            .insert("scale_factor".to_string(), AttrValue::Number(0.5));
        temp.attrs
            .insert("_FillValue".to_string(), AttrValue::Number(-99.0));
        t.push_column(temp).unwrap();
        t.push_column(Column::new(
            "station",
            ColumnData::String(vec!["A".to_string(), "B".to_string(), "A".to_string()]),
        ))
        .unwrap();
        t
    }

    fn compile(cfg: &DatasetConfig, preds: Vec<Predicate>) -> Vec<CompiledPredicate> {
        compile_predicates(
            cfg,
            &Query {
                columns: vec![],
                predicates: preds,
                distinct: false,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_standardize_applies_packing_and_projects() {
        let cfg = test_config();
        let out = standardize(&cfg, &raw_table(), &[], &[1, 0], None).unwrap();
        assert_eq!(out.columns[0].name, "temperature");
        assert_eq!(out.columns[1].name, "time");
        match &out.columns[0].data {
            ColumnData::Double(v) => {
                assert_eq!(v[0], 15.0);
                assert!(v[1].is_nan());
                assert_eq!(v[2], 25.0);
            }
            other => panic!("unexpected {other:?}"),
        }
        // packing attributes are consumed by standardization
        assert!(!out.columns[0].attrs.contains_key("scale_factor"));
    }

    #[test]
    fn test_standardize_refilters_rows() {
        let cfg = test_config();
        let preds = compile(
            &cfg,
            vec![Predicate {
                column: "temperature".to_string(),
                op: Operator::Gt,
                value: Value::Double(20.0),
            }],
        );
        let out = standardize(&cfg, &raw_table(), &preds, &[2], None).unwrap();
        // only the 50.0 raw row standardizes above 20
        assert_eq!(out.num_rows(), 1);
        assert_eq!(out.columns[0].data.as_str(0), Some("A"));
    }

    #[test]
    fn test_missing_cell_fails_comparisons_but_not_ne() {
        let cfg = test_config();
        let gt = compile(
            &cfg,
            vec![Predicate {
                column: "temperature".to_string(),
                op: Operator::Lt,
                value: Value::Double(1000.0),
            }],
        );
        let out = standardize(&cfg, &raw_table(), &gt, &[1], None).unwrap();
        // the fill row never satisfies an order comparison
        assert_eq!(out.num_rows(), 2);

        let ne = compile(
            &cfg,
            vec![Predicate {
                column: "temperature".to_string(),
                op: Operator::Ne,
                value: Value::Double(15.0),
            }],
        );
        let out = standardize(&cfg, &raw_table(), &ne, &[1], None).unwrap();
        assert_eq!(out.num_rows(), 2);
    }

    #[test]
    fn test_expanded_fp_eq() {
        let mut cfg = test_config();
        let preds = compile(
            &cfg,
            vec![Predicate {
                column: "time".to_string(),
                op: Operator::Eq,
                value: Value::Double(10.0000001),
            }],
        );
        let strict = standardize(&cfg, &raw_table(), &preds, &[0], None).unwrap();
        assert_eq!(strict.num_rows(), 0);
        cfg.source_needs_expanded_fp_eq = true;
        let tolerant = standardize(&cfg, &raw_table(), &preds, &[0], None).unwrap();
        assert_eq!(tolerant.num_rows(), 1);
    }

    #[test]
    fn test_id_column_and_regex() {
        let mut cfg: DatasetConfig = serde_json::from_value(serde_json::json!({
            "datasetId": "t",
            "fileDir": "/data",
            "extractRegex": "[A-Z][0-9]+",
            "columnNameForExtract": "site",
            "dataVariable": [
                {"sourceName": "time", "type": "timestamp"},
                {"sourceName": "site", "type": "string"},
            ],
        }))
        .unwrap();
        cfg.validate().unwrap();
        let mut raw = Table::new();
        raw.push_column(Column::new("time", ColumnData::Double(vec![1.0, 2.0])))
            .unwrap();
        let preds = compile(
            &cfg,
            vec![Predicate {
                column: "site".to_string(),
                op: Operator::Regex,
                value: Value::String("A.*".to_string()),
            }],
        );
        let out = standardize(&cfg, &raw, &preds, &[1, 0], Some("A7")).unwrap();
        assert_eq!(out.num_rows(), 2);
        assert_eq!(out.columns[0].data.as_str(0), Some("A7"));
        let none = standardize(&cfg, &raw, &preds, &[1, 0], Some("B7")).unwrap();
        assert_eq!(none.num_rows(), 0);
    }

    #[test]
    fn test_absent_source_column_is_all_missing() {
        let cfg = test_config();
        let mut raw = Table::new();
        raw.push_column(Column::new("time", ColumnData::Double(vec![1.0])))
            .unwrap();
        let out = standardize(&cfg, &raw, &[], &[1], None).unwrap();
        assert_eq!(out.num_rows(), 1);
        assert!(out.columns[0].data.as_f64(0).is_nan());
    }

    #[test]
    fn test_compile_rejects_unknown_column() {
        let cfg = test_config();
        let err = compile_predicates(
            &cfg,
            &Query {
                columns: vec![],
                predicates: vec![Predicate {
                    column: "nope".to_string(),
                    op: Operator::Eq,
                    value: Value::Double(1.0),
                }],
                distinct: false,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown column"));
    }
}
