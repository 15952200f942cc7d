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

//! Query planning and execution.
//!
//! A query is rejected from the aggregate table when possible, pruned to the
//! files whose ranges overlap its constraints, and then streamed file by
//! file through the standardization pipeline into the sink. Single-threaded
//! per query; concurrency across queries is the surrounding server's job.

pub mod prune;
pub mod sink;
pub mod standardize;

use config::{
    get_config,
    meta::{
        file::FileRecord,
        table::{Column, Table},
        value::{ColumnData, ColumnRange, ColumnType, Value},
    },
    utils::time::now_seconds,
};
use infra::{
    errors::{Error, ErrorCodes, Result},
    file_list::CatalogState,
};
use tokio_util::sync::CancellationToken;

use crate::{
    meta::search::{Operator, Query},
    service::{
        dataset::{reader::ReadRequest, Dataset},
        search::{
            sink::ResultSink,
            standardize::{cell_matches, compile_predicates, standardize, CompiledPredicate},
        },
    },
};

#[tracing::instrument(name = "service:search:execute", skip_all, fields(dataset_id = %ds.cfg.dataset_id))]
pub async fn execute(
    ds: &Dataset,
    query: &Query,
    sink: &mut dyn ResultSink,
    cancel: CancellationToken,
) -> Result<()> {
    let cfg = &ds.cfg;
    let state = ds.state();

    // an empty projection means every column, in config order
    let result_vars: Vec<usize> = if query.columns.is_empty() {
        (0..cfg.data_variables.len()).collect()
    } else {
        query
            .columns
            .iter()
            .map(|name| {
                cfg.var_index_by_name(name).ok_or_else(|| {
                    Error::ErrorCode(ErrorCodes::BadRequest(format!("unknown column {name:?}")))
                })
            })
            .collect::<Result<_>>()?
    };
    let preds = compile_predicates(cfg, query)?;
    let now = now_seconds();

    // constraint vs aggregate table: reject without touching any file
    for p in &preds {
        if !range_admits(ds, &state.aggregates[p.var_index], p, now) {
            log::debug!(
                "[dataset {}] search: aggregate range rejects {}{}{}",
                cfg.dataset_id,
                cfg.data_variables[p.var_index].name,
                p.op,
                p.value
            );
            return Err(Error::ErrorCode(ErrorCodes::NoMatchingData));
        }
    }

    let (min_sorted, max_sorted) = derive_sorted_range(ds, &preds);

    // the id column lives in the catalog; a projection of it alone never
    // opens a file
    if let Some(id_var) = cfg.id_var_index() {
        if result_vars.len() == 1 && result_vars[0] == id_var {
            let mut ids: Vec<String> = state
                .visit_order
                .iter()
                .filter_map(|&i| {
                    let f = &state.files[i as usize];
                    file_passes(ds, f, &preds, now).then(|| f.ranges[id_var].min.to_string())
                })
                .collect();
            ids.sort();
            ids.dedup();
            if ids.is_empty() {
                return Err(Error::ErrorCode(ErrorCodes::NoMatchingData));
            }
            let mut out = Table::new();
            out.push_column(Column::new(
                &cfg.data_variables[id_var].name,
                ColumnData::String(ids),
            ))
            .map_err(|e| Error::Message(e.to_string()))?;
            return sink.write_all_and_finish(out).await;
        }
    }

    // source columns the reader must materialize: results plus constraints
    let mut needed_vars: Vec<usize> = result_vars.clone();
    for p in &preds {
        if !needed_vars.contains(&p.var_index) {
            needed_vars.push(p.var_index);
        }
    }
    let id_var = cfg.id_var_index();
    let mut read_names = Vec::with_capacity(needed_vars.len());
    let mut read_types = Vec::with_capacity(needed_vars.len());
    for &i in &needed_vars {
        if Some(i) == id_var {
            continue;
        }
        read_names.push(cfg.data_variables[i].source_name.clone());
        read_types.push(cfg.data_variables[i].column_type);
    }

    let chunk_rows = get_config().query_chunk_rows;
    // one catalog-derived row per uniform file; flushed whenever a file has
    // to be scanned, so it never outgrows the file count
    let mut pending: Vec<Vec<Value>> = Vec::new();
    let mut streamed = false;
    for &fi in &state.visit_order {
        if cancel.is_cancelled() {
            log::info!("[dataset {}] search: canceled", cfg.dataset_id);
            return sink.finish().await;
        }
        let f = &state.files[fi as usize];
        if !file_passes(ds, f, &preds, now) {
            continue;
        }

        if query.distinct {
            match uniform_check(ds, f, &result_vars, &preds) {
                UniformCheck::Row(row) => {
                    pending.push(row);
                    continue;
                }
                UniformCheck::NoMatch => continue,
                UniformCheck::NotUniform => {
                    // flush pending distinct rows before this file's own
                    // rows stream through
                    if !pending.is_empty() {
                        let chunk =
                            distinct_chunk(ds, &result_vars, std::mem::take(&mut pending))?;
                        sink.write_some(chunk).await?;
                        streamed = true;
                    }
                }
            }
        }

        let raw = read_with_retry(ds, &state, f, &read_names, &read_types, min_sorted, max_sorted)
            .await?;
        let id_value = id_var.map(|_| ds.id_extractor.extract(&f.name));
        let out = standardize(cfg, &raw, &preds, &result_vars, id_value.as_deref())?;
        if out.is_empty() {
            continue;
        }
        for chunk in out.split(chunk_rows) {
            if cancel.is_cancelled() {
                log::info!("[dataset {}] search: canceled", cfg.dataset_id);
                return sink.finish().await;
            }
            sink.write_some(chunk).await?;
            streamed = true;
        }
    }

    if query.distinct {
        if !streamed && pending.is_empty() {
            return Err(Error::ErrorCode(ErrorCodes::NoMatchingData));
        }
        let chunk = distinct_chunk(ds, &result_vars, pending)?;
        return sink.write_all_and_finish(chunk).await;
    }
    if !streamed {
        return Err(Error::ErrorCode(ErrorCodes::NoMatchingData));
    }
    sink.finish().await
}

/// Fold sorted-column constraints into one closed interval, translated into
/// the source's own encoding for the reader.
fn derive_sorted_range(ds: &Dataset, preds: &[CompiledPredicate]) -> (Option<f64>, Option<f64>) {
    let cfg = &ds.cfg;
    let Some(sorted_var) = cfg.sorted_var_index() else {
        return (None, None);
    };
    let mut lo: Option<f64> = None;
    let mut hi: Option<f64> = None;
    for p in preds {
        if p.var_index != sorted_var || p.op == Operator::Regex {
            continue;
        }
        let v = p.value.as_f64();
        if v.is_nan() {
            continue;
        }
        match p.op {
            Operator::Lt | Operator::Le => hi = Some(hi.map_or(v, |h| h.min(v))),
            Operator::Gt | Operator::Ge => lo = Some(lo.map_or(v, |l| l.max(v))),
            Operator::Eq => {
                lo = Some(lo.map_or(v, |l| l.max(v)));
                hi = Some(hi.map_or(v, |h| h.min(v)));
            }
            _ => {}
        }
    }
    let packing = ds.packing_of(sorted_var);
    if packing.is_identity() {
        return (lo, hi);
    }
    let a = lo.map(|v| packing.unapply(v));
    let b = hi.map(|v| packing.unapply(v));
    // a negative scale flips the interval
    if packing.scale.unwrap_or(1.0) < 0.0 {
        (b, a)
    } else {
        (a, b)
    }
}

/// Range-level admission with the in-flight-file allowance: a timestamp
/// range whose max is within the configured window of now is treated as
/// reaching now + window, since the file may still be receiving rows.
fn range_admits(ds: &Dataset, range: &ColumnRange, p: &CompiledPredicate, now: f64) -> bool {
    let cfg = &ds.cfg;
    let var = &cfg.data_variables[p.var_index];
    let window = cfg.recent_file_window_minutes as f64 * 60.0;
    if var.column_type == ColumnType::Timestamp && window > 0.0 {
        let max = range.max.as_f64();
        if !max.is_nan() && max >= now - window {
            let widened = ColumnRange {
                min: range.min.clone(),
                max: Value::Double(now + window),
                has_missing: range.has_missing,
            };
            return prune::range_may_match(
                var.column_type,
                &widened,
                p.op,
                &p.value,
                p.regex.as_ref(),
            );
        }
    }
    prune::range_may_match(var.column_type, range, p.op, &p.value, p.regex.as_ref())
}

fn file_passes(ds: &Dataset, f: &FileRecord, preds: &[CompiledPredicate], now: f64) -> bool {
    preds
        .iter()
        .all(|p| range_admits(ds, &f.ranges[p.var_index], p, now))
}

enum UniformCheck {
    /// Every touched column is single-valued and the constraints hold; this
    /// is the file's one distinct row, straight from the catalog.
    Row(Vec<Value>),
    /// Single-valued but the constraints exclude it; skip the file.
    NoMatch,
    NotUniform,
}

fn uniform_value(t: ColumnType, r: &ColumnRange) -> Option<Value> {
    if t.is_missing(&r.min) && t.is_missing(&r.max) {
        return Some(t.missing_value());
    }
    if r.has_missing {
        return None;
    }
    if r.min.compare(&r.max).is_eq() {
        Some(r.min.clone())
    } else {
        None
    }
}

fn uniform_check(
    ds: &Dataset,
    f: &FileRecord,
    result_vars: &[usize],
    preds: &[CompiledPredicate],
) -> UniformCheck {
    let cfg = &ds.cfg;
    let mut check_vars: Vec<usize> = result_vars.to_vec();
    for p in preds {
        if !check_vars.contains(&p.var_index) {
            check_vars.push(p.var_index);
        }
    }
    let mut values: Vec<Option<Value>> = vec![None; cfg.data_variables.len()];
    for &v in &check_vars {
        let t = cfg.data_variables[v].column_type;
        match uniform_value(t, &f.ranges[v]) {
            Some(value) => values[v] = Some(value),
            None => return UniformCheck::NotUniform,
        }
    }
    for p in preds {
        let t = cfg.data_variables[p.var_index].column_type;
        let value = values[p.var_index].clone().expect("checked above");
        let data = match ColumnData::from_values(t, std::slice::from_ref(&value)) {
            Ok(d) => d,
            Err(_) => return UniformCheck::NotUniform,
        };
        if !cell_matches(t, &data, 0, p, cfg.source_needs_expanded_fp_eq) {
            return UniformCheck::NoMatch;
        }
    }
    UniformCheck::Row(
        result_vars
            .iter()
            .map(|&v| values[v].clone().expect("checked above"))
            .collect(),
    )
}

/// Collapse catalog-derived rows into one sorted unique chunk carrying the
/// result columns' presented names and types.
fn distinct_chunk(ds: &Dataset, result_vars: &[usize], mut rows: Vec<Vec<Value>>) -> Result<Table> {
    sink::sort_unique_rows(&mut rows);
    let mut out = Table::new();
    for (pos, &v) in result_vars.iter().enumerate() {
        let var = &ds.cfg.data_variables[v];
        let values: Vec<Value> = rows.iter().map(|r| r[pos].clone()).collect();
        let data = ColumnData::from_values(var.column_type, &values)
            .map_err(|e| Error::Message(e.to_string()))?;
        out.push_column(Column::new(&var.name, data))
            .map_err(|e| Error::Message(e.to_string()))?;
    }
    Ok(out)
}

async fn read_with_retry(
    ds: &Dataset,
    state: &CatalogState,
    f: &FileRecord,
    read_names: &[String],
    read_types: &[ColumnType],
    min_sorted: Option<f64>,
    max_sorted: Option<f64>,
) -> Result<Table> {
    let cfg = &ds.cfg;
    let dir = state.dirs.get(f.dir_index).unwrap_or("");
    let request = || ReadRequest {
        dir,
        name: &f.name,
        column_names: read_names,
        column_types: read_types,
        sorted_spacing: f.sorted_spacing,
        min_sorted,
        max_sorted,
        get_metadata: false,
        must_get_all_data: false,
    };
    let first_err = match ds.reader.read(request()).await {
        Ok(table) => return Ok(table),
        Err(e) => e,
    };
    log::warn!(
        "[dataset {}] search: read {}/{} failed, will retry once: {}",
        cfg.dataset_id,
        f.dir_index,
        f.name,
        first_err
    );
    tokio::time::sleep(tokio::time::Duration::from_millis(
        get_config().scan_retry_wait_ms,
    ))
    .await;
    match ds.reader.read(request()).await {
        Ok(table) => Ok(table),
        Err(e) => {
            log::error!(
                "[dataset {}] search: read {}/{} failed twice: {}",
                cfg.dataset_id,
                f.dir_index,
                f.name,
                e
            );
            if cfg.files_are_local {
                ds.bad_files.insert(
                    f.dir_index,
                    &f.name,
                    f.last_modified,
                    &format!("read failed during query: {e}"),
                );
            }
            ds.mark_reload();
            Err(Error::ErrorCode(ErrorCodes::RetryLater(format!(
                "file {} is currently unreadable",
                f.name
            ))))
        }
    }
}
