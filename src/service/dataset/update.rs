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

//! The catalog updater: diff a fresh directory walk against the current
//! catalog, scan new and changed files, drop vanished ones, quarantine
//! persistent failures, then persist and swap in the new generation.

use std::{sync::Arc, time::Instant};

use config::{
    meta::{
        file::{self, FileRecord, SPACING_UNSORTED},
        packing::{compute_range, standardize_column, Packing},
        value::{ColumnRange, ColumnType, Value},
    },
    utils::{file::scan_files, time::now_millis},
};
use hashbrown::HashSet;
use infra::{
    errors::{Error, ErrorCodes, Result},
    file_list::{store, CatalogState, DirTable},
};
use itertools::Itertools;
use regex::Regex;

use crate::service::{
    dataset::{reader::ReadRequest, schema::SchemaSentinel, Dataset, DatasetMetadata},
    search::standardize::presented_attrs,
};

#[derive(Debug, Default)]
struct UpdateStats {
    added: usize,
    rescanned: usize,
    kept: usize,
    removed: usize,
    still_bad: usize,
}

struct ScanFailure {
    reason: String,
    /// Schema mismatches quarantine regardless of file age.
    quarantine: bool,
}

pub(crate) async fn run(ds: &Dataset) -> Result<()> {
    let _guard = ds.update_lock.lock().await;
    let start = Instant::now();
    let cfg = &ds.cfg;

    // transient failures must not permanently exclude remote files
    if !cfg.files_are_local {
        ds.bad_files.clear();
    }

    let name_re = Regex::new(&cfg.file_name_regex)
        .map_err(|e| Error::ErrorCode(ErrorCodes::BadRequest(format!("fileNameRegex: {e}"))))?;
    let scanned = scan_files(&cfg.file_dir, &name_re, cfg.recursive).await?;

    let old = ds.state.load_full();
    let mut dirs = old.dirs.clone();
    let mut entries: Vec<(i16, String, i64)> = scanned
        .into_iter()
        .map(|f| {
            let dir_index = dirs.intern(&f.dir);
            (dir_index, f.name, f.last_modified)
        })
        .collect();
    entries.sort_by(|a, b| (a.0, a.1.as_str()).cmp(&(b.0, b.1.as_str())));
    entries.dedup_by(|a, b| a.0 == b.0 && a.1 == b.1);

    let present: HashSet<String> = entries
        .iter()
        .map(|(d, n, _)| file::path_key(*d, n))
        .collect();
    ds.bad_files.retain_present(&present);

    let column_types = ds.column_types();
    let (read_names, read_types) = cfg.source_read_columns();
    let mut sentinel = SchemaSentinel::new();
    let mut stats = UpdateStats::default();
    let mut quarantined: Vec<(String, String)> = Vec::new();
    let mut files: Vec<FileRecord> = Vec::with_capacity(entries.len());
    let now = now_millis();
    let quarantine_min_age_ms = cfg.quarantine_min_age_minutes as i64 * 60_000;

    let mut ci = 0;
    for (dir_index, name, last_modified) in entries {
        while ci < old.files.len() && old.files[ci].sort_key() < (dir_index, name.as_str()) {
            stats.removed += 1;
            ci += 1;
        }
        let existing =
            if ci < old.files.len() && old.files[ci].sort_key() == (dir_index, name.as_str()) {
                ci += 1;
                Some(&old.files[ci - 1])
            } else {
                None
            };

        if ds.bad_files.matches(dir_index, &name, last_modified) {
            // still quarantined; any stale catalog row is dropped
            stats.still_bad += 1;
            continue;
        }
        if let Some(f) = existing {
            if f.last_modified == last_modified {
                files.push(f.clone());
                stats.kept += 1;
                continue;
            }
        }

        match scan_file(
            ds,
            &dirs,
            dir_index,
            &name,
            last_modified,
            &read_names,
            &read_types,
            &mut sentinel,
        )
        .await
        {
            Ok(record) => {
                ds.bad_files.remove(dir_index, &name);
                files.push(record);
                if existing.is_some() {
                    stats.rescanned += 1;
                } else {
                    stats.added += 1;
                }
            }
            Err(failure) => {
                if failure.quarantine || now - last_modified >= quarantine_min_age_ms {
                    ds.bad_files
                        .insert(dir_index, &name, last_modified, &failure.reason);
                    quarantined.push((file::path_key(dir_index, &name), failure.reason));
                } else {
                    // young enough to still be mid-transfer; retry next pass
                    log::debug!(
                        "[dataset {}] catalog->update: skipping young failing file {}/{}: {}",
                        cfg.dataset_id,
                        dir_index,
                        name,
                        failure.reason
                    );
                }
            }
        }
    }
    stats.removed += old.files.len() - ci;

    let mut state = CatalogState {
        dirs,
        files,
        ..Default::default()
    };
    state.recompute_aggregates(&column_types);
    state.compute_visit_order(&cfg.sort_files_var_indices());
    debug_assert!(state.is_sorted_unique());

    if let Some(expected) = sentinel.expected() {
        let packings: Vec<Packing> = expected
            .iter()
            .map(|a| Packing {
                scale: a.scale,
                offset: a.offset,
                fill: a.fill,
                missing: a.missing,
            })
            .collect();
        ds.packings.store(Arc::new(packings));
    }

    // persist before the in-memory swap; a failure leaves both the previous
    // generation in memory and the previous files on disk
    let dir_rows: Vec<String> = state.dirs.iter().map(str::to_string).collect();
    if let Err(e) = store::save(
        &ds.base_dir,
        &dir_rows,
        &state.files,
        &ds.bad_files.snapshot(),
        &ds.column_specs(),
    ) {
        let msg = format!(
            "catalog persistence failed for dataset {}: {e}",
            cfg.dataset_id
        );
        log::error!("[dataset {}] catalog->update: {msg}", cfg.dataset_id);
        if let Err(e2) = ds.notifier.notify("catalog persistence failed", &msg).await {
            log::warn!(
                "[dataset {}] catalog->update: notification failed too: {e2}",
                cfg.dataset_id
            );
        }
        return Err(e);
    }

    let cataloged = state.files.len();
    ds.state.store(Arc::new(state));

    refresh_metadata(ds).await;

    if !quarantined.is_empty() {
        let body = quarantined
            .iter()
            .map(|(path, reason)| format!("{path}: {reason}"))
            .join("\n");
        if let Err(e) = ds
            .notifier
            .notify(
                &format!(
                    "[dataset {}] {} file(s) quarantined",
                    cfg.dataset_id,
                    quarantined.len()
                ),
                &body,
            )
            .await
        {
            log::warn!(
                "[dataset {}] catalog->update: quarantine notification failed: {e}",
                cfg.dataset_id
            );
        }
    }

    log::info!(
        "[dataset {}] catalog->update: {} files cataloged, added {}, rescanned {}, kept {}, removed {}, quarantined {}, still bad {}, took {} ms",
        cfg.dataset_id,
        cataloged,
        stats.added,
        stats.rescanned,
        stats.kept,
        stats.removed,
        quarantined.len(),
        stats.still_bad,
        start.elapsed().as_millis(),
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn scan_file(
    ds: &Dataset,
    dirs: &DirTable,
    dir_index: i16,
    name: &str,
    last_modified: i64,
    read_names: &[String],
    read_types: &[ColumnType],
    sentinel: &mut SchemaSentinel,
) -> std::result::Result<FileRecord, ScanFailure> {
    let cfg = &ds.cfg;
    let dir = dirs.get(dir_index).ok_or_else(|| ScanFailure {
        reason: format!("unknown directory index {dir_index}"),
        quarantine: false,
    })?;

    let table = ds
        .reader
        .read(ReadRequest {
            dir,
            name,
            column_names: read_names,
            column_types: read_types,
            sorted_spacing: SPACING_UNSORTED,
            min_sorted: None,
            max_sorted: None,
            get_metadata: true,
            must_get_all_data: true,
        })
        .await
        .map_err(|e| ScanFailure {
            reason: format!("read failed: {e}"),
            quarantine: false,
        })?;

    sentinel.check(cfg, &table).map_err(|reason| ScanFailure {
        reason,
        quarantine: true,
    })?;

    let id_var = cfg.id_var_index();
    let sorted_var = cfg.sorted_var_index();
    let mut sorted_spacing = SPACING_UNSORTED;
    let mut ranges = Vec::with_capacity(cfg.data_variables.len());
    for (i, var) in cfg.data_variables.iter().enumerate() {
        if Some(i) == id_var {
            let id = ds.id_extractor.extract(name);
            let has_missing = id.is_empty();
            ranges.push(ColumnRange::of_constant(Value::String(id), has_missing));
            continue;
        }
        match table.column(&var.source_name) {
            Some(col) => {
                let packing = var.packing(&col.attrs);
                ranges.push(compute_range(&col.data, &packing, var.column_type));
                if Some(i) == sorted_var {
                    let standardized = standardize_column(&col.data, &packing, var.column_type);
                    let values: Vec<f64> = (0..standardized.len())
                        .map(|row| standardized.as_f64(row))
                        .collect();
                    sorted_spacing = file::sorted_spacing(&values);
                }
            }
            None => ranges.push(ColumnRange::all_missing(var.column_type)),
        }
    }

    Ok(FileRecord {
        dir_index,
        name: name.to_string(),
        last_modified,
        sorted_spacing,
        ranges,
    })
}

/// Re-read dataset-level attributes from the file `metadataFrom` points at.
async fn refresh_metadata(ds: &Dataset) {
    let cfg = &ds.cfg;
    let state = ds.state.load_full();
    let target = match cfg.metadata_from {
        config::meta::dataset::MetadataFrom::First => {
            state.files.iter().min_by_key(|f| f.last_modified)
        }
        config::meta::dataset::MetadataFrom::Last => {
            state.files.iter().max_by_key(|f| f.last_modified)
        }
    };
    let Some(target) = target else {
        let mut global = config::meta::attr::AttrMap::new();
        config::meta::attr::merge(&mut global, &cfg.add_global_attributes);
        ds.metadata.store(Arc::new(DatasetMetadata {
            global,
            columns: vec![Default::default(); cfg.data_variables.len()],
        }));
        return;
    };
    let Some(dir) = state.dirs.get(target.dir_index) else {
        return;
    };
    let (read_names, read_types) = cfg.source_read_columns();
    match ds
        .reader
        .read(ReadRequest {
            dir,
            name: &target.name,
            column_names: &read_names,
            column_types: &read_types,
            sorted_spacing: target.sorted_spacing,
            min_sorted: None,
            max_sorted: None,
            get_metadata: true,
            must_get_all_data: false,
        })
        .await
    {
        Ok(table) => {
            let mut global = table.attrs.clone();
            config::meta::attr::merge(&mut global, &cfg.add_global_attributes);
            let columns = (0..cfg.data_variables.len())
                .map(|i| presented_attrs(cfg, &table, i))
                .collect();
            ds.metadata.store(Arc::new(DatasetMetadata { global, columns }));
        }
        Err(e) => {
            log::warn!(
                "[dataset {}] catalog->update: metadata refresh from {} failed: {}",
                cfg.dataset_id,
                target.name,
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{atomic::Ordering, Arc};

    use config::{meta::attr::AttrValue, FILE_TABLE_NAME};
    use infra::notify::LogNotifier;

    use super::*;
    use crate::service::dataset::{
        testing::{data_table, dataset_config, touch, MemReader},
        Dataset,
    };

    async fn build(
        cfg: config::meta::dataset::DatasetConfig,
        reader: Arc<MemReader>,
        base_dir: &std::path::Path,
    ) -> Arc<Dataset> {
        Dataset::new_at(
            base_dir.to_path_buf(),
            cfg,
            reader.clone(),
            Arc::new(LogNotifier),
        )
        .await
        .unwrap()
    }

    fn two_file_fixture(reader: &MemReader, file_dir: &std::path::Path) -> String {
        let fdir = file_dir.to_str().unwrap().to_string();
        touch(file_dir, "a.dat");
        touch(file_dir, "b.dat");
        reader.put(
            &fdir,
            "a.dat",
            data_table(&[0.0, 5.0, 10.0], &[1.0, 2.0, 3.0], &["A", "A", "A"]),
        );
        reader.put(
            &fdir,
            "b.dat",
            data_table(&[20.0, 25.0, 30.0], &[4.0, 5.0, 6.0], &["B", "C", "B"]),
        );
        fdir
    }

    #[tokio::test]
    async fn test_build_catalog() {
        let file_dir = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let reader = MemReader::new();
        let fdir = two_file_fixture(&reader, file_dir.path());
        let ds = build(dataset_config("t_build", &fdir), reader.clone(), data_dir.path()).await;

        let state = ds.state();
        assert_eq!(state.files.len(), 2);
        assert!(state.is_sorted_unique());
        assert_eq!(state.files[0].name, "a.dat");
        // evenly spaced ascending time in both files
        assert_eq!(state.files[0].sorted_spacing, 5.0);
        assert_eq!(state.aggregates[0].min.as_f64(), 0.0);
        assert_eq!(state.aggregates[0].max.as_f64(), 30.0);
        assert_eq!(state.aggregates[2].min.to_string(), "A");
        assert_eq!(state.aggregates[2].max.to_string(), "C");
        assert!(ds.bad_files.is_empty());
        assert!(data_dir.path().join(FILE_TABLE_NAME).exists());
        assert_eq!(reader.scans.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_idempotent_reload() {
        let file_dir = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let reader = MemReader::new();
        let fdir = two_file_fixture(&reader, file_dir.path());
        let ds = build(dataset_config("t_idem", &fdir), reader.clone(), data_dir.path()).await;

        let before = std::fs::read(data_dir.path().join(FILE_TABLE_NAME)).unwrap();
        ds.reload().await.unwrap();
        let after = std::fs::read(data_dir.path().join(FILE_TABLE_NAME)).unwrap();
        assert_eq!(before, after);
        // nothing changed, so nothing was rescanned
        assert_eq!(reader.scans.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_file_added_and_removed() {
        let file_dir = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let reader = MemReader::new();
        let fdir = two_file_fixture(&reader, file_dir.path());
        let ds = build(dataset_config("t_diff", &fdir), reader.clone(), data_dir.path()).await;

        std::fs::remove_file(file_dir.path().join("b.dat")).unwrap();
        touch(file_dir.path(), "c.dat");
        reader.put(
            &fdir,
            "c.dat",
            data_table(&[40.0, 50.0], &[7.0, 8.0], &["D", "D"]),
        );
        ds.reload().await.unwrap();

        let state = ds.state();
        let names: Vec<&str> = state.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.dat", "c.dat"]);
        assert_eq!(state.aggregates[0].max.as_f64(), 50.0);
        assert!(ds.bad_files.is_empty());
    }

    #[tokio::test]
    async fn test_modified_file_rescanned() {
        let file_dir = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let reader = MemReader::new();
        let fdir = two_file_fixture(&reader, file_dir.path());
        let ds = build(dataset_config("t_mod", &fdir), reader.clone(), data_dir.path()).await;

        // rewrite the marker so lastModified moves
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        std::fs::write(file_dir.path().join("a.dat"), b"xx").unwrap();
        reader.put(
            &fdir,
            "a.dat",
            data_table(&[0.0, 5.0, 100.0], &[1.0, 2.0, 3.0], &["A", "A", "A"]),
        );
        ds.reload().await.unwrap();

        let state = ds.state();
        assert_eq!(state.files[0].ranges[0].max.as_f64(), 100.0);
        assert_eq!(reader.scans.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_young_failure_skipped_old_failure_quarantined() {
        // young: the file may still be mid-transfer
        let file_dir = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let reader = MemReader::new();
        let fdir = two_file_fixture(&reader, file_dir.path());
        reader.fail_times(&fdir, "b.dat", usize::MAX / 2);
        let mut cfg = dataset_config("t_young", &fdir);
        cfg.quarantine_min_age_minutes = 10_000;
        let ds = build(cfg, reader.clone(), data_dir.path()).await;
        assert_eq!(ds.state().files.len(), 1);
        assert!(ds.bad_files.is_empty());

        // old enough: quarantine with a reason
        let data_dir2 = tempfile::tempdir().unwrap();
        let mut cfg = dataset_config("t_old", &fdir);
        cfg.quarantine_min_age_minutes = 0;
        let ds = build(cfg, reader.clone(), data_dir2.path()).await;
        assert_eq!(ds.state().files.len(), 1);
        assert_eq!(ds.bad_files.len(), 1);
        let rows = ds.bad_files.snapshot();
        assert!(rows[0].1.reason.contains("read failed"));
        assert!(data_dir2.path().join(config::BAD_FILES_NAME).exists());
    }

    #[tokio::test]
    async fn test_quarantine_escape_requires_mtime_change() {
        let file_dir = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let reader = MemReader::new();
        let fdir = two_file_fixture(&reader, file_dir.path());
        reader.fail_times(&fdir, "b.dat", usize::MAX / 2);
        let mut cfg = dataset_config("t_escape", &fdir);
        cfg.quarantine_min_age_minutes = 0;
        let ds = build(cfg, reader.clone(), data_dir.path()).await;
        assert_eq!(ds.bad_files.len(), 1);
        let scans_after_build = reader.scans.load(Ordering::Relaxed);

        // reader is healthy again, but the entry still suppresses the scan
        reader.fail_times(&fdir, "b.dat", 0);
        ds.reload().await.unwrap();
        assert_eq!(reader.scans.load(Ordering::Relaxed), scans_after_build);
        assert_eq!(ds.state().files.len(), 1);

        // touching the file invalidates the entry
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        std::fs::write(file_dir.path().join("b.dat"), b"xx").unwrap();
        ds.reload().await.unwrap();
        assert_eq!(ds.state().files.len(), 2);
        assert!(ds.bad_files.is_empty());
    }

    #[tokio::test]
    async fn test_schema_mismatch_quarantined_regardless_of_age() {
        let file_dir = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let reader = MemReader::new();
        let fdir = file_dir.path().to_str().unwrap().to_string();
        touch(file_dir.path(), "a.dat");
        touch(file_dir.path(), "b.dat");
        let mut ta = data_table(&[0.0], &[1.0], &["A"]);
        ta.columns[1]
            .attrs
            .insert("scale_factor".to_string(), AttrValue::Number(0.1));
        reader.put(&fdir, "a.dat", ta);
        let mut tb = data_table(&[1.0], &[2.0], &["B"]);
        tb.columns[1]
            .attrs
            .insert("scale_factor".to_string(), AttrValue::Number(0.2));
        reader.put(&fdir, "b.dat", tb);

        let mut cfg = dataset_config("t_schema", &fdir);
        cfg.quarantine_min_age_minutes = 10_000;
        let ds = build(cfg, reader.clone(), data_dir.path()).await;
        assert_eq!(ds.state().files.len(), 1);
        assert_eq!(ds.bad_files.len(), 1);
        assert!(ds.bad_files.snapshot()[0].1.reason.contains("scale_factor"));
    }

    #[tokio::test]
    async fn test_remote_registry_cleared_each_pass() {
        let file_dir = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let reader = MemReader::new();
        let fdir = two_file_fixture(&reader, file_dir.path());
        reader.fail_times(&fdir, "b.dat", usize::MAX / 2);
        let mut cfg = dataset_config("t_remote", &fdir);
        cfg.files_are_local = false;
        cfg.quarantine_min_age_minutes = 0;
        let ds = build(cfg, reader.clone(), data_dir.path()).await;
        assert_eq!(ds.bad_files.len(), 1);

        // the transient failure clears; no mtime change is needed remotely
        reader.fail_times(&fdir, "b.dat", 0);
        ds.reload().await.unwrap();
        assert_eq!(ds.state().files.len(), 2);
        assert!(ds.bad_files.is_empty());
    }

    #[tokio::test]
    async fn test_restart_reuses_persisted_catalog() {
        let file_dir = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let reader = MemReader::new();
        let fdir = two_file_fixture(&reader, file_dir.path());
        let ds = build(dataset_config("t_restart", &fdir), reader.clone(), data_dir.path()).await;
        drop(ds);

        // a fresh process: unchanged files must not be rescanned
        let reader2 = MemReader::new();
        reader2.put(
            &fdir,
            "a.dat",
            data_table(&[0.0, 5.0, 10.0], &[1.0, 2.0, 3.0], &["A", "A", "A"]),
        );
        reader2.put(
            &fdir,
            "b.dat",
            data_table(&[20.0, 25.0, 30.0], &[4.0, 5.0, 6.0], &["B", "C", "B"]),
        );
        let ds2 = build(dataset_config("t_restart", &fdir), reader2.clone(), data_dir.path()).await;
        assert_eq!(ds2.state().files.len(), 2);
        assert_eq!(reader2.scans.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_corrupt_catalog_rebuilds() {
        let file_dir = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let reader = MemReader::new();
        let fdir = two_file_fixture(&reader, file_dir.path());
        std::fs::write(data_dir.path().join(FILE_TABLE_NAME), b"not a catalog").unwrap();
        let ds = build(dataset_config("t_corrupt", &fdir), reader.clone(), data_dir.path()).await;
        assert_eq!(ds.state().files.len(), 2);
        assert_eq!(reader.scans.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_id_extract_without_match_is_missing() {
        let file_dir = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let reader = MemReader::new();
        let fdir = file_dir.path().to_str().unwrap().to_string();
        touch(file_dir.path(), "station_A7.dat");
        touch(file_dir.path(), "junk.dat");
        for name in ["station_A7.dat", "junk.dat"] {
            reader.put(&fdir, name, data_table(&[0.0], &[1.0], &["x"]));
        }
        let mut cfg = dataset_config("t_id", &fdir);
        cfg.pre_extract_regex = "^station_".to_string();
        cfg.post_extract_regex = r"\.dat$".to_string();
        cfg.extract_regex = "[A-Z][0-9]+".to_string();
        cfg.column_name_for_extract = "site".to_string();
        cfg.data_variables.push(
            serde_json::from_value(serde_json::json!({
                "sourceName": "site", "type": "string"
            }))
            .unwrap(),
        );
        let ds = build(cfg, reader.clone(), data_dir.path()).await;

        let state = ds.state();
        let site = ds.cfg.var_index_by_name("site").unwrap();
        let junk = &state.files[state.find(0, "junk.dat").unwrap()];
        assert_eq!(junk.ranges[site].min.to_string(), "");
        assert!(junk.ranges[site].has_missing);
        let good = &state.files[state.find(0, "station_A7.dat").unwrap()];
        assert_eq!(good.ranges[site].min.to_string(), "A7");
        assert!(!good.ranges[site].has_missing);
    }

    #[tokio::test]
    async fn test_visit_order_follows_sorted_minimums() {
        let file_dir = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let reader = MemReader::new();
        let fdir = file_dir.path().to_str().unwrap().to_string();
        touch(file_dir.path(), "late.dat");
        touch(file_dir.path(), "early.dat");
        reader.put(&fdir, "late.dat", data_table(&[100.0], &[1.0], &["L"]));
        reader.put(&fdir, "early.dat", data_table(&[1.0], &[1.0], &["E"]));
        let ds = build(dataset_config("t_order", &fdir), reader.clone(), data_dir.path()).await;

        let state = ds.state();
        let ordered: Vec<&str> = state
            .visit_order
            .iter()
            .map(|&i| state.files[i as usize].name.as_str())
            .collect();
        assert_eq!(ordered, vec!["early.dat", "late.dat"]);
    }

    #[tokio::test]
    async fn test_metadata_from_last_with_overlays() {
        let file_dir = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let reader = MemReader::new();
        let fdir = two_file_fixture(&reader, file_dir.path());
        let mut cfg = dataset_config("t_meta", &fdir);
        cfg.add_global_attributes.insert(
            "institution".to_string(),
            AttrValue::Text("example".to_string()),
        );
        cfg.add_global_attributes
            .insert("title".to_string(), AttrValue::Text("null".to_string()));
        let ds = build(cfg, reader.clone(), data_dir.path()).await;

        let meta = ds.metadata();
        assert_eq!(
            meta.global.get("institution"),
            Some(&AttrValue::Text("example".to_string()))
        );
        // the literal "null" deletes the source attribute
        assert!(!meta.global.contains_key("title"));
        assert_eq!(meta.columns.len(), 3);
    }
}
