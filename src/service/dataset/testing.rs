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

//! In-memory file reader and fixtures shared by the dataset and search
//! tests. Discovery still walks a real temporary directory; only the file
//! contents live here.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use config::{
    meta::{
        attr::AttrValue,
        dataset::DatasetConfig,
        table::{Column, Table},
        value::ColumnData,
    },
    RwHashMap,
};

use crate::service::dataset::reader::{FileReader, ReadRequest};

#[derive(Default)]
pub(crate) struct MemReader {
    tables: RwHashMap<String, Table>,
    fail: RwHashMap<String, usize>,
    /// Catalog scans (mustGetAllData reads).
    pub scans: AtomicUsize,
    /// Data reads issued by queries.
    pub query_reads: AtomicUsize,
    /// (file name, minSorted, maxSorted) per query read.
    pub query_log: Mutex<Vec<(String, Option<f64>, Option<f64>)>>,
}

impl MemReader {
    pub fn new() -> Arc<MemReader> {
        Arc::new(MemReader::default())
    }

    fn key(dir: &str, name: &str) -> String {
        format!("{dir}/{name}")
    }

    pub fn put(&self, dir: &str, name: &str, table: Table) {
        self.tables.insert(Self::key(dir, name), table);
    }

    /// Make the next `n` reads of this file fail.
    pub fn fail_times(&self, dir: &str, name: &str, n: usize) {
        self.fail.insert(Self::key(dir, name), n);
    }
}

#[async_trait]
impl FileReader for MemReader {
    async fn read(&self, req: ReadRequest<'_>) -> Result<Table, anyhow::Error> {
        let key = Self::key(req.dir, req.name);
        if req.must_get_all_data {
            self.scans.fetch_add(1, Ordering::Relaxed);
        } else if !req.get_metadata {
            self.query_reads.fetch_add(1, Ordering::Relaxed);
            self.query_log.lock().unwrap().push((
                req.name.to_string(),
                req.min_sorted,
                req.max_sorted,
            ));
        }
        if let Some(mut remaining) = self.fail.get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(anyhow::anyhow!("injected read failure"));
            }
        }
        match self.tables.get(&key) {
            Some(t) => Ok(t.clone()),
            None => Err(anyhow::anyhow!("no such file: {key}")),
        }
    }
}

/// time (sorted) + temp + station over `.dat` files.
pub(crate) fn dataset_config(dataset_id: &str, file_dir: &str) -> DatasetConfig {
    let mut cfg: DatasetConfig = serde_json::from_value(serde_json::json!({
        "datasetId": dataset_id,
        "fileDir": file_dir,
        "fileNameRegex": r".*\.dat$",
        "sortedColumnSourceName": "time",
        "sortFilesBySourceNames": "time",
        "reloadEveryNMinutes": 0,
        "recentFileWindowMinutes": 0,
        "dataVariable": [
            {"sourceName": "time", "type": "timestamp"},
            {"sourceName": "temp", "name": "temperature", "type": "double"},
            {"sourceName": "station", "type": "string"},
        ],
    }))
    .expect("fixture config parses");
    cfg.validate().expect("fixture config is valid");
    cfg
}

pub(crate) fn data_table(times: &[f64], temps: &[f64], stations: &[&str]) -> Table {
    let mut t = Table::new();
    t.attrs
        .insert("title".to_string(), AttrValue::Text("fixture".to_string()));
    t.push_column(Column::new("time", ColumnData::Double(times.to_vec())))
        .unwrap();
    t.push_column(Column::new("temp", ColumnData::Double(temps.to_vec())))
        .unwrap();
    t.push_column(Column::new(
        "station",
        ColumnData::String(stations.iter().map(|s| s.to_string()).collect()),
    ))
    .unwrap();
    t
}

/// Create the on-disk marker so discovery finds the file.
pub(crate) fn touch(dir: &std::path::Path, name: &str) {
    std::fs::write(dir.join(name), b"x").unwrap();
}
