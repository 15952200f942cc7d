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

//! One dataset: a directory of same-schema files presented as a single
//! virtual table.
//!
//! The catalog is held behind an [`ArcSwap`], so queries read a consistent
//! immutable generation without locking while the updater builds the next
//! one. A mutex serializes updater runs; the bad-file registry is the only
//! mutable structure they share with the query path.

pub mod reader;
pub mod schema;
#[cfg(test)]
pub(crate) mod testing;
pub mod update;

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use arc_swap::ArcSwap;
use config::meta::{
    attr::AttrMap,
    dataset::{DatasetConfig, IdExtractor},
    packing::Packing,
    value::ColumnType,
};
use infra::{
    bad_files::BadFileRegistry,
    errors::{Error, ErrorCodes, Result},
    file_list::{store, CatalogState, DirTable},
    notify::Notifier,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{
    meta::search::Query,
    service::search::{
        self,
        sink::{DistinctSink, ResultSink},
    },
};

/// Dataset-level attributes, refreshed after each update pass from the file
/// `metadataFrom` selects.
#[derive(Debug, Default)]
pub struct DatasetMetadata {
    pub global: AttrMap,
    /// Parallel to the dataset's column list.
    pub columns: Vec<AttrMap>,
}

pub struct Dataset {
    pub cfg: DatasetConfig,
    pub(crate) base_dir: PathBuf,
    pub(crate) reader: Arc<dyn reader::FileReader>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) id_extractor: IdExtractor,
    pub(crate) state: ArcSwap<CatalogState>,
    pub(crate) metadata: ArcSwap<DatasetMetadata>,
    /// Packing expectations captured from the last scanned file, used to
    /// translate sorted-column bounds into source encoding at query time.
    pub(crate) packings: ArcSwap<Vec<Packing>>,
    pub(crate) bad_files: BadFileRegistry,
    pub(crate) update_lock: Mutex<()>,
    needs_reload: AtomicBool,
}

impl Dataset {
    /// Build a dataset under the configured data directory: validate,
    /// reload any persisted catalog, then run a full update pass.
    pub async fn new(
        cfg: DatasetConfig,
        reader: Arc<dyn reader::FileReader>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Arc<Dataset>> {
        let base_dir = store::dataset_dir(&cfg.dataset_id);
        Self::new_at(base_dir, cfg, reader, notifier).await
    }

    pub async fn new_at(
        base_dir: PathBuf,
        mut cfg: DatasetConfig,
        reader: Arc<dyn reader::FileReader>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Arc<Dataset>> {
        cfg.validate()
            .map_err(|e| Error::ErrorCode(ErrorCodes::BadRequest(e.to_string())))?;
        let id_extractor = IdExtractor::new(&cfg)
            .map_err(|e| Error::ErrorCode(ErrorCodes::BadRequest(e.to_string())))?;
        let column_types: Vec<ColumnType> =
            cfg.data_variables.iter().map(|v| v.column_type).collect();
        let ds = Arc::new(Dataset {
            state: ArcSwap::from_pointee(CatalogState::empty(&column_types)),
            metadata: ArcSwap::from_pointee(DatasetMetadata::default()),
            packings: ArcSwap::from_pointee(vec![Packing::default(); column_types.len()]),
            bad_files: BadFileRegistry::new(),
            update_lock: Mutex::new(()),
            needs_reload: AtomicBool::new(false),
            id_extractor,
            cfg,
            base_dir,
            reader,
            notifier,
        });

        match store::load(&ds.base_dir, &ds.column_specs()) {
            Ok(Some(persisted)) => {
                let mut state = CatalogState {
                    dirs: DirTable::from_rows(persisted.dirs),
                    files: persisted.files,
                    ..Default::default()
                };
                state.recompute_aggregates(&column_types);
                state.compute_visit_order(&ds.cfg.sort_files_var_indices());
                ds.bad_files.hydrate(persisted.bad_files);
                log::info!(
                    "[dataset {}] catalog->load: {} files, {} directories, {} quarantined",
                    ds.cfg.dataset_id,
                    state.files.len(),
                    state.dirs.len(),
                    ds.bad_files.len(),
                );
                ds.state.store(Arc::new(state));
            }
            Ok(None) => {}
            Err(e) => {
                log::warn!(
                    "[dataset {}] catalog->load: discarding unreadable state, will rebuild: {}",
                    ds.cfg.dataset_id,
                    e
                );
            }
        }

        update::run(&ds).await?;
        Ok(ds)
    }

    /// Re-walk the source directory and fold changes into the catalog.
    pub async fn reload(&self) -> Result<()> {
        update::run(self).await
    }

    pub async fn search(
        &self,
        query: &Query,
        sink: &mut dyn ResultSink,
        cancel: CancellationToken,
    ) -> Result<()> {
        if query.distinct {
            // distinct chunks may repeat rows across files; collapse the
            // stream to sorted unique rows before it reaches the caller
            let mut distinct = DistinctSink::new(sink);
            return search::execute(self, query, &mut distinct, cancel).await;
        }
        search::execute(self, query, sink, cancel).await
    }

    pub fn state(&self) -> Arc<CatalogState> {
        self.state.load_full()
    }

    pub fn metadata(&self) -> Arc<DatasetMetadata> {
        self.metadata.load_full()
    }

    pub fn column_types(&self) -> Vec<ColumnType> {
        self.cfg
            .data_variables
            .iter()
            .map(|v| v.column_type)
            .collect()
    }

    /// Presented `(name, type)` pairs in column order; also the persisted
    /// fileTable layout.
    pub fn column_specs(&self) -> Vec<(String, ColumnType)> {
        self.cfg
            .data_variables
            .iter()
            .map(|v| (v.name.clone(), v.column_type))
            .collect()
    }

    pub(crate) fn packing_of(&self, var_index: usize) -> Packing {
        self.packings
            .load()
            .get(var_index)
            .copied()
            .unwrap_or_default()
    }

    /// Ask the background job to reload ahead of schedule.
    pub fn mark_reload(&self) {
        self.needs_reload.store(true, Ordering::Relaxed);
    }

    pub fn take_reload_request(&self) -> bool {
        self.needs_reload.swap(false, Ordering::Relaxed)
    }
}
