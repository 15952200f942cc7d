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

//! The pluggable file-reading capability. The engine knows nothing about
//! file formats; a reader turns one file into a sub-table for the requested
//! columns, optionally trimmed to a sorted-column range.

use async_trait::async_trait;
use config::meta::{table::Table, value::ColumnType};

#[derive(Clone, Debug)]
pub struct ReadRequest<'a> {
    pub dir: &'a str,
    pub name: &'a str,
    /// Source column names to materialize, in order.
    pub column_names: &'a [String],
    pub column_types: &'a [ColumnType],
    /// The file's catalogued sorted-column state (-1 when unknown), so the
    /// reader can seek instead of scanning.
    pub sorted_spacing: f64,
    /// Sorted-column bounds in the file's own encoding.
    pub min_sorted: Option<f64>,
    pub max_sorted: Option<f64>,
    pub get_metadata: bool,
    /// When set the reader must return every row or fail; partial reads are
    /// worse than none during catalog scans.
    pub must_get_all_data: bool,
}

#[async_trait]
pub trait FileReader: Send + Sync {
    async fn read(&self, req: ReadRequest<'_>) -> Result<Table, anyhow::Error>;
}
