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

//! The in-memory table chunk crossing the reader and sink boundaries.

use crate::meta::{attr::AttrMap, value::ColumnData};

#[derive(Clone, Debug)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
    pub attrs: AttrMap,
}

impl Column {
    pub fn new(name: &str, data: ColumnData) -> Column {
        Column {
            name: name.to_string(),
            data,
            attrs: AttrMap::new(),
        }
    }

    pub fn with_attrs(name: &str, data: ColumnData, attrs: AttrMap) -> Column {
        Column {
            name: name.to_string(),
            data,
            attrs,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Table {
    pub columns: Vec<Column>,
    pub attrs: AttrMap,
}

impl Table {
    pub fn new() -> Table {
        Table::default()
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.data.len())
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn push_column(&mut self, column: Column) -> Result<(), anyhow::Error> {
        if !self.columns.is_empty() && column.data.len() != self.num_rows() {
            return Err(anyhow::anyhow!(
                "column {} has {} rows, table has {}",
                column.name,
                column.data.len(),
                self.num_rows()
            ));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Break the table into chunks of at most `max_rows` rows.
    pub fn split(self, max_rows: usize) -> Vec<Table> {
        let n = self.num_rows();
        if n <= max_rows || max_rows == 0 {
            return vec![self];
        }
        let mut chunks = Vec::with_capacity(n.div_ceil(max_rows));
        let mut start = 0;
        while start < n {
            let end = (start + max_rows).min(n);
            chunks.push(Table {
                columns: self
                    .columns
                    .iter()
                    .map(|c| Column {
                        name: c.name.clone(),
                        data: c.data.slice(start, end),
                        attrs: c.attrs.clone(),
                    })
                    .collect(),
                attrs: self.attrs.clone(),
            });
            start = end;
        }
        chunks
    }
}

impl ColumnData {
    pub fn slice(&self, start: usize, end: usize) -> ColumnData {
        match self {
            ColumnData::Byte(v) => ColumnData::Byte(v[start..end].to_vec()),
            ColumnData::Short(v) => ColumnData::Short(v[start..end].to_vec()),
            ColumnData::Int(v) => ColumnData::Int(v[start..end].to_vec()),
            ColumnData::Long(v) => ColumnData::Long(v[start..end].to_vec()),
            ColumnData::Float(v) => ColumnData::Float(v[start..end].to_vec()),
            ColumnData::Double(v) => ColumnData::Double(v[start..end].to_vec()),
            ColumnData::String(v) => ColumnData::String(v[start..end].to_vec()),
        }
    }
}
