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

//! Streaming output boundary. Chunks arrive with the requested columns in
//! the requested types, packing already applied.

use async_trait::async_trait;
use config::meta::{
    table::{Column, Table},
    value::{ColumnData, ColumnType, Value},
};
use infra::errors::{Error, Result};

#[async_trait]
pub trait ResultSink: Send {
    /// Hand over one chunk; more may follow.
    async fn write_some(&mut self, chunk: Table) -> Result<()>;

    /// Hand over the complete result in one piece.
    async fn write_all_and_finish(&mut self, chunk: Table) -> Result<()>;

    /// No more chunks.
    async fn finish(&mut self) -> Result<()>;
}

/// Sort rows cell-by-cell and drop exact repeats.
pub(crate) fn sort_unique_rows(rows: &mut Vec<Vec<Value>>) {
    rows.sort_by(|a, b| {
        for (x, y) in a.iter().zip(b.iter()) {
            let ord = x.compare(y);
            if !ord.is_eq() {
                return ord;
            }
        }
        std::cmp::Ordering::Equal
    });
    rows.dedup_by(|a, b| a.iter().zip(b.iter()).all(|(x, y)| x.compare(y).is_eq()));
}

/// Buffers everything in memory. Useful for tests and small internal
/// consumers; production sinks stream onward instead.
#[derive(Default)]
pub struct VecSink {
    pub chunks: Vec<Table>,
    pub finished: bool,
}

impl VecSink {
    pub fn new() -> VecSink {
        VecSink::default()
    }

    pub fn total_rows(&self) -> usize {
        self.chunks.iter().map(|t| t.num_rows()).sum()
    }
}

#[async_trait]
impl ResultSink for VecSink {
    async fn write_some(&mut self, chunk: Table) -> Result<()> {
        self.chunks.push(chunk);
        Ok(())
    }

    async fn write_all_and_finish(&mut self, chunk: Table) -> Result<()> {
        self.chunks.push(chunk);
        self.finished = true;
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

/// Collapses a stream of candidate chunks to sorted unique rows and hands
/// them to the wrapped sink in one piece. Chunks of a distinct query may
/// repeat rows across files; this is where they converge. Holds the
/// distinct rows themselves, nothing more.
pub struct DistinctSink<'a> {
    inner: &'a mut dyn ResultSink,
    layout: Vec<(String, ColumnType)>,
    rows: Vec<Vec<Value>>,
}

impl<'a> DistinctSink<'a> {
    pub fn new(inner: &'a mut dyn ResultSink) -> DistinctSink<'a> {
        DistinctSink {
            inner,
            layout: Vec::new(),
            rows: Vec::new(),
        }
    }

    fn absorb(&mut self, chunk: &Table) {
        if self.layout.is_empty() {
            self.layout = chunk
                .columns
                .iter()
                .map(|c| (c.name.clone(), c.data.column_type()))
                .collect();
        }
        for row in 0..chunk.num_rows() {
            self.rows
                .push(chunk.columns.iter().map(|c| c.data.get(row)).collect());
        }
        sort_unique_rows(&mut self.rows);
    }

    fn drain(&mut self) -> Result<Table> {
        let mut out = Table::new();
        for (i, (name, column_type)) in self.layout.iter().enumerate() {
            let values: Vec<Value> = self.rows.iter().map(|r| r[i].clone()).collect();
            let data = ColumnData::from_values(*column_type, &values)
                .map_err(|e| Error::Message(e.to_string()))?;
            out.push_column(Column::new(name, data))
                .map_err(|e| Error::Message(e.to_string()))?;
        }
        self.rows.clear();
        Ok(out)
    }
}

#[async_trait]
impl ResultSink for DistinctSink<'_> {
    async fn write_some(&mut self, chunk: Table) -> Result<()> {
        self.absorb(&chunk);
        Ok(())
    }

    async fn write_all_and_finish(&mut self, chunk: Table) -> Result<()> {
        self.absorb(&chunk);
        let out = self.drain()?;
        self.inner.write_all_and_finish(out).await
    }

    async fn finish(&mut self) -> Result<()> {
        if self.layout.is_empty() {
            return self.inner.finish().await;
        }
        let out = self.drain()?;
        self.inner.write_all_and_finish(out).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station_chunk(values: &[&str]) -> Table {
        let mut t = Table::new();
        t.push_column(Column::new(
            "station",
            ColumnData::String(values.iter().map(|s| s.to_string()).collect()),
        ))
        .unwrap();
        t
    }

    #[test]
    fn test_sort_unique_rows() {
        let mut rows = vec![
            vec![Value::String("B".to_string())],
            vec![Value::String("A".to_string())],
            vec![Value::String("B".to_string())],
        ];
        sort_unique_rows(&mut rows);
        assert_eq!(
            rows,
            vec![
                vec![Value::String("A".to_string())],
                vec![Value::String("B".to_string())],
            ]
        );
    }

    #[tokio::test]
    async fn test_distinct_sink_collapses_chunks() {
        let mut inner = VecSink::new();
        let mut distinct = DistinctSink::new(&mut inner);
        distinct
            .write_some(station_chunk(&["B", "A", "B"]))
            .await
            .unwrap();
        distinct
            .write_all_and_finish(station_chunk(&["A", "C"]))
            .await
            .unwrap();
        assert!(inner.finished);
        assert_eq!(inner.chunks.len(), 1);
        let col = inner.chunks[0].column("station").unwrap();
        let rows: Vec<&str> = (0..col.data.len()).filter_map(|i| col.data.as_str(i)).collect();
        assert_eq!(rows, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_distinct_sink_finish_without_chunks() {
        let mut inner = VecSink::new();
        let mut distinct = DistinctSink::new(&mut inner);
        distinct.finish().await.unwrap();
        assert!(inner.finished);
        assert!(inner.chunks.is_empty());
    }
}
