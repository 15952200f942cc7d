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

//! Durable catalog state: three flat columnar containers per dataset.
//!
//! `fileTable` holds the catalog, `directoryTable` the interned directory
//! strings, `badFiles` the quarantine registry. Writes go to temporaries and
//! are renamed into place badFiles-first, directoryTable second, fileTable
//! last, so a crash at any point leaves a catalog that only references
//! directories already on disk. A reader that finds a malformed container
//! reports corruption and the caller rebuilds from scratch.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use config::{
    get_config,
    meta::{
        file::FileRecord,
        value::{ColumnData, ColumnRange, ColumnType},
    },
    BAD_FILES_NAME, DIRECTORY_TABLE_NAME, FILE_TABLE_NAME,
};

use crate::{
    bad_files::BadFileEntry,
    errors::{Error, Result},
};

const MAGIC: &[u8; 4] = b"TFCT";
const VERSION: u8 = 1;

// guard rails so a corrupt header cannot trigger huge allocations
const MAX_COLUMNS: u32 = 10_000;
const MAX_ROWS: u64 = 500_000_000;
const MAX_NAME_LEN: u16 = 1024;
const MAX_STRING_LEN: u32 = 16 * 1024 * 1024;

fn type_tag(column_type: ColumnType) -> u8 {
    match column_type {
        ColumnType::Byte => 0,
        ColumnType::Short => 1,
        ColumnType::Int => 2,
        ColumnType::Long => 3,
        ColumnType::Float => 4,
        ColumnType::Double | ColumnType::Timestamp => 5,
        ColumnType::String => 6,
    }
}

pub fn dataset_dir(dataset_id: &str) -> PathBuf {
    Path::new(&get_config().data_dir).join(dataset_id)
}

/// Write one self-describing columnar container.
pub fn write_container(path: &Path, columns: &[(String, ColumnData)]) -> Result<()> {
    let nrows = columns.first().map_or(0, |(_, d)| d.len());
    for (name, data) in columns {
        if data.len() != nrows {
            return Err(Error::Message(format!(
                "container column {name} has {} rows, expected {nrows}",
                data.len()
            )));
        }
    }
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(MAGIC)?;
    w.write_u8(VERSION)?;
    w.write_u32::<LittleEndian>(columns.len() as u32)?;
    w.write_u64::<LittleEndian>(nrows as u64)?;
    for (name, data) in columns {
        w.write_u16::<LittleEndian>(name.len() as u16)?;
        w.write_all(name.as_bytes())?;
        w.write_u8(type_tag(data.column_type()))?;
    }
    for (_, data) in columns {
        match data {
            ColumnData::Byte(v) => {
                for x in v {
                    w.write_i8(*x)?;
                }
            }
            ColumnData::Short(v) => {
                for x in v {
                    w.write_i16::<LittleEndian>(*x)?;
                }
            }
            ColumnData::Int(v) => {
                for x in v {
                    w.write_i32::<LittleEndian>(*x)?;
                }
            }
            ColumnData::Long(v) => {
                for x in v {
                    w.write_i64::<LittleEndian>(*x)?;
                }
            }
            ColumnData::Float(v) => {
                for x in v {
                    w.write_f32::<LittleEndian>(*x)?;
                }
            }
            ColumnData::Double(v) => {
                for x in v {
                    w.write_f64::<LittleEndian>(*x)?;
                }
            }
            ColumnData::String(v) => {
                for x in v {
                    w.write_u32::<LittleEndian>(x.len() as u32)?;
                    w.write_all(x.as_bytes())?;
                }
            }
        }
    }
    w.flush()?;
    Ok(())
}

/// Read one container back. Any structural problem is corruption, not io.
pub fn read_container(path: &Path) -> Result<Vec<(String, ColumnData)>> {
    let corrupt = |msg: &str| Error::CorruptedCatalog(format!("{}: {msg}", path.display()));
    let mut r = BufReader::new(File::open(path)?);
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)
        .map_err(|_| corrupt("short header"))?;
    if &magic != MAGIC {
        return Err(corrupt("bad magic"));
    }
    let version = r.read_u8().map_err(|_| corrupt("short header"))?;
    if version != VERSION {
        return Err(corrupt("unknown version"));
    }
    let ncols = r
        .read_u32::<LittleEndian>()
        .map_err(|_| corrupt("short header"))?;
    let nrows = r
        .read_u64::<LittleEndian>()
        .map_err(|_| corrupt("short header"))?;
    if ncols > MAX_COLUMNS || nrows > MAX_ROWS {
        return Err(corrupt("implausible dimensions"));
    }
    let nrows = nrows as usize;

    let mut headers = Vec::with_capacity(ncols as usize);
    for _ in 0..ncols {
        let name_len = r
            .read_u16::<LittleEndian>()
            .map_err(|_| corrupt("short column header"))?;
        if name_len > MAX_NAME_LEN {
            return Err(corrupt("implausible column name"));
        }
        let mut name = vec![0u8; name_len as usize];
        r.read_exact(&mut name)
            .map_err(|_| corrupt("short column header"))?;
        let name = String::from_utf8(name).map_err(|_| corrupt("non-utf8 column name"))?;
        let tag = r.read_u8().map_err(|_| corrupt("short column header"))?;
        if tag > 6 {
            return Err(corrupt("unknown column type"));
        }
        headers.push((name, tag));
    }

    let mut columns = Vec::with_capacity(headers.len());
    for (name, tag) in headers {
        let short = |_| corrupt("short column data");
        let data = match tag {
            0 => {
                let mut v = Vec::with_capacity(nrows);
                for _ in 0..nrows {
                    v.push(r.read_i8().map_err(short)?);
                }
                ColumnData::Byte(v)
            }
            1 => {
                let mut v = Vec::with_capacity(nrows);
                for _ in 0..nrows {
                    v.push(r.read_i16::<LittleEndian>().map_err(short)?);
                }
                ColumnData::Short(v)
            }
            2 => {
                let mut v = Vec::with_capacity(nrows);
                for _ in 0..nrows {
                    v.push(r.read_i32::<LittleEndian>().map_err(short)?);
                }
                ColumnData::Int(v)
            }
            3 => {
                let mut v = Vec::with_capacity(nrows);
                for _ in 0..nrows {
                    v.push(r.read_i64::<LittleEndian>().map_err(short)?);
                }
                ColumnData::Long(v)
            }
            4 => {
                let mut v = Vec::with_capacity(nrows);
                for _ in 0..nrows {
                    v.push(r.read_f32::<LittleEndian>().map_err(short)?);
                }
                ColumnData::Float(v)
            }
            5 => {
                let mut v = Vec::with_capacity(nrows);
                for _ in 0..nrows {
                    v.push(r.read_f64::<LittleEndian>().map_err(short)?);
                }
                ColumnData::Double(v)
            }
            _ => {
                let mut v = Vec::with_capacity(nrows);
                for _ in 0..nrows {
                    let len = r.read_u32::<LittleEndian>().map_err(short)?;
                    if len > MAX_STRING_LEN {
                        return Err(corrupt("implausible string length"));
                    }
                    let mut buf = vec![0u8; len as usize];
                    r.read_exact(&mut buf)
                        .map_err(|_| corrupt("short column data"))?;
                    v.push(String::from_utf8(buf).map_err(|_| corrupt("non-utf8 cell"))?);
                }
                ColumnData::String(v)
            }
        };
        columns.push((name, data));
    }
    Ok(columns)
}

/// Everything a dataset persists between runs.
pub struct PersistedState {
    pub dirs: Vec<String>,
    pub files: Vec<FileRecord>,
    pub bad_files: Vec<(String, BadFileEntry)>,
}

/// The fileTable column layout for a dataset with these variables.
fn file_table_schema(columns: &[(String, ColumnType)]) -> Vec<(String, u8)> {
    let mut schema = vec![
        ("dirIndex".to_string(), type_tag(ColumnType::Short)),
        ("fileName".to_string(), type_tag(ColumnType::String)),
        ("lastModified".to_string(), type_tag(ColumnType::Double)),
        ("sortedSpacing".to_string(), type_tag(ColumnType::Double)),
    ];
    for (name, t) in columns {
        schema.push((format!("{name}_min"), type_tag(*t)));
        schema.push((format!("{name}_max"), type_tag(*t)));
        schema.push((format!("{name}_hasNaN"), type_tag(ColumnType::Byte)));
    }
    schema
}

fn build_file_table(
    files: &[FileRecord],
    columns: &[(String, ColumnType)],
) -> Result<Vec<(String, ColumnData)>> {
    let n = files.len();
    let mut dir_index = Vec::with_capacity(n);
    let mut file_name = Vec::with_capacity(n);
    let mut last_modified = Vec::with_capacity(n);
    let mut sorted_spacing = Vec::with_capacity(n);
    for f in files {
        dir_index.push(f.dir_index);
        file_name.push(f.name.clone());
        last_modified.push(f.last_modified as f64);
        sorted_spacing.push(f.sorted_spacing);
    }
    let mut out = vec![
        ("dirIndex".to_string(), ColumnData::Short(dir_index)),
        ("fileName".to_string(), ColumnData::String(file_name)),
        ("lastModified".to_string(), ColumnData::Double(last_modified)),
        (
            "sortedSpacing".to_string(),
            ColumnData::Double(sorted_spacing),
        ),
    ];
    for (i, (name, t)) in columns.iter().enumerate() {
        let mut min = ColumnData::with_capacity(*t, n);
        let mut max = ColumnData::with_capacity(*t, n);
        let mut has_missing = Vec::with_capacity(n);
        for f in files {
            let r = f.ranges.get(i).ok_or_else(|| {
                Error::Message(format!("file {} lacks a range for column {name}", f.name))
            })?;
            min.push_value(&r.min).map_err(|e| Error::Message(e.to_string()))?;
            max.push_value(&r.max).map_err(|e| Error::Message(e.to_string()))?;
            has_missing.push(r.has_missing as i8);
        }
        out.push((format!("{name}_min"), min));
        out.push((format!("{name}_max"), max));
        out.push((format!("{name}_hasNaN"), ColumnData::Byte(has_missing)));
    }
    Ok(out)
}

/// Persist catalog, directory table and bad-file registry atomically.
pub fn save(
    base_dir: &Path,
    dirs: &[String],
    files: &[FileRecord],
    bad_files: &[(String, BadFileEntry)],
    columns: &[(String, ColumnType)],
) -> Result<()> {
    std::fs::create_dir_all(base_dir)?;
    let bad_path = base_dir.join(BAD_FILES_NAME);
    let dir_path = base_dir.join(DIRECTORY_TABLE_NAME);
    let file_path = base_dir.join(FILE_TABLE_NAME);
    let tmp = |p: &Path| p.with_extension("tmp");

    let result = (|| -> Result<()> {
        if !bad_files.is_empty() {
            let mut path = Vec::with_capacity(bad_files.len());
            let mut modified = Vec::with_capacity(bad_files.len());
            let mut reason = Vec::with_capacity(bad_files.len());
            for (key, entry) in bad_files {
                path.push(key.clone());
                modified.push(entry.last_modified as f64);
                reason.push(entry.reason.clone());
            }
            write_container(
                &tmp(&bad_path),
                &[
                    ("path".to_string(), ColumnData::String(path)),
                    ("lastModified".to_string(), ColumnData::Double(modified)),
                    ("reason".to_string(), ColumnData::String(reason)),
                ],
            )?;
        }
        write_container(
            &tmp(&dir_path),
            &[(
                "directory".to_string(),
                ColumnData::String(dirs.to_vec()),
            )],
        )?;
        write_container(&tmp(&file_path), &build_file_table(files, columns)?)?;

        if bad_files.is_empty() {
            if bad_path.exists() {
                std::fs::remove_file(&bad_path)?;
            }
        } else {
            std::fs::rename(tmp(&bad_path), &bad_path)?;
        }
        std::fs::rename(tmp(&dir_path), &dir_path)?;
        std::fs::rename(tmp(&file_path), &file_path)?;
        Ok(())
    })();

    if result.is_err() {
        for p in [&bad_path, &dir_path, &file_path] {
            let t = tmp(p);
            if t.exists() {
                let _ = std::fs::remove_file(&t);
            }
        }
    }
    result
}

/// Load persisted state. `Ok(None)` means nothing was ever saved;
/// `Err(CorruptedCatalog)` means the caller should discard and rebuild.
pub fn load(base_dir: &Path, columns: &[(String, ColumnType)]) -> Result<Option<PersistedState>> {
    let file_path = base_dir.join(FILE_TABLE_NAME);
    if !file_path.exists() {
        return Ok(None);
    }
    let corrupt = |msg: String| Error::CorruptedCatalog(msg);

    let dir_cols = read_container(&base_dir.join(DIRECTORY_TABLE_NAME))?;
    let dirs = match dir_cols.as_slice() {
        [(name, ColumnData::String(v))] if name == "directory" => v.clone(),
        _ => return Err(corrupt("directoryTable has unexpected columns".to_string())),
    };

    let file_cols = read_container(&file_path)?;
    let expected = file_table_schema(columns);
    if file_cols.len() != expected.len() {
        return Err(corrupt(format!(
            "fileTable has {} columns, expected {}",
            file_cols.len(),
            expected.len()
        )));
    }
    for ((name, data), (want_name, want_tag)) in file_cols.iter().zip(expected.iter()) {
        if name != want_name || type_tag(data.column_type()) != *want_tag {
            return Err(corrupt(format!(
                "fileTable column {name} does not match expected {want_name}"
            )));
        }
    }

    let nrows = file_cols[0].1.len();
    let dir_index = match &file_cols[0].1 {
        ColumnData::Short(v) => v,
        _ => unreachable!(),
    };
    let file_name = match &file_cols[1].1 {
        ColumnData::String(v) => v,
        _ => unreachable!(),
    };
    let last_modified = match &file_cols[2].1 {
        ColumnData::Double(v) => v,
        _ => unreachable!(),
    };
    let sorted_spacing = match &file_cols[3].1 {
        ColumnData::Double(v) => v,
        _ => unreachable!(),
    };

    let mut files = Vec::with_capacity(nrows);
    for i in 0..nrows {
        if dir_index[i] < 0 || dir_index[i] as usize >= dirs.len() {
            return Err(corrupt(format!(
                "fileTable row {i} references undefined directory {}",
                dir_index[i]
            )));
        }
        let mut ranges = Vec::with_capacity(columns.len());
        for c in 0..columns.len() {
            let min = file_cols[4 + c * 3].1.get(i);
            let max = file_cols[5 + c * 3].1.get(i);
            let has_missing = match &file_cols[6 + c * 3].1 {
                ColumnData::Byte(v) => v[i] != 0,
                _ => unreachable!(),
            };
            ranges.push(ColumnRange {
                min,
                max,
                has_missing,
            });
        }
        files.push(FileRecord {
            dir_index: dir_index[i],
            name: file_name[i].clone(),
            last_modified: last_modified[i] as i64,
            sorted_spacing: sorted_spacing[i],
            ranges,
        });
    }
    if files
        .windows(2)
        .any(|w| w[0].sort_key() >= w[1].sort_key())
    {
        return Err(corrupt("fileTable is not sorted by (dirIndex, fileName)".to_string()));
    }

    let bad_path = base_dir.join(BAD_FILES_NAME);
    let bad_files = if bad_path.exists() {
        let cols = read_container(&bad_path)?;
        match cols.as_slice() {
            [(p, ColumnData::String(path)), (m, ColumnData::Double(modified)), (r, ColumnData::String(reason))]
                if p == "path" && m == "lastModified" && r == "reason" =>
            {
                path.iter()
                    .zip(modified.iter())
                    .zip(reason.iter())
                    .map(|((key, lm), why)| {
                        (
                            key.clone(),
                            BadFileEntry {
                                last_modified: *lm as i64,
                                reason: why.clone(),
                            },
                        )
                    })
                    .collect()
            }
            _ => return Err(corrupt("badFiles has unexpected columns".to_string())),
        }
    } else {
        Vec::new()
    };

    Ok(Some(PersistedState {
        dirs,
        files,
        bad_files,
    }))
}
