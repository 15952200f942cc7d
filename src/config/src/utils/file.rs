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

use std::{
    fs::{File, Metadata},
    path::Path,
    time::UNIX_EPOCH,
};

use async_walkdir::WalkDir;
use futures::StreamExt;
use regex::Regex;

/// One file found by directory discovery: its containing directory, its name
/// relative to that directory, and its modification time in milliseconds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScannedFile {
    pub dir: String,
    pub name: String,
    pub last_modified: i64,
}

#[inline(always)]
pub fn get_file_meta(file: &str) -> Result<Metadata, std::io::Error> {
    let file = File::open(file)?;
    file.metadata()
}

fn modified_ms(meta: &std::fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// List the files under `root` whose names match `name_regex`.
pub async fn scan_files<P: AsRef<Path>>(
    root: P,
    name_regex: &Regex,
    recursive: bool,
) -> Result<Vec<ScannedFile>, std::io::Error> {
    let mut resp = Vec::new();
    if recursive {
        let mut wd = WalkDir::new(root.as_ref());
        loop {
            match wd.next().await {
                Some(Ok(entry)) => {
                    let path = entry.path();
                    if !path.is_file() {
                        continue;
                    }
                    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                        continue;
                    };
                    if !name_regex.is_match(name) {
                        continue;
                    }
                    let Some(dir) = path.parent().and_then(|d| d.to_str()) else {
                        continue;
                    };
                    let meta = entry.metadata().await?;
                    resp.push(ScannedFile {
                        dir: dir.to_string(),
                        name: name.to_string(),
                        last_modified: modified_ms(&meta),
                    });
                }
                Some(Err(e)) => {
                    log::warn!("scan_files: walk error under {:?}: {}", root.as_ref(), e);
                }
                None => break,
            }
        }
    } else {
        let mut rd = tokio::fs::read_dir(root.as_ref()).await?;
        while let Some(entry) = rd.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !name_regex.is_match(name) {
                continue;
            }
            let Some(dir) = root.as_ref().to_str() else {
                continue;
            };
            resp.push(ScannedFile {
                dir: dir.to_string(),
                name: name.to_string(),
                last_modified: modified_ms(&meta),
            });
        }
    }
    Ok(resp)
}
