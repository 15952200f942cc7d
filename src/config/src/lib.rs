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

pub mod meta;
pub mod utils;

use dashmap::DashMap;
use dotenv_config::EnvConfig;
use once_cell::sync::Lazy;

pub type RwHashMap<K, V> = DashMap<K, V, ahash::RandomState>;

pub const FILE_TABLE_NAME: &str = "fileTable";
pub const DIRECTORY_TABLE_NAME: &str = "directoryTable";
pub const BAD_FILES_NAME: &str = "badFiles";

static CONFIG: Lazy<Config> = Lazy::new(init);

#[derive(EnvConfig)]
pub struct Config {
    #[env_config(name = "TF_DATA_DIR", default = "./data/")]
    pub data_dir: String,
    /// Wait between the first failed read of a file during a query and the
    /// single retry.
    #[env_config(name = "TF_SCAN_RETRY_WAIT_MS", default = 1000)]
    pub scan_retry_wait_ms: u64,
    /// Upper bound on rows per chunk handed to a result sink.
    #[env_config(name = "TF_QUERY_CHUNK_ROWS", default = 8192)]
    pub query_chunk_rows: usize,
}

fn init() -> Config {
    dotenvy::dotenv().ok();
    let mut cfg = Config::init().expect("config load error");
    if !cfg.data_dir.ends_with('/') {
        cfg.data_dir = format!("{}/", cfg.data_dir);
    }
    cfg
}

pub fn get_config() -> &'static Config {
    &CONFIG
}
