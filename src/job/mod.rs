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

//! Background catalog maintenance: reload on the configured cadence, or
//! sooner when the query path flags a file as stale.

use std::sync::Arc;

use tokio::time;

use crate::service::dataset::Dataset;

pub async fn run(ds: Arc<Dataset>) -> Result<(), anyhow::Error> {
    let minutes = ds.cfg.reload_every_n_minutes;
    if minutes == 0 {
        log::info!(
            "[dataset {}] scheduled reload disabled",
            ds.cfg.dataset_id
        );
        return Ok(());
    }

    let mut interval = time::interval(time::Duration::from_secs(60));
    interval.tick().await; // trigger the first run
    let mut elapsed = 0u64;
    loop {
        interval.tick().await;
        elapsed += 1;
        if elapsed < minutes && !ds.take_reload_request() {
            continue;
        }
        elapsed = 0;
        match ds.reload().await {
            Ok(()) => {
                log::debug!("[dataset {}] scheduled reload done", ds.cfg.dataset_id);
            }
            Err(e) => {
                log::error!(
                    "[dataset {}] scheduled reload error: {}",
                    ds.cfg.dataset_id,
                    e
                );
            }
        }
    }
}
