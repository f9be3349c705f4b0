// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::common::config::AppConfig;
use crate::error::{Error, Result};

use super::wait_or_stop;

/// Periodically stamps `<base_dir>/<host_uuid>` with the current time.
///
/// The file-probing snapshot source on the pool leader reads these files.
#[derive(Debug, Clone)]
pub struct HeartbeatWriter {
    host_uuid: String,
    base_dir: PathBuf,
    interval: Duration,
}

impl HeartbeatWriter {
    pub fn new(
        host_uuid: impl Into<String>,
        base_dir: impl Into<PathBuf>,
        interval: Duration,
    ) -> Result<Self> {
        let host_uuid = host_uuid.into();
        if host_uuid.is_empty() || host_uuid.contains('/') || host_uuid.starts_with('.') {
            return Err(Error::Configuration(format!(
                "invalid host uuid for heartbeat file: {host_uuid:?}"
            )));
        }
        Ok(Self {
            host_uuid,
            base_dir: base_dir.into(),
            interval,
        })
    }

    pub fn path(&self) -> PathBuf {
        self.base_dir.join(&self.host_uuid)
    }

    pub async fn prepare(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.base_dir).await?;
        Ok(())
    }

    /// Write one heartbeat.
    ///
    /// Readers never see a partial stamp: the value goes to a hidden
    /// temporary file first and is then renamed over the real one.
    pub async fn beat(&self) -> Result<()> {
        let stamp = chrono::Local::now().to_rfc2822();
        let tmp = self.base_dir.join(format!(".{}.tmp", self.host_uuid));
        tokio::fs::write(&tmp, stamp.as_bytes()).await?;
        tokio::fs::rename(&tmp, self.path()).await?;
        Ok(())
    }

    pub async fn run(&self, token: CancellationToken) -> Result<()> {
        self.prepare().await?;
        tracing::info!(
            "Writing heartbeat to {} every {:?}",
            self.path().display(),
            self.interval
        );
        loop {
            if let Err(e) = self.beat().await {
                tracing::warn!("Failed to write heartbeat [{e}]");
            }
            if !wait_or_stop(&token, self.interval).await {
                break;
            }
        }
        tracing::info!("Heartbeat writer stopped");
        Ok(())
    }
}

/// Record the storage driver in `<root_dir>/UUID` unless it is already there.
pub async fn ensure_root_marker(root_dir: &Path, driver: &str) -> Result<()> {
    let marker = root_dir.join(AppConfig::ROOT_UUID_FILE_NAME);
    if tokio::fs::try_exists(&marker).await? {
        tracing::debug!("Root marker {} already present", marker.display());
        return Ok(());
    }
    tokio::fs::create_dir_all(root_dir).await?;
    tokio::fs::write(&marker, driver.as_bytes()).await?;
    tracing::info!("Wrote root marker {}", marker.display());
    Ok(())
}
