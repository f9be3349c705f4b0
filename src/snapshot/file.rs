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

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::model::HostSnapshot;
use crate::traits::SnapshotSource;

/// Reads one heartbeat file per host out of a shared directory.
///
/// File names are host UUIDs and file contents are the timestamps written by
/// each host's heartbeat writer. Writers run in other processes, so any entry
/// may vanish or be replaced between listing and reading.
pub struct FileHealthCheck {
    base_dir: PathBuf,
}

impl FileHealthCheck {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

#[async_trait]
impl SnapshotSource for FileHealthCheck {
    async fn populate(&mut self) -> Result<Arc<HostSnapshot>> {
        let mut entries = tokio::fs::read_dir(&self.base_dir).await.map_err(|e| {
            Error::SourceUnavailable(format!(
                "cannot list heartbeat directory {}: {e}",
                self.base_dir.display()
            ))
        })?;

        let mut hosts = HostSnapshot::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return Err(Error::SourceUnavailable(format!(
                        "cannot list heartbeat directory {}: {e}",
                        self.base_dir.display()
                    )))
                }
            };

            let file_name = entry.file_name();
            let Some(host_uuid) = file_name.to_str() else {
                tracing::warn!("Skipping heartbeat file with non UTF-8 name {file_name:?}");
                continue;
            };
            // Temp files from an in-progress atomic write.
            if host_uuid.starts_with('.') {
                continue;
            }

            match tokio::fs::read_to_string(entry.path()).await {
                Ok(stamp) => {
                    hosts.insert(host_uuid.to_string(), stamp.trim().to_string());
                }
                Err(e) => {
                    tracing::warn!("Error reading heartbeat file [{host_uuid}] err [{e}]");
                }
            }
        }

        Ok(Arc::new(hosts))
    }

    async fn delete_host(&mut self, host_uuid: &str) -> Result<()> {
        match tokio::fs::remove_file(self.base_dir.join(host_uuid)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn tracks_staleness(&self) -> bool {
        true
    }

    fn source_type(&self) -> &str {
        "file"
    }
}
