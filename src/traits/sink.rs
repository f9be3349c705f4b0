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

use async_trait::async_trait;

use crate::error::Result;
use crate::model::Volume;

/// Event-ingestion interface of the orchestration backend.
///
/// Every call may fail with
/// [`Error::SinkUnavailable`](crate::error::Error::SinkUnavailable) and must be
/// safe to repeat with the same logical event.
#[async_trait]
pub trait RemoteSink: Send + Sync {
    async fn report_volume_created(&self, pool_id: &str, volume: &Volume) -> Result<()>;

    async fn report_volume_deleted(&self, pool_id: &str, volume: &Volume) -> Result<()>;

    /// Replace the pool's whole membership with `host_uuids`.
    async fn sync_pool_membership(&self, pool_id: &str, host_uuids: &[String]) -> Result<()>;
}
