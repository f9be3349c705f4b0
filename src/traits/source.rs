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

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Container, HostSnapshot, Service, Stack, VolumeMap};

/// Produces the current set of storage-pool hosts with a liveness marker each.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Read the current snapshot.
    ///
    /// Fails with [`Error::SourceUnavailable`](crate::error::Error::SourceUnavailable)
    /// when the underlying read fails as a whole.
    async fn populate(&mut self) -> Result<Arc<HostSnapshot>>;

    /// Forget a host that was judged stale.
    async fn delete_host(&mut self, host_uuid: &str) -> Result<()>;

    /// Whether unchanged markers mean the host stopped reporting.
    ///
    /// Sources whose snapshots drop absent hosts on their own return `false`.
    fn tracks_staleness(&self) -> bool;

    /// Name used in log lines.
    fn source_type(&self) -> &str;
}

/// Produces the volumes currently known to the local storage daemon.
#[async_trait]
pub trait VolumeSource: Send + Sync {
    async fn list_volumes(&self) -> Result<VolumeMap>;
}

/// Versioned topology inventory consumed by the metadata snapshot source.
#[async_trait]
pub trait MetadataInventory: Send + Sync {
    /// Opaque token that changes whenever any inventory answer changes.
    async fn get_version(&self) -> Result<String>;

    /// The stack this agent runs in, with the service names it owns.
    async fn get_self_stack(&self) -> Result<Stack>;

    async fn get_services(&self) -> Result<Vec<Service>>;

    async fn get_containers(&self) -> Result<Vec<Container>>;
}
