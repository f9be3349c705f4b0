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

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Container, HostSnapshot, Service, Stack};
use crate::traits::{MetadataInventory, SnapshotSource};

/// Resolves pool membership from the metadata inventory.
///
/// Full resolution takes three inventory calls, so the last snapshot is
/// cached against the inventory version and reused until the version moves.
pub struct MetadataHealthCheck {
    inventory: Box<dyn MetadataInventory>,
    version: Option<String>,
    hosts: Arc<HostSnapshot>,
}

impl MetadataHealthCheck {
    pub fn new(inventory: Box<dyn MetadataInventory>) -> Self {
        Self {
            inventory,
            version: None,
            hosts: Arc::new(HostSnapshot::new()),
        }
    }

    async fn resolve_hosts(&self) -> Result<HostSnapshot> {
        let stack = self.inventory.get_self_stack().await?;
        let services = self.inventory.get_services().await?;
        let containers = self.inventory.get_containers().await?;

        let stamp = chrono::Local::now().to_rfc2822();
        Ok(hosts_in_stack(&stack, &services, &containers)
            .into_iter()
            .map(|host_uuid| (host_uuid, stamp.clone()))
            .collect())
    }
}

/// Host UUIDs running containers of the services `stack` owns.
///
/// A service counts only if it is both listed by the stack and affiliated
/// with it; a container counts only if it belongs to such a service in the
/// same stack.
pub fn hosts_in_stack(stack: &Stack, services: &[Service], containers: &[Container]) -> Vec<String> {
    let owned: HashSet<&str> = services
        .iter()
        .filter(|svc| svc.stack_name == stack.name && stack.services.contains(&svc.name))
        .map(|svc| svc.name.as_str())
        .collect();

    let mut hosts: Vec<String> = containers
        .iter()
        .filter(|c| c.stack_name == stack.name && owned.contains(c.service_name.as_str()))
        .filter(|c| !c.host_uuid.is_empty())
        .map(|c| c.host_uuid.clone())
        .collect();
    hosts.sort();
    hosts.dedup();
    hosts
}

#[async_trait]
impl SnapshotSource for MetadataHealthCheck {
    async fn populate(&mut self) -> Result<Arc<HostSnapshot>> {
        let version = self.inventory.get_version().await?;
        if self.version.as_deref() == Some(version.as_str()) {
            return Ok(Arc::clone(&self.hosts));
        }

        let hosts = self.resolve_hosts().await?;
        tracing::debug!(
            "Metadata version changed to {version}, resolved {} hosts",
            hosts.len()
        );
        self.hosts = Arc::new(hosts);
        self.version = Some(version);
        Ok(Arc::clone(&self.hosts))
    }

    async fn delete_host(&mut self, _host_uuid: &str) -> Result<()> {
        // Absence from the next resolved topology already removes the host.
        Ok(())
    }

    fn tracks_staleness(&self) -> bool {
        false
    }

    fn source_type(&self) -> &str {
        "metadata"
    }
}
