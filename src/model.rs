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

//! Entities observed by the agent.
//!
//! Volumes come from the storage daemon, host snapshots from a
//! [`SnapshotSource`](crate::traits::SnapshotSource), and the metadata
//! types mirror the JSON served by the metadata inventory.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A volume as reported by the storage daemon.
///
/// Identity is the `name`; the remaining fields are carried along so the
/// orchestration backend can describe the volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    #[serde(rename = "UUID", default)]
    pub uuid: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Driver", default)]
    pub driver: String,
    #[serde(rename = "MountPoint", default)]
    pub mount_point: String,
    #[serde(rename = "CreatedTime", default)]
    pub created_time: String,
    #[serde(rename = "DriverInfo", default)]
    pub driver_info: BTreeMap<String, String>,
}

impl Volume {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Volumes keyed by name.
pub type VolumeMap = BTreeMap<String, Volume>;

/// Host UUID to liveness marker.
///
/// In file mode the marker is the heartbeat file content; in metadata mode it
/// is the time the topology was resolved.
pub type HostSnapshot = BTreeMap<String, String>;

/// The stack the agent itself runs in, as served by `/self/stack`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub services: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub stack_name: String,
    /// Container names as listed by the inventory. Membership is resolved
    /// through [`Container::service_name`] instead.
    #[serde(default)]
    pub containers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub stack_name: String,
    #[serde(default)]
    pub host_uuid: String,
}
