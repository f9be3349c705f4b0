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

//! Storage-pool host snapshot sources.
//!
//! Two interchangeable strategies produce the host map the pool loop
//! reconciles:
//!
//! - [`FileHealthCheck`] probes a directory of per-host heartbeat files.
//! - [`MetadataHealthCheck`] resolves hosts from a versioned metadata
//!   inventory.
//!
//! The strategy is chosen once at startup through [`HealthCheckKind`].

pub mod file;
pub mod metadata;

use std::path::PathBuf;

use clap::ValueEnum;

pub use file::FileHealthCheck;
pub use metadata::{hosts_in_stack, MetadataHealthCheck};

use crate::error::Result;
use crate::network::MetadataClient;
use crate::traits::SnapshotSource;

/// Which snapshot strategy the storage-pool loop uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HealthCheckKind {
    /// Heartbeat files in a shared directory
    File,
    /// Metadata inventory service
    Metadata,
}

impl std::fmt::Display for HealthCheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthCheckKind::File => write!(f, "file"),
            HealthCheckKind::Metadata => write!(f, "metadata"),
        }
    }
}

/// Build the snapshot source for `kind`.
pub fn create_snapshot_source(
    kind: HealthCheckKind,
    healthcheck_basedir: impl Into<PathBuf>,
    metadata_url: &str,
) -> Result<Box<dyn SnapshotSource>> {
    let source: Box<dyn SnapshotSource> = match kind {
        HealthCheckKind::File => Box::new(FileHealthCheck::new(healthcheck_basedir)),
        HealthCheckKind::Metadata => Box::new(MetadataHealthCheck::new(Box::new(
            MetadataClient::new(metadata_url)?,
        ))),
    };
    Ok(source)
}
