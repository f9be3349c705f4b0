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

pub mod metadata;
pub mod orchestrator;
pub mod storage_daemon;

use std::time::Duration;

pub use metadata::MetadataClient;
pub use orchestrator::{OrchestratorClient, OrchestratorCredentials};
pub use storage_daemon::StorageDaemonClient;

use crate::common::config::AppConfig;
use crate::error::{Error, Result};

/// Shared reqwest client settings for every outbound HTTP peer.
///
/// The timeout bounds each round trip.
pub(crate) fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(AppConfig::CONNECTION_TIMEOUT_SECS))
        .pool_idle_timeout(Duration::from_secs(AppConfig::POOL_IDLE_TIMEOUT_SECS))
        .pool_max_idle_per_host(AppConfig::POOL_MAX_IDLE_PER_HOST)
        .tcp_keepalive(Duration::from_secs(AppConfig::TCP_KEEPALIVE_SECS))
        .build()
        .map_err(|e| Error::Configuration(format!("cannot build HTTP client: {e}")))
}
