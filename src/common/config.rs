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

use std::time::Duration;

/// Application configuration constants
pub struct AppConfig;

impl AppConfig {
    // Reconciliation cadence
    pub const DEFAULT_VOLUME_POLL_INTERVAL_MS: u64 = 1000;
    pub const DEFAULT_HEALTHCHECK_INTERVAL_SECS: u64 = 5;
    pub const DEFAULT_STALE_THRESHOLD: u32 = 3;

    // Filesystem layout
    pub const DEFAULT_HEALTHCHECK_BASEDIR: &'static str = ".healthcheck";
    pub const DEFAULT_STORAGEPOOL_ROOTDIR: &'static str = ".root";
    pub const ROOT_UUID_FILE_NAME: &'static str = "UUID";
    pub const DEFAULT_DAEMON_SOCKET: &'static str = "/var/run/storage-daemon/daemon.sock";
    pub const DEFAULT_METADATA_URL: &'static str = "http://metadata/latest";

    // Network Configuration
    pub const CONNECTION_TIMEOUT_SECS: u64 = 10;
    pub const POOL_IDLE_TIMEOUT_SECS: u64 = 60;
    pub const POOL_MAX_IDLE_PER_HOST: usize = 8;
    pub const TCP_KEEPALIVE_SECS: u64 = 30;
}

/// Rule that decides when a heartbeat file stops counting as a live host.
///
/// Only the file-probing snapshot source needs one; metadata snapshots carry
/// their own liveness through absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StalenessPolicy {
    /// Stale once the marker has not changed for this many consecutive cycles.
    Cycles(u32),
    /// Stale once the heartbeat timestamp is older than this.
    Elapsed(Duration),
}

impl StalenessPolicy {
    /// Elapsed-time policy scaled to a multiple of the polling interval.
    ///
    /// Returns `None` when the product does not fit in a [`Duration`].
    pub fn elapsed_intervals(interval: Duration, intervals: u32) -> Option<Self> {
        interval.checked_mul(intervals).map(StalenessPolicy::Elapsed)
    }
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        StalenessPolicy::Cycles(AppConfig::DEFAULT_STALE_THRESHOLD)
    }
}
