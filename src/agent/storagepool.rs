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

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::app_state::{LoopStatus, SharedState};
use crate::common::config::{AppConfig, StalenessPolicy};
use crate::error::{Error, Result};
use crate::model::HostSnapshot;
use crate::traits::{RemoteSink, SnapshotSource};

use super::wait_or_stop;

/// Per-host staleness accounting for heartbeat snapshots.
#[derive(Debug, Default)]
pub struct StaleTracker {
    counts: HashMap<String, u32>,
}

impl StaleTracker {
    /// Update the counter for `host_uuid` and decide whether it is stale.
    ///
    /// `previous` is the marker from the last committed raw snapshot, if the
    /// host was in it. An unchanged marker bumps the counter, anything else
    /// resets it.
    pub fn observe(
        &mut self,
        policy: StalenessPolicy,
        host_uuid: &str,
        marker: &str,
        previous: Option<&str>,
        now: DateTime<Utc>,
    ) -> bool {
        let count = if previous == Some(marker) {
            let count = self.counts.entry(host_uuid.to_string()).or_insert(0);
            *count += 1;
            *count
        } else {
            self.counts.remove(host_uuid);
            0
        };

        match policy {
            StalenessPolicy::Cycles(threshold) => count >= threshold,
            StalenessPolicy::Elapsed(max_age) => match DateTime::parse_from_rfc2822(marker) {
                Ok(stamp) => now
                    .signed_duration_since(stamp)
                    .to_std()
                    .map(|age| age > max_age)
                    .unwrap_or(false),
                Err(_) => count >= AppConfig::DEFAULT_STALE_THRESHOLD,
            },
        }
    }

    pub fn count(&self, host_uuid: &str) -> u32 {
        self.counts.get(host_uuid).copied().unwrap_or(0)
    }

    pub fn forget(&mut self, host_uuid: &str) {
        self.counts.remove(host_uuid);
    }

    /// Drop counters for hosts missing from `hosts`.
    pub fn retain_present(&mut self, hosts: &HostSnapshot) {
        self.counts.retain(|uuid, _| hosts.contains_key(uuid));
    }
}

/// Keeps the orchestration backend's storage-pool membership current.
///
/// The membership call replaces the whole host list, so it is only made
/// when the candidate set differs from the one last sent successfully. On a
/// failed sync nothing rolls forward: the next cycle compares against the
/// same baseline and sends again.
pub struct PoolReconciler {
    source: Box<dyn SnapshotSource>,
    sink: Arc<dyn RemoteSink>,
    pool_id: String,
    interval: Duration,
    policy: StalenessPolicy,
    prev_hosts: Arc<HostSnapshot>,
    stale: StaleTracker,
    prev_sent: Option<BTreeSet<String>>,
    status: Option<SharedState>,
}

impl PoolReconciler {
    pub fn new(
        source: Box<dyn SnapshotSource>,
        sink: Arc<dyn RemoteSink>,
        pool_id: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            sink,
            pool_id: pool_id.into(),
            interval,
            policy: StalenessPolicy::default(),
            prev_hosts: Arc::new(HostSnapshot::new()),
            stale: StaleTracker::default(),
            prev_sent: None,
            status: None,
        }
    }

    pub fn with_staleness_policy(mut self, policy: StalenessPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_status(mut self, status: SharedState) -> Self {
        self.status = Some(status);
        self
    }

    /// Host set last delivered to the backend, `None` before the first sync.
    pub fn last_sent(&self) -> Option<&BTreeSet<String>> {
        self.prev_sent.as_ref()
    }

    pub fn stale_count(&self, host_uuid: &str) -> u32 {
        self.stale.count(host_uuid)
    }

    /// Run one sample, staleness, debounce, sync pass.
    ///
    /// Returns whether a membership sync was sent.
    pub async fn run_cycle(&mut self) -> Result<bool> {
        let curr = match self.source.populate().await {
            Ok(hosts) => hosts,
            Err(e) => {
                tracing::error!("Error while reading host info [{e}]");
                self.record(Err(&e), false).await;
                return Err(e);
            }
        };

        let tracks_staleness = self.source.tracks_staleness();
        let now = Utc::now();
        let mut to_send = BTreeSet::new();
        let mut stale_hosts = Vec::new();

        self.stale.retain_present(&curr);
        for (uuid, marker) in curr.iter() {
            if tracks_staleness {
                let previous = self.prev_hosts.get(uuid).map(String::as_str);
                if self.stale.observe(self.policy, uuid, marker, previous, now) {
                    tracing::debug!("Host [{uuid}] heartbeat is stale");
                    stale_hosts.push(uuid.clone());
                    continue;
                }
            }
            to_send.insert(uuid.clone());
        }

        let send_due = self.prev_sent.as_ref() != Some(&to_send);
        if send_due {
            let hosts: Vec<String> = to_send.iter().cloned().collect();
            if let Err(e) = self.sink.sync_pool_membership(&self.pool_id, &hosts).await {
                tracing::error!("Error syncing storage pool events [{e}]");
                self.record(Err(&e), false).await;
                return Err(e);
            }
            tracing::info!("Synced storage pool [{}] hosts {hosts:?}", self.pool_id);
        }

        let mut baseline = curr;
        for uuid in &stale_hosts {
            match self.source.delete_host(uuid).await {
                Ok(()) => {
                    tracing::info!("Removed stale host [{uuid}]");
                    Arc::make_mut(&mut baseline).remove(uuid);
                    self.stale.forget(uuid);
                }
                Err(e) => tracing::error!("Error while deleting heartbeat of [{uuid}] [{e}]"),
            }
        }

        self.prev_hosts = baseline;
        self.prev_sent = Some(to_send);
        self.record(Ok(()), send_due).await;
        Ok(send_due)
    }

    /// Sync once right away, then poll until `token` is cancelled.
    pub async fn run(&mut self, token: CancellationToken) -> Result<()> {
        tracing::info!(
            "Starting storagepool loop for pool [{}] using {} healthcheck every {:?}",
            self.pool_id,
            self.source.source_type(),
            self.interval
        );
        let _ = self.run_cycle().await;
        while wait_or_stop(&token, self.interval).await {
            // Failures are logged inside the cycle and retried next tick
            let _ = self.run_cycle().await;
        }
        tracing::info!("Storagepool loop stopped");
        Ok(())
    }

    async fn record(&self, result: std::result::Result<(), &Error>, sent: bool) {
        let Some(status) = &self.status else {
            return;
        };
        let committed = self
            .prev_sent
            .as_ref()
            .map(|hosts| hosts.iter().cloned().collect())
            .unwrap_or_default();
        let mut state = status.write().await;
        let entry = state.storagepool.get_or_insert_with(LoopStatus::new);
        match result {
            Ok(()) => entry.mark_success(committed, sent),
            Err(e) => entry.mark_failure(e, committed),
        }
    }
}
