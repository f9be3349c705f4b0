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
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::app_state::{LoopStatus, SharedState};
use crate::error::{Error, Result};
use crate::model::VolumeMap;
use crate::traits::{RemoteSink, VolumeSource};

use super::wait_or_stop;

/// Entries of `base` whose name is absent from `other`.
pub fn missing_from(base: &VolumeMap, other: &VolumeMap) -> VolumeMap {
    base.iter()
        .filter(|(name, _)| !other.contains_key(*name))
        .map(|(name, vol)| (name.clone(), vol.clone()))
        .collect()
}

/// Keeps the orchestration backend's volume list in step with the daemon.
///
/// The committed map is what the backend is known to have. It starts empty,
/// so the first successful cycle reports every volume as created.
pub struct VolumeReconciler {
    source: Box<dyn VolumeSource>,
    sink: Arc<dyn RemoteSink>,
    pool_id: String,
    interval: Duration,
    committed: VolumeMap,
    status: Option<SharedState>,
}

impl VolumeReconciler {
    pub fn new(
        source: Box<dyn VolumeSource>,
        sink: Arc<dyn RemoteSink>,
        pool_id: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            sink,
            pool_id: pool_id.into(),
            interval,
            committed: VolumeMap::new(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: SharedState) -> Self {
        self.status = Some(status);
        self
    }

    pub fn committed(&self) -> &VolumeMap {
        &self.committed
    }

    /// Run one sample, diff, report, commit pass.
    ///
    /// Returns the first error seen. A source error leaves the committed map
    /// untouched. Sink errors are applied per volume: a failed delete stays
    /// committed so it is reported again, a failed create is left out so it
    /// shows up as created again.
    pub async fn run_cycle(&mut self) -> Result<()> {
        let current = match self.source.list_volumes().await {
            Ok(volumes) => volumes,
            Err(e) => {
                tracing::error!("Error listing volumes: {e}");
                self.record(Err(&e), false).await;
                return Err(e);
            }
        };

        let deleted = missing_from(&self.committed, &current);
        let created = missing_from(&current, &self.committed);
        let mut next = current;
        let mut first_error = None;

        for (name, vol) in deleted {
            if let Err(e) = self.sink.report_volume_deleted(&self.pool_id, &vol).await {
                tracing::error!("Error sending delete event for volume [{name}] err=[{e}]");
                next.insert(name, vol);
                first_error.get_or_insert(e);
            } else {
                tracing::info!("Reported volume [{name}] deleted");
            }
        }

        for (name, vol) in created {
            if let Err(e) = self.sink.report_volume_created(&self.pool_id, &vol).await {
                tracing::error!("Error sending create event for volume [{name}] err=[{e}]");
                next.remove(&name);
                first_error.get_or_insert(e);
            } else {
                tracing::info!("Reported volume [{name}] created");
            }
        }

        self.committed = next;
        match first_error {
            Some(e) => {
                self.record(Err(&e), false).await;
                Err(e)
            }
            None => {
                self.record(Ok(()), true).await;
                Ok(())
            }
        }
    }

    /// Poll until `token` is cancelled.
    pub async fn run(&mut self, token: CancellationToken) -> Result<()> {
        tracing::info!(
            "Starting volume loop for pool [{}] every {:?}",
            self.pool_id,
            self.interval
        );
        while wait_or_stop(&token, self.interval).await {
            // Failures are logged inside the cycle and retried next tick
            let _ = self.run_cycle().await;
        }
        tracing::info!("Volume loop stopped");
        Ok(())
    }

    async fn record(&self, result: std::result::Result<(), &Error>, sent: bool) {
        let Some(status) = &self.status else {
            return;
        };
        let committed = self.committed.keys().cloned().collect();
        let mut state = status.write().await;
        let entry = state.volume.get_or_insert_with(LoopStatus::new);
        match result {
            Ok(()) => entry.mark_success(committed, sent),
            Err(e) => entry.mark_failure(e, committed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Volume;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn volumes(names: &[&str]) -> VolumeMap {
        names
            .iter()
            .map(|n| (n.to_string(), Volume::named(*n)))
            .collect()
    }

    struct ScriptedSource {
        snapshots: Mutex<VecDeque<Result<VolumeMap>>>,
    }

    #[async_trait]
    impl VolumeSource for ScriptedSource {
        async fn list_volumes(&self) -> Result<VolumeMap> {
            // The last scripted answer repeats forever
            let mut snapshots = self.snapshots.lock().unwrap();
            if snapshots.len() > 1 {
                return snapshots.pop_front().unwrap();
            }
            match snapshots.front() {
                Some(Ok(volumes)) => Ok(volumes.clone()),
                Some(Err(e)) => Err(Error::SourceUnavailable(e.to_string())),
                None => Ok(VolumeMap::new()),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<String>>,
        fail_creates: Mutex<Vec<String>>,
        fail_deletes: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RemoteSink for RecordingSink {
        async fn report_volume_created(&self, _pool_id: &str, volume: &Volume) -> Result<()> {
            let mut failing = self.fail_creates.lock().unwrap();
            if let Some(pos) = failing.iter().position(|n| *n == volume.name) {
                failing.remove(pos);
                return Err(Error::SinkUnavailable("create rejected".to_string()));
            }
            self.events
                .lock()
                .unwrap()
                .push(format!("CREATED_{}", volume.name));
            Ok(())
        }

        async fn report_volume_deleted(&self, _pool_id: &str, volume: &Volume) -> Result<()> {
            let mut failing = self.fail_deletes.lock().unwrap();
            if let Some(pos) = failing.iter().position(|n| *n == volume.name) {
                failing.remove(pos);
                return Err(Error::SinkUnavailable("delete rejected".to_string()));
            }
            self.events
                .lock()
                .unwrap()
                .push(format!("DELETED_{}", volume.name));
            Ok(())
        }

        async fn sync_pool_membership(&self, _pool_id: &str, _hosts: &[String]) -> Result<()> {
            Ok(())
        }
    }

    impl RecordingSink {
        fn take_events(&self) -> Vec<String> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }
    }

    fn reconciler(snapshots: Vec<Result<VolumeMap>>, sink: Arc<RecordingSink>) -> VolumeReconciler {
        VolumeReconciler::new(
            Box::new(ScriptedSource {
                snapshots: Mutex::new(snapshots.into()),
            }),
            sink,
            "pool",
            Duration::from_millis(10),
        )
    }

    #[test]
    fn test_missing_from() {
        let a = volumes(&["a", "b"]);
        let b = volumes(&["b", "c"]);
        assert_eq!(missing_from(&a, &b), volumes(&["a"]));
        assert_eq!(missing_from(&b, &a), volumes(&["c"]));
        assert!(missing_from(&a, &a).is_empty());
    }

    #[tokio::test]
    async fn test_creates_then_diffs_by_name() {
        let sink = Arc::new(RecordingSink::default());
        let mut rec = reconciler(
            vec![Ok(volumes(&["A", "B"])), Ok(volumes(&["B", "C"]))],
            sink.clone(),
        );

        rec.run_cycle().await.unwrap();
        assert_eq!(sink.take_events(), vec!["CREATED_A", "CREATED_B"]);

        rec.run_cycle().await.unwrap();
        assert_eq!(sink.take_events(), vec!["DELETED_A", "CREATED_C"]);
        assert_eq!(rec.committed(), &volumes(&["B", "C"]));
    }

    #[tokio::test]
    async fn test_attribute_change_is_not_an_event() {
        let sink = Arc::new(RecordingSink::default());
        let mut changed = volumes(&["A"]);
        changed.get_mut("A").unwrap().mount_point = "/mnt/a".to_string();
        let mut rec = reconciler(vec![Ok(volumes(&["A"])), Ok(changed)], sink.clone());

        rec.run_cycle().await.unwrap();
        rec.run_cycle().await.unwrap();
        assert_eq!(sink.take_events(), vec!["CREATED_A"]);
    }

    #[tokio::test]
    async fn test_source_failure_keeps_committed_state() {
        let sink = Arc::new(RecordingSink::default());
        let mut rec = reconciler(
            vec![
                Ok(volumes(&["A"])),
                Err(Error::SourceUnavailable("daemon down".to_string())),
                Ok(volumes(&["A"])),
            ],
            sink.clone(),
        );

        rec.run_cycle().await.unwrap();
        let err = rec.run_cycle().await.unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable(_)));
        assert_eq!(rec.committed(), &volumes(&["A"]));

        rec.run_cycle().await.unwrap();
        assert_eq!(sink.take_events(), vec!["CREATED_A"]);
    }

    #[tokio::test]
    async fn test_failed_create_is_retried() {
        let sink = Arc::new(RecordingSink::default());
        sink.fail_creates.lock().unwrap().push("A".to_string());
        let mut rec = reconciler(
            vec![Ok(volumes(&["A"])), Ok(volumes(&["A"]))],
            sink.clone(),
        );

        assert!(rec.run_cycle().await.is_err());
        assert!(rec.committed().is_empty());
        assert!(sink.take_events().is_empty());

        rec.run_cycle().await.unwrap();
        assert_eq!(sink.take_events(), vec!["CREATED_A"]);
    }

    #[tokio::test]
    async fn test_failed_delete_is_retried_without_recreate() {
        let sink = Arc::new(RecordingSink::default());
        let mut rec = reconciler(
            vec![
                Ok(volumes(&["A"])),
                Ok(volumes(&[])),
                Ok(volumes(&[])),
            ],
            sink.clone(),
        );

        rec.run_cycle().await.unwrap();
        sink.take_events();

        sink.fail_deletes.lock().unwrap().push("A".to_string());
        assert!(rec.run_cycle().await.is_err());
        assert_eq!(rec.committed(), &volumes(&["A"]));
        assert!(sink.take_events().is_empty());

        rec.run_cycle().await.unwrap();
        assert_eq!(sink.take_events(), vec!["DELETED_A"]);
        assert!(rec.committed().is_empty());
    }

    #[tokio::test]
    async fn test_status_tracks_committed_volumes() {
        let sink = Arc::new(RecordingSink::default());
        let state = crate::app_state::AgentState::shared();
        let mut rec = reconciler(vec![Ok(volumes(&["A"]))], sink).with_status(state.clone());

        rec.run_cycle().await.unwrap();

        let state = state.read().await;
        let status = state.volume.as_ref().unwrap();
        assert_eq!(status.cycles, 1);
        assert_eq!(status.committed, vec!["A".to_string()]);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let sink = Arc::new(RecordingSink::default());
        let mut rec = reconciler(vec![Ok(volumes(&["A"]))], sink.clone());
        let token = CancellationToken::new();
        let stopper = token.clone();

        let task = tokio::spawn(async move {
            rec.run(token).await.unwrap();
            rec
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        stopper.cancel();

        let rec = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rec.committed(), &volumes(&["A"]));
        assert_eq!(sink.take_events(), vec!["CREATED_A"]);
    }
}
