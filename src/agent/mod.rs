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

//! Reconciliation loops.
//!
//! Each loop runs as its own tokio task, owns all of its state, and stops
//! when its [`CancellationToken`] is cancelled. [`LoopHandle`] pairs the
//! token with the task so callers can stop a loop and wait until it has
//! actually returned.

pub mod heartbeat;
pub mod storagepool;
pub mod volume;

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use heartbeat::{ensure_root_marker, HeartbeatWriter};
pub use storagepool::PoolReconciler;
pub use volume::VolumeReconciler;

use crate::error::{Error, Result};

/// Sleep for `interval` unless `token` is cancelled first.
///
/// Returns `false` when the loop should stop.
pub(crate) async fn wait_or_stop(token: &CancellationToken, interval: Duration) -> bool {
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(interval) => true,
    }
}

/// A running loop task and the token that stops it.
pub struct LoopHandle {
    name: &'static str,
    token: CancellationToken,
    handle: JoinHandle<Result<()>>,
}

impl LoopHandle {
    pub fn spawn<F>(name: &'static str, token: CancellationToken, task: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            name,
            token,
            handle: tokio::spawn(task),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the loop to stop without waiting for it.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Wait for the loop task to return.
    pub async fn join(self) -> Result<()> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(Error::Io(std::io::Error::other(format!(
                "{} loop task failed: {e}",
                self.name
            )))),
        }
    }

    /// Stop the loop and wait until it has returned.
    pub async fn shutdown(self) -> Result<()> {
        self.stop();
        self.join().await
    }
}

/// Start a volume loop on the runtime.
pub fn spawn_volume_loop(mut reconciler: VolumeReconciler, token: CancellationToken) -> LoopHandle {
    let loop_token = token.clone();
    LoopHandle::spawn("volume", token, async move {
        reconciler.run(loop_token).await
    })
}

/// Start a storage-pool loop on the runtime.
pub fn spawn_pool_loop(mut reconciler: PoolReconciler, token: CancellationToken) -> LoopHandle {
    let loop_token = token.clone();
    LoopHandle::spawn("storagepool", token, async move {
        reconciler.run(loop_token).await
    })
}

/// Start a heartbeat writer on the runtime.
pub fn spawn_heartbeat(writer: HeartbeatWriter, token: CancellationToken) -> LoopHandle {
    let loop_token = token.clone();
    LoopHandle::spawn("heartbeat", token, async move {
        writer.run(loop_token).await
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_or_stop_elapses() {
        let token = CancellationToken::new();
        assert!(wait_or_stop(&token, Duration::from_millis(5)).await);
    }

    #[tokio::test]
    async fn test_wait_or_stop_observes_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(!wait_or_stop(&token, Duration::from_secs(3600)).await);
    }

    #[tokio::test]
    async fn test_loop_handle_shutdown_waits_for_task() {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let handle = LoopHandle::spawn("test", token, async move {
            task_token.cancelled().await;
            Ok(())
        });

        assert_eq!(handle.name(), "test");
        assert!(!handle.is_finished());
        handle.shutdown().await.unwrap();
    }
}
