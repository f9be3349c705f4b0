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

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::Error;

pub type SharedState = Arc<RwLock<AgentState>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Nothing ran yet
    Pending,
    Ok,
    SourceUnavailable,
    SinkUnavailable,
}

/// Last observed state of one reconciliation loop.
#[derive(Debug, Clone, Serialize)]
pub struct LoopStatus {
    pub cycles: u64,
    pub last_outcome: CycleOutcome,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub last_cycle: Option<DateTime<Utc>>,
    pub last_successful_send: Option<DateTime<Utc>>,
    /// Volume names or host UUIDs in the committed baseline
    pub committed: Vec<String>,
}

impl LoopStatus {
    pub fn new() -> Self {
        Self {
            cycles: 0,
            last_outcome: CycleOutcome::Pending,
            last_error: None,
            consecutive_failures: 0,
            last_cycle: None,
            last_successful_send: None,
            committed: Vec::new(),
        }
    }

    pub fn mark_success(&mut self, committed: Vec<String>, sent: bool) {
        let now = Utc::now();
        self.cycles += 1;
        self.last_outcome = CycleOutcome::Ok;
        self.last_error = None;
        self.consecutive_failures = 0;
        self.last_cycle = Some(now);
        if sent {
            self.last_successful_send = Some(now);
        }
        self.committed = committed;
    }

    pub fn mark_failure(&mut self, error: &Error, committed: Vec<String>) {
        self.cycles += 1;
        self.last_outcome = match error {
            Error::SinkUnavailable(_) => CycleOutcome::SinkUnavailable,
            _ => CycleOutcome::SourceUnavailable,
        };
        self.last_error = Some(error.to_string());
        self.consecutive_failures += 1;
        self.last_cycle = Some(Utc::now());
        self.committed = committed;
    }
}

impl Default for LoopStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Status of every loop running in this process.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentState {
    pub volume: Option<LoopStatus>,
    pub storagepool: Option<LoopStatus>,
}

impl AgentState {
    pub fn shared() -> SharedState {
        Arc::new(RwLock::new(Self::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_success_resets_failures() {
        let mut status = LoopStatus::new();
        status.mark_failure(
            &Error::SourceUnavailable("down".to_string()),
            Vec::new(),
        );
        status.mark_failure(&Error::SinkUnavailable("down".to_string()), Vec::new());
        assert_eq!(status.consecutive_failures, 2);
        assert_eq!(status.last_outcome, CycleOutcome::SinkUnavailable);

        status.mark_success(vec!["vol1".to_string()], true);
        assert_eq!(status.cycles, 3);
        assert_eq!(status.consecutive_failures, 0);
        assert_eq!(status.last_outcome, CycleOutcome::Ok);
        assert!(status.last_error.is_none());
        assert!(status.last_successful_send.is_some());
        assert_eq!(status.committed, vec!["vol1".to_string()]);
    }

    #[test]
    fn test_status_serializes_outcome_in_snake_case() {
        let mut state = AgentState::default();
        let mut status = LoopStatus::new();
        status.mark_failure(&Error::SourceUnavailable("x".to_string()), Vec::new());
        state.volume = Some(status);

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["volume"]["last_outcome"], "source_unavailable");
        assert!(json["storagepool"].is_null());
    }
}
