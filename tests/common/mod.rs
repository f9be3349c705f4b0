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

//! Common test utilities.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use axum::Router;
use tokio::net::TcpListener;

use storage_agent::model::Volume;
use storage_agent::traits::RemoteSink;
use storage_agent::Result;

/// Sink that remembers every call it accepted.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<String>>,
    pub syncs: Mutex<Vec<Vec<String>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn syncs(&self) -> Vec<Vec<String>> {
        self.syncs.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteSink for RecordingSink {
    async fn report_volume_created(&self, _pool_id: &str, volume: &Volume) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(format!("CREATED_{}", volume.name));
        Ok(())
    }

    async fn report_volume_deleted(&self, _pool_id: &str, volume: &Volume) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(format!("DELETED_{}", volume.name));
        Ok(())
    }

    async fn sync_pool_membership(&self, _pool_id: &str, hosts: &[String]) -> Result<()> {
        self.syncs.lock().unwrap().push(hosts.to_vec());
        Ok(())
    }
}

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn spawn_app(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
