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

//! Client for the local storage daemon's HTTP API, served on a Unix socket.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::header::{ACCEPT, HOST};
use hyper::{Method, Request};
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;

use crate::common::config::AppConfig;
use crate::error::{Error, Result};
use crate::model::{Volume, VolumeMap};
use crate::traits::VolumeSource;

pub const LIST_VOLUMES_PATH: &str = "/v1/volumes/list";

pub struct StorageDaemonClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl StorageDaemonClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout: Duration::from_secs(AppConfig::CONNECTION_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn get(&self, path: &str) -> Result<Bytes> {
        match tokio::time::timeout(self.timeout, self.exchange(path)).await {
            Ok(result) => result,
            Err(_) => Err(Error::SourceUnavailable(format!(
                "GET {path}: no response from {} within {:?}",
                self.socket_path.display(),
                self.timeout
            ))),
        }
    }

    async fn exchange(&self, path: &str) -> Result<Bytes> {
        let unavailable = |e: &dyn std::fmt::Display| {
            Error::SourceUnavailable(format!(
                "GET {path} on {}: {e}",
                self.socket_path.display()
            ))
        };

        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| unavailable(&e))?;
        let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| unavailable(&e))?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!("storage daemon connection closed: {e}");
            }
        });

        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .header(HOST, "localhost")
            .header(ACCEPT, "application/json")
            .body(Empty::<Bytes>::new())
            .map_err(|e| unavailable(&e))?;

        let response = sender
            .send_request(request)
            .await
            .map_err(|e| unavailable(&e))?;
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| unavailable(&e))?
            .to_bytes();

        if !status.is_success() {
            return Err(unavailable(&format!(
                "HTTP {status}: {}",
                String::from_utf8_lossy(&body)
            )));
        }
        Ok(body)
    }
}

/// Re-key the daemon's UUID-keyed listing by volume name.
///
/// A volume without a name keeps its daemon key so it stays addressable.
pub fn volumes_by_name(listing: HashMap<String, Volume>) -> VolumeMap {
    listing
        .into_iter()
        .map(|(key, mut volume)| {
            if volume.name.is_empty() {
                volume.name = key;
            }
            (volume.name.clone(), volume)
        })
        .collect()
}

#[async_trait]
impl VolumeSource for StorageDaemonClient {
    async fn list_volumes(&self) -> Result<VolumeMap> {
        let body = self.get(LIST_VOLUMES_PATH).await?;
        let listing: HashMap<String, Volume> = serde_json::from_slice(&body).map_err(|e| {
            Error::SourceUnavailable(format!("malformed volume listing: {e}"))
        })?;
        Ok(volumes_by_name(listing))
    }
}
