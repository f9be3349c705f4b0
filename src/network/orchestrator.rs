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

//! REST client for the orchestration backend's external event API.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use url::Url;

use crate::error::{Error, Result};
use crate::model::Volume;
use crate::traits::RemoteSink;

use super::build_http_client;

pub const VOLUME_CREATE_EVENT: &str = "volume.create";
pub const VOLUME_DELETE_EVENT: &str = "volume.delete";
pub const STORAGEPOOL_SYNC_EVENT: &str = "storagepool.create";

#[derive(Debug, Clone, Default)]
pub struct OrchestratorCredentials {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VolumeResource<'a> {
    name: &'a str,
    driver: &'a str,
    driver_opts: &'a BTreeMap<String, String>,
    external_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExternalVolumeEvent<'a> {
    #[serde(rename = "type")]
    resource_type: &'static str,
    event_type: &'static str,
    external_id: &'a str,
    storage_pool_external_id: &'a str,
    volume: VolumeResource<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StoragePoolResource<'a> {
    name: &'a str,
    external_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExternalStoragePoolEvent<'a> {
    #[serde(rename = "type")]
    resource_type: &'static str,
    event_type: &'static str,
    external_id: &'a str,
    host_uuids: &'a [String],
    storage_pool: StoragePoolResource<'a>,
}

/// Posts volume and storage-pool events to the orchestration backend.
pub struct OrchestratorClient {
    client: reqwest::Client,
    base_url: Url,
    credentials: OrchestratorCredentials,
    driver: String,
    storagepool_name: String,
}

impl OrchestratorClient {
    pub fn new(
        base_url: &str,
        credentials: OrchestratorCredentials,
        driver: impl Into<String>,
        storagepool_name: impl Into<String>,
    ) -> Result<Self> {
        if base_url.is_empty() {
            return Err(Error::Configuration(
                "orchestration url is empty".to_string(),
            ));
        }
        let mut base_url = Url::parse(base_url).map_err(|e| {
            Error::Configuration(format!("invalid orchestration url [{base_url}]: {e}"))
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client: build_http_client()?,
            base_url,
            credentials,
            driver: driver.into(),
            storagepool_name: storagepool_name.into(),
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, collection: &str, body: &T) -> Result<()> {
        let url = self
            .base_url
            .join(collection)
            .map_err(|e| Error::SinkUnavailable(format!("invalid collection {collection}: {e}")))?;

        let mut request = self.client.post(url.clone()).json(body);
        if let Some(access_key) = &self.credentials.access_key {
            request = request.basic_auth(access_key, self.credentials.secret_key.as_ref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::SinkUnavailable(format!("POST {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::SinkUnavailable(format!(
                "POST {url}: HTTP {status}: {body}"
            )));
        }
        Ok(())
    }

    async fn send_volume_event(
        &self,
        event_type: &'static str,
        pool_id: &str,
        volume: &Volume,
    ) -> Result<()> {
        let event = ExternalVolumeEvent {
            resource_type: "externalVolumeEvent",
            event_type,
            external_id: &volume.name,
            storage_pool_external_id: pool_id,
            volume: VolumeResource {
                name: &volume.name,
                driver: &self.driver,
                driver_opts: &volume.driver_info,
                external_id: &volume.name,
            },
        };
        self.post("externalvolumeevents", &event).await
    }
}

#[async_trait]
impl RemoteSink for OrchestratorClient {
    async fn report_volume_created(&self, pool_id: &str, volume: &Volume) -> Result<()> {
        tracing::debug!("create event {}", volume.name);
        self.send_volume_event(VOLUME_CREATE_EVENT, pool_id, volume)
            .await
    }

    async fn report_volume_deleted(&self, pool_id: &str, volume: &Volume) -> Result<()> {
        tracing::debug!("delete event {}", volume.name);
        self.send_volume_event(VOLUME_DELETE_EVENT, pool_id, volume)
            .await
    }

    async fn sync_pool_membership(&self, pool_id: &str, host_uuids: &[String]) -> Result<()> {
        tracing::debug!("storagepool event {host_uuids:?}");
        let event = ExternalStoragePoolEvent {
            resource_type: "externalStoragePoolEvent",
            event_type: STORAGEPOOL_SYNC_EVENT,
            external_id: pool_id,
            host_uuids,
            storage_pool: StoragePoolResource {
                name: &self.storagepool_name,
                external_id: pool_id,
            },
        };
        self.post("externalstoragepoolevents", &event).await
    }
}
