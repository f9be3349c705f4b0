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

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{Error, Result};
use crate::model::{Container, Service, Stack};
use crate::traits::MetadataInventory;

use super::build_http_client;

/// HTTP client for the metadata inventory.
///
/// `base_url` points at a versioned API root such as
/// `http://metadata/latest`; every endpoint is resolved relative to it.
pub struct MetadataClient {
    client: reqwest::Client,
    base_url: Url,
}

impl MetadataClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url).map_err(|e| {
            Error::Configuration(format!("invalid metadata url [{base_url}]: {e}"))
        })?;
        // Url::join drops the last path segment unless the base ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client: build_http_client()?,
            base_url,
        })
    }

    async fn get(&self, path: &str, accept: &str) -> Result<reqwest::Response> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| Error::SourceUnavailable(format!("invalid metadata path {path}: {e}")))?;

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, accept)
            .send()
            .await
            .map_err(|e| Error::SourceUnavailable(format!("GET {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::SourceUnavailable(format!(
                "GET {url}: HTTP {}",
                response.status()
            )));
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get(path, "application/json")
            .await?
            .json::<T>()
            .await
            .map_err(|e| Error::SourceUnavailable(format!("malformed metadata {path}: {e}")))
    }
}

#[async_trait]
impl MetadataInventory for MetadataClient {
    async fn get_version(&self) -> Result<String> {
        let text = self
            .get("version", "text/plain")
            .await?
            .text()
            .await
            .map_err(|e| Error::SourceUnavailable(format!("malformed metadata version: {e}")))?;
        Ok(text.trim().trim_matches('"').to_string())
    }

    async fn get_self_stack(&self) -> Result<Stack> {
        self.get_json("self/stack").await
    }

    async fn get_services(&self) -> Result<Vec<Service>> {
        self.get_json("services").await
    }

    async fn get_containers(&self) -> Result<Vec<Container>> {
        self.get_json("containers").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = MetadataClient::new("http://metadata/2015-07-25").unwrap();
        assert_eq!(
            client.base_url.join("self/stack").unwrap().as_str(),
            "http://metadata/2015-07-25/self/stack"
        );
    }

    #[test]
    fn test_invalid_url_is_configuration_error() {
        let err = MetadataClient::new("metadata without scheme").err().unwrap();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
