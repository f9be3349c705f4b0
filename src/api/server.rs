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

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::api::handlers::{healthz_handler, status_handler};
use crate::app_state::SharedState;
use crate::error::Result;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the status endpoint on `0.0.0.0:port` until `token` is cancelled.
pub async fn run_status_server(
    port: u16,
    state: SharedState,
    token: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(&format!("0.0.0.0:{port}")).await?;
    match listener.local_addr() {
        Ok(addr) => tracing::info!("Status server listening on {addr}"),
        Err(_) => tracing::info!("Status server listening on port {port}"),
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;
    tracing::info!("Status server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::{AgentState, LoopStatus};

    async fn serve(state: SharedState) -> (String, CancellationToken) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let token = CancellationToken::new();
        let shutdown = token.clone();
        tokio::spawn(async move {
            axum::serve(listener, router(state))
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
                .unwrap();
        });
        (format!("http://{addr}"), token)
    }

    #[tokio::test]
    async fn test_status_reports_loop_state() {
        let state = AgentState::shared();
        {
            let mut guard = state.write().await;
            let mut status = LoopStatus::new();
            status.mark_success(vec!["host-1".to_string()], true);
            guard.storagepool = Some(status);
        }
        let (base, token) = serve(state).await;

        let body: serde_json::Value = reqwest::get(format!("{base}/status"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["storagepool"]["last_outcome"], "ok");
        assert_eq!(body["storagepool"]["committed"][0], "host-1");
        assert!(body["volume"].is_null());

        let health = reqwest::get(format!("{base}/healthz"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(health, "ok");
        token.cancel();
    }
}
