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

use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storage_agent::agent::{
    ensure_root_marker, spawn_heartbeat, spawn_pool_loop, spawn_volume_loop, HeartbeatWriter,
    LoopHandle, PoolReconciler, VolumeReconciler,
};
use storage_agent::api::run_status_server;
use storage_agent::app_state::{AgentState, SharedState};
use storage_agent::cli::{Cli, Commands, PoolArgs, VolumeArgs};
use storage_agent::network::{OrchestratorClient, StorageDaemonClient};
use storage_agent::snapshot::{create_snapshot_source, HealthCheckKind};
use storage_agent::traits::RemoteSink;
use storage_agent::Result;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let token = CancellationToken::new();
    let state = AgentState::shared();

    let mut handles = match start(&cli, &state, &token).await {
        Ok(handles) => handles,
        Err(e) => {
            tracing::error!("Failed to start agent [{}]: {e}", e.kind());
            std::process::exit(1);
        }
    };

    if let Some(port) = cli.status_port {
        let server_token = token.child_token();
        let server_state = state.clone();
        handles.push(LoopHandle::spawn(
            "status",
            server_token.clone(),
            run_status_server(port, server_state, server_token),
        ));
    }

    wait_for_shutdown().await;
    tracing::info!("Shutting down");
    token.cancel();

    let mut failed = false;
    for handle in handles {
        let name = handle.name();
        if let Err(e) = handle.shutdown().await {
            tracing::error!("{name} task ended with error: {e}");
            failed = true;
        }
    }
    if failed {
        std::process::exit(1);
    }
}

fn init_tracing(debug: bool) {
    let default_filter = if debug {
        "storage_agent=debug,tower_http=debug"
    } else {
        "storage_agent=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn start(
    cli: &Cli,
    state: &SharedState,
    token: &CancellationToken,
) -> Result<Vec<LoopHandle>> {
    let pool_id = cli.storagepool.pool_id()?;
    let sink: Arc<dyn RemoteSink> = Arc::new(OrchestratorClient::new(
        &cli.orchestrator.url,
        cli.orchestrator.credentials(),
        pool_id,
        cli.storagepool.pool_name(),
    )?);

    match &cli.command {
        Commands::Volume(args) => start_volume(cli, args, sink, state, token).await,
        Commands::Storagepool(args) => start_storagepool(cli, args, sink, state, token).await,
    }
}

async fn start_volume(
    cli: &Cli,
    args: &VolumeArgs,
    sink: Arc<dyn RemoteSink>,
    state: &SharedState,
    token: &CancellationToken,
) -> Result<Vec<LoopHandle>> {
    let mut handles = Vec::new();

    let writer = HeartbeatWriter::new(
        args.host_uuid.as_str(),
        &cli.storagepool.healthcheck_basedir,
        cli.storagepool.interval(),
    )?;
    writer.prepare().await?;
    handles.push(spawn_heartbeat(writer, token.child_token()));

    let source = StorageDaemonClient::new(&args.socket);
    let reconciler = VolumeReconciler::new(
        Box::new(source),
        sink,
        cli.storagepool.pool_id()?,
        args.poll_interval(),
    )
    .with_status(state.clone());
    handles.push(spawn_volume_loop(reconciler, token.child_token()));

    Ok(handles)
}

async fn start_storagepool(
    cli: &Cli,
    args: &PoolArgs,
    sink: Arc<dyn RemoteSink>,
    state: &SharedState,
    token: &CancellationToken,
) -> Result<Vec<LoopHandle>> {
    let interval = cli.storagepool.interval();
    let policy = args.staleness_policy(interval)?;
    let pool_id = cli.storagepool.pool_id()?;

    if args.healthcheck_type == HealthCheckKind::File {
        ensure_root_marker(&cli.storagepool.storagepool_rootdir, pool_id).await?;
        tokio::fs::create_dir_all(&cli.storagepool.healthcheck_basedir).await?;
    }

    let source = create_snapshot_source(
        args.healthcheck_type,
        &cli.storagepool.healthcheck_basedir,
        &args.metadata_url,
    )?;
    let reconciler = PoolReconciler::new(source, sink, pool_id, interval)
        .with_staleness_policy(policy)
        .with_status(state.clone());

    Ok(vec![spawn_pool_loop(reconciler, token.child_token())])
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM [{e}]");
                let _ = signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
    }
}
