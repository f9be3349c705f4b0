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

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::common::config::{AppConfig, StalenessPolicy};
use crate::error::{Error, Result};
use crate::network::OrchestratorCredentials;
use crate::snapshot::HealthCheckKind;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(flatten)]
    pub orchestrator: OrchestratorArgs,

    #[command(flatten)]
    pub storagepool: StoragePoolArgs,

    /// Serve loop status over HTTP on this port. Disabled when unset.
    #[arg(long, global = true, env = "STORAGE_AGENT_STATUS_PORT")]
    pub status_port: Option<u16>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Report storage-daemon volume changes to the orchestration backend.
    #[command(visible_alias = "v")]
    Volume(VolumeArgs),
    /// Keep the storage-pool host membership current.
    #[command(visible_alias = "sp")]
    Storagepool(PoolArgs),
}

#[derive(Args, Clone)]
pub struct OrchestratorArgs {
    /// Base URL of the orchestration backend API.
    #[arg(long, global = true, env = "ORCHESTRATOR_URL", default_value = "")]
    pub url: String,
    /// Access key for the orchestration backend.
    #[arg(long, global = true, env = "ORCHESTRATOR_ACCESS_KEY")]
    pub access_key: Option<String>,
    /// Secret key for the orchestration backend.
    #[arg(long, global = true, env = "ORCHESTRATOR_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,
}

impl OrchestratorArgs {
    pub fn credentials(&self) -> OrchestratorCredentials {
        OrchestratorCredentials {
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
        }
    }
}

#[derive(Args, Clone)]
pub struct StoragePoolArgs {
    /// Interval in seconds between heartbeats and pool health checks.
    #[arg(
        long,
        global = true,
        default_value_t = AppConfig::DEFAULT_HEALTHCHECK_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub healthcheck_interval: u64,
    /// Directory holding one heartbeat file per pool host.
    #[arg(long, global = true, default_value = AppConfig::DEFAULT_HEALTHCHECK_BASEDIR)]
    pub healthcheck_basedir: PathBuf,
    /// Directory holding the storage-pool root marker.
    #[arg(long, global = true, default_value = AppConfig::DEFAULT_STORAGEPOOL_ROOTDIR)]
    pub storagepool_rootdir: PathBuf,
    /// Storage driver name, also used as the storage-pool identifier.
    #[arg(long, global = true, env = "STORAGEPOOL_DRIVER", default_value = "")]
    pub storagepool_driver: String,
    /// Display name of the storage pool. Defaults to the driver name.
    #[arg(long, global = true, env = "STORAGEPOOL_NAME")]
    pub storagepool_name: Option<String>,
}

impl StoragePoolArgs {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.healthcheck_interval)
    }

    pub fn pool_id(&self) -> Result<&str> {
        if self.storagepool_driver.is_empty() {
            return Err(Error::Configuration(
                "storage pool driver is required".to_string(),
            ));
        }
        Ok(&self.storagepool_driver)
    }

    pub fn pool_name(&self) -> &str {
        self.storagepool_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.storagepool_driver)
    }
}

#[derive(Args, Clone)]
pub struct VolumeArgs {
    /// Unix socket of the local storage daemon.
    #[arg(long, default_value = AppConfig::DEFAULT_DAEMON_SOCKET)]
    pub socket: PathBuf,
    /// UUID of this host, used as its heartbeat file name.
    #[arg(long, env = "HOST_UUID")]
    pub host_uuid: String,
    /// Interval in milliseconds between volume polls.
    #[arg(
        long,
        default_value_t = AppConfig::DEFAULT_VOLUME_POLL_INTERVAL_MS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_interval_ms: u64,
}

impl VolumeArgs {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StalePolicyKind {
    /// Count cycles without a heartbeat change
    Cycles,
    /// Compare the heartbeat timestamp against a maximum age
    Elapsed,
}

#[derive(Args, Clone)]
pub struct PoolArgs {
    /// Where pool host liveness comes from.
    #[arg(long, value_enum, default_value_t = HealthCheckKind::File)]
    pub healthcheck_type: HealthCheckKind,
    /// Base URL of the metadata inventory.
    #[arg(long, env = "METADATA_URL", default_value = AppConfig::DEFAULT_METADATA_URL)]
    pub metadata_url: String,
    /// How a heartbeat file is judged stale.
    #[arg(long, value_enum, default_value_t = StalePolicyKind::Cycles)]
    pub stale_policy: StalePolicyKind,
    /// Cycles without change, or health-check intervals of age, before a host is stale.
    #[arg(long, default_value_t = AppConfig::DEFAULT_STALE_THRESHOLD)]
    pub stale_threshold: u32,
}

impl PoolArgs {
    pub fn staleness_policy(&self, interval: Duration) -> Result<StalenessPolicy> {
        if self.stale_threshold == 0 {
            return Err(Error::Configuration(
                "stale threshold must be at least 1".to_string(),
            ));
        }
        Ok(match self.stale_policy {
            StalePolicyKind::Cycles => StalenessPolicy::Cycles(self.stale_threshold),
            StalePolicyKind::Elapsed => {
                StalenessPolicy::elapsed_intervals(interval, self.stale_threshold).ok_or_else(
                    || {
                        Error::Configuration(format!(
                            "stale threshold of {} intervals of {interval:?} is too large",
                            self.stale_threshold
                        ))
                    },
                )?
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_storagepool_subcommand() {
        let cli = Cli::try_parse_from([
            "storage-agent",
            "--storagepool-driver",
            "nfs",
            "sp",
            "--healthcheck-type",
            "metadata",
        ])
        .unwrap();

        assert_eq!(cli.storagepool.pool_id().unwrap(), "nfs");
        assert_eq!(cli.storagepool.pool_name(), "nfs");
        match cli.command {
            Commands::Storagepool(args) => {
                assert_eq!(args.healthcheck_type, HealthCheckKind::Metadata);
                assert_eq!(
                    args.staleness_policy(cli.storagepool.interval()).unwrap(),
                    StalenessPolicy::Cycles(3)
                );
            }
            Commands::Volume(_) => panic!("expected storagepool command"),
        }
    }

    #[test]
    fn test_parses_volume_subcommand_defaults() {
        let cli =
            Cli::try_parse_from(["storage-agent", "volume", "--host-uuid", "host-1"]).unwrap();
        match cli.command {
            Commands::Volume(args) => {
                assert_eq!(args.host_uuid, "host-1");
                assert_eq!(args.poll_interval(), Duration::from_secs(1));
                assert_eq!(args.socket, PathBuf::from(AppConfig::DEFAULT_DAEMON_SOCKET));
            }
            Commands::Storagepool(_) => panic!("expected volume command"),
        }
    }

    #[test]
    fn test_unknown_healthcheck_type_is_rejected() {
        let result = Cli::try_parse_from(["storage-agent", "sp", "--healthcheck-type", "dns"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_elapsed_policy_scales_with_interval() {
        let cli = Cli::try_parse_from([
            "storage-agent",
            "--healthcheck-interval",
            "2",
            "sp",
            "--stale-policy",
            "elapsed",
            "--stale-threshold",
            "4",
        ])
        .unwrap();
        let Commands::Storagepool(args) = cli.command else {
            panic!("expected storagepool command");
        };
        assert_eq!(
            args.staleness_policy(cli.storagepool.interval()).unwrap(),
            StalenessPolicy::Elapsed(Duration::from_secs(8))
        );
    }

    #[test]
    fn test_missing_driver_is_configuration_error() {
        let cli = Cli::try_parse_from(["storage-agent", "sp"]).unwrap();
        assert!(matches!(
            cli.storagepool.pool_id(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_volume_requires_host_uuid() {
        let result = Cli::try_parse_from([
            "storage-agent",
            "--storagepool-driver",
            "nfs",
            "--url",
            "http://orchestrator/v1",
            "v",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_intervals_are_rejected() {
        let zero_healthcheck = Cli::try_parse_from([
            "storage-agent",
            "--healthcheck-interval",
            "0",
            "sp",
        ]);
        assert!(zero_healthcheck.is_err());

        let zero_poll = Cli::try_parse_from([
            "storage-agent",
            "v",
            "--host-uuid",
            "host-1",
            "--poll-interval-ms",
            "0",
        ]);
        assert!(zero_poll.is_err());
    }

    #[test]
    fn test_overflowing_elapsed_threshold_is_configuration_error() {
        let cli = Cli::try_parse_from([
            "storage-agent",
            "--healthcheck-interval",
            "18446744073709551615",
            "sp",
            "--stale-policy",
            "elapsed",
        ])
        .unwrap();
        let Commands::Storagepool(args) = cli.command else {
            panic!("expected storagepool command");
        };
        assert!(matches!(
            args.staleness_policy(cli.storagepool.interval()),
            Err(Error::Configuration(_))
        ));
    }
}
