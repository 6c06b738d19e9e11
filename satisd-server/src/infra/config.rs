use std::{
    net::{SocketAddr, ToSocketAddrs},
    path::PathBuf,
    time::Duration,
};

use clap::{Parser, ValueEnum};
use satisd_core::{BuildFailurePolicy, BuildWorkerConfig, MergeWorkerConfig};
use thiserror::Error;

/// CLI entry point
#[derive(Parser, Debug, Clone)]
#[command(name = "satisd")]
#[command(about = "satisd - dynamic satis repository generator daemon")]
pub struct Cli {
    /// The path to the satis binary
    #[arg(long = "satis", visible_alias = "builder", env = "SATISD_SATIS")]
    pub satis: PathBuf,

    /// The path to the satis repo configuration file
    #[arg(long, env = "SATISD_CONFIG")]
    pub config: PathBuf,

    /// The path to the satis repository (build output directory)
    #[arg(long, visible_alias = "output", env = "SATISD_REPO")]
    pub repo: PathBuf,

    /// The address to listen on; a bare `:port` listens on all interfaces
    #[arg(long, env = "SATISD_LISTEN", default_value = ":8080")]
    pub listen: String,

    /// Longest idle wait before a worker re-checks its trigger
    #[arg(long, env = "SATISD_POLL_INTERVAL", default_value = "1s", value_parser = humantime::parse_duration)]
    pub poll_interval: Duration,

    /// Delay before retrying a failed configuration read or write
    #[arg(long, env = "SATISD_RETRY_DELAY", default_value = "5s", value_parser = humantime::parse_duration)]
    pub retry_delay: Duration,

    /// First delay before retrying a failed build
    #[arg(long, env = "SATISD_BUILD_BACKOFF", default_value = "1s", value_parser = humantime::parse_duration)]
    pub build_backoff: Duration,

    /// Upper bound for the build retry delay
    #[arg(long, env = "SATISD_BUILD_BACKOFF_MAX", default_value = "5m", value_parser = humantime::parse_duration)]
    pub build_backoff_max: Duration,

    /// What to do when satis exits with an error
    #[arg(long, env = "SATISD_ON_BUILD_FAILURE", value_enum, default_value_t = FailurePolicyArg::Retry)]
    pub on_build_failure: FailurePolicyArg,

    /// Kill a running satis build when the daemon is asked to stop
    #[arg(long, env = "SATISD_TERMINATE_BUILDER_ON_SHUTDOWN", default_value_t = false)]
    pub terminate_builder_on_shutdown: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FailurePolicyArg {
    /// Log, keep the rebuild requested and retry with exponential backoff
    Retry,
    /// Shut the daemon down with a non-zero exit status
    Exit,
}

impl From<FailurePolicyArg> for BuildFailurePolicy {
    fn from(value: FailurePolicyArg) -> Self {
        match value {
            FailurePolicyArg::Retry => BuildFailurePolicy::Retry,
            FailurePolicyArg::Exit => BuildFailurePolicy::Exit,
        }
    }
}

/// Validated runtime settings.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub builder_path: PathBuf,
    pub config_path: PathBuf,
    pub output_path: PathBuf,
    pub listen: SocketAddr,
    pub merge: MergeWorkerConfig,
    pub build: BuildWorkerConfig,
    pub terminate_builder_on_shutdown: bool,
}

impl Cli {
    pub fn into_config(self) -> Result<DaemonConfig, ListenAddrError> {
        let listen = parse_listen_addr(&self.listen)?;

        Ok(DaemonConfig {
            builder_path: self.satis,
            config_path: self.config,
            output_path: self.repo,
            listen,
            merge: MergeWorkerConfig {
                poll_interval: self.poll_interval,
                retry_delay: self.retry_delay,
            },
            build: BuildWorkerConfig {
                poll_interval: self.poll_interval,
                backoff_initial: self.build_backoff,
                backoff_max: self.build_backoff_max,
                failure_policy: self.on_build_failure.into(),
            },
            terminate_builder_on_shutdown: self.terminate_builder_on_shutdown,
        })
    }
}

#[derive(Debug, Error)]
pub enum ListenAddrError {
    #[error("invalid listen address '{addr}'")]
    Invalid {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("listen address '{addr}' did not resolve")]
    Unresolved { addr: String },
}

/// Accepts `host:port`, `ip:port`, and the host-less `:port` form, which
/// binds every interface.
pub fn parse_listen_addr(raw: &str) -> Result<SocketAddr, ListenAddrError> {
    let trimmed = raw.trim();
    let candidate = if trimmed.starts_with(':') {
        format!("0.0.0.0{trimmed}")
    } else {
        trimmed.to_string()
    };

    if let Ok(addr) = candidate.parse::<SocketAddr>() {
        return Ok(addr);
    }

    candidate
        .to_socket_addrs()
        .map_err(|source| ListenAddrError::Invalid {
            addr: raw.to_string(),
            source,
        })?
        .next()
        .ok_or_else(|| ListenAddrError::Unresolved {
            addr: raw.to_string(),
        })
}

/// Loads `.env` from the working directory if present. Returns whether a
/// file was loaded.
pub fn load_env_file() -> Result<bool, dotenvy::Error> {
    dotenvy::dotenv().map(|_| true).or_else(|err| match err {
        dotenvy::Error::Io(_) => Ok(false),
        _ => Err(err),
    })
}
