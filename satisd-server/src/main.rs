//! # satisd
//!
//! Dynamic satis repository generator daemon.
//!
//! Package publishers call `/register`; registrations are merged into the
//! satis configuration, satis rebuilds the repository, and the result is
//! served from the same listener.

use anyhow::Context;
use clap::Parser;
use satisd_server::{
    Cli, Daemon,
    infra::{config::load_env_file, supervisor::shutdown_signal},
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_file_loaded =
        load_env_file().context("failed to load .env file")?;
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("satisd - dynamic satis repository generator daemon");
    if env_file_loaded {
        info!("loaded .env file");
    }

    let config = cli.into_config().context("invalid --listen address")?;
    info!(
        satis = %config.builder_path.display(),
        config = %config.config_path.display(),
        repo = %config.output_path.display(),
        listen = %config.listen,
        failure_policy = ?config.build.failure_policy,
        "configuration in effect"
    );

    let daemon = Daemon::bind(config).await?;
    daemon.run_until(shutdown_signal()).await
}
