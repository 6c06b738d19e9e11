use std::{future::Future, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use satisd_core::{BuildWorker, Builder, MergeWorker, Pipeline};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    infra::{app_state::AppState, config::DaemonConfig, startup, supervisor::Supervisor},
    routes::create_app,
};

/// A validated daemon with its listener bound, ready to run.
#[derive(Debug)]
pub struct Daemon {
    config: DaemonConfig,
    pipeline: Arc<Pipeline>,
    listener: TcpListener,
}

impl Daemon {
    pub async fn bind(config: DaemonConfig) -> anyhow::Result<Self> {
        let document = startup::validate(&config)
            .await
            .context("startup validation failed")?;
        let pipeline = Arc::new(Pipeline::new(document));

        let listener = TcpListener::bind(config.listen)
            .await
            .with_context(|| format!("failed to bind {}", config.listen))?;

        Ok(Self {
            config,
            pipeline,
            listener,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn pipeline(&self) -> Arc<Pipeline> {
        Arc::clone(&self.pipeline)
    }

    /// Runs the merge worker, the build worker and the HTTP surface until
    /// `shutdown` resolves or one of them fails.
    pub async fn run_until<S>(self, shutdown: S) -> anyhow::Result<()>
    where
        S: Future<Output = ()>,
    {
        let Self {
            config,
            pipeline,
            listener,
        } = self;

        let supervisor = Supervisor::new();

        let merge = MergeWorker::new(Arc::clone(&pipeline), config.merge.clone());
        let cancel = supervisor.cancellation();
        supervisor.spawn("config-merge", async move {
            merge.run(cancel).await;
            Ok(())
        });

        let builder = Builder::new(
            &config.builder_path,
            &config.config_path,
            &config.output_path,
        )
        .terminate_on_shutdown(config.terminate_builder_on_shutdown);
        let build =
            BuildWorker::new(Arc::clone(&pipeline), builder, config.build.clone());
        let cancel = supervisor.cancellation();
        supervisor.spawn("build", async move {
            build.run(cancel).await.context("build worker failed")
        });

        let router = create_app(AppState::new(
            Arc::clone(&pipeline),
            &config.output_path,
        ));
        let cancel = supervisor.cancellation();
        supervisor.spawn("http", serve_http(listener, router, cancel));

        let result = supervisor.run_until(shutdown).await;

        let dropped = pipeline.registry().len();
        if dropped > 0 {
            warn!(dropped, "discarding registered updates that were never merged");
        }
        if pipeline.triggers().rebuild.is_armed() {
            warn!("a requested rebuild did not run before shutdown");
        }
        info!("satisd stopped");

        result
    }
}

async fn serve_http(
    listener: TcpListener,
    router: Router,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "listening");
    warn!(
        "control endpoints have no authentication, rate limiting or body size limits; \
         keep satisd behind a trusted network boundary"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .context("HTTP listener error")
}
