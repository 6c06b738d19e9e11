#![cfg(unix)]

use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use satisd_core::{BuildFailurePolicy, BuildWorkerConfig, MergeWorkerConfig};
use satisd_server::{Daemon, DaemonConfig};
use serde_json::Value;
use tokio::sync::oneshot;

mod support;
use support::{EMPTY_DOCUMENT, fake_satis};

fn daemon_config(dir: &Path, builder: PathBuf) -> DaemonConfig {
    let config_path = dir.join("satis.json");
    std::fs::write(&config_path, EMPTY_DOCUMENT).unwrap();

    DaemonConfig {
        builder_path: builder,
        config_path,
        output_path: dir.join("public"),
        listen: "127.0.0.1:0".parse().unwrap(),
        merge: MergeWorkerConfig {
            poll_interval: Duration::from_millis(50),
            retry_delay: Duration::from_millis(50),
        },
        build: BuildWorkerConfig {
            poll_interval: Duration::from_millis(50),
            backoff_initial: Duration::from_millis(50),
            backoff_max: Duration::from_millis(200),
            failure_policy: BuildFailurePolicy::Retry,
        },
        terminate_builder_on_shutdown: true,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn registration_flows_through_to_served_repository() {
    let dir = tempfile::tempdir().unwrap();
    let config = daemon_config(dir.path(), fake_satis(dir.path()));
    let config_path = config.config_path.clone();

    let daemon = Daemon::bind(config).await.expect("daemon binds");
    let base = format!("http://{}", daemon.local_addr().unwrap());
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let running = tokio::spawn(daemon.run_until(async {
        let _ = stop_rx.await;
    }));

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{base}/register"))
        .query(&[
            ("package", "acme/widget"),
            ("version", "^1.2"),
            ("repo", "https://example.com/widget.git"),
            ("repoType", "vcs"),
        ])
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let deadline = Instant::now() + Duration::from_secs(10);
    let served = loop {
        let response = client
            .get(format!("{base}/packages.json"))
            .send()
            .await
            .unwrap();
        if response.status().is_success() {
            let body: Value = response.json().await.unwrap();
            if body["require"]["acme/widget"] == "^1.2" {
                break body;
            }
        }
        assert!(
            Instant::now() < deadline,
            "repository never reflected the registration"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    };
    assert_eq!(
        served["repositories"][0]["url"],
        "https://example.com/widget.git"
    );

    let persisted: Value =
        serde_json::from_slice(&std::fs::read(&config_path).unwrap()).unwrap();
    let from_endpoint: Value = client
        .get(format!("{base}/config.json"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(persisted, from_endpoint);

    let health: Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["pipeline"]["pendingUpdates"], 0);

    stop_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(10), running)
        .await
        .expect("daemon stops")
        .unwrap();
    assert!(result.is_ok(), "{result:?}");
}

#[tokio::test]
async fn bind_rejects_missing_builder() {
    let dir = tempfile::tempdir().unwrap();
    let config = daemon_config(dir.path(), dir.path().join("no-such-satis"));

    let err = Daemon::bind(config).await.unwrap_err();
    assert!(format!("{err:#}").contains("no-such-satis"), "{err:#}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn exit_policy_stops_daemon_on_failed_build() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let failing = dir.path().join("failing-satis");
    std::fs::write(&failing, "#!/bin/sh\nexit 3\n").unwrap();
    std::fs::set_permissions(&failing, std::fs::Permissions::from_mode(0o755))
        .unwrap();

    let mut config = daemon_config(dir.path(), failing);
    config.build.failure_policy = BuildFailurePolicy::Exit;

    let daemon = Daemon::bind(config).await.unwrap();
    let base = format!("http://{}", daemon.local_addr().unwrap());
    let running = tokio::spawn(daemon.run_until(std::future::pending()));

    let response = reqwest::Client::new()
        .post(format!("{base}/generate"))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let result = tokio::time::timeout(Duration::from_secs(10), running)
        .await
        .expect("daemon exits after the failed build")
        .unwrap();
    assert!(result.is_err());
}
