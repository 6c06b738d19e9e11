#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use axum_test::TestServer;
use satisd_core::{DocumentStore, Pipeline};
use satisd_server::{AppState, routes::create_app};
use tempfile::TempDir;

pub const EMPTY_DOCUMENT: &str = r#"{"repositories": [], "require": {}}"#;

pub struct TestApp {
    pub dir: TempDir,
    pub config_path: PathBuf,
    pub output_path: PathBuf,
    pub pipeline: Arc<Pipeline>,
    pub server: TestServer,
}

pub async fn build_test_app(document: &str) -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join("satis.json");
    let output_path = dir.path().join("public");
    std::fs::write(&config_path, document).expect("seed document");
    std::fs::create_dir_all(&output_path).expect("output dir");

    let (store, _) = DocumentStore::open(&config_path)
        .await
        .expect("open document");
    let pipeline = Arc::new(Pipeline::new(store));

    let router =
        create_app(AppState::new(Arc::clone(&pipeline), &output_path));
    let server = TestServer::new(router).expect("test server");

    TestApp {
        dir,
        config_path,
        output_path,
        pipeline,
        server,
    }
}

/// Shell script standing in for satis: records its arguments and copies the
/// configuration into the output directory as `packages.json`.
#[cfg(unix)]
pub fn fake_satis(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("fake-satis");
    let body = format!(
        "#!/bin/sh\n\
         printf '%s\\n' \"$*\" >> '{log}'\n\
         mkdir -p \"$3\"\n\
         cp \"$2\" \"$3/packages.json\"\n",
        log = dir.join("invocations.log").display()
    );
    std::fs::write(&script, body).expect("write fake satis");
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake satis");
    script
}
