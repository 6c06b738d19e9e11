#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use satisd_core::{DocumentStore, Pipeline};
use tempfile::TempDir;

pub const EMPTY_DOCUMENT: &str = r#"{"repositories": [], "require": {}}"#;

pub struct Fixture {
    pub dir: TempDir,
    pub config_path: PathBuf,
    pub output_path: PathBuf,
    pub pipeline: Arc<Pipeline>,
}

pub async fn fixture(document: &str) -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join("satis.json");
    let output_path = dir.path().join("public");
    std::fs::write(&config_path, document).expect("seed document");

    let (store, _) = DocumentStore::open(&config_path)
        .await
        .expect("open document");

    Fixture {
        config_path,
        output_path,
        pipeline: Arc::new(Pipeline::new(store)),
        dir,
    }
}

/// Writes a shell script that appends its arguments to `invocations.log`
/// next to it and exits with `exit_code`.
#[cfg(unix)]
pub fn fake_builder(dir: &Path, exit_code: i32) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("fake-satis");
    let log = invocation_log(dir);
    let body = format!(
        "#!/bin/sh\nprintf '%s\\n' \"$*\" >> '{}'\nexit {}\n",
        log.display(),
        exit_code
    );
    std::fs::write(&script, body).expect("write fake builder");
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake builder");
    script
}

/// Like [`fake_builder`], but the build takes `seconds` to finish.
#[cfg(unix)]
pub fn slow_builder(dir: &Path, seconds: u32) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("slow-satis");
    let body = format!(
        "#!/bin/sh\nprintf '%s\\n' \"$*\" >> '{}'\nexec sleep {}\n",
        invocation_log(dir).display(),
        seconds
    );
    std::fs::write(&script, body).expect("write slow builder");
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
        .expect("chmod slow builder");
    script
}

pub fn invocation_log(dir: &Path) -> PathBuf {
    dir.join("invocations.log")
}

pub fn invocations(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(invocation_log(dir))
        .map(|text| text.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
