use std::{fmt, path::PathBuf, sync::Arc};

use satisd_core::Pipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// Output directory of the builder, served as the fallback route
    pub output_path: PathBuf,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("config_path", &self.config_path())
            .field("output_path", &self.output_path)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            pipeline,
            output_path: output_path.into(),
        }
    }

    pub fn config_path(&self) -> &std::path::Path {
        self.pipeline.document().path()
    }
}
