//! # satisd core
//!
//! The update-aggregation and build pipeline behind the `satisd` daemon.
//!
//! ## Overview
//!
//! - [`registry::UpdateRegistry`] collects "package published" notifications,
//!   one pending entry per package, last write wins.
//! - [`document::DocumentStore`] owns the repository-definition document on
//!   disk and orders readers against atomic rewrites.
//! - [`merge::MergeWorker`] drains the registry into the document when
//!   `needsConfigWrite` is armed, then arms `needsRebuild`.
//! - [`build::BuildWorker`] runs the external builder when `needsRebuild` is
//!   armed, never against a document with unmerged registrations.
//!
//! All shared state lives in one [`pipeline::Pipeline`].

pub mod build;
pub mod document;
pub mod error;
pub mod merge;
pub mod package;
pub mod pipeline;
pub mod registry;
pub mod trigger;

pub use build::{
    Backoff, BuildFailurePolicy, BuildOutcome, BuildWorker, BuildWorkerConfig,
    Builder,
};
pub use document::{ConfigDocument, DocumentStore, RepositoryDescriptor};
pub use error::{BuildError, DocumentError, MissingField};
pub use merge::{MergeOutcome, MergeWorker, MergeWorkerConfig};
pub use package::{PackageUpdate, WILDCARD_CONSTRAINT};
pub use pipeline::{Pipeline, PipelineStatus};
pub use registry::UpdateRegistry;
pub use trigger::{BuildTriggers, TriggerFlag, TriggerSnapshot};
