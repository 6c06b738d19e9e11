//! The repository-definition document handed to the builder.
//!
//! Only `repositories` and `require` are modelled. Every other key, at the
//! top level and inside each repository entry, is carried through a
//! flattened map so a merge rewrites the file without dropping or reordering
//! anything the daemon does not understand.

use std::{
    collections::BTreeMap,
    io::Write,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, ser::PrettyFormatter};
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::debug;

use crate::{error::DocumentError, package::PackageUpdate};

const INDENT: &[u8] = b"    ";

/// One entry of the `repositories` list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    /// Source URL; the deduplication key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Repository type tag.
    #[serde(
        rename = "type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    /// Keys the daemon does not interpret (`options`, `package`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RepositoryDescriptor {
    /// A bare `{url, type}` descriptor.
    pub fn new(url: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            kind: Some(kind.into()),
            extra: Map::new(),
        }
    }
}

/// Parsed configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// Source repositories, unique by URL.
    #[serde(default)]
    pub repositories: Vec<RepositoryDescriptor>,
    /// Package name to version constraint.
    #[serde(default)]
    pub require: BTreeMap<String, String>,
    /// Top-level sections that are not ours to touch.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConfigDocument {
    /// Parses a document from raw JSON.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Folds one update into the document.
    ///
    /// A repository with the same URL has its type overwritten in place;
    /// otherwise a new descriptor is appended. The package constraint is
    /// always set.
    pub fn apply(&mut self, update: &PackageUpdate) {
        let existing = self.repositories.iter_mut().find(|repo| {
            repo.url.as_deref() == Some(update.repository_url.as_str())
        });

        match existing {
            Some(repo) => repo.kind = Some(update.repository_type.clone()),
            None => self.repositories.push(RepositoryDescriptor::new(
                update.repository_url.clone(),
                update.repository_type.clone(),
            )),
        }

        self.require
            .insert(update.name.clone(), update.constraint.clone());
    }

    /// Serializes with four-space indentation and a trailing newline.
    pub fn to_pretty_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut out = Vec::with_capacity(256);
        let formatter = PrettyFormatter::with_indent(INDENT);
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut serializer)?;
        out.push(b'\n');
        Ok(out)
    }
}

/// The on-disk document plus the lock that orders readers against the merge
/// worker's rewrites.
///
/// Readers (HTTP serving, document loads) hold a shared guard only while they
/// open or read the file; a rewrite takes the exclusive guard only for the
/// replace itself. Neither is held across a builder run. Every successful rewrite
/// bumps a generation counter, starting from zero for the file found at
/// startup.
#[derive(Debug)]
pub struct DocumentStore {
    path: PathBuf,
    lock: RwLock<()>,
    generation: AtomicU64,
}

impl DocumentStore {
    /// Opens the document at `path`, failing if it is missing or does not
    /// parse.
    pub async fn open(
        path: impl Into<PathBuf>,
    ) -> Result<(Self, ConfigDocument), DocumentError> {
        let store = Self {
            path: path.into(),
            lock: RwLock::new(()),
            generation: AtomicU64::new(0),
        };
        let document = store.load().await?;
        Ok((store, document))
    }

    /// Location of the document on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of successful rewrites since startup.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Shared guard; the file is not replaced while it is held.
    pub async fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read().await
    }

    /// Reads and parses the current document under the shared guard.
    pub async fn load(&self) -> Result<ConfigDocument, DocumentError> {
        let bytes = {
            let _guard = self.lock.read().await;
            tokio::fs::read(&self.path).await.map_err(|source| {
                DocumentError::Read {
                    path: self.path.clone(),
                    source,
                }
            })?
        };

        ConfigDocument::from_slice(&bytes).map_err(|source| {
            DocumentError::Parse {
                path: self.path.clone(),
                source,
            }
        })
    }

    /// Replaces the document atomically and returns the new generation.
    ///
    /// The content goes to a temporary file in the same directory which is
    /// then renamed over the original, so a reader sees either the old or
    /// the new document, never a partial one.
    pub async fn persist(
        &self,
        document: &ConfigDocument,
    ) -> Result<u64, DocumentError> {
        let bytes = document.to_pretty_bytes().map_err(DocumentError::Encode)?;

        let _guard = self.lock.write().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|err| DocumentError::Task(err.to_string()))?
            .map_err(|source| DocumentError::Write {
                path: self.path.clone(),
                source,
            })?;

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(path = %self.path.display(), generation, "configuration document replaced");
        Ok(generation)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;

    // Keep the original file mode; temp files are created owner-only.
    if let Ok(metadata) = std::fs::metadata(path) {
        temp.as_file().set_permissions(metadata.permissions())?;
    }

    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}
