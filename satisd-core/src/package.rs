//! A single package publish notification and its validation.

use crate::error::MissingField;

/// Constraint recorded when a registration does not name a version.
pub const WILDCARD_CONSTRAINT: &str = "*";

/// The latest known state of one published package, waiting to be merged
/// into the configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageUpdate {
    /// Package name, e.g. `acme/widget`. Unique key in the registry.
    pub name: String,
    /// Version constraint written into `require`.
    pub constraint: String,
    /// URL of the repository the package is published from.
    pub repository_url: String,
    /// Repository type tag (`vcs`, `composer`, `package`, ...).
    pub repository_type: String,
}

impl PackageUpdate {
    /// Builds an update, defaulting an empty or absent constraint to the
    /// wildcard.
    pub fn new(
        name: impl Into<String>,
        constraint: Option<String>,
        repository_url: impl Into<String>,
        repository_type: impl Into<String>,
    ) -> Self {
        let constraint = constraint
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| WILDCARD_CONSTRAINT.to_string());

        Self {
            name: name.into(),
            constraint,
            repository_url: repository_url.into(),
            repository_type: repository_type.into(),
        }
    }

    /// Validates the raw registration parameters.
    ///
    /// Required fields are checked in the order `package`, `repo`,
    /// `repoType`; the first one that is absent or empty is reported.
    pub fn from_request(
        package: Option<String>,
        version: Option<String>,
        repo: Option<String>,
        repo_type: Option<String>,
    ) -> Result<Self, MissingField> {
        let package = required(package, "package")?;
        let repo = required(repo, "repo")?;
        let repo_type = required(repo_type, "repoType")?;

        Ok(Self::new(package, version, repo, repo_type))
    }
}

fn required(
    value: Option<String>,
    field: &'static str,
) -> Result<String, MissingField> {
    value
        .filter(|value| !value.is_empty())
        .ok_or(MissingField { field })
}
