use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::RepositoryJob;

/// Run manifest, deserialized from the `--config` TOML file.
///
/// ```toml
/// concurrency = 8
/// packages = ["requests", "django"]
///
/// [[repository]]
/// provider = "github"
/// owner = "acme"
/// repo = "api-server"
/// ref = "main"
/// analyzer = "poetry"
/// paths = ["backend/poetry.lock"]
/// ```
#[derive(Debug, Deserialize)]
pub struct Manifest {
    /// Maximum concurrent repository jobs; defaults to the CPU count.
    pub concurrency: Option<usize>,
    /// Run-wide tracked-package filter.
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default, rename = "repository")]
    pub repositories: Vec<RepositoryEntry>,
}

/// One repository to scan.
#[derive(Debug, Deserialize)]
pub struct RepositoryEntry {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_reference", rename = "ref")]
    pub reference: String,
    pub token: Option<String>,
    /// Explicit lock-file paths; empty means auto-search.
    #[serde(default)]
    pub paths: Vec<String>,
    /// Auto-search scopes (path prefixes).
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Per-repository tracked-package filter; overrides the run-wide one.
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default = "default_analyzer")]
    pub analyzer: String,
}

fn default_provider() -> String {
    "github".to_string()
}

fn default_reference() -> String {
    "main".to_string()
}

fn default_analyzer() -> String {
    "poetry".to_string()
}

/// Load and decode the run manifest.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading manifest {}", path.display()))?;
    let manifest: Manifest = toml::from_str(&content)
        .with_context(|| format!("decoding manifest {}", path.display()))?;
    Ok(manifest)
}

impl Manifest {
    /// Convert manifest entries into submittable jobs.
    ///
    /// `fallback_token` (e.g. `DEPMATRIX_TOKEN`) applies to entries without
    /// their own token.
    pub fn jobs(&self, fallback_token: Option<&str>) -> Vec<RepositoryJob> {
        self.repositories
            .iter()
            .map(|entry| RepositoryJob {
                provider: entry.provider.clone(),
                owner: entry.owner.clone(),
                repository: entry.repo.clone(),
                reference: entry.reference.clone(),
                token: entry
                    .token
                    .clone()
                    .or_else(|| fallback_token.map(str::to_string)),
                paths: entry.paths.clone(),
                scopes: entry.scopes.clone(),
                packages: entry.packages.clone(),
                analyzer: entry.analyzer.clone(),
            })
            .collect()
    }
}
