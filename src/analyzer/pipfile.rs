use std::collections::BTreeMap;

use serde::Deserialize;

use crate::models::{DependencyKind, DependencyOrigin, DependencyRecord};

#[derive(Debug, Deserialize)]
struct PipfileLock {
    #[serde(default)]
    default: BTreeMap<String, PipfilePackage>,
    #[serde(default)]
    develop: BTreeMap<String, PipfilePackage>,
}

#[derive(Debug, Deserialize)]
struct PipfilePackage {
    version: Option<String>,
}

/// Analyzer for `Pipfile.lock` files.
///
/// The `default` table holds runtime dependencies, `develop` holds dev
/// dependencies. Pinned versions carry a leading `==` that is stripped.
pub struct PipfileAnalyzer;

impl PipfileAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

fn records_from(
    table: BTreeMap<String, PipfilePackage>,
    kind: DependencyKind,
) -> impl Iterator<Item = DependencyRecord> {
    table
        .into_iter()
        .filter(|(name, _)| !name.is_empty())
        .map(move |(name, pkg)| DependencyRecord {
            name,
            version: pkg
                .version
                .as_deref()
                .unwrap_or("*")
                .trim_start_matches("==")
                .to_string(),
            kind: kind.clone(),
            origin: DependencyOrigin::Pypi,
        })
}

impl super::Analyzer for PipfileAnalyzer {
    fn name(&self) -> &'static str {
        "pipfile"
    }

    fn lock_file(&self) -> &'static str {
        "Pipfile.lock"
    }

    fn parse(&self, content: &str) -> anyhow::Result<Vec<DependencyRecord>> {
        let lock: PipfileLock = serde_json::from_str(content)?;

        let records = records_from(lock.default, DependencyKind::Runtime)
            .chain(records_from(lock.develop, DependencyKind::Dev))
            .collect();

        Ok(records)
    }
}
