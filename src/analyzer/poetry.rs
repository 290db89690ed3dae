use serde::Deserialize;

use crate::models::{DependencyKind, DependencyOrigin, DependencyRecord};

#[derive(Debug, Deserialize)]
struct PoetryLock {
    #[serde(default)]
    package: Vec<PoetryPackage>,
}

#[derive(Debug, Deserialize)]
struct PoetryPackage {
    name: String,
    version: String,
    category: Option<String>,
    #[serde(default)]
    optional: bool,
}

/// Analyzer for `poetry.lock` files.
///
/// Kind rules: the optional flag wins over the category tag; a `dev`
/// category marks dev dependencies; everything else is runtime.
pub struct PoetryAnalyzer;

impl PoetryAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl super::Analyzer for PoetryAnalyzer {
    fn name(&self) -> &'static str {
        "poetry"
    }

    fn lock_file(&self) -> &'static str {
        "poetry.lock"
    }

    fn parse(&self, content: &str) -> anyhow::Result<Vec<DependencyRecord>> {
        let lock: PoetryLock = toml::from_str(content)?;

        let records = lock
            .package
            .into_iter()
            .filter(|p| !p.name.is_empty())
            .map(|p| {
                let kind = if p.optional {
                    DependencyKind::Optional
                } else if p.category.as_deref() == Some("dev") {
                    DependencyKind::Dev
                } else {
                    DependencyKind::Runtime
                };
                DependencyRecord {
                    name: p.name,
                    version: p.version,
                    kind,
                    origin: DependencyOrigin::Pypi,
                }
            })
            .collect();

        Ok(records)
    }
}
