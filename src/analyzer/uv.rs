use std::collections::BTreeMap;

use serde::Deserialize;

use crate::models::{DependencyKind, DependencyOrigin, DependencyRecord};

#[derive(Debug, Deserialize)]
struct UvLock {
    #[serde(default)]
    package: Vec<UvPackage>,
}

#[derive(Debug, Deserialize)]
struct UvPackage {
    name: String,
    version: String,
    /// Source descriptor; the key names the source type
    /// (`registry`, `git`, `path`, `directory`, `url`, ...).
    source: Option<BTreeMap<String, toml::Value>>,
    marker: Option<String>,
    #[serde(default, rename = "resolution-markers")]
    resolution_markers: Vec<String>,
    #[serde(default, rename = "dev-dependencies")]
    dev_dependencies: BTreeMap<String, Vec<toml::Value>>,
}

const DEV_MARKERS: [&str; 2] = ["extra == 'dev'", "extra == 'test'"];

impl UvPackage {
    fn is_dev(&self) -> bool {
        if self
            .dev_dependencies
            .get("dev")
            .is_some_and(|group| !group.is_empty())
        {
            return true;
        }
        let marker_hits = |m: &str| DEV_MARKERS.iter().any(|needle| m.contains(needle));
        self.marker.as_deref().is_some_and(marker_hits)
            || self.resolution_markers.iter().any(|m| marker_hits(m))
    }

    fn origin(&self) -> DependencyOrigin {
        let Some(source) = &self.source else {
            return DependencyOrigin::Pypi;
        };
        if source.contains_key("registry") {
            DependencyOrigin::Pypi
        } else if source.contains_key("git") {
            DependencyOrigin::Git
        } else if source.contains_key("path") || source.contains_key("directory") {
            DependencyOrigin::Path
        } else if source.contains_key("url") {
            DependencyOrigin::Url
        } else {
            match source.keys().next() {
                Some(key) => DependencyOrigin::Other(key.clone()),
                None => DependencyOrigin::Pypi,
            }
        }
    }
}

/// Analyzer for `uv.lock` files.
///
/// Dev classification comes from a non-empty `dev` group in the package's
/// `dev-dependencies` table or from dev/test extras in its markers.
pub struct UvAnalyzer;

impl UvAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl super::Analyzer for UvAnalyzer {
    fn name(&self) -> &'static str {
        "uv"
    }

    fn lock_file(&self) -> &'static str {
        "uv.lock"
    }

    fn parse(&self, content: &str) -> anyhow::Result<Vec<DependencyRecord>> {
        let lock: UvLock = toml::from_str(content)?;

        let records = lock
            .package
            .into_iter()
            .filter(|p| !p.name.is_empty())
            .map(|p| {
                let kind = if p.is_dev() {
                    DependencyKind::Dev
                } else {
                    DependencyKind::Runtime
                };
                let origin = p.origin();
                DependencyRecord {
                    name: p.name,
                    version: p.version,
                    kind,
                    origin,
                }
            })
            .collect();

        Ok(records)
    }
}
