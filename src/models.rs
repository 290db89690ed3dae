use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How a dependency is pulled into the project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Runtime,
    Dev,
    Optional,
}

impl std::fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DependencyKind::Runtime => write!(f, "runtime"),
            DependencyKind::Dev => write!(f, "dev"),
            DependencyKind::Optional => write!(f, "optional"),
        }
    }
}

/// Where a dependency's bytes come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyOrigin {
    Pypi,
    Git,
    Path,
    Url,
    /// Source types we don't map are carried through verbatim.
    Other(String),
}

impl std::fmt::Display for DependencyOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DependencyOrigin::Pypi => write!(f, "pypi"),
            DependencyOrigin::Git => write!(f, "git"),
            DependencyOrigin::Path => write!(f, "path"),
            DependencyOrigin::Url => write!(f, "url"),
            DependencyOrigin::Other(s) => write!(f, "{}", s),
        }
    }
}

/// One resolved dependency as declared in a lock file.
///
/// The version string is kept exactly as the lock file spells it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub name: String,
    pub version: String,
    pub kind: DependencyKind,
    pub origin: DependencyOrigin,
}

/// A lock file selected for analysis, before its content is fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFile {
    /// Repository-relative path.
    pub path: String,
    /// Lock-file family tag (e.g. `poetry.lock`).
    pub format: String,
    /// Identifier of the analyzer that will parse this file.
    pub analyzer: String,
}

/// One repository's unit of orchestrated work.
///
/// Immutable once submitted; identity is `(provider, owner, repository, reference)`.
#[derive(Debug, Clone)]
pub struct RepositoryJob {
    pub provider: String,
    pub owner: String,
    pub repository: String,
    pub reference: String,
    pub token: Option<String>,
    /// Explicit lock-file paths; empty means auto-search.
    pub paths: Vec<String>,
    /// Search scopes (path prefixes) for auto-search; empty means whole repository.
    pub scopes: Vec<String>,
    /// Restrict this repository's result to these package names; empty means all.
    pub packages: Vec<String>,
    pub analyzer: String,
}

/// Outcome of one repository job.
///
/// `dependencies` and `error` may legitimately coexist when only some
/// candidate files failed; a job-level failure leaves the map empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryResult {
    pub provider: String,
    pub owner: String,
    pub repository: String,
    #[serde(rename = "ref")]
    pub reference: String,
    pub analyzer: String,
    pub dependencies: BTreeMap<String, String>,
    pub error: Option<String>,
}

impl RepositoryResult {
    /// Empty result echoing a job's identity.
    pub fn for_job(job: &RepositoryJob) -> Self {
        Self {
            provider: job.provider.clone(),
            owner: job.owner.clone(),
            repository: job.repository.clone(),
            reference: job.reference.clone(),
            analyzer: job.analyzer.clone(),
            dependencies: BTreeMap::new(),
            error: None,
        }
    }

    /// `owner/repository` label used in logs and reports.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repository)
    }
}

/// Final aggregate over every submitted job, in submission order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub repositories: Vec<RepositoryResult>,
    pub packages: Vec<String>,
    pub summary: ReportSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub repository_count: usize,
    pub package_count: usize,
    pub success_count: usize,
    pub error_count: usize,
}

impl Report {
    /// Assemble a report from per-job results (already in submission order).
    ///
    /// When `tracked` is non-empty it becomes the run-wide package list;
    /// otherwise the list is the sorted union of every package discovered.
    pub fn assemble(repositories: Vec<RepositoryResult>, tracked: &[String]) -> Self {
        let packages: Vec<String> = if tracked.is_empty() {
            let mut union: Vec<String> = repositories
                .iter()
                .flat_map(|r| r.dependencies.keys().cloned())
                .collect();
            union.sort();
            union.dedup();
            union
        } else {
            tracked.to_vec()
        };

        let error_count = repositories.iter().filter(|r| r.error.is_some()).count();
        let summary = ReportSummary {
            repository_count: repositories.len(),
            package_count: packages.len(),
            success_count: repositories.len() - error_count,
            error_count,
        };

        Report {
            repositories,
            packages,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(deps: &[(&str, &str)], error: Option<&str>) -> RepositoryResult {
        RepositoryResult {
            provider: "github".into(),
            owner: "acme".into(),
            repository: "api".into(),
            reference: "main".into(),
            analyzer: "poetry".into(),
            dependencies: deps
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_assemble_union_is_sorted_and_deduped() {
        let report = Report::assemble(
            vec![
                result_with(&[("requests", "2.28.1"), ("flask", "2.3.0")], None),
                result_with(&[("requests", "2.31.0")], None),
            ],
            &[],
        );
        assert_eq!(report.packages, vec!["flask", "requests"]);
        assert_eq!(report.summary.package_count, 2);
        assert_eq!(report.summary.success_count, 2);
        assert_eq!(report.summary.error_count, 0);
    }

    #[test]
    fn test_assemble_tracked_filter_overrides_union() {
        let report = Report::assemble(
            vec![result_with(&[("requests", "2.28.1")], None)],
            &["django".to_string()],
        );
        assert_eq!(report.packages, vec!["django"]);
    }

    #[test]
    fn test_assemble_counts_errored_repositories() {
        let report = Report::assemble(
            vec![
                result_with(&[("requests", "2.28.1")], None),
                result_with(&[], Some("listing failed")),
            ],
            &[],
        );
        assert_eq!(report.summary.repository_count, 2);
        assert_eq!(report.summary.success_count, 1);
        assert_eq!(report.summary.error_count, 1);
    }

    #[test]
    fn test_report_round_trips_through_json() {
        let report = Report::assemble(
            vec![result_with(&[("requests", "2.28.1")], None)],
            &[],
        );
        let json = serde_json::to_string(&report).unwrap();
        let back: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(back.repositories.len(), 1);
        assert_eq!(
            back.repositories[0].dependencies.get("requests").unwrap(),
            "2.28.1"
        );
        assert_eq!(back.packages, report.packages);
    }
}
