use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::analyzer::{AnalysisConfig, AnalysisContext, AnalyzerRegistry};
use crate::error::{AnalysisError, ProviderError};
use crate::models::{Report, RepositoryJob, RepositoryResult};
use crate::progress::{ProgressEvent, ProgressSender};
use crate::provider::{self, RepositoryFiles};

/// Builds a content accessor for one job. Swappable so tests can run
/// against in-memory repositories.
pub type ProviderFactory =
    Arc<dyn Fn(&RepositoryJob) -> Result<Arc<dyn RepositoryFiles>, ProviderError> + Send + Sync>;

/// Fans repository jobs out over a bounded worker pool and merges the
/// outcomes into a single [`Report`].
///
/// Every collaborator is constructor-supplied; nothing is resolved from
/// global state. Job failures stay on their own result slot — a run always
/// returns one result per submitted job, in submission order.
pub struct Orchestrator {
    registry: Arc<AnalyzerRegistry>,
    providers: ProviderFactory,
    max_concurrency: usize,
    tracked: Vec<String>,
    progress: Option<ProgressSender>,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(registry: AnalyzerRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            providers: Arc::new(|job: &RepositoryJob| {
                provider::create_provider(&job.provider, job.token.as_deref())
            }),
            max_concurrency: num_cpus::get(),
            tracked: Vec::new(),
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Substitute the accessor factory (tests inject in-memory fakes here).
    pub fn with_providers(mut self, providers: ProviderFactory) -> Self {
        self.providers = providers;
        self
    }

    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Run-wide tracked-package filter applied to every job and to the
    /// report's package list.
    pub fn with_tracked_packages(mut self, tracked: Vec<String>) -> Self {
        self.tracked = tracked;
        self
    }

    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Caller-supplied cancellation; in-flight jobs observing it are
    /// recorded as errored, never dropped.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Execute every job and assemble the final report.
    ///
    /// Results land in a pre-sized slice addressed by submission index, so
    /// report order never depends on completion order.
    pub async fn run(&self, jobs: Vec<RepositoryJob>) -> Report {
        let total = jobs.len();
        let skeletons: Vec<RepositoryResult> =
            jobs.iter().map(RepositoryResult::for_job).collect();

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut join_set: JoinSet<(usize, RepositoryResult)> = JoinSet::new();
        let mut slots: Vec<Option<RepositoryResult>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);

        for (index, job) in jobs.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let registry = Arc::clone(&self.registry);
            let providers = Arc::clone(&self.providers);
            let tracked = if job.packages.is_empty() {
                self.tracked.clone()
            } else {
                job.packages.clone()
            };
            let progress = self.progress.clone();
            let cancel = self.cancel.clone();

            join_set.spawn(async move {
                let mut result = RepositoryResult::for_job(&job);

                let _permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        result.error = Some(AnalysisError::Cancelled.to_string());
                        emit(&progress, ProgressEvent::finished(&result));
                        return (index, result);
                    }
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        // Only possible if the semaphore is closed, which this
                        // pool never does; treat it like cancellation.
                        Err(_) => {
                            result.error = Some(AnalysisError::Cancelled.to_string());
                            emit(&progress, ProgressEvent::finished(&result));
                            return (index, result);
                        }
                    },
                };

                emit(
                    &progress,
                    ProgressEvent::JobStarted {
                        slug: result.slug(),
                    },
                );

                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(AnalysisError::Cancelled),
                    outcome = analyze_job(&registry, &providers, &job) => outcome,
                };

                match outcome {
                    Ok(dependencies) => {
                        result.dependencies = restrict(dependencies, &tracked);
                    }
                    Err(err) => {
                        warn!(repository = %result.slug(), "job failed: {}", err);
                        result.error = Some(err.to_string());
                    }
                }

                emit(&progress, ProgressEvent::finished(&result));
                (index, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(err) => warn!("worker task failed: {}", err),
            }
        }

        // A panicked worker leaves its slot empty; record it as errored so
        // the report still covers every submitted job.
        let results: Vec<RepositoryResult> = slots
            .into_iter()
            .zip(skeletons)
            .map(|(slot, mut skeleton)| {
                slot.unwrap_or_else(|| {
                    skeleton.error = Some("worker task failed".to_string());
                    skeleton
                })
            })
            .collect();

        Report::assemble(results, &self.tracked)
    }
}

fn emit(progress: &Option<ProgressSender>, event: ProgressEvent) {
    if let Some(sender) = progress {
        // Receiver may have been dropped; progress is best-effort.
        let _ = sender.send(event);
    }
}

fn restrict(
    dependencies: BTreeMap<String, String>,
    tracked: &[String],
) -> BTreeMap<String, String> {
    if tracked.is_empty() {
        return dependencies;
    }
    dependencies
        .into_iter()
        .filter(|(name, _)| tracked.iter().any(|t| t == name))
        .collect()
}

/// One job, queue to terminal state: resolve candidates, analyze, merge.
///
/// Merging walks files in processing order; on duplicate package names the
/// first occurrence wins and later ones are discarded.
async fn analyze_job(
    registry: &AnalyzerRegistry,
    providers: &ProviderFactory,
    job: &RepositoryJob,
) -> Result<BTreeMap<String, String>, AnalysisError> {
    let analyzer = registry.create(&job.analyzer)?;
    let files = providers(job)?;
    let ctx = AnalysisContext::new(files, &job.owner, &job.repository, &job.reference);
    let config = AnalysisConfig {
        paths: job.paths.clone(),
        scopes: job.scopes.clone(),
    };

    let candidates = analyzer.discover_candidates(&ctx, &config).await?;
    debug!(
        repository = %format!("{}/{}", job.owner, job.repository),
        candidates = candidates.len(),
        "discovery complete"
    );

    let mut by_file = analyzer.analyze(&ctx, &candidates).await?;

    let mut merged = BTreeMap::new();
    for candidate in &candidates {
        if let Some(records) = by_file.remove(&candidate.path) {
            for record in records {
                merged.entry(record.name).or_insert(record.version);
            }
        }
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::provider::{EntryKind, RepoEntry};

    const POETRY_BASIC: &str = r#"
[[package]]
name = "requests"
version = "2.28.1"
category = "main"
optional = false

[[package]]
name = "pytest"
version = "7.2.0"
category = "dev"
optional = false
"#;

    /// In-memory provider keyed by repository name.
    struct FakeRepos {
        /// repo -> tree entries
        trees: HashMap<String, Vec<RepoEntry>>,
        /// (repo, path) -> content
        files: HashMap<(String, String), String>,
        /// repos whose listing call fails
        broken: Vec<String>,
    }

    impl FakeRepos {
        fn new() -> Self {
            Self {
                trees: HashMap::new(),
                files: HashMap::new(),
                broken: Vec::new(),
            }
        }

        fn with_file(mut self, repo: &str, path: &str, content: &str) -> Self {
            self.trees
                .entry(repo.to_string())
                .or_default()
                .push(RepoEntry {
                    path: path.to_string(),
                    kind: EntryKind::File,
                });
            self.files
                .insert((repo.to_string(), path.to_string()), content.to_string());
            self
        }

        fn with_broken_listing(mut self, repo: &str) -> Self {
            self.broken.push(repo.to_string());
            self
        }

        fn into_factory(self) -> ProviderFactory {
            let shared: Arc<dyn RepositoryFiles> = Arc::new(self);
            Arc::new(move |_job| Ok(Arc::clone(&shared)))
        }
    }

    #[async_trait]
    impl RepositoryFiles for FakeRepos {
        async fn list_files_recursive(
            &self,
            _owner: &str,
            repo: &str,
            _reference: &str,
        ) -> Result<Vec<RepoEntry>, ProviderError> {
            if self.broken.iter().any(|r| r == repo) {
                return Err(ProviderError::Status {
                    status: reqwest::StatusCode::BAD_GATEWAY,
                    url: format!("fake://{}", repo),
                });
            }
            Ok(self.trees.get(repo).cloned().unwrap_or_default())
        }

        async fn file_content(
            &self,
            _owner: &str,
            repo: &str,
            _reference: &str,
            path: &str,
        ) -> Result<String, ProviderError> {
            self.files
                .get(&(repo.to_string(), path.to_string()))
                .cloned()
                .ok_or(ProviderError::Status {
                    status: reqwest::StatusCode::NOT_FOUND,
                    url: format!("fake://{}/{}", repo, path),
                })
        }
    }

    fn job(repo: &str) -> RepositoryJob {
        RepositoryJob {
            provider: "github".to_string(),
            owner: "acme".to_string(),
            repository: repo.to_string(),
            reference: "main".to_string(),
            token: None,
            paths: Vec::new(),
            scopes: Vec::new(),
            packages: Vec::new(),
            analyzer: "poetry".to_string(),
        }
    }

    fn orchestrator(repos: FakeRepos) -> Orchestrator {
        Orchestrator::new(AnalyzerRegistry::with_builtin())
            .with_providers(repos.into_factory())
            .with_concurrency(4)
    }

    #[tokio::test]
    async fn test_single_repository_with_valid_lock_file() {
        let repos = FakeRepos::new().with_file("api", "poetry.lock", POETRY_BASIC);
        let report = orchestrator(repos).run(vec![job("api")]).await;

        let result = &report.repositories[0];
        assert_eq!(result.error, None);
        assert_eq!(result.dependencies.len(), 2);
        assert_eq!(result.dependencies["requests"], "2.28.1");
        assert_eq!(result.dependencies["pytest"], "7.2.0");
        assert_eq!(report.summary.success_count, 1);
    }

    #[tokio::test]
    async fn test_listing_failure_does_not_affect_other_jobs() {
        let repos = FakeRepos::new()
            .with_broken_listing("down")
            .with_file("up", "poetry.lock", POETRY_BASIC);
        let report = orchestrator(repos)
            .run(vec![job("down"), job("up")])
            .await;

        assert!(report.repositories[0].error.is_some());
        assert!(report.repositories[0].dependencies.is_empty());
        assert_eq!(report.repositories[1].error, None);
        assert_eq!(report.repositories[1].dependencies.len(), 2);
        assert_eq!(report.summary.error_count, 1);
    }

    #[tokio::test]
    async fn test_malformed_file_is_skipped_not_fatal() {
        let repos = FakeRepos::new()
            .with_file("api", "good/poetry.lock", POETRY_BASIC)
            .with_file("api", "bad/poetry.lock", "[[package");
        let report = orchestrator(repos).run(vec![job("api")]).await;

        let result = &report.repositories[0];
        assert_eq!(result.error, None);
        assert_eq!(result.dependencies.len(), 2);
        assert!(result.dependencies.contains_key("requests"));
    }

    #[tokio::test]
    async fn test_first_file_wins_on_duplicate_package() {
        let first = r#"
[[package]]
name = "foo"
version = "1.0.0"
"#;
        let second = r#"
[[package]]
name = "foo"
version = "2.0.0"

[[package]]
name = "bar"
version = "0.5.0"
"#;
        let repos = FakeRepos::new()
            .with_file("api", "a/poetry.lock", first)
            .with_file("api", "b/poetry.lock", second);

        // Explicit paths pin the processing order.
        let mut ordered = job("api");
        ordered.paths = vec!["a/poetry.lock".to_string(), "b/poetry.lock".to_string()];
        let report = orchestrator(repos).run(vec![ordered]).await;

        let deps = &report.repositories[0].dependencies;
        assert_eq!(deps["foo"], "1.0.0");
        assert_eq!(deps["bar"], "0.5.0");
    }

    #[tokio::test]
    async fn test_report_preserves_submission_order() {
        let mut repos = FakeRepos::new();
        let names: Vec<String> = (0..8).map(|i| format!("repo-{}", i)).collect();
        for name in &names {
            repos = repos.with_file(name, "poetry.lock", POETRY_BASIC);
        }
        let jobs: Vec<RepositoryJob> = names.iter().map(|n| job(n)).collect();
        let report = orchestrator(repos).with_concurrency(3).run(jobs).await;

        let got: Vec<&str> = report
            .repositories
            .iter()
            .map(|r| r.repository.as_str())
            .collect();
        assert_eq!(got, names.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_unknown_analyzer_errors_only_that_job() {
        let repos = FakeRepos::new().with_file("api", "poetry.lock", POETRY_BASIC);
        let mut bad = job("api");
        bad.analyzer = "cargo".to_string();
        let report = orchestrator(repos).run(vec![bad, job("api")]).await;

        assert_eq!(
            report.repositories[0].error.as_deref(),
            Some("unknown analyzer: cargo")
        );
        assert_eq!(report.repositories[1].error, None);
    }

    #[tokio::test]
    async fn test_unknown_provider_errors_that_job() {
        let report = Orchestrator::new(AnalyzerRegistry::with_builtin())
            .run(vec![{
                let mut j = job("api");
                j.provider = "bitbucket".to_string();
                j
            }])
            .await;

        assert_eq!(
            report.repositories[0].error.as_deref(),
            Some("unknown provider: bitbucket")
        );
    }

    #[tokio::test]
    async fn test_tracked_packages_restrict_result_and_report() {
        let repos = FakeRepos::new().with_file("api", "poetry.lock", POETRY_BASIC);
        let report = orchestrator(repos)
            .with_tracked_packages(vec!["requests".to_string()])
            .run(vec![job("api")])
            .await;

        assert_eq!(report.packages, vec!["requests"]);
        let deps = &report.repositories[0].dependencies;
        assert_eq!(deps.len(), 1);
        assert!(deps.contains_key("requests"));
    }

    #[tokio::test]
    async fn test_cancelled_run_records_errored_results() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let repos = FakeRepos::new().with_file("api", "poetry.lock", POETRY_BASIC);
        let report = orchestrator(repos)
            .with_cancellation(cancel)
            .run(vec![job("api"), job("api")])
            .await;

        assert_eq!(report.repositories.len(), 2);
        for result in &report.repositories {
            assert_eq!(result.error.as_deref(), Some("cancelled"));
        }
    }

    #[tokio::test]
    async fn test_progress_events_cover_every_job() {
        let (sender, mut receiver) = crate::progress::channel();
        let repos = FakeRepos::new()
            .with_file("one", "poetry.lock", POETRY_BASIC)
            .with_file("two", "poetry.lock", POETRY_BASIC);
        let report = orchestrator(repos)
            .with_progress(sender)
            .run(vec![job("one"), job("two")])
            .await;
        assert_eq!(report.summary.success_count, 2);

        let mut started = 0;
        let mut finished = 0;
        while let Ok(event) = receiver.try_recv() {
            match event {
                ProgressEvent::JobStarted { .. } => started += 1,
                ProgressEvent::JobFinished { error, .. } => {
                    assert!(error.is_none());
                    finished += 1;
                }
            }
        }
        assert_eq!(started, 2);
        assert_eq!(finished, 2);
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let build = || {
            FakeRepos::new()
                .with_file("api", "poetry.lock", POETRY_BASIC)
                .with_file("web", "poetry.lock", POETRY_BASIC)
        };
        let jobs = || vec![job("api"), job("web")];

        let first = orchestrator(build()).run(jobs()).await;
        let second = orchestrator(build()).run(jobs()).await;

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
