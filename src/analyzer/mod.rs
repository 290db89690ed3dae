use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{AnalysisError, ParseError, ProviderError};
use crate::models::{CandidateFile, DependencyRecord};
use crate::provider::{EntryKind, RepoEntry, RepositoryFiles};

pub mod pipfile;
pub mod poetry;
pub mod uv;

/// Everything an analyzer needs to reach one repository's content.
///
/// A context cannot be built without an accessor, so the "accessor must be
/// present" rule holds by construction.
pub struct AnalysisContext {
    files: Arc<dyn RepositoryFiles>,
    pub owner: String,
    pub repository: String,
    pub reference: String,
}

impl AnalysisContext {
    pub fn new(
        files: Arc<dyn RepositoryFiles>,
        owner: impl Into<String>,
        repository: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            files,
            owner: owner.into(),
            repository: repository.into(),
            reference: reference.into(),
        }
    }

    async fn list(&self) -> Result<Vec<RepoEntry>, ProviderError> {
        self.files
            .list_files_recursive(&self.owner, &self.repository, &self.reference)
            .await
    }

    async fn content(&self, path: &str) -> Result<String, ProviderError> {
        self.files
            .file_content(&self.owner, &self.repository, &self.reference, path)
            .await
    }
}

/// Candidate-discovery inputs for one analyzer invocation.
#[derive(Debug, Clone, Default)]
pub struct AnalysisConfig {
    /// Literal lock-file paths. Non-empty selects explicit-path mode:
    /// used verbatim, no listing call, existence unverified.
    pub paths: Vec<String>,
    /// Search scopes for auto-search mode; empty means the whole repository.
    /// A non-empty scope is a plain string-prefix test on the path, so scope
    /// `backend` also matches `backendx/poetry.lock`.
    pub scopes: Vec<String>,
}

impl AnalysisConfig {
    pub fn explicit(paths: Vec<String>) -> Self {
        Self {
            paths,
            scopes: Vec::new(),
        }
    }
}

/// A format-specific lock-file analyzer.
///
/// Implementations supply the identifier, the lock-file name, and the
/// per-file parse; discovery and the fetch/parse loop are shared.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Stable identifier used for registry lookup and candidate stamping.
    fn name(&self) -> &'static str;

    /// Exact lock-file name this analyzer matches in auto-search mode.
    fn lock_file(&self) -> &'static str;

    /// Decode one lock file's content into dependency records.
    fn parse(&self, content: &str) -> anyhow::Result<Vec<DependencyRecord>>;

    /// Resolve the candidate files for one repository.
    ///
    /// Fails only if a listing call fails; an empty result is not an error.
    async fn discover_candidates(
        &self,
        ctx: &AnalysisContext,
        config: &AnalysisConfig,
    ) -> Result<Vec<CandidateFile>, AnalysisError> {
        if !config.paths.is_empty() {
            return Ok(config
                .paths
                .iter()
                .map(|path| self.candidate(path.clone()))
                .collect());
        }

        let scopes = if config.scopes.is_empty() {
            vec![String::new()]
        } else {
            config.scopes.clone()
        };

        let mut candidates = Vec::new();
        for scope in &scopes {
            let entries = ctx.list().await.map_err(|source| AnalysisError::Discovery {
                owner: ctx.owner.clone(),
                repository: ctx.repository.clone(),
                reference: ctx.reference.clone(),
                source,
            })?;

            for entry in entries {
                if entry.kind != EntryKind::File {
                    continue;
                }
                if !entry.path.ends_with(self.lock_file()) {
                    continue;
                }
                if !scope.is_empty() && !entry.path.starts_with(scope.as_str()) {
                    continue;
                }
                candidates.push(self.candidate(entry.path));
            }
        }

        Ok(candidates)
    }

    /// Fetch and parse every candidate, keyed by path.
    ///
    /// A candidate whose fetch or parse fails is logged and omitted; the
    /// call itself still succeeds. Callers compare the map size against the
    /// candidate count to detect partial loss.
    async fn analyze(
        &self,
        ctx: &AnalysisContext,
        candidates: &[CandidateFile],
    ) -> Result<HashMap<String, Vec<DependencyRecord>>, AnalysisError> {
        let mut results = HashMap::with_capacity(candidates.len());

        for candidate in candidates {
            let content = match ctx.content(&candidate.path).await {
                Ok(content) => content,
                Err(source) => {
                    let err = ParseError::Fetch {
                        path: candidate.path.clone(),
                        source,
                    };
                    warn!(analyzer = self.name(), "skipping candidate: {}", err);
                    continue;
                }
            };

            match self.parse(&content) {
                Ok(records) => {
                    results.insert(candidate.path.clone(), records);
                }
                Err(source) => {
                    let err = ParseError::Decode {
                        path: candidate.path.clone(),
                        message: source.to_string(),
                    };
                    warn!(analyzer = self.name(), "skipping candidate: {}", err);
                }
            }
        }

        Ok(results)
    }

    /// Stamp a path as a candidate of this analyzer.
    fn candidate(&self, path: String) -> CandidateFile {
        CandidateFile {
            path,
            format: self.lock_file().to_string(),
            analyzer: self.name().to_string(),
        }
    }
}

type AnalyzerFactory = Box<dyn Fn() -> Box<dyn Analyzer> + Send + Sync>;

/// Closed registry mapping analyzer identifiers to constructors.
///
/// Adding a format is a `register` call; nothing here grows a conditional.
pub struct AnalyzerRegistry {
    factories: HashMap<String, AnalyzerFactory>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry pre-loaded with the three built-in formats.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("poetry", || Box::new(poetry::PoetryAnalyzer::new()));
        registry.register("pipfile", || Box::new(pipfile::PipfileAnalyzer::new()));
        registry.register("uv", || Box::new(uv::UvAnalyzer::new()));
        registry
    }

    pub fn register(
        &mut self,
        id: &str,
        factory: impl Fn() -> Box<dyn Analyzer> + Send + Sync + 'static,
    ) {
        self.factories.insert(id.to_string(), Box::new(factory));
    }

    pub fn create(&self, id: &str) -> Result<Box<dyn Analyzer>, AnalysisError> {
        self.factories
            .get(id)
            .map(|factory| factory())
            .ok_or_else(|| AnalysisError::UnknownAnalyzer(id.to_string()))
    }

    /// Registered identifiers, sorted for stable display.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort();
        ids
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
