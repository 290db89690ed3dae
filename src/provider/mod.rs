use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ProviderError;

pub mod github;
pub mod gitlab;

/// A file-tree entry returned by a provider listing.
#[derive(Debug, Clone, PartialEq)]
pub struct RepoEntry {
    pub path: String,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntryKind {
    File,
    Dir,
}

/// Read-only access to a hosted repository's file tree and file contents.
///
/// Implementations are stateless and shared across concurrent jobs; any
/// internal synchronization is their own concern.
#[async_trait]
pub trait RepositoryFiles: Send + Sync {
    /// List every file and directory reachable from the repository root.
    async fn list_files_recursive(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
    ) -> Result<Vec<RepoEntry>, ProviderError>;

    /// Fetch one file's text content.
    async fn file_content(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
        path: &str,
    ) -> Result<String, ProviderError>;
}

/// Build a provider client from its identifier.
pub fn create_provider(
    id: &str,
    token: Option<&str>,
) -> Result<Arc<dyn RepositoryFiles>, ProviderError> {
    match id {
        "github" => Ok(Arc::new(github::GithubFiles::new(token)?)),
        "gitlab" => Ok(Arc::new(gitlab::GitlabFiles::new(token)?)),
        other => Err(ProviderError::UnknownProvider(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_known_providers() {
        assert!(create_provider("github", None).is_ok());
        assert!(create_provider("gitlab", Some("glpat-x")).is_ok());
    }

    #[test]
    fn test_create_unknown_provider_fails() {
        let err = create_provider("bitbucket", None).err().unwrap();
        assert!(matches!(err, ProviderError::UnknownProvider(ref id) if id == "bitbucket"));
    }
}
