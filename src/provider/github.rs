use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{EntryKind, RepoEntry, RepositoryFiles};
use crate::error::ProviderError;

const API_ROOT: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("depmatrix/", env!("CARGO_PKG_VERSION"));

/// GitHub REST v3 client for tree listings and raw file content.
pub struct GithubFiles {
    client: Client,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

impl GithubFiles {
    pub fn new(token: Option<&str>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            token: token.map(str::to_string),
        })
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.get(url).header("User-Agent", USER_AGENT);
        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }
        req
    }
}

/// Map a git tree entry type to ours: `blob` is a file, `tree` a directory.
/// Submodule (`commit`) entries have no readable content and count as dirs.
fn entry_kind(kind: &str) -> EntryKind {
    if kind == "blob" {
        EntryKind::File
    } else {
        EntryKind::Dir
    }
}

fn parse_tree(response: TreeResponse) -> Vec<RepoEntry> {
    response
        .tree
        .into_iter()
        .map(|e| RepoEntry {
            path: e.path,
            kind: entry_kind(&e.kind),
        })
        .collect()
}

#[async_trait]
impl RepositoryFiles for GithubFiles {
    async fn list_files_recursive(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
    ) -> Result<Vec<RepoEntry>, ProviderError> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            API_ROOT, owner, repo, reference
        );
        let response = self.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                status: response.status(),
                url,
            });
        }

        let tree: TreeResponse = response.json().await?;
        Ok(parse_tree(tree))
    }

    async fn file_content(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
        path: &str,
    ) -> Result<String, ProviderError> {
        let url = format!(
            "{}/repos/{}/{}/contents/{}?ref={}",
            API_ROOT, owner, repo, path, reference
        );
        let response = self
            .get(&url)
            .header("Accept", "application/vnd.github.raw+json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                status: response.status(),
                url,
            });
        }

        Ok(response.text().await?)
    }
}
