use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{EntryKind, RepoEntry, RepositoryFiles};
use crate::error::ProviderError;

const API_ROOT: &str = "https://gitlab.com/api/v4";
const USER_AGENT: &str = concat!("depmatrix/", env!("CARGO_PKG_VERSION"));
const PER_PAGE: usize = 100;

/// GitLab v4 client; projects are addressed as URL-encoded `owner/repo`.
pub struct GitlabFiles {
    client: Client,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

impl GitlabFiles {
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
            req = req.header("PRIVATE-TOKEN", token);
        }
        req
    }
}

/// Percent-encode a path component the way the GitLab API expects:
/// everything outside the unreserved set, including `/`, is escaped.
fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn project_id(owner: &str, repo: &str) -> String {
    encode_component(&format!("{}/{}", owner, repo))
}

#[async_trait]
impl RepositoryFiles for GitlabFiles {
    async fn list_files_recursive(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
    ) -> Result<Vec<RepoEntry>, ProviderError> {
        let mut entries = Vec::new();
        let mut page = 1usize;

        loop {
            let url = format!(
                "{}/projects/{}/repository/tree?recursive=true&ref={}&per_page={}&page={}",
                API_ROOT,
                project_id(owner, repo),
                reference,
                PER_PAGE,
                page
            );
            let response = self.get(&url).send().await?;

            if !response.status().is_success() {
                return Err(ProviderError::Status {
                    status: response.status(),
                    url,
                });
            }

            let batch: Vec<TreeEntry> = response.json().await?;
            let batch_len = batch.len();
            entries.extend(batch.into_iter().map(|e| RepoEntry {
                kind: if e.kind == "blob" {
                    EntryKind::File
                } else {
                    EntryKind::Dir
                },
                path: e.path,
            }));

            if batch_len < PER_PAGE {
                return Ok(entries);
            }
            page += 1;
        }
    }

    async fn file_content(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
        path: &str,
    ) -> Result<String, ProviderError> {
        let url = format!(
            "{}/projects/{}/repository/files/{}/raw?ref={}",
            API_ROOT,
            project_id(owner, repo),
            encode_component(path),
            reference
        );
        let response = self.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                status: response.status(),
                url,
            });
        }

        Ok(response.text().await?)
    }
}
