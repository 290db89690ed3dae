use thiserror::Error;

/// Errors raised by a repository-content provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

/// Job-level analysis errors.
///
/// Per-file parse failures are deliberately absent here: a malformed lock
/// file is absorbed inside `Analyzer::analyze` and must not surface as a
/// job error.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("unknown analyzer: {0}")]
    UnknownAnalyzer(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("listing {owner}/{repository}@{reference} failed: {source}")]
    Discovery {
        owner: String,
        repository: String,
        reference: String,
        #[source]
        source: ProviderError,
    },

    #[error("cancelled")]
    Cancelled,
}

/// A single candidate file that could not be fetched or decoded.
///
/// Only ever logged; see the propagation rules above.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("fetching {path}: {source}")]
    Fetch {
        path: String,
        #[source]
        source: ProviderError,
    },

    #[error("decoding {path}: {message}")]
    Decode { path: String, message: String },
}
