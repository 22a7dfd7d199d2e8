//! Knowledge lookup: the external document search consumed by the prompt hook.
//!
//! Only the interface lives here. [`KnowledgeLookup`] is the seam the hook
//! callbacks use; [`HttpKnowledgeLookup`] talks to a search service over JSON,
//! and [`NoLookup`] stands in when no service is configured. Build one from
//! configuration with [`create_lookup`].

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::KnowledgeConfig;

/// One ranked document returned by a lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDoc {
    pub title: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub snippet: String,
    /// Cosine similarity in `[0, 1]`, higher is closer.
    pub similarity: f64,
}

#[async_trait]
pub trait KnowledgeLookup: Send + Sync {
    /// Return up to `limit` documents for `query`, best first.
    async fn lookup(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeDoc>>;

    /// `false` when there is no backing service and lookups are pointless.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Stand-in when no knowledge service is configured.
pub struct NoLookup;

#[async_trait]
impl KnowledgeLookup for NoLookup {
    async fn lookup(&self, _query: &str, _limit: usize) -> Result<Vec<KnowledgeDoc>> {
        Ok(Vec::new())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

#[derive(Serialize)]
struct LookupRequest<'a> {
    query: &'a str,
    limit: usize,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    results: Vec<KnowledgeDoc>,
}

/// JSON-over-HTTP lookup: `POST {url}` with `{"query", "limit"}`, expecting
/// `{"results": [...]}` back.
pub struct HttpKnowledgeLookup {
    url: String,
    client: reqwest::Client,
}

impl HttpKnowledgeLookup {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build knowledge lookup HTTP client")?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }
}

#[async_trait]
impl KnowledgeLookup for HttpKnowledgeLookup {
    async fn lookup(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeDoc>> {
        let response = self
            .client
            .post(&self.url)
            .json(&LookupRequest { query, limit })
            .send()
            .await
            .with_context(|| format!("knowledge lookup request to {} failed", self.url))?;

        if !response.status().is_success() {
            bail!("knowledge lookup returned HTTP {}", response.status());
        }

        let body: LookupResponse = response
            .json()
            .await
            .context("failed to parse knowledge lookup response")?;

        let mut results = body.results;
        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        results.truncate(limit);
        Ok(results)
    }
}

/// Create a lookup from config. No URL means [`NoLookup`].
pub fn create_lookup(config: &KnowledgeConfig) -> Result<Arc<dyn KnowledgeLookup>> {
    match config.url.as_deref().map(str::trim) {
        None | Some("") => Ok(Arc::new(NoLookup)),
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
            let lookup = HttpKnowledgeLookup::new(url, Duration::from_millis(config.timeout_ms))?;
            Ok(Arc::new(lookup))
        }
        Some(other) => bail!("unsupported knowledge lookup url: {other}. Expected http(s)://"),
    }
}

/// Keep documents at or above `min_similarity`, at most `max_results`, best first.
pub fn filter_relevant(
    mut docs: Vec<KnowledgeDoc>,
    min_similarity: f64,
    max_results: usize,
) -> Vec<KnowledgeDoc> {
    docs.retain(|d| d.similarity >= min_similarity);
    docs.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    docs.truncate(max_results);
    docs
}
