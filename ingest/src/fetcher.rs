//! Document download with retry, backoff, and primary/alternate URL fallback.
//!
//! A failed fetch is not an error: callers get `None` and skip the filing.
//! The retry flow is an explicit state machine (TryPrimary -> TryAlternate ->
//! Backoff -> Failed) with a bounded attempt count per URL.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of a single HTTP attempt. 404 is distinguished from other
/// failures because it drives the folder fallback rather than a retry.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Success(Vec<u8>),
    NotFound,
    Failed(String),
}

/// Seam over HTTP so retry behavior is testable without a network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> FetchOutcome;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> FetchOutcome {
        match self.client.get(url).send().await {
            Ok(res) if res.status() == reqwest::StatusCode::NOT_FOUND => FetchOutcome::NotFound,
            Ok(res) if res.status().is_success() => match res.bytes().await {
                Ok(bytes) => FetchOutcome::Success(bytes.to_vec()),
                Err(e) => FetchOutcome::Failed(e.to_string()),
            },
            Ok(res) => FetchOutcome::Failed(format!("status {}", res.status())),
            Err(e) => FetchOutcome::Failed(e.to_string()),
        }
    }
}

/// Blob cache keyed by document id, checked before any network call.
pub trait DocumentCache: Send + Sync {
    fn get(&self, doc_id: &str) -> Option<Vec<u8>>;
    fn put(&self, doc_id: &str, bytes: &[u8]);
}

#[derive(Default)]
pub struct MemoryCache {
    inner: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentCache for MemoryCache {
    fn get(&self, doc_id: &str) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().get(doc_id).cloned()
    }

    fn put(&self, doc_id: &str, bytes: &[u8]) {
        self.inner.lock().unwrap().insert(doc_id.to_string(), bytes.to_vec());
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FetchStep {
    TryPrimary,
    TryAlternate { attempt: u32 },
    Backoff { attempt: u32, alternate: bool },
    Failed,
}

pub struct Fetcher {
    transport: Arc<dyn Transport>,
    cache: Option<Arc<dyn DocumentCache>>,
    retry_attempts: u32,
    backoff_base_ms: u64,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, retry_attempts: u32) -> Self {
        Self {
            transport,
            cache: None,
            retry_attempts: retry_attempts.max(1),
            backoff_base_ms: 500,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn DocumentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[cfg(test)]
    fn with_backoff_base_ms(mut self, ms: u64) -> Self {
        self.backoff_base_ms = ms;
        self
    }

    /// Download a document, trying the alternate URL once after a primary 404
    /// and retrying transient failures with exponential backoff. Exhausted
    /// retries yield `None`; callers treat that as "skip this filing".
    pub async fn fetch(&self, primary: &str, alternate: &str, doc_id: &str) -> Option<Vec<u8>> {
        if let Some(cache) = &self.cache {
            if let Some(bytes) = cache.get(doc_id) {
                debug!("cache hit for document {doc_id}");
                return Some(bytes);
            }
        }

        let mut step = FetchStep::TryPrimary;
        let mut primary_attempt: u32 = 0;

        loop {
            match step {
                FetchStep::TryPrimary => {
                    match self.transport.get(primary).await {
                        FetchOutcome::Success(bytes) => return self.store(doc_id, bytes),
                        FetchOutcome::NotFound => {
                            info!("primary URL 404 for {doc_id}, trying alternate folder");
                            step = FetchStep::TryAlternate { attempt: 0 };
                        }
                        FetchOutcome::Failed(err) => {
                            primary_attempt += 1;
                            warn!("download attempt {primary_attempt} failed for {primary}: {err}");
                            step = if primary_attempt >= self.retry_attempts {
                                FetchStep::Failed
                            } else {
                                FetchStep::Backoff { attempt: primary_attempt, alternate: false }
                            };
                        }
                    }
                }
                FetchStep::TryAlternate { attempt } => {
                    match self.transport.get(alternate).await {
                        FetchOutcome::Success(bytes) => {
                            info!("used fallback URL {alternate}");
                            return self.store(doc_id, bytes);
                        }
                        FetchOutcome::NotFound => {
                            warn!("document {doc_id} missing from both folders");
                            step = FetchStep::Failed;
                        }
                        FetchOutcome::Failed(err) => {
                            let attempt = attempt + 1;
                            warn!("download attempt {attempt} failed for {alternate}: {err}");
                            step = if attempt >= self.retry_attempts {
                                FetchStep::Failed
                            } else {
                                FetchStep::Backoff { attempt, alternate: true }
                            };
                        }
                    }
                }
                FetchStep::Backoff { attempt, alternate } => {
                    let delay = self.backoff_base_ms * 2u64.pow(attempt.saturating_sub(1));
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    step = if alternate {
                        FetchStep::TryAlternate { attempt }
                    } else {
                        FetchStep::TryPrimary
                    };
                }
                FetchStep::Failed => {
                    warn!("giving up on document {doc_id} after exhausting retries");
                    return None;
                }
            }
        }
    }

    fn store(&self, doc_id: &str, bytes: Vec<u8>) -> Option<Vec<u8>> {
        if let Some(cache) = &self.cache {
            cache.put(doc_id, &bytes);
        }
        Some(bytes)
    }
}
