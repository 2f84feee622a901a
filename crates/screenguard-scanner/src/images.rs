//! Image moderation: fetching, content hashing and the verdict cache.

use crate::error::{Result, ScanError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::stream::{self, StreamExt};
use screenguard_classifier::Classifier;
use screenguard_core::{ImageConfig, ImageVerdict};
use screenguard_page::ImageUnit;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Images fetched concurrently per pass.
const MAX_CONCURRENT_FETCHES: usize = 4;

/// Source of image bytes.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch the payload behind `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetches images over HTTP and decodes `data:` URLs locally.
pub struct HttpImageFetcher {
    client: reqwest::Client,
    base_url: Option<reqwest::Url>,
}

impl HttpImageFetcher {
    /// Create a fetcher with a per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: None,
        })
    }

    /// Resolve relative image URLs against `base`.
    #[must_use]
    pub fn with_base_url(mut self, base: reqwest::Url) -> Self {
        self.base_url = Some(base);
        self
    }

    fn resolve(&self, url: &str) -> Result<reqwest::Url> {
        let parsed = match &self.base_url {
            Some(base) => base.join(url),
            None => reqwest::Url::parse(url),
        };
        parsed.map_err(|e| ScanError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if url.starts_with("data:") {
            return decode_data_url(url);
        }

        let target = self.resolve(url)?;
        let fail = |e: reqwest::Error| ScanError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        };
        let response = self
            .client
            .get(target)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(fail)?;
        let bytes = response.bytes().await.map_err(fail)?;
        Ok(bytes.to_vec())
    }
}

/// Decode the payload of a `data:` URL.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let fail = |reason: &str| ScanError::Fetch {
        url: url.chars().take(64).collect(),
        reason: reason.to_string(),
    };
    let rest = url.strip_prefix("data:").ok_or_else(|| fail("not a data URL"))?;
    let (meta, payload) = rest.split_once(',').ok_or_else(|| fail("missing payload"))?;

    if meta.ends_with(";base64") {
        STANDARD
            .decode(payload.trim())
            .map_err(|e| fail(&e.to_string()))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

/// SHA-256 hex digest of an image payload.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Whether the URL path ends in one of `extensions`.
#[must_use]
pub fn has_skipped_extension(url: &str, extensions: &[String]) -> bool {
    if url.starts_with("data:") {
        return false;
    }
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let Some((_, ext)) = path.rsplit_once('.') else {
        return false;
    };
    if ext.contains('/') {
        return false;
    }
    extensions.iter().any(|skip| skip.eq_ignore_ascii_case(ext))
}

/// Process-wide, append-only verdict cache keyed by content hash.
///
/// Only known verdicts are stored so an unavailable classifier never
/// poisons the cache.
#[derive(Debug, Default)]
pub struct VerdictCache {
    entries: RwLock<HashMap<String, ImageVerdict>>,
}

impl VerdictCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached verdict for `hash`.
    #[must_use]
    pub fn get(&self, hash: &str) -> Option<ImageVerdict> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(hash)
            .cloned()
    }

    /// Store a verdict. Existing entries are never replaced.
    pub fn insert(&self, hash: String, verdict: ImageVerdict) {
        if !verdict.is_known() {
            return;
        }
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(hash)
            .or_insert(verdict);
    }

    /// Number of cached verdicts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Gating, fetching and classification of page images.
pub struct ImagePipeline {
    fetcher: Arc<dyn ImageFetcher>,
    cache: Arc<VerdictCache>,
    config: ImageConfig,
}

impl ImagePipeline {
    /// Create a pipeline.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn ImageFetcher>,
        cache: Arc<VerdictCache>,
        config: ImageConfig,
    ) -> Self {
        Self {
            fetcher,
            cache,
            config,
        }
    }

    /// Use `cache` instead of the current one.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<VerdictCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Shared verdict cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<VerdictCache> {
        &self.cache
    }

    /// Whether an image is worth fetching at all.
    #[must_use]
    pub fn should_consider(&self, unit: &ImageUnit) -> bool {
        unit.rect.is_renderable(self.config.min_visible_size)
            && !has_skipped_extension(&unit.source, &self.config.skip_extensions)
    }

    /// Whether a verdict is confident enough to mask.
    #[must_use]
    pub fn should_mask(&self, verdict: &ImageVerdict) -> bool {
        verdict.should_mask(self.config.confidence_threshold)
    }

    /// Fetch every unit, a few at a time, preserving order.
    ///
    /// Failed fetches and payloads below the size floor come back as `None`.
    pub async fn fetch_all(&self, units: &[ImageUnit]) -> Vec<Option<Vec<u8>>> {
        stream::iter(units.iter().cloned())
            .map(|unit| async move { self.fetch_one(&unit).await })
            .buffered(MAX_CONCURRENT_FETCHES)
            .collect()
            .await
    }

    async fn fetch_one(&self, unit: &ImageUnit) -> Option<Vec<u8>> {
        match self.fetcher.fetch(&unit.source).await {
            Ok(bytes) if bytes.len() < self.config.min_image_bytes => {
                tracing::debug!(
                    "Skipping {} for {}: {} bytes",
                    unit.source,
                    unit.node,
                    bytes.len()
                );
                None
            }
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!("Skipping image {}: {}", unit.node, e);
                None
            }
        }
    }

    /// Verdict for a payload, classifying only on a cache miss.
    pub async fn judge(&self, bytes: &[u8], classifier: &dyn Classifier) -> ImageVerdict {
        let hash = content_hash(bytes);
        if let Some(verdict) = self.cache.get(&hash) {
            tracing::debug!("Verdict cache hit for {}", &hash[..12]);
            return verdict;
        }

        let verdict = classifier.classify_image(bytes).await;
        self.cache.insert(hash, verdict.clone());
        verdict
    }
}
