//! Shared fixtures for scanner integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use screenguard_classifier::{
    Availability, Classifier, ClassifierError, ClassifierMode, ModelProvider, ModelSession,
    PatternDetector, PromptRequest, ProviderCapabilities, SessionOptions,
};
use screenguard_core::{AppConfig, Finding, ImageCategory, ImageVerdict};
use screenguard_page::{MemoryPage, Page};
use screenguard_scanner::{ChannelReportSink, ImageFetcher, ScanController, ScanError, ScanReport};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

/// Holds the first text classification until released.
#[derive(Default)]
pub struct Gate {
    pub started: Notify,
    pub release: Notify,
}

/// Classifier that detects text with the pattern detector and judges every
/// image with a fixed verdict, counting calls.
pub struct MockClassifier {
    patterns: PatternDetector,
    verdict: ImageVerdict,
    fail_text: bool,
    gate: Option<Arc<Gate>>,
    mode: ClassifierMode,
    pub initializations: AtomicUsize,
    pub text_calls: AtomicUsize,
    pub image_calls: AtomicUsize,
    pub activations: AtomicUsize,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self {
            patterns: PatternDetector::new(),
            verdict: ImageVerdict::new(Some(false), [], 0.9),
            fail_text: false,
            gate: None,
            mode: ClassifierMode::Primary,
            initializations: AtomicUsize::new(0),
            text_calls: AtomicUsize::new(0),
            image_calls: AtomicUsize::new(0),
            activations: AtomicUsize::new(0),
        }
    }

    pub fn with_verdict(mut self, verdict: ImageVerdict) -> Self {
        self.verdict = verdict;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_text = true;
        self
    }

    pub fn gated(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn in_mode(mut self, mode: ClassifierMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::SeqCst)
    }

    pub fn text_calls(&self) -> usize {
        self.text_calls.load(Ordering::SeqCst)
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn initialize(&self) -> ClassifierMode {
        self.initializations.fetch_add(1, Ordering::SeqCst);
        self.mode
    }

    async fn detect_text(&self, text: &str) -> screenguard_classifier::Result<Vec<Finding>> {
        let call = self.text_calls.fetch_add(1, Ordering::SeqCst);
        if let (0, Some(gate)) = (call, &self.gate) {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        if self.fail_text {
            return Err(ClassifierError::Internal("model crashed".to_string()));
        }
        Ok(self.patterns.detect(text))
    }

    async fn classify_image(&self, _bytes: &[u8]) -> ImageVerdict {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        self.verdict.clone()
    }

    fn mode(&self) -> ClassifierMode {
        self.mode
    }

    fn notify_user_activation(&self) {
        self.activations.fetch_add(1, Ordering::SeqCst);
    }
}

/// Unsafe nudity verdict at 0.95 confidence.
pub fn nudity_verdict() -> ImageVerdict {
    ImageVerdict::new(Some(true), [ImageCategory::Nudity], 0.95)
}

/// Provider whose session answers every prompt with a fixed reply, or fails.
pub struct ScriptedProvider {
    reply: Option<String>,
    pub sessions: AtomicUsize,
}

impl ScriptedProvider {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            sessions: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            sessions: AtomicUsize::new(0),
        }
    }
}

struct ScriptedSession {
    reply: Option<String>,
}

#[async_trait]
impl ModelSession for ScriptedSession {
    async fn prompt(&self, _request: PromptRequest) -> screenguard_classifier::Result<String> {
        self.reply.clone().ok_or_else(|| ClassifierError::ApiError {
            provider: "scripted".to_string(),
            status: 500,
            message: "internal error".to_string(),
        })
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn availability(&self) -> Availability {
        Availability::Ready
    }

    async fn create_session(
        &self,
        _options: SessionOptions,
    ) -> screenguard_classifier::Result<Arc<dyn ModelSession>> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedSession {
            reply: self.reply.clone(),
        }))
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            model_name: "scripted".to_string(),
            is_local: true,
            supports_vision: false,
            supports_structured_output: true,
        }
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }
}

/// Provider whose session creation blocks until `release` is notified,
/// like a model that is still downloading.
pub struct PendingProvider {
    inner: ScriptedProvider,
    availability: Availability,
    pub release: Notify,
}

impl PendingProvider {
    pub fn replying(reply: &str) -> Self {
        Self {
            inner: ScriptedProvider::replying(reply),
            availability: Availability::Ready,
            release: Notify::new(),
        }
    }

    pub fn downloadable(mut self) -> Self {
        self.availability = Availability::Downloadable;
        self
    }

    pub fn sessions(&self) -> usize {
        self.inner.sessions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelProvider for PendingProvider {
    async fn availability(&self) -> Availability {
        self.availability
    }

    async fn create_session(
        &self,
        options: SessionOptions,
    ) -> screenguard_classifier::Result<Arc<dyn ModelSession>> {
        self.release.notified().await;
        self.inner.create_session(options).await
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.inner.capabilities()
    }

    fn provider_id(&self) -> &str {
        "pending"
    }
}

/// Serves fixed payloads by URL and counts fetches.
#[derive(Default)]
pub struct StaticFetcher {
    images: HashMap<String, Vec<u8>>,
    pub fetches: AtomicUsize,
    pub offline: AtomicBool,
}

impl StaticFetcher {
    pub fn with_image(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.images.insert(url.to_string(), bytes);
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> screenguard_scanner::Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(ScanError::Fetch {
                url: url.to_string(),
                reason: "network unreachable".to_string(),
            });
        }
        self.images.get(url).cloned().ok_or_else(|| ScanError::Fetch {
            url: url.to_string(),
            reason: "404".to_string(),
        })
    }
}

/// Controller wired to `page`, `classifier` and `fetcher`.
pub fn controller(
    page: &Arc<MemoryPage>,
    classifier: Arc<dyn Classifier>,
    fetcher: Arc<StaticFetcher>,
) -> (ScanController, mpsc::UnboundedReceiver<ScanReport>) {
    controller_with_config(page, classifier, fetcher, &AppConfig::default())
}

/// Controller with a custom configuration.
pub fn controller_with_config(
    page: &Arc<MemoryPage>,
    classifier: Arc<dyn Classifier>,
    fetcher: Arc<StaticFetcher>,
    config: &AppConfig,
) -> (ScanController, mpsc::UnboundedReceiver<ScanReport>) {
    let dyn_page: Arc<dyn Page> = page.clone();
    let (sink, reports) = ChannelReportSink::new();
    let controller =
        ScanController::with_fetcher(dyn_page, classifier, config, Arc::new(sink), fetcher);
    (controller, reports)
}
