//! Classifier capability with lazy upgrade and per-call fallback.

use crate::error::{ClassifierError, Result};
use crate::patterns::PatternDetector;
use crate::prompts;
use crate::provider::{Availability, ModelProvider, ModelSession, PromptRequest, SessionOptions};
use crate::response;
use async_trait::async_trait;
use screenguard_core::text::char_len;
use screenguard_core::{Finding, ImageVerdict, ScanningConfig};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;

/// Why the classifier is running on pattern fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// No model provider configured
    NoProvider,
    /// Provider reported the model as unusable
    Unavailable,
    /// Model download is waiting for a user gesture
    AwaitingActivation,
    /// Session creation failed
    InitFailed,
}

impl FallbackReason {
    /// Stable string form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoProvider => "no_provider",
            Self::Unavailable => "unavailable",
            Self::AwaitingActivation => "awaiting_activation",
            Self::InitFailed => "init_failed",
        }
    }
}

/// Informational classifier mode reported to the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassifierMode {
    /// `initialize()` has not completed yet; pattern fallback is used
    #[default]
    Uninitialized,
    /// Model session is live
    Primary,
    /// Pattern fallback for the session
    Fallback(FallbackReason),
}

impl ClassifierMode {
    /// Whether the model session is in use.
    #[must_use]
    pub fn is_primary(&self) -> bool {
        matches!(self, Self::Primary)
    }
}

impl fmt::Display for ClassifierMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("uninitialized"),
            Self::Primary => f.write_str("primary"),
            Self::Fallback(reason) => write!(f, "fallback ({})", reason.as_str()),
        }
    }
}

/// Classification capability used by the scan pipeline.
///
/// Implementations must be safe to call concurrently.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Try to bring up the primary classifier. Safe to call repeatedly.
    async fn initialize(&self) -> ClassifierMode;

    /// Detect PII in `text`, returning char-offset findings into `text`.
    async fn detect_text(&self, text: &str) -> Result<Vec<Finding>>;

    /// Judge an image payload. `unsafe = None` when no answer is available.
    async fn classify_image(&self, bytes: &[u8]) -> ImageVerdict;

    /// Current mode.
    fn mode(&self) -> ClassifierMode;

    /// Record that the user interacted with the page.
    fn notify_user_activation(&self);
}

#[derive(Default)]
struct ClassifierState {
    mode: ClassifierMode,
    text_session: Option<Arc<dyn ModelSession>>,
    image_session: Option<Arc<dyn ModelSession>>,
}

/// PII/image classifier backed by an optional model provider.
///
/// Usable immediately: until `initialize()` succeeds, and for any model call
/// that fails, times out or returns malformed output, detection falls back to
/// [`PatternDetector`].
pub struct PiiClassifier {
    provider: Option<Arc<dyn ModelProvider>>,
    patterns: PatternDetector,
    min_text_length: usize,
    call_timeout: Duration,
    require_user_activation: bool,
    user_activated: AtomicBool,
    init_latch: Mutex<()>,
    state: RwLock<ClassifierState>,
}

impl PiiClassifier {
    /// Create a classifier. Pass `None` to run on pattern fallback only.
    #[must_use]
    pub fn new(
        provider: Option<Arc<dyn ModelProvider>>,
        scanning: &ScanningConfig,
        require_user_activation: bool,
    ) -> Self {
        Self {
            provider,
            patterns: PatternDetector::new(),
            min_text_length: scanning.min_text_length,
            call_timeout: Duration::from_millis(scanning.classify_timeout_ms),
            require_user_activation,
            user_activated: AtomicBool::new(false),
            init_latch: Mutex::new(()),
            state: RwLock::new(ClassifierState::default()),
        }
    }

    fn text_session(&self) -> Option<Arc<dyn ModelSession>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .text_session
            .clone()
    }

    fn image_session(&self) -> Option<Arc<dyn ModelSession>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .image_session
            .clone()
    }

    fn set_mode(&self, mode: ClassifierMode) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).mode = mode;
    }

    async fn open_sessions(&self, provider: &dyn ModelProvider) -> Result<()> {
        let text = provider
            .create_session(SessionOptions::new(prompts::TEXT_SYSTEM_PROMPT))
            .await?;

        let image = if provider.capabilities().supports_vision {
            match provider.create_session(SessionOptions::default()).await {
                Ok(session) => Some(session),
                Err(e) => {
                    tracing::warn!("Image session unavailable, images will not be judged: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.text_session = Some(text);
        state.image_session = image;
        state.mode = ClassifierMode::Primary;
        Ok(())
    }

    async fn prompt_with_timeout(
        &self,
        session: &dyn ModelSession,
        request: PromptRequest,
    ) -> Result<String> {
        tokio::time::timeout(self.call_timeout, session.prompt(request))
            .await
            .map_err(|_| ClassifierError::Timeout {
                millis: u64::try_from(self.call_timeout.as_millis()).unwrap_or(u64::MAX),
            })?
    }

    async fn detect_with_model(&self, session: &dyn ModelSession, text: &str) -> Result<Vec<Finding>> {
        let request =
            PromptRequest::new(prompts::text_prompt(text)).with_schema(prompts::pii_schema());
        let raw = self.prompt_with_timeout(session, request).await?;
        response::parse_findings(&raw, text, self.provider_id())
    }

    fn provider_id(&self) -> &str {
        self.provider.as_ref().map_or("none", |p| p.provider_id())
    }
}

#[async_trait]
impl Classifier for PiiClassifier {
    async fn initialize(&self) -> ClassifierMode {
        // One attempt at a time; later callers see the settled mode
        let _latch = self.init_latch.lock().await;

        let current = self.mode();
        if current.is_primary() {
            return current;
        }

        let Some(provider) = self.provider.as_deref() else {
            let mode = ClassifierMode::Fallback(FallbackReason::NoProvider);
            self.set_mode(mode);
            return mode;
        };

        let availability = provider.availability().await;
        tracing::debug!("Provider {} availability: {:?}", provider.provider_id(), availability);

        let mode = match availability {
            Availability::Unavailable => ClassifierMode::Fallback(FallbackReason::Unavailable),
            Availability::Downloadable
                if self.require_user_activation
                    && !self.user_activated.load(Ordering::SeqCst) =>
            {
                ClassifierMode::Fallback(FallbackReason::AwaitingActivation)
            }
            Availability::Ready | Availability::Downloadable => {
                match self.open_sessions(provider).await {
                    Ok(()) => ClassifierMode::Primary,
                    Err(e) if e.is_capability_error() => {
                        tracing::info!("Classifier capability unavailable: {}", e);
                        ClassifierMode::Fallback(FallbackReason::Unavailable)
                    }
                    Err(e) => {
                        tracing::warn!("Classifier initialization failed: {}", e);
                        ClassifierMode::Fallback(FallbackReason::InitFailed)
                    }
                }
            }
        };

        self.set_mode(mode);
        tracing::info!("Classifier mode: {}", mode);
        mode
    }

    async fn detect_text(&self, text: &str) -> Result<Vec<Finding>> {
        if char_len(text.trim()) < self.min_text_length {
            return Ok(Vec::new());
        }

        if let Some(session) = self.text_session() {
            match self.detect_with_model(session.as_ref(), text).await {
                Ok(findings) => return Ok(findings),
                Err(e) => {
                    tracing::warn!("Model detection failed, using pattern fallback: {}", e);
                }
            }
        }

        Ok(self.patterns.detect(text))
    }

    async fn classify_image(&self, bytes: &[u8]) -> ImageVerdict {
        let Some(session) = self.image_session() else {
            return ImageVerdict::unavailable();
        };

        let request = PromptRequest::new(prompts::IMAGE_PROMPT)
            .with_image(bytes)
            .with_schema(prompts::image_schema());

        let verdict = match self.prompt_with_timeout(session.as_ref(), request).await {
            Ok(raw) => response::parse_verdict(&raw, self.provider_id()),
            Err(e) => Err(e),
        };

        verdict.unwrap_or_else(|e| {
            tracing::debug!("Image classification failed: {}", e);
            ImageVerdict::unavailable()
        })
    }

    fn mode(&self) -> ClassifierMode {
        self.state.read().unwrap_or_else(PoisonError::into_inner).mode
    }

    fn notify_user_activation(&self) {
        if !self.user_activated.swap(true, Ordering::SeqCst) {
            tracing::debug!("User activation received");
        }
    }
}
