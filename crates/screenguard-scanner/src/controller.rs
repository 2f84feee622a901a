//! The scan pass state machine.
//!
//! ```text
//!           start (init, rescan, debounced mutation)
//!   Idle ─────────────────────────────────────────► Scanning
//!    ▲   clear → walk → classify → mask → score        │
//!    └────────────────── publish ◄─────────────────────┘
//! ```
//!
//! `Disabled` is an orthogonal gate: disabling clears every overlay at once
//! and invalidates any pass still in flight.
//!
//! Each pass carries a generation number. Every await point is followed by a
//! generation check, so a pass superseded by a newer one stops before it can
//! touch the store again.

use crate::error::{Result, ScanError};
use crate::images::{HttpImageFetcher, ImageFetcher, ImagePipeline, VerdictCache};
use crate::messaging::{ControlRequest, ControlResponse, ReportSink, ScanReport, StatusReport};
use crate::session::ScanSession;
use crate::tracking::TrackingAnalyzer;
use screenguard_classifier::{Classifier, ClassifierMode};
use screenguard_core::{AppConfig, Finding, PiiType, UserSettings};
use screenguard_page::{
    collect_image_units, FindingStore, ImageUnit, OverlayId, OverlayRenderer, Page, TextWalker,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;

/// Scan phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    /// Waiting for a trigger
    Idle,
    /// A pass is running
    Scanning,
}

/// Orchestrates scan passes over one page.
pub struct ScanController {
    page: Arc<dyn Page>,
    classifier: Arc<dyn Classifier>,
    store: Mutex<FindingStore>,
    walker: TextWalker,
    images: ImagePipeline,
    tracker: Option<Arc<dyn TrackingAnalyzer>>,
    sink: Arc<dyn ReportSink>,
    settings: RwLock<UserSettings>,
    generation: AtomicU64,
    scanning: AtomicBool,
    initialized: AtomicBool,
    last_report: RwLock<Option<ScanReport>>,
    reveal_duration: Duration,
}

impl ScanController {
    /// Create a controller fetching images over HTTP.
    pub fn new(
        page: Arc<dyn Page>,
        classifier: Arc<dyn Classifier>,
        config: &AppConfig,
        sink: Arc<dyn ReportSink>,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(config.images.fetch_timeout_secs);
        let fetcher = HttpImageFetcher::new(timeout)?;
        Ok(Self::with_fetcher(
            page,
            classifier,
            config,
            sink,
            Arc::new(fetcher),
        ))
    }

    /// Create a controller with a custom image source.
    #[must_use]
    pub fn with_fetcher(
        page: Arc<dyn Page>,
        classifier: Arc<dyn Classifier>,
        config: &AppConfig,
        sink: Arc<dyn ReportSink>,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Self {
        let renderer = OverlayRenderer::new(page.clone(), &config.scanning, &config.images);
        Self {
            page,
            classifier,
            store: Mutex::new(FindingStore::new(renderer)),
            walker: TextWalker::new(&config.scanning),
            images: ImagePipeline::new(
                fetcher,
                Arc::new(VerdictCache::new()),
                config.images.clone(),
            ),
            tracker: None,
            sink,
            settings: RwLock::new(config.settings.clone()),
            generation: AtomicU64::new(0),
            scanning: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            last_report: RwLock::new(None),
            reveal_duration: Duration::from_millis(config.scanning.reveal_duration_ms),
        }
    }

    /// Attach a tracking analyzer.
    #[must_use]
    pub fn with_tracker(mut self, tracker: Arc<dyn TrackingAnalyzer>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Share an existing verdict cache.
    #[must_use]
    pub fn with_verdict_cache(mut self, cache: Arc<VerdictCache>) -> Self {
        self.images = self.images.with_cache(cache);
        self
    }

    /// Classifier used for every pass.
    #[must_use]
    pub fn classifier(&self) -> &Arc<dyn Classifier> {
        &self.classifier
    }

    /// Page being scanned.
    #[must_use]
    pub fn page(&self) -> &Arc<dyn Page> {
        &self.page
    }

    /// Verdict cache shared by every pass.
    #[must_use]
    pub fn verdict_cache(&self) -> &Arc<VerdictCache> {
        self.images.cache()
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> ScanPhase {
        if self.scanning.load(Ordering::SeqCst) {
            ScanPhase::Scanning
        } else {
            ScanPhase::Idle
        }
    }

    /// Generation of the most recent pass.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Snapshot of the user settings.
    #[must_use]
    pub fn settings(&self) -> UserSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether scanning is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .enabled
    }

    /// Whether classifier initialization has finished.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Report of the last completed pass.
    #[must_use]
    pub fn last_report(&self) -> Option<ScanReport> {
        self.last_report
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Overlays currently drawn.
    #[must_use]
    pub fn overlay_count(&self) -> usize {
        self.store().overlay_count()
    }

    /// Run classifier initialization.
    pub async fn initialize(&self) -> ClassifierMode {
        let mode = self.classifier.initialize().await;
        self.initialized.store(true, Ordering::SeqCst);
        tracing::info!("Classifier initialized in {} mode", mode);
        mode
    }

    /// Run one full pass.
    ///
    /// Returns `Ok(None)` when scanning is disabled and
    /// [`ScanError::StaleGeneration`] when a newer pass superseded this one.
    pub async fn run_scan(&self) -> Result<Option<ScanReport>> {
        let settings = self.settings();
        if !settings.enabled {
            tracing::debug!("Scanning disabled, skipping pass");
            return Ok(None);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.scanning.store(true, Ordering::SeqCst);
        let result = self.scan_pass(generation, &settings).await;
        if self.generation() == generation {
            self.scanning.store(false, Ordering::SeqCst);
        }

        let report = result?;
        self.ensure_current(generation)?;
        *self
            .last_report
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(report.clone());
        self.sink.publish(&report).await?;
        Ok(Some(report))
    }

    /// Run a pass, logging instead of returning errors. Returns false only
    /// when the pass failed for a reason other than being superseded.
    pub async fn scan_logged(&self) -> bool {
        match self.run_scan().await {
            Ok(_) => true,
            Err(e) if e.is_stale() => {
                tracing::debug!("{}", e);
                true
            }
            Err(e) => {
                tracing::warn!("Scan pass failed: {}", e);
                false
            }
        }
    }

    async fn scan_pass(&self, generation: u64, settings: &UserSettings) -> Result<ScanReport> {
        let mut session = ScanSession::new(generation);
        self.store().clear_all();

        self.scan_text(&mut session, settings).await?;
        if settings.image_moderation {
            self.scan_images(&mut session).await?;
        }

        if let Some(tracker) = &self.tracker {
            if let Some(info) = tracker.analyze(self.page.as_ref()).await {
                session.set_tracking(info);
            }
            self.ensure_current(generation)?;
        }

        let report = session.report();
        tracing::info!(
            "Scan pass {} complete: {} findings, {} images masked, privacy {}, safety {}",
            generation,
            report.count,
            session.masked_images(),
            report.privacy_score,
            report.safety_score
        );
        Ok(report)
    }

    async fn scan_text(&self, session: &mut ScanSession, settings: &UserSettings) -> Result<()> {
        let units = self
            .walker
            .collect_text_units(self.page.as_ref(), self.page.root());
        tracing::debug!("Pass {}: {} text units", session.generation(), units.len());

        for unit in units {
            if !session.mark_processed(unit.node) {
                continue;
            }

            let findings = match self.classifier.detect_text(&unit.text).await {
                Ok(findings) => findings,
                Err(e) => {
                    tracing::warn!("Classification failed for {}: {}", unit.node, e);
                    continue;
                }
            };

            let accepted = accept_findings(findings, &unit.text, settings);
            // Checked under the store lock so a disable cannot slip in between
            let mut store = self.store();
            self.ensure_current(session.generation())?;
            if accepted.is_empty() {
                continue;
            }
            session.record_findings(&accepted);
            let drawn = store.set_findings(unit.node, accepted);
            tracing::debug!("Masked {} with {} overlays", unit.node, drawn);
        }
        Ok(())
    }

    async fn scan_images(&self, session: &mut ScanSession) -> Result<()> {
        let candidates: Vec<ImageUnit> =
            collect_image_units(self.page.as_ref(), self.page.root())
                .into_iter()
                .filter(|unit| self.images.should_consider(unit))
                .filter(|unit| session.mark_processed(unit.node))
                .collect();
        if candidates.is_empty() {
            return Ok(());
        }

        let payloads = self.images.fetch_all(&candidates).await;
        self.ensure_current(session.generation())?;

        for (unit, payload) in candidates.into_iter().zip(payloads) {
            let Some(bytes) = payload else {
                continue;
            };
            let verdict = self.images.judge(&bytes, self.classifier.as_ref()).await;
            let mut store = self.store();
            self.ensure_current(session.generation())?;

            if !self.images.should_mask(&verdict) {
                continue;
            }
            if store.set_image_verdict(unit.node, verdict.clone()).is_some() {
                session.record_masked_image(&verdict);
            }
        }
        Ok(())
    }

    /// Enable or disable scanning.
    ///
    /// Disabling clears every overlay and invalidates in-flight passes.
    /// Re-enabling does not scan by itself.
    pub fn set_enabled(&self, enabled: bool) {
        self.settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .enabled = enabled;
        if !enabled {
            let mut store = self.store();
            self.generation.fetch_add(1, Ordering::SeqCst);
            self.scanning.store(false, Ordering::SeqCst);
            store.clear_all();
            drop(store);
            *self
                .last_report
                .write()
                .unwrap_or_else(PoisonError::into_inner) = None;
            tracing::info!("Scanning disabled, overlays cleared");
        }
    }

    /// Enable or disable one PII type for subsequent passes.
    pub fn set_filter(&self, kind: PiiType, enabled: bool) {
        self.settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set_filter(kind, enabled);
        tracing::debug!("Filter {} set to {}", kind, enabled);
    }

    /// Live status.
    #[must_use]
    pub fn status(&self) -> StatusReport {
        let report = self
            .last_report()
            .unwrap_or_else(|| ScanSession::new(0).report());
        StatusReport {
            enabled: self.is_enabled(),
            initialized: self.is_initialized(),
            classifier_mode: self.classifier.mode().to_string(),
            masked_count: self.overlay_count(),
            count: report.count,
            privacy_score: report.privacy_score,
            safety_score: report.safety_score,
            pii_counts: report.pii_counts,
            image_safety_issues: report.image_safety_issues,
        }
    }

    /// Answer a control request.
    pub async fn handle(&self, request: ControlRequest) -> ControlResponse {
        tracing::debug!("Control request: {:?}", request);
        match request {
            ControlRequest::GetStatus => ControlResponse::Status(self.status()),
            ControlRequest::Toggle { enabled } => {
                self.set_enabled(enabled);
                if enabled {
                    self.scan_logged().await;
                }
                ControlResponse::ok()
            }
            ControlRequest::Rescan => ControlResponse::Ack {
                success: self.scan_logged().await,
            },
            ControlRequest::FilterChange { pii_type, enabled } => {
                self.set_filter(pii_type, enabled);
                ControlResponse::ok()
            }
        }
    }

    /// Prune overlays of detached units and move the rest to current geometry.
    pub fn reposition(&self) {
        let mut store = self.store();
        store.prune_detached();
        store.reposition_all();
    }

    /// Reveal an overlay. Returns the instant it should be masked again.
    pub fn reveal(&self, id: OverlayId) -> Option<Instant> {
        let now = Instant::now();
        self.store()
            .reveal(id, now, self.reveal_duration)
            .then(|| now + self.reveal_duration)
    }

    /// Re-mask overlays whose reveal window has ended.
    pub fn expire_reveals(&self) -> Vec<OverlayId> {
        self.store().expire_reveals(Instant::now())
    }

    fn ensure_current(&self, generation: u64) -> Result<()> {
        let current = self.generation();
        if current == generation {
            Ok(())
        } else {
            Err(ScanError::StaleGeneration {
                generation,
                current,
            })
        }
    }

    fn store(&self) -> MutexGuard<'_, FindingStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keep findings that lie inside `text` and whose type is enabled.
#[must_use]
pub fn accept_findings(
    findings: Vec<Finding>,
    text: &str,
    settings: &UserSettings,
) -> Vec<Finding> {
    findings
        .into_iter()
        .filter(|finding| {
            if !finding.is_within(text) {
                tracing::debug!(
                    "Rejecting {} finding at {}..{}",
                    finding.kind,
                    finding.start,
                    finding.end
                );
                return false;
            }
            settings.is_filter_enabled(finding.kind)
        })
        .collect()
}
