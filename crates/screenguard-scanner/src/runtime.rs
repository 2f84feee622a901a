//! Event loop tying the change monitor and the control surface to the
//! scan controller.

use crate::controller::ScanController;
use crate::error::{Result, ScanError};
use crate::messaging::{ControlRequest, ControlResponse};
use futures::FutureExt;
use screenguard_classifier::{ClassifierMode, FallbackReason};
use screenguard_page::{ChangeMonitor, OverlayId, ScheduledAction};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// A control request with its reply slot.
#[derive(Debug)]
pub struct ControlMessage {
    /// Request
    pub request: ControlRequest,
    /// Where the response goes
    pub reply: oneshot::Sender<ControlResponse>,
}

/// Client side of the control channel.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::UnboundedSender<ControlMessage>,
}

impl ControlHandle {
    /// Send a request and wait for the reply.
    pub async fn request(&self, request: ControlRequest) -> Result<ControlResponse> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(ControlMessage { request, reply })
            .map_err(|_| ScanError::RuntimeStopped)?;
        response.await.map_err(|_| ScanError::RuntimeStopped)
    }
}

/// Create a control channel.
#[must_use]
pub fn control_channel() -> (ControlHandle, mpsc::UnboundedReceiver<ControlMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ControlHandle { tx }, rx)
}

/// Consumer of scheduled actions and control requests.
pub struct Runtime {
    controller: Arc<ScanController>,
}

impl Runtime {
    /// Create a runtime for `controller`.
    #[must_use]
    pub fn new(controller: Arc<ScanController>) -> Self {
        Self { controller }
    }

    /// Start the monitor and the event loop on background tasks.
    pub fn spawn(self, monitor: ChangeMonitor) -> (ControlHandle, JoinHandle<()>) {
        let (actions, _monitor_task) = monitor.spawn();
        let (handle, control) = control_channel();
        let task = tokio::spawn(self.run(actions, control));
        (handle, task)
    }

    /// Start classifier initialization, run the first pass on whatever the
    /// classifier offers right now, then serve events until both inputs
    /// close.
    ///
    /// Initialization runs beside the event loop. Passes and control
    /// requests are served on the pattern fallback until it settles, and a
    /// pass is rerun once the model session comes up.
    pub async fn run(
        self,
        mut actions: mpsc::UnboundedReceiver<ScheduledAction>,
        mut control: mpsc::UnboundedReceiver<ControlMessage>,
    ) {
        self.spawn_startup();

        loop {
            tokio::select! {
                Some(action) = actions.recv() => self.dispatch(action),
                Some(message) = control.recv() => self.spawn_control(message),
                else => break,
            }
        }

        tracing::debug!("Runtime stopped");
    }

    fn dispatch(&self, action: ScheduledAction) {
        match action {
            ScheduledAction::Rescan => self.spawn_scan(),
            ScheduledAction::Reposition => self.controller.reposition(),
            ScheduledAction::Reveal(id) => self.reveal(id),
        }
    }

    fn spawn_startup(&self) {
        let controller = self.controller.clone();
        tokio::spawn(async move {
            let mut init = Box::pin(controller.initialize());
            if (&mut init).now_or_never().is_some() {
                controller.scan_logged().await;
                return;
            }

            // Scan on the fallback while the model comes up
            let (_, mode) = tokio::join!(controller.scan_logged(), init);
            if mode.is_primary() {
                controller.scan_logged().await;
            }
        });
    }

    fn spawn_initialize(&self) {
        let controller = self.controller.clone();
        tokio::spawn(async move {
            if controller.initialize().await.is_primary() {
                controller.scan_logged().await;
            }
        });
    }

    fn spawn_scan(&self) {
        let controller = self.controller.clone();
        tokio::spawn(async move {
            controller.scan_logged().await;
        });
    }

    fn spawn_control(&self, message: ControlMessage) {
        let controller = self.controller.clone();
        tokio::spawn(async move {
            let response = controller.handle(message.request).await;
            if message.reply.send(response).is_err() {
                tracing::debug!("Control requester went away");
            }
        });
    }

    fn reveal(&self, id: OverlayId) {
        if let Some(deadline) = self.controller.reveal(id) {
            let controller = self.controller.clone();
            tokio::spawn(async move {
                tokio::time::sleep_until(deadline).await;
                let expired = controller.expire_reveals();
                tracing::trace!("Re-masked {} overlays", expired.len());
            });
        }

        // Activating an overlay is a user gesture
        let classifier = self.controller.classifier().clone();
        classifier.notify_user_activation();
        if classifier.mode() == ClassifierMode::Fallback(FallbackReason::AwaitingActivation) {
            self.spawn_initialize();
        }
    }
}
