//! Booth session flow
//!
//! Consent gate → capture → upload → result display, one way. Only the
//! upload identifier travels from the upload step to the display step,
//! carried by the `/image/{uuid}` route.

use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;

use super::console::{BoothConsole, TakeAction, TakeView};
use crate::api::{GalleryBackend, Uploader};
use crate::capture::image::timestamped_path;
use crate::capture::{CaptureSession, CapturedImage, FrameSource};
use crate::config::{BoothConfig, SaveLocation};
use crate::display::{DisplayPoller, PollSettings};
use crate::domain::{ConsentDecision, ConsentGate, Navigator, ReadyImage, Route, UploadProgress};
use crate::error::FlowError;

/// Opens the frame source once the visitor reaches the capture screen
pub type SourceOpener = Box<dyn FnMut() -> Result<Box<dyn FrameSource>, FlowError> + Send>;

#[derive(Debug, Clone, PartialEq)]
pub struct FlowSettings {
    pub consent_required: bool,
    pub poll: PollSettings,
    pub save_location: Option<SaveLocation>,
}

impl From<&BoothConfig> for FlowSettings {
    fn from(config: &BoothConfig) -> Self {
        Self {
            consent_required: config.consent_required,
            poll: PollSettings {
                probe_interval: config.poll_interval(),
                tick_interval: config.tick_interval(),
            },
            save_location: config.save_location,
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    /// Consent declined or closed; nothing was captured or uploaded
    Declined,
    /// Visitor went back to the start screen before uploading
    Abandoned,
    Completed {
        uuid: String,
        ready: ReadyImage,
        saved: Option<PathBuf>,
    },
}

pub struct Kiosk<B: GalleryBackend, C: BoothConsole> {
    backend: Arc<B>,
    uploader: Uploader<B>,
    opener: SourceOpener,
    capture: Option<CaptureSession>,
    console: C,
    consent: ConsentGate,
    navigator: Navigator,
    settings: FlowSettings,
}

impl<B: GalleryBackend, C: BoothConsole> Kiosk<B, C> {
    pub fn new(
        backend: Arc<B>,
        uploader: Uploader<B>,
        opener: SourceOpener,
        console: C,
        settings: FlowSettings,
    ) -> Self {
        Self {
            backend,
            uploader,
            opener,
            capture: None,
            console,
            consent: ConsentGate::new(),
            navigator: Navigator::new(),
            settings,
        }
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    #[cfg(test)]
    pub fn console(&self) -> &C {
        &self.console
    }

    /// Run one visitor through the booth
    pub async fn run(&mut self) -> anyhow::Result<Outcome> {
        self.navigator.navigate(Route::Start);
        self.navigator.navigate(Route::Take);

        if self.settings.consent_required && !self.gate_consent().await? {
            self.console.notify(&FlowError::ConsentDeclined);
            self.navigator.navigate(Route::Start);
            return Ok(Outcome::Declined);
        }

        let Some(uuid) = self.take_and_upload().await? else {
            self.navigator.navigate(Route::Start);
            return Ok(Outcome::Abandoned);
        };

        self.navigator.navigate(Route::Image(uuid.clone()));
        self.display(uuid).await
    }

    /// Prompt until the gate is decided. Not shown again once decided.
    async fn gate_consent(&mut self) -> anyhow::Result<bool> {
        while self.consent.needs_prompt() {
            let answer = self
                .console
                .ask_consent()
                .await
                .context("Failed to read consent answer")?;
            if let Err(err) = self.consent.apply(answer) {
                self.console.say(&err.to_string());
            }
        }
        if let ConsentDecision::Agreed(name) = self.consent.decision() {
            log::info!("Consent given by {}", name);
        }
        Ok(self.consent.is_agreed())
    }

    async fn take_and_upload(&mut self) -> anyhow::Result<Option<String>> {
        let opener = &mut self.opener;
        let capture = self.capture.get_or_insert_with(|| match opener() {
            Ok(source) => CaptureSession::new(source),
            Err(FlowError::Device(reason)) => CaptureSession::unavailable(reason),
            Err(other) => CaptureSession::unavailable(other.to_string()),
        });
        if let Some(reason) = capture.disabled_reason() {
            self.console.notify(&FlowError::Device(reason.to_string()));
        }

        loop {
            let view = TakeView {
                captured: capture.current(),
                disabled: capture.disabled_reason(),
                progress: self.uploader.progress().current(),
            };
            let locked = view.actions_locked() || self.uploader.is_busy();
            let action = self
                .console
                .next_action(&view)
                .await
                .context("Failed to read booth action")?;

            match action {
                TakeAction::Capture => {
                    if let Err(err) = capture.capture() {
                        self.console.notify(&err);
                    }
                }
                TakeAction::Retake if locked => self.console.notify(&FlowError::UploadInFlight),
                TakeAction::Retake => {
                    capture.retake();
                    self.uploader.progress().reset();
                }
                TakeAction::Upload => {
                    let Some(image) = capture.current() else {
                        self.console.say("Take a photo first.");
                        continue;
                    };
                    match upload_with_progress(&self.uploader, &mut self.console, image).await {
                        Ok(uuid) => {
                            self.console.say("Upload complete.");
                            keep_copy(self.settings.save_location, image.bytes(), "");
                            return Ok(Some(uuid));
                        }
                        Err(err) => {
                            self.uploader.progress().reset();
                            self.console.notify(&err);
                        }
                    }
                }
                TakeAction::Back => return Ok(None),
            }
        }
    }

    async fn display(&mut self, uuid: String) -> anyhow::Result<Outcome> {
        let (ready, secs) =
            wait_for_result(self.backend.clone(), &uuid, self.settings.poll, &mut self.console)
                .await?;
        let saved = keep_copy(self.settings.save_location, &ready.image.bytes, "_result");
        self.console.show_result(&ready, secs, saved.as_deref());
        Ok(Outcome::Completed { uuid, ready, saved })
    }
}

/// Poll for the result of `uuid`, keeping the loading screen's clock current.
/// Returns the image and the whole seconds shown when it became ready.
pub async fn wait_for_result<B: GalleryBackend, C: BoothConsole>(
    backend: Arc<B>,
    uuid: &str,
    poll: PollSettings,
    console: &mut C,
) -> anyhow::Result<(ReadyImage, u64)> {
    let mut poller = DisplayPoller::start(backend, uuid, poll);
    let mut elapsed = poller.subscribe_elapsed();
    console.show_loading(0);

    let ready = loop {
        tokio::select! {
            ready = poller.wait_ready() => break ready,
            Ok(()) = elapsed.changed() => {
                let secs = *elapsed.borrow_and_update();
                console.show_loading(secs);
            }
        }
    };
    let ready = ready.context("Result polling stopped before the image was ready")?;
    let secs = poller.elapsed();
    poller.stop();
    Ok((ready, secs))
}

/// Upload while forwarding progress updates to the console
pub async fn upload_with_progress<B: GalleryBackend, C: BoothConsole>(
    uploader: &Uploader<B>,
    console: &mut C,
    image: &CapturedImage,
) -> Result<String, FlowError> {
    let mut progress = uploader.progress().subscribe();
    let mut shown = UploadProgress::NONE;
    let upload = uploader.upload(image);
    tokio::pin!(upload);
    loop {
        tokio::select! {
            result = &mut upload => {
                if result.is_ok() && !shown.is_complete() {
                    console.show_progress(UploadProgress::COMPLETE);
                }
                return result;
            }
            Ok(()) = progress.changed() => {
                shown = *progress.borrow_and_update();
                console.show_progress(shown);
            }
        }
    }
}

/// Save a local copy when configured. Failures are logged, not fatal.
pub fn keep_copy(location: Option<SaveLocation>, bytes: &[u8], suffix: &str) -> Option<PathBuf> {
    let path = timestamped_path(location?, suffix)?;
    if let Some(parent) = path.parent() {
        if let Err(err) = std::fs::create_dir_all(parent) {
            log::warn!("Failed to create {}: {}", parent.display(), err);
            return None;
        }
    }
    match std::fs::write(&path, bytes) {
        Ok(()) => {
            log::info!("Saved copy to {}", path.display());
            Some(path)
        }
        Err(err) => {
            log::warn!("Failed to save copy to {}: {}", path.display(), err);
            None
        }
    }
}
