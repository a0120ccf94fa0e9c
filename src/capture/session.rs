//! Capture screen state: live view, captured still, retake

use super::image::CapturedImage;
use super::source::FrameSource;
use crate::error::FlowError;

pub struct CaptureSession {
    source: Option<Box<dyn FrameSource>>,
    /// Set when the source failed; capture stays disabled afterwards
    disabled: Option<String>,
    current: Option<CapturedImage>,
}

impl CaptureSession {
    pub fn new(source: Box<dyn FrameSource>) -> Self {
        log::info!("Capture session using {}", source.describe());
        Self {
            source: Some(source),
            disabled: None,
            current: None,
        }
    }

    /// Session whose source could not be opened
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        log::warn!("Capture disabled: {}", reason);
        Self {
            source: None,
            disabled: Some(reason),
            current: None,
        }
    }

    /// Why capturing is disabled, if it is
    pub fn disabled_reason(&self) -> Option<&str> {
        self.disabled.as_deref()
    }

    pub fn current(&self) -> Option<&CapturedImage> {
        self.current.as_ref()
    }

    /// Read one frame and hold it as the captured image.
    ///
    /// A failing source disables further captures with the failure as
    /// explanation.
    pub fn capture(&mut self) -> Result<&CapturedImage, FlowError> {
        if let Some(reason) = &self.disabled {
            return Err(FlowError::Device(reason.clone()));
        }
        let Some(source) = self.source.as_mut() else {
            return Err(FlowError::Device("no capture source".to_string()));
        };

        let frame = match source.grab() {
            Ok(frame) => frame,
            Err(err) => {
                let reason = match &err {
                    FlowError::Device(reason) => reason.clone(),
                    other => other.to_string(),
                };
                log::error!("Capture failed, disabling capture: {}", reason);
                self.source = None;
                self.disabled = Some(reason);
                return Err(err);
            }
        };
        let image = CapturedImage::from_rgba(&frame)
            .map_err(|e| FlowError::Device(format!("cannot encode frame: {}", e)))?;
        Ok(self.current.insert(image))
    }

    /// Discard the captured image and return to the live view
    pub fn retake(&mut self) {
        if self.current.take().is_some() {
            log::debug!("Captured image discarded");
        }
    }
}
