//! Upload client: ticket request, transfer, retry and single-flight guard

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::backend::GalleryBackend;
use super::retry::with_retry;
use crate::capture::CapturedImage;
use crate::config::RetryPolicy;
use crate::domain::{ProgressReporter, UploadTicket};
use crate::error::FlowError;

pub struct Uploader<B> {
    backend: Arc<B>,
    retry: RetryPolicy,
    progress: ProgressReporter,
    in_flight: AtomicBool,
}

/// Releases the in-flight flag when the transfer ends, however it ends
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, FlowError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| FlowError::UploadInFlight)?;
        Ok(Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<B: GalleryBackend> Uploader<B> {
    pub fn new(backend: Arc<B>, retry: RetryPolicy) -> Self {
        Self {
            backend,
            retry,
            progress: ProgressReporter::new(),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Upload `image` and return the identifier to display.
    ///
    /// Each attempt asks for a fresh ticket, since a presigned url is only
    /// good for one transfer.
    pub async fn upload(&self, image: &CapturedImage) -> Result<String, FlowError> {
        let _guard = InFlightGuard::acquire(&self.in_flight)?;
        with_retry(&self.retry, "upload", move |attempt| async move {
            self.progress.reset();
            log::debug!("Upload attempt {}", attempt);
            let ticket = self.backend.request_ticket().await?;
            self.transfer(ticket, image).await
        })
        .await
    }

    /// Transfer `image` to the ticket's destination, consuming the ticket
    async fn transfer(&self, ticket: UploadTicket, image: &CapturedImage) -> Result<String, FlowError> {
        self.backend
            .put_image(&ticket, image, &self.progress)
            .await?;
        self.progress.complete();
        Ok(ticket.uuid)
    }
}
