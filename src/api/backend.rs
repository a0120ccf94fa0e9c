//! Gallery backend seam
//!
//! Every operation is a single attempt. Retry and in-flight policy live in
//! the callers (`Uploader`, `DisplayPoller`).

use std::future::Future;

use crate::capture::CapturedImage;
use crate::domain::{DisplayRecord, ProgressReporter, ResolvedImage, UploadTicket};
use crate::error::FlowError;

pub trait GalleryBackend: Send + Sync + 'static {
    /// `GET /apis/images/upload`
    fn request_ticket(&self) -> impl Future<Output = Result<UploadTicket, FlowError>> + Send;

    /// `PUT <uploadUrl>` with the encoded image, reporting bytes sent
    fn put_image(
        &self,
        ticket: &UploadTicket,
        image: &CapturedImage,
        progress: &ProgressReporter,
    ) -> impl Future<Output = Result<(), FlowError>> + Send;

    /// `GET /apis/images/{uuid}`
    fn fetch_record(&self, uuid: &str)
    -> impl Future<Output = Result<DisplayRecord, FlowError>> + Send;

    /// Fetch and decode the result image at `url`
    fn preload(&self, url: &str) -> impl Future<Output = Result<ResolvedImage, FlowError>> + Send;
}
