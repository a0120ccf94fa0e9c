//! Upload progress tracking

use std::sync::Arc;
use tokio::sync::watch;

/// Percentage of the image handed to the transport, 0-100
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct UploadProgress(u8);

impl UploadProgress {
    pub const NONE: Self = Self(0);
    pub const COMPLETE: Self = Self(100);

    /// Rounded percentage of `sent` out of `total` bytes
    pub fn from_bytes(sent: u64, total: u64) -> Self {
        if total == 0 {
            return Self::COMPLETE;
        }
        let sent = sent.min(total);
        let percent = (sent * 100 + total / 2) / total;
        Self(percent.min(100) as u8)
    }

    pub fn percent(self) -> u8 {
        self.0
    }

    /// Retake and upload stay disabled while this is true
    pub fn is_in_flight(self) -> bool {
        self.0 > 0 && self.0 < 100
    }

    pub fn is_complete(self) -> bool {
        self.0 >= 100
    }
}

/// Shared progress cell. Updates within one attempt never go backwards.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: Arc<watch::Sender<UploadProgress>>,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(UploadProgress::NONE);
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadProgress> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> UploadProgress {
        *self.tx.borrow()
    }

    /// Start of a new attempt
    pub fn reset(&self) {
        self.tx.send_replace(UploadProgress::NONE);
    }

    pub fn advance(&self, sent: u64, total: u64) {
        let next = UploadProgress::from_bytes(sent, total);
        self.tx.send_if_modified(|current| {
            if next > *current {
                *current = next;
                true
            } else {
                false
            }
        });
    }

    pub fn complete(&self) {
        self.tx.send_if_modified(|current| {
            let changed = *current != UploadProgress::COMPLETE;
            *current = UploadProgress::COMPLETE;
            changed
        });
    }
}
