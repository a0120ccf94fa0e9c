//! Scripted gallery backend shared by unit tests

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::api::GalleryBackend;
use crate::capture::CapturedImage;
use crate::domain::{DisplayRecord, ProgressReporter, ResolvedImage, UploadTicket};
use crate::error::FlowError;

#[derive(Default)]
pub struct FakeBackend {
    tickets: AtomicUsize,
    uploads: AtomicUsize,
    record_calls: AtomicUsize,
    transport_failures: AtomicUsize,
    reject_puts: Mutex<bool>,
    records: Mutex<VecDeque<DisplayRecord>>,
    loadable: Mutex<HashSet<String>>,
    put_started: Notify,
    put_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tickets_issued(&self) -> usize {
        self.tickets.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn record_calls(&self) -> usize {
        self.record_calls.load(Ordering::SeqCst)
    }

    /// The next `n` PUTs fail with a transport error
    pub fn fail_puts_with_transport(&self, n: usize) {
        self.transport_failures.store(n, Ordering::SeqCst);
    }

    /// Every PUT answers 403
    pub fn reject_puts(&self) {
        *self.reject_puts.lock().unwrap() = true;
    }

    /// PUTs block until the returned gate is notified
    pub fn hold_puts(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.put_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub async fn wait_for_put(&self) {
        self.put_started.notified().await;
    }

    /// Records returned by successive lookups; the last one repeats
    pub fn script_records(&self, records: impl IntoIterator<Item = DisplayRecord>) {
        *self.records.lock().unwrap() = records.into_iter().collect();
    }

    pub fn make_loadable(&self, url: &str) {
        self.loadable.lock().unwrap().insert(url.to_string());
    }
}

pub fn record(uuid: &str, download_url: &str) -> DisplayRecord {
    DisplayRecord {
        uuid: uuid.to_string(),
        download_url: download_url.to_string(),
    }
}

impl GalleryBackend for FakeBackend {
    async fn request_ticket(&self) -> Result<UploadTicket, FlowError> {
        self.tickets.fetch_add(1, Ordering::SeqCst);
        Ok(UploadTicket {
            upload_url: "https://bucket.test/face/abc.png?X-Amz-Expires=300".to_string(),
            uuid: "abc".to_string(),
        })
    }

    async fn put_image(
        &self,
        _ticket: &UploadTicket,
        image: &CapturedImage,
        progress: &ProgressReporter,
    ) -> Result<(), FlowError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        let gate = self.put_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            self.put_started.notify_one();
            gate.notified().await;
        }
        let failed = self
            .transport_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(FlowError::Transport("connection reset".to_string()));
        }
        if *self.reject_puts.lock().unwrap() {
            return Err(FlowError::Protocol("upload returned 403 Forbidden".to_string()));
        }
        let total = image.byte_len() as u64;
        progress.advance(total / 2, total);
        progress.advance(total, total);
        Ok(())
    }

    async fn fetch_record(&self, uuid: &str) -> Result<DisplayRecord, FlowError> {
        self.record_calls.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().unwrap();
        let next = if records.len() > 1 {
            records.pop_front()
        } else {
            records.front().cloned()
        };
        Ok(next.unwrap_or_else(|| record(uuid, "")))
    }

    async fn preload(&self, url: &str) -> Result<ResolvedImage, FlowError> {
        if self.loadable.lock().unwrap().contains(url) {
            Ok(ResolvedImage {
                url: url.to_string(),
                bytes: vec![0x89, b'P', b'N', b'G'],
                width: 1,
                height: 1,
            })
        } else {
            Err(FlowError::Protocol(format!("cannot load {}", url)))
        }
    }
}
