//! Result poller for the display screen
//!
//! Two timers run per poller: an elapsed-seconds ticker and a readiness
//! probe. The probe stops once the result image preloads; the ticker runs
//! until the poller is stopped or dropped. Both tasks are aborted on
//! teardown, so nothing they produce afterwards is observable.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::api::GalleryBackend;
use crate::domain::{DisplayState, ReadyImage, ResolvedImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub probe_interval: Duration,
    pub tick_interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(5),
            tick_interval: Duration::from_secs(1),
        }
    }
}

pub struct DisplayPoller {
    uuid: String,
    state: watch::Receiver<DisplayState>,
    elapsed: watch::Receiver<u64>,
    tasks: Vec<AbortHandle>,
}

impl DisplayPoller {
    /// Start polling for `uuid`. Must be called from within a tokio runtime.
    pub fn start<B: GalleryBackend>(backend: Arc<B>, uuid: impl Into<String>, settings: PollSettings) -> Self {
        let uuid = uuid.into();
        let started = Instant::now();
        let (state_tx, state) = watch::channel(DisplayState::Loading);
        let (elapsed_tx, elapsed) = watch::channel(0u64);

        log::info!(
            "Polling result for {} every {:?}",
            uuid,
            settings.probe_interval
        );
        let ticker = tokio::spawn(tick_elapsed(elapsed_tx, settings.tick_interval));
        let prober = tokio::spawn(probe_until_ready(
            backend,
            uuid.clone(),
            settings.probe_interval,
            started,
            state_tx,
        ));

        Self {
            uuid,
            state,
            elapsed,
            tasks: vec![ticker.abort_handle(), prober.abort_handle()],
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> DisplayState {
        self.state.borrow().clone()
    }

    /// Whole ticks since the poller started
    pub fn elapsed(&self) -> u64 {
        *self.elapsed.borrow()
    }

    pub fn subscribe_elapsed(&self) -> watch::Receiver<u64> {
        self.elapsed.clone()
    }

    /// Wait for the result image. `None` if the poller was stopped first.
    pub async fn wait_ready(&mut self) -> Option<ReadyImage> {
        loop {
            if let DisplayState::Ready(ready) = &*self.state.borrow_and_update() {
                return Some(ready.clone());
            }
            if self.state.changed().await.is_err() {
                return match &*self.state.borrow() {
                    DisplayState::Ready(ready) => Some(ready.clone()),
                    DisplayState::Loading => None,
                };
            }
        }
    }

    /// Cancel both timers
    pub fn stop(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        log::debug!("Stopping poller for {}", self.uuid);
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for DisplayPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn tick_elapsed(elapsed: watch::Sender<u64>, every: Duration) {
    let mut interval = tokio::time::interval_at(Instant::now() + every, every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        elapsed.send_modify(|secs| *secs += 1);
    }
}

async fn probe_until_ready<B: GalleryBackend>(
    backend: Arc<B>,
    uuid: String,
    every: Duration,
    started: Instant,
    state: watch::Sender<DisplayState>,
) {
    // First tick completes immediately, so the first probe runs on start
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if let Some(image) = probe(&*backend, &uuid).await {
            let after = started.elapsed();
            log::info!(
                "Result for {} ready after {:?} ({}x{})",
                uuid,
                after,
                image.width,
                image.height
            );
            state.send_replace(DisplayState::Ready(ReadyImage { image, after }));
            return;
        }
    }
}

/// One readiness probe: look up the record, then preload its image
async fn probe<B: GalleryBackend>(backend: &B, uuid: &str) -> Option<ResolvedImage> {
    let record = match backend.fetch_record(uuid).await {
        Ok(record) => record,
        Err(err) => {
            log::warn!("Lookup for {} failed: {}", uuid, err);
            return None;
        }
    };
    if !record.uuid.is_empty() && record.uuid != uuid {
        log::warn!("Lookup for {} answered for {}, ignoring", uuid, record.uuid);
        return None;
    }
    if !record.has_download_url() {
        log::debug!("Result for {} not ready yet", uuid);
        return None;
    }
    match backend.preload(&record.download_url).await {
        Ok(image) => Some(image),
        Err(err) => {
            log::warn!("Preloading result for {} failed: {}", uuid, err);
            None
        }
    }
}
