//! Operator console: what the booth shows and what the visitor answers
//!
//! The flow only talks to the [`BoothConsole`] trait; [`TerminalConsole`]
//! is the stdin/stderr implementation used by the binary.

use std::future::Future;
use std::io::{self, Write};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::capture::CapturedImage;
use crate::domain::{ConsentAnswer, ReadyImage, UploadProgress};
use crate::error::FlowError;

/// Actions offered on the capture screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TakeAction {
    Capture,
    Retake,
    Upload,
    /// Leave to the start screen
    Back,
}

/// Snapshot of the capture screen used to render the prompt
#[derive(Debug)]
pub struct TakeView<'a> {
    pub captured: Option<&'a CapturedImage>,
    /// Explanation when capture is disabled
    pub disabled: Option<&'a str>,
    pub progress: UploadProgress,
}

impl TakeView<'_> {
    /// Retake and upload are locked while a transfer is running
    pub fn actions_locked(&self) -> bool {
        self.progress.is_in_flight()
    }
}

pub trait BoothConsole {
    fn ask_consent(&mut self) -> impl Future<Output = io::Result<ConsentAnswer>>;

    fn next_action(&mut self, view: &TakeView<'_>) -> impl Future<Output = io::Result<TakeAction>>;

    /// Plain message to the visitor
    fn say(&mut self, message: &str);

    fn show_progress(&mut self, progress: UploadProgress);

    /// Loading screen with the seconds spent so far
    fn show_loading(&mut self, elapsed: u64);

    fn show_result(&mut self, ready: &ReadyImage, elapsed: u64, saved: Option<&Path>);

    /// Dismissible notice for a failed step
    fn notify(&mut self, err: &FlowError) {
        log::warn!("{} notice: {}", err.kind(), err);
        self.say(&notice_for(err));
    }
}

/// Visitor-facing text for a failure
pub fn notice_for(err: &FlowError) -> String {
    match err {
        FlowError::Transport(_) => {
            "Could not reach the gallery. Check the network and try again.".to_string()
        }
        FlowError::Protocol(detail) => format!(
            "The gallery rejected the request ({}). You can retake or try the upload again.",
            detail
        ),
        FlowError::Device(reason) => format!("Camera unavailable: {}. Capture is disabled.", reason),
        FlowError::UploadInFlight => "An upload is already in progress.".to_string(),
        FlowError::ConsentDeclined => "Consent was declined.".to_string(),
    }
}

const CONSENT_NOTICE: &str = "\
Privacy notice
  Your photo is uploaded to the gallery service for processing and shown
  on this screen. It is not used for any other purpose.
Enter your name to agree, 'n' to disagree, or an empty line to close.";

pub struct TerminalConsole {
    lines: Lines<BufReader<Stdin>>,
    /// Whether the last output was an in-place status line
    status_line: bool,
}

impl Default for TerminalConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            status_line: false,
        }
    }

    async fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.end_status_line();
        eprint!("{} ", prompt);
        io::stderr().flush()?;
        Ok(self.lines.next_line().await?.map(|l| l.trim().to_string()))
    }

    fn status(&mut self, text: &str) {
        eprint!("\r\x1b[2K{}", text);
        let _ = io::stderr().flush();
        self.status_line = true;
    }

    fn end_status_line(&mut self) {
        if self.status_line {
            eprintln!();
            self.status_line = false;
        }
    }
}

impl BoothConsole for TerminalConsole {
    async fn ask_consent(&mut self) -> io::Result<ConsentAnswer> {
        self.end_status_line();
        eprintln!("{}", CONSENT_NOTICE);
        let answer = match self.read_line(">").await? {
            None => ConsentAnswer::Closed,
            Some(line) if line.is_empty() => ConsentAnswer::Closed,
            Some(line) if line.eq_ignore_ascii_case("n") || line.eq_ignore_ascii_case("no") => {
                ConsentAnswer::Disagree
            }
            Some(name) => ConsentAnswer::Agree(name),
        };
        Ok(answer)
    }

    async fn next_action(&mut self, view: &TakeView<'_>) -> io::Result<TakeAction> {
        loop {
            let prompt = match (view.captured, view.disabled) {
                (Some(image), _) => format!(
                    "Captured {}x{} ({} KiB). [u] upload, [r] retake, [b] back:",
                    image.width(),
                    image.height(),
                    image.byte_len() / 1024
                ),
                (None, Some(reason)) => format!("Capture disabled: {}. [b] back:", reason),
                (None, None) => "Look at the camera. [Enter] take photo, [b] back:".to_string(),
            };
            let Some(line) = self.read_line(&prompt).await? else {
                return Ok(TakeAction::Back);
            };
            let action = match (line.to_ascii_lowercase().as_str(), view.captured.is_some()) {
                ("b" | "q", _) => TakeAction::Back,
                ("", false) => TakeAction::Capture,
                ("u", true) => TakeAction::Upload,
                ("r", true) => TakeAction::Retake,
                _ => {
                    eprintln!("Unknown choice '{}'", line);
                    continue;
                }
            };
            return Ok(action);
        }
    }

    fn say(&mut self, message: &str) {
        self.end_status_line();
        eprintln!("{}", message);
    }

    fn show_progress(&mut self, progress: UploadProgress) {
        const WIDTH: usize = 30;
        let filled = progress.percent() as usize * WIDTH / 100;
        self.status(&format!(
            "Uploading [{}{}] {}%",
            "#".repeat(filled),
            "-".repeat(WIDTH - filled),
            progress.percent()
        ));
    }

    fn show_loading(&mut self, elapsed: u64) {
        self.status(&format!("Creating your picture... {}s", elapsed));
    }

    fn show_result(&mut self, ready: &ReadyImage, elapsed: u64, saved: Option<&Path>) {
        self.end_status_line();
        eprintln!("Spent Time: {}", elapsed);
        eprintln!(
            "Your picture is ready ({}x{}): {}",
            ready.image.width, ready.image.height, ready.image.url
        );
        if let Some(path) = saved {
            eprintln!("Saved to {}", path.display());
        }
    }
}
