//! Failure taxonomy for the booth flow
//!
//! Every step of the capture → upload → display flow reports one of these.
//! The variant decides what happens next: transport failures are retried,
//! protocol failures become a notice for the operator, device failures
//! disable the capture action.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    /// Network, DNS or timeout failure before a response was read
    #[error("transport failure: {0}")]
    Transport(String),
    /// Unexpected status code or malformed response body
    #[error("protocol failure: {0}")]
    Protocol(String),
    /// Camera or image source unavailable
    #[error("camera unavailable: {0}")]
    Device(String),
    /// A transfer is already running for this client
    #[error("an upload is already in progress")]
    UploadInFlight,
    /// The visitor declined the consent prompt
    #[error("consent was declined")]
    ConsentDeclined,
}

impl FlowError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, FlowError::Transport(_))
    }

    /// Short label used in notices and logs
    pub fn kind(&self) -> &'static str {
        match self {
            FlowError::Transport(_) => "network",
            FlowError::Protocol(_) => "server",
            FlowError::Device(_) => "camera",
            FlowError::UploadInFlight => "busy",
            FlowError::ConsentDeclined => "consent",
        }
    }
}

impl From<reqwest::Error> for FlowError {
    fn from(err: reqwest::Error) -> Self {
        let message = match err.url() {
            Some(url) => format!("{} ({})", err, url),
            None => err.to_string(),
        };
        if err.is_status() || err.is_decode() || err.is_builder() || err.is_redirect() {
            FlowError::Protocol(message)
        } else {
            FlowError::Transport(message)
        }
    }
}

impl From<url::ParseError> for FlowError {
    fn from(err: url::ParseError) -> Self {
        FlowError::Protocol(format!("invalid url: {}", err))
    }
}
