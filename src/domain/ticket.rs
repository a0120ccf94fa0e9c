//! Wire types exchanged with the gallery backend

use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Write-once upload destination handed out by the backend.
///
/// Deliberately not `Clone`: a ticket is consumed by the single transfer
/// that uses it, and a retry asks for a new one.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTicket {
    /// Presigned, time-limited PUT url
    pub upload_url: String,
    /// Opaque identifier correlating the upload with its result
    pub uuid: String,
}

/// Result lookup returned while the backend processes an upload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayRecord {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub uuid: String,
    /// Presigned GET url, empty (or null) until processing completes
    #[serde(default, deserialize_with = "null_as_empty")]
    pub download_url: String,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl DisplayRecord {
    pub fn has_download_url(&self) -> bool {
        !self.download_url.trim().is_empty()
    }
}

/// A result image that was fetched and decoded successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub url: String,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Result image together with how long it took to become available
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyImage {
    pub image: ResolvedImage,
    /// Time from poller start to the successful preload
    pub after: Duration,
}

/// Display poller state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DisplayState {
    #[default]
    Loading,
    Ready(ReadyImage),
}
