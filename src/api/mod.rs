//! Gallery backend access
//!
//! This module contains:
//! - The backend seam used by the upload and display components (backend.rs)
//! - The reqwest implementation of it (client.rs)
//! - Transient-failure retry (retry.rs)
//! - The upload client with its single-flight guard (upload.rs)

pub mod backend;
pub mod client;
pub mod retry;
pub mod upload;

pub use backend::GalleryBackend;
pub use client::ApiClient;
pub use upload::Uploader;
