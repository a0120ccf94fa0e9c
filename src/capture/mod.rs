//! Image capture module
//!
//! This module consolidates:
//! - Frame sources: camera (camera.rs) and still files (source.rs)
//! - Captured image type (image.rs)
//! - Capture screen state (session.rs)

pub mod camera;
pub mod image;
pub mod session;
pub mod source;

pub use camera::CameraSource;
pub use self::image::CapturedImage;
pub use session::CaptureSession;
pub use source::{FileSource, FrameSource};
