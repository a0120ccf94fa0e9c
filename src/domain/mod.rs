//! Pure domain types with minimal dependencies
//!
//! This module contains the data exchanged between the booth components.
//! Types here should not depend on the camera, HTTP or terminal layers.

pub mod consent;
pub mod progress;
pub mod route;
pub mod ticket;

pub use consent::*;
pub use progress::*;
pub use route::*;
pub use ticket::*;
