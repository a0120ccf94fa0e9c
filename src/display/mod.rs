//! Result display: polls the backend until the processed image is available

mod poller;

pub use poller::{DisplayPoller, PollSettings};
