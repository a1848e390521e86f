mod bar_stream;
mod client;

pub use bar_stream::{BarStreamManager, StreamEvent};
pub use client::{BackendClient, RestBackend};
