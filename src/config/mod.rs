//! Configuration module for the terminal.

mod backend;
mod chart;
mod debug;
mod polling;

// Public
pub mod constants;

// Re-export commonly used items
pub use backend::BACKEND;
pub use chart::CHART;
pub use constants::LOG_PERFORMANCE;
pub use debug::DF;
pub use polling::POLLING;
