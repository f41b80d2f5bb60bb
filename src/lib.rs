pub mod api;
pub mod driver;
pub mod error;
pub mod locator;
pub mod quality;
pub mod recorder;
pub mod utils;

// Re-export common items
pub use api::RecorderServer;
pub use error::{RecorderError, Result};
pub use recorder::RecorderService;
