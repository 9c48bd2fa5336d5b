//! sitesafe-server: browser front end for PPE detection
//!
//! Serves the upload pages, runs submissions through the
//! [`sitesafe_eye::DetectionPipeline`] and renders the annotated output with
//! the PPE verdict.

pub mod artifacts;
pub mod blog;
pub mod config;
pub mod error;
pub mod http;
pub mod render;

pub use config::SiteSafeConfig;
pub use error::AppError;
pub use http::{create_router, AppState};
