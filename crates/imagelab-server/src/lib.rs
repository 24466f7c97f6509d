//! imagelab-server: HTTP front end for the image editing sandbox.
//!
//! Exposes upload, operation, undo, reset, clear and file routes over
//! axum, backed by an [`imagelab_session::ImageLab`]. Configuration comes
//! from the command line and `IMAGELAB_*` environment variables.

pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod sweeper;

pub use config::Config;
pub use error::ApiError;
pub use routes::{AppState, router};
