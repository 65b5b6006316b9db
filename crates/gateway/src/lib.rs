//! HTTP gateway that validates hand-drawn digit uploads, normalizes them to
//! 28x28 grayscale and forwards them to the inference backend.

pub mod config;
pub mod error;
pub mod forwarder;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod server;
pub mod state;

pub use config::GatewayConfig;
pub use error::UploadError;
pub use server::{router, run_server};
pub use state::AppState;
