//! # Utility Modules
//!
//! Supporting utilities used throughout the transport.
//!
//! ## Components
//! - **Logging**: `tracing-subscriber` initialisation
//! - **Metrics**: per-connection atomic counters

pub mod logging;
pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
