//! # Utility Modules
//!
//! Supporting utilities for logging, timing and metrics.
//!
//! ## Components
//! - **Logging**: `tracing-subscriber` setup from configuration
//! - **Metrics**: Thread-safe handshake counters
//! - **Time**: Millisecond wall-clock timestamps for connection replies

pub mod logging;
pub mod metrics;
pub mod time;

pub use metrics::{Metrics, MetricsSnapshot};
