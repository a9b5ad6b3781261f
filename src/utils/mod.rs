//! # Utility Modules
//!
//! Supporting utilities shared by the sessions and drivers.
//!
//! ## Components
//! - **Clock**: millisecond ticks and wall-clock seconds, with a manual clock for tests
//! - **Logging**: `tracing-subscriber` setup from [`LoggingConfig`](crate::config::LoggingConfig)
//! - **Metrics**: Thread-safe observability counters

pub mod clock;
pub mod logging;
pub mod metrics;

pub use clock::{Clock, ManualClock, SystemClock};
pub use metrics::{global_metrics, Metrics, MetricsSnapshot};
