//! Concurrent detection and reporting pipeline.
//!
//! One tokio task per stage: a detection worker, one aggregation window per
//! source type, an anomaly scorer and a notification sink, joined by bounded
//! channels and stopped by a shared shutdown signal. [`Engine`] owns the
//! tasks and exposes ingestion and the control surface.

pub mod aggregation;
pub mod clock;
pub mod detection;
pub mod engine;
pub mod error;
pub mod scoring;
pub mod shutdown;
pub mod sink;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{Engine, EngineBuilder};
pub use error::EngineError;
pub use shutdown::{Shutdown, ShutdownListener};
