//! Notification delivery for detections.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable notification channels
//! - Log and webhook notifier implementations
//! - Minijinja rendering of detections into subject/body text
//! - Dispatcher that filters by level and fans out to every channel

pub mod dispatcher;
pub mod log;
pub mod templating;
pub mod traits;
pub mod webhook;

pub use dispatcher::Dispatcher;
pub use log::LogNotifier;
pub use templating::TemplateRenderer;
pub use traits::{DispatchResult, Notification, Notifier, NotifyError};
pub use webhook::WebhookNotifier;
