pub mod config;
pub mod error;
pub mod event;
pub mod record;
pub mod store;
pub mod summary;
pub mod value;

pub use config::Config;
pub use error::*;
pub use event::{DetectionKind, Level, NotifyEvent};
pub use record::{FlowRecord, LogRecord, RecordDetail, SourceType};
pub use store::{AnomalyScore, MemoryStore, ReportStore};
pub use summary::*;
pub use value::{FieldMap, FieldValue};
