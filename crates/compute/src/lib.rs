pub mod anomaly;
pub mod pattern;
pub mod services;
pub mod topn;
pub mod window;

pub use anomaly::{AnomalyScorer, ComputeError, ScoreOutcome};
pub use pattern::normalize;
pub use topn::FrequencyTable;
pub use window::{new_accumulator, Accumulator, AggregationWindow, WindowClock};
