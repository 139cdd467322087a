//! Service layer

pub mod metrics_recorder;

pub use metrics_recorder::MetricsRecorder;
