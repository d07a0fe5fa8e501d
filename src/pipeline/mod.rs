//! Pipeline orchestration
//!
//! The pipeline wraps the anonymization engine in a resilient worker pool:
//!
//! - [`orchestrator`]: the [`Pipeline`] state machine, input queue, retry
//!   and quarantine policy, and batch flushing
//! - [`worker`]: per-worker tasks with panic isolation
//! - [`events`]: the broadcast event stream
//! - [`metrics`]: counters behind [`Pipeline::metrics`]
//!
//! A caller that needs the anonymized output awaits
//! [`Pipeline::process_data`]; bulk feeds use [`Pipeline::submit`] and watch
//! the event stream instead.

pub mod events;
pub mod metrics;
pub mod orchestrator;
pub mod worker;

pub use events::PipelineEvent;
pub use metrics::MetricsRecorder;
pub use orchestrator::{Pipeline, PipelineState, PipelineStatus};
