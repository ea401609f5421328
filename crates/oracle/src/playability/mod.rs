//! Live playability invariants and the action-feedback tracker they consult.

mod feedback;
mod log;
mod monitor;

pub use feedback::{
    ActionFeedback, FeedbackChannel, FeedbackResult, FeedbackStatus, FEEDBACK_WINDOW_SECONDS,
    TRACKED_ACTIONS,
};
pub use log::{InvariantLog, LogEntry, LogLevel};
pub use monitor::{InvariantMonitor, InvariantStatus, MonitorConfig};
