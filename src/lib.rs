//! Motion-gated photo capture.
//!
//! A [`MotionEstimator`] samples a live [`VideoSource`] on a fixed cadence,
//! scores inter-frame motion on a small raster, and keeps a short rolling
//! history. The history drives a stability indicator and gates capture
//! requests made through a [`CaptureSession`].

pub mod committer;
pub mod config;
pub mod controls;
pub mod error;
pub mod estimator;
pub mod feedback;
pub mod frame;
pub mod history;
pub mod monitor;
pub mod session;
pub mod source;

pub use committer::{CaptureCommitter, DirectoryCommitter};
pub use config::{Config, ConfigBuilder};
pub use controls::{ControlCommand, ControlInput, ControlPanel};
pub use error::{CaptureError, CaptureResult};
pub use estimator::{GateDecision, MotionEstimator, MotionReading, TickOutcome};
pub use feedback::{ChannelFeedback, FeedbackSink, LogFeedback, Stability};
pub use monitor::{MotionMonitor, SharedEstimator};
pub use session::{CaptureOutcome, CaptureSession, SessionEvent};
pub use source::{FacingMode, SharedSource, SyntheticCamera, VideoSource};
