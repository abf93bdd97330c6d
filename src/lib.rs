//! This crate captures keyboard input on Linux and appends every key press to one or more log
//! files.
//!
//! Capturing and writing are decoupled: a [`CaptureSource`] turns key presses into
//! [`CapturedEvent`]s and pushes them onto an unbounded [`EventQueue`], and every log file is
//! written by its own [`FileWriterWorker`] with a private consumer on that queue. A slow or
//! stalled disk never holds up the keyboard, and one broken log file does not stop the others.
//!
//! Each line in a log file looks like this:
//!
//! ```text
//! [2024-03-09 17:04:05.123456]: LEFT_SHIFT
//! ```
//!
//! # Example
//!
//! Log to two files until Ctrl-C is pressed. Note the keylogger needs to run with root
//! privileges to read the input devices.
//!
//! ```no_run
//! use keystroke_log::{KeyloggerError, LoggingPipeline, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), KeyloggerError> {
//!     let config = PipelineConfig::from_paths(["/tmp/keys-1.txt", "/tmp/keys-2.txt"]);
//!
//!     let report = LoggingPipeline::configure(config).start().await?.wait().await?;
//!     println!("captured {} keys", report.captured);
//!
//!     Ok(())
//! }
//! ```

#[cfg(not(target_os = "linux"))]
compile_error!("This crate only works on Linux");

mod capture;
mod config;
mod error;
mod event;
pub(crate) mod key_code;
mod keyboard;
mod pipeline;
mod queue;
mod sink;
mod status;
mod validate;
mod worker;

pub use capture::{CaptureSource, Throttled, DEFAULT_THROTTLE};
pub use config::{default_log_path, CaptureMode, PipelineConfig};
pub use error::{FileError, FileErrorKind, KeyloggerError};
pub use event::CapturedEvent;
pub use key_code::KeyCode;
pub use keyboard::{find_keyboards, keyboard_events, KeyEvent, KeyEventCause, Keyboard};
pub use pipeline::{LoggingPipeline, PipelineReport, PipelineRun, RunningPipeline};
pub use queue::{EventConsumer, EventQueue};
pub use sink::{SinkDescriptor, DEFAULT_FLUSH_INTERVAL};
pub use status::{format_status, ConsoleStatus, Level, NullStatus, RecordingStatus, StatusSink};
pub use validate::validate;
pub use worker::{FileWriterWorker, SinkReport, StopReason, WorkerHandle, WorkerState};

pub type KeyloggerResult<T> = Result<T, KeyloggerError>;
