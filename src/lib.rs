//! # safeproc
//!
//! Runs external processes and collects their complete stdout, stderr and exit
//! code without the pipe-buffer deadlocks that a naive "spawn, then read stdout,
//! then read stderr" wrapper runs into.
//!
//! Every invocation drives four concurrent activities: one worker thread per
//! standard stream plus the calling thread, which waits for the child to exit.
//! The call only returns once the child has exited and every worker has been
//! joined, so the captured buffers are always complete.
//!
//! ```no_run
//! use safeproc::{ProcessDescriptor, WorkerConfigs};
//!
//! let descriptor = ProcessDescriptor::from_argv(["cat"]).with_stdin("hello");
//! let result = safeproc::run(descriptor, None, WorkerConfigs::split_lines());
//! assert_eq!(result.exit_code, 0);
//! ```

include!(concat!(env!("OUT_DIR"), "/translations.rs"));

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Shared flag raised by the caller to abort a running invocation.
pub type CancellationToken = Arc<AtomicBool>;

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
pub mod system;

pub use models::{
    CommandForm, ProcessDescriptor, ProcessDescriptorBuilder, ProcessResult, StreamRole,
    WorkerConfig, WorkerConfigs,
};
pub use system::capabilities::{CustomStreamHandler, ExceptionSink, LogSink, ProcessStream};
pub use system::error::{FailureKind, ProcessError};
pub use system::executor::{SafeProcess, run};
