//! # Process Execution Engine
//!
//! Everything that touches OS process state lives here.
//!
//! ## Modules
//!
//! - **`executor`**: The orchestrator. Spawns the child, starts one worker per
//!   standard stream, waits for exit (optionally cancellable), joins the workers
//!   and assembles the `ProcessResult`. The child handle is released by a scope
//!   guard on every exit path.
//! - **`stream_worker`**: The per-stream threads: line-draining readers for
//!   stdout/stderr and the stdin writer.
//! - **`capabilities`**: The `ExceptionSink` and `CustomStreamHandler` hooks and
//!   the `ProcessStream` handed to custom handlers.
//! - **`error`**: The `ProcessError` taxonomy.

pub mod capabilities;
pub mod error;
pub mod executor;
mod stream_worker;
