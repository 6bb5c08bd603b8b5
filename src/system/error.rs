// src/system/error.rs

use crate::models::StreamRole;
use thiserror::Error;

/// Every failure an invocation can observe.
///
/// None of these escape [`crate::run`]; they are handed to the installed
/// [`crate::ExceptionSink`] (or logged) and the caller reads the sentinel exit
/// code and whatever output was captured.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("No command specified to run.")]
    EmptyCommand,
    #[error("Both a command line and an argument vector were given; exactly one is allowed.")]
    AmbiguousCommand,
    #[error("Command could not be parsed: {0}")]
    CommandParse(String),
    #[error("Command '{command}' could not be executed: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error on the child's {role}: {source}")]
    StreamIo {
        role: StreamRole,
        #[source]
        source: std::io::Error,
    },
    #[error("The {0} worker panicked.")]
    WorkerPanicked(StreamRole),
    #[error("Could not wait for command '{command}': {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Operation was cancelled by the user.")]
    Cancelled,
    #[error("Could not release {what}: {source}")]
    ResourceClose {
        what: String,
        #[source]
        source: std::io::Error,
    },
}

/// Coarse classification of a [`ProcessError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The descriptor was invalid or the OS refused to create the process.
    Launch,
    /// A read or write on one stream failed, or its worker died.
    StreamIo,
    /// Querying the child's exit status failed.
    Wait,
    /// The wait was interrupted through the cancellation token.
    Cancelled,
    /// Releasing a stream or the process handle failed.
    ResourceClose,
}

impl ProcessError {
    /// Which part of the taxonomy this error belongs to.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::EmptyCommand
            | Self::AmbiguousCommand
            | Self::CommandParse(_)
            | Self::Launch { .. } => FailureKind::Launch,
            Self::StreamIo { .. } | Self::WorkerPanicked(_) => FailureKind::StreamIo,
            Self::Wait { .. } => FailureKind::Wait,
            Self::Cancelled => FailureKind::Cancelled,
            Self::ResourceClose { .. } => FailureKind::ResourceClose,
        }
    }

    /// The stream this error happened on, if any.
    pub fn role(&self) -> Option<StreamRole> {
        match self {
            Self::StreamIo { role, .. } | Self::WorkerPanicked(role) => Some(*role),
            _ => None,
        }
    }
}
