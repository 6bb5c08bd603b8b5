// src/system/capabilities.rs

//! Small swappable hooks a caller can install to observe failures or take over
//! one of the child's streams.

use crate::models::StreamRole;
use crate::system::error::ProcessError;
use std::io::{self, Read, Write};
use std::process::{ChildStderr, ChildStdin, ChildStdout};

/// Receives every failure of an invocation: launch, wait, and all three workers.
///
/// The sink is shared by the worker threads, so implementations must be
/// `Send + Sync`. Any `Fn(&ProcessError)` closure with those bounds is a sink.
pub trait ExceptionSink: Send + Sync {
    fn observe(&self, error: &ProcessError);
}

impl<F> ExceptionSink for F
where
    F: Fn(&ProcessError) + Send + Sync,
{
    fn observe(&self, error: &ProcessError) {
        self(error);
    }
}

/// The sink used when the caller installs none: log and carry on.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ExceptionSink for LogSink {
    fn observe(&self, error: &ProcessError) {
        log::error!("{}", error);
    }
}

/// Takes over the raw I/O of one stream instead of the default buffering.
///
/// The handler owns the stream: it reads or writes as it likes and closes the
/// stream by dropping it. It runs on the worker thread for its role, alongside
/// the other two workers. Any `FnOnce(ProcessStream) + Send` closure is a handler.
pub trait CustomStreamHandler: Send {
    fn run(self: Box<Self>, stream: ProcessStream);
}

impl<F> CustomStreamHandler for F
where
    F: FnOnce(ProcessStream) + Send,
{
    fn run(self: Box<Self>, stream: ProcessStream) {
        (*self)(stream);
    }
}

/// The child's end of one pipe, as handed to a [`CustomStreamHandler`].
///
/// Reading is supported on stdout/stderr and writing on stdin; the other
/// direction fails with [`io::ErrorKind::Unsupported`].
#[derive(Debug)]
pub enum ProcessStream {
    Stdin(ChildStdin),
    Stdout(ChildStdout),
    Stderr(ChildStderr),
}

impl ProcessStream {
    pub fn role(&self) -> StreamRole {
        match self {
            Self::Stdin(_) => StreamRole::Stdin,
            Self::Stdout(_) => StreamRole::Stdout,
            Self::Stderr(_) => StreamRole::Stderr,
        }
    }
}

fn wrong_direction(role: StreamRole, op: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("cannot {} the child's {}", op, role),
    )
}

impl Read for ProcessStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Stdout(out) => out.read(buf),
            Self::Stderr(err) => err.read(buf),
            Self::Stdin(_) => Err(wrong_direction(StreamRole::Stdin, "read from")),
        }
    }
}

impl Write for ProcessStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stdin(input) => input.write(buf),
            Self::Stdout(_) => Err(wrong_direction(StreamRole::Stdout, "write to")),
            Self::Stderr(_) => Err(wrong_direction(StreamRole::Stderr, "write to")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stdin(input) => input.flush(),
            Self::Stdout(_) => Err(wrong_direction(StreamRole::Stdout, "flush")),
            Self::Stderr(_) => Err(wrong_direction(StreamRole::Stderr, "flush")),
        }
    }
}
