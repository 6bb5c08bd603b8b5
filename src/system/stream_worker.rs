// src/system/stream_worker.rs

//! One thread per child stream.
//!
//! Readers drain stdout or stderr into a private buffer, the writer feeds the
//! stdin payload and closes the pipe. Each worker owns its stream and its
//! buffer outright; the buffer only changes hands through `JoinHandle::join`.

use crate::CancellationToken;
use crate::constants::LINE_TERMINATOR;
use crate::core::commons;
use crate::models::{StreamRole, WorkerConfig};
use crate::system::capabilities::{ExceptionSink, ProcessStream};
use crate::system::error::ProcessError;
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Read, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Largest slice of the stdin payload written between two cancellation checks.
const WRITE_CHUNK_SIZE: usize = 8 * 1024;

/// How often a bounded join re-checks whether the worker has finished.
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A started worker thread bound to one stream for one invocation.
#[derive(Debug)]
pub(crate) struct StreamWorker {
    role: StreamRole,
    handle: JoinHandle<String>,
}

impl StreamWorker {
    /// Starts the worker for `stream`.
    ///
    /// A configured custom handler receives the raw stream and nothing is captured.
    /// Otherwise stdin is fed `payload` and closed, and stdout/stderr are drained
    /// line by line. Returns `None` if the thread could not be created; the
    /// stream is closed and the failure reported in that case.
    pub(crate) fn start(
        stream: ProcessStream,
        config: WorkerConfig,
        payload: Option<String>,
        stop: &CancellationToken,
        sink: &Arc<dyn ExceptionSink>,
    ) -> Option<Self> {
        let role = stream.role();
        let stop = Arc::clone(stop);
        let thread_sink = Arc::clone(sink);

        let spawned = thread::Builder::new()
            .name(format!("safeproc-{}", role))
            .spawn(move || {
                let WorkerConfig {
                    split_on_newline,
                    handler,
                } = config;
                if let Some(handler) = handler {
                    log::debug!("Handing the child's {} to a custom handler.", role);
                    handler.run(stream);
                    return String::new();
                }
                match stream {
                    ProcessStream::Stdin(input) => {
                        feed(input, payload.as_deref(), &stop, thread_sink.as_ref());
                        String::new()
                    }
                    output => drain(output, role, split_on_newline, &stop, thread_sink.as_ref()),
                }
            });

        match spawned {
            Ok(handle) => Some(Self { role, handle }),
            Err(source) => {
                sink.observe(&ProcessError::StreamIo { role, source });
                None
            }
        }
    }

    /// Waits for the worker and returns what it captured.
    ///
    /// With a deadline, a worker that is still blocked when it passes is detached
    /// and its output is lost. A panicked worker is reported to the sink.
    pub(crate) fn join(self, deadline: Option<Instant>, sink: &dyn ExceptionSink) -> String {
        if let Some(deadline) = deadline {
            while !self.handle.is_finished() {
                if Instant::now() >= deadline {
                    log::warn!(
                        "The {} worker did not stop in time and was detached.",
                        self.role
                    );
                    return String::new();
                }
                thread::sleep(JOIN_POLL_INTERVAL);
            }
        }

        match self.handle.join() {
            Ok(captured) => captured,
            Err(_) => {
                sink.observe(&ProcessError::WorkerPanicked(self.role));
                String::new()
            }
        }
    }
}

/// Joins an optional worker; a worker that never started captured nothing.
pub(crate) fn join_worker(
    worker: Option<StreamWorker>,
    deadline: Option<Instant>,
    sink: &dyn ExceptionSink,
) -> String {
    worker.map_or_else(String::new, |w| w.join(deadline, sink))
}

/// Reads `reader` line by line until end of stream, an I/O error, or `stop`.
///
/// Line terminators (`\n`, `\r\n`) are stripped; with `split` the platform
/// terminator is appended after every line. Invalid UTF-8 is replaced, not fatal.
/// The reader is dropped, and so closed, on every exit path.
pub(crate) fn drain<R: Read>(
    reader: R,
    role: StreamRole,
    split: bool,
    stop: &CancellationToken,
    sink: &dyn ExceptionSink,
) -> String {
    let mut reader = BufReader::new(reader);
    let mut captured = String::new();
    let mut line = Vec::new();

    loop {
        if commons::is_cancelled(stop) {
            log::info!("Stopped reading the child's {} after an interrupt.", role);
            break;
        }

        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                captured.push_str(&String::from_utf8_lossy(strip_terminator(&line)));
                if split {
                    captured.push_str(LINE_TERMINATOR);
                }
            }
            Err(source) => {
                sink.observe(&ProcessError::StreamIo { role, source });
                break;
            }
        }
    }

    captured
}

fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Writes `payload` plus a line terminator to `writer`, flushes, and closes it.
///
/// Without a payload the writer is closed straight away. Closing is the only
/// end-of-input signal; no EOF character is sent. A child that stops reading
/// early (`BrokenPipe`) is not treated as a failure.
pub(crate) fn feed<W: Write>(
    writer: W,
    payload: Option<&str>,
    stop: &CancellationToken,
    sink: &dyn ExceptionSink,
) {
    let Some(payload) = payload else {
        log::debug!("No stdin payload; closing the child's stdin.");
        return;
    };

    let mut writer = BufWriter::new(writer);
    let result = payload
        .as_bytes()
        .chunks(WRITE_CHUNK_SIZE)
        .chain(std::iter::once(LINE_TERMINATOR.as_bytes()))
        .try_for_each(|chunk| {
            if commons::is_cancelled(stop) {
                return Err(std::io::Error::new(ErrorKind::Interrupted, "cancelled"));
            }
            writer.write_all(chunk)
        })
        .and_then(|()| writer.flush());

    match result {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::BrokenPipe => {
            log::debug!("The child closed its stdin before reading all input: {}", e);
        }
        Err(e) if e.kind() == ErrorKind::Interrupted && commons::is_cancelled(stop) => {
            log::info!("Stopped writing the child's stdin after an interrupt.");
        }
        Err(source) => sink.observe(&ProcessError::StreamIo {
            role: StreamRole::Stdin,
            source,
        }),
    }
}
