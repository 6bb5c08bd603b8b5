// src/system/executor.rs

use crate::CancellationToken;
use crate::constants::{DEFAULT_CANCEL_GRACE, DEFAULT_POLL_INTERVAL, SENTINEL_EXIT_CODE};
use crate::core::{commons, launcher};
use crate::models::{ProcessDescriptor, ProcessResult, WorkerConfigs};
use crate::system::capabilities::{ExceptionSink, LogSink, ProcessStream};
use crate::system::error::ProcessError;
use crate::system::stream_worker::{StreamWorker, join_worker};
use std::fmt;
use std::io::ErrorKind;
use std::mem;
use std::process::{Child, ExitStatus};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Runs `descriptor` to completion and returns everything it produced.
///
/// Blocks until the child has exited and all three stream workers have been
/// joined. Never fails: problems go to `sink` (or the log when `None`) and show
/// up in the result as [`SENTINEL_EXIT_CODE`] and partial or empty buffers.
pub fn run(
    descriptor: ProcessDescriptor,
    sink: Option<Arc<dyn ExceptionSink>>,
    configs: WorkerConfigs,
) -> ProcessResult {
    let mut process = SafeProcess::new(descriptor).with_configs(configs);
    if let Some(sink) = sink {
        process = process.with_shared_sink(sink);
    }
    process.run()
}

/// One configured invocation: descriptor, capabilities and timing.
///
/// ```no_run
/// use safeproc::{ProcessDescriptor, SafeProcess, WorkerConfigs};
///
/// let result = SafeProcess::new(ProcessDescriptor::from_line("ls -la"))
///     .with_configs(WorkerConfigs::split_lines())
///     .with_sink(|e: &safeproc::ProcessError| eprintln!("ls: {e}"))
///     .run();
/// println!("{}", result.stdout);
/// ```
pub struct SafeProcess {
    descriptor: ProcessDescriptor,
    sink: Arc<dyn ExceptionSink>,
    configs: WorkerConfigs,
    cancellation: Option<CancellationToken>,
    poll_interval: Duration,
    cancel_grace: Duration,
}

impl fmt::Debug for SafeProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SafeProcess")
            .field("descriptor", &self.descriptor)
            .field("configs", &self.configs)
            .field("cancellable", &self.cancellation.is_some())
            .field("poll_interval", &self.poll_interval)
            .field("cancel_grace", &self.cancel_grace)
            .finish_non_exhaustive()
    }
}

impl SafeProcess {
    pub fn new(descriptor: ProcessDescriptor) -> Self {
        Self {
            descriptor,
            sink: Arc::new(LogSink),
            configs: WorkerConfigs::default(),
            cancellation: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cancel_grace: DEFAULT_CANCEL_GRACE,
        }
    }

    /// Routes every failure of this invocation to `sink` instead of the log.
    pub fn with_sink(self, sink: impl ExceptionSink + 'static) -> Self {
        self.with_shared_sink(Arc::new(sink))
    }

    pub fn with_shared_sink(mut self, sink: Arc<dyn ExceptionSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_configs(mut self, configs: WorkerConfigs) -> Self {
        self.configs = configs;
        self
    }

    /// Makes the wait abortable: raising `token` terminates the child and
    /// returns a result marked as cancelled. The token stays raised afterwards.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// How often a cancellable wait checks the child and the token.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// How long workers may take to wind down after a cancelled or failed wait.
    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    /// Spawns the child, services its three streams concurrently, waits for it
    /// and joins the workers.
    ///
    /// The child handle sits in a scope guard: whichever way this function is
    /// left, a child that has not been reaped is killed and reaped.
    pub fn run(self) -> ProcessResult {
        let Self {
            descriptor,
            sink,
            mut configs,
            cancellation,
            poll_interval,
            cancel_grace,
        } = self;
        let invocation = Uuid::new_v4();
        let command_display = descriptor.display_command();

        if let Some(token) = &cancellation {
            if let Err(e) = commons::check_for_cancellation(token) {
                log::debug!("[{}] Cancelled before launch: {}", invocation, command_display);
                sink.observe(&e);
                let mut result = ProcessResult::not_started(invocation);
                result.cancelled = true;
                return result;
            }
        }

        log::info!("[{}] Running: {}", invocation, command_display);
        let child = match launcher::spawn(&descriptor) {
            Ok(child) => child,
            Err(e) => {
                sink.observe(&e);
                return ProcessResult::not_started(invocation);
            }
        };
        let pid = child.id();
        log::debug!("[{}] Spawned child process (PID: {}).", invocation, pid);

        let mut child = scopeguard::guard(child, move |mut child| {
            release_child(&mut child, invocation);
        });

        // Every stream gets its worker before the wait starts, so no pipe can
        // fill up while nothing is servicing it.
        let stop = commons::new_token();
        let input_worker = child.stdin.take().and_then(|stdin| {
            StreamWorker::start(
                ProcessStream::Stdin(stdin),
                mem::take(&mut configs.stdin),
                descriptor.stdin.clone(),
                &stop,
                &sink,
            )
        });
        let output_worker = child.stdout.take().and_then(|stdout| {
            StreamWorker::start(
                ProcessStream::Stdout(stdout),
                mem::take(&mut configs.stdout),
                None,
                &stop,
                &sink,
            )
        });
        let error_worker = child.stderr.take().and_then(|stderr| {
            StreamWorker::start(
                ProcessStream::Stderr(stderr),
                mem::take(&mut configs.stderr),
                None,
                &stop,
                &sink,
            )
        });

        let mut result = ProcessResult::not_started(invocation);
        result.pid = Some(pid);

        let join_deadline = match wait_for_exit(
            &mut child,
            cancellation.as_ref(),
            poll_interval,
            &command_display,
        ) {
            Ok(status) => {
                result.exit_code = status.code().unwrap_or(SENTINEL_EXIT_CODE);
                result.signal = exit_signal(&status);
                None
            }
            Err(e) => {
                // Workers stop at their next check; killing the child makes
                // blocked reads see end-of-stream.
                commons::cancel(&stop);
                terminate(&mut child, invocation);
                result.cancelled = matches!(e, ProcessError::Cancelled);
                sink.observe(&e);
                Some(Instant::now() + cancel_grace)
            }
        };

        result.stdout = join_worker(output_worker, join_deadline, sink.as_ref());
        result.stderr = join_worker(error_worker, join_deadline, sink.as_ref());
        join_worker(input_worker, join_deadline, sink.as_ref());

        if result.cancelled {
            if let Some(token) = &cancellation {
                commons::cancel(token);
            }
            log::info!("[{}] Cancelled: {}", invocation, command_display);
        } else {
            log::info!(
                "[{}] '{}' finished with exit code {}.",
                invocation,
                command_display,
                result.exit_code
            );
        }
        result
    }
}

/// Blocks until the child exits.
///
/// Without a token this is a plain blocking wait. With one, the child is polled
/// and the token checked between polls.
fn wait_for_exit(
    child: &mut Child,
    cancellation: Option<&CancellationToken>,
    poll_interval: Duration,
    command_display: &str,
) -> Result<ExitStatus, ProcessError> {
    let wait_error = |source| ProcessError::Wait {
        command: command_display.to_string(),
        source,
    };

    let Some(token) = cancellation else {
        return child.wait().map_err(wait_error);
    };

    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                commons::check_for_cancellation(token)?;
                thread::sleep(poll_interval);
            }
            Err(e) => return Err(wait_error(e)),
        }
    }
}

/// Kills and reaps the child. Failures are logged, never escalated.
fn terminate(child: &mut Child, invocation: Uuid) {
    log::debug!(
        "[{}] Killing child process (PID: {})...",
        invocation,
        child.id()
    );
    if let Err(e) = child.kill() {
        // InvalidInput: the child already exited.
        if e.kind() != ErrorKind::InvalidInput {
            log_close_failure(invocation, child.id(), e);
        }
    }
    if let Err(e) = child.wait() {
        log_close_failure(invocation, child.id(), e);
    }
}

/// Final cleanup: a child that was not reaped on the way out is terminated.
fn release_child(child: &mut Child, invocation: Uuid) {
    match child.try_wait() {
        Ok(Some(_)) => {}
        Ok(None) => terminate(child, invocation),
        Err(e) => {
            log_close_failure(invocation, child.id(), e);
            terminate(child, invocation);
        }
    }
}

fn log_close_failure(invocation: Uuid, pid: u32, source: std::io::Error) {
    let error = ProcessError::ResourceClose {
        what: format!("child process {}", pid),
        source,
    };
    log::warn!("[{}] {}", invocation, error);
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::constants::LINE_TERMINATOR;
    use crate::models::{StreamRole, WorkerConfig};
    use std::io::{Read, Write};
    use std::sync::Mutex;
    use std::sync::mpsc;

    fn recording_sink() -> (Arc<Mutex<Vec<ProcessError>>>, Arc<dyn ExceptionSink>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sink = move |e: &ProcessError| {
            // Keep only what the assertions need; io::Error is not Clone.
            let copy = match e {
                ProcessError::Launch { command, source } => ProcessError::Launch {
                    command: command.clone(),
                    source: std::io::Error::new(source.kind(), source.to_string()),
                },
                ProcessError::Cancelled => ProcessError::Cancelled,
                ProcessError::WorkerPanicked(role) => ProcessError::WorkerPanicked(*role),
                other => ProcessError::CommandParse(other.to_string()),
            };
            seen_clone.lock().unwrap().push(copy);
        };
        let sink: Arc<dyn ExceptionSink> = Arc::new(sink);
        (seen, sink)
    }

    fn sh(script: &str) -> ProcessDescriptor {
        ProcessDescriptor::from_argv(["sh", "-c", script])
    }

    #[test]
    fn test_captures_both_streams_and_exit_code() {
        let result = run(
            sh("echo out; echo err >&2; exit 7"),
            None,
            WorkerConfigs::split_lines(),
        );

        assert_eq!(result.exit_code, 7);
        assert_eq!(result.stdout, format!("out{}", LINE_TERMINATOR));
        assert_eq!(result.stderr, format!("err{}", LINE_TERMINATOR));
        assert!(result.pid.is_some());
        assert!(!result.cancelled);
        assert!(!result.success());
    }

    #[test]
    fn test_stdin_round_trip_through_cat() {
        let descriptor = ProcessDescriptor::from_argv(["cat"]).with_stdin("hello");
        let result = run(descriptor, None, WorkerConfigs::split_lines());

        assert!(result.success());
        assert_eq!(result.stdout, format!("hello{}", LINE_TERMINATOR));
        assert_eq!(result.stderr, "");
    }

    #[test]
    fn test_no_payload_closes_stdin_immediately() {
        let started = Instant::now();
        let result = run(
            ProcessDescriptor::from_argv(["cat"]),
            None,
            WorkerConfigs::default(),
        );

        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_without_split_lines_are_concatenated() {
        let result = run(sh("printf 'a\\nb\\nc\\n'"), None, WorkerConfigs::default());
        assert_eq!(result.stdout, "abc");
    }

    #[test]
    fn test_large_stderr_does_not_deadlock() {
        // 512 Ki lines of "x\n" = 1 MiB on stderr, far beyond any pipe buffer.
        let descriptor = sh("cat >/dev/null; yes x | head -n 524288 >&2; echo done")
            .with_stdin("short payload");
        let started = Instant::now();

        let result = run(descriptor, None, WorkerConfigs::split_lines());

        assert!(started.elapsed() < Duration::from_secs(30));
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, format!("done{}", LINE_TERMINATOR));
        assert_eq!(result.stderr.len(), 524_288 * (1 + LINE_TERMINATOR.len()));
    }

    #[test]
    fn test_large_stdout_and_stderr_interleaved() {
        let script = "i=0; while [ $i -lt 20000 ]; do echo out$i; echo err$i >&2; i=$((i+1)); done";
        let result = run(sh(script), None, WorkerConfigs::split_lines());

        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout.lines().count(), 20_000);
        assert_eq!(result.stderr.lines().count(), 20_000);
        assert_eq!(result.stdout.lines().last(), Some("out19999"));
        assert_eq!(result.stderr.lines().next(), Some("err0"));
    }

    #[test]
    fn test_environment_overrides_are_layered_on_inherited() {
        let descriptor = sh("printf '%s|%s' \"$SAFEPROC_TEST_VAR\" \"${PATH:+path}\"")
            .with_env("SAFEPROC_TEST_VAR", "bar");
        let result = run(descriptor, None, WorkerConfigs::default());
        assert_eq!(result.stdout, "bar|path");
    }

    #[test]
    fn test_clear_env_passes_only_the_overrides() {
        let descriptor = ProcessDescriptor::from_argv(["/usr/bin/env"])
            .with_clear_env(true)
            .with_env("ONLY", "1");
        let result = run(descriptor, None, WorkerConfigs::split_lines());
        assert_eq!(result.stdout, format!("ONLY=1{}", LINE_TERMINATOR));
    }

    #[test]
    fn test_working_directory_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let descriptor = ProcessDescriptor::from_argv(["pwd"]).with_working_dir(dir.path());

        let result = run(descriptor, None, WorkerConfigs::default());

        let reported = std::fs::canonicalize(result.stdout.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn test_command_line_form_is_split_with_quotes() {
        let result = run(
            ProcessDescriptor::from_line("printf '%s-%s' 'a b' c"),
            None,
            WorkerConfigs::default(),
        );
        assert_eq!(result.stdout, "a b-c");
    }

    #[test]
    fn test_launch_failure_reports_to_sink_and_returns_sentinel() {
        let (seen, sink) = recording_sink();
        let result = run(
            ProcessDescriptor::from_argv(["safeproc-no-such-program-xyz"]),
            Some(sink),
            WorkerConfigs::default(),
        );

        assert_eq!(result.exit_code, SENTINEL_EXIT_CODE);
        assert!(result.is_sentinel());
        assert_eq!(result.pid, None);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(matches!(&seen[0], ProcessError::Launch { source, .. } if source.kind() == ErrorKind::NotFound));
    }

    #[test]
    fn test_invalid_descriptor_without_sink_still_returns() {
        let result = run(
            ProcessDescriptor::from_line("echo 'unterminated"),
            None,
            WorkerConfigs::default(),
        );
        assert_eq!(result.exit_code, SENTINEL_EXIT_CODE);
        assert_eq!(result.stdout, "");
    }

    #[test]
    fn test_custom_stdout_handler_bypasses_buffering() {
        let (tx, rx) = mpsc::channel();
        let configs = WorkerConfigs::split_lines().with_handler(
            StreamRole::Stdout,
            move |mut stream: ProcessStream| {
                let mut seen = String::new();
                stream.read_to_string(&mut seen).unwrap();
                tx.send(seen).unwrap();
            },
        );

        let result = run(sh("echo handled; echo kept >&2"), None, configs);

        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "");
        assert_eq!(result.stderr, format!("kept{}", LINE_TERMINATOR));
        assert_eq!(rx.recv().unwrap(), "handled\n");
    }

    #[test]
    fn test_custom_stdin_handler_owns_the_stream() {
        let mut configs = WorkerConfigs::split_lines();
        configs.stdin = WorkerConfig::with_handler(|mut stream: ProcessStream| {
            stream.write_all(b"one\ntwo\n").unwrap();
        });
        let descriptor = ProcessDescriptor::from_argv(["cat"]).with_stdin("ignored");

        let result = run(descriptor, None, configs);

        let lt = LINE_TERMINATOR;
        assert_eq!(result.stdout, format!("one{lt}two{lt}"));
    }

    #[test]
    fn test_panicking_handler_does_not_take_down_the_run() {
        let (seen, sink) = recording_sink();
        let configs = WorkerConfigs::split_lines()
            .with_handler(StreamRole::Stdout, |stream: ProcessStream| {
                drop(stream);
                panic!("handler failed mid-read");
            });

        let result = run(sh("echo err-full >&2; echo gone"), Some(sink), configs);

        assert_eq!(result.stdout, "");
        assert_eq!(result.stderr, format!("err-full{}", LINE_TERMINATOR));
        let seen = seen.lock().unwrap();
        assert!(
            seen.iter()
                .any(|e| matches!(e, ProcessError::WorkerPanicked(StreamRole::Stdout)))
        );
    }

    #[test]
    fn test_cancellation_returns_promptly_and_kills_child() {
        let (seen, sink) = recording_sink();
        let token = commons::new_token();
        let trigger = Arc::clone(&token);
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            commons::cancel(&trigger);
        });
        let started = Instant::now();

        let result = SafeProcess::new(ProcessDescriptor::from_argv(["sleep", "30"]))
            .with_shared_sink(sink)
            .with_cancellation(Arc::clone(&token))
            .run();
        canceller.join().unwrap();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(result.cancelled);
        assert_eq!(result.exit_code, SENTINEL_EXIT_CODE);
        assert!(commons::is_cancelled(&token));
        assert!(matches!(
            seen.lock().unwrap().as_slice(),
            [ProcessError::Cancelled]
        ));

        #[cfg(target_os = "linux")]
        {
            let pid = result.pid.unwrap();
            assert!(!std::path::Path::new(&format!("/proc/{}", pid)).exists());
        }
    }

    #[test]
    fn test_raised_token_prevents_launch() {
        let token = commons::new_token();
        commons::cancel(&token);

        let result = SafeProcess::new(ProcessDescriptor::from_argv(["true"]))
            .with_cancellation(token)
            .run();

        assert!(result.cancelled);
        assert_eq!(result.pid, None);
    }

    #[test]
    fn test_cancellable_wait_still_reports_normal_exit() {
        let result = SafeProcess::new(sh("echo fine; exit 3"))
            .with_configs(WorkerConfigs::split_lines())
            .with_cancellation(commons::new_token())
            .with_poll_interval(Duration::from_millis(5))
            .run();

        assert_eq!(result.exit_code, 3);
        assert!(!result.cancelled);
        assert_eq!(result.stdout, format!("fine{}", LINE_TERMINATOR));
    }

    #[test]
    fn test_killed_child_reports_signal_and_sentinel() {
        let result = run(sh("kill -9 $$"), None, WorkerConfigs::default());
        assert_eq!(result.exit_code, SENTINEL_EXIT_CODE);
        assert_eq!(result.signal, Some(9));
    }
}
