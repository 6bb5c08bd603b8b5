// src/models.rs

use crate::constants::SENTINEL_EXIT_CODE;
use crate::system::capabilities::CustomStreamHandler;
use crate::system::error::ProcessError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

// --- Invocation Input ---

/// How the program to run is expressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandForm {
    /// A single command line, split into words with POSIX shell quoting rules.
    /// It is not handed to a shell.
    Line(String),
    /// Program followed by its arguments, passed through untouched.
    Argv(Vec<String>),
}

/// Everything needed to launch one child process.
///
/// Built by the caller and only read afterwards; [`crate::run`] takes it by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDescriptor {
    pub command: CommandForm,
    /// Variables set for the child. `None` inherits the caller's environment untouched.
    pub env: Option<HashMap<String, String>>,
    /// Start the child with an empty environment before applying `env`.
    pub clear_env: bool,
    /// `None` inherits the caller's working directory.
    pub working_dir: Option<PathBuf>,
    /// Text sent to the child's stdin, followed by a line terminator.
    pub stdin: Option<String>,
}

impl ProcessDescriptor {
    /// Describes a child launched from a single command line.
    pub fn from_line(line: impl Into<String>) -> Self {
        Self::with_command(CommandForm::Line(line.into()))
    }

    /// Describes a child launched from a program and its arguments.
    pub fn from_argv<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_command(CommandForm::Argv(argv.into_iter().map(Into::into).collect()))
    }

    /// Starts a builder that validates the "exactly one command form" rule.
    pub fn builder() -> ProcessDescriptorBuilder {
        ProcessDescriptorBuilder::default()
    }

    fn with_command(command: CommandForm) -> Self {
        Self {
            command,
            env: None,
            clear_env: false,
            working_dir: None,
            stdin: None,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_clear_env(mut self, clear: bool) -> Self {
        self.clear_env = clear;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_stdin(mut self, payload: impl Into<String>) -> Self {
        self.stdin = Some(payload.into());
        self
    }

    /// Human readable form of the command, used in logs and error messages.
    pub fn display_command(&self) -> String {
        match &self.command {
            CommandForm::Line(line) => line.trim().to_string(),
            CommandForm::Argv(argv) => shlex::try_join(argv.iter().map(String::as_str))
                .unwrap_or_else(|_| argv.join(" ")),
        }
    }
}

/// Collects the parts of a [`ProcessDescriptor`] from independent sources
/// (for example CLI flags) and checks them once at [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct ProcessDescriptorBuilder {
    command_line: Option<String>,
    argv: Option<Vec<String>>,
    env: Option<HashMap<String, String>>,
    clear_env: bool,
    working_dir: Option<PathBuf>,
    stdin: Option<String>,
}

impl ProcessDescriptorBuilder {
    pub fn command_line(mut self, line: impl Into<String>) -> Self {
        self.command_line = Some(line.into());
        self
    }

    pub fn argv<I, S>(mut self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.argv = Some(argv.into_iter().map(Into::into).collect());
        self
    }

    pub fn env(mut self, vars: HashMap<String, String>) -> Self {
        self.env = Some(vars);
        self
    }

    pub fn clear_env(mut self, clear: bool) -> Self {
        self.clear_env = clear;
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn stdin(mut self, payload: impl Into<String>) -> Self {
        self.stdin = Some(payload.into());
        self
    }

    /// Fails unless exactly one of command line and argument vector is set,
    /// and an argument vector is non-empty.
    pub fn build(self) -> Result<ProcessDescriptor, ProcessError> {
        let command = match (self.command_line, self.argv) {
            (Some(_), Some(_)) => return Err(ProcessError::AmbiguousCommand),
            (None, None) => return Err(ProcessError::EmptyCommand),
            (Some(line), None) => CommandForm::Line(line),
            (None, Some(argv)) if argv.is_empty() => return Err(ProcessError::EmptyCommand),
            (None, Some(argv)) => CommandForm::Argv(argv),
        };
        Ok(ProcessDescriptor {
            command,
            env: self.env,
            clear_env: self.clear_env,
            working_dir: self.working_dir,
            stdin: self.stdin,
        })
    }
}

// --- Streams & Workers ---

/// One of the child's three standard streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamRole {
    Stdin,
    Stdout,
    Stderr,
}

impl fmt::Display for StreamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stdin => "stdin",
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        };
        f.write_str(name)
    }
}

/// Per-stream behaviour of one worker.
#[derive(Default)]
pub struct WorkerConfig {
    /// Keep line boundaries in the captured text. Ignored for stdin.
    pub split_on_newline: bool,
    /// Takes over the raw stream; the worker then captures nothing itself.
    pub handler: Option<Box<dyn CustomStreamHandler>>,
}

impl WorkerConfig {
    /// Default buffering with line boundaries preserved.
    pub fn split_lines() -> Self {
        Self {
            split_on_newline: true,
            handler: None,
        }
    }

    /// Hands the raw stream to `handler`.
    pub fn with_handler(handler: impl CustomStreamHandler + 'static) -> Self {
        Self {
            split_on_newline: false,
            handler: Some(Box::new(handler)),
        }
    }
}

impl fmt::Debug for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerConfig")
            .field("split_on_newline", &self.split_on_newline)
            .field("custom_handler", &self.handler.is_some())
            .finish()
    }
}

/// The three per-role configurations for one invocation.
#[derive(Debug, Default)]
pub struct WorkerConfigs {
    pub stdin: WorkerConfig,
    pub stdout: WorkerConfig,
    pub stderr: WorkerConfig,
}

impl WorkerConfigs {
    /// Default buffering on every stream, with line boundaries kept on stdout and stderr.
    pub fn split_lines() -> Self {
        Self {
            stdin: WorkerConfig::default(),
            stdout: WorkerConfig::split_lines(),
            stderr: WorkerConfig::split_lines(),
        }
    }

    pub fn with_split(mut self, role: StreamRole, split: bool) -> Self {
        self.get_mut(role).split_on_newline = split;
        self
    }

    pub fn with_handler(
        mut self,
        role: StreamRole,
        handler: impl CustomStreamHandler + 'static,
    ) -> Self {
        self.get_mut(role).handler = Some(Box::new(handler));
        self
    }

    pub fn get_mut(&mut self, role: StreamRole) -> &mut WorkerConfig {
        match role {
            StreamRole::Stdin => &mut self.stdin,
            StreamRole::Stdout => &mut self.stdout,
            StreamRole::Stderr => &mut self.stderr,
        }
    }
}

// --- Invocation Output ---

/// What one invocation produced. Built once, after every worker has been joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResult {
    /// Correlates this result with the log lines of its invocation.
    pub invocation: Uuid,
    /// Empty when stdout was given to a custom handler.
    pub stdout: String,
    /// Empty when stderr was given to a custom handler.
    pub stderr: String,
    /// The child's exit code, or [`SENTINEL_EXIT_CODE`].
    pub exit_code: i32,
    /// Signal that terminated the child (Unix only).
    pub signal: Option<i32>,
    /// Process id of the child; `None` when it was never spawned.
    pub pid: Option<u32>,
    /// Set when the invocation was aborted through the cancellation token.
    pub cancelled: bool,
}

impl ProcessResult {
    pub(crate) fn not_started(invocation: Uuid) -> Self {
        Self {
            invocation,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: SENTINEL_EXIT_CODE,
            signal: None,
            pid: None,
            cancelled: false,
        }
    }

    /// The child ran to completion and exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.cancelled
    }

    /// The exit code is the sentinel: launch failed, the child was killed, or the run was cancelled.
    pub fn is_sentinel(&self) -> bool {
        self.exit_code == SENTINEL_EXIT_CODE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_rejects_both_command_forms() {
        let result = ProcessDescriptor::builder()
            .command_line("echo hi")
            .argv(["echo", "hi"])
            .build();
        assert!(matches!(result, Err(ProcessError::AmbiguousCommand)));
    }

    #[test]
    fn test_builder_rejects_missing_or_empty_command() {
        assert!(matches!(
            ProcessDescriptor::builder().build(),
            Err(ProcessError::EmptyCommand)
        ));
        assert!(matches!(
            ProcessDescriptor::builder().argv(Vec::<String>::new()).build(),
            Err(ProcessError::EmptyCommand)
        ));
    }

    #[test]
    fn test_builder_keeps_optional_parts() {
        let mut vars = HashMap::new();
        vars.insert("LANG".to_string(), "C".to_string());
        let descriptor = ProcessDescriptor::builder()
            .argv(["sort"])
            .env(vars)
            .working_dir("/tmp")
            .stdin("b\na")
            .build()
            .unwrap();

        assert_eq!(descriptor.command, CommandForm::Argv(vec!["sort".into()]));
        assert_eq!(descriptor.env.unwrap().get("LANG").map(String::as_str), Some("C"));
        assert_eq!(descriptor.working_dir, Some(PathBuf::from("/tmp")));
        assert_eq!(descriptor.stdin.as_deref(), Some("b\na"));
        assert!(!descriptor.clear_env);
    }

    #[test]
    fn test_display_command_quotes_argv() {
        let descriptor = ProcessDescriptor::from_argv(["echo", "hello world"]);
        let shown = descriptor.display_command();
        assert!(shown.starts_with("echo "));
        assert_eq!(
            shlex::split(&shown),
            Some(vec!["echo".to_string(), "hello world".to_string()])
        );
        let descriptor = ProcessDescriptor::from_line("  ls -la  ");
        assert_eq!(descriptor.display_command(), "ls -la");
    }

    #[test]
    fn test_worker_configs_route_by_role() {
        let configs = WorkerConfigs::default()
            .with_split(StreamRole::Stderr, true)
            .with_handler(StreamRole::Stdout, |_stream: crate::ProcessStream| {});
        assert!(configs.stderr.split_on_newline);
        assert!(!configs.stdout.split_on_newline);
        assert!(configs.stdout.handler.is_some());
        assert!(configs.stdin.handler.is_none());
    }

    #[test]
    fn test_stream_role_display_matches_serde_name() {
        assert_eq!(StreamRole::Stdout.to_string(), "stdout");
        assert_eq!(
            serde_json::to_string(&StreamRole::Stderr).unwrap(),
            "\"stderr\""
        );
    }
}
