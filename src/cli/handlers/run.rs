// src/cli/handlers/run.rs

use anyhow::{Result, anyhow};
use clap::Parser;
use colored::Colorize;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use super::commons;
use crate::{
    CancellationToken,
    cli::args::RunArgs,
    core::{
        config_loader::{self, Settings},
        paths,
    },
    models::{ProcessDescriptor, ProcessResult, StreamRole, WorkerConfigs},
    system::{error::ProcessError, executor::SafeProcess},
};

/// Main entry point for the `run` action.
///
/// Runs the command, replays its captured stdout/stderr (or prints the result as
/// JSON) and returns the exit code the CLI should exit with.
pub fn handle(args: Vec<String>, cancellation_token: &CancellationToken) -> Result<i32> {
    let run_args = RunArgs::try_parse_from(&args)?;
    let settings = config_loader::load_settings(run_args.config.as_deref())?;

    let descriptor = build_descriptor(&run_args, &settings)?;
    let configs = build_worker_configs(&run_args, &settings);
    let command_display = descriptor.display_command();

    // Failures are collected and shown after the child's own output.
    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink_failures = Arc::clone(&failures);
    let sink = move |e: &ProcessError| {
        log::debug!("Recorded failure: {:?}", e);
        if let Ok(mut list) = sink_failures.lock() {
            list.push(e.to_string());
        }
    };

    let result = SafeProcess::new(descriptor)
        .with_configs(configs)
        .with_sink(sink)
        .with_cancellation(Arc::clone(cancellation_token))
        .with_poll_interval(settings.poll_interval())
        .with_cancel_grace(settings.cancel_grace())
        .run();

    if run_args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        replay_output(&result)?;
    }

    if result.cancelled {
        return Err(anyhow!(ProcessError::Cancelled));
    }

    let failures = failures
        .lock()
        .map(|list| list.clone())
        .unwrap_or_default();

    if result.pid.is_none() {
        return Err(anyhow!(
            t!("run.error.launch_failed"),
            command = command_display,
            reason = failures.join("; ")
        ));
    }

    for failure in &failures {
        eprintln!("{}: {}", t!("run.warning.prefix").yellow().bold(), failure);
    }

    Ok(exit_code_for(&result))
}

/// Assembles the descriptor from the flags, falling back to settings for the working directory.
fn build_descriptor(run_args: &RunArgs, settings: &Settings) -> Result<ProcessDescriptor> {
    let mut builder = ProcessDescriptor::builder().clear_env(run_args.clear_env);

    if let Some(line) = &run_args.line {
        builder = builder.command_line(line.clone());
    }
    if !run_args.argv.is_empty() {
        builder = builder.argv(run_args.argv.iter().cloned());
    }
    if !run_args.env.is_empty() || run_args.clear_env {
        builder = builder.env(commons::parse_key_value_pairs(&run_args.env)?);
    }

    let working_dir = match &run_args.cwd {
        Some(raw) => Some(paths::expand_path(raw)?),
        None => settings.resolved_working_dir()?,
    };
    if let Some(dir) = working_dir {
        builder = builder.working_dir(dir);
    }
    if let Some(payload) = &run_args.stdin {
        builder = builder.stdin(payload.clone());
    }

    Ok(builder.build()?)
}

/// Per-stream newline splitting: flags override the settings file.
fn build_worker_configs(run_args: &RunArgs, settings: &Settings) -> WorkerConfigs {
    let (split_stdout, split_stderr) = if run_args.no_split {
        (false, false)
    } else {
        (
            run_args.split_stdout || settings.split_stdout_newlines,
            run_args.split_stderr || settings.split_stderr_newlines,
        )
    };

    WorkerConfigs::default()
        .with_split(StreamRole::Stdout, split_stdout)
        .with_split(StreamRole::Stderr, split_stderr)
}

fn replay_output(result: &ProcessResult) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(result.stdout.as_bytes())?;
    stdout.flush()?;

    let mut stderr = io::stderr().lock();
    stderr.write_all(result.stderr.as_bytes())?;
    stderr.flush()
}

/// Shell convention: a child killed by signal N maps to 128 + N.
fn exit_code_for(result: &ProcessResult) -> i32 {
    match result.signal {
        Some(signal) => 128 + signal,
        None => result.exit_code,
    }
}
