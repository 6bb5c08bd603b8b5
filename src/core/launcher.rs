// src/core/launcher.rs

use crate::models::{CommandForm, ProcessDescriptor};
use crate::system::error::ProcessError;
use std::io::ErrorKind;
use std::process::{Child, Command as StdCommand, Stdio};

/// Turns the descriptor's command form into a program followed by its arguments.
///
/// A command line is split with POSIX shell quoting rules; it is never handed to a shell.
pub fn resolve_argv(descriptor: &ProcessDescriptor) -> Result<Vec<String>, ProcessError> {
    let parts = match &descriptor.command {
        CommandForm::Line(line) => {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return Err(ProcessError::EmptyCommand);
            }
            shlex::split(trimmed).ok_or_else(|| ProcessError::CommandParse(trimmed.to_string()))?
        }
        CommandForm::Argv(argv) => argv.clone(),
    };

    match parts.first() {
        Some(program) if !program.is_empty() => Ok(parts),
        _ => Err(ProcessError::EmptyCommand),
    }
}

/// Builds a command with all three standard streams piped.
fn build_command(program: &str, args: &[String], descriptor: &ProcessDescriptor) -> StdCommand {
    let mut command = StdCommand::new(program);
    command
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if descriptor.clear_env {
        command.env_clear();
    }
    if let Some(vars) = &descriptor.env {
        command.envs(vars);
    }
    if let Some(dir) = &descriptor.working_dir {
        command.current_dir(dunce::simplified(dir));
    }
    command
}

/// Validates the descriptor and spawns the child with piped stdio.
pub fn spawn(descriptor: &ProcessDescriptor) -> Result<Child, ProcessError> {
    let argv = resolve_argv(descriptor)?;
    let (program, args) = argv.split_first().ok_or(ProcessError::EmptyCommand)?;
    let display = descriptor.display_command();

    match build_command(program, args, descriptor).spawn() {
        Ok(child) => Ok(child),
        // Built-ins like `echo` or `dir` only exist inside cmd.exe.
        Err(e)
            if e.kind() == ErrorKind::NotFound
                && cfg!(target_os = "windows")
                && matches!(descriptor.command, CommandForm::Line(_)) =>
        {
            log::debug!("Command '{}' not found. Retrying with cmd /C.", program);
            let fallback = ["/C".to_string(), display.clone()];
            build_command("cmd", &fallback, descriptor)
                .spawn()
                .map_err(|source| ProcessError::Launch {
                    command: display,
                    source,
                })
        }
        Err(source) => Err(ProcessError::Launch {
            command: display,
            source,
        }),
    }
}
