// src/cli/mod.rs

use clap::Parser;

pub mod args;
pub mod dispatcher;
pub mod handlers;

/// safeproc: run external commands and collect their complete output safely.
///
/// Usage:
///   - `safeproc run [OPTIONS] -- <PROGRAM> [ARGS...]`
///   - `safeproc run --line "<command line>" [OPTIONS]`
///   - `safeproc config [--init] [--path]`
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// The action to perform (`run`, `config`).
    pub action: Option<String>,

    /// Arguments for the action, passed through untouched.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}
