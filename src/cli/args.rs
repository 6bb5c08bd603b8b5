// src/cli/args.rs

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)] // The dispatcher has already consumed "run".
pub struct RunArgs {
    /// Run a single command line, split with shell quoting rules (not run through a shell).
    #[arg(long, short = 'l', conflicts_with = "argv")]
    pub line: Option<String>,

    /// Text sent to the child's stdin, followed by a newline.
    #[arg(long)]
    pub stdin: Option<String>,

    /// Set environment variables for the child (e.g., "KEY=VALUE").
    #[arg(long, short = 'e', value_delimiter = ',', num_args = 1..)]
    pub env: Vec<String>,

    /// Start the child with an empty environment (only `--env` variables are set).
    #[arg(long)]
    pub clear_env: bool,

    /// Working directory of the child. `~` and `$VAR` are expanded.
    #[arg(long)]
    pub cwd: Option<String>,

    /// Keep line boundaries in captured stdout.
    #[arg(long, conflicts_with = "no_split")]
    pub split_stdout: bool,

    /// Keep line boundaries in captured stderr.
    #[arg(long, conflicts_with = "no_split")]
    pub split_stderr: bool,

    /// Concatenate output lines without separators on both streams.
    #[arg(long)]
    pub no_split: bool,

    /// Print the full result as JSON instead of replaying the streams.
    #[arg(long)]
    pub json: bool,

    /// Read settings from this file instead of the default location.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// The program to run followed by its arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub argv: Vec<String>,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)]
pub struct ConfigArgs {
    /// Write a settings file with the default values.
    #[arg(long)]
    pub init: bool,

    /// Overwrite an existing settings file when used with `--init`.
    #[arg(long, requires = "init")]
    pub force: bool,

    /// Only print the location of the settings file.
    #[arg(long)]
    pub path: bool,

    /// Use this settings file instead of the default location.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_collect_trailing_argv_with_hyphens() {
        let args = RunArgs::try_parse_from(["--stdin", "hi", "--", "grep", "-n", "x"]).unwrap();
        assert_eq!(args.stdin.as_deref(), Some("hi"));
        assert_eq!(args.argv, vec!["grep", "-n", "x"]);
        assert!(args.line.is_none());
    }

    #[test]
    fn test_run_args_env_accepts_comma_lists() {
        let args = RunArgs::try_parse_from(["-e", "A=1,B=2", "--env", "C=3", "--", "env"]).unwrap();
        assert_eq!(args.env, vec!["A=1", "B=2", "C=3"]);
    }

    #[test]
    fn test_run_args_line_conflicts_with_argv() {
        assert!(RunArgs::try_parse_from(["--line", "ls", "--", "ls"]).is_err());
    }

    #[test]
    fn test_run_args_no_split_conflicts_with_split_flags() {
        assert!(RunArgs::try_parse_from(["--no-split", "--split-stdout", "--", "ls"]).is_err());
    }

    #[test]
    fn test_config_force_requires_init() {
        assert!(ConfigArgs::try_parse_from(["--force"]).is_err());
        assert!(ConfigArgs::try_parse_from(["--init", "--force"]).unwrap().force);
    }
}
