// src/cli/handlers/config.rs

use anyhow::{Result, anyhow};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;

use crate::{
    CancellationToken,
    cli::args::ConfigArgs,
    core::{
        config_loader::{self, Settings},
        paths,
    },
};

/// Main entry point for the `config` action.
/// Shows the effective settings, prints where they live, or writes the defaults.
pub fn handle(args: Vec<String>, _cancellation_token: &CancellationToken) -> Result<i32> {
    let config_args = ConfigArgs::try_parse_from(&args)?;
    let path: PathBuf = match &config_args.config {
        Some(explicit) => explicit.clone(),
        None => paths::get_settings_path()?,
    };

    if config_args.path {
        println!("{}", path.display());
        return Ok(0);
    }

    if config_args.init {
        if path.exists() && !config_args.force {
            return Err(anyhow!(t!("config.error.exists"), path = path.display()));
        }
        config_loader::write_settings(&Settings::default(), &path)?;
        println!(
            "{}",
            format!(t!("config.info.written"), path = path.display()).green()
        );
        return Ok(0);
    }

    let settings = if path.exists() {
        config_loader::load_settings(Some(&path))?
    } else {
        println!("{}", t!("config.info.defaults").dimmed());
        Settings::default()
    };
    print!("{}", toml::to_string_pretty(&settings)?);
    Ok(0)
}
