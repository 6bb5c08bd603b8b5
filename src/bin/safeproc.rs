// src/bin/safeproc.rs

use clap::Parser;
use colored::*;
use safeproc::{
    CancellationToken,
    cli::{Cli, dispatcher},
    constants::INTERRUPTED_EXIT_CODE,
    core::commons,
    system::error::ProcessError,
    t,
};
use std::sync::Arc;
use std::thread;

/// The main entry point of the `safeproc` application.
/// It sets up logging and the Ctrl+C listener, dispatches to the correct handler,
/// and performs centralized error handling.
fn main() {
    env_logger::init();
    let cancellation_token = commons::new_token();
    install_ctrl_c_listener(&cancellation_token);

    match dispatcher::dispatch(Cli::parse(), &cancellation_token) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            // An interrupted run exits silently, like a shell would.
            if let Some(ProcessError::Cancelled) = e.downcast_ref::<ProcessError>() {
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
            eprintln!("\n{}: {}", t!("cli.error.prefix").red().bold(), e);
            std::process::exit(1);
        }
    }
}

/// Raises the token on the first Ctrl+C. The running child is then killed and reaped
/// by the executor, which hands back whatever output was captured so far.
fn install_ctrl_c_listener(token: &CancellationToken) {
    let token = Arc::clone(token);
    let spawned = thread::Builder::new()
        .name("safeproc-signal".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    log::warn!("Ctrl+C listener unavailable: {}", e);
                    return;
                }
            };
            runtime.block_on(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        log::debug!("Ctrl+C received, cancelling.");
                        commons::cancel(&token);
                    }
                    Err(e) => log::warn!("Ctrl+C listener failed: {}", e),
                }
            });
        });
    if let Err(e) = spawned {
        log::warn!("Could not start the Ctrl+C listener thread: {}", e);
    }
}
