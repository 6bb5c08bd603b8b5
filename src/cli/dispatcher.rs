use anyhow::{Result, anyhow};

use crate::{
    CancellationToken,
    cli::{Cli, handlers},
};

// --- Command Definition and Registry ---

/// An action, its aliases, and its handler.
/// Handlers return the exit code the process should terminate with.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(Vec<String>, &CancellationToken) -> Result<i32>,
}

/// The single source of truth for all CLI actions.
static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "config",
        aliases: &["cfg"],
        handler: handlers::config::handle,
    },
    CommandDefinition {
        name: "run",
        aliases: &["exec"],
        handler: handlers::run::handle,
    },
];

/// Finds a command definition in the registry by its name or alias.
fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// Routes the parsed command line to its handler and returns the exit code.
pub fn dispatch(cli: Cli, cancellation_token: &CancellationToken) -> Result<i32> {
    log::debug!("CLI args parsed: {:?}", cli);

    let Some(action) = cli.action else {
        println!("{}", t!("cli.info.welcome"));
        return Ok(0);
    };

    match find_command(&action) {
        Some(command) => (command.handler)(cli.args, cancellation_token),
        None => {
            let available: Vec<&str> = COMMAND_REGISTRY.iter().map(|cmd| cmd.name).collect();
            Err(anyhow!(
                t!("cli.error.unknown_action"),
                action = action,
                actions = available.join(", ")
            ))
        }
    }
}
