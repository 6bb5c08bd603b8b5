// src/cli/handlers/commons.rs

// Helpers shared by the CLI handlers.

use anyhow::{Result, anyhow};
use std::collections::HashMap;

/// Parses `KEY=VALUE` strings into a map. Later duplicates win.
pub fn parse_key_value_pairs(pairs: &[String]) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for pair in pairs {
        match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                map.insert(key.trim().to_string(), value.to_string());
            }
            _ => {
                return Err(anyhow!(
                    "Invalid format for key-value pair: '{}'. Expected 'KEY=VALUE'.",
                    pair
                ));
            }
        }
    }
    Ok(map)
}
