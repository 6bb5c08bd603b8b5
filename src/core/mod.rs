// src/core/mod.rs

pub mod commons;
pub mod config_loader;
pub mod launcher;
pub mod paths;
