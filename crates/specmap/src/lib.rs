//! specmap library - Measure how much of a specification its work items cover
//!
//! This library exposes the CLI's configuration and loading logic for
//! testing and embedding purposes.

pub mod config;
pub mod data;
pub mod output;

use config::Config;
use eyre::{Result, WrapErr};
use std::path::{Path, PathBuf};

/// Default config location, relative to the project root
pub const CONFIG_PATH: &str = ".config/specmap/config.yaml";

/// Walk up from the current directory to the first one holding a specmap config
pub fn find_project_root() -> Result<PathBuf> {
    let mut current = std::env::current_dir()?;

    loop {
        if current.join(CONFIG_PATH).exists() {
            return Ok(current);
        }

        if !current.pop() {
            return std::env::current_dir().wrap_err("Failed to get current directory");
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        eyre::bail!(
            "Config file not found at {}\n\n\
             Create a config file listing your components:\n\n\
             components:\n  \
               - name: libfoo\n    \
                 snapshot: snapshots/libfoo.json\n    \
                 specification: specs/libfoo.txt",
            path.display()
        );
    }

    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = facet_yaml::from_str(&content)
        .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}
