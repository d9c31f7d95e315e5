//! Configuration commands

use anyhow::{Context, Result};
use cli_lib::system_config;
use owo_colors::OwoColorize;
use std::path::Path;

/// Print where the config file lives and whether it is usable
pub fn run_path(config_path: Option<&Path>) -> Result<()> {
    let path = system_config::config_file_path(config_path)
        .context("Could not determine config file path")?;

    println!("{}", path.display());

    if !path.exists() {
        println!("{}", "(not created yet, run `config init`)".dimmed());
        return Ok(());
    }

    match system_config::load(&path) {
        Ok(config) => match config.validate().and_then(|_| config.validate_monitor_dir()) {
            Ok(()) => println!("{} {}", "✓".green(), "Config is valid".dimmed()),
            Err(e) => println!("{} {}", "✗".red(), e.to_string().yellow()),
        },
        Err(e) => println!("{} {:#}", "✗".red(), e),
    }

    Ok(())
}

/// Write the template unless a config already exists
pub fn run_init(config_path: Option<&Path>) -> Result<()> {
    let path = system_config::config_file_path(config_path)
        .context("Could not determine config file path")?;

    if system_config::init_if_missing(&path)? {
        println!("{} Created {}", "✓".green(), path.display());
        println!(
            "  {}",
            "Set monitor_dir and the [s3] values before running `start`".dimmed()
        );
    } else {
        println!("{} {}", "Config already exists:".yellow(), path.display());
    }

    Ok(())
}

/// Print the template to stdout
pub fn run_example() {
    print!("{}", system_config::example_config());
}
