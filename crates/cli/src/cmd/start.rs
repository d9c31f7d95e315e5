//! Start the monitor

use anyhow::{bail, Context, Result};
use cli_lib::system_config;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let path = system_config::config_file_path(config_path)?;

    let config = system_config::load_or_init(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    if let Err(e) = config.validate() {
        bail!(
            "{} in {}. Please edit the file and set valid values.",
            e,
            path.display()
        );
    }
    config
        .validate_monitor_dir()
        .with_context(|| format!("Invalid config at {}", path.display()))?;

    cli_lib::daemon::run(config).await
}
