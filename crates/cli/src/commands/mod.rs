pub mod config_cmd;
pub mod serve;

use ragline_config::AppConfig;
use std::path::PathBuf;

/// Load config from an explicit file, or fall back to env-derived defaults.
pub fn load_config(path: Option<PathBuf>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load(&path)
            .map_err(|e| format!("Failed to load config from {}: {e}", path.display()))?,
        None => AppConfig::from_env().map_err(|e| format!("Failed to build config: {e}"))?,
    };
    Ok(config)
}
