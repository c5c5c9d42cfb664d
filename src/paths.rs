//! Centralized path resolution for VolumeBot
//!
//! Every file the bot touches is resolved through this module so the binary,
//! the library and the tests agree on one layout:
//!
//! ```text
//! <base>/
//! ├── data/
//! │   ├── config.toml
//! │   └── volumebot.db
//! └── logs/
//!     └── volumebot_<date>.log
//! ```
//!
//! The base directory is the platform data directory (`dirs::data_local_dir`)
//! joined with `VolumeBot`, unless `VOLUMEBOT_HOME` is set.

use once_cell::sync::Lazy;
use std::path::PathBuf;

/// Environment variable that overrides the base directory
pub const HOME_ENV_VAR: &str = "VOLUMEBOT_HOME";

const APP_DIR: &str = "VolumeBot";

// =============================================================================
// BASE DIRECTORY RESOLUTION
// =============================================================================

static BASE_DIRECTORY: Lazy<PathBuf> = Lazy::new(resolve_base_directory);

fn resolve_base_directory() -> PathBuf {
    if let Ok(custom) = std::env::var(HOME_ENV_VAR) {
        if !custom.trim().is_empty() {
            return PathBuf::from(custom);
        }
    }

    if let Some(dir) = dirs::data_local_dir() {
        return dir.join(APP_DIR);
    }

    if let Some(dir) = dirs::data_dir() {
        return dir.join(APP_DIR);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(APP_DIR);
    }

    PathBuf::from(APP_DIR)
}

// =============================================================================
// DIRECTORY ACCESSORS
// =============================================================================

/// Root directory for all VolumeBot data
pub fn get_base_directory() -> PathBuf {
    BASE_DIRECTORY.clone()
}

/// Databases and the config file live here
pub fn get_data_directory() -> PathBuf {
    BASE_DIRECTORY.join("data")
}

/// Daily log files
pub fn get_logs_directory() -> PathBuf {
    BASE_DIRECTORY.join("logs")
}

/// Main configuration file path
pub fn get_config_path() -> PathBuf {
    get_data_directory().join("config.toml")
}

/// SQLite database holding the wallet pool and sessions
pub fn get_database_path() -> PathBuf {
    get_data_directory().join("volumebot.db")
}

// =============================================================================
// DIRECTORY CREATION
// =============================================================================

/// Creates the base, data and logs directories if they are missing
pub fn ensure_all_directories() -> Result<(), String> {
    let dirs_to_create = vec![
        ("base", get_base_directory()),
        ("data", get_data_directory()),
        ("logs", get_logs_directory()),
    ];

    for (name, dir) in dirs_to_create {
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                format!(
                    "Failed to create {} directory at {}: {}",
                    name,
                    dir.display(),
                    e
                )
            })?;
            eprintln!("Created directory: {}", dir.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_and_logs_are_subdirs() {
        let base = get_base_directory();
        assert!(get_data_directory().starts_with(&base));
        assert!(get_logs_directory().starts_with(&base));
    }

    #[test]
    fn test_files_in_data_dir() {
        let data = get_data_directory();
        assert!(get_config_path().starts_with(&data));
        assert!(get_database_path().starts_with(&data));
        assert_eq!(get_config_path().file_name().unwrap(), "config.toml");
    }
}
