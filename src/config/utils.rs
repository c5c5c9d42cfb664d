use super::schemas::Config;
/// Configuration utilities: loading, saving and thread-safe access
use crate::paths;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use solana_sdk::signature::Keypair;
use std::path::Path;

/// Global configuration instance
///
/// Reads before `load_config` see the embedded defaults.
pub static CONFIG: OnceCell<RwLock<Config>> = OnceCell::new();

fn config_cell() -> &'static RwLock<Config> {
    CONFIG.get_or_init(|| RwLock::new(Config::default()))
}

/// Load `data/config.toml` from the data directory
pub fn load_config() -> Result<(), String> {
    load_config_from_path(&paths::get_config_path())
}

/// Load configuration from a specific TOML file
///
/// A missing file is not an error; defaults are used instead. A file that
/// exists but fails to parse or validate is.
pub fn load_config_from_path(path: &Path) -> Result<(), String> {
    let config = if path.exists() {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        toml::from_str::<Config>(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?
    } else {
        eprintln!(
            "Config file '{}' not found, using default values",
            path.display()
        );
        Config::default()
    };

    config.validate()?;
    *config_cell().write() = config;
    Ok(())
}

/// Read access to the configuration
///
/// ```rust,ignore
/// let interval = with_config(|cfg| cfg.scheduler.interval_secs);
/// ```
pub fn with_config<F, R>(f: F) -> R
where
    F: FnOnce(&Config) -> R,
{
    let config = config_cell().read();
    f(&config)
}

/// Write the current configuration to disk (default: `data/config.toml`)
pub fn save_config(path: Option<&Path>) -> Result<(), String> {
    let default_path = paths::get_config_path();
    let path = path.unwrap_or(&default_path);

    let config_str = with_config(|cfg| {
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))
    })?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
    }

    std::fs::write(path, config_str)
        .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))
}

// ============================================================================
// WALLET KEY PARSING
// ============================================================================

/// Parse a private key given as base58 or as a `[1,2,3,...]` byte array
pub fn parse_keypair(private_key: &str) -> Result<Keypair, String> {
    let private_key = private_key.trim();
    if private_key.is_empty() {
        return Err("Private key is empty".to_string());
    }

    let bytes = if private_key.starts_with('[') && private_key.ends_with(']') {
        private_key
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split(',')
            .map(|s| s.trim().parse::<u8>())
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|e| format!("Failed to parse private key array: {}", e))?
    } else {
        bs58::decode(private_key)
            .into_vec()
            .map_err(|e| format!("Failed to decode base58 private key: {}", e))?
    };

    if bytes.len() != 64 {
        return Err(format!(
            "Invalid private key length: expected 64 bytes, got {}",
            bytes.len()
        ));
    }

    Keypair::from_bytes(&bytes).map_err(|e| format!("Failed to create keypair: {}", e))
}

/// Operator main wallet from `main_wallet_private`
pub fn get_main_wallet_keypair() -> Result<Keypair, String> {
    let private_key = with_config(|cfg| cfg.main_wallet_private.clone());
    if private_key.is_empty() {
        return Err("Main wallet private key is empty in config".to_string());
    }
    parse_keypair(&private_key)
}
