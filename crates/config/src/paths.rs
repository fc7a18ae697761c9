//! Well-known file locations

use std::path::PathBuf;

/// Data directory (~/.dbbot), falling back to a relative `.dbbot`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".dbbot"))
        .unwrap_or_else(|| PathBuf::from(".dbbot"))
}

/// Config file location
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

/// Secondary `.env` consulted after the working directory's
pub fn env_file_path() -> PathBuf {
    data_dir().join(".env")
}
