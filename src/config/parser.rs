use crate::config::types::Config;
use crate::{ConfigError, PersistError};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded configuration
/// * `Err(ConfigError)` - Failed to read or parse the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use noisewake::config::load_config;
///
/// let config = load_config(Path::new("config.toml")).unwrap();
/// println!("Identities: {}", config.user_agents.len());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}

/// Loads a configuration, treating a missing file as an empty document
///
/// The document is created on the first checkpoint. Any other read error,
/// and every parse error, is returned so a malformed document is never
/// overwritten by a checkpoint of the defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config, ConfigError> {
    match load_config(path) {
        Err(ConfigError::Io(e)) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!(
                "Config file {} not found, starting from an empty document",
                path.display()
            );
            Ok(Config::default())
        }
        other => other,
    }
}

/// Computes a SHA-256 hash of the configuration file content
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Serializes a configuration to TOML text
fn render_config(config: &Config) -> Result<String, PersistError> {
    Ok(toml::to_string_pretty(config)?)
}

/// Rewrites the document at `path` with the given configuration
///
/// The text is written to a sibling temporary file first and then renamed
/// over `path`, so readers see either the old or the new document.
pub fn write_config(path: &Path, config: &Config) -> Result<(), PersistError> {
    let text = render_config(config)?;
    let staging = staging_path(path);

    std::fs::write(&staging, text).map_err(|source| PersistError::Write {
        path: staging.clone(),
        source,
    })?;

    std::fs::rename(&staging, path).map_err(|source| {
        let _ = std::fs::remove_file(&staging);
        PersistError::Write {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "config.toml".into());
    name.push(".tmp");
    path.with_file_name(name)
}
