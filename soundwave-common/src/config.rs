//! Configuration file discovery and loading
//!
//! Config file resolution priority:
//! 1. Explicit path (command-line argument)
//! 2. `SOUNDWAVE_CONFIG` environment variable
//! 3. Platform config directory (`~/.config/soundwave/config.toml`,
//!    then `/etc/soundwave/config.toml` on Linux)
//!
//! A missing config file is not an error: callers fall back to built-in
//! defaults. An explicitly requested file that does not exist is.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming a config file
pub const CONFIG_ENV_VAR: &str = "SOUNDWAVE_CONFIG";

/// Resolve which TOML config file to read, if any
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    // Priority 1: Command-line argument
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        return Ok(Some(path.to_path_buf()));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file from {} not found: {}",
                CONFIG_ENV_VAR,
                path.display()
            )));
        }
        return Ok(Some(path));
    }

    // Priority 3: Platform default locations
    Ok(default_config_locations().into_iter().find(|p| p.exists()))
}

/// Platform default config file locations, most specific first
fn default_config_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();

    if let Some(dir) = dirs::config_dir() {
        locations.push(dir.join("soundwave").join("config.toml"));
    }

    if cfg!(target_os = "linux") {
        locations.push(PathBuf::from("/etc/soundwave/config.toml"));
    }

    locations
}

/// Read and parse a TOML config file
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!("Loading config file {}", path.display());

    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serial_test::serial;
    use std::io::Write;

    #[derive(Debug, Deserialize)]
    struct Sample {
        port: u16,
        #[serde(default)]
        name: Option<String>,
    }

    #[test]
    #[serial]
    fn test_explicit_path_wins() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 1234").unwrap();

        std::env::set_var(CONFIG_ENV_VAR, "/nonexistent/soundwave.toml");
        let resolved = resolve_config_path(Some(file.path())).unwrap();
        std::env::remove_var(CONFIG_ENV_VAR);

        assert_eq!(resolved.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        let result = resolve_config_path(Some(Path::new("/nonexistent/soundwave.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    #[serial]
    fn test_env_var_path() {
        let file = tempfile::NamedTempFile::new().unwrap();

        std::env::set_var(CONFIG_ENV_VAR, file.path());
        let resolved = resolve_config_path(None).unwrap();
        std::env::remove_var(CONFIG_ENV_VAR);

        assert_eq!(resolved.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_load_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 5080\nname = \"studio\"").unwrap();

        let sample: Sample = load_toml(file.path()).unwrap();
        assert_eq!(sample.port, 5080);
        assert_eq!(sample.name.as_deref(), Some("studio"));
    }

    #[test]
    fn test_load_toml_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();

        let result: Result<Sample> = load_toml(file.path());
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
