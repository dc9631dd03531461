//! Config file loading.

use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use tracing::debug;

use cradle_protocol::Config;

/// Environment variable overriding the config search path.
pub const CONFIG_ENV: &str = "CRADLE_CONFIG";

/// Load configuration with the documented search order: explicit path,
/// `$CRADLE_CONFIG`, then `~/.agent/config.toml`. A missing file yields the
/// defaults; a malformed file is an error.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let candidate = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => std::env::var(CONFIG_ENV)
            .ok()
            .map(PathBuf::from)
            .filter(|path| path.exists())
            .or_else(|| default_path().filter(|path| path.exists())),
    };

    let config = match candidate {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => Config::default(),
    };

    config
        .validate()
        .map_err(|message| anyhow::anyhow!("invalid config: {message}"))?;
    Ok(config)
}

fn default_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".agent").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = load(None).unwrap();
        assert_eq!(config.compaction.keep_last_turns, 4);
    }

    #[test]
    fn explicit_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[compaction]\nkeep_last_turns = 7\n").unwrap();
        let config = load(Some(&path)).unwrap();
        assert_eq!(config.compaction.keep_last_turns, 7);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "compaction = 7 nonsense").unwrap();
        assert!(load(Some(&path)).is_err());
    }

    #[test]
    fn invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[execution]\ntimeout_seconds = -1.0\n").unwrap();
        assert!(load(Some(&path)).is_err());
    }
}
