//! Persistent defaults from `~/.config/snag/config.toml`.
//!
//! Every field mirrors a CLI flag; flags win over the file, built-in
//! defaults apply last.

use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnagConfig {
    /// Default chunk count when `--chunks` is not given.
    pub chunks: Option<usize>,
    /// Default bandwidth limit spec (e.g. `"5M"`) when `--limit` is not given.
    pub limit: Option<String>,
    /// Default output directory when `--output` is not given.
    pub output_dir: Option<PathBuf>,
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("snag")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Loads the config, writing an empty template on first run so the location
/// is discoverable.
pub fn load_or_init() -> Result<SnagConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = SnagConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: SnagConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg: SnagConfig = toml::from_str("").unwrap();
        assert!(cfg.chunks.is_none());
        assert!(cfg.limit.is_none());
        assert!(cfg.output_dir.is_none());
    }

    #[test]
    fn toml_roundtrip() {
        let cfg = SnagConfig {
            chunks: Some(8),
            limit: Some("5M".to_string()),
            output_dir: Some(PathBuf::from("/downloads")),
        };
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: SnagConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.chunks, Some(8));
        assert_eq!(parsed.limit.as_deref(), Some("5M"));
        assert_eq!(parsed.output_dir, Some(PathBuf::from("/downloads")));
    }

    #[test]
    fn partial_file_parses() {
        let cfg: SnagConfig = toml::from_str("chunks = 3\n").unwrap();
        assert_eq!(cfg.chunks, Some(3));
        assert!(cfg.limit.is_none());
    }
}
