use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Socket path; the SWAYSOCK environment variable is used when unset.
    pub socket: Option<PathBuf>,
    /// Event types to watch when none are given on the command line.
    pub events: Vec<String>,
}

impl Config {
    pub fn watch_events(&self) -> Vec<String> {
        if self.events.is_empty() {
            vec!["window".to_string(), "workspace".to_string()]
        } else {
            self.events.clone()
        }
    }
}

pub fn default_path() -> PathBuf {
    env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| {
            env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
        })
        .unwrap_or_default()
        .join("swaymux")
        .join("config.toml")
}

pub async fn load(file: &Path) -> Result<Config> {
    let raw = match tokio::fs::read_to_string(file).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Config::default());
        }
        Err(e) => return Err(e).context("Failed to read configuration file"),
    };

    toml::from_str(&raw).context("Failed to parse TOML from configuration file")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kebab_case_fields() -> Result<()> {
        let cfg: Config = toml::from_str(
            r#"
            socket = "/run/user/1000/sway-ipc.sock"
            events = ["window", "tick"]
            "#,
        )?;

        assert_eq!(
            cfg.socket.as_deref(),
            Some(Path::new("/run/user/1000/sway-ipc.sock"))
        );
        assert_eq!(cfg.watch_events(), vec!["window", "tick"]);

        Ok(())
    }

    #[test]
    fn empty_config_falls_back_to_defaults() -> Result<()> {
        let cfg: Config = toml::from_str("")?;

        assert_eq!(cfg.socket, None);
        assert_eq!(cfg.watch_events(), vec!["window", "workspace"]);

        Ok(())
    }

    #[tokio::test]
    async fn missing_file_yields_default_config() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let cfg = load(&dir.path().join("does-not-exist.toml")).await?;

        assert_eq!(cfg, Config::default());

        Ok(())
    }
}
