use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "http://localhost:3001";
pub const API_URL_ENV: &str = "ORCANET_API_URL";
pub const DOWNLOAD_DIR_ENV: &str = "ORCANET_DOWNLOAD_DIR";

/// `~/.orcanet`, falling back to the working directory when no home is set.
pub fn app_dir() -> PathBuf {
	match homedir::my_home() {
		Ok(Some(home)) => home.join(".orcanet"),
		_ => PathBuf::from(".orcanet"),
	}
}

pub fn config_path() -> PathBuf {
	app_dir().join("config.toml")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	pub api_url: String,
	pub download_dir: PathBuf,
	pub request_timeout_secs: u64,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			api_url: DEFAULT_API_URL.to_string(),
			download_dir: app_dir().join("downloads"),
			request_timeout_secs: 30,
		}
	}
}

impl Config {
	/// Reads `~/.orcanet/config.toml` and applies environment overrides.
	pub fn load() -> anyhow::Result<Self> {
		let mut config = Self::load_from(&config_path())?;
		config.apply_env(|key| std::env::var(key).ok());
		Ok(config)
	}

	/// Defaults when `path` does not exist.
	pub fn load_from(path: &Path) -> anyhow::Result<Self> {
		if !path.exists() {
			log::debug!("no config at {}, using defaults", path.display());
			return Ok(Self::default());
		}
		let text = std::fs::read_to_string(path)
			.with_context(|| format!("failed to read {}", path.display()))?;
		let config: Config =
			toml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))?;
		config.validate()?;
		log::info!("loaded config from {}", path.display());
		Ok(config)
	}

	pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
		if let Some(url) = var(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
			self.api_url = url;
		}
		if let Some(dir) = var(DOWNLOAD_DIR_ENV).filter(|v| !v.trim().is_empty()) {
			self.download_dir = PathBuf::from(dir);
		}
	}

	pub fn validate(&self) -> anyhow::Result<()> {
		if self.api_url.trim().is_empty() {
			bail!("api_url must not be empty");
		}
		if self.request_timeout_secs == 0 {
			bail!("request_timeout_secs must be positive");
		}
		Ok(())
	}

	pub fn timeout(&self) -> Duration {
		Duration::from_secs(self.request_timeout_secs)
	}
}
