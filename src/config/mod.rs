// Copyright 2025 Muvon Un Limited
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration loading
//!
//! Settings live in a single TOML file. Every section is optional and falls
//! back to built-in defaults, so an absent default config file is not an error.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod services;

pub use services::{
	ChatConfig, ConversationConfig, GeneralConfig, LookupConfig, SearchConfig, ServerConfig,
	DEFAULT_SESSION_TTL_SECONDS, DEFAULT_TIMEOUT_SECONDS,
};

const CONFIG_DIR_NAME: &str = "adscout";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
	pub general: GeneralConfig,
	pub search: SearchConfig,
	pub chat: ChatConfig,
	pub conversation: ConversationConfig,
	pub lookup: LookupConfig,
	pub server: ServerConfig,
}

impl Config {
	/// Load configuration from an explicit path, or from the default location
	///
	/// An explicit path must exist. The default location is optional.
	pub fn load(path: Option<&Path>) -> Result<Self> {
		let config = match path {
			Some(path) => Self::from_file(path)?,
			None => match default_config_path() {
				Some(default_path) if default_path.exists() => Self::from_file(&default_path)?,
				_ => {
					crate::log_debug!("No config file found, using defaults");
					Self::default()
				}
			},
		};

		config.validate()?;
		Ok(config)
	}

	pub fn from_file(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file {}", path.display()))?;
		crate::log_debug!("Loaded config from {}", path.display());
		Self::from_toml_str(&content)
			.with_context(|| format!("Failed to parse config file {}", path.display()))
	}

	pub fn from_toml_str(content: &str) -> Result<Self> {
		Ok(toml::from_str(content)?)
	}

	pub fn validate(&self) -> Result<()> {
		if self.search.base_url.trim().is_empty() {
			return Err(anyhow!("search.base_url cannot be empty"));
		}
		if self.chat.api_url.trim().is_empty() {
			return Err(anyhow!("chat.api_url cannot be empty"));
		}
		if self.chat.model.trim().is_empty() {
			return Err(anyhow!("chat.model cannot be empty"));
		}
		if self.search.timeout_seconds == 0 || self.chat.timeout_seconds == 0 {
			return Err(anyhow!("timeout_seconds must be greater than zero"));
		}
		if self.server.session_ttl_seconds == 0 {
			return Err(anyhow!("server.session_ttl_seconds must be greater than zero"));
		}
		if !(0.0..=2.0).contains(&self.chat.temperature) {
			return Err(anyhow!(
				"chat.temperature must be between 0.0 and 2.0, got {}",
				self.chat.temperature
			));
		}
		Ok(())
	}
}

pub fn default_config_path() -> Option<PathBuf> {
	dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_empty_file_uses_defaults() {
		let config = Config::from_toml_str("").unwrap();
		assert_eq!(config, Config::default());
		assert_eq!(config.search.base_url, "https://serpapi.com/search");
		assert_eq!(config.search.timeout_seconds, 30);
		assert!(config.conversation.require_confirmation);
	}

	#[test]
	fn test_partial_sections_keep_other_defaults() {
		let config = Config::from_toml_str(
			r#"
			[search]
			timeout_seconds = 10

			[conversation]
			require_confirmation = false
			"#,
		)
		.unwrap();
		assert_eq!(config.search.timeout_seconds, 10);
		assert_eq!(config.search.api_key_env, "SERPAPI_API_KEY");
		assert!(!config.conversation.require_confirmation);
		assert_eq!(config.chat, ChatConfig::default());
	}

	#[test]
	fn test_validate_rejects_bad_values() {
		let mut config = Config::default();
		config.search.timeout_seconds = 0;
		assert!(config.validate().is_err());

		let mut config = Config::default();
		config.chat.temperature = 3.5;
		assert!(config.validate().is_err());

		let mut config = Config::default();
		config.search.base_url = " ".to_string();
		assert!(config.validate().is_err());

		let mut config = Config::default();
		config.server.session_ttl_seconds = 0;
		assert!(config.validate().is_err());
	}

	#[test]
	fn test_session_ttl() {
		assert_eq!(
			Config::default().server.session_ttl_seconds,
			DEFAULT_SESSION_TTL_SECONDS
		);
		let config = Config::from_toml_str("[server]\nsession_ttl_seconds = 120\n").unwrap();
		assert_eq!(config.server.session_ttl_seconds, 120);
		assert_eq!(config.server.bind, "127.0.0.1:8000");
	}

	#[test]
	fn test_missing_explicit_file_is_error() {
		let result = Config::load(Some(Path::new("/nonexistent/adscout/config.toml")));
		assert!(result.is_err());
	}
}
