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

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 3600;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
	pub base_url: String,
	/// Name of the environment variable holding the SerpApi key
	pub api_key_env: String,
	pub timeout_seconds: u64,
}

impl Default for SearchConfig {
	fn default() -> Self {
		Self {
			base_url: "https://serpapi.com/search".to_string(),
			api_key_env: "SERPAPI_API_KEY".to_string(),
			timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
		}
	}
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
	/// OpenAI-compatible chat completions endpoint
	pub api_url: String,
	pub model: String,
	pub api_key_env: String,
	pub temperature: f32,
	pub timeout_seconds: u64,
}

impl Default for ChatConfig {
	fn default() -> Self {
		Self {
			api_url: "https://api.openai.com/v1/chat/completions".to_string(),
			model: "gpt-4o-mini".to_string(),
			api_key_env: "OPENAI_API_KEY".to_string(),
			temperature: 0.0,
			timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
		}
	}
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ConversationConfig {
	/// Ask the user before running a search proposed in chat
	pub require_confirmation: bool,
}

impl Default for ConversationConfig {
	fn default() -> Self {
		Self {
			require_confirmation: true,
		}
	}
}

/// Optional on-disk replacements for the bundled lookup tables
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct LookupConfig {
	pub regions_path: Option<PathBuf>,
	pub countries_path: Option<PathBuf>,
	pub languages_path: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
	pub bind: String,
	/// Sessions idle this long are dropped with their transcripts
	pub session_ttl_seconds: u64,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			bind: "127.0.0.1:8000".to_string(),
			session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
		}
	}
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct GeneralConfig {
	pub debug: bool,
}
