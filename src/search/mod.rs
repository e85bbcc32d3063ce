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

// Ad search over SerpApi: schemas, tool definitions, HTTP client and formatting

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod api_client;
pub mod formatters;
pub mod functions;
pub mod schema;

pub use api_client::SerpApiClient;
pub use functions::{get_all_tools, get_tool_definition, ToolDefinition};
pub use schema::{
	FieldKind, FieldSpec, NaverParameters, ParameterError, SearchParameters,
	SponsoredParameters, TransparencyParameters, YouTubeParameters,
};

/// The four supported SerpApi ad-search configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchVariant {
	Transparency,
	Sponsored,
	#[serde(rename = "youtube")]
	YouTube,
	Naver,
}

impl SearchVariant {
	pub const ALL: [SearchVariant; 4] = [
		SearchVariant::Transparency,
		SearchVariant::Sponsored,
		SearchVariant::YouTube,
		SearchVariant::Naver,
	];

	/// Tool name declared to the chat model
	pub fn tool_name(&self) -> &'static str {
		match self {
			SearchVariant::Transparency => "google_ads_transparency_search",
			SearchVariant::Sponsored => "google_sponsored_ads_search",
			SearchVariant::YouTube => "youtube_ads_search",
			SearchVariant::Naver => "naver_ads_search",
		}
	}

	pub fn from_tool_name(name: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|v| v.tool_name() == name)
	}

	/// SerpApi `engine` parameter
	pub fn engine(&self) -> &'static str {
		match self {
			SearchVariant::Transparency => "google_ads_transparency_center",
			SearchVariant::Sponsored => "google",
			SearchVariant::YouTube => "youtube",
			SearchVariant::Naver => "naver",
		}
	}

	pub fn label(&self) -> &'static str {
		match self {
			SearchVariant::Transparency => "Google Ads Transparency",
			SearchVariant::Sponsored => "Google Sponsored Results",
			SearchVariant::YouTube => "YouTube Ads",
			SearchVariant::Naver => "Naver Ads",
		}
	}

	/// Short identifier used on the command line and in the HTTP API
	pub fn key(&self) -> &'static str {
		match self {
			SearchVariant::Transparency => "transparency",
			SearchVariant::Sponsored => "sponsored",
			SearchVariant::YouTube => "youtube",
			SearchVariant::Naver => "naver",
		}
	}

	/// Response keys holding the result list, in lookup order
	pub fn result_keys(&self) -> &'static [&'static str] {
		match self {
			SearchVariant::Transparency => &["ad_creatives"],
			SearchVariant::Sponsored => &["ads"],
			SearchVariant::YouTube => &["ads_results", "video_results"],
			SearchVariant::Naver => &["ads_results"],
		}
	}

	/// Number of formatted results when the user gives no `num`
	pub fn default_limit(&self) -> usize {
		match self {
			SearchVariant::YouTube => 20,
			_ => 10,
		}
	}
}

impl fmt::Display for SearchVariant {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.key())
	}
}

impl FromStr for SearchVariant {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let needle = s.trim().to_lowercase();
		Self::ALL
			.into_iter()
			.find(|v| v.key() == needle || v.tool_name() == needle || v.engine() == needle)
			.ok_or_else(|| {
				anyhow::anyhow!(
					"Unknown search variant '{}'. Expected one of: transparency, sponsored, youtube, naver",
					s
				)
			})
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationSource {
	Chat,
	Form,
}

/// A resolved request to run one search variant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInvocation {
	/// Correlation id matching the request turn to its result turn
	pub id: String,
	pub parameters: SearchParameters,
	pub source: InvocationSource,
}

impl ToolInvocation {
	pub fn new(parameters: SearchParameters, source: InvocationSource) -> Self {
		Self::with_id(uuid::Uuid::new_v4().to_string(), parameters, source)
	}

	pub fn with_id(id: String, parameters: SearchParameters, source: InvocationSource) -> Self {
		Self {
			id,
			parameters,
			source,
		}
	}

	pub fn variant(&self) -> SearchVariant {
		self.parameters.variant()
	}
}

/// Executes a resolved search and renders it as transcript text
///
/// Failures are returned as text as well: the conversation relays them to
/// the user instead of aborting.
#[async_trait]
pub trait SearchService: Send + Sync {
	async fn search(&self, parameters: &SearchParameters) -> String;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_tool_names_round_trip() {
		for variant in SearchVariant::ALL {
			assert_eq!(SearchVariant::from_tool_name(variant.tool_name()), Some(variant));
		}
		assert_eq!(SearchVariant::from_tool_name("web_search"), None);
	}

	#[test]
	fn test_variant_from_str_accepts_aliases() {
		assert_eq!(
			"YouTube".parse::<SearchVariant>().unwrap(),
			SearchVariant::YouTube
		);
		assert_eq!(
			"google_ads_transparency_center".parse::<SearchVariant>().unwrap(),
			SearchVariant::Transparency
		);
		assert_eq!(
			"naver_ads_search".parse::<SearchVariant>().unwrap(),
			SearchVariant::Naver
		);
		assert!("bing".parse::<SearchVariant>().is_err());
	}

	#[test]
	fn test_engines_and_limits() {
		assert_eq!(SearchVariant::Sponsored.engine(), "google");
		assert_eq!(SearchVariant::YouTube.default_limit(), 20);
		assert_eq!(SearchVariant::Naver.default_limit(), 10);
		assert_eq!(
			SearchVariant::YouTube.result_keys(),
			&["ads_results", "video_results"]
		);
	}
}
