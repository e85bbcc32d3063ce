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

// SerpApi HTTP client

use super::formatters::format_results;
use super::{SearchParameters, SearchService};
use crate::config::SearchConfig;
use crate::lookup::Lookups;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub struct SerpApiClient {
	client: reqwest::Client,
	base_url: String,
	api_key_env: String,
	lookups: Arc<Lookups>,
}

impl SerpApiClient {
	pub fn new(config: &SearchConfig, lookups: Arc<Lookups>) -> Result<Self> {
		let client = reqwest::Client::builder()
			.timeout(Duration::from_secs(config.timeout_seconds))
			.build()
			.map_err(|e| anyhow!("Failed to build SerpApi HTTP client: {}", e))?;

		Ok(Self {
			client,
			base_url: config.base_url.clone(),
			api_key_env: config.api_key_env.clone(),
			lookups,
		})
	}

	/// API key read at call time; an absent key is left for SerpApi to reject
	fn api_key(&self) -> String {
		match std::env::var(&self.api_key_env) {
			Ok(key) => key,
			Err(_) => {
				crate::log_debug!(
					"{} is not set, SerpApi will reject the request",
					self.api_key_env
				);
				String::new()
			}
		}
	}

	/// Full query string parameters: credentials, engine, then the variant's fields
	pub fn build_query(&self, parameters: &SearchParameters) -> Vec<(String, String)> {
		let mut query = vec![
			("api_key".to_string(), self.api_key()),
			(
				"engine".to_string(),
				parameters.variant().engine().to_string(),
			),
		];
		query.extend(parameters.to_api_params(&self.lookups));
		query
	}

	/// Issue one request and render the outcome
	///
	/// Non-2xx responses are returned as `Ok` text so the caller can relay them.
	/// `Err` is reserved for transport failures and unreadable bodies.
	pub async fn execute(&self, parameters: &SearchParameters) -> Result<String> {
		let variant = parameters.variant();
		let query = self.build_query(parameters);

		crate::log_debug!(
			"SerpApi {} request with parameters: {}",
			variant.engine(),
			query
				.iter()
				.filter(|(name, _)| name != "api_key")
				.map(|(name, value)| format!("{}={}", name, value))
				.collect::<Vec<_>>()
				.join("&")
		);

		let response = self
			.client
			.get(&self.base_url)
			.query(&query)
			.header("Accept", "application/json")
			.send()
			.await
			.map_err(|e| anyhow!("Failed to send {} request to SerpApi: {}", variant.key(), e))?;

		let status = response.status();
		crate::log_debug!("SerpApi response status: {}", status);

		let body = response
			.text()
			.await
			.map_err(|e| anyhow!("Failed to read SerpApi response: {}", e))?;

		handle_serpapi_response(status.as_u16(), &body, parameters)
	}
}

/// Turn a raw SerpApi response into transcript text
pub fn handle_serpapi_response(
	status: u16,
	body: &str,
	parameters: &SearchParameters,
) -> Result<String> {
	if !(200..300).contains(&status) {
		return Ok(format!("SerpApi error: {} - {}", status, body));
	}

	let search_result: Value = serde_json::from_str(body).map_err(|e| {
		anyhow!(
			"Failed to parse SerpApi response as JSON: {}. Response was: {}",
			e,
			body.chars().take(500).collect::<String>()
		)
	})?;

	// SerpApi can answer 200 with an error field, e.g. for a bad api_key
	if let Some(error) = search_result.get("error").and_then(|e| e.as_str()) {
		return Ok(format!("SerpApi error: {} - {}", status, error));
	}

	Ok(format_results(
		parameters.variant(),
		&search_result,
		parameters.result_limit(),
	))
}

#[async_trait]
impl SearchService for SerpApiClient {
	async fn search(&self, parameters: &SearchParameters) -> String {
		match self.execute(parameters).await {
			Ok(text) => text,
			Err(e) => {
				crate::log_debug!("SerpApi request failed: {}", e);
				format!("SerpApi request failed: {}", e)
			}
		}
	}
}
