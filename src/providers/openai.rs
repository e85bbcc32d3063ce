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

use super::{ChatModel, ModelReply, ProposedToolCall};
use crate::config::ChatConfig;
use crate::search::ToolDefinition;
use crate::session::Turn;
use anyhow::{anyhow, Result};
use reqwest::Client;
use serde_json::{json, Value};
use std::env;
use std::time::Duration;

/// Provider for OpenAI-compatible chat completion endpoints with tool calling
pub struct OpenAiProvider {
	client: Client,
	api_url: String,
	model: String,
	api_key_env: String,
	temperature: f32,
}

impl OpenAiProvider {
	pub fn new(config: &ChatConfig) -> Result<Self> {
		let client = Client::builder()
			.timeout(Duration::from_secs(config.timeout_seconds))
			.build()
			.map_err(|e| anyhow!("Failed to build chat HTTP client: {}", e))?;

		Ok(Self {
			client,
			api_url: config.api_url.clone(),
			model: config.model.clone(),
			api_key_env: config.api_key_env.clone(),
			temperature: config.temperature,
		})
	}

	fn get_api_key(&self) -> Result<String> {
		env::var(&self.api_key_env).map_err(|_| {
			anyhow!(
				"Chat API key not found in environment variable: {}",
				self.api_key_env
			)
		})
	}
}

#[async_trait::async_trait]
impl ChatModel for OpenAiProvider {
	fn name(&self) -> &str {
		"openai"
	}

	async fn complete(
		&self,
		system_prompt: &str,
		transcript: &[Turn],
		tools: &[ToolDefinition],
	) -> Result<ModelReply> {
		let api_key = self.get_api_key()?;

		let mut request_body = json!({
			"model": self.model,
			"messages": convert_messages(system_prompt, transcript),
			"temperature": self.temperature,
		});

		if !tools.is_empty() {
			request_body["tools"] = Value::Array(tools.iter().map(convert_tool).collect());
			request_body["tool_choice"] = json!("auto");
		}

		let api_start = std::time::Instant::now();

		let response = self
			.client
			.post(&self.api_url)
			.header("Authorization", format!("Bearer {}", api_key))
			.header("Content-Type", "application/json")
			.json(&request_body)
			.send()
			.await
			.map_err(|e| anyhow!("Failed to reach chat API: {}", e))?;

		let status = response.status();
		let response_text = response.text().await?;

		log_debug!(
			"Chat API responded with {} in {} ms",
			status,
			api_start.elapsed().as_millis()
		);

		read_response(status.as_u16(), &response_text)
	}
}

/// Turn a chat completion HTTP response into a reply
///
/// The status is checked first; error pages need not be JSON.
fn read_response(status: u16, response_text: &str) -> Result<ModelReply> {
	if !(200..300).contains(&status) {
		let mut error_details = vec![format!("HTTP {}", status)];

		let error_obj = serde_json::from_str::<Value>(response_text)
			.ok()
			.and_then(|json| json.get("error").cloned());
		if let Some(error_obj) = error_obj {
			if let Some(msg) = error_obj.get("message").and_then(|m| m.as_str()) {
				error_details.push(format!("Message: {}", msg));
			}
			if let Some(code) = error_obj.get("code").and_then(|c| c.as_str()) {
				error_details.push(format!("Code: {}", code));
			}
		}
		if error_details.len() == 1 {
			error_details.push(format!("Raw response: {}", response_text));
		}
		return Err(anyhow!("Chat API error: {}", error_details.join(" | ")));
	}

	let response_json: Value = serde_json::from_str(response_text).map_err(|e| {
		anyhow!(
			"Failed to parse response JSON: {}. Response: {}",
			e,
			response_text
		)
	})?;

	parse_reply(&response_json)
}

fn convert_tool(tool: &ToolDefinition) -> Value {
	json!({
		"type": "function",
		"function": {
			"name": tool.name,
			"description": tool.description,
			"parameters": tool.parameters,
		}
	})
}

/// Convert the transcript into chat completion messages
///
/// The API requires every `tool` message to directly follow the assistant
/// message carrying its call, while the transcript may hold confirmation
/// turns in between. Requests are therefore rendered as plain assistant
/// text where they were proposed, and the structured call is emitted right
/// before its result.
fn convert_messages(system_prompt: &str, transcript: &[Turn]) -> Vec<Value> {
	let mut messages = vec![json!({"role": "system", "content": system_prompt})];

	for (index, turn) in transcript.iter().enumerate() {
		match turn {
			Turn::User { content, .. } => {
				messages.push(json!({"role": "user", "content": content}));
			}
			Turn::Assistant { content, .. } => {
				messages.push(json!({"role": "assistant", "content": content}));
			}
			Turn::ToolRequest {
				tool_name,
				arguments,
				..
			} => {
				messages.push(json!({
					"role": "assistant",
					"content": format!("Proposed {} with arguments {}", tool_name, arguments),
				}));
			}
			Turn::ToolResult {
				invocation_id,
				content,
				..
			} => {
				let request = transcript[..index].iter().rev().find_map(|t| match t {
					Turn::ToolRequest {
						invocation_id: id,
						tool_name,
						arguments,
						..
					} if id == invocation_id => Some((tool_name, arguments)),
					_ => None,
				});

				match request {
					Some((tool_name, arguments)) => {
						messages.push(json!({
							"role": "assistant",
							"content": null,
							"tool_calls": [{
								"id": invocation_id,
								"type": "function",
								"function": {"name": tool_name, "arguments": arguments},
							}],
						}));
						messages.push(json!({
							"role": "tool",
							"tool_call_id": invocation_id,
							"content": content,
						}));
					}
					None => {
						messages.push(json!({
							"role": "assistant",
							"content": format!("Search result:\n{}", content),
						}));
					}
				}
			}
		}
	}

	messages
}

fn parse_reply(response_json: &Value) -> Result<ModelReply> {
	let choice = response_json
		.get("choices")
		.and_then(|choices| choices.get(0))
		.ok_or_else(|| anyhow!("Invalid response format from chat API: {}", response_json))?;

	if let Some(reason) = choice.get("finish_reason").and_then(|fr| fr.as_str()) {
		log_debug!("Finish reason: {}", reason);
	}

	let message = choice
		.get("message")
		.ok_or_else(|| anyhow!("Chat API response has no message: {}", response_json))?;

	let content = message
		.get("content")
		.and_then(|c| c.as_str())
		.unwrap_or_default()
		.to_string();

	let tool_calls = message
		.get("tool_calls")
		.and_then(|calls| calls.as_array())
		.filter(|calls| !calls.is_empty());

	let Some(tool_calls) = tool_calls else {
		return Ok(ModelReply::Text(content));
	};

	if tool_calls.len() > 1 {
		log_debug!(
			"Model proposed {} tool calls, only the first is used",
			tool_calls.len()
		);
	}

	let call = &tool_calls[0];
	let function = call
		.get("function")
		.ok_or_else(|| anyhow!("Tool call without function: {}", call))?;

	let id = call
		.get("id")
		.and_then(|id| id.as_str())
		.filter(|id| !id.trim().is_empty())
		.map(str::to_string)
		.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
	let name = function
		.get("name")
		.and_then(|n| n.as_str())
		.unwrap_or_default()
		.to_string();
	let arguments = match function.get("arguments") {
		Some(Value::String(raw)) => raw.clone(),
		Some(other) => other.to_string(),
		None => "{}".to_string(),
	};

	Ok(ModelReply::ToolCall(ProposedToolCall {
		id,
		name,
		arguments,
		content,
	}))
}
