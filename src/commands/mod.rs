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

use crate::config::Config;
use crate::lookup::Lookups;
use crate::providers::OpenAiProvider;
use crate::search::{SearchVariant, SerpApiClient};
use crate::session::{Controller, Turn};
use anyhow::{anyhow, Result};
use clap::Subcommand;
use colored::*;
use std::collections::BTreeMap;
use std::sync::Arc;

pub mod chat;
pub mod search;
pub mod serve;

pub use chat::ChatArgs;
pub use search::SearchArgs;
pub use serve::ServeArgs;

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Chat with the assistant to build and run an ad search
	Chat(ChatArgs),

	/// Run a single search from key=value fields
	Search(SearchArgs),

	/// Serve the assistant over an HTTP JSON API
	Serve(ServeArgs),
}

/// Wire the chat model and SerpApi client into a controller
pub fn build_controller(config: &Config, lookups: Arc<Lookups>) -> Result<Arc<Controller>> {
	let model = OpenAiProvider::new(&config.chat)?;
	let search = SerpApiClient::new(&config.search, lookups.clone())?;

	Ok(Arc::new(Controller::new(
		Arc::new(model),
		Arc::new(search),
		lookups,
		config.conversation.require_confirmation,
	)))
}

/// Parse `key=value` tokens into form fields
///
/// A token without `=` continues the previous value, so
/// `text=running shoes region=Australia` keeps the space in `text`.
pub fn parse_fields<S: AsRef<str>>(tokens: &[S]) -> Result<BTreeMap<String, String>> {
	let mut fields = BTreeMap::new();
	let mut current: Option<String> = None;

	for token in tokens {
		let token = token.as_ref();
		match token.split_once('=') {
			Some((key, value)) if !key.trim().is_empty() => {
				let key = key.trim().to_string();
				fields.insert(key.clone(), value.to_string());
				current = Some(key);
			}
			_ => {
				let key = current
					.as_ref()
					.ok_or_else(|| anyhow!("Expected key=value, got '{}'", token))?;
				if let Some(value) = fields.get_mut(key) {
					if !value.is_empty() {
						value.push(' ');
					}
					value.push_str(token);
				}
			}
		}
	}

	Ok(fields)
}

/// Print one transcript turn for the terminal
pub fn print_turn(turn: &Turn) {
	match turn {
		Turn::User { .. } => {}
		Turn::Assistant { content, .. } => println!("{}\n", content),
		Turn::ToolRequest {
			tool_name,
			arguments,
			..
		} => println!(
			"{} {}\n",
			format!("→ {}", tool_name).bright_black(),
			arguments.bright_black()
		),
		Turn::ToolResult { content, .. } => println!("{}\n", content),
	}
}

/// Variant list with field names, for help output
pub fn describe_tools() -> String {
	SearchVariant::ALL
		.iter()
		.map(|variant| {
			let fields: Vec<&str> = variant.fields().iter().map(|f| f.name).collect();
			format!(
				"{} ({}): requires {}\n  fields: {}",
				variant.key(),
				variant.label(),
				variant.required_description(),
				fields.join(", ")
			)
		})
		.collect::<Vec<_>>()
		.join("\n")
}
