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

use super::schema::{FieldKind, FieldSpec};
use super::SearchVariant;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// A tool the chat model may call, with its JSON schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
	pub name: String,
	pub description: String,
	pub parameters: Value,
}

fn describe(variant: SearchVariant) -> &'static str {
	match variant {
		SearchVariant::Transparency => "Search the Google Ads Transparency Center via SerpApi.

Finds ad creatives by advertiser or by free text, optionally filtered by region,
platform, creative format and date range.
Requires either `advertiser_id` or `text`.

Examples:
- `{\"text\": \"apple\", \"region\": \"Australia\"}`
- `{\"advertiser_id\": \"AR17828074650563772417\", \"platform\": \"YOUTUBE\"}`
",
		SearchVariant::Sponsored => "Search Google via SerpApi and return the sponsored results (ads) for a query.

Requires `q`. Use `gl` for the country and `hl` for the interface language.

Examples:
- `{\"q\": \"running shoes\", \"gl\": \"Germany\"}`
",
		SearchVariant::YouTube => "Search YouTube via SerpApi and return the ads shown for a query.

Requires `search_query`. Falls back to video results when no ads are returned.

Examples:
- `{\"search_query\": \"protein powder\", \"gl\": \"United States\"}`
",
		SearchVariant::Naver => "Search Naver via SerpApi and return the ads shown for a query.

Requires `query`.

Examples:
- `{\"query\": \"커피\"}`
",
	}
}

fn property(spec: &FieldSpec) -> Value {
	let mut property = json!({
		"type": spec.kind.json_type(),
		"description": spec.description,
	});
	if !spec.choices.is_empty() {
		property["enum"] = json!(spec.choices);
	}
	if spec.kind == FieldKind::Integer {
		let minimum = if spec.name == "start" { 0 } else { 1 };
		property["minimum"] = json!(minimum);
	}
	property
}

pub fn get_tool_definition(variant: SearchVariant) -> ToolDefinition {
	let fields = variant.fields();
	let properties: Map<String, Value> = fields
		.iter()
		.map(|spec| (spec.name.to_string(), property(spec)))
		.collect();

	let mut parameters = json!({
		"type": "object",
		"properties": properties,
		"additionalProperties": false,
	});

	// Alternatives (either one satisfies the variant) are only described in
	// the tool description; the controller enforces them.
	let required: Vec<&str> = fields
		.iter()
		.filter(|spec| spec.required)
		.map(|spec| spec.name)
		.collect();
	if let [only] = required.as_slice() {
		parameters["required"] = json!([only]);
	}

	ToolDefinition {
		name: variant.tool_name().to_string(),
		description: describe(variant).to_string(),
		parameters,
	}
}

pub fn get_all_tools() -> Vec<ToolDefinition> {
	SearchVariant::ALL
		.into_iter()
		.map(get_tool_definition)
		.collect()
}
