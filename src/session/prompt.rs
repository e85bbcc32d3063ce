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

use crate::search::SearchVariant;

const CHAT_AGENT_TEMPLATE: &str = "You are a helpful assistant that guides a user in forming a structured, well-defined ad search request for SerpApi.

You can choose between these tools:
{tools}

INSTRUCTIONS:
1. Work out which tool fits the user's request. Ask if it is unclear.
2. Ask the user for any missing required fields.
3. Begin each response by summarizing the parameters collected so far as a JSON object.
4. Validate values: dates use YYYYMMDD, platform and format values must come from the allowed lists.
5. Regions are plain country names such as \"Australia\"; do not invent codes.
6. List the remaining optional fields and ask whether the user wants any of them.
7. Once the required fields are collected and the user agrees, call exactly one tool with the collected parameters.

If the user wants to change parameters, allow it before calling the tool.";

/// System prompt sent with every chat completion
pub fn system_prompt() -> String {
	let tools = SearchVariant::ALL
		.iter()
		.enumerate()
		.map(|(index, variant)| {
			format!(
				"{}. {} ({}), requires {}",
				index + 1,
				variant.tool_name(),
				variant.label(),
				variant.required_description()
			)
		})
		.collect::<Vec<_>>()
		.join("\n");

	CHAT_AGENT_TEMPLATE.replace("{tools}", &tools)
}
