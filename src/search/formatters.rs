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

// Renders SerpApi ad results as short text blocks

use super::SearchVariant;
use chrono::DateTime;
use serde_json::Value;

/// Result entries for a variant, trying each designated key in order
pub fn result_items(variant: SearchVariant, response: &Value) -> &[Value] {
	variant
		.result_keys()
		.iter()
		.filter_map(|key| response.get(*key).and_then(|v| v.as_array()))
		.find(|items| !items.is_empty())
		.map(Vec::as_slice)
		.unwrap_or(&[])
}

pub fn no_results_message(variant: SearchVariant) -> String {
	format!("No {} found for these parameters.", variant.label())
}

/// Format at most `limit` results, preserving upstream order
pub fn format_results(variant: SearchVariant, response: &Value, limit: usize) -> String {
	let items = result_items(variant, response);

	crate::log_debug!(
		"Formatting {} of {} {} results",
		items.len().min(limit),
		items.len(),
		variant.key()
	);

	if items.is_empty() || limit == 0 {
		return no_results_message(variant);
	}

	items
		.iter()
		.take(limit)
		.enumerate()
		.map(|(index, item)| match variant {
			SearchVariant::Transparency => format_transparency_creative(index + 1, item),
			SearchVariant::Sponsored => format_sponsored_ad(index + 1, item),
			SearchVariant::YouTube => format_youtube_result(index + 1, item),
			SearchVariant::Naver => format_naver_ad(index + 1, item),
		})
		.collect::<Vec<_>>()
		.join("\n\n")
}

fn format_transparency_creative(rank: usize, item: &Value) -> String {
	format!(
		"**Ad #{}**\n- Advertiser: {}\n- Format: {}\n- Target domain: {}\n- First shown: {}\n- Last shown: {}\n- Details: {}",
		rank,
		text_field(item, &["advertiser", "advertiser_name"], "Unknown"),
		text_field(item, &["format"], "N/A"),
		text_field(item, &["target_domain"], "N/A"),
		date_field(item, "first_shown"),
		date_field(item, "last_shown"),
		text_field(item, &["details_link", "link"], "N/A"),
	)
}

fn format_sponsored_ad(rank: usize, item: &Value) -> String {
	format!(
		"**{}. {}**\n- {}\n- Site: {}\n- Link: {}",
		rank,
		text_field(item, &["title"], "No title"),
		text_field(item, &["description", "snippet"], "No description"),
		text_field(item, &["displayed_link", "source"], "N/A"),
		text_field(item, &["link", "tracking_link"], "N/A"),
	)
}

fn format_youtube_result(rank: usize, item: &Value) -> String {
	let channel = item
		.get("channel")
		.and_then(|c| c.get("name"))
		.and_then(|n| n.as_str())
		.unwrap_or("Unknown channel");

	format!(
		"**{}. {}**\n- Channel: {}\n- {}\n- Link: {}",
		rank,
		text_field(item, &["title"], "No title"),
		channel,
		text_field(item, &["description"], "No description"),
		text_field(item, &["link"], "N/A"),
	)
}

fn format_naver_ad(rank: usize, item: &Value) -> String {
	format!(
		"**{}. {}**\n- {}\n- Site: {}\n- Link: {}",
		rank,
		text_field(item, &["title"], "No title"),
		text_field(item, &["description"], "No description"),
		text_field(item, &["site", "displayed_link"], "N/A"),
		text_field(item, &["link"], "N/A"),
	)
}

/// First present key rendered as text; numbers and booleans are stringified
fn text_field(item: &Value, keys: &[&str], default: &str) -> String {
	keys.iter()
		.filter_map(|key| item.get(*key))
		.find_map(|value| match value {
			Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
			Value::Number(n) => Some(n.to_string()),
			Value::Bool(b) => Some(b.to_string()),
			_ => None,
		})
		.unwrap_or_else(|| default.to_string())
}

/// Epoch seconds rendered as a UTC date, strings passed through
fn date_field(item: &Value, key: &str) -> String {
	match item.get(key) {
		Some(Value::Number(n)) => n
			.as_i64()
			.and_then(|secs| DateTime::from_timestamp(secs, 0))
			.map(|date| date.format("%Y-%m-%d").to_string())
			.unwrap_or_else(|| n.to_string()),
		Some(Value::String(s)) if !s.is_empty() => s.clone(),
		_ => "N/A".to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_transparency_blocks_in_order() {
		let response = json!({
			"ad_creatives": [
				{"advertiser": "Apple Inc.", "format": "text", "target_domain": "apple.com", "first_shown": 1704067200, "last_shown": 1706745600},
				{"advertiser": "Apple Pty", "format": "image"},
				{"advertiser_name": "Legacy Name", "format": "video"}
			]
		});
		let text = format_results(SearchVariant::Transparency, &response, 10);
		let blocks: Vec<&str> = text.split("\n\n").collect();
		assert_eq!(blocks.len(), 3);
		assert!(blocks[0].starts_with("**Ad #1**"));
		assert!(blocks[0].contains("Advertiser: Apple Inc."));
		assert!(blocks[0].contains("First shown: 2024-01-01"));
		assert!(blocks[1].contains("Advertiser: Apple Pty"));
		assert!(blocks[2].contains("Advertiser: Legacy Name"));
		assert!(blocks[2].contains("Target domain: N/A"));
	}

	#[test]
	fn test_limit_caps_output() {
		let ads: Vec<Value> = (1..=15)
			.map(|i| json!({"title": format!("Ad {}", i), "link": format!("https://example.com/{}", i)}))
			.collect();
		let response = json!({ "ads": ads });

		let text = format_results(SearchVariant::Sponsored, &response, 4);
		assert_eq!(text.split("\n\n").count(), 4);
		assert!(text.contains("**4. Ad 4**"));
		assert!(!text.contains("Ad 5"));

		let text = format_results(SearchVariant::Sponsored, &response, 50);
		assert_eq!(text.split("\n\n").count(), 15);
	}

	#[test]
	fn test_youtube_falls_back_to_video_results() {
		let response = json!({
			"ads_results": [],
			"video_results": [
				{"title": "Best shoes", "link": "https://youtube.com/watch?v=1", "channel": {"name": "Runner"}}
			]
		});
		let text = format_results(SearchVariant::YouTube, &response, 20);
		assert!(text.contains("Best shoes"));
		assert!(text.contains("Channel: Runner"));
	}

	#[test]
	fn test_empty_results_message() {
		let text = format_results(SearchVariant::Naver, &json!({"ads_results": []}), 10);
		assert_eq!(text, no_results_message(SearchVariant::Naver));

		let text = format_results(SearchVariant::Naver, &json!({"search_metadata": {}}), 10);
		assert_eq!(text, no_results_message(SearchVariant::Naver));
	}

	#[test]
	fn test_naver_block_layout() {
		let response = json!({
			"ads_results": [
				{"title": "커피 원두", "description": "신선한 원두", "site": "coffee.co.kr", "link": "https://coffee.co.kr"}
			]
		});
		let text = format_results(SearchVariant::Naver, &response, 10);
		assert_eq!(
			text,
			"**1. 커피 원두**\n- 신선한 원두\n- Site: coffee.co.kr\n- Link: https://coffee.co.kr"
		);
	}
}
