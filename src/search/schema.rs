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

//! Parameter schemas for the four ad-search variants
//!
//! Each variant has a typed record holding optional scalars. A record can be
//! built from the chat model's JSON arguments or from a flat form submission,
//! normalized (region names to codes, choice values to canonical case) and
//! turned into the exact query parameters SerpApi expects.

use super::SearchVariant;
use crate::lookup::{LookupTable, Lookups};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Internal name of the asynchronous-search flag
const ASYNC_FIELD: &str = "async_";
/// Name SerpApi expects for the same flag
const ASYNC_WIRE_NAME: &str = "async";
const LANGUAGE_FIELD: &str = "hl";
const DATE_FORMAT: &str = "%Y%m%d";

const PLATFORMS: &[&str] = &["PLAY", "MAPS", "SEARCH", "SHOPPING", "YOUTUBE"];
const CREATIVE_FORMATS: &[&str] = &["text", "image", "video"];
const DEVICES: &[&str] = &["desktop", "tablet", "mobile"];
const OUTPUTS: &[&str] = &["json", "html"];

/// Recoverable problems with a proposed parameter set
///
/// The `Display` text is shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
	#[error("Unknown tool: {0}")]
	UnknownTool(String),

	#[error("The arguments for {tool} could not be read: {reason}")]
	MalformedArguments { tool: &'static str, reason: String },

	#[error("{tool} needs {fields} before it can search. Please provide it.")]
	MissingRequired {
		tool: &'static str,
		fields: &'static str,
	},

	#[error("Invalid region name: {0}. Please provide a valid country.")]
	InvalidRegion(String),

	#[error("Unknown field '{field}' for {tool}")]
	UnknownField { tool: &'static str, field: String },

	#[error("Invalid value '{value}' for {field}: expected {expected}")]
	InvalidValue {
		field: &'static str,
		value: String,
		expected: String,
	},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
	Text,
	Boolean,
	Integer,
}

impl FieldKind {
	pub fn json_type(&self) -> &'static str {
		match self {
			FieldKind::Text => "string",
			FieldKind::Boolean => "boolean",
			FieldKind::Integer => "integer",
		}
	}
}

/// One field of a variant's schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
	pub name: &'static str,
	pub kind: FieldKind,
	pub description: &'static str,
	pub choices: &'static [&'static str],
	/// One of the variant's required alternatives
	pub required: bool,
}

impl FieldSpec {
	const fn new(name: &'static str, kind: FieldKind, description: &'static str) -> Self {
		Self {
			name,
			kind,
			description,
			choices: &[],
			required: false,
		}
	}

	const fn text(name: &'static str, description: &'static str) -> Self {
		Self::new(name, FieldKind::Text, description)
	}

	const fn flag(name: &'static str, description: &'static str) -> Self {
		Self::new(name, FieldKind::Boolean, description)
	}

	const fn integer(name: &'static str, description: &'static str) -> Self {
		Self::new(name, FieldKind::Integer, description)
	}

	const fn required(self) -> Self {
		Self {
			required: true,
			..self
		}
	}

	const fn choices(self, choices: &'static [&'static str]) -> Self {
		Self { choices, ..self }
	}
}

const TRANSPARENCY_FIELDS: &[FieldSpec] = &[
	FieldSpec::text("advertiser_id", "Comma-separated list of advertiser IDs").required(),
	FieldSpec::text("text", "Free text search phrase, e.g. a brand name or domain").required(),
	FieldSpec::text("platform", "Platform the ads ran on").choices(PLATFORMS),
	FieldSpec::flag("political_ads", "Only return political ads"),
	FieldSpec::text("region", "Country name, e.g. \"Australia\""),
	FieldSpec::text("start_date", "First day of the date range (YYYYMMDD)"),
	FieldSpec::text("end_date", "Last day of the date range (YYYYMMDD)"),
	FieldSpec::text("creative_format", "Creative format").choices(CREATIVE_FORMATS),
	FieldSpec::integer("num", "Maximum number of results (default 10)"),
	FieldSpec::text("next_page_token", "Token for the next page of results"),
];

const SPONSORED_FIELDS: &[FieldSpec] = &[
	FieldSpec::text("q", "Search query").required(),
	FieldSpec::text("location", "Location to search from, e.g. \"Austin, Texas\""),
	FieldSpec::text("gl", "Country name or two-letter country code"),
	FieldSpec::text("hl", "Interface language name or code"),
	FieldSpec::text("google_domain", "Google domain to use, e.g. google.co.uk"),
	FieldSpec::text("device", "Device to emulate").choices(DEVICES),
	FieldSpec::integer("num", "Maximum number of results (default 10)"),
	FieldSpec::integer("start", "Result offset for pagination"),
];

const YOUTUBE_FIELDS: &[FieldSpec] = &[
	FieldSpec::text("search_query", "Search query").required(),
	FieldSpec::text("gl", "Country name or two-letter country code"),
	FieldSpec::text("hl", "Interface language name or code"),
	FieldSpec::text("sp", "Filter or pagination token"),
	FieldSpec::integer("num", "Maximum number of results to show (default 20)"),
];

const NAVER_FIELDS: &[FieldSpec] = &[
	FieldSpec::text("query", "Search query").required(),
	FieldSpec::integer("page", "Result page, starting at 1"),
	FieldSpec::integer("num", "Maximum number of results (default 10)"),
];

const COMMON_FIELDS: &[FieldSpec] = &[
	FieldSpec::flag("no_cache", "Bypass the SerpApi cache"),
	FieldSpec::flag(ASYNC_FIELD, "Submit the search asynchronously"),
	FieldSpec::flag("zero_trace", "Enable ZeroTrace mode"),
	FieldSpec::text("output", "Response format").choices(OUTPUTS),
];

impl SearchVariant {
	/// All fields of this variant's schema, variant-specific ones first
	pub fn fields(&self) -> Vec<FieldSpec> {
		let specific = match self {
			SearchVariant::Transparency => TRANSPARENCY_FIELDS,
			SearchVariant::Sponsored => SPONSORED_FIELDS,
			SearchVariant::YouTube => YOUTUBE_FIELDS,
			SearchVariant::Naver => NAVER_FIELDS,
		};
		specific.iter().chain(COMMON_FIELDS).copied().collect()
	}

	/// Human-readable list of the required alternatives
	pub fn required_description(&self) -> &'static str {
		match self {
			SearchVariant::Transparency => "an advertiser_id or a text search phrase",
			SearchVariant::Sponsored => "a search query (q)",
			SearchVariant::YouTube => "a search query (search_query)",
			SearchVariant::Naver => "a search query (query)",
		}
	}

	/// Field carrying a country, mapped through a lookup table
	pub fn region_field(&self) -> Option<&'static str> {
		match self {
			SearchVariant::Transparency => Some("region"),
			SearchVariant::Sponsored | SearchVariant::YouTube => Some("gl"),
			SearchVariant::Naver => None,
		}
	}

	/// Fields that shape local output but are not SerpApi parameters
	fn local_only_fields(&self) -> &'static [&'static str] {
		match self {
			SearchVariant::YouTube => &["num"],
			_ => &[],
		}
	}

	fn region_table<'a>(&self, lookups: &'a Lookups) -> Option<&'a LookupTable> {
		match self {
			SearchVariant::Transparency => Some(&lookups.regions),
			SearchVariant::Sponsored | SearchVariant::YouTube => Some(&lookups.countries),
			SearchVariant::Naver => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransparencyParameters {
	pub advertiser_id: Option<String>,
	pub text: Option<String>,
	pub platform: Option<String>,
	pub political_ads: Option<bool>,
	pub region: Option<String>,
	pub start_date: Option<String>,
	pub end_date: Option<String>,
	pub creative_format: Option<String>,
	pub num: Option<u32>,
	pub next_page_token: Option<String>,
	pub no_cache: Option<bool>,
	#[serde(alias = "async")]
	pub async_: Option<bool>,
	pub zero_trace: Option<bool>,
	pub output: Option<String>,
}

impl Default for TransparencyParameters {
	fn default() -> Self {
		Self {
			advertiser_id: None,
			text: None,
			platform: None,
			political_ads: Some(false),
			region: None,
			start_date: None,
			end_date: None,
			creative_format: None,
			num: Some(10),
			next_page_token: None,
			no_cache: None,
			async_: None,
			zero_trace: None,
			output: Some("json".to_string()),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SponsoredParameters {
	pub q: Option<String>,
	pub location: Option<String>,
	pub gl: Option<String>,
	pub hl: Option<String>,
	pub google_domain: Option<String>,
	pub device: Option<String>,
	pub num: Option<u32>,
	pub start: Option<u32>,
	pub no_cache: Option<bool>,
	#[serde(alias = "async")]
	pub async_: Option<bool>,
	pub zero_trace: Option<bool>,
	pub output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct YouTubeParameters {
	pub search_query: Option<String>,
	pub gl: Option<String>,
	pub hl: Option<String>,
	pub sp: Option<String>,
	pub num: Option<u32>,
	pub no_cache: Option<bool>,
	#[serde(alias = "async")]
	pub async_: Option<bool>,
	pub zero_trace: Option<bool>,
	pub output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NaverParameters {
	pub query: Option<String>,
	pub page: Option<u32>,
	pub num: Option<u32>,
	pub no_cache: Option<bool>,
	#[serde(alias = "async")]
	pub async_: Option<bool>,
	pub zero_trace: Option<bool>,
	pub output: Option<String>,
}

/// A parameter set for exactly one variant
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "variant", content = "parameters", rename_all = "snake_case")]
pub enum SearchParameters {
	Transparency(TransparencyParameters),
	Sponsored(SponsoredParameters),
	#[serde(rename = "youtube")]
	YouTube(YouTubeParameters),
	Naver(NaverParameters),
}

impl SearchParameters {
	/// A parameter set holding only the variant's defaults
	pub fn empty(variant: SearchVariant) -> Self {
		match variant {
			SearchVariant::Transparency => Self::Transparency(TransparencyParameters::default()),
			SearchVariant::Sponsored => Self::Sponsored(SponsoredParameters::default()),
			SearchVariant::YouTube => Self::YouTube(YouTubeParameters::default()),
			SearchVariant::Naver => Self::Naver(NaverParameters::default()),
		}
	}

	pub fn variant(&self) -> SearchVariant {
		match self {
			Self::Transparency(_) => SearchVariant::Transparency,
			Self::Sponsored(_) => SearchVariant::Sponsored,
			Self::YouTube(_) => SearchVariant::YouTube,
			Self::Naver(_) => SearchVariant::Naver,
		}
	}

	/// Build a parameter set from a chat model's tool-call arguments
	pub fn from_arguments(variant: SearchVariant, arguments: Value) -> Result<Self, ParameterError> {
		let arguments = match arguments {
			Value::Null => Value::Object(Map::new()),
			Value::Object(_) => arguments,
			other => {
				return Err(ParameterError::MalformedArguments {
					tool: variant.tool_name(),
					reason: format!("expected a JSON object, got {}", other),
				})
			}
		};

		let malformed = |e: serde_json::Error| ParameterError::MalformedArguments {
			tool: variant.tool_name(),
			reason: e.to_string(),
		};

		Ok(match variant {
			SearchVariant::Transparency => {
				Self::Transparency(serde_json::from_value(arguments).map_err(malformed)?)
			}
			SearchVariant::Sponsored => {
				Self::Sponsored(serde_json::from_value(arguments).map_err(malformed)?)
			}
			SearchVariant::YouTube => {
				Self::YouTube(serde_json::from_value(arguments).map_err(malformed)?)
			}
			SearchVariant::Naver => Self::Naver(serde_json::from_value(arguments).map_err(malformed)?),
		})
	}

	/// Build a parameter set from a flat form submission
	///
	/// Blank values are dropped. Booleans and integers are coerced according
	/// to the variant's field table.
	pub fn from_form(
		variant: SearchVariant,
		fields: &BTreeMap<String, String>,
	) -> Result<Self, ParameterError> {
		let specs = variant.fields();
		let mut arguments = Map::new();

		for (name, raw) in fields {
			let raw = raw.trim();
			if raw.is_empty() {
				continue;
			}

			let spec = specs
				.iter()
				.find(|spec| {
					spec.name == name || (spec.name == ASYNC_FIELD && name == ASYNC_WIRE_NAME)
				})
				.ok_or_else(|| ParameterError::UnknownField {
					tool: variant.tool_name(),
					field: name.clone(),
				})?;

			let value = match spec.kind {
				FieldKind::Text => Value::String(raw.to_string()),
				FieldKind::Boolean => {
					Value::Bool(parse_flag(raw).ok_or_else(|| ParameterError::InvalidValue {
						field: spec.name,
						value: raw.to_string(),
						expected: "true or false".to_string(),
					})?)
				}
				FieldKind::Integer => {
					let number = raw.parse::<u32>().map_err(|_| ParameterError::InvalidValue {
						field: spec.name,
						value: raw.to_string(),
						expected: "a whole number".to_string(),
					})?;
					Value::from(number)
				}
			};
			arguments.insert(spec.name.to_string(), value);
		}

		Self::from_arguments(variant, Value::Object(arguments))
	}

	/// Field values in schema order, rendered as wire strings
	fn entries(&self) -> Vec<(&'static str, Option<String>)> {
		match self {
			Self::Transparency(p) => vec![
				("advertiser_id", p.advertiser_id.clone()),
				("text", p.text.clone()),
				("platform", p.platform.clone()),
				("political_ads", flag(p.political_ads)),
				("region", p.region.clone()),
				("start_date", p.start_date.clone()),
				("end_date", p.end_date.clone()),
				("creative_format", p.creative_format.clone()),
				("num", number(p.num)),
				("next_page_token", p.next_page_token.clone()),
				("no_cache", flag(p.no_cache)),
				(ASYNC_FIELD, flag(p.async_)),
				("zero_trace", flag(p.zero_trace)),
				("output", p.output.clone()),
			],
			Self::Sponsored(p) => vec![
				("q", p.q.clone()),
				("location", p.location.clone()),
				("gl", p.gl.clone()),
				("hl", p.hl.clone()),
				("google_domain", p.google_domain.clone()),
				("device", p.device.clone()),
				("num", number(p.num)),
				("start", number(p.start)),
				("no_cache", flag(p.no_cache)),
				(ASYNC_FIELD, flag(p.async_)),
				("zero_trace", flag(p.zero_trace)),
				("output", p.output.clone()),
			],
			Self::YouTube(p) => vec![
				("search_query", p.search_query.clone()),
				("gl", p.gl.clone()),
				("hl", p.hl.clone()),
				("sp", p.sp.clone()),
				("num", number(p.num)),
				("no_cache", flag(p.no_cache)),
				(ASYNC_FIELD, flag(p.async_)),
				("zero_trace", flag(p.zero_trace)),
				("output", p.output.clone()),
			],
			Self::Naver(p) => vec![
				("query", p.query.clone()),
				("page", number(p.page)),
				("num", number(p.num)),
				("no_cache", flag(p.no_cache)),
				(ASYNC_FIELD, flag(p.async_)),
				("zero_trace", flag(p.zero_trace)),
				("output", p.output.clone()),
			],
		}
	}

	/// The error to report when none of the required alternatives is set
	pub fn missing_required(&self) -> Option<ParameterError> {
		let present = match self {
			Self::Transparency(p) => is_set(&p.advertiser_id) || is_set(&p.text),
			Self::Sponsored(p) => is_set(&p.q),
			Self::YouTube(p) => is_set(&p.search_query),
			Self::Naver(p) => is_set(&p.query),
		};

		if present {
			None
		} else {
			let variant = self.variant();
			Some(ParameterError::MissingRequired {
				tool: variant.label(),
				fields: variant.required_description(),
			})
		}
	}

	/// Requested number of results, if any
	pub fn num(&self) -> Option<u32> {
		match self {
			Self::Transparency(p) => p.num,
			Self::Sponsored(p) => p.num,
			Self::YouTube(p) => p.num,
			Self::Naver(p) => p.num,
		}
	}

	/// How many results to format
	pub fn result_limit(&self) -> usize {
		self.num()
			.map(|n| n as usize)
			.unwrap_or_else(|| self.variant().default_limit())
	}

	fn region_mut(&mut self) -> Option<&mut Option<String>> {
		match self {
			Self::Transparency(p) => Some(&mut p.region),
			Self::Sponsored(p) => Some(&mut p.gl),
			Self::YouTube(p) => Some(&mut p.gl),
			Self::Naver(_) => None,
		}
	}

	fn language_mut(&mut self) -> Option<&mut Option<String>> {
		match self {
			Self::Sponsored(p) => Some(&mut p.hl),
			Self::YouTube(p) => Some(&mut p.hl),
			_ => None,
		}
	}

	/// Validate and rewrite the parameter set into wire form
	///
	/// Region names must resolve through the lookup table. Unlike
	/// `to_api_params`, an unknown region is an error here. Language names
	/// are mapped when known and left alone otherwise.
	pub fn normalize(&mut self, lookups: &Lookups) -> Result<(), ParameterError> {
		if let Some(error) = self.missing_required() {
			return Err(error);
		}

		let variant = self.variant();
		if let (Some(table), Some(slot)) = (variant.region_table(lookups), self.region_mut()) {
			match slot.clone() {
				Some(region) if region.trim().is_empty() => *slot = None,
				Some(region) => {
					let code = table
						.resolve(&region)
						.ok_or(ParameterError::InvalidRegion(region))?;
					*slot = Some(code);
				}
				None => {}
			}
		}

		if let Some(slot) = self.language_mut() {
			if let Some(language) = slot.take().filter(|l| !l.trim().is_empty()) {
				*slot = Some(lookups.languages.resolve(&language).unwrap_or(language));
			}
		}

		match self {
			Self::Transparency(p) => {
				check_choice("platform", &mut p.platform, PLATFORMS)?;
				check_choice("creative_format", &mut p.creative_format, CREATIVE_FORMATS)?;
				check_date("start_date", &p.start_date)?;
				check_date("end_date", &p.end_date)?;
				check_positive("num", p.num)?;
				check_choice("output", &mut p.output, OUTPUTS)?;
			}
			Self::Sponsored(p) => {
				check_choice("device", &mut p.device, DEVICES)?;
				check_positive("num", p.num)?;
				check_choice("output", &mut p.output, OUTPUTS)?;
			}
			Self::YouTube(p) => {
				check_positive("num", p.num)?;
				check_choice("output", &mut p.output, OUTPUTS)?;
			}
			Self::Naver(p) => {
				check_positive("num", p.num)?;
				check_positive("page", p.page)?;
				check_choice("output", &mut p.output, OUTPUTS)?;
			}
		}

		Ok(())
	}

	/// Query parameters for SerpApi, excluding `api_key` and `engine`
	///
	/// Absent fields are omitted, the async flag gets its wire name, and a
	/// region name is replaced by its code when the table knows it. Unknown
	/// region values pass through unchanged for the API to reject.
	pub fn to_api_params(&self, lookups: &Lookups) -> Vec<(String, String)> {
		let variant = self.variant();
		let region_field = variant.region_field();
		let region_table = variant.region_table(lookups);

		self.entries()
			.into_iter()
			.filter(|(name, _)| !variant.local_only_fields().contains(name))
			.filter_map(|(name, value)| {
				let value = value.filter(|v| !v.trim().is_empty())?;
				let value = match region_table {
					Some(table) if Some(name) == region_field => table.code_or_passthrough(&value),
					_ if name == LANGUAGE_FIELD => lookups.languages.code_or_passthrough(&value),
					_ => value,
				};
				Some((wire_name(name).to_string(), value))
			})
			.collect()
	}

	/// Pretty JSON of the wire parameters, for confirmation prompts
	pub fn summary(&self, lookups: &Lookups) -> String {
		let params: Map<String, Value> = self
			.to_api_params(lookups)
			.into_iter()
			.map(|(name, value)| (name, Value::String(value)))
			.collect();
		serde_json::to_string_pretty(&Value::Object(params)).unwrap_or_default()
	}
}

fn wire_name(name: &str) -> &str {
	if name == ASYNC_FIELD {
		ASYNC_WIRE_NAME
	} else {
		name
	}
}

fn flag(value: Option<bool>) -> Option<String> {
	value.map(|b| b.to_string())
}

fn number(value: Option<u32>) -> Option<String> {
	value.map(|n| n.to_string())
}

fn is_set(value: &Option<String>) -> bool {
	value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn parse_flag(raw: &str) -> Option<bool> {
	match raw.to_lowercase().as_str() {
		"true" | "yes" | "1" | "on" => Some(true),
		"false" | "no" | "0" | "off" => Some(false),
		_ => None,
	}
}

/// Match a value against allowed choices, rewriting it to the canonical spelling
fn check_choice(
	field: &'static str,
	slot: &mut Option<String>,
	choices: &[&str],
) -> Result<(), ParameterError> {
	let Some(value) = slot.as_deref() else {
		return Ok(());
	};
	if value.trim().is_empty() {
		*slot = None;
		return Ok(());
	}

	match choices
		.iter()
		.find(|choice| choice.eq_ignore_ascii_case(value.trim()))
	{
		Some(choice) => {
			*slot = Some(choice.to_string());
			Ok(())
		}
		None => Err(ParameterError::InvalidValue {
			field,
			value: value.to_string(),
			expected: format!("one of {}", choices.join(", ")),
		}),
	}
}

fn check_date(field: &'static str, value: &Option<String>) -> Result<(), ParameterError> {
	match value.as_deref() {
		Some(date) if NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).is_err() => {
			Err(ParameterError::InvalidValue {
				field,
				value: date.to_string(),
				expected: "a date in YYYYMMDD format".to_string(),
			})
		}
		_ => Ok(()),
	}
}

fn check_positive(field: &'static str, value: Option<u32>) -> Result<(), ParameterError> {
	match value {
		Some(0) => Err(ParameterError::InvalidValue {
			field,
			value: "0".to_string(),
			expected: "a number of at least 1".to_string(),
		}),
		_ => Ok(()),
	}
}
