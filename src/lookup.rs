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

//! Lookup Tables - process-wide code/name mappings
//!
//! Region, country and language tables are loaded once at startup and shared
//! read-only by every session. The bundled tables are compiled into the
//! binary; the `[lookup]` config section can point at replacement files.
//!
//! Every table is a JSON object of `"code": "name"` entries. The forward view
//! maps code to name, the inverse view maps name to code and ignores case and
//! surrounding whitespace.

use crate::config::LookupConfig;
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

const BUNDLED_REGIONS: &str = include_str!("../data/transparency_regions.json");
const BUNDLED_COUNTRIES: &str = include_str!("../data/countries.json");
const BUNDLED_LANGUAGES: &str = include_str!("../data/languages.json");

/// Global lookup tables - initialized once at startup
static LOOKUPS: OnceLock<Arc<Lookups>> = OnceLock::new();

#[derive(Debug, Clone, PartialEq)]
pub struct LookupTable {
	/// Code -> name
	forward: HashMap<String, String>,
	/// Normalized name -> code
	inverse: HashMap<String, String>,
	/// Normalized code -> code as written in the table
	codes: HashMap<String, String>,
}

impl LookupTable {
	pub fn from_json_str(content: &str) -> Result<Self> {
		let forward: HashMap<String, String> = serde_json::from_str(content)
			.map_err(|e| anyhow!("Lookup table is not a JSON object of strings: {}", e))?;

		if forward.is_empty() {
			return Err(anyhow!("Lookup table is empty"));
		}

		let mut inverse = HashMap::with_capacity(forward.len());
		for (code, name) in &forward {
			if let Some(previous) = inverse.insert(normalize(name), code.clone()) {
				return Err(anyhow!(
					"Lookup table maps '{}' to both '{}' and '{}'",
					name,
					previous,
					code
				));
			}
		}

		let codes = forward
			.keys()
			.map(|code| (normalize(code), code.clone()))
			.collect();

		Ok(Self {
			forward,
			inverse,
			codes,
		})
	}

	pub fn from_file(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read lookup table {}", path.display()))?;
		Self::from_json_str(&content)
			.with_context(|| format!("Failed to load lookup table {}", path.display()))
	}

	/// Code for a human-readable name, if the name is known
	pub fn code_for(&self, name: &str) -> Option<&str> {
		self.inverse.get(&normalize(name)).map(String::as_str)
	}

	/// Code as written in the table, matched ignoring case
	pub fn canonical_code(&self, code: &str) -> Option<&str> {
		self.codes.get(&normalize(code)).map(String::as_str)
	}

	pub fn name_for(&self, code: &str) -> Option<&str> {
		self.canonical_code(code)
			.and_then(|code| self.forward.get(code))
			.map(String::as_str)
	}

	pub fn contains_code(&self, code: &str) -> bool {
		self.canonical_code(code).is_some()
	}

	/// Resolve a value that may be either a known name or already a known code
	pub fn resolve(&self, value: &str) -> Option<String> {
		if let Some(code) = self.code_for(value) {
			return Some(code.to_string());
		}
		self.canonical_code(value).map(str::to_string)
	}

	/// Map a name to its code, passing unknown values through unchanged
	pub fn code_or_passthrough(&self, value: &str) -> String {
		self.resolve(value).unwrap_or_else(|| value.to_string())
	}

	/// All names, sorted, for pickers and help output
	pub fn names(&self) -> Vec<&str> {
		let mut names: Vec<&str> = self.forward.values().map(String::as_str).collect();
		names.sort_unstable();
		names
	}

	pub fn len(&self) -> usize {
		self.forward.len()
	}

	pub fn is_empty(&self) -> bool {
		self.forward.is_empty()
	}
}

fn normalize(name: &str) -> String {
	name.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lookups {
	/// Google Ads Transparency Center regions (geo criteria ids)
	pub regions: LookupTable,
	/// ISO 3166 alpha-2 country codes used by `gl`
	pub countries: LookupTable,
	/// Interface language codes used by `hl`
	pub languages: LookupTable,
}

impl Lookups {
	/// Tables compiled into the binary
	pub fn bundled() -> Result<Self> {
		Ok(Self {
			regions: LookupTable::from_json_str(BUNDLED_REGIONS).context("bundled regions")?,
			countries: LookupTable::from_json_str(BUNDLED_COUNTRIES)
				.context("bundled countries")?,
			languages: LookupTable::from_json_str(BUNDLED_LANGUAGES)
				.context("bundled languages")?,
		})
	}

	/// Bundled tables with any configured file overrides applied
	pub fn load(config: &LookupConfig) -> Result<Self> {
		let mut lookups = Self::bundled()?;
		if let Some(path) = &config.regions_path {
			lookups.regions = LookupTable::from_file(path)?;
		}
		if let Some(path) = &config.countries_path {
			lookups.countries = LookupTable::from_file(path)?;
		}
		if let Some(path) = &config.languages_path {
			lookups.languages = LookupTable::from_file(path)?;
		}

		crate::log_debug!(
			"Lookup tables loaded: {} regions, {} countries, {} languages",
			lookups.regions.len(),
			lookups.countries.len(),
			lookups.languages.len()
		);

		Ok(lookups)
	}
}

/// Initialize the global lookup tables
///
/// Loads the tables on the first call and hands out the same shared handle on
/// every later call. A missing or malformed table file is returned as an
/// error; callers treat it as fatal since no valid request can be built.
pub fn init(config: &LookupConfig) -> Result<Arc<Lookups>> {
	if let Some(lookups) = LOOKUPS.get() {
		return Ok(lookups.clone());
	}

	let lookups = Arc::new(Lookups::load(config)?);
	Ok(LOOKUPS.get_or_init(|| lookups).clone())
}
