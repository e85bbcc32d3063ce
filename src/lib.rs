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

//! Conversational assistant for SerpApi ad searches
//!
//! A chat model collects search parameters from the user, the controller
//! validates them against the bundled lookup tables, and the SerpApi client
//! runs the search and formats the ads it finds.

#[macro_use]
pub mod logging;

pub mod commands;
pub mod config;
pub mod lookup;
pub mod providers;
pub mod search;
pub mod session;
