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

use super::{parse_fields, print_turn};
use crate::search::SearchVariant;
use crate::session::animation::with_spinner;
use crate::session::{Controller, FormSubmission, Session, Turn, UserAction};
use anyhow::Result;
use clap::Args;

#[derive(Args, Debug)]
pub struct SearchArgs {
	/// Search variant: transparency, sponsored, youtube or naver
	#[arg(value_name = "VARIANT")]
	pub variant: SearchVariant,

	/// Search fields as key=value pairs, e.g. text=apple region=Australia
	#[arg(value_name = "FIELDS", trailing_var_arg = true)]
	pub fields: Vec<String>,
}

/// Submit the fields as a manual form and print the outcome
pub async fn run(args: &SearchArgs, controller: &Controller) -> Result<()> {
	let fields = parse_fields(&args.fields)?;
	let mut session = Session::new();

	let turns = with_spinner(
		"Searching...",
		controller.handle(
			&mut session,
			UserAction::FormSubmission(FormSubmission::new(args.variant, fields)),
		),
	)
	.await;

	for turn in turns.iter().filter(|t| !matches!(t, Turn::ToolRequest { .. })) {
		print_turn(turn);
	}

	Ok(())
}
