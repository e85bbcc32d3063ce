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

use super::{describe_tools, parse_fields, print_turn};
use crate::search::SearchVariant;
use crate::session::animation::with_spinner;
use crate::session::{Controller, FormSubmission, Session, UserAction};
use anyhow::{anyhow, Result};
use clap::Args;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

#[derive(Args, Debug)]
pub struct ChatArgs {
	/// Print the full transcript as JSON when the session ends
	#[arg(long)]
	pub dump_transcript: bool,
}

const HELP: &str = "Commands:
  /form <variant> key=value ...  submit a search form directly
  /tools                         list search variants and their fields
  /transcript                    print the conversation so far
  /help                          show this help
  /quit                          leave the chat";

enum Input {
	Action(UserAction),
	Tools,
	Transcript,
	Help,
	Quit,
}

fn parse_input(line: &str) -> Result<Input> {
	let Some(command) = line.strip_prefix('/') else {
		return Ok(Input::Action(UserAction::ChatMessage(line.to_string())));
	};

	let mut tokens = command.split_whitespace();
	match tokens.next().unwrap_or_default() {
		"form" => {
			let variant = tokens
				.next()
				.ok_or_else(|| anyhow!("Usage: /form <variant> key=value ..."))?
				.parse::<SearchVariant>()?;
			let fields = parse_fields(&tokens.collect::<Vec<_>>())?;
			Ok(Input::Action(UserAction::FormSubmission(
				FormSubmission::new(variant, fields),
			)))
		}
		"tools" => Ok(Input::Tools),
		"transcript" => Ok(Input::Transcript),
		"help" => Ok(Input::Help),
		"quit" | "exit" => Ok(Input::Quit),
		other => Err(anyhow!("Unknown command '/{}'. Type /help for commands.", other)),
	}
}

pub async fn run(args: &ChatArgs, controller: &Controller) -> Result<()> {
	let mut editor = DefaultEditor::new()?;
	let mut session = Session::new();

	log_info!("Ad search assistant. Describe the ads you are looking for, or type /help.");

	loop {
		let line = match editor.readline(&format!("{} ", ">".bright_green())) {
			Ok(line) => line,
			Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
			Err(e) => return Err(anyhow!("Failed to read input: {}", e)),
		};

		let line = line.trim();
		if line.is_empty() {
			continue;
		}
		let _ = editor.add_history_entry(line);

		let action = match parse_input(line) {
			Ok(Input::Action(action)) => action,
			Ok(Input::Tools) => {
				println!("{}\n", describe_tools());
				continue;
			}
			Ok(Input::Transcript) => {
				for turn in session.transcript.turns() {
					if turn.is_user() {
						println!("{} {}\n", ">".bright_green(), turn.display_text());
					} else {
						print_turn(turn);
					}
				}
				continue;
			}
			Ok(Input::Help) => {
				println!("{}\n", HELP);
				continue;
			}
			Ok(Input::Quit) => break,
			Err(e) => {
				log_error!("{}", e);
				continue;
			}
		};

		let turns = with_spinner("Thinking...", controller.handle(&mut session, action)).await;
		for turn in &turns {
			print_turn(turn);
		}
	}

	if args.dump_transcript {
		println!("{}", serde_json::to_string_pretty(&session.transcript)?);
	}

	Ok(())
}
