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

use adscout::commands::{self, Commands};
use adscout::config::Config;
use adscout::{log_error, logging, lookup};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "adscout")]
#[command(version, about = "Find ads through SerpApi by chatting or filling a form")]
struct Cli {
	/// Path to a config file (defaults to <config dir>/adscout/config.toml)
	#[arg(long, global = true, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Print debug logging
	#[arg(long, global = true)]
	debug: bool,

	#[command(subcommand)]
	command: Commands,
}

async fn run(cli: Cli) -> Result<()> {
	let config = Config::load(cli.config.as_deref())?;
	logging::set_debug(cli.debug || config.general.debug);

	let lookups = lookup::init(&config.lookup)?;
	let controller = commands::build_controller(&config, lookups)?;

	match &cli.command {
		Commands::Chat(args) => commands::chat::run(args, &controller).await,
		Commands::Search(args) => commands::search::run(args, &controller).await,
		Commands::Serve(args) => {
			commands::serve::run(args, &config.server, controller.clone()).await
		}
	}
}

#[tokio::main]
async fn main() -> ExitCode {
	dotenvy::dotenv().ok();

	let cli = Cli::parse();
	if cli.debug {
		logging::set_debug(true);
	}

	match run(cli).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			log_error!("{:#}", e);
			ExitCode::FAILURE
		}
	}
}
