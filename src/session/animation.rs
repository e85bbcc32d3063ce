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

// Spinner shown while the assistant or SerpApi is working

use anyhow::Result;
use colored::*;
use crossterm::{cursor, execute};
use std::io::{stdout, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const LOADING_FRAMES: [&str; 8] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧"];

pub async fn show_loading_animation(cancel_flag: Arc<AtomicBool>, message: &str) -> Result<()> {
	let mut stdout = stdout();
	let mut frame_idx = 0;

	execute!(stdout, cursor::SavePosition)?;

	while !cancel_flag.load(Ordering::SeqCst) {
		execute!(stdout, cursor::RestorePosition)?;

		print!(
			" {} {}",
			LOADING_FRAMES[frame_idx].cyan(),
			message.bright_blue()
		);

		stdout.flush()?;

		frame_idx = (frame_idx + 1) % LOADING_FRAMES.len();

		tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
	}

	// Blank out the spinner line
	execute!(stdout, cursor::RestorePosition)?;
	print!("{}", " ".repeat(message.chars().count() + 4));
	execute!(stdout, cursor::RestorePosition)?;
	stdout.flush()?;

	Ok(())
}

pub async fn show_no_animation(cancel_flag: Arc<AtomicBool>) -> Result<()> {
	while !cancel_flag.load(Ordering::SeqCst) {
		tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
	}
	Ok(())
}

/// Animate only when attached to a terminal
pub async fn show_smart_animation(cancel_flag: Arc<AtomicBool>, message: &str) -> Result<()> {
	if std::io::stdout().is_terminal() {
		show_loading_animation(cancel_flag, message).await
	} else {
		show_no_animation(cancel_flag).await
	}
}

/// Run `work` while a spinner is displayed, then clear the spinner
pub async fn with_spinner<F, T>(message: &str, work: F) -> T
where
	F: std::future::Future<Output = T>,
{
	let cancel_flag = Arc::new(AtomicBool::new(false));
	let animation_flag = cancel_flag.clone();
	let message = message.to_string();
	let animation = tokio::spawn(async move {
		let _ = show_smart_animation(animation_flag, &message).await;
	});

	let output = work.await;

	cancel_flag.store(true, Ordering::SeqCst);
	let _ = animation.await;
	output
}
