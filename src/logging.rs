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

// Console logging macros shared across the crate

use std::sync::atomic::{AtomicBool, Ordering};

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Turn debug output on or off for the whole process
pub fn set_debug(enabled: bool) {
	DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
}

pub fn is_debug() -> bool {
	DEBUG_ENABLED.load(Ordering::SeqCst)
}

#[macro_export]
macro_rules! log_debug {
	($($arg:tt)*) => {
		if $crate::logging::is_debug() {
			use colored::Colorize;
			eprintln!("{} {}", "[debug]".bright_black(), format!($($arg)*).bright_black());
		}
	};
}

#[macro_export]
macro_rules! log_info {
	($($arg:tt)*) => {{
		use colored::Colorize;
		println!("{}", format!($($arg)*).bright_blue());
	}};
}

#[macro_export]
macro_rules! log_error {
	($($arg:tt)*) => {{
		use colored::Colorize;
		eprintln!("{} {}", "error:".bright_red().bold(), format!($($arg)*));
	}};
}
