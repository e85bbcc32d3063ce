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

//! Conversation sessions
//!
//! A session owns one append-only transcript and the controller state for a
//! single user. Sessions are looked up by an opaque token and never share
//! mutable state; each one sits behind its own async mutex so a user action
//! runs to completion before the next one for that session starts.

use crate::search::ToolInvocation;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub mod animation;
pub mod controller;
pub mod prompt;

pub use controller::{Controller, FormSubmission, UserAction};

fn now_secs() -> u64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.unwrap_or_default()
		.as_secs()
}

/// One entry of the conversation transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Turn {
	User {
		content: String,
		timestamp: u64,
	},
	Assistant {
		content: String,
		timestamp: u64,
	},
	/// A search the model proposed or the form submitted
	ToolRequest {
		invocation_id: String,
		tool_name: String,
		/// Raw JSON text of the arguments
		arguments: String,
		timestamp: u64,
	},
	ToolResult {
		invocation_id: String,
		content: String,
		timestamp: u64,
	},
}

impl Turn {
	pub fn user(content: impl Into<String>) -> Self {
		Turn::User {
			content: content.into(),
			timestamp: now_secs(),
		}
	}

	pub fn assistant(content: impl Into<String>) -> Self {
		Turn::Assistant {
			content: content.into(),
			timestamp: now_secs(),
		}
	}

	pub fn tool_request(
		invocation_id: impl Into<String>,
		tool_name: impl Into<String>,
		arguments: impl Into<String>,
	) -> Self {
		Turn::ToolRequest {
			invocation_id: invocation_id.into(),
			tool_name: tool_name.into(),
			arguments: arguments.into(),
			timestamp: now_secs(),
		}
	}

	pub fn tool_result(invocation_id: impl Into<String>, content: impl Into<String>) -> Self {
		Turn::ToolResult {
			invocation_id: invocation_id.into(),
			content: content.into(),
			timestamp: now_secs(),
		}
	}

	/// Text shown to the user for this turn
	pub fn display_text(&self) -> String {
		match self {
			Turn::User { content, .. } | Turn::Assistant { content, .. } => content.clone(),
			Turn::ToolRequest {
				tool_name,
				arguments,
				..
			} => format!("Calling {} with {}", tool_name, arguments),
			Turn::ToolResult { content, .. } => content.clone(),
		}
	}

	pub fn is_user(&self) -> bool {
		matches!(self, Turn::User { .. })
	}
}

/// Append-only list of turns
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Transcript {
	turns: Vec<Turn>,
}

impl Transcript {
	pub fn push(&mut self, turn: Turn) {
		self.turns.push(turn);
	}

	pub fn len(&self) -> usize {
		self.turns.len()
	}

	pub fn is_empty(&self) -> bool {
		self.turns.is_empty()
	}

	pub fn turns(&self) -> &[Turn] {
		&self.turns
	}

	/// Turns appended at or after `index`
	pub fn since(&self, index: usize) -> &[Turn] {
		self.turns.get(index..).unwrap_or(&[])
	}

	pub fn last(&self) -> Option<&Turn> {
		self.turns.last()
	}
}

/// Controller state between user actions
///
/// `Formatting` and `Executing` only exist while an action is being handled;
/// a session at rest is `Collecting`, `Confirming` or `Done`.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ConversationState {
	#[default]
	Collecting,
	Formatting(ToolInvocation),
	Confirming(ToolInvocation),
	Executing(ToolInvocation),
	Done,
}

impl ConversationState {
	pub fn name(&self) -> &'static str {
		match self {
			ConversationState::Collecting => "collecting",
			ConversationState::Formatting(_) => "formatting",
			ConversationState::Confirming(_) => "confirming",
			ConversationState::Executing(_) => "executing",
			ConversationState::Done => "done",
		}
	}

	/// Invocation waiting for the user's confirmation, if any
	pub fn pending(&self) -> Option<&ToolInvocation> {
		match self {
			ConversationState::Confirming(invocation) => Some(invocation),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(Uuid);

impl SessionToken {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for SessionToken {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for SessionToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl FromStr for SessionToken {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Uuid::parse_str(s.trim()).map(Self)
	}
}

#[derive(Debug)]
pub struct Session {
	pub token: SessionToken,
	pub state: ConversationState,
	pub transcript: Transcript,
	pub created_at: u64,
	/// When the session last handled a user action
	pub last_active: Instant,
}

impl Session {
	pub fn new() -> Self {
		Self::with_token(SessionToken::new())
	}

	pub fn with_token(token: SessionToken) -> Self {
		Self {
			token,
			state: ConversationState::default(),
			transcript: Transcript::default(),
			created_at: now_secs(),
			last_active: Instant::now(),
		}
	}

	pub fn touch(&mut self) {
		self.last_active = Instant::now();
	}

	pub fn idle_for(&self) -> Duration {
		self.last_active.elapsed()
	}
}

impl Default for Session {
	fn default() -> Self {
		Self::new()
	}
}

pub type SharedSession = Arc<tokio::sync::Mutex<Session>>;

/// Sessions keyed by token
#[derive(Default)]
pub struct SessionStore {
	sessions: RwLock<HashMap<SessionToken, SharedSession>>,
}

impl SessionStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn create(&self) -> (SessionToken, SharedSession) {
		let session = Session::new();
		let token = session.token;
		let shared = Arc::new(tokio::sync::Mutex::new(session));
		self.sessions.write().insert(token, shared.clone());
		crate::log_debug!("Created session {}", token);
		(token, shared)
	}

	pub fn get(&self, token: &SessionToken) -> Option<SharedSession> {
		self.sessions.read().get(token).cloned()
	}

	/// Existing session for `token`, or a fresh one when no token is given
	///
	/// Returns `None` for a token that does not belong to any session.
	pub fn resolve(&self, token: Option<&SessionToken>) -> Option<(SessionToken, SharedSession)> {
		match token {
			Some(token) => self.get(token).map(|session| (*token, session)),
			None => Some(self.create()),
		}
	}

	pub fn remove(&self, token: &SessionToken) -> bool {
		self.sessions.write().remove(token).is_some()
	}

	/// Drop sessions idle for at least `ttl`, returning how many were dropped
	///
	/// A session whose lock is held is busy and always kept.
	pub fn evict_idle(&self, ttl: Duration) -> usize {
		let mut sessions = self.sessions.write();
		let before = sessions.len();
		sessions.retain(|token, session| match session.try_lock() {
			Ok(session) if session.idle_for() >= ttl => {
				crate::log_debug!("Evicting idle session {}", token);
				false
			}
			_ => true,
		});
		before - sessions.len()
	}

	pub fn len(&self) -> usize {
		self.sessions.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.sessions.read().is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_transcript_since() {
		let mut transcript = Transcript::default();
		transcript.push(Turn::user("hi"));
		transcript.push(Turn::assistant("hello"));
		assert_eq!(transcript.since(1).len(), 1);
		assert_eq!(transcript.since(2).len(), 0);
		assert_eq!(transcript.since(10).len(), 0);
	}

	#[test]
	fn test_token_round_trip() {
		let token = SessionToken::new();
		let parsed: SessionToken = token.to_string().parse().unwrap();
		assert_eq!(parsed, token);
		assert!("not-a-token".parse::<SessionToken>().is_err());
	}

	#[tokio::test]
	async fn test_store_isolates_sessions() {
		let store = SessionStore::new();
		let (first_token, first) = store.create();
		let (second_token, second) = store.create();
		assert_ne!(first_token, second_token);

		first.lock().await.transcript.push(Turn::user("only in first"));
		assert_eq!(first.lock().await.transcript.len(), 1);
		assert!(second.lock().await.transcript.is_empty());

		assert!(store.get(&first_token).is_some());
		assert!(store.remove(&first_token));
		assert!(store.get(&first_token).is_none());
		assert_eq!(store.len(), 1);
	}

	#[test]
	fn test_resolve_unknown_token() {
		let store = SessionStore::new();
		assert!(store.resolve(Some(&SessionToken::new())).is_none());
		let (token, _) = store.resolve(None).unwrap();
		assert!(store.resolve(Some(&token)).is_some());
	}

	#[tokio::test]
	async fn test_idle_sessions_are_evicted() {
		let store = SessionStore::new();
		for _ in 0..10 {
			store.resolve(None);
		}
		assert_eq!(store.evict_idle(Duration::from_secs(3600)), 0);
		assert_eq!(store.len(), 10);

		let (busy_token, busy) = store.create();
		let guard = busy.lock().await;
		assert_eq!(store.evict_idle(Duration::ZERO), 10);
		assert_eq!(store.len(), 1);
		assert!(store.get(&busy_token).is_some());

		drop(guard);
		assert_eq!(store.evict_idle(Duration::ZERO), 1);
		assert!(store.is_empty());
	}

	#[test]
	fn test_touch_resets_idle_time() {
		let mut session = Session::new();
		std::thread::sleep(Duration::from_millis(20));
		assert!(session.idle_for() >= Duration::from_millis(20));
		session.touch();
		assert!(session.idle_for() < Duration::from_millis(20));
	}

	#[test]
	fn test_turn_serializes_with_kind_tag() {
		let turn = Turn::tool_result("call_1", "No ads found.");
		let value = serde_json::to_value(&turn).unwrap();
		assert_eq!(value["kind"], "tool_result");
		assert_eq!(value["invocation_id"], "call_1");
	}
}
