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

//! Conversation Controller
//!
//! Drives one session from parameter collection to a search result. Every
//! user action goes through [`Controller::handle`], which appends to the
//! transcript and leaves the session in `Collecting`, `Confirming` or `Done`:
//!
//! ```text
//! Collecting ──form──────────────► Formatting ──► Executing ──► Done
//!     │                                │   ▲
//!     └──chat: tool call proposal──────┘   │ (affirmative reply)
//!                                      Confirming
//! ```
//!
//! Validation problems, model failures and upstream errors all become turns;
//! nothing is returned as an error.

use super::prompt::system_prompt;
use super::{ConversationState, Session, Turn};
use crate::lookup::Lookups;
use crate::providers::{ChatModel, ModelReply, ProposedToolCall};
use crate::search::{
	get_all_tools, InvocationSource, ParameterError, SearchParameters, SearchService,
	SearchVariant, ToolDefinition, ToolInvocation,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

const CONFIRMATION_QUESTION: &str =
	"Shall I proceed to search with these parameters? Please say 'yes' to confirm or tell me what to change.";

const AFFIRMATIVE_REPLIES: &[&str] = &[
	"yes", "y", "yep", "yeah", "sure", "ok", "okay", "proceed", "go ahead", "do it",
];

/// A manual form submitted for one variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSubmission {
	pub variant: SearchVariant,
	pub fields: BTreeMap<String, String>,
}

impl FormSubmission {
	pub fn new(variant: SearchVariant, fields: BTreeMap<String, String>) -> Self {
		Self { variant, fields }
	}

	/// Fields with a non-blank value
	fn filled(&self) -> impl Iterator<Item = (&String, &String)> {
		self.fields.iter().filter(|(_, value)| !value.trim().is_empty())
	}

	/// User turn text recording what was submitted
	fn summary(&self) -> String {
		let mut summary = format!("Manual input submitted ({}):", self.variant.label());
		for (name, value) in self.filled() {
			summary.push_str(&format!("\n{}: {}", name, value.trim()));
		}
		summary
	}

	/// JSON text of the submitted fields, for the tool request turn
	fn arguments_json(&self) -> String {
		let arguments: serde_json::Map<String, Value> = self
			.filled()
			.map(|(name, value)| (name.clone(), Value::String(value.trim().to_string())))
			.collect();
		Value::Object(arguments).to_string()
	}
}

/// The single input event the controller consumes
#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
	ChatMessage(String),
	FormSubmission(FormSubmission),
}

pub struct Controller {
	model: Arc<dyn ChatModel>,
	search: Arc<dyn SearchService>,
	lookups: Arc<Lookups>,
	tools: Vec<ToolDefinition>,
	system_prompt: String,
	require_confirmation: bool,
}

impl Controller {
	pub fn new(
		model: Arc<dyn ChatModel>,
		search: Arc<dyn SearchService>,
		lookups: Arc<Lookups>,
		require_confirmation: bool,
	) -> Self {
		Self {
			model,
			search,
			lookups,
			tools: get_all_tools(),
			system_prompt: system_prompt(),
			require_confirmation,
		}
	}

	/// Process one user action to completion
	///
	/// Returns the turns appended to the transcript by this action.
	pub async fn handle(&self, session: &mut Session, action: UserAction) -> Vec<Turn> {
		session.touch();
		let start = session.transcript.len();
		let mut state = self.accept(session, action).await;

		loop {
			log_debug!("Session {} -> {}", session.token, state.name());
			state = match state {
				ConversationState::Formatting(invocation) => self.format(session, invocation),
				ConversationState::Executing(invocation) => {
					self.execute(session, invocation).await;
					ConversationState::Done
				}
				settled => {
					session.state = settled;
					break;
				}
			};
		}

		session.transcript.since(start).to_vec()
	}

	/// Record the action and decide the first transition
	async fn accept(&self, session: &mut Session, action: UserAction) -> ConversationState {
		let previous = std::mem::take(&mut session.state);

		match action {
			UserAction::FormSubmission(form) => {
				if let Some(pending) = previous.pending() {
					log_debug!(
						"Manual submission replaces pending {} call {}",
						pending.variant().key(),
						pending.id
					);
				}
				session.transcript.push(Turn::user(form.summary()));
				self.accept_form(session, form)
			}
			UserAction::ChatMessage(text) => {
				session.transcript.push(Turn::user(text.clone()));
				if let ConversationState::Confirming(invocation) = previous {
					if is_affirmative(&text) {
						return ConversationState::Executing(invocation);
					}
					log_debug!("Confirmation declined, dropping call {}", invocation.id);
				}
				self.collect(session).await
			}
		}
	}

	fn accept_form(&self, session: &mut Session, form: FormSubmission) -> ConversationState {
		let parameters = match SearchParameters::from_form(form.variant, &form.fields) {
			Ok(parameters) => parameters,
			Err(e) => return self.reject(session, e),
		};

		let invocation = ToolInvocation::new(parameters, InvocationSource::Form);
		session.transcript.push(Turn::tool_request(
			invocation.id.clone(),
			form.variant.tool_name(),
			form.arguments_json(),
		));

		match invocation.parameters.missing_required() {
			Some(e) => self.reject(session, e),
			None => ConversationState::Formatting(invocation),
		}
	}

	/// Ask the chat model for the next step
	async fn collect(&self, session: &mut Session) -> ConversationState {
		let reply = match self
			.model
			.complete(&self.system_prompt, session.transcript.turns(), &self.tools)
			.await
		{
			Ok(reply) => reply,
			Err(e) => {
				log_debug!("Chat model {} failed: {}", self.model.name(), e);
				session.transcript.push(Turn::assistant(format!(
					"Sorry, I couldn't reach the assistant: {}",
					e
				)));
				return ConversationState::Collecting;
			}
		};

		match reply {
			ModelReply::Text(text) => {
				session.transcript.push(Turn::assistant(text));
				ConversationState::Collecting
			}
			ModelReply::ToolCall(call) => self.accept_tool_call(session, call),
		}
	}

	fn accept_tool_call(&self, session: &mut Session, call: ProposedToolCall) -> ConversationState {
		if !call.content.trim().is_empty() {
			session.transcript.push(Turn::assistant(call.content.clone()));
		}
		session.transcript.push(Turn::tool_request(
			call.id.clone(),
			call.name.clone(),
			call.arguments.clone(),
		));

		let Some(variant) = SearchVariant::from_tool_name(&call.name) else {
			let error = ParameterError::UnknownTool(call.name.clone());
			session
				.transcript
				.push(Turn::tool_result(call.id, error.to_string()));
			return ConversationState::Collecting;
		};

		let arguments = if call.arguments.trim().is_empty() {
			Ok(Value::Null)
		} else {
			serde_json::from_str::<Value>(&call.arguments)
		};
		let parameters = arguments
			.map_err(|e| ParameterError::MalformedArguments {
				tool: variant.tool_name(),
				reason: e.to_string(),
			})
			.and_then(|arguments| SearchParameters::from_arguments(variant, arguments));

		let parameters = match parameters {
			Ok(parameters) => parameters,
			Err(e) => return self.reject(session, e),
		};

		if let Some(e) = parameters.missing_required() {
			return self.reject(session, e);
		}

		ConversationState::Formatting(ToolInvocation::with_id(
			call.id,
			parameters,
			InvocationSource::Chat,
		))
	}

	/// Normalize parameters into wire form and decide whether to confirm
	fn format(&self, session: &mut Session, mut invocation: ToolInvocation) -> ConversationState {
		if let Err(e) = invocation.parameters.normalize(&self.lookups) {
			return self.reject(session, e);
		}

		if invocation.source == InvocationSource::Chat && self.require_confirmation {
			session.transcript.push(Turn::assistant(format!(
				"{} parameters:\n{}\n\n{}",
				invocation.variant().label(),
				invocation.parameters.summary(&self.lookups),
				CONFIRMATION_QUESTION
			)));
			return ConversationState::Confirming(invocation);
		}

		ConversationState::Executing(invocation)
	}

	async fn execute(&self, session: &mut Session, invocation: ToolInvocation) {
		log_debug!(
			"Running {} search {}",
			invocation.variant().key(),
			invocation.id
		);
		let result = self.search.search(&invocation.parameters).await;
		session
			.transcript
			.push(Turn::tool_result(invocation.id, result));
	}

	fn reject(&self, session: &mut Session, error: ParameterError) -> ConversationState {
		log_debug!("Rejected parameters: {}", error);
		session.transcript.push(Turn::assistant(error.to_string()));
		ConversationState::Collecting
	}
}

fn is_affirmative(reply: &str) -> bool {
	let normalized = reply
		.trim()
		.trim_end_matches(|c: char| c.is_ascii_punctuation())
		.trim()
		.to_lowercase();
	AFFIRMATIVE_REPLIES.contains(&normalized.as_str())
}

#[cfg(test)]
mod tests {
	use super::*;
	use anyhow::{anyhow, Result};
	use async_trait::async_trait;
	use parking_lot::Mutex;
	use std::collections::VecDeque;
	use std::sync::atomic::{AtomicUsize, Ordering};

	/// Chat model that replays scripted replies in order
	struct ScriptedModel {
		replies: Mutex<VecDeque<Result<ModelReply>>>,
		calls: AtomicUsize,
	}

	impl ScriptedModel {
		fn new(replies: Vec<Result<ModelReply>>) -> Arc<Self> {
			Arc::new(Self {
				replies: Mutex::new(replies.into()),
				calls: AtomicUsize::new(0),
			})
		}
	}

	#[async_trait]
	impl ChatModel for ScriptedModel {
		fn name(&self) -> &str {
			"scripted"
		}

		async fn complete(
			&self,
			_system_prompt: &str,
			_transcript: &[Turn],
			_tools: &[ToolDefinition],
		) -> Result<ModelReply> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.replies
				.lock()
				.pop_front()
				.unwrap_or_else(|| Ok(ModelReply::Text("What would you like to search?".into())))
		}
	}

	/// Search service that records every call
	struct RecordingSearch {
		calls: Mutex<Vec<SearchParameters>>,
		response: String,
	}

	impl RecordingSearch {
		fn new(response: &str) -> Arc<Self> {
			Arc::new(Self {
				calls: Mutex::new(Vec::new()),
				response: response.to_string(),
			})
		}

		fn call_count(&self) -> usize {
			self.calls.lock().len()
		}
	}

	#[async_trait]
	impl SearchService for RecordingSearch {
		async fn search(&self, parameters: &SearchParameters) -> String {
			self.calls.lock().push(parameters.clone());
			self.response.clone()
		}
	}

	fn tool_call(id: &str, name: &str, arguments: &str) -> Result<ModelReply> {
		Ok(ModelReply::ToolCall(ProposedToolCall {
			id: id.to_string(),
			name: name.to_string(),
			arguments: arguments.to_string(),
			content: String::new(),
		}))
	}

	fn controller(
		model: Arc<ScriptedModel>,
		search: Arc<RecordingSearch>,
		require_confirmation: bool,
	) -> Controller {
		Controller::new(
			model,
			search,
			Arc::new(Lookups::bundled().unwrap()),
			require_confirmation,
		)
	}

	fn form(variant: SearchVariant, fields: &[(&str, &str)]) -> UserAction {
		UserAction::FormSubmission(FormSubmission::new(
			variant,
			fields
				.iter()
				.map(|(k, v)| (k.to_string(), v.to_string()))
				.collect(),
		))
	}

	fn chat(text: &str) -> UserAction {
		UserAction::ChatMessage(text.to_string())
	}

	#[tokio::test]
	async fn test_plain_reply_stays_collecting() {
		let model = ScriptedModel::new(vec![Ok(ModelReply::Text("Which brand?".into()))]);
		let search = RecordingSearch::new("unused");
		let controller = controller(model.clone(), search.clone(), true);
		let mut session = Session::new();

		let turns = controller.handle(&mut session, chat("show me some ads")).await;
		assert_eq!(turns.len(), 2);
		assert!(matches!(turns[1], Turn::Assistant { .. }));
		assert_eq!(turns[1].display_text(), "Which brand?");
		assert_eq!(session.state, ConversationState::Collecting);
		assert_eq!(search.call_count(), 0);
	}

	#[tokio::test]
	async fn test_chat_flow_with_confirmation() {
		let model = ScriptedModel::new(vec![tool_call(
			"call_1",
			"google_ads_transparency_search",
			r#"{"text": "apple", "region": "Australia"}"#,
		)]);
		let search = RecordingSearch::new("**Ad #1**");
		let controller = controller(model, search.clone(), true);
		let mut session = Session::new();

		let turns = controller
			.handle(&mut session, chat("apple ads in Australia"))
			.await;
		assert!(turns
			.last()
			.unwrap()
			.display_text()
			.contains("Shall I proceed"));
		assert!(turns.last().unwrap().display_text().contains("\"region\": \"2036\""));
		assert_eq!(session.state.name(), "confirming");
		assert_eq!(search.call_count(), 0);

		let turns = controller.handle(&mut session, chat("Yes!")).await;
		assert_eq!(turns.len(), 2);
		match &turns[1] {
			Turn::ToolResult {
				invocation_id,
				content,
				..
			} => {
				assert_eq!(invocation_id, "call_1");
				assert_eq!(content, "**Ad #1**");
			}
			other => panic!("expected tool result, got {:?}", other),
		}
		assert_eq!(session.state, ConversationState::Done);
		assert_eq!(search.call_count(), 1);

		let calls = search.calls.lock();
		match &calls[0] {
			SearchParameters::Transparency(p) => {
				assert_eq!(p.text.as_deref(), Some("apple"));
				assert_eq!(p.region.as_deref(), Some("2036"));
			}
			other => panic!("unexpected parameters: {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_declined_confirmation_returns_to_collecting() {
		let model = ScriptedModel::new(vec![
			tool_call("call_1", "naver_ads_search", r#"{"query": "coffee"}"#),
			Ok(ModelReply::Text("Sure, what should the query be?".into())),
		]);
		let search = RecordingSearch::new("unused");
		let controller = controller(model.clone(), search.clone(), true);
		let mut session = Session::new();

		controller.handle(&mut session, chat("naver coffee ads")).await;
		assert_eq!(session.state.name(), "confirming");

		let turns = controller
			.handle(&mut session, chat("no, change the query"))
			.await;
		assert_eq!(
			turns.last().unwrap().display_text(),
			"Sure, what should the query be?"
		);
		assert_eq!(session.state, ConversationState::Collecting);
		assert_eq!(model.calls.load(Ordering::SeqCst), 2);
		assert_eq!(search.call_count(), 0);
	}

	#[tokio::test]
	async fn test_without_confirmation_executes_immediately() {
		let model = ScriptedModel::new(vec![tool_call(
			"call_9",
			"youtube_ads_search",
			r#"{"search_query": "protein"}"#,
		)]);
		let search = RecordingSearch::new("done");
		let controller = controller(model, search.clone(), false);
		let mut session = Session::new();

		controller.handle(&mut session, chat("youtube protein ads")).await;
		assert_eq!(session.state, ConversationState::Done);
		assert_eq!(search.call_count(), 1);
	}

	#[tokio::test]
	async fn test_empty_transparency_parameters_never_execute() {
		let model = ScriptedModel::new(vec![tool_call(
			"call_1",
			"google_ads_transparency_search",
			"{}",
		)]);
		let search = RecordingSearch::new("unused");
		let controller = controller(model, search.clone(), false);
		let mut session = Session::new();

		let turns = controller.handle(&mut session, chat("search please")).await;
		let last = turns.last().unwrap().display_text();
		assert!(last.contains("advertiser_id or a text search phrase"), "got: {}", last);
		assert_eq!(session.state, ConversationState::Collecting);
		assert_eq!(search.call_count(), 0);

		let turns = controller
			.handle(&mut session, form(SearchVariant::Transparency, &[("text", "  ")]))
			.await;
		assert!(turns
			.last()
			.unwrap()
			.display_text()
			.contains("advertiser_id or a text search phrase"));
		assert_eq!(session.state, ConversationState::Collecting);
		assert_eq!(search.call_count(), 0);
	}

	#[tokio::test]
	async fn test_unknown_region_is_rejected_with_its_name() {
		let model = ScriptedModel::new(vec![tool_call(
			"call_1",
			"google_ads_transparency_search",
			r#"{"text": "apple", "region": "Atlantis"}"#,
		)]);
		let search = RecordingSearch::new("unused");
		let controller = controller(model, search.clone(), false);
		let mut session = Session::new();

		let turns = controller.handle(&mut session, chat("apple in Atlantis")).await;
		let last = turns.last().unwrap();
		assert!(matches!(last, Turn::Assistant { .. }));
		assert!(last.display_text().contains("Invalid region name: Atlantis"));
		assert_eq!(session.state, ConversationState::Collecting);
		assert_eq!(search.call_count(), 0);
	}

	#[tokio::test]
	async fn test_malformed_arguments_are_reported() {
		let model = ScriptedModel::new(vec![
			tool_call("call_1", "naver_ads_search", "{not json"),
			tool_call("call_2", "naver_ads_search", r#"{"query": "a", "num": "lots"}"#),
		]);
		let search = RecordingSearch::new("unused");
		let controller = controller(model, search.clone(), false);
		let mut session = Session::new();

		for _ in 0..2 {
			let turns = controller.handle(&mut session, chat("go")).await;
			let last = turns.last().unwrap();
			assert!(matches!(last, Turn::Assistant { .. }));
			assert!(last.display_text().contains("could not be read"));
			assert_eq!(session.state, ConversationState::Collecting);
		}
		assert_eq!(search.call_count(), 0);
	}

	#[tokio::test]
	async fn test_unknown_tool_gets_a_result_turn() {
		let model = ScriptedModel::new(vec![tool_call("call_1", "bing_ads", r#"{"q": "a"}"#)]);
		let search = RecordingSearch::new("unused");
		let controller = controller(model, search.clone(), false);
		let mut session = Session::new();

		let turns = controller.handle(&mut session, chat("bing it")).await;
		match turns.last().unwrap() {
			Turn::ToolResult {
				invocation_id,
				content,
				..
			} => {
				assert_eq!(invocation_id, "call_1");
				assert_eq!(content, "Unknown tool: bing_ads");
			}
			other => panic!("expected tool result, got {:?}", other),
		}
		assert_eq!(session.state, ConversationState::Collecting);
		assert_eq!(search.call_count(), 0);
	}

	#[tokio::test]
	async fn test_model_failure_becomes_assistant_turn() {
		let model = ScriptedModel::new(vec![Err(anyhow!("connection reset"))]);
		let search = RecordingSearch::new("unused");
		let controller = controller(model, search, true);
		let mut session = Session::new();

		let turns = controller.handle(&mut session, chat("hello")).await;
		assert!(turns.last().unwrap().display_text().contains("connection reset"));
		assert_eq!(session.state, ConversationState::Collecting);
	}

	#[tokio::test]
	async fn test_form_submission_skips_chat_and_confirmation() {
		let model = ScriptedModel::new(vec![]);
		let search = RecordingSearch::new("three ads");
		let controller = controller(model.clone(), search.clone(), true);
		let mut session = Session::new();

		let turns = controller
			.handle(
				&mut session,
				form(
					SearchVariant::Transparency,
					&[("text", "apple"), ("region", "Australia"), ("platform", "")],
				),
			)
			.await;

		assert_eq!(turns.len(), 3);
		assert!(turns[0].is_user());
		assert!(turns[0].display_text().contains("text: apple"));
		assert!(!turns[0].display_text().contains("platform"));
		assert!(matches!(turns[1], Turn::ToolRequest { .. }));
		assert!(matches!(turns[2], Turn::ToolResult { .. }));
		assert_eq!(model.calls.load(Ordering::SeqCst), 0);
		assert_eq!(search.call_count(), 1);
		assert_eq!(session.state, ConversationState::Done);
	}

	#[tokio::test]
	async fn test_form_overrides_pending_chat_call() {
		let model = ScriptedModel::new(vec![tool_call(
			"chat_call",
			"naver_ads_search",
			r#"{"query": "coffee"}"#,
		)]);
		let search = RecordingSearch::new("result");
		let controller = controller(model, search.clone(), true);
		let mut session = Session::new();

		controller.handle(&mut session, chat("naver coffee")).await;
		assert!(session.state.pending().is_some());

		controller
			.handle(&mut session, form(SearchVariant::Naver, &[("query", "tea")]))
			.await;

		assert_eq!(search.call_count(), 1);
		match &search.calls.lock()[0] {
			SearchParameters::Naver(p) => assert_eq!(p.query.as_deref(), Some("tea")),
			other => panic!("unexpected parameters: {:?}", other),
		};
		assert_eq!(session.state, ConversationState::Done);

		// The replaced chat call never gets a result turn
		let chat_results = session
			.transcript
			.turns()
			.iter()
			.filter(|t| matches!(t, Turn::ToolResult { invocation_id, .. } if invocation_id == "chat_call"))
			.count();
		assert_eq!(chat_results, 0);
	}

	#[tokio::test]
	async fn test_error_result_is_appended_once() {
		let model = ScriptedModel::new(vec![]);
		let search = RecordingSearch::new("SerpApi error: 500 - Internal Server Error");
		let controller = controller(model, search.clone(), true);
		let mut session = Session::new();

		controller
			.handle(&mut session, form(SearchVariant::Sponsored, &[("q", "shoes")]))
			.await;

		let results: Vec<&Turn> = session
			.transcript
			.turns()
			.iter()
			.filter(|t| matches!(t, Turn::ToolResult { .. }))
			.collect();
		assert_eq!(results.len(), 1);
		assert!(results[0].display_text().contains("500"));
		assert_eq!(session.state, ConversationState::Done);
	}

	#[tokio::test]
	async fn test_session_is_reusable_after_done() {
		let model = ScriptedModel::new(vec![Ok(ModelReply::Text("Anything else?".into()))]);
		let search = RecordingSearch::new("result");
		let controller = controller(model, search.clone(), true);
		let mut session = Session::new();

		controller
			.handle(&mut session, form(SearchVariant::Naver, &[("query", "tea")]))
			.await;
		controller
			.handle(&mut session, form(SearchVariant::Naver, &[("query", "tea")]))
			.await;
		assert_eq!(search.call_count(), 2);

		controller.handle(&mut session, chat("thanks")).await;
		assert_eq!(session.state, ConversationState::Collecting);
	}

	#[tokio::test]
	async fn test_form_with_invalid_value_is_rejected() {
		let model = ScriptedModel::new(vec![]);
		let search = RecordingSearch::new("unused");
		let controller = controller(model, search.clone(), true);
		let mut session = Session::new();

		let turns = controller
			.handle(
				&mut session,
				form(SearchVariant::Transparency, &[("text", "a"), ("num", "many")]),
			)
			.await;
		assert!(turns.last().unwrap().display_text().contains("num"));
		assert_eq!(session.state, ConversationState::Collecting);
		assert_eq!(search.call_count(), 0);
	}

	#[test]
	fn test_affirmative_replies() {
		assert!(is_affirmative("yes"));
		assert!(is_affirmative("  Yes! "));
		assert!(is_affirmative("go ahead."));
		assert!(!is_affirmative("yes but change the region"));
		assert!(!is_affirmative("no"));
	}
}
