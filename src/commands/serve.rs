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

//! HTTP JSON API
//!
//! - POST   /sessions      - Create a session
//! - GET    /sessions/:id  - Transcript and state of a session
//! - DELETE /sessions/:id  - Drop a session
//! - POST   /ask           - Send a chat message
//! - POST   /form          - Submit a manual search form
//! - GET    /health        - Health check

use crate::config::ServerConfig;
use crate::search::SearchVariant;
use crate::session::{
	Controller, FormSubmission, SessionStore, SessionToken, SharedSession, Transcript, Turn,
	UserAction,
};
use anyhow::{anyhow, Result};
use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::{IntoResponse, Json, Response},
	routing::{get, post},
	Router,
};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower_http::cors::{Any, CorsLayer};

#[derive(Args, Debug)]
pub struct ServeArgs {
	/// Address to listen on, overrides [server] bind from the config
	#[arg(long, value_name = "ADDR")]
	pub bind: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
	pub controller: Arc<Controller>,
	pub sessions: Arc<SessionStore>,
}

impl AppState {
	pub fn new(controller: Arc<Controller>) -> Self {
		Self {
			controller,
			sessions: Arc::new(SessionStore::new()),
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
	pub session_id: Option<String>,
	pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct FormRequest {
	pub session_id: Option<String>,
	pub variant: SearchVariant,
	#[serde(default)]
	pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
	pub session_id: SessionToken,
	/// Assistant and search text of the new turns, joined
	pub response: String,
	pub turns: Vec<Turn>,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
	pub session_id: SessionToken,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
	pub session_id: SessionToken,
	pub state: &'static str,
	pub created_at: u64,
	pub transcript: Transcript,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
	pub status: &'static str,
	pub version: &'static str,
	pub sessions: usize,
}

/// JSON error body with a status code
#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	message: String,
}

impl ApiError {
	fn unknown_session(id: &str) -> Self {
		Self {
			status: StatusCode::NOT_FOUND,
			message: format!("Unknown session: {}", id),
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = Json(serde_json::json!({ "error": self.message }));
		(self.status, body).into_response()
	}
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/sessions", post(create_session))
		.route("/sessions/:id", get(get_session).delete(delete_session))
		.route("/ask", post(ask))
		.route("/form", post(submit_form))
		.route("/health", get(health))
		.layer(
			CorsLayer::new()
				.allow_origin(Any)
				.allow_methods(Any)
				.allow_headers(Any),
		)
		.with_state(state)
}

/// Periodically drop sessions idle for longer than `ttl`
pub fn spawn_session_reaper(sessions: Arc<SessionStore>, ttl: Duration) -> JoinHandle<()> {
	let period = ttl.min(Duration::from_secs(60)).max(Duration::from_millis(10));
	tokio::spawn(async move {
		let mut interval = tokio::time::interval(period);
		interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
		loop {
			interval.tick().await;
			let evicted = sessions.evict_idle(ttl);
			if evicted > 0 {
				log_debug!("Evicted {} idle sessions, {} remain", evicted, sessions.len());
			}
		}
	})
}

pub async fn run(args: &ServeArgs, server: &ServerConfig, controller: Arc<Controller>) -> Result<()> {
	let bind = args.bind.as_deref().unwrap_or(&server.bind);
	let listener = tokio::net::TcpListener::bind(bind)
		.await
		.map_err(|e| anyhow!("Failed to bind {}: {}", bind, e))?;

	log_info!("Listening on http://{}", listener.local_addr()?);

	let state = AppState::new(controller);
	let reaper = spawn_session_reaper(
		state.sessions.clone(),
		Duration::from_secs(server.session_ttl_seconds),
	);

	let result = axum::serve(listener, router(state))
		.with_graceful_shutdown(async {
			let _ = tokio::signal::ctrl_c().await;
		})
		.await
		.map_err(|e| anyhow!("Server error: {}", e));

	reaper.abort();
	result
}

fn lookup_session(state: &AppState, id: &str) -> Result<(SessionToken, SharedSession), ApiError> {
	let token = id
		.parse::<SessionToken>()
		.map_err(|_| ApiError::unknown_session(id))?;
	state
		.sessions
		.get(&token)
		.map(|session| (token, session))
		.ok_or_else(|| ApiError::unknown_session(id))
}

/// Existing session for the given id, or a new one when none is given
fn resolve_session(
	state: &AppState,
	id: Option<&str>,
) -> Result<(SessionToken, SharedSession), ApiError> {
	match id.map(str::trim).filter(|id| !id.is_empty()) {
		Some(id) => lookup_session(state, id),
		None => Ok(state.sessions.create()),
	}
}

async fn run_action(
	state: &AppState,
	session_id: Option<&str>,
	action: UserAction,
) -> Result<Json<TurnResponse>, ApiError> {
	let (token, session) = resolve_session(state, session_id)?;
	let mut session = session.lock().await;
	let turns = state.controller.handle(&mut session, action).await;

	let response = turns
		.iter()
		.filter(|turn| matches!(turn, Turn::Assistant { .. } | Turn::ToolResult { .. }))
		.map(Turn::display_text)
		.collect::<Vec<_>>()
		.join("\n\n");

	Ok(Json(TurnResponse {
		session_id: token,
		response,
		turns,
	}))
}

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<CreateSessionResponse>) {
	let (session_id, _) = state.sessions.create();
	(StatusCode::CREATED, Json(CreateSessionResponse { session_id }))
}

async fn get_session(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
	let (session_id, session) = lookup_session(&state, &id)?;
	let session = session.lock().await;
	Ok(Json(SessionResponse {
		session_id,
		state: session.state.name(),
		created_at: session.created_at,
		transcript: session.transcript.clone(),
	}))
}

async fn delete_session(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
	let (token, _) = lookup_session(&state, &id)?;
	state.sessions.remove(&token);
	log_debug!("Deleted session {}", token);
	Ok(StatusCode::NO_CONTENT)
}

async fn ask(
	State(state): State<AppState>,
	Json(request): Json<AskRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
	run_action(
		&state,
		request.session_id.as_deref(),
		UserAction::ChatMessage(request.message),
	)
	.await
}

async fn submit_form(
	State(state): State<AppState>,
	Json(request): Json<FormRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
	run_action(
		&state,
		request.session_id.as_deref(),
		UserAction::FormSubmission(FormSubmission::new(request.variant, request.fields)),
	)
	.await
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
	Json(HealthResponse {
		status: "ok",
		version: env!("CARGO_PKG_VERSION"),
		sessions: state.sessions.len(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::lookup::Lookups;
	use crate::providers::{ChatModel, ModelReply};
	use crate::search::{SearchParameters, SearchService, ToolDefinition};
	use async_trait::async_trait;
	use serde_json::{json, Value};
	use std::sync::atomic::{AtomicUsize, Ordering};

	struct EchoModel;

	#[async_trait]
	impl ChatModel for EchoModel {
		fn name(&self) -> &str {
			"echo"
		}

		async fn complete(
			&self,
			_system_prompt: &str,
			transcript: &[Turn],
			_tools: &[ToolDefinition],
		) -> anyhow::Result<ModelReply> {
			let last = transcript.last().map(Turn::display_text).unwrap_or_default();
			Ok(ModelReply::Text(format!("You said: {}", last)))
		}
	}

	#[derive(Default)]
	struct CountingSearch {
		calls: AtomicUsize,
	}

	#[async_trait]
	impl SearchService for CountingSearch {
		async fn search(&self, parameters: &SearchParameters) -> String {
			self.calls.fetch_add(1, Ordering::SeqCst);
			format!("searched {}", parameters.variant().key())
		}
	}

	async fn spawn_app() -> (String, Arc<CountingSearch>) {
		let search = Arc::new(CountingSearch::default());
		let controller = Arc::new(Controller::new(
			Arc::new(EchoModel),
			search.clone(),
			Arc::new(Lookups::bundled().unwrap()),
			true,
		));
		let app = router(AppState::new(controller));

		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, app).await.unwrap();
		});

		(format!("http://{}", addr), search)
	}

	#[tokio::test]
	async fn test_ask_creates_session_and_keeps_it() {
		let (base, _) = spawn_app().await;
		let client = reqwest::Client::new();

		let first: Value = client
			.post(format!("{}/ask", base))
			.json(&json!({"message": "hello"}))
			.send()
			.await
			.unwrap()
			.json()
			.await
			.unwrap();
		assert_eq!(first["response"], "You said: hello");
		let session_id = first["session_id"].as_str().unwrap().to_string();

		let second: Value = client
			.post(format!("{}/ask", base))
			.json(&json!({"session_id": session_id, "message": "again"}))
			.send()
			.await
			.unwrap()
			.json()
			.await
			.unwrap();
		assert_eq!(second["session_id"], session_id.as_str());

		let session: Value = client
			.get(format!("{}/sessions/{}", base, session_id))
			.send()
			.await
			.unwrap()
			.json()
			.await
			.unwrap();
		assert_eq!(session["state"], "collecting");
		assert_eq!(session["transcript"].as_array().unwrap().len(), 4);
	}

	#[tokio::test]
	async fn test_form_runs_search() {
		let (base, search) = spawn_app().await;
		let client = reqwest::Client::new();

		let response: Value = client
			.post(format!("{}/form", base))
			.json(&json!({"variant": "naver", "fields": {"query": "coffee"}}))
			.send()
			.await
			.unwrap()
			.json()
			.await
			.unwrap();
		assert_eq!(response["response"], "searched naver");
		assert_eq!(search.calls.load(Ordering::SeqCst), 1);

		let kinds: Vec<&str> = response["turns"]
			.as_array()
			.unwrap()
			.iter()
			.map(|t| t["kind"].as_str().unwrap())
			.collect();
		assert_eq!(kinds, vec!["user", "tool_request", "tool_result"]);
	}

	#[tokio::test]
	async fn test_unknown_session_is_not_found() {
		let (base, _) = spawn_app().await;
		let client = reqwest::Client::new();

		let response = client
			.post(format!("{}/ask", base))
			.json(&json!({"session_id": SessionToken::new().to_string(), "message": "hi"}))
			.send()
			.await
			.unwrap();
		assert_eq!(response.status().as_u16(), 404);
		let body: Value = response.json().await.unwrap();
		assert!(body["error"].as_str().unwrap().starts_with("Unknown session"));

		let response = client
			.get(format!("{}/sessions/not-a-session", base))
			.send()
			.await
			.unwrap();
		assert_eq!(response.status().as_u16(), 404);
	}

	#[tokio::test]
	async fn test_delete_session() {
		let (base, _) = spawn_app().await;
		let client = reqwest::Client::new();

		let created: Value = client
			.post(format!("{}/sessions", base))
			.send()
			.await
			.unwrap()
			.json()
			.await
			.unwrap();
		let session_id = created["session_id"].as_str().unwrap();

		let url = format!("{}/sessions/{}", base, session_id);
		assert_eq!(client.delete(&url).send().await.unwrap().status().as_u16(), 204);
		assert_eq!(client.delete(&url).send().await.unwrap().status().as_u16(), 404);
	}

	#[tokio::test]
	async fn test_reaper_drops_idle_sessions() {
		let sessions = Arc::new(SessionStore::new());
		for _ in 0..5 {
			sessions.resolve(None);
		}
		assert_eq!(sessions.len(), 5);

		let reaper = spawn_session_reaper(sessions.clone(), Duration::from_millis(20));
		for _ in 0..100 {
			if sessions.is_empty() {
				break;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
		reaper.abort();
		assert!(sessions.is_empty());
	}

	#[tokio::test]
	async fn test_health() {
		let (base, _) = spawn_app().await;
		let body: Value = reqwest::get(format!("{}/health", base))
			.await
			.unwrap()
			.json()
			.await
			.unwrap();
		assert_eq!(body["status"], "ok");
	}
}
