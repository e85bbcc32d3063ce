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

//! Chat model providers
//!
//! The conversation controller only sees the `ChatModel` trait: it hands over
//! the system prompt, the transcript and the declared tools, and gets back
//! either plain text or one structured tool-call proposal.

use crate::search::ToolDefinition;
use crate::session::Turn;
use anyhow::Result;

pub mod openai;

pub use openai::OpenAiProvider;

/// A tool call proposed by the chat model, not yet validated
#[derive(Debug, Clone, PartialEq)]
pub struct ProposedToolCall {
	pub id: String,
	pub name: String,
	/// Raw JSON text of the arguments, exactly as the model produced it
	pub arguments: String,
	/// Text the model sent alongside the call, often empty
	pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
	Text(String),
	ToolCall(ProposedToolCall),
}

#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
	fn name(&self) -> &str;

	async fn complete(
		&self,
		system_prompt: &str,
		transcript: &[Turn],
		tools: &[ToolDefinition],
	) -> Result<ModelReply>;
}
