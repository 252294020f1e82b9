//! LLM-backed reply generation
//!
//! Talks to an `OpenAI`-compatible chat completion API and keeps a short
//! rolling history so replies stay coherent across a conversation.

use crate::{constants::limits, states::ChatConfig};
use anyhow::{anyhow, Context as _};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::RwLock;

/// One message of a conversation, API wire format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ChatMessage {
	/// `system`, `user` or `assistant`
	role: String,
	/// The message text
	content: String,
}

/// Request body for the chat completion endpoint
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
	/// Model identifier
	model: &'a str,
	/// System prompt, history, then the new user message
	messages: Vec<ChatMessage>,
	/// Reply length cap
	max_tokens: u32,
	/// Sampling temperature
	temperature: f32,
	/// Nucleus sampling parameter
	top_p: f32,
	/// Penalty applied to tokens already present in the conversation
	presence_penalty: f32,
	/// Penalty applied proportionally to token frequency
	frequency_penalty: f32,
}

/// Response body of the chat completion endpoint
#[derive(Debug, Deserialize)]
struct CompletionResponse {
	/// Completion candidates, we only ever request one
	choices: Vec<CompletionChoice>,
}

/// One completion candidate
#[derive(Debug, Deserialize)]
struct CompletionChoice {
	/// The generated message
	message: ChatMessage,
}

/// Generates in-character replies and explanations
pub(crate) struct Chat {
	/// Completion settings and credentials
	config: ChatConfig,
	/// Shared HTTPS client
	http: reqwest::Client,
	/// Rolling window of the latest exchanges
	history: RwLock<VecDeque<ChatMessage>>,
}

impl Chat {
	/// Wire a reply generator up to its API
	pub(crate) fn new(config: ChatConfig, http: reqwest::Client) -> Self {
		Self {
			config,
			http,
			history: RwLock::new(VecDeque::new()),
		}
	}

	/// Generate a reply to a message that mentioned the bot
	pub(crate) async fn generate_reply(&self, author: &str, message: &str) -> String {
		let prompt = format!("{}: {}", sanitize_author(author), message);

		match self.complete(&prompt).await {
			Ok(reply) => reply,
			Err(error) => {
				tracing::error!(?error, "reply generation failed");
				"I'm sorry, I encountered an error while generating a reply.".to_owned()
			}
		}
	}

	/// Generate a simpler, more informative explanation of a message
	pub(crate) async fn generate_explanation(&self, message: &str) -> String {
		let prompt = format!(
			"Please explain the following message in a simpler, more informative way, \
			 as if for someone who might not understand the context or jargon: '{message}'"
		);

		match self.complete(&prompt).await {
			Ok(explanation) => explanation,
			Err(error) => {
				tracing::error!(?error, "explanation generation failed");
				"I'm sorry, I encountered an error while generating an explanation.".to_owned()
			}
		}
	}

	/// Run one completion round-trip and fold it into the history
	async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
		let user_message = ChatMessage {
			role: "user".to_owned(),
			content: prompt.to_owned(),
		};

		let mut messages = vec![ChatMessage {
			role: "system".to_owned(),
			content: self.config.system_prompt.clone(),
		}];
		messages.extend(self.history.read().await.iter().cloned());
		messages.push(user_message.clone());

		let request = CompletionRequest {
			model: &self.config.model,
			messages,
			max_tokens: self.config.max_tokens,
			temperature: self.config.temperature,
			top_p: self.config.top_p,
			presence_penalty: self.config.presence_penalty,
			frequency_penalty: self.config.frequency_penalty,
		};

		let response = self
			.http
			.post(format!("{}/chat/completions", self.config.base_url))
			.bearer_auth(self.config.api_key.expose_secret())
			.json(&request)
			.send()
			.await
			.context("completion request failed")?
			.error_for_status()
			.context("completion endpoint returned an error status")?
			.json::<CompletionResponse>()
			.await
			.context("completion response did not parse")?;

		let reply = response
			.choices
			.into_iter()
			.next()
			.map(|choice| choice.message)
			.ok_or_else(|| anyhow!("completion response contained no choices"))?;

		tracing::debug!(reply = reply.content.as_str(), "reply generated");

		let mut history = self.history.write().await;
		history.push_back(user_message);
		history.push_back(reply.clone());
		while history.len() > limits::CHAT_HISTORY_LEN {
			history.pop_front();
		}

		Ok(reply.content)
	}
}

/// Strip everything but word characters out of an author name
///
/// Model APIs are picky about participant names, and Discord display names
/// can contain almost anything.
pub(crate) fn sanitize_author(name: &str) -> String {
	let sanitized: String = name
		.chars()
		.map(|c| if c == ' ' { '_' } else { c })
		.filter(|c| c.is_ascii_alphanumeric() || *c == '_')
		.collect();

	if sanitized.is_empty() {
		"discord_user".to_owned()
	} else {
		sanitized
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn author_names_lose_odd_characters() {
		assert_eq!(sanitize_author("Jean-Luc Picard"), "JeanLuc_Picard");
		assert_eq!(sanitize_author("émoji🎲player"), "mojiplayer");
		assert_eq!(sanitize_author("plain_name42"), "plain_name42");
	}

	#[test]
	fn empty_author_falls_back() {
		assert_eq!(sanitize_author(""), "discord_user");
		assert_eq!(sanitize_author("🎲🎲"), "discord_user");
	}
}
