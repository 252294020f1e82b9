//! Handles all the states of the bot and initial configuration

use crate::{chat::Chat, constants::urls, music::MusicClient};
use anyhow::anyhow;
use dotenvy::dotenv;
use poise::{
	async_trait,
	serenity_prelude::{self as serenity},
	CreateReply, ReplyHandle,
};
use secrecy::SecretString;
use serde::Serialize;
use std::{
	env::{self, VarError},
	fmt,
	str::FromStr,
	sync::Arc,
};

/// App global configuration
#[derive(Debug)]
pub(crate) struct Config {
	/// The token needed to access the `Discord` Api
	pub(crate) discord_token: SecretString,
	/// Audio node coordinates, present when the music feature is enabled
	pub(crate) music: Option<MusicConfig>,
	/// Reply generation settings, present when the chat feature is enabled
	pub(crate) chat: Option<ChatConfig>,
	/// Image generation settings, present when the images feature is enabled
	pub(crate) images: Option<ImagesConfig>,
	/// `Notion` access, present when the scheduling feature is enabled
	pub(crate) scheduling: Option<SchedulingConfig>,
	/// Whether or not to use production defaults
	///
	/// Currently only affects logging
	pub(crate) production: bool,
}

/// Coordinates of the `Lavalink`-compatible audio node
#[derive(Debug)]
pub(crate) struct MusicConfig {
	/// Hostname of the audio node
	pub(crate) host: String,
	/// Port of the audio node
	pub(crate) port: u16,
	/// Shared secret of the audio node
	pub(crate) password: SecretString,
}

/// Settings for LLM-based reply generation
#[derive(Debug, Clone)]
pub(crate) struct ChatConfig {
	/// Model identifier sent to the completion API
	pub(crate) model: String,
	/// Bearer token for the completion API
	pub(crate) api_key: SecretString,
	/// Base url of an `OpenAI`-compatible API
	pub(crate) base_url: String,
	/// Persona instructions prepended to every conversation
	pub(crate) system_prompt: String,
	/// Sampling temperature
	pub(crate) temperature: f32,
	/// Nucleus sampling parameter
	pub(crate) top_p: f32,
	/// Penalty applied to tokens already present in the conversation
	pub(crate) presence_penalty: f32,
	/// Penalty applied proportionally to token frequency
	pub(crate) frequency_penalty: f32,
	/// Reply length cap
	pub(crate) max_tokens: u32,
}

/// Settings for image generation
#[derive(Debug)]
pub(crate) struct ImagesConfig {
	/// Bearer token for the images API
	pub(crate) api_key: SecretString,
	/// Model identifier sent to the images API
	pub(crate) model: String,
	/// Base url of an `OpenAI`-compatible API
	pub(crate) base_url: String,
	/// Rendering style passed through to the API
	pub(crate) style: ImageStyle,
}

/// The rendering style the images API accepts
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ImageStyle {
	/// More realistic, less saturated output
	Natural,
	/// Hyper-real, dramatic output
	Vivid,
}

/// Access to the `Notion` database holding the stream schedule
#[derive(Debug)]
pub(crate) struct SchedulingConfig {
	/// Base url of the `Notion` API
	pub(crate) base_url: String,
	/// Identifier of the schedule database
	pub(crate) database_id: String,
	/// Bearer token for the `Notion` API
	pub(crate) api_key: SecretString,
	/// Value of the `Notion-Version` header
	pub(crate) notion_version: String,
}

/// Resolve an environment variable or return an appropriate error
fn required_env_var(name: &str) -> anyhow::Result<String> {
	match env::var(name) {
		Ok(val) => Ok(val),
		Err(VarError::NotPresent) => Err(anyhow!("{} must be set in the environment", name)),
		Err(VarError::NotUnicode(_)) => {
			Err(anyhow!("{} does not contains Unicode valid text", name))
		}
	}
}

/// Parse an optional environment variable, falling back to a default
fn env_var_or<T: FromStr>(name: &str, default: T) -> anyhow::Result<T> {
	match env::var(name) {
		Ok(val) => val
			.parse::<T>()
			.map_err(|_| anyhow!("{} environment variable does not parse", name)),
		Err(_) => Ok(default),
	}
}

impl MusicConfig {
	/// Parse the section when every required variable is present
	fn from_env() -> anyhow::Result<Option<Self>> {
		let (Ok(host), Ok(port), Ok(password)) = (
			env::var("LAVALINK_HOST"),
			env::var("LAVALINK_PORT"),
			env::var("LAVALINK_PASSWORD"),
		) else {
			return Ok(None);
		};

		let port = port
			.parse::<u16>()
			.map_err(|_| anyhow!("LAVALINK_PORT environment variable must be a `u16`"))?;

		Ok(Some(Self {
			host,
			port,
			password: SecretString::from(password),
		}))
	}
}

impl ChatConfig {
	/// Parse the section when every required variable is present
	fn from_env() -> anyhow::Result<Option<Self>> {
		let (Ok(model), Ok(api_key)) = (env::var("LLM_MODEL"), env::var("LLM_API_KEY")) else {
			return Ok(None);
		};

		Ok(Some(Self {
			model,
			api_key: SecretString::from(api_key),
			base_url: env_var_or("LLM_BASE_URL", urls::OPENAI_API_BASE.to_owned())?,
			system_prompt: env_var_or(
				"LLM_SYSTEM_PROMPT",
				"You are Dolores, a sharp-tongued but good-natured Discord regular. \
				 Keep replies short and conversational."
					.to_owned(),
			)?,
			temperature: env_var_or("TEMPERATURE", 0.9)?,
			top_p: env_var_or("TOP_P", 1.0)?,
			presence_penalty: env_var_or("PRESENCE_PENALTY", 0.6)?,
			frequency_penalty: env_var_or("FREQUENCY_PENALTY", 0.0)?,
			max_tokens: env_var_or("MAX_TOKENS", 150)?,
		}))
	}
}

impl ImagesConfig {
	/// Parse the section when every required variable is present
	fn from_env() -> anyhow::Result<Option<Self>> {
		let (Ok(api_key), Ok(model)) = (env::var("OPENAI_API_KEY"), env::var("IMAGE_MODEL"))
		else {
			return Ok(None);
		};

		let style = match env::var("IMAGE_STYLE").as_deref() {
			Ok("vivid") => ImageStyle::Vivid,
			_ => ImageStyle::Natural,
		};

		Ok(Some(Self {
			api_key: SecretString::from(api_key),
			model,
			base_url: env_var_or("IMAGE_BASE_URL", urls::OPENAI_API_BASE.to_owned())?,
			style,
		}))
	}
}

impl SchedulingConfig {
	/// Parse the section when every required variable is present
	fn from_env() -> anyhow::Result<Option<Self>> {
		let (Ok(base_url), Ok(database_id), Ok(api_key), Ok(notion_version)) = (
			env::var("NOTION_BASE_URL"),
			env::var("NOTION_DATABASE_ID"),
			env::var("NOTION_API_KEY"),
			env::var("NOTION_VERSION"),
		) else {
			return Ok(None);
		};

		Ok(Some(Self {
			base_url,
			database_id,
			api_key: SecretString::from(api_key),
			notion_version,
		}))
	}
}

impl Config {
	/// Parse the config from the environment and an optional `.env` file
	pub(crate) fn from_dotenv() -> anyhow::Result<Self> {
		// A missing `.env` file is fine, variables may come from the environment
		let _ = dotenv();

		let production = env::var("PRODUCTION")
			.unwrap_or_else(|_| "false".into())
			.parse::<bool>()
			.map_err(|_| anyhow!("PRODUCTION environment variable must be a `bool`"))?;

		Ok(Self {
			discord_token: SecretString::from(required_env_var("DISCORD_API_KEY")?),
			music: MusicConfig::from_env()?,
			chat: ChatConfig::from_env()?,
			images: ImagesConfig::from_env()?,
			scheduling: SchedulingConfig::from_env()?,
			production,
		})
	}
}

/// App global data
pub(crate) struct Data {
	/// An instance of the parsed initial config
	pub(crate) config: Config,
	/// A shared HTTPS client for every outbound API call
	pub(crate) http: reqwest::Client,
	/// The reply generator, when the chat feature is enabled
	pub(crate) chat: Option<Chat>,
	/// The audio node client, when the music feature is enabled
	pub(crate) music: Option<MusicClient>,
}

impl fmt::Debug for Data {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Data")
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}

/// Trait for sending ephemeral messages
#[async_trait]
pub(crate) trait ContextPolyfill: Send + Sync {
	/// Send an ephemeral message to the user
	async fn shout(
		&self,
		content: impl Into<String> + Send,
	) -> Result<ReplyHandle<'_>, serenity::Error>;
}

#[async_trait]
impl ContextPolyfill for Context<'_> {
	#[inline]
	async fn shout(
		&self,
		content: impl Into<String> + Send,
	) -> Result<ReplyHandle<'_>, serenity::Error> {
		self.send(CreateReply::default().content(content).ephemeral(true))
			.await
	}
}

/// Common wrapper for the [`Data`]
pub(crate) type ArcData = Arc<Data>;
/// Common interaction or event error type
pub(crate) type InteractionError = Error;
/// Common interaction or event return type
pub(crate) type InteractionResult = Result<(), InteractionError>;

/// A [`poise::Command`] type alias with our common types
pub(crate) type Command = poise::Command<ArcData, InteractionError>;
/// A [`poise::Context`] type alias with our common types, provided to each command
pub(crate) type Context<'a> = poise::Context<'a, ArcData, InteractionError>;

/// A [`poise::Framework`] type alias with our common types
pub(crate) type Framework = poise::Framework<ArcData, InteractionError>;
/// A [`poise::FrameworkContext`] type alias with our common types
pub(crate) type FrameworkContext<'a> = poise::FrameworkContext<'a, ArcData, InteractionError>;
/// A [`poise::FrameworkError`] type alias with our common types
pub(crate) type FrameworkError<'a> = poise::FrameworkError<'a, ArcData, InteractionError>;

/// An error in an interaction or an event
#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
	/// A serenity error
	#[error(transparent)]
	Serenity(#[from] serenity::Error),
	/// An audio node error
	#[error(transparent)]
	Lavalink(#[from] lavalink_rs::error::LavalinkError),
	/// An outbound HTTP error
	#[error(transparent)]
	Http(#[from] reqwest::Error),
	/// Collects any other general purpose error
	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
	use super::*;

	// Feature sections read process-global environment variables, so the
	// whole gating behavior lives in a single test.
	#[test]
	fn music_section_requires_all_variables() {
		env::remove_var("LAVALINK_HOST");
		env::remove_var("LAVALINK_PORT");
		env::remove_var("LAVALINK_PASSWORD");
		assert!(MusicConfig::from_env().unwrap().is_none());

		env::set_var("LAVALINK_HOST", "localhost");
		env::set_var("LAVALINK_PORT", "2333");
		assert!(MusicConfig::from_env().unwrap().is_none());

		env::set_var("LAVALINK_PASSWORD", "youshallnotpass");
		let section = MusicConfig::from_env().unwrap().unwrap();
		assert_eq!(section.host, "localhost");
		assert_eq!(section.port, 2333);

		env::set_var("LAVALINK_PORT", "not-a-port");
		assert!(MusicConfig::from_env().is_err());

		env::remove_var("LAVALINK_HOST");
		env::remove_var("LAVALINK_PORT");
		env::remove_var("LAVALINK_PASSWORD");
	}
}
