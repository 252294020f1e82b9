//! Dolores, a Discord chat bot
//!
//! Her primary use is rolling dice for players of a tabletop roleplaying
//! game, but she also plays music, fetches the stream schedule and talks
//! back when mentioned.

mod chat;
mod commands;
mod constants;
mod events;
mod logging;
mod music;
mod retry;
mod states;

use crate::{
	chat::Chat,
	commands::{command_on_error, command_set, post_command, pre_command},
	events::event_handler,
	logging::setup_logging,
	music::MusicClient,
	states::{Config, Data, Framework},
};
use anyhow::anyhow;
use poise::serenity_prelude::{ClientBuilder, GatewayIntents};
use secrecy::ExposeSecret;
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::instrument;

/// Build the `poise` [framework](poise::Framework)
#[instrument]
fn build_framework(config: Config) -> Framework {
	let commands = command_set(&config);

	Framework::builder()
		.setup(move |ctx, ready, _framework| {
			Box::pin(async move {
				let http = reqwest::Client::new();

				// The audio node needs the bot's user id, which only exists
				// once the gateway says hello.
				let music = match &config.music {
					Some(section) => {
						let manager = songbird::get(ctx)
							.await
							.ok_or_else(|| anyhow!("voice manager missing from the client"))?;

						Some(MusicClient::new(section, ready.user.id, manager).await)
					}
					None => None,
				};

				let chat = config
					.chat
					.clone()
					.map(|section| Chat::new(section, http.clone()));

				Ok(Arc::new(Data {
					config,
					http,
					chat,
					music,
				}))
			})
		})
		.options(poise::FrameworkOptions {
			pre_command,
			on_error: command_on_error,
			post_command,
			event_handler: |ctx, event, fw, data| Box::pin(event_handler(ctx, event, fw, data)),
			commands,
			..Default::default()
		})
		.initialize_owners(true)
		.build()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let config = Config::from_dotenv()?;

	setup_logging(&config)?;

	let token = config.discord_token.expose_secret().clone();

	let intents = GatewayIntents::GUILDS
		| GatewayIntents::GUILD_VOICE_STATES
		| GatewayIntents::GUILD_MESSAGES
		| GatewayIntents::GUILD_MESSAGE_REACTIONS
		| GatewayIntents::DIRECT_MESSAGES
		| GatewayIntents::MESSAGE_CONTENT;

	let mut client = ClientBuilder::new(token, intents)
		.framework(build_framework(config))
		.register_songbird()
		.await?;

	if let Err(error) = client.start().await {
		return Err(anyhow!("Client exited with error: {}", error));
	}

	Ok(())
}
