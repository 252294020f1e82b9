//! `Discord` client commands

use crate::{
	constants::flavor,
	states::{Command, Config, Context, ContextPolyfill, FrameworkError, InteractionError},
};
use anyhow::{anyhow, Context as _};
use poise::{serenity_prelude, BoxFuture};
use rand::seq::SliceRandom;
use uuid::Uuid;

mod images;
mod music;
mod rolling;
mod scheduling;

/// A random way to address whoever asked for something silly
pub(crate) fn sarcastic_name() -> &'static str {
	flavor::SARCASTIC_NAMES
		.choose(&mut rand::thread_rng())
		.copied()
		.unwrap_or("buddy")
}

/// A canned comment for requests that went sideways
pub(crate) fn snarky_comment() -> &'static str {
	flavor::SNARKY_COMMENTS
		.choose(&mut rand::thread_rng())
		.copied()
		.unwrap_or("Whatever.")
}

/// Build the command set for the features the environment enables
///
/// Each feature checked its required variables while the config was parsed,
/// a missing section only skips that feature's handlers.
pub(crate) fn command_set(config: &Config) -> Vec<Command> {
	let mut commands = rolling::commands();

	if config.music.is_some() {
		commands.extend(music::commands());
	} else {
		tracing::warn!("music commands disabled, set the LAVALINK_* variables to enable them");
	}

	if config.scheduling.is_some() {
		commands.push(scheduling::schedule());
	} else {
		tracing::warn!("schedule command disabled, set the NOTION_* variables to enable it");
	}

	if config.images.is_some() {
		commands.push(images::generate_image());
	} else {
		tracing::warn!(
			"image generation disabled, set OPENAI_API_KEY and IMAGE_MODEL to enable it",
		);
	}

	commands
}

/// Register all slash commands globally
pub(crate) async fn register_(
	http: &serenity_prelude::Http,
	commands: &Vec<Command>,
) -> Result<(), serenity_prelude::Error> {
	let mut commands_collector = Vec::new();

	for command in commands {
		if let Some(slash_command) = command.create_as_slash_command() {
			commands_collector.push(slash_command);
		}
	}

	serenity_prelude::Command::set_global_commands(http, commands_collector).await?;

	Ok(())
}

/// Execute before each command
pub(crate) fn pre_command(ctx: Context) -> BoxFuture<()> {
	Box::pin(async move {
		tracing::info!(
			user_id = ctx.author().id.get(),
			username = ctx.author().name.as_str(),
			command_id = ctx.command().identifying_name.as_str(),
			"Command invocation",
		);
	})
}

/// Execute on a error during code execution
pub(crate) fn command_on_error(error: FrameworkError) -> BoxFuture<()> {
	Box::pin(async move {
		let error = match error {
			FrameworkError::Command { error, ctx, .. } => handle_interaction_error(ctx, error)
				.await
				.context("failed to send error message"),

			FrameworkError::EventHandler { error, event, .. } => {
				tracing::error!(
					error = ?error,
					event = ?event,
					"event handler",
				);

				Ok(())
			}

			FrameworkError::CommandCheckFailed { ctx, error, .. } => {
				if let Some(err) = error {
					handle_interaction_error(ctx, err)
						.await
						.context("failed to send error message")
				} else {
					Err(anyhow!("No error provided"))
				}
			}

			FrameworkError::MissingBotPermissions {
				ctx,
				missing_permissions,
				..
			} => ctx
				.shout(format!(
					"I'm missing the permissions to do that: {missing_permissions}"
				))
				.await
				.map(|_| ())
				.context("Failed to send missing bot permissions message"),

			FrameworkError::MissingUserPermissions {
				ctx,
				missing_permissions,
				..
			} => {
				let text = missing_permissions.map_or_else(
					|| "You're missing some permission for that, not sure which.".to_owned(),
					|permission| format!("You need {permission} to do that."),
				);

				ctx.shout(text)
					.await
					.map(|_| ())
					.context("Failed to send missing user permissions message")
			}

			FrameworkError::NotAnOwner { ctx, .. } => ctx
				.shout("Only my owner gets to do that.")
				.await
				.map(|_| ())
				.context("Failed to send not an owner message"),

			FrameworkError::GuildOnly { ctx, .. } => ctx
				.shout("This only works in a server.")
				.await
				.map(|_| ())
				.context("Failed to send guild only message"),

			FrameworkError::DmOnly { ctx, .. } => ctx
				.shout("This only works in direct messages.")
				.await
				.map(|_| ())
				.context("Failed to send dm only message"),

			error => {
				tracing::error!(error = ?error, "framework");

				Ok(())
			}
		};

		if let Err(error) = error {
			tracing::error!(error = ?error);
		}
	})
}

/// Execute after every successful command
pub(crate) fn post_command(ctx: Context) -> BoxFuture<()> {
	Box::pin(async move {
		tracing::debug!(
			user_id = ctx.author().id.get(),
			username = ctx.author().name.as_str(),
			command_id = ctx.command().identifying_name.as_str(),
			"Command invocation successful",
		);
	})
}

/// Handle our custom command interaction error
async fn handle_interaction_error(
	ctx: Context<'_>,
	error: InteractionError,
) -> serenity_prelude::Result<()> {
	let error_identifier = Uuid::new_v4().hyphenated().to_string();

	tracing::error!(
		user_id = ctx.author().id.get(),
		username = ctx.author().name.as_str(),
		error_id = error_identifier.as_str(),
		error = ?error,
		command_id = ctx.command().identifying_name.as_str(),
		"interaction body or check",
	);

	ctx.shout(format!(
		"{} Something went wrong on my end, reference `{error_identifier}`.",
		snarky_comment(),
	))
	.await?;

	Ok(())
}
