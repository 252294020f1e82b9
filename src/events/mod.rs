//! `Discord` client events handlers

use crate::{
	commands::register_,
	states::{ArcData, FrameworkContext, InteractionResult},
};
use anyhow::Context as _;
use poise::serenity_prelude::{self as serenity, FullEvent, Message, Reaction, ReactionType};

/// Serenity listener to react to `Discord` events
pub(crate) async fn event_handler(
	ctx: &serenity::Context,
	event: &FullEvent,
	framework: FrameworkContext<'_>,
	data: &ArcData,
) -> InteractionResult {
	match event {
		FullEvent::Ready { data_about_bot } => {
			register_(&ctx.http, &framework.options.commands)
				.await
				.context("Could not register global commands")?;

			tracing::info!("`{}` has connected to Discord", data_about_bot.user.name);

			Ok(())
		}

		FullEvent::Message { new_message } => {
			handle_message(ctx, framework, data, new_message).await
		}

		FullEvent::ReactionAdd { add_reaction } => handle_reaction(ctx, data, add_reaction).await,

		_ => {
			tracing::trace!(event = ?event, "missed event");

			Ok(())
		}
	}
}

/// Reply in character when a human mentions the bot
async fn handle_message(
	ctx: &serenity::Context,
	framework: FrameworkContext<'_>,
	data: &ArcData,
	message: &Message,
) -> InteractionResult {
	if message.author.bot {
		return Ok(());
	}

	let bot_id = framework.bot_id;
	if !message.mentions_user_id(bot_id) || message.mention_everyone {
		return Ok(());
	}

	// Without the chat feature a mention is just a ping, leave it alone.
	let Some(chat) = &data.chat else {
		return Ok(());
	};

	let content = plain_mentions(&message.content, bot_id);
	tracing::info!(content = content.as_str(), "generating a reply");

	let reply = chat
		.generate_reply(message.author.display_name(), &content)
		.await;
	if !reply.is_empty() {
		message.reply(ctx, reply).await?;
	}

	Ok(())
}

/// Explain a message in simpler terms when someone reacts with a question mark
async fn handle_reaction(
	ctx: &serenity::Context,
	data: &ArcData,
	reaction: &Reaction,
) -> InteractionResult {
	let ReactionType::Unicode(emoji) = &reaction.emoji else {
		return Ok(());
	};
	if emoji != "\u{2753}" && emoji != "\u{2754}" {
		return Ok(());
	}

	let Some(chat) = &data.chat else {
		return Ok(());
	};

	let message = reaction.message(ctx).await?;
	if message.content.is_empty() || message.author.bot {
		return Ok(());
	}

	tracing::info!(message_id = message.id.get(), "generating an explanation");

	let explanation = chat.generate_explanation(&message.content).await;
	if !explanation.is_empty() {
		message.reply(ctx, explanation).await?;
	}

	Ok(())
}

/// Rewrite raw mention markup into the bot's plain name
///
/// The model should see a name it can reason about, not an id blob.
fn plain_mentions(content: &str, bot_id: serenity::UserId) -> String {
	content
		.replace(&format!("<@{bot_id}>"), "Dolores")
		.replace(&format!("<@!{bot_id}>"), "Dolores")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn mention_markup_becomes_a_name() {
		let bot_id = serenity::UserId::new(42);

		assert_eq!(
			plain_mentions("hey <@42>, how are you", bot_id),
			"hey Dolores, how are you"
		);
		assert_eq!(plain_mentions("<@!42> roll for me", bot_id), "Dolores roll for me");
	}

	#[test]
	fn other_mentions_are_left_alone() {
		let bot_id = serenity::UserId::new(42);

		assert_eq!(plain_mentions("ask <@77> instead", bot_id), "ask <@77> instead");
	}
}
