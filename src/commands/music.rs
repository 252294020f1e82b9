//! Music playback commands
//!
//! Thin adapters between the slash command surface and the audio node
//! wrapper. Every command checks the caller's voice presence first and
//! produces exactly one status reply.

use crate::{
	constants::limits,
	music::{MusicClient, PlayOutcome},
	states::{Command, Context, InteractionResult},
};
use poise::{
	command,
	serenity_prelude::{ChannelId, CreateEmbed, CreateEmbedFooter, GuildId},
	CreateReply,
};

/// Where the caller and the bot currently sit in voice
struct VoicePresence {
	/// The guild the command was invoked in
	guild_id: GuildId,
	/// The caller's voice channel, if any
	user_channel: Option<ChannelId>,
	/// The bot's voice channel, if any
	bot_channel: Option<ChannelId>,
}

/// Read both voice states out of the guild cache
fn voice_presence(ctx: Context<'_>) -> Option<VoicePresence> {
	let guild = ctx.guild()?;

	let user_channel = guild
		.voice_states
		.get(&ctx.author().id)
		.and_then(|state| state.channel_id);
	let bot_channel = guild
		.voice_states
		.get(&ctx.framework().bot_id)
		.and_then(|state| state.channel_id);

	Some(VoicePresence {
		guild_id: guild.id,
		user_channel,
		bot_channel,
	})
}

/// Resolve the music client and run the voice-channel checks
///
/// Every playback command starts here. A refusal means nothing has been
/// touched yet, there are no partial side effects to undo.
fn playback_prelude(ctx: Context<'_>) -> Result<(&MusicClient, GuildId, ChannelId), &'static str> {
	let music = ctx
		.data()
		.music
		.as_ref()
		.ok_or("Music is not available right now, check back later.")?;

	let presence = voice_presence(ctx).ok_or("This only works in a server.")?;
	let user_channel = presence
		.user_channel
		.ok_or("You need to be in a voice channel to use this command!")?;

	if presence.bot_channel.is_some_and(|bot| bot != user_channel) {
		return Err("You need to be in my voice channel to boss me around.");
	}

	Ok((music, presence.guild_id, user_channel))
}

/// Play a song or add it to the queue
#[command(slash_command, guild_only)]
pub(crate) async fn play(
	ctx: Context<'_>,
	#[description = "The song to play. Can be a URL or a search term."] query: String,
) -> InteractionResult {
	ctx.defer().await?;

	let (music, guild_id, voice_channel) = match playback_prelude(ctx) {
		Ok(prelude) => prelude,
		Err(refusal) => {
			ctx.say(refusal).await?;

			return Ok(());
		}
	};

	if !music.connect(guild_id, voice_channel).await {
		ctx.say("Failed to connect to your voice channel.").await?;

		return Ok(());
	}

	let Some(track) = music.search(guild_id, &query).await.into_iter().next() else {
		// Nothing found. When the guild also has nothing playing and nothing
		// pending there is no reason to sit in the channel.
		if !music.is_playing(guild_id).await && music.queues.is_empty(guild_id.get()).await {
			music.disconnect(guild_id).await;
			ctx.say(format!(
				"No tracks found for query: `{query}`\n\
				 Disconnected from the voice channel since there's nothing to play."
			))
			.await?;
		} else {
			ctx.say(format!("No tracks found for query: `{query}`")).await?;
		}

		return Ok(());
	};

	let title = track.info.title.clone();
	let author = track.info.author.clone();
	let length = format_track_duration(track.info.length);
	let requester_name = ctx.author().display_name().to_owned();

	match music
		.enqueue_or_play(guild_id, track, ctx.author().id, requester_name.clone())
		.await
	{
		Some(PlayOutcome::NowPlaying) => {
			ctx.say(format!(
				"**Now playing:** {title} by {author} [{length}]\nRequested by {requester_name}"
			))
			.await?;
		}
		Some(PlayOutcome::Enqueued) => {
			ctx.say(format!(
				"**Added to queue:** {title} by {author} [{length}]\nRequested by {requester_name}"
			))
			.await?;
		}
		None => {
			ctx.say("Failed to play the track.").await?;
		}
	}

	Ok(())
}

/// Pause the currently playing track
#[command(slash_command, guild_only)]
pub(crate) async fn pause(ctx: Context<'_>) -> InteractionResult {
	ctx.defer().await?;

	let (music, guild_id, _) = match playback_prelude(ctx) {
		Ok(prelude) => prelude,
		Err(refusal) => {
			ctx.say(refusal).await?;

			return Ok(());
		}
	};

	if !music.is_playing(guild_id).await {
		ctx.say("Nothing is currently playing.").await?;

		return Ok(());
	}
	if music.is_paused(guild_id).await {
		ctx.say("Playback is already paused.").await?;

		return Ok(());
	}

	if music.pause(guild_id).await {
		ctx.say("Playback paused.").await?;
	} else {
		ctx.say("Failed to pause playback.").await?;
	}

	Ok(())
}

/// Resume the paused track
#[command(slash_command, guild_only)]
pub(crate) async fn resume(ctx: Context<'_>) -> InteractionResult {
	ctx.defer().await?;

	let (music, guild_id, _) = match playback_prelude(ctx) {
		Ok(prelude) => prelude,
		Err(refusal) => {
			ctx.say(refusal).await?;

			return Ok(());
		}
	};

	if !music.is_paused(guild_id).await {
		ctx.say("Playback is not paused.").await?;

		return Ok(());
	}

	if music.resume(guild_id).await {
		ctx.say("Playback resumed.").await?;
	} else {
		ctx.say("Failed to resume playback.").await?;
	}

	Ok(())
}

/// Stop playback, clear the queue and leave the voice channel
#[command(slash_command, guild_only)]
pub(crate) async fn stop(ctx: Context<'_>) -> InteractionResult {
	ctx.defer().await?;

	let (music, guild_id, _) = match playback_prelude(ctx) {
		Ok(prelude) => prelude,
		Err(refusal) => {
			ctx.say(refusal).await?;

			return Ok(());
		}
	};

	if !music.is_playing(guild_id).await && !music.is_paused(guild_id).await {
		ctx.say("Nothing is currently playing.").await?;

		return Ok(());
	}

	if music.stop(guild_id).await {
		music.disconnect(guild_id).await;
		ctx.say(
			"Playback stopped and queue cleared.\nDisconnected from the voice channel.",
		)
		.await?;
	} else {
		ctx.say("Failed to stop playback.").await?;
	}

	Ok(())
}

/// Skip the currently playing track
#[command(slash_command, guild_only)]
pub(crate) async fn skip(ctx: Context<'_>) -> InteractionResult {
	ctx.defer().await?;

	let (music, guild_id, _) = match playback_prelude(ctx) {
		Ok(prelude) => prelude,
		Err(refusal) => {
			ctx.say(refusal).await?;

			return Ok(());
		}
	};

	if !music.is_playing(guild_id).await {
		ctx.say("Nothing is currently playing.").await?;

		return Ok(());
	}

	let skipped = music.current_track(guild_id).await.map_or_else(
		|| "Unknown track".to_owned(),
		|track| format!("{} by {}", track.info.title, track.info.author),
	);

	if music.skip(guild_id).await {
		ctx.say(format!("Skipped: {skipped}")).await?;
	} else {
		ctx.say("Failed to skip track.").await?;
	}

	Ok(())
}

/// Show the current music queue
#[command(slash_command, guild_only)]
pub(crate) async fn queue(ctx: Context<'_>) -> InteractionResult {
	ctx.defer().await?;

	let (music, guild_id, _) = match playback_prelude(ctx) {
		Ok(prelude) => prelude,
		Err(refusal) => {
			ctx.say(refusal).await?;

			return Ok(());
		}
	};

	let current = music.current_track(guild_id).await;
	let entries = music.queues.entries(guild_id.get()).await;

	if current.is_none() && entries.is_empty() {
		ctx.say("The queue is empty.").await?;

		return Ok(());
	}

	let mut embed = CreateEmbed::new().title("Music Queue");

	if let Some(track) = &current {
		let status = if music.is_paused(guild_id).await {
			"Paused"
		} else {
			"Playing"
		};

		embed = embed.field(
			format!("{status} - Now Playing"),
			format!(
				"**{}** by {} [{}]",
				track.info.title,
				track.info.author,
				format_track_duration(track.info.length),
			),
			false,
		);
	}

	if !entries.is_empty() {
		let mut lines = String::new();
		for (index, entry) in entries.iter().take(limits::QUEUE_DISPLAY_LIMIT).enumerate() {
			lines.push_str(&format!(
				"`{}.` **{}** by {} [{}]\n    requested by {} <t:{}:R>\n",
				index + 1,
				entry.track.info.title,
				entry.track.info.author,
				format_track_duration(entry.track.info.length),
				entry.requester_name,
				entry.enqueued_at.timestamp(),
			));
		}
		if entries.len() > limits::QUEUE_DISPLAY_LIMIT {
			lines.push_str(&format!(
				"\n... and {} more tracks",
				entries.len() - limits::QUEUE_DISPLAY_LIMIT
			));
		}

		let total: u64 = entries.iter().map(|entry| entry.track.info.length).sum();

		embed = embed
			.field(format!("Up Next ({} tracks)", entries.len()), lines, false)
			.footer(CreateEmbedFooter::new(format!(
				"Total queue duration: {}",
				format_total_duration(total)
			)));
	}

	ctx.send(CreateReply::default().embed(embed)).await?;

	Ok(())
}

/// Set the playback volume
#[command(slash_command, guild_only)]
pub(crate) async fn volume(
	ctx: Context<'_>,
	#[description = "Volume level (0-100)"]
	#[min = 0]
	#[max = 100]
	level: u16,
) -> InteractionResult {
	ctx.defer().await?;

	let (music, guild_id, _) = match playback_prelude(ctx) {
		Ok(prelude) => prelude,
		Err(refusal) => {
			ctx.say(refusal).await?;

			return Ok(());
		}
	};

	// Discord enforces the bounds on its end, re-check anyway so no out of
	// range value ever reaches the node.
	if !volume_within_bounds(level) {
		ctx.say(format!("Volume has to be between 0 and {}.", limits::MAX_VOLUME))
			.await?;

		return Ok(());
	}

	if music.set_volume(guild_id, level).await {
		ctx.say(format!("Volume set to {level}%")).await?;
	} else {
		ctx.say("Failed to set volume.").await?;
	}

	Ok(())
}

/// Disconnect the bot from the voice channel
#[command(slash_command, guild_only)]
pub(crate) async fn disconnect(ctx: Context<'_>) -> InteractionResult {
	disconnect_impl(ctx).await
}

/// Disconnect the bot from the voice channel
#[command(slash_command, guild_only)]
pub(crate) async fn leave(ctx: Context<'_>) -> InteractionResult {
	disconnect_impl(ctx).await
}

/// Shared body of `disconnect` and its `leave` alias
async fn disconnect_impl(ctx: Context<'_>) -> InteractionResult {
	ctx.defer().await?;

	let (music, guild_id, _) = match playback_prelude(ctx) {
		Ok(prelude) => prelude,
		Err(refusal) => {
			ctx.say(refusal).await?;

			return Ok(());
		}
	};

	if music.disconnect(guild_id).await {
		ctx.say("Disconnected from the voice channel.").await?;
	} else {
		ctx.say("Failed to disconnect from the voice channel.")
			.await?;
	}

	Ok(())
}

/// Volume values accepted before any node round-trip
const fn volume_within_bounds(level: u16) -> bool {
	level <= limits::MAX_VOLUME
}

/// Format a track length in milliseconds as `m:ss`
fn format_track_duration(length_ms: u64) -> String {
	let minutes = length_ms / 60_000;
	let seconds = (length_ms % 60_000) / 1000;

	format!("{minutes}:{seconds:02}")
}

/// Format a summed queue duration as hours and minutes
fn format_total_duration(total_ms: u64) -> String {
	let minutes = total_ms / 60_000;
	let (hours, minutes) = (minutes / 60, minutes % 60);

	if hours > 0 {
		format!("{hours}h {minutes}m")
	} else {
		format!("{minutes}m")
	}
}

/// Every command of the music feature
pub(crate) fn commands() -> Vec<Command> {
	vec![
		play(),
		pause(),
		resume(),
		stop(),
		skip(),
		queue(),
		volume(),
		disconnect(),
		leave(),
	]
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn track_durations_read_like_a_clock() {
		assert_eq!(format_track_duration(0), "0:00");
		assert_eq!(format_track_duration(5_000), "0:05");
		assert_eq!(format_track_duration(65_000), "1:05");
		assert_eq!(format_track_duration(600_000), "10:00");
	}

	#[test]
	fn total_durations_collapse_to_hours_and_minutes() {
		assert_eq!(format_total_duration(0), "0m");
		assert_eq!(format_total_duration(59 * 60_000), "59m");
		assert_eq!(format_total_duration(60 * 60_000), "1h 0m");
		assert_eq!(format_total_duration(135 * 60_000), "2h 15m");
	}

	#[test]
	fn volume_bounds_are_inclusive() {
		assert!(volume_within_bounds(0));
		assert!(volume_within_bounds(100));
		assert!(!volume_within_bounds(101));
		assert!(!volume_within_bounds(u16::MAX));
	}
}
