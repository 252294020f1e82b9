//! Player event hooks driving the playback state machine
//!
//! The node delivers track lifecycle events per guild, in order. Terminal
//! events pop the next pending entry and hand it to the node; an entry that
//! fails to start is skipped in favor of the following one until something
//! plays or the queue runs dry and the guild goes idle.

use crate::music::client::PlayerData;
use lavalink_rs::{
	client::LavalinkClient,
	hook,
	model::{events::{self, TrackEndReason}, GuildId},
};

/// The node accepted our session
#[hook]
pub(crate) async fn ready(_client: LavalinkClient, session_id: String, event: &events::Ready) {
	tracing::info!(session_id, resumed = event.resumed, "audio node ready");
}

/// A track started, observe only
#[hook]
pub(crate) async fn track_start(
	_client: LavalinkClient,
	_session_id: String,
	event: &events::TrackStart,
) {
	tracing::info!(
		guild_id = event.guild_id.0,
		title = event.track.info.title.as_str(),
		author = event.track.info.author.as_str(),
		"track started",
	);
}

/// A track finished, advance unless another track already took its place
#[hook]
pub(crate) async fn track_end(
	client: LavalinkClient,
	_session_id: String,
	event: &events::TrackEnd,
) {
	tracing::info!(
		guild_id = event.guild_id.0,
		reason = ?event.reason,
		"track ended",
	);

	// A replacement means the next track was already handed over, advancing
	// here would pop the queue twice.
	if matches!(
		event.reason,
		TrackEndReason::Replaced | TrackEndReason::Cleanup
	) {
		return;
	}

	advance(&client, event.guild_id).await;
}

/// A track blew up mid-play, skip it and advance
#[hook]
pub(crate) async fn track_exception(
	client: LavalinkClient,
	_session_id: String,
	event: &events::TrackException,
) {
	tracing::error!(
		guild_id = event.guild_id.0,
		title = event.track.info.title.as_str(),
		exception = ?event.exception,
		"track exception",
	);

	advance(&client, event.guild_id).await;
}

/// A track stopped making progress, skip it and advance
#[hook]
pub(crate) async fn track_stuck(
	client: LavalinkClient,
	_session_id: String,
	event: &events::TrackStuck,
) {
	tracing::warn!(
		guild_id = event.guild_id.0,
		title = event.track.info.title.as_str(),
		threshold_ms = event.threshold_ms,
		"track stuck, skipping",
	);

	advance(&client, event.guild_id).await;
}

/// The voice websocket dropped, the guild's playback state is gone
#[hook]
pub(crate) async fn websocket_closed(
	client: LavalinkClient,
	_session_id: String,
	event: &events::WebSocketClosed,
) {
	tracing::warn!(
		guild_id = event.guild_id.0,
		code = event.code,
		reason = event.reason.as_str(),
		by_remote = event.by_remote,
		"voice websocket closed",
	);

	if let Some(player) = client.get_player_context(event.guild_id) {
		if let Ok(data) = player.data::<PlayerData>() {
			data.queues.remove(event.guild_id.0).await;
		}
	}
}

/// Hand the next pending entry to the node
///
/// Entries that fail to start are dropped, not retried, until one plays or
/// the queue is exhausted.
async fn advance(client: &LavalinkClient, guild_id: GuildId) {
	let Some(player) = client.get_player_context(guild_id) else {
		// Player already destroyed, e.g. right after an explicit disconnect.
		return;
	};

	let Ok(data) = player.data::<PlayerData>() else {
		tracing::error!(guild_id = guild_id.0, "player has no attached queue state");
		return;
	};

	loop {
		let Some(entry) = data.queues.pop_next(guild_id.0).await else {
			tracing::info!(guild_id = guild_id.0, "queue exhausted, going idle");
			return;
		};

		match player.play_now(&entry.track).await {
			Ok(_) => {
				tracing::info!(
					guild_id = guild_id.0,
					title = entry.track.info.title.as_str(),
					requester = entry.requester_name.as_str(),
					"advanced to the next queued track",
				);
				return;
			}
			Err(error) => {
				tracing::warn!(
					guild_id = guild_id.0,
					title = entry.track.info.title.as_str(),
					?error,
					"entry failed to start, trying the next one",
				);
			}
		}
	}
}
