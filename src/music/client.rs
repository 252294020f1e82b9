//! Guild-keyed wrapper around the audio node API
//!
//! Adapts the node client to simple operations that report success or
//! failure instead of surfacing backend errors to the command layer. The
//! node does the actual decoding and mixing, this side only decides what to
//! hand it next.

use crate::{
	constants::limits,
	music::{
		events,
		queue::{GuildQueues, QueueEntry},
	},
	states::MusicConfig,
};
use lavalink_rs::{
	client::LavalinkClient,
	model::{
		events::Events,
		track::{TrackData, TrackLoadData},
	},
	node::NodeBuilder,
	prelude::{NodeDistributionStrategy, PlayerContext, SearchEngines},
};
use poise::serenity_prelude::{ChannelId, GuildId, UserId};
use secrecy::ExposeSecret;
use songbird::Songbird;
use std::sync::Arc;
use url::Url;

/// State shared with the player event hooks
pub(crate) struct PlayerData {
	/// Handle back to the queues owned by [`MusicClient`]
	pub(crate) queues: Arc<GuildQueues>,
}

/// What happened to a track that was handed over successfully
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlayOutcome {
	/// Nothing was playing, the track started immediately
	NowPlaying,
	/// Something was already playing, the track was appended to the queue
	Enqueued,
}

/// Client for a single `Lavalink`-compatible audio node
pub(crate) struct MusicClient {
	/// The node connection
	lavalink: LavalinkClient,
	/// Pending tracks for every guild
	pub(crate) queues: Arc<GuildQueues>,
	/// Voice gateway manager used for the connection handshake
	songbird: Arc<Songbird>,
}

impl MusicClient {
	/// Register the audio node and install the player event hooks
	pub(crate) async fn new(
		config: &MusicConfig,
		user_id: UserId,
		songbird: Arc<Songbird>,
	) -> Self {
		let hooks = Events {
			ready: Some(events::ready),
			track_start: Some(events::track_start),
			track_end: Some(events::track_end),
			track_exception: Some(events::track_exception),
			track_stuck: Some(events::track_stuck),
			websocket_closed: Some(events::websocket_closed),
			..Default::default()
		};

		let node = NodeBuilder {
			hostname: format!("{}:{}", config.host, config.port),
			is_ssl: false,
			events: Events::default(),
			password: config.password.expose_secret().clone(),
			user_id: user_id.into(),
			session_id: None,
		};

		let lavalink =
			LavalinkClient::new(hooks, vec![node], NodeDistributionStrategy::round_robin()).await;

		Self {
			lavalink,
			queues: Arc::new(GuildQueues::new()),
			songbird,
		}
	}

	/// Join a voice channel and create the guild's player
	///
	/// No-op success when the guild already has a player.
	pub(crate) async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> bool {
		if self.lavalink.get_player_context(guild_id).is_some() {
			return true;
		}

		let connection_info = match self.songbird.join_gateway(guild_id, channel_id).await {
			Ok((connection_info, _call)) => connection_info,
			Err(error) => {
				tracing::error!(guild_id = guild_id.get(), ?error, "voice gateway join failed");
				return false;
			}
		};

		let data = Arc::new(PlayerData {
			queues: Arc::clone(&self.queues),
		});

		let player = match self
			.lavalink
			.create_player_context_with_data(guild_id, connection_info, data)
			.await
		{
			Ok(player) => player,
			Err(error) => {
				tracing::error!(guild_id = guild_id.get(), ?error, "player creation failed");
				return false;
			}
		};

		self.queues.register(guild_id.get()).await;

		if let Err(error) = player.set_volume(limits::MAX_VOLUME).await {
			tracing::warn!(
				guild_id = guild_id.get(),
				?error,
				"could not set the initial volume",
			);
		}

		true
	}

	/// Look a query up on the audio node
	///
	/// Bare terms become a provider search, full urls are loaded directly.
	/// An empty result stands in for every failure mode.
	pub(crate) async fn search(&self, guild_id: GuildId, terms: &str) -> Vec<TrackData> {
		let query = if is_url(terms) {
			terms.to_owned()
		} else {
			match SearchEngines::SoundCloud.to_query(terms) {
				Ok(query) => query,
				Err(error) => {
					tracing::error!(?error, "could not build the search query");
					return Vec::new();
				}
			}
		};

		tracing::debug!(guild_id = guild_id.get(), query = query.as_str(), "searching for tracks");

		match self.lavalink.load_tracks(guild_id, &query).await {
			Ok(loaded) => match loaded.data {
				Some(TrackLoadData::Track(track)) => vec![track],
				Some(TrackLoadData::Search(tracks)) => tracks,
				Some(TrackLoadData::Playlist(playlist)) => playlist.tracks,
				Some(TrackLoadData::Error(error)) => {
					tracing::warn!(?error, "audio node rejected the query");
					Vec::new()
				}
				None => Vec::new(),
			},
			Err(error) => {
				tracing::error!(guild_id = guild_id.get(), ?error, "track search failed");
				Vec::new()
			}
		}
	}

	/// Play the track immediately when the guild is idle, queue it otherwise
	pub(crate) async fn enqueue_or_play(
		&self,
		guild_id: GuildId,
		track: TrackData,
		requester_id: UserId,
		requester_name: String,
	) -> Option<PlayOutcome> {
		let Some(player) = self.lavalink.get_player_context(guild_id) else {
			return None;
		};

		let playing = match player.get_player().await {
			Ok(state) => state.track.is_some(),
			Err(error) => {
				tracing::error!(guild_id = guild_id.get(), ?error, "player state unavailable");
				return None;
			}
		};

		let entry = QueueEntry::new(track, requester_id, requester_name);

		if playing {
			self.queues.push(guild_id.get(), entry).await;
			return Some(PlayOutcome::Enqueued);
		}

		if !wait_until_connected(&player).await {
			tracing::error!(guild_id = guild_id.get(), "voice connection never completed");
			return None;
		}

		match player.play_now(&entry.track).await {
			Ok(_) => Some(PlayOutcome::NowPlaying),
			Err(error) => {
				tracing::error!(guild_id = guild_id.get(), ?error, "failed to start the track");
				None
			}
		}
	}

	/// Pause playback, failure when nothing can be paused
	pub(crate) async fn pause(&self, guild_id: GuildId) -> bool {
		self.set_paused(guild_id, true).await
	}

	/// Resume paused playback
	pub(crate) async fn resume(&self, guild_id: GuildId) -> bool {
		self.set_paused(guild_id, false).await
	}

	/// Flip the node's pause flag for a guild
	async fn set_paused(&self, guild_id: GuildId, paused: bool) -> bool {
		let Some(player) = self.lavalink.get_player_context(guild_id) else {
			return false;
		};

		match player.set_pause(paused).await {
			Ok(_) => true,
			Err(error) => {
				tracing::error!(guild_id = guild_id.get(), ?error, paused, "pause toggle failed");
				false
			}
		}
	}

	/// Stop playback and drop everything pending, the player stays alive
	pub(crate) async fn stop(&self, guild_id: GuildId) -> bool {
		let Some(player) = self.lavalink.get_player_context(guild_id) else {
			return false;
		};

		// Clear before stopping so the resulting end event finds nothing to
		// advance to.
		self.queues.clear(guild_id.get()).await;

		match player.stop_now().await {
			Ok(_) => true,
			Err(error) => {
				tracing::error!(guild_id = guild_id.get(), ?error, "failed to stop playback");
				false
			}
		}
	}

	/// Stop the current track only, the end event advances to the next entry
	pub(crate) async fn skip(&self, guild_id: GuildId) -> bool {
		let Some(player) = self.lavalink.get_player_context(guild_id) else {
			return false;
		};

		match player.stop_now().await {
			Ok(_) => true,
			Err(error) => {
				tracing::error!(guild_id = guild_id.get(), ?error, "failed to skip the track");
				false
			}
		}
	}

	/// Set the playback volume, values above 100 are rejected before any
	/// node round-trip
	pub(crate) async fn set_volume(&self, guild_id: GuildId, volume: u16) -> bool {
		if volume > limits::MAX_VOLUME {
			return false;
		}

		let Some(player) = self.lavalink.get_player_context(guild_id) else {
			return false;
		};

		match player.set_volume(volume).await {
			Ok(_) => true,
			Err(error) => {
				tracing::error!(guild_id = guild_id.get(), ?error, volume, "volume change failed");
				false
			}
		}
	}

	/// Tear the guild's playback down entirely
	///
	/// Stops playback, forgets the queue, destroys the node player and
	/// leaves the voice channel. Safe to call when already disconnected.
	pub(crate) async fn disconnect(&self, guild_id: GuildId) -> bool {
		self.queues.remove(guild_id.get()).await;

		if self.lavalink.get_player_context(guild_id).is_some() {
			if let Err(error) = self.lavalink.delete_player(guild_id).await {
				tracing::error!(guild_id = guild_id.get(), ?error, "player deletion failed");
				return false;
			}
		}

		if self.songbird.get(guild_id).is_some() {
			if let Err(error) = self.songbird.remove(guild_id).await {
				tracing::error!(guild_id = guild_id.get(), ?error, "voice channel leave failed");
				return false;
			}
		}

		true
	}

	/// The track the node currently plays for a guild, if any
	pub(crate) async fn current_track(&self, guild_id: GuildId) -> Option<TrackData> {
		let player = self.lavalink.get_player_context(guild_id)?;
		player.get_player().await.ok().and_then(|state| state.track)
	}

	/// Whether the node reports a current track for the guild
	pub(crate) async fn is_playing(&self, guild_id: GuildId) -> bool {
		self.current_track(guild_id).await.is_some()
	}

	/// Whether the node reports the guild's player as paused
	pub(crate) async fn is_paused(&self, guild_id: GuildId) -> bool {
		let Some(player) = self.lavalink.get_player_context(guild_id) else {
			return false;
		};

		player
			.get_player()
			.await
			.map(|state| state.paused)
			.unwrap_or(false)
	}
}

/// Bounded wait for the voice handshake to complete
///
/// Gives up after a fixed number of attempts. Nothing needs cleanup at that
/// point, no track has been handed to the node yet.
async fn wait_until_connected(player: &PlayerContext) -> bool {
	for attempt in 0..limits::VOICE_CONNECT_ATTEMPTS {
		match player.get_player().await {
			Ok(state) if state.state.connected => return true,
			Ok(_) => tracing::debug!(attempt, "waiting for the voice connection"),
			Err(error) => tracing::debug!(attempt, ?error, "player state not available yet"),
		}

		tokio::time::sleep(limits::VOICE_CONNECT_DELAY).await;
	}

	false
}

/// Whether the terms are a direct url rather than free-text search terms
fn is_url(terms: &str) -> bool {
	Url::parse(terms).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn urls_are_detected() {
		assert!(is_url("https://soundcloud.com/artist/track"));
		assert!(is_url("http://localhost/stream"));
	}

	#[test]
	fn search_terms_are_not_urls() {
		assert!(!is_url("never gonna give you up"));
		assert!(!is_url("darude sandstorm"));
		// a colon does not make a url
		assert!(!is_url("mailto:someone@example.com"));
		assert!(!is_url("scsearch:already prefixed"));
	}
}
