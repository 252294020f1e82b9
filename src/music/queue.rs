//! Per-guild track queues
//!
//! One service object owns every guild's pending tracks. Ordering is strictly
//! first-in first-out, the position in the queue is the playback order.

use chrono::{DateTime, Utc};
use lavalink_rs::model::track::TrackData;
use poise::serenity_prelude::UserId;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

/// One track awaiting playback, with requester metadata
#[derive(Debug, Clone)]
pub(crate) struct QueueEntry {
	/// The descriptor the audio node returned for this track
	pub(crate) track: TrackData,
	/// Who asked for it
	pub(crate) requester_id: UserId,
	/// Display name snapshot taken at enqueue time, never refreshed
	pub(crate) requester_name: String,
	/// When it was queued, informational only
	pub(crate) enqueued_at: DateTime<Utc>,
}

impl QueueEntry {
	/// Wrap a track with its requester metadata
	pub(crate) fn new(track: TrackData, requester_id: UserId, requester_name: String) -> Self {
		Self {
			track,
			requester_id,
			requester_name,
			enqueued_at: Utc::now(),
		}
	}
}

/// The owned mapping from guild id to that guild's pending tracks
///
/// Mutations never hold the lock across an await point, every queue
/// manipulation is a single synchronous decision.
#[derive(Debug, Default)]
pub(crate) struct GuildQueues {
	/// Guild id to pending entries, in playback order
	inner: RwLock<HashMap<u64, VecDeque<QueueEntry>>>,
}

impl GuildQueues {
	/// Create an empty mapping
	pub(crate) fn new() -> Self {
		Self::default()
	}

	/// Make sure a guild has a queue, called on voice connection
	pub(crate) async fn register(&self, guild_id: u64) {
		self.inner.write().await.entry(guild_id).or_default();
	}

	/// Append an entry at the back of a guild's queue
	pub(crate) async fn push(&self, guild_id: u64, entry: QueueEntry) {
		self.inner
			.write()
			.await
			.entry(guild_id)
			.or_default()
			.push_back(entry);
	}

	/// Take the next entry to play, front of the queue
	pub(crate) async fn pop_next(&self, guild_id: u64) -> Option<QueueEntry> {
		self.inner
			.write()
			.await
			.get_mut(&guild_id)
			.and_then(VecDeque::pop_front)
	}

	/// Drop every pending entry but keep the guild registered
	pub(crate) async fn clear(&self, guild_id: u64) {
		if let Some(queue) = self.inner.write().await.get_mut(&guild_id) {
			queue.clear();
		}
	}

	/// Forget a guild entirely, called on voice disconnection
	pub(crate) async fn remove(&self, guild_id: u64) {
		self.inner.write().await.remove(&guild_id);
	}

	/// Snapshot of a guild's pending entries in playback order
	pub(crate) async fn entries(&self, guild_id: u64) -> Vec<QueueEntry> {
		self.inner
			.read()
			.await
			.get(&guild_id)
			.map(|queue| queue.iter().cloned().collect())
			.unwrap_or_default()
	}

	/// Number of pending entries for a guild
	pub(crate) async fn len(&self, guild_id: u64) -> usize {
		self.inner
			.read()
			.await
			.get(&guild_id)
			.map_or(0, VecDeque::len)
	}

	/// Whether a guild has nothing pending
	pub(crate) async fn is_empty(&self, guild_id: u64) -> bool {
		self.len(guild_id).await == 0
	}
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
	use super::*;
	use lavalink_rs::model::track::TrackInfo;

	const GUILD: u64 = 116;

	fn track(title: &str) -> TrackData {
		TrackData {
			encoded: format!("encoded:{title}"),
			info: TrackInfo {
				identifier: title.to_owned(),
				is_seekable: true,
				author: "somebody".to_owned(),
				length: 180_000,
				is_stream: false,
				position: 0,
				title: title.to_owned(),
				source_name: "soundcloud".to_owned(),
				uri: None,
				artwork_url: None,
				isrc: None,
			},
			plugin_info: None,
			user_data: None,
		}
	}

	fn entry(title: &str) -> QueueEntry {
		QueueEntry::new(track(title), UserId::new(1), "requester".to_owned())
	}

	#[tokio::test]
	async fn entries_come_back_in_enqueue_order() {
		let queues = GuildQueues::new();
		queues.register(GUILD).await;

		for title in ["first", "second", "third"] {
			queues.push(GUILD, entry(title)).await;
		}

		let titles: Vec<_> = queues
			.entries(GUILD)
			.await
			.into_iter()
			.map(|entry| entry.track.info.title)
			.collect();
		assert_eq!(titles, ["first", "second", "third"]);
	}

	#[tokio::test]
	async fn pop_takes_the_front_and_shrinks_the_queue() {
		let queues = GuildQueues::new();
		queues.push(GUILD, entry("first")).await;
		queues.push(GUILD, entry("second")).await;

		let popped = queues.pop_next(GUILD).await.unwrap();
		assert_eq!(popped.track.info.title, "first");
		assert_eq!(queues.len(GUILD).await, 1);

		let popped = queues.pop_next(GUILD).await.unwrap();
		assert_eq!(popped.track.info.title, "second");
		assert!(queues.is_empty(GUILD).await);
		assert!(queues.pop_next(GUILD).await.is_none());
	}

	#[tokio::test]
	async fn pop_on_unknown_guild_is_none() {
		let queues = GuildQueues::new();
		assert!(queues.pop_next(999).await.is_none());
	}

	#[tokio::test]
	async fn guilds_are_isolated() {
		let queues = GuildQueues::new();
		queues.push(1, entry("one")).await;
		queues.push(2, entry("two")).await;

		assert_eq!(queues.pop_next(2).await.unwrap().track.info.title, "two");
		assert_eq!(queues.len(1).await, 1);
	}

	#[tokio::test]
	async fn clear_and_remove_are_idempotent() {
		let queues = GuildQueues::new();
		queues.push(GUILD, entry("first")).await;

		queues.clear(GUILD).await;
		queues.clear(GUILD).await;
		assert!(queues.is_empty(GUILD).await);

		queues.remove(GUILD).await;
		queues.remove(GUILD).await;
		assert!(queues.pop_next(GUILD).await.is_none());
	}

	// Advancing on a terminal player event is a pop per event, a guild with
	// nothing pending simply goes idle.
	#[tokio::test]
	async fn drains_one_entry_per_terminal_event() {
		let queues = GuildQueues::new();
		queues.register(GUILD).await;
		queues.push(GUILD, entry("b")).await;
		queues.push(GUILD, entry("c")).await;

		// track end for the current track: entry "b" starts playing
		assert_eq!(queues.pop_next(GUILD).await.unwrap().track.info.title, "b");
		// "b" errors out: it is skipped, not retried, "c" starts
		assert_eq!(queues.pop_next(GUILD).await.unwrap().track.info.title, "c");
		// "c" ends: nothing left, the guild is idle
		assert!(queues.pop_next(GUILD).await.is_none());
	}
}
