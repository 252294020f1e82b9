//! Music playback over an external `Lavalink`-compatible audio node

mod client;
mod events;
mod queue;

pub(crate) use client::{MusicClient, PlayOutcome};
