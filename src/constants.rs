//! Shared constants used across handlers

/// Hard limits enforced before any network round-trip
pub(crate) mod limits {
	use std::time::Duration;

	/// Highest volume the audio backend accepts
	pub(crate) const MAX_VOLUME: u16 = 100;
	/// Dice count above which a roll request is refused outright
	pub(crate) const MAX_DICE_PER_BATCH: u32 = 500;
	/// Discord caps message content at this many characters
	pub(crate) const MAX_MESSAGE_LEN: usize = 2000;
	/// How many queued tracks the queue listing shows before truncating
	pub(crate) const QUEUE_DISPLAY_LIMIT: usize = 10;
	/// How many chat exchanges are kept as context for reply generation
	pub(crate) const CHAT_HISTORY_LEN: usize = 10;
	/// Attempts made while waiting for the voice connection handshake
	pub(crate) const VOICE_CONNECT_ATTEMPTS: u32 = 10;
	/// Pause between voice connection checks
	pub(crate) const VOICE_CONNECT_DELAY: Duration = Duration::from_millis(500);
}

/// Well-known service endpoints
pub(crate) mod urls {
	/// Default base url for the `OpenAI`-compatible chat and images APIs
	pub(crate) const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
}

/// Canned lines that give the bot her voice
pub(crate) mod flavor {
	/// Ways to address someone who asked for something silly
	pub(crate) const SARCASTIC_NAMES: &[&str] =
		&["buddy", "pal", "friend", "champ", "chief", "sport", "genius"];

	/// Replies to a roll request that is too large to honor
	pub(crate) const ROLL_REFUSALS: &[&str] =
		&["I ain't rollin all that for you...", "Absolutely not.", "No."];

	/// Comments for commands that make no sense
	pub(crate) const SNARKY_COMMENTS: &[&str] = &[
		"Whatever.",
		"You clearly typed that with your elbows.",
		"I'm going to pretend I didn't see that.",
		"Try again, slower this time.",
	];
}
