//! Tracing setup for the whole client

use crate::states::Config;
use anyhow::Context as _;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber
///
/// Production gets single-line JSON records, development gets the pretty
/// human-readable format.
pub(crate) fn setup_logging(config: &Config) -> anyhow::Result<()> {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new("info,dolores=debug,lavalink_rs=info"));

	let registry = tracing_subscriber::registry().with(filter);

	if config.production {
		registry
			.with(fmt::layer().json())
			.try_init()
			.context("failed to install the json subscriber")?;
	} else {
		registry
			.with(fmt::layer())
			.try_init()
			.context("failed to install the fmt subscriber")?;
	}

	Ok(())
}
