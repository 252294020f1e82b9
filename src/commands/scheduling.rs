//! Stream schedule lookup backed by a `Notion` database

use crate::{
	commands::sarcastic_name,
	retry::RetryPolicy,
	states::{Context, Data, InteractionResult, SchedulingConfig},
};
use anyhow::Context as _;
use chrono::NaiveDate;
use poise::{command, serenity_prelude::CreateEmbed, CreateReply};
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use std::time::Duration;

/// Get the streams scheduled for the next week
#[command(slash_command)]
pub(crate) async fn schedule(ctx: Context<'_>) -> InteractionResult {
	ctx.defer().await?;

	let Some(config) = &ctx.data().config.scheduling else {
		ctx.say("Scheduling is not set up right now.").await?;

		return Ok(());
	};

	let results = match query_schedule(ctx.data(), config).await {
		Ok(results) => results,
		Err(error) => {
			tracing::error!(?error, "could not get schedule data");
			ctx.say(format!(
				"Notion's API is giving me an error, so I couldn't get that for you, {}",
				sarcastic_name()
			))
			.await?;

			return Ok(());
		}
	};

	let mut embed = CreateEmbed::new()
		.title("Stream Schedule")
		.description("Streams within the next week.");

	let fields = schedule_fields(&results);
	if fields.is_empty() {
		embed = embed.field(
			"Nada",
			format!("We ain't got shit scheduled, {}", sarcastic_name()),
			false,
		);
	} else {
		for (name, value) in fields {
			embed = embed.field(name, value, false);
		}
	}

	ctx.send(CreateReply::default().embed(embed)).await?;

	Ok(())
}

/// Query the schedule database, retrying transient transport errors
async fn query_schedule(data: &Data, config: &SchedulingConfig) -> anyhow::Result<Vec<Value>> {
	let url = format!("{}databases/{}/query", config.base_url, config.database_id);
	let body = json!({
		"filter": { "property": "Date", "date": { "next_week": {} } },
		"sorts": [{ "property": "Date", "direction": "ascending" }],
	});

	let response = RetryPolicy::default()
		.run(
			|| async {
				data.http
					.post(&url)
					.bearer_auth(config.api_key.expose_secret())
					.header("Notion-Version", &config.notion_version)
					.json(&body)
					.timeout(Duration::from_secs(30))
					.send()
					.await
			},
			|error| error.is_connect() || error.is_timeout(),
		)
		.await
		.context("schedule query did not go through")?
		.error_for_status()
		.context("schedule query returned an error status")?;

	let payload: Value = response
		.json()
		.await
		.context("schedule payload did not parse")?;

	Ok(payload["results"].as_array().cloned().unwrap_or_default())
}

/// Turn schedule database rows into embed fields
///
/// Rows are best-effort: any property that does not have the expected shape
/// degrades to an empty string instead of dropping the row.
fn schedule_fields(results: &[Value]) -> Vec<(String, String)> {
	results
		.iter()
		.map(|row| {
			let date = row
				.pointer("/properties/Date/date/start")
				.and_then(Value::as_str)
				.unwrap_or_default();
			let weekday = NaiveDate::parse_from_str(date, "%Y-%m-%d")
				.map(|date| date.format("%A").to_string())
				.unwrap_or_default();
			let title = row
				.pointer("/properties/Name/title/0/plain_text")
				.and_then(Value::as_str)
				.unwrap_or_default();
			let people = row
				.pointer("/properties/Tags/multi_select")
				.and_then(Value::as_array)
				.map(|tags| {
					tags.iter()
						.filter_map(|tag| tag["name"].as_str())
						.collect::<Vec<_>>()
						.join(", ")
				})
				.unwrap_or_default();

			(format!("{date} {weekday}"), format!("{title}   ({people})"))
		})
		.collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
	use super::*;

	fn row(date: &str, title: &str, tags: &[&str]) -> Value {
		let tags: Vec<Value> = tags.iter().map(|tag| json!({ "name": tag })).collect();

		json!({
			"properties": {
				"Date": { "date": { "start": date } },
				"Name": { "title": [{ "plain_text": title }] },
				"Tags": { "multi_select": tags },
			}
		})
	}

	#[test]
	fn rows_become_dated_fields() {
		let rows = vec![row("2024-03-18", "Hollow Knight", &["Alice", "Bob"])];
		let fields = schedule_fields(&rows);

		assert_eq!(fields.len(), 1);
		// 2024-03-18 was a Monday
		assert_eq!(fields[0].0, "2024-03-18 Monday");
		assert_eq!(fields[0].1, "Hollow Knight   (Alice, Bob)");
	}

	#[test]
	fn rows_keep_their_order() {
		let rows = vec![
			row("2024-03-18", "First", &[]),
			row("2024-03-19", "Second", &[]),
		];
		let fields = schedule_fields(&rows);

		assert!(fields[0].1.starts_with("First"));
		assert!(fields[1].1.starts_with("Second"));
	}

	#[test]
	fn malformed_rows_degrade_per_property() {
		let rows = vec![json!({ "properties": { "Date": { "date": null } } })];
		let fields = schedule_fields(&rows);

		assert_eq!(fields[0].0, " ");
		assert_eq!(fields[0].1, "   ()");
	}
}
