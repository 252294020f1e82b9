//! Dice rolling and random choice commands

use crate::{
	commands::sarcastic_name,
	constants::{flavor, limits},
	states::{Command, Context, ContextPolyfill, InteractionResult},
};
use poise::command;
use rand::{seq::SliceRandom, Rng};

/// One `NdN` batch of dice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DiceBatch {
	/// How many dice to throw
	rolls: u32,
	/// How many sides each die has
	sides: u32,
}

/// Parse a single `NdN` batch, both numbers must be positive
fn parse_batch(batch: &str) -> Option<DiceBatch> {
	let (rolls, sides) = batch.split_once('d')?;
	let rolls = rolls.parse().ok().filter(|&n| n > 0)?;
	let sides = sides.parse().ok().filter(|&n| n > 0)?;

	Some(DiceBatch { rolls, sides })
}

/// Throw a batch and format the outcome line
///
/// Batches of three or more dice get their sum appended, except d20s where
/// individual results are what matters.
fn roll_batch(batch: DiceBatch, rng: &mut impl Rng) -> String {
	let rolls: Vec<u32> = (0..batch.rolls)
		.map(|_| rng.gen_range(1..=batch.sides))
		.collect();

	let listed = rolls
		.iter()
		.map(ToString::to_string)
		.collect::<Vec<_>>()
		.join(", ");
	let mut line = format!("(d{})  {listed}", batch.sides);

	if batch.sides != 20 && batch.rolls >= 3 {
		let sum: u64 = rolls.iter().map(|&roll| u64::from(roll)).sum();
		line.push_str(&format!("    Sum: {sum}"));
	}

	line
}

/// Shared body of the public and the secret roll commands
async fn roll_impl(ctx: Context<'_>, dice_batches: &str, secret: bool) -> InteractionResult {
	let mut lines = Vec::new();

	for batch in dice_batches.split_whitespace() {
		let Some(batch) = parse_batch(batch) else {
			let reply = format!(
				"Invalid format in '{batch}'. Use NdN format, {}.",
				sarcastic_name()
			);
			respond(ctx, reply, secret).await?;

			return Ok(());
		};

		if batch.rolls > limits::MAX_DICE_PER_BATCH {
			let refusal = flavor::ROLL_REFUSALS
				.choose(&mut rand::thread_rng())
				.copied()
				.unwrap_or("No.");
			respond(ctx, refusal.to_owned(), secret).await?;

			return Ok(());
		}

		lines.push(roll_batch(batch, &mut rand::thread_rng()));
	}

	let reply = if lines.is_empty() {
		format!(
			"No valid dice batches provided. Format has to be in NdN, {}.",
			sarcastic_name()
		)
	} else {
		let response = lines.join("\n");
		if response.len() > limits::MAX_MESSAGE_LEN {
			"Result too long to display!".to_owned()
		} else {
			response
		}
	};

	respond(ctx, reply, secret).await?;

	Ok(())
}

/// Send either a normal or an ephemeral reply
async fn respond(ctx: Context<'_>, content: String, secret: bool) -> InteractionResult {
	if secret {
		ctx.shout(content).await?;
	} else {
		ctx.say(content).await?;
	}

	Ok(())
}

/// Roll dice in NdN format
#[command(slash_command)]
pub(crate) async fn roll(
	ctx: Context<'_>,
	#[description = "Dice to roll (e.g., 5d10 3d8 2d4)"] dice_batches: String,
) -> InteractionResult {
	ctx.defer().await?;
	roll_impl(ctx, &dice_batches, false).await
}

/// Roll dice secretly, only you see the result
#[command(slash_command)]
pub(crate) async fn secret_roll(
	ctx: Context<'_>,
	#[description = "Dice to roll (e.g., 5d10 3d8 2d4)"] dice_batches: String,
) -> InteractionResult {
	ctx.defer_ephemeral().await?;
	roll_impl(ctx, &dice_batches, true).await
}

/// Roll a d20
#[command(slash_command)]
pub(crate) async fn rolld20(ctx: Context<'_>) -> InteractionResult {
	ctx.defer().await?;
	ctx.say(d20_line()).await?;

	Ok(())
}

/// Roll a d20 secretly, only you see the result
#[command(slash_command)]
pub(crate) async fn secret_rolld20(ctx: Context<'_>) -> InteractionResult {
	ctx.defer_ephemeral().await?;
	ctx.shout(d20_line()).await?;

	Ok(())
}

/// One d20 throw, with a one in a million easter egg
fn d20_line() -> String {
	let mut rng = rand::thread_rng();

	if rng.gen_range(1..=1_000_000) == 1 {
		"Goon.".to_owned()
	} else {
		format!("(d20)  {}", rng.gen_range(1..=20))
	}
}

/// Choose between several options
#[command(slash_command)]
pub(crate) async fn choose(
	ctx: Context<'_>,
	#[description = "Choices separated by spaces"] choices: String,
) -> InteractionResult {
	ctx.defer().await?;

	let options: Vec<&str> = choices.split_whitespace().collect();
	let reply = options
		.choose(&mut rand::thread_rng())
		.map_or_else(|| "You need to give me choices!".to_owned(), |&pick| {
			pick.to_owned()
		});
	ctx.say(reply).await?;

	Ok(())
}

/// Every command of the rolling feature
pub(crate) fn commands() -> Vec<Command> {
	vec![roll(), secret_roll(), rolld20(), secret_rolld20(), choose()]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
	use super::*;
	use rand::{rngs::StdRng, SeedableRng};

	#[test]
	fn batches_parse_in_ndn_format() {
		assert_eq!(
			parse_batch("5d10"),
			Some(DiceBatch {
				rolls: 5,
				sides: 10
			})
		);
		assert_eq!(parse_batch("1d20"), Some(DiceBatch { rolls: 1, sides: 20 }));
	}

	#[test]
	fn malformed_batches_are_rejected() {
		assert_eq!(parse_batch("d20"), None);
		assert_eq!(parse_batch("5d"), None);
		assert_eq!(parse_batch("0d6"), None);
		assert_eq!(parse_batch("3d0"), None);
		assert_eq!(parse_batch("-2d6"), None);
		assert_eq!(parse_batch("2x6"), None);
		assert_eq!(parse_batch("five"), None);
	}

	#[test]
	fn batch_lines_list_each_roll() {
		let mut rng = StdRng::seed_from_u64(7);
		let line = roll_batch(DiceBatch { rolls: 2, sides: 6 }, &mut rng);

		assert!(line.starts_with("(d6)  "));
		assert!(!line.contains("Sum:"));
		assert_eq!(line.matches(", ").count(), 1);
	}

	#[test]
	fn large_non_d20_batches_get_a_sum() {
		let mut rng = StdRng::seed_from_u64(7);
		let line = roll_batch(
			DiceBatch {
				rolls: 4,
				sides: 8,
			},
			&mut rng,
		);

		assert!(line.contains("Sum:"));
	}

	#[test]
	fn d20_batches_never_get_a_sum() {
		let mut rng = StdRng::seed_from_u64(7);
		let line = roll_batch(
			DiceBatch {
				rolls: 5,
				sides: 20,
			},
			&mut rng,
		);

		assert!(!line.contains("Sum:"));
	}

	#[test]
	fn rolls_stay_within_the_die() {
		let mut rng = StdRng::seed_from_u64(42);
		for _ in 0..100 {
			let line = roll_batch(DiceBatch { rolls: 1, sides: 4 }, &mut rng);
			let value: u32 = line.trim_start_matches("(d4)  ").parse().unwrap();
			assert!((1..=4).contains(&value));
		}
	}
}
