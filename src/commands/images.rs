//! Image generation command

use crate::states::{Context, ImageStyle, ImagesConfig, InteractionResult};
use poise::{command, serenity_prelude::CreateEmbed, CreateReply};
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

/// Request body for the image generation endpoint
#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
	/// Model identifier
	model: &'a str,
	/// What to draw
	prompt: &'a str,
	/// Number of images, always one
	n: u8,
	/// Output dimensions
	size: &'a str,
	/// Rendering style
	style: ImageStyle,
	/// Ask for a hosted url rather than inline data
	response_format: &'a str,
	/// End-user identifier forwarded for abuse tracking
	user: String,
}

/// Response body of the image generation endpoint
#[derive(Debug, Deserialize)]
struct ImageResponse {
	/// Generated images, we only ever request one
	data: Vec<ImageDatum>,
}

/// One generated image
#[derive(Debug, Deserialize)]
struct ImageDatum {
	/// Where the image is hosted
	url: String,
}

/// What went wrong while talking to the images API
enum ImageError {
	/// The request never reached the API
	Connection,
	/// The API pushed back on quota
	RateLimited,
	/// The API answered with some other error
	Api,
}

/// Generate an image based on a given prompt
#[command(slash_command)]
pub(crate) async fn generate_image(
	ctx: Context<'_>,
	#[description = "A prompt describing the image"] prompt: String,
) -> InteractionResult {
	ctx.defer().await?;

	let Some(config) = &ctx.data().config.images else {
		ctx.say("Image generation is not set up right now.").await?;

		return Ok(());
	};

	let url = match generate(ctx, config, &prompt).await {
		Ok(url) => url,
		Err(ImageError::Connection) => {
			ctx.say("I'm sorry, I'm having trouble connecting to the image API.")
				.await?;

			return Ok(());
		}
		Err(ImageError::RateLimited) => {
			ctx.say("I'm sorry, I've reached my rate limit for now, try again later.")
				.await?;

			return Ok(());
		}
		Err(ImageError::Api) => {
			ctx.say("I'm sorry, I'm having trouble with the image API.")
				.await?;

			return Ok(());
		}
	};

	tracing::info!(url = url.as_str(), "image generated");

	let embed = CreateEmbed::new().description(&prompt).image(url);
	ctx.send(CreateReply::default().embed(embed)).await?;

	Ok(())
}

/// One image generation round-trip
async fn generate(
	ctx: Context<'_>,
	config: &ImagesConfig,
	prompt: &str,
) -> Result<String, ImageError> {
	let request = ImageRequest {
		model: &config.model,
		prompt,
		n: 1,
		size: "1792x1024",
		style: config.style,
		response_format: "url",
		user: ctx.author().id.to_string(),
	};

	let response = ctx
		.data()
		.http
		.post(format!("{}/images/generations", config.base_url))
		.bearer_auth(config.api_key.expose_secret())
		.json(&request)
		.send()
		.await
		.map_err(|error| {
			tracing::error!(?error, "could not reach the images endpoint");
			ImageError::Connection
		})?;

	let status = response.status();
	if status == StatusCode::TOO_MANY_REQUESTS {
		tracing::error!("images endpoint rate limit hit");
		return Err(ImageError::RateLimited);
	}
	if !status.is_success() {
		tracing::error!(status = status.as_u16(), "images endpoint returned an error");
		return Err(ImageError::Api);
	}

	response
		.json::<ImageResponse>()
		.await
		.ok()
		.and_then(|payload| payload.data.into_iter().next())
		.map(|datum| datum.url)
		.ok_or_else(|| {
			tracing::error!("images payload did not parse");
			ImageError::Api
		})
}
