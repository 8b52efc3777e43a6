//! Message validation rules.

use chet_core::config::HubConfig;
use chet_core::error::AppError;

/// Maximum emoji length, in characters.
const MAX_EMOJI_CHARS: usize = 32;

/// Characters never accepted inside a reaction emoji.
const FORBIDDEN_EMOJI_CHARS: &[char] = &['\'', '"', '<', '>', '\\', '&'];

/// Validates a raw inbound frame before parsing.
pub fn validate_inbound(raw: &str, max_frame_bytes: usize) -> Result<(), AppError> {
    if raw.len() > max_frame_bytes {
        return Err(AppError::validation(format!(
            "Message exceeds maximum size of {} bytes",
            max_frame_bytes
        )));
    }

    if raw.trim().is_empty() {
        return Err(AppError::validation("Empty message"));
    }

    Ok(())
}

/// Validates post content and returns the trimmed body.
///
/// A post needs a non-empty body or an image.
pub fn validate_content(
    body: &str,
    image: Option<&str>,
    config: &HubConfig,
) -> Result<String, AppError> {
    let body = body.trim();
    if body.chars().count() > config.max_body_chars {
        return Err(AppError::validation(format!(
            "Message body exceeds {} characters",
            config.max_body_chars
        )));
    }

    if let Some(image) = image {
        validate_image(image, config.max_image_bytes)?;
    } else if body.is_empty() {
        return Err(AppError::validation("Message body is empty"));
    }

    Ok(body.to_string())
}

/// Validates an inline image data URL.
pub fn validate_image(image: &str, max_image_bytes: usize) -> Result<(), AppError> {
    if !image.starts_with("data:image/") {
        return Err(AppError::validation("Image must be a data:image/ URL"));
    }

    if image.len() > max_image_bytes {
        return Err(AppError::validation(format!(
            "Image exceeds maximum size of {} bytes",
            max_image_bytes
        )));
    }

    Ok(())
}

/// Validates a reaction emoji.
pub fn validate_emoji(emoji: &str) -> Result<(), AppError> {
    if emoji.is_empty() || emoji.chars().count() > MAX_EMOJI_CHARS {
        return Err(AppError::validation("Invalid emoji length"));
    }

    if emoji.contains(FORBIDDEN_EMOJI_CHARS) || emoji.chars().any(char::is_control) {
        return Err(AppError::validation("Emoji contains invalid characters"));
    }

    Ok(())
}
