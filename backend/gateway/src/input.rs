//! Multipart input extraction and validation for `/analyze`.

use std::io::Cursor;

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use bytes::{Bytes, BytesMut};
use image::{ImageFormat, ImageReader};
use thiserror::Error;
use tracing::debug;

use visionproxy_core::AgentRequest;

/// Image content types accepted from callers.
pub const SUPPORTED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Size bounds on inbound fields.
#[derive(Debug, Clone, Copy)]
pub struct InputLimits {
    pub max_image_bytes: usize,
    pub max_prompt_chars: usize,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self { max_image_bytes: 10 * 1024 * 1024, max_prompt_chars: 4_000 }
    }
}

/// Why a request was rejected before reaching the agent.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("malformed multipart body: {0}")]
    Malformed(String),

    #[error("missing `{0}` field")]
    MissingField(&'static str),

    #[error("prompt must not be empty")]
    EmptyPrompt,

    #[error("prompt exceeds {limit} characters")]
    PromptTooLong { limit: usize },

    #[error("image exceeds {limit} bytes")]
    ImageTooLarge { limit: usize },

    #[error("unsupported image content type `{0}`")]
    UnsupportedType(String),

    #[error("invalid image")]
    InvalidImage,
}

impl InputError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::ImageTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// A validated `/analyze` request.
#[derive(Debug, Clone)]
pub struct AnalyzeInput {
    pub prompt: String,
    pub image: Bytes,
    /// Content type of the bytes as sniffed, not as declared.
    pub mime_type: &'static str,
}

impl AnalyzeInput {
    pub fn into_agent_request(self) -> AgentRequest {
        AgentRequest { prompt: self.prompt, image: self.image, mime_type: self.mime_type.to_string() }
    }
}

struct Upload {
    declared_type: Option<String>,
    data: Bytes,
}

/// Read the `prompt` and `image` fields and validate them. Unknown fields are skipped.
pub async fn read_analyze_form(
    mut multipart: Multipart,
    limits: &InputLimits,
) -> Result<AnalyzeInput, InputError> {
    let mut prompt = None;
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(e, limits))? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("prompt") => {
                prompt = Some(field.text().await.map_err(|e| multipart_error(e, limits))?);
            }
            Some("image") => {
                let declared_type = field.content_type().map(str::to_string);
                let data = read_bounded(field, limits).await?;
                upload = Some(Upload { declared_type, data });
            }
            other => debug!(field = ?other, "Ignoring unexpected multipart field"),
        }
    }

    let prompt = validate_prompt(prompt, limits)?;
    let upload = upload.ok_or(InputError::MissingField("image"))?;
    let mime_type = validate_image(upload.declared_type.as_deref(), &upload.data)?;

    Ok(AnalyzeInput { prompt, image: upload.data, mime_type })
}

fn validate_prompt(prompt: Option<String>, limits: &InputLimits) -> Result<String, InputError> {
    let prompt = prompt.ok_or(InputError::MissingField("prompt"))?;
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(InputError::EmptyPrompt);
    }
    if prompt.chars().count() > limits.max_prompt_chars {
        return Err(InputError::PromptTooLong { limit: limits.max_prompt_chars });
    }
    Ok(prompt.to_string())
}

/// Check the declared content type, sniff the bytes and decode the image
/// header. Returns the MIME type of the detected format.
pub fn validate_image(declared: Option<&str>, data: &[u8]) -> Result<&'static str, InputError> {
    let declared = declared
        .map(essence)
        .filter(|d| !d.is_empty() && d != "application/octet-stream");

    if let Some(declared) = &declared {
        if !SUPPORTED_IMAGE_TYPES.contains(&canonical_type(declared)) {
            return Err(InputError::UnsupportedType(declared.clone()));
        }
    }

    let format = image::guess_format(data).map_err(|_| InputError::InvalidImage)?;
    let sniffed = match format {
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Png => "image/png",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        _ => return Err(InputError::InvalidImage),
    };

    match ImageReader::with_format(Cursor::new(data), format).into_dimensions() {
        Ok((width, height)) if width > 0 && height > 0 => {
            debug!(width, height, format = sniffed, "Image header decoded");
        }
        Ok(_) => return Err(InputError::InvalidImage),
        Err(e) => {
            debug!(error = %e, format = sniffed, "Image does not decode");
            return Err(InputError::InvalidImage);
        }
    }

    if let Some(declared) = declared.filter(|d| canonical_type(d) != sniffed) {
        debug!(declared = %declared, sniffed, "Declared image type differs from content");
    }
    Ok(sniffed)
}

/// Lowercased media type without parameters.
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn canonical_type(essence: &str) -> &str {
    match essence {
        "image/jpg" | "image/pjpeg" => "image/jpeg",
        other => other,
    }
}

async fn read_bounded(mut field: Field<'_>, limits: &InputLimits) -> Result<Bytes, InputError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, limits))? {
        if buf.len() + chunk.len() > limits.max_image_bytes {
            return Err(InputError::ImageTooLarge { limit: limits.max_image_bytes });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

fn multipart_error(err: MultipartError, limits: &InputLimits) -> InputError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        InputError::ImageTooLarge { limit: limits.max_image_bytes }
    } else {
        InputError::Malformed(err.body_text())
    }
}

/// A small solid image encoded in `format`.
#[cfg(test)]
pub(crate) fn encoded_image(format: ImageFormat) -> Vec<u8> {
    let pixels = image::RgbImage::from_pixel(8, 6, image::Rgb([200, 30, 30]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(pixels).write_to(&mut buf, format).unwrap();
    buf.into_inner()
}
