use std::io::Cursor;

use anyhow::{Context, Result, bail};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;

use crate::remote::RemoteStore;

/// Upper bound on an uploaded photo.
pub const MAX_PHOTO_BYTES: usize = 512_000;
/// Longest side of an uploaded photo, in pixels.
pub const MAX_PHOTO_DIMENSION: u32 = 1024;

const JPEG_QUALITIES: &[u8] = &[85, 75, 65, 55, 45, 35];

/// Binary payload decoded from a `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Compression result. `compressed` is false when the original bytes
/// were kept.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub compressed: bool,
}

/// Decode `data:<mime>;base64,<payload>`.
pub fn parse_data_url(data_url: &str) -> Result<DecodedImage> {
    let Some(rest) = data_url.strip_prefix("data:") else {
        bail!("Not a data URL");
    };
    let (header, payload) = rest
        .split_once(',')
        .context("Data URL is missing its payload")?;
    let Some(content_type) = header.strip_suffix(";base64") else {
        bail!("Only base64 data URLs are supported");
    };
    let bytes = BASE64_STANDARD
        .decode(payload.trim())
        .context("Data URL payload is not valid base64")?;
    let content_type = if content_type.is_empty() {
        "application/octet-stream".to_string()
    } else {
        content_type.to_string()
    };
    Ok(DecodedImage {
        content_type,
        bytes,
    })
}

/// Build a `data:` URL from raw bytes.
#[must_use]
pub fn to_data_url(content_type: &str, bytes: &[u8]) -> String {
    format!("data:{content_type};base64,{}", BASE64_STANDARD.encode(bytes))
}

/// Shrink an image under the size and dimension budget. Falls back to the
/// untouched input if it cannot be decoded or re-encoded.
#[must_use]
pub fn compress(input: DecodedImage) -> PreparedImage {
    match try_compress(&input.bytes) {
        Ok(bytes) => PreparedImage {
            content_type: "image/jpeg".to_string(),
            bytes,
            compressed: true,
        },
        Err(e) => {
            tracing::warn!(error = %e, "image compression failed, keeping original");
            PreparedImage {
                content_type: input.content_type,
                bytes: input.bytes,
                compressed: false,
            }
        }
    }
}

fn try_compress(bytes: &[u8]) -> Result<Vec<u8>> {
    let img = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("Failed to sniff image format")?
        .decode()
        .context("Failed to decode image")?;

    let img = if img.width() > MAX_PHOTO_DIMENSION || img.height() > MAX_PHOTO_DIMENSION {
        img.resize(MAX_PHOTO_DIMENSION, MAX_PHOTO_DIMENSION, FilterType::Triangle)
    } else {
        img
    };
    let rgb = img.to_rgb8();

    let mut smallest: Option<Vec<u8>> = None;
    for &quality in JPEG_QUALITIES {
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, quality)
            .encode_image(&rgb)
            .context("Failed to encode JPEG")?;
        if buf.len() <= MAX_PHOTO_BYTES {
            return Ok(buf);
        }
        if smallest.as_ref().is_none_or(|s| buf.len() < s.len()) {
            smallest = Some(buf);
        }
    }
    // Over budget even at the lowest quality; ship the smallest attempt.
    smallest.context("No JPEG quality levels configured")
}

/// Convert, compress and upload an inline photo. Returns the stored
/// reference, or `None` if any step failed (the caller keeps the inline data).
pub async fn upload_inline<R: RemoteStore>(
    remote: &R,
    data_url: &str,
    logical_id: &str,
) -> Option<String> {
    let decoded = match parse_data_url(data_url) {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!(logical_id, error = %e, "photo is not a usable data URL");
            return None;
        }
    };
    let original_len = decoded.bytes.len();
    let prepared = compress(decoded);
    let extension = extension_for(&prepared.content_type);
    let path = format!(
        "progress/{logical_id}-{}.{extension}",
        chrono::Utc::now().timestamp_millis()
    );
    tracing::debug!(
        logical_id,
        original_len,
        upload_len = prepared.bytes.len(),
        compressed = prepared.compressed,
        "uploading photo"
    );

    match remote
        .upload_photo(&path, prepared.bytes, &prepared.content_type)
        .await
    {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!(logical_id, path, error = %e, "photo upload failed");
            None
        }
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/jpeg" | "image/jpg" => "jpg",
        _ => "bin",
    }
}
