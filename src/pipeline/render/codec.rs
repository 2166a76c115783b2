//! Data URI and file-type helpers.

use base64::Engine as _;

use super::{FileKind, RenderError};

const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

pub fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Encode PNG bytes as a `data:image/png;base64,` URI.
pub fn encode_png_data_uri(png: &[u8]) -> String {
    format!("{PNG_DATA_URI_PREFIX}{}", encode_base64(png))
}

/// Build a data URI for arbitrary bytes and MIME type.
pub fn encode_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", encode_base64(bytes))
}

/// Split a data URI into `(mime_type, base64_payload)`.
///
/// Raw base64 (no `data:` prefix) is accepted and reported without a MIME type.
pub fn split_data_uri(input: &str) -> (Option<&str>, &str) {
    let trimmed = input.trim();
    match trimmed.strip_prefix("data:") {
        Some(rest) => match rest.find(',') {
            Some(idx) => {
                let header = &rest[..idx];
                let mime = header.split(';').next().filter(|m| !m.is_empty());
                (mime, &rest[idx + 1..])
            }
            None => (None, ""),
        },
        None => (None, trimmed),
    }
}

/// Decode a data URI (or raw base64) to bytes.
pub fn decode_data_uri(input: &str) -> Result<Vec<u8>, RenderError> {
    let (_, payload) = split_data_uri(input);
    if payload.is_empty() {
        return Err(RenderError::InvalidData("empty base64 payload".into()));
    }
    // Browsers sometimes wrap long payloads
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| RenderError::InvalidData(format!("Base64 decode failed: {e}")))
}

/// Sniff the MIME type of common image formats from magic bytes.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.starts_with(b"BM") {
        Some("image/bmp")
    } else if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
        Some("image/tiff")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else if bytes.starts_with(b"%PDF-") {
        Some("application/pdf")
    } else {
        None
    }
}

/// Decide whether an upload is a PDF or an image.
///
/// Magic bytes win; the file name extension is consulted only when the
/// content is not recognised.
pub fn detect_file_kind(bytes: &[u8], file_name: &str) -> Result<FileKind, RenderError> {
    if let Some(mime) = sniff_mime(bytes) {
        return Ok(kind_for_mime(mime));
    }

    let guessed = mime_guess::from_path(file_name).first();
    match guessed {
        Some(mime) if mime.essence_str() == "application/pdf" => Ok(FileKind::Pdf),
        Some(mime) if mime.type_() == mime_guess::mime::IMAGE => Ok(FileKind::Image),
        _ => Err(RenderError::UnsupportedFormat(format!(
            "'{file_name}' is neither a PDF nor an image"
        ))),
    }
}

fn kind_for_mime(mime: &str) -> FileKind {
    if mime == "application/pdf" {
        FileKind::Pdf
    } else {
        FileKind::Image
    }
}
