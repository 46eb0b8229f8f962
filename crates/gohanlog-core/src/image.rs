// ABOUTME: ImagePayload models photo content stored either as raw bytes or as base64 text.
// ABOUTME: All readers normalize through to_bytes/to_data_uri so nothing else branches on representation.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fallback MIME type when the payload carries no declaration and the bytes are unrecognised.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Errors converting between the binary and text representations of an image.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("invalid base64 image data: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("malformed data URI: {0}")]
    MalformedDataUri(String),

    #[error("data URI is not base64 encoded")]
    NotBase64,
}

/// The content of one photo or thumbnail.
///
/// Some storage backends drop binary blobs, so the same logical image may
/// arrive as raw bytes or as base64 text (either a bare base64 string or a
/// `data:<mime>;base64,<payload>` URI). Both are valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum ImagePayload {
    Binary(Vec<u8>),
    Encoded(String),
}

impl ImagePayload {
    /// Decode the payload to raw image bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ImageError> {
        match self {
            ImagePayload::Binary(bytes) => Ok(bytes.clone()),
            ImagePayload::Encoded(text) => {
                let (_, body) = split_data_uri(text)?;
                Ok(STANDARD.decode(body.trim())?)
            }
        }
    }

    /// MIME type declared by a data URI, or sniffed from the decoded bytes.
    pub fn mime_type(&self) -> Result<String, ImageError> {
        if let ImagePayload::Encoded(text) = self
            && let (Some(mime), _) = split_data_uri(text)?
        {
            return Ok(mime.to_string());
        }
        Ok(sniff_mime(&self.to_bytes()?).to_string())
    }

    /// A `data:` URI suitable for direct display and for backup documents.
    pub fn to_data_uri(&self) -> Result<String, ImageError> {
        let bytes = self.to_bytes()?;
        let mime = self.mime_type()?;
        Ok(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
    }

    /// Convert into the binary representation, decoding text if needed.
    pub fn into_binary(self) -> Result<ImagePayload, ImageError> {
        match self {
            ImagePayload::Binary(_) => Ok(self),
            ImagePayload::Encoded(_) => Ok(ImagePayload::Binary(self.to_bytes()?)),
        }
    }

    /// Convert into the text representation as a data URI.
    pub fn into_encoded(self) -> Result<ImagePayload, ImageError> {
        Ok(ImagePayload::Encoded(self.to_data_uri()?))
    }

    /// Parse base64 text (bare or data URI) into a binary payload.
    pub fn decode_text(text: &str) -> Result<ImagePayload, ImageError> {
        ImagePayload::Encoded(text.to_string()).into_binary()
    }
}

/// Split a data URI into its declared MIME type and base64 body. Bare base64
/// text is returned unchanged with no MIME type.
fn split_data_uri(text: &str) -> Result<(Option<&str>, &str), ImageError> {
    let Some(rest) = text.strip_prefix("data:") else {
        return Ok((None, text));
    };
    let (header, body) = rest
        .split_once(',')
        .ok_or_else(|| ImageError::MalformedDataUri("missing ',' separator".to_string()))?;
    let mut parts = header.split(';');
    let mime = parts.next().filter(|m| !m.is_empty());
    if !parts.any(|p| p.eq_ignore_ascii_case("base64")) {
        return Err(ImageError::NotBase64);
    }
    Ok((mime, body))
}

/// Identify common image formats by their magic bytes.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JPEG_HEADER: [u8; 6] = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

    #[test]
    fn binary_payload_renders_as_jpeg_data_uri() {
        let payload = ImagePayload::Binary(JPEG_HEADER.to_vec());
        let uri = payload.to_data_uri().unwrap();

        assert!(uri.starts_with("data:image/jpeg;base64,"));
        assert_eq!(ImagePayload::decode_text(&uri).unwrap(), payload);
    }

    #[test]
    fn bare_base64_and_data_uri_decode_to_same_bytes() {
        let encoded = STANDARD.encode(b"thumbnail bytes");
        let bare = ImagePayload::Encoded(encoded.clone());
        let uri = ImagePayload::Encoded(format!("data:image/png;base64,{}", encoded));

        assert_eq!(bare.to_bytes().unwrap(), b"thumbnail bytes");
        assert_eq!(uri.to_bytes().unwrap(), b"thumbnail bytes");
        assert_eq!(uri.mime_type().unwrap(), "image/png");
        assert_eq!(bare.mime_type().unwrap(), OCTET_STREAM);
    }

    #[test]
    fn invalid_text_is_an_encoding_error() {
        let garbage = ImagePayload::Encoded("not*base64!".to_string());
        assert!(matches!(garbage.to_bytes(), Err(ImageError::Base64(_))));

        let no_comma = ImagePayload::Encoded("data:image/png;base64".to_string());
        assert!(matches!(no_comma.to_bytes(), Err(ImageError::MalformedDataUri(_))));

        let plain = ImagePayload::Encoded("data:text/plain,hello".to_string());
        assert!(matches!(plain.to_bytes(), Err(ImageError::NotBase64)));
    }

    #[test]
    fn representation_conversions_preserve_content() {
        let original = ImagePayload::Binary(JPEG_HEADER.to_vec());
        let encoded = original.clone().into_encoded().unwrap();
        assert!(matches!(encoded, ImagePayload::Encoded(_)));

        let back = encoded.into_binary().unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn sniffs_known_formats() {
        assert_eq!(sniff_mime(&[0x89, b'P', b'N', b'G', 0x0D]), "image/png");
        assert_eq!(sniff_mime(b"GIF89a"), "image/gif");
        assert_eq!(sniff_mime(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(sniff_mime(b"xyz"), OCTET_STREAM);
    }
}
