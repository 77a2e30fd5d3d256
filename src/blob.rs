use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use image::ImageFormat;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ImageError {
    #[error("Unsupported image type: {0}. Use PNG, JPEG or WebP.")]
    UnsupportedType(String),
    #[error("Image is empty")]
    Empty,
    #[error("Image content does not match declared type {declared}")]
    Mismatch { declared: ImageMime },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImageMime {
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/webp")]
    Webp,
}

impl ImageMime {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMime::Png => "image/png",
            ImageMime::Jpeg => "image/jpeg",
            ImageMime::Webp => "image/webp",
        }
    }

    fn format(&self) -> ImageFormat {
        match self {
            ImageMime::Png => ImageFormat::Png,
            ImageMime::Jpeg => ImageFormat::Jpeg,
            ImageMime::Webp => ImageFormat::WebP,
        }
    }
}

impl fmt::Display for ImageMime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ImageMime {
    type Error = ImageError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        // Parameters such as `; charset=` are ignored.
        let essence = s.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/png" => Ok(Self::Png),
            "image/jpeg" | "image/jpg" => Ok(Self::Jpeg),
            "image/webp" => Ok(Self::Webp),
            other => Err(ImageError::UnsupportedType(other.to_string())),
        }
    }
}

/// An uploaded photograph together with its MIME type.
///
/// The payload is reference counted, so handing a clone to the prediction
/// service for the duration of a call does not copy the image.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBlob {
    data: Bytes,
    mime: ImageMime,
}

impl ImageBlob {
    /// Builds a blob after checking that the payload's magic bytes agree with
    /// the declared type.
    pub fn new(data: impl Into<Bytes>, mime: ImageMime) -> Result<Self, ImageError> {
        let data = data.into();
        if data.is_empty() {
            return Err(ImageError::Empty);
        }

        match image::guess_format(&data) {
            Ok(format) if format == mime.format() => Ok(Self { data, mime }),
            _ => Err(ImageError::Mismatch { declared: mime }),
        }
    }

    pub fn from_declared(data: impl Into<Bytes>, content_type: &str) -> Result<Self, ImageError> {
        let mime = ImageMime::try_from(content_type)?;
        Self::new(data, mime)
    }

    pub fn mime(&self) -> ImageMime {
        self.mime
    }

    // Never zero: `new` rejects empty payloads.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.data)
    }
}

impl fmt::Debug for ImageBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBlob")
            .field("mime", &self.mime)
            .field("len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    pub const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
    pub const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
    pub const WEBP: &[u8] = b"RIFF\x24\x00\x00\x00WEBPVP8 ";
}
