//! Decoded sprite values
//!
//! Only the image header is parsed: the format is sniffed from the magic
//! number and the pixel dimensions are read from the first frame header.
//! The payload is kept as-is and shared between all holders.

use bytes::Bytes;

use crate::error::{Error, Result};

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
const GIF87_MAGIC: &[u8] = b"GIF87a";
const GIF89_MAGIC: &[u8] = b"GIF89a";
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8];

/// Supported image encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// Portable Network Graphics
    Png,
    /// JPEG / JFIF
    Jpeg,
    /// Graphics Interchange Format
    Gif,
}

impl ImageFormat {
    /// MIME type of the encoding
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
        }
    }
}

/// An immutable decoded image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sprite {
    format: ImageFormat,
    width: u32,
    height: u32,
    bytes: Bytes,
}

impl Sprite {
    /// Decode the image header of `bytes`
    ///
    /// # Returns
    /// * `Result<Sprite>` - `Error::Decode` if the data is not a PNG, JPEG or GIF
    ///   image or is truncated before its dimensions
    pub fn decode(bytes: Bytes) -> Result<Self> {
        let (format, (width, height)) = if bytes.starts_with(PNG_MAGIC) {
            (ImageFormat::Png, png_dimensions(&bytes)?)
        } else if bytes.starts_with(GIF87_MAGIC) || bytes.starts_with(GIF89_MAGIC) {
            (ImageFormat::Gif, gif_dimensions(&bytes)?)
        } else if bytes.starts_with(JPEG_MAGIC) {
            (ImageFormat::Jpeg, jpeg_dimensions(&bytes)?)
        } else {
            return Err(Error::Decode("unrecognized image format".to_string()));
        };

        if width == 0 || height == 0 {
            return Err(Error::Decode(format!(
                "invalid {:?} dimensions {}x{}",
                format, width, height
            )));
        }

        Ok(Self {
            format,
            width,
            height,
            bytes,
        })
    }

    /// Image encoding
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Encoded image payload
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty (never true for a decoded sprite)
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn read_u16_be(data: &[u8], pos: usize) -> Result<u16> {
    data.get(pos..pos + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| truncated(pos))
}

fn read_u16_le(data: &[u8], pos: usize) -> Result<u16> {
    data.get(pos..pos + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| truncated(pos))
}

fn read_u32_be(data: &[u8], pos: usize) -> Result<u32> {
    data.get(pos..pos + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| truncated(pos))
}

fn truncated(pos: usize) -> Error {
    Error::Decode(format!("image truncated at offset {}", pos))
}

fn png_dimensions(data: &[u8]) -> Result<(u32, u32)> {
    // signature(8) length(4) "IHDR"(4) width(4) height(4)
    if data.get(12..16) != Some(b"IHDR".as_slice()) {
        return Err(Error::Decode("PNG is missing its IHDR chunk".to_string()));
    }
    Ok((read_u32_be(data, 16)?, read_u32_be(data, 20)?))
}

fn gif_dimensions(data: &[u8]) -> Result<(u32, u32)> {
    Ok((
        u32::from(read_u16_le(data, 6)?),
        u32::from(read_u16_le(data, 8)?),
    ))
}

fn is_start_of_frame(marker: u8) -> bool {
    matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC)
}

fn jpeg_dimensions(data: &[u8]) -> Result<(u32, u32)> {
    let mut pos = JPEG_MAGIC.len();

    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            return Err(Error::Decode(format!(
                "expected JPEG marker at offset {}",
                pos
            )));
        }
        let marker = data[pos + 1];
        if marker == 0xFF {
            // Fill byte
            pos += 1;
            continue;
        }
        pos += 2;

        match marker {
            0x01 | 0xD0..=0xD7 => continue,
            0xD9 | 0xDA => break,
            _ => {}
        }

        let len = usize::from(read_u16_be(data, pos)?);
        if len < 2 {
            return Err(Error::Decode(format!(
                "invalid JPEG segment length {} at offset {}",
                len, pos
            )));
        }

        if is_start_of_frame(marker) {
            // length(2) precision(1) height(2) width(2)
            let height = read_u16_be(data, pos + 3)?;
            let width = read_u16_be(data, pos + 5)?;
            return Ok((u32::from(width), u32::from(height)));
        }

        pos += len;
    }

    Err(Error::Decode("JPEG has no frame header".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(width: u32, height: u32) -> Bytes {
        let mut data = PNG_MAGIC.to_vec();
        data.extend_from_slice(&13u32.to_be_bytes());
        data.extend_from_slice(b"IHDR");
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&[8, 6, 0, 0, 0]);
        Bytes::from(data)
    }

    fn jpeg(width: u16, height: u16) -> Bytes {
        let mut data = JPEG_MAGIC.to_vec();
        // APP0 segment
        data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
        data.extend_from_slice(b"JFIF\0");
        data.extend_from_slice(&[1, 1, 0, 0, 1, 0, 1, 0, 0]);
        // Fill byte before SOF0
        data.push(0xFF);
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&[3, 1, 0x22, 0, 2, 0x11, 1, 3, 0x11, 1]);
        data.extend_from_slice(&[0xFF, 0xD9]);
        Bytes::from(data)
    }

    #[test]
    fn test_decode_png() {
        let sprite = Sprite::decode(png(128, 64)).unwrap();
        assert_eq!(sprite.format(), ImageFormat::Png);
        assert_eq!((sprite.width(), sprite.height()), (128, 64));
        assert_eq!(sprite.format().mime_type(), "image/png");
    }

    #[test]
    fn test_decode_gif() {
        let mut data = GIF89_MAGIC.to_vec();
        data.extend_from_slice(&[0x20, 0x00, 0x10, 0x00, 0, 0, 0]);
        let sprite = Sprite::decode(Bytes::from(data)).unwrap();
        assert_eq!(sprite.format(), ImageFormat::Gif);
        assert_eq!((sprite.width(), sprite.height()), (32, 16));
    }

    #[test]
    fn test_decode_jpeg() {
        let sprite = Sprite::decode(jpeg(640, 480)).unwrap();
        assert_eq!(sprite.format(), ImageFormat::Jpeg);
        assert_eq!((sprite.width(), sprite.height()), (640, 480));
    }

    #[test]
    fn test_decode_jpeg_without_frame() {
        let data = Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xDA, 0x00, 0x02, 0xFF, 0xD9]);
        assert!(matches!(Sprite::decode(data), Err(Error::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_unknown_and_truncated() {
        assert!(matches!(
            Sprite::decode(Bytes::from_static(b"<html>not an image</html>")),
            Err(Error::Decode(_))
        ));

        let truncated = png(1, 1).slice(..18);
        assert!(matches!(Sprite::decode(truncated), Err(Error::Decode(_))));

        assert!(matches!(Sprite::decode(png(0, 10)), Err(Error::Decode(_))));
    }
}
