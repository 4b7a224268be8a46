//! Pixel dimension extraction from image format headers.
//!
//! The pipeline never trusts stored dimensions: nominal values come from
//! enqueue-time metadata and go stale when designs are re-exported. These
//! parsers read the actual width/height straight from the binary header
//! (PNG IHDR chunk, JPEG SOF0/SOF2 marker scan) without decoding pixels,
//! so a header-only range read is enough.

use crate::ImageError;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Parsed header dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Parse width/height from the leading bytes of a PNG or JPEG.
///
/// Returns [`ImageError::Truncated`] when the buffer ends before the
/// dimensions were found, which callers treat as a signal to re-fetch the
/// full image instead of a header prefix.
pub fn parse_dimensions(bytes: &[u8]) -> Result<Dimensions, ImageError> {
    if bytes.len() >= PNG_SIGNATURE.len() && bytes[..8] == PNG_SIGNATURE {
        return parse_png(bytes);
    }
    if bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] == 0xD8 {
        return parse_jpeg(bytes);
    }
    Err(ImageError::UnsupportedFormat)
}

/// PNG: the IHDR chunk is mandatory and first, so width/height sit at fixed
/// offsets 16..24 (big-endian u32 each) right after the 8-byte signature
/// and the chunk length/type.
fn parse_png(bytes: &[u8]) -> Result<Dimensions, ImageError> {
    if bytes.len() < 24 {
        return Err(ImageError::Truncated);
    }
    if &bytes[12..16] != b"IHDR" {
        return Err(ImageError::Malformed("missing IHDR chunk".to_string()));
    }
    let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
    let height = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
    if width == 0 || height == 0 {
        return Err(ImageError::Malformed("zero dimension in IHDR".to_string()));
    }
    Ok(Dimensions { width, height })
}

/// JPEG: walk the marker segments until a start-of-frame marker. SOF0
/// (baseline) and SOF2 (progressive) are the common cases; the other SOFn
/// variants share the same payload layout and are accepted too.
fn parse_jpeg(bytes: &[u8]) -> Result<Dimensions, ImageError> {
    let mut offset = 2usize;
    loop {
        if offset + 1 >= bytes.len() {
            return Err(ImageError::Truncated);
        }
        if bytes[offset] != 0xFF {
            return Err(ImageError::Malformed(format!(
                "expected marker at offset {}, found 0x{:02X}",
                offset, bytes[offset]
            )));
        }
        // Fill bytes before a marker are legal.
        let mut marker_at = offset + 1;
        while marker_at < bytes.len() && bytes[marker_at] == 0xFF {
            marker_at += 1;
        }
        if marker_at >= bytes.len() {
            return Err(ImageError::Truncated);
        }
        let marker = bytes[marker_at];

        if is_sof_marker(marker) {
            // Segment: length(2) precision(1) height(2) width(2) ...
            let payload = marker_at + 1;
            if payload + 7 > bytes.len() {
                return Err(ImageError::Truncated);
            }
            let height = u16::from_be_bytes([bytes[payload + 3], bytes[payload + 4]]) as u32;
            let width = u16::from_be_bytes([bytes[payload + 5], bytes[payload + 6]]) as u32;
            if width == 0 || height == 0 {
                return Err(ImageError::Malformed("zero dimension in SOF".to_string()));
            }
            return Ok(Dimensions { width, height });
        }

        match marker {
            // Standalone markers carry no length field.
            0x01 | 0xD0..=0xD9 => {
                offset = marker_at + 1;
            }
            _ => {
                if marker_at + 3 > bytes.len() {
                    return Err(ImageError::Truncated);
                }
                let length =
                    u16::from_be_bytes([bytes[marker_at + 1], bytes[marker_at + 2]]) as usize;
                if length < 2 {
                    return Err(ImageError::Malformed("segment length underflow".to_string()));
                }
                offset = marker_at + 1 + length;
            }
        }
    }
}

/// SOFn markers are 0xC0..=0xCF minus DHT (C4), JPG (C8), and DAC (CC).
fn is_sof_marker(marker: u8) -> bool {
    matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC)
}
