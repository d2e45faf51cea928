//! Byte-order-mark sniffing and text decoding for content matching.

use std::fmt;

use encoding_rs::Encoding;

/// The encoding a file's content was decoded with.
///
/// `encoding_rs` covers UTF-8, UTF-16 and the legacy single/multi-byte
/// encodings but not UTF-32, so the two UTF-32 byte orders get their own
/// variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    Utf32Le,
    Utf32Be,
    Encoded(&'static Encoding),
}

impl TextEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf32Le => "UTF-32LE",
            Self::Utf32Be => "UTF-32BE",
            Self::Encoded(encoding) => encoding.name(),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Content of a file decoded to text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding: TextEncoding,
    /// Whether the encoding came from a byte-order-mark rather than the default.
    pub has_bom: bool,
}

/// Detect a byte-order-mark at the start of `bytes`.
///
/// Returns the encoding and the length of the mark. `FF FE 00 00` is read as
/// UTF-32 little-endian, not UTF-16 followed by a NUL character.
pub fn detect_bom(bytes: &[u8]) -> Option<(TextEncoding, usize)> {
    match bytes {
        [0x00, 0x00, 0xFE, 0xFF, ..] => Some((TextEncoding::Utf32Be, 4)),
        [0xFF, 0xFE, 0x00, 0x00, ..] => Some((TextEncoding::Utf32Le, 4)),
        [0xEF, 0xBB, 0xBF, ..] => Some((TextEncoding::Encoded(encoding_rs::UTF_8), 3)),
        [0xFE, 0xFF, ..] => Some((TextEncoding::Encoded(encoding_rs::UTF_16BE), 2)),
        [0xFF, 0xFE, ..] => Some((TextEncoding::Encoded(encoding_rs::UTF_16LE), 2)),
        _ => None,
    }
}

/// Whether `bytes` consist of nothing but a byte-order-mark.
pub fn is_bom_only(bytes: &[u8]) -> bool {
    detect_bom(bytes).is_some_and(|(_, len)| len == bytes.len())
}

/// Decode `bytes`, honouring a byte-order-mark and falling back to `default`.
///
/// Malformed sequences become U+FFFD; decoding never fails.
pub fn decode(bytes: &[u8], default: &'static Encoding) -> DecodedText {
    let (encoding, bom_len) = detect_bom(bytes).unwrap_or((TextEncoding::Encoded(default), 0));
    let body = &bytes[bom_len..];

    let text = match encoding {
        TextEncoding::Utf32Le => decode_utf32(body, u32::from_le_bytes),
        TextEncoding::Utf32Be => decode_utf32(body, u32::from_be_bytes),
        TextEncoding::Encoded(encoding) => encoding.decode_without_bom_handling(body).0.into_owned(),
    };

    DecodedText {
        text,
        encoding,
        has_bom: bom_len > 0,
    }
}

fn decode_utf32(body: &[u8], read: fn([u8; 4]) -> u32) -> String {
    let chunks = body.chunks_exact(4);
    let truncated = !chunks.remainder().is_empty();

    let mut text: String = chunks
        .map(|c| char::from_u32(read([c[0], c[1], c[2], c[3]])).unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    if truncated {
        text.push(char::REPLACEMENT_CHARACTER);
    }
    text
}
