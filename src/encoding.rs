/*!
 * Byte-order-mark detection and text decoding
 */

use tracing::warn;

/// Text encodings recognised by their byte-order mark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-8 without a BOM
    Utf8,
    /// UTF-8 with a leading EF BB BF
    Utf8Bom,
    /// UTF-16 little endian (FF FE)
    Utf16Le,
    /// UTF-16 big endian (FE FF)
    Utf16Be,
}

impl TextEncoding {
    /// Inspect the leading bytes for a BOM; defaults to UTF-8
    pub fn detect(bytes: &[u8]) -> Self {
        match bytes {
            [0xEF, 0xBB, 0xBF, ..] => Self::Utf8Bom,
            [0xFF, 0xFE, ..] => Self::Utf16Le,
            [0xFE, 0xFF, ..] => Self::Utf16Be,
            _ => Self::Utf8,
        }
    }

    /// Length of the BOM in bytes
    pub fn bom_len(self) -> usize {
        match self {
            Self::Utf8 => 0,
            Self::Utf8Bom => 3,
            Self::Utf16Le | Self::Utf16Be => 2,
        }
    }
}

/// Decode bytes to a String, honouring any BOM.
///
/// Invalid sequences are replaced with U+FFFD and reported once through `warn!`
/// tagged with `origin`.
pub fn decode_text(bytes: &[u8], origin: &str) -> String {
    let encoding = TextEncoding::detect(bytes);
    let body = &bytes[encoding.bom_len()..];

    match encoding {
        TextEncoding::Utf8 | TextEncoding::Utf8Bom => match std::str::from_utf8(body) {
            Ok(text) => text.to_string(),
            Err(e) => {
                warn!("{}: invalid UTF-8 ({}), replacing bad sequences", origin, e);
                String::from_utf8_lossy(body).into_owned()
            }
        },
        TextEncoding::Utf16Le | TextEncoding::Utf16Be => {
            if body.len() % 2 != 0 {
                warn!("{}: odd byte count for UTF-16 input, last byte dropped", origin);
            }
            let units = body.chunks_exact(2).map(|pair| {
                if encoding == TextEncoding::Utf16Le {
                    u16::from_le_bytes([pair[0], pair[1]])
                } else {
                    u16::from_be_bytes([pair[0], pair[1]])
                }
            });

            let mut replaced = false;
            let text: String = char::decode_utf16(units)
                .map(|r| {
                    r.unwrap_or_else(|_| {
                        replaced = true;
                        char::REPLACEMENT_CHARACTER
                    })
                })
                .collect();
            if replaced {
                warn!("{}: unpaired UTF-16 surrogates replaced", origin);
            }
            text
        }
    }
}
