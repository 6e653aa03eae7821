//! ISO-8859-1 text codec for the Name and Comment header fields.
//!
//! Latin-1 maps every byte value N to the code point U+00NN, so decoding is
//! total. Encoding is not: code points above U+00FF have no byte, and NUL is
//! reserved on the wire as the field terminator.

use std::str::Utf8Error;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Latin1Error {
    #[error("character {ch:?} at index {index} is outside Latin-1")]
    OutOfRange { ch: char, index: usize },
    #[error("embedded NUL at index {index}")]
    EmbeddedNul { index: usize },
    #[error("text is not valid UTF-8: {0}")]
    InvalidText(#[from] Utf8Error),
}

/// Decode Latin-1 bytes into a `String`.
pub fn decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Encode text as Latin-1 bytes.
///
/// Fails without partial output if any character is NUL or above U+00FF.
/// `index` in the error is the byte offset into `text`.
pub fn encode(text: &str) -> Result<Vec<u8>, Latin1Error> {
    let mut out = Vec::with_capacity(text.len());
    for (index, ch) in text.char_indices() {
        match u8::try_from(ch) {
            Ok(0) => return Err(Latin1Error::EmbeddedNul { index }),
            Ok(b) => out.push(b),
            Err(_) => return Err(Latin1Error::OutOfRange { ch, index }),
        }
    }
    Ok(out)
}

/// Encode host text given as raw UTF-8 bytes.
pub fn encode_utf8(bytes: &[u8]) -> Result<Vec<u8>, Latin1Error> {
    encode(std::str::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const LATIN1: &[u8] = &[0xc4, b'u', 0xdf, b'e', b'r', b'u', b'n', b'g'];
    const UTF8: &str = "\u{c4}u\u{df}erung";

    #[test]
    fn decode_maps_bytes_to_code_points() {
        assert_eq!(decode(LATIN1), UTF8);
        assert_eq!(decode(&[]), "");
        assert_eq!(decode(&[0xff]), "\u{ff}");
    }

    #[test]
    fn encode_maps_code_points_to_bytes() {
        assert_eq!(encode(UTF8).unwrap(), LATIN1);
        assert_eq!(encode("L\u{e1}tin-1").unwrap(), b"L\xe1tin-1");
    }

    #[test]
    fn encode_rejects_nul() {
        assert_eq!(
            encode("ab\0c"),
            Err(Latin1Error::EmbeddedNul { index: 2 })
        );
        assert!(encode("\0").is_err());
    }

    #[test]
    fn encode_rejects_wide_characters() {
        assert_eq!(
            encode("a\u{100}"),
            Err(Latin1Error::OutOfRange {
                ch: '\u{100}',
                index: 1
            })
        );
        assert!(matches!(
            encode("\u{65e5}\u{672c}"),
            Err(Latin1Error::OutOfRange { .. })
        ));
    }

    #[test]
    fn encode_utf8_rejects_invalid_text() {
        assert!(matches!(
            encode_utf8(b"invalid UTF-8 also \xffails"),
            Err(Latin1Error::InvalidText(_))
        ));
        assert_eq!(encode_utf8("caf\u{e9}".as_bytes()).unwrap(), b"caf\xe9");
    }

    proptest! {
        #[test]
        fn round_trips_every_encodable_string(s in "[\u{1}-\u{ff}]*") {
            let bytes = encode(&s).unwrap();
            prop_assert_eq!(bytes.len(), s.chars().count());
            prop_assert_eq!(decode(&bytes), s);
        }

        #[test]
        fn decode_never_fails(bytes in proptest::collection::vec(1u8..=255, 0..64)) {
            let text = decode(&bytes);
            prop_assert_eq!(encode(&text).unwrap(), bytes);
        }
    }
}
