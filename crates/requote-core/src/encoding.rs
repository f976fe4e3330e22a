//! Text encodings for the input and output endpoints

use crate::error::{Error, Result};
use encoding_rs::{DecoderResult, Encoder, EncoderResult, Encoding, UTF_8};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// An encoding resolved from a WHATWG label (`utf-8`, `latin1`, `shift_jis`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TextEncoding(&'static Encoding);

impl Default for TextEncoding {
    fn default() -> Self {
        Self(UTF_8)
    }
}

impl TextEncoding {
    /// Look up an encoding by label, case-insensitively
    pub fn for_label(label: &str) -> Result<Self> {
        Encoding::for_label(label.trim().as_bytes())
            .map(Self)
            .ok_or_else(|| Error::UnknownEncoding(label.to_string()))
    }

    /// Canonical name (e.g. "UTF-8", "windows-1252")
    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    pub fn is_utf8(&self) -> bool {
        self.0 == UTF_8
    }

    /// Decode a whole input buffer, stopping at the first invalid byte sequence
    ///
    /// A byte order mark for this encoding is removed. On failure the text
    /// decoded so far is handed back so the caller can locate the record.
    pub(crate) fn decode(&self, bytes: &[u8]) -> std::result::Result<String, Undecodable> {
        let mut decoder = self.0.new_decoder_with_bom_removal();
        let mut text = String::with_capacity(
            decoder
                .max_utf8_buffer_length_without_replacement(bytes.len())
                .unwrap_or(bytes.len()),
        );

        let mut consumed = 0;
        loop {
            let (result, read) =
                decoder.decode_to_string_without_replacement(&bytes[consumed..], &mut text, true);
            consumed += read;

            match result {
                DecoderResult::InputEmpty => return Ok(text),
                DecoderResult::OutputFull => {
                    let more = decoder
                        .max_utf8_buffer_length_without_replacement(bytes.len() - consumed)
                        .unwrap_or(bytes.len() - consumed);
                    text.reserve(more.max(4));
                }
                DecoderResult::Malformed(bad, after) => {
                    return Err(Undecodable {
                        offset: consumed.saturating_sub(after as usize + bad as usize),
                        valid_prefix: text,
                    });
                }
            }
        }
    }

    /// Create a stateful encoder for writing records in this encoding
    pub(crate) fn output_encoder(&self) -> OutputEncoder {
        let target = self.0.output_encoding();
        if target != self.0 {
            warn!(
                requested = self.0.name(),
                actual = target.name(),
                "no encoder for requested encoding, writing its output encoding instead"
            );
        }

        let encoder = if target == UTF_8 {
            None
        } else {
            Some(target.new_encoder())
        };

        OutputEncoder { target, encoder }
    }
}

impl FromStr for TextEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::for_label(s)
    }
}

impl TryFrom<String> for TextEncoding {
    type Error = Error;

    fn try_from(label: String) -> Result<Self> {
        Self::for_label(&label)
    }
}

impl From<TextEncoding> for String {
    fn from(encoding: TextEncoding) -> Self {
        encoding.name().to_string()
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where decoding failed
#[derive(Debug)]
pub(crate) struct Undecodable {
    /// Offset of the first invalid byte in the raw input
    pub offset: usize,
    /// Text decoded before that byte
    pub valid_prefix: String,
}

/// Encodes record text into output bytes, keeping encoder state across records
pub(crate) struct OutputEncoder {
    target: &'static Encoding,
    encoder: Option<Encoder>,
}

impl OutputEncoder {
    /// Append the encoded form of `text` to `out`
    ///
    /// `record` is only used to locate an unmappable character in the error.
    pub(crate) fn encode(&mut self, text: &str, record: usize, out: &mut Vec<u8>) -> Result<()> {
        self.encode_chunk(text, false, record, out)
    }

    /// Flush any trailing state (e.g. a shift sequence back to ASCII)
    pub(crate) fn finish(&mut self, record: usize, out: &mut Vec<u8>) -> Result<()> {
        self.encode_chunk("", true, record, out)
    }

    fn encode_chunk(
        &mut self,
        text: &str,
        last: bool,
        record: usize,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let Some(encoder) = self.encoder.as_mut() else {
            out.extend_from_slice(text.as_bytes());
            return Ok(());
        };

        let mut remaining = text;
        loop {
            let needed = encoder
                .max_buffer_length_from_utf8_without_replacement(remaining.len())
                .unwrap_or(remaining.len());
            out.reserve(needed.max(8));

            let (result, read) =
                encoder.encode_from_utf8_to_vec_without_replacement(remaining, out, last);
            remaining = &remaining[read..];

            match result {
                EncoderResult::InputEmpty => return Ok(()),
                EncoderResult::OutputFull => continue,
                EncoderResult::Unmappable(ch) => {
                    return Err(Error::Unencodable {
                        record,
                        ch,
                        encoding: self.target.name().to_string(),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_label_is_case_insensitive() {
        assert_eq!(TextEncoding::for_label("UTF-8").unwrap(), TextEncoding::default());
        assert_eq!(TextEncoding::for_label("utf8").unwrap(), TextEncoding::default());
        assert_eq!(TextEncoding::for_label("Latin1").unwrap().name(), "windows-1252");
    }

    #[test]
    fn test_unknown_label() {
        assert!(matches!(
            TextEncoding::for_label("klingon"),
            Err(Error::UnknownEncoding(_))
        ));
    }

    #[test]
    fn test_decode_utf8_strips_bom() {
        let text = TextEncoding::default()
            .decode(b"\xEF\xBB\xBFname,value\n")
            .unwrap();
        assert_eq!(text, "name,value\n");
    }

    #[test]
    fn test_decode_reports_offset_of_invalid_byte() {
        let err = TextEncoding::default().decode(b"ab,c\n\xFFd\n").unwrap_err();
        assert_eq!(err.offset, 5);
        assert_eq!(err.valid_prefix, "ab,c\n");
    }

    #[test]
    fn test_decode_reports_truncated_sequence_at_end() {
        // first two bytes of a three-byte sequence
        let err = TextEncoding::default().decode(b"abc\xE2\x82").unwrap_err();
        assert_eq!(err.offset, 3);
        assert_eq!(err.valid_prefix, "abc");
    }

    #[test]
    fn test_decode_latin1() {
        let latin1 = TextEncoding::for_label("latin1").unwrap();
        assert_eq!(latin1.decode(b"caf\xE9").unwrap(), "café");
    }

    #[test]
    fn test_encode_latin1() {
        let latin1 = TextEncoding::for_label("latin1").unwrap();
        let mut encoder = latin1.output_encoder();
        let mut out = Vec::new();
        encoder.encode("café", 0, &mut out).unwrap();
        encoder.finish(0, &mut out).unwrap();
        assert_eq!(out, b"caf\xE9");
    }

    #[test]
    fn test_encode_unmappable_character() {
        let latin1 = TextEncoding::for_label("latin1").unwrap();
        let mut encoder = latin1.output_encoder();
        let mut out = Vec::new();
        let err = encoder.encode("snow ☃", 7, &mut out).unwrap_err();
        match err {
            Error::Unencodable { record, ch, .. } => {
                assert_eq!(record, 7);
                assert_eq!(ch, '☃');
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_serde_uses_label() {
        let encoding: TextEncoding = serde_json::from_str("\"shift_jis\"").unwrap();
        assert_eq!(encoding.name(), "Shift_JIS");
        assert_eq!(serde_json::to_string(&encoding).unwrap(), "\"Shift_JIS\"");
        assert!(serde_json::from_str::<TextEncoding>("\"nope\"").is_err());
    }
}
