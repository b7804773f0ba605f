//! NMEA-style ASCII sentences: `$<body>*<XX>\r\n`.
//!
//! `XX` is the two-digit hex XOR of every body byte (between `$` and `*`).

use std::ops::Range;

use crate::error::{FrameError, Result};

/// Sentence start marker.
pub const SENTENCE_START: u8 = b'$';

/// Separator between body and checksum digits.
pub const CHECKSUM_MARKER: u8 = b'*';

/// A validated sentence borrowed from its source buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence<'a> {
    /// Bytes between `$` and `*`.
    pub body: &'a [u8],
    pub checksum: u8,
    /// `$` through the last checksum digit (line ending excluded).
    pub span: Range<usize>,
}

impl<'a> Sentence<'a> {
    /// Body as text, when it is valid UTF-8.
    pub fn body_str(&self) -> Option<&'a str> {
        std::str::from_utf8(self.body).ok()
    }

    /// Comma-separated fields of the body; the first is the message id.
    pub fn fields(&self) -> impl Iterator<Item = &'a [u8]> {
        self.body.split(|&b| b == b',')
    }
}

/// XOR of all bytes.
pub fn xor_checksum(body: &[u8]) -> u8 {
    body.iter().fold(0, |acc, &b| acc ^ b)
}

/// Build a complete sentence from its body. A leading `$` is accepted.
pub fn encode_sentence(body: &str) -> String {
    let body = body.strip_prefix('$').unwrap_or(body);
    format!("${body}*{:02X}\r\n", xor_checksum(body.as_bytes()))
}

/// Decode the first sentence in `src`.
///
/// Unparseable checksum digits are reported as a checksum mismatch against 0.
pub fn decode_sentence(src: &[u8]) -> Result<Sentence<'_>> {
    let start = src
        .iter()
        .position(|&b| b == SENTENCE_START)
        .ok_or(FrameError::NoFrame)?;
    let rest = &src[start + 1..];

    let line_len = rest
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(rest.len());
    let line = &rest[..line_len];

    let Some(star) = line.iter().position(|&b| b == CHECKSUM_MARKER) else {
        return Err(FrameError::Truncated {
            needed: line.len() + 4,
            available: line.len() + 1,
        });
    };
    let digits = &line[star + 1..];
    if digits.len() < 2 {
        return Err(FrameError::Truncated {
            needed: star + 4,
            available: line.len() + 1,
        });
    }

    let body = &line[..star];
    let computed = xor_checksum(body);
    let expected = parse_hex_byte(digits[0], digits[1]).ok_or(FrameError::ChecksumInvalid {
        expected: 0,
        computed: u16::from(computed),
    })?;
    if expected != computed {
        return Err(FrameError::ChecksumInvalid {
            expected: u16::from(expected),
            computed: u16::from(computed),
        });
    }

    Ok(Sentence {
        body,
        checksum: computed,
        span: start..start + star + 4,
    })
}

fn parse_hex_byte(hi: u8, lo: u8) -> Option<u8> {
    let hi = (hi as char).to_digit(16)?;
    let lo = (lo as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}
