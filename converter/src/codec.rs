// codec.rs — Hex byte-list decoding
//
// Array initializer bodies in the declarations header are lines like
// `0x84, 0xa0, 0x1c,`. This module turns one such line into bytes.

use std::fmt;

/// A token that is not a hex byte. Callers attach file and line context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedByteToken {
    pub token: String,
}

impl fmt::Display for MalformedByteToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed byte token '{}'", self.token)
    }
}

impl std::error::Error for MalformedByteToken {}

/// Decode a comma-separated list of hex bytes.
///
/// A trailing empty token (the dangling comma the generator leaves at the end
/// of every row) ends the line. An empty line decodes to no bytes.
pub fn decode_line(line: &str) -> Result<Vec<u8>, MalformedByteToken> {
    let mut out = Vec::with_capacity(line.len() / 5 + 1);
    decode_line_into(line, &mut out)?;
    Ok(out)
}

/// Like [`decode_line`], appending to `out`. On error `out` may hold the
/// bytes decoded before the bad token.
pub fn decode_line_into(line: &str, out: &mut Vec<u8>) -> Result<(), MalformedByteToken> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(());
    }

    let mut tokens = line.split(',').map(str::trim).peekable();
    while let Some(token) = tokens.next() {
        if token.is_empty() && tokens.peek().is_none() {
            break;
        }
        out.push(parse_hex_byte(token)?);
    }
    Ok(())
}

fn parse_hex_byte(token: &str) -> Result<u8, MalformedByteToken> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    // from_str_radix accepts a leading '+', hex tokens never carry one
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(MalformedByteToken {
            token: token.to_string(),
        });
    }
    u8::from_str_radix(digits, 16).map_err(|_| MalformedByteToken {
        token: token.to_string(),
    })
}
