//! Utilities used by the trace codec: parse error type and little-endian
//! byte readers/writers.
use std::fmt;

/// Error type returned by the trace parsing helpers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Input ended while a command payload was still expected.
    UnexpectedEof,

    /// An attempted read was outside the available buffer range.
    ///
    /// - `offset` is the index that was attempted to be accessed.
    /// - `needed` is the number of bytes required for the operation.
    /// - `available` is the current buffer length.
    /// - `context` optionally names the field being read (for example
    ///   `"header_size"` or `"memory_block"`).
    OffsetOutOfRange {
        offset: usize,
        needed: usize,
        available: usize,
        context: Option<String>,
    },

    /// The four-byte identifier at the start of the file was not `PSCN`.
    InvalidIdent([u8; 4]),

    /// The trace uses a format version this parser does not understand.
    UnsupportedVersion(u32),

    /// A header was shorter than the minimum required length.
    HeaderTooShort(String),

    /// A length-prefixed string field did not hold valid UTF-8.
    InvalidString(String),

    /// A command opcode byte was not recognized.
    UnknownOpcode { opcode: u8, offset: usize },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedEof => write!(f, "unexpected end of input"),
            ParseError::OffsetOutOfRange {
                offset,
                needed,
                available,
                context,
            } => match context {
                Some(ctx) => write!(
                    f,
                    "offset out of range at {}: 0x{:X} (needed {} bytes, available {})",
                    ctx, offset, needed, available
                ),
                None => write!(
                    f,
                    "offset out of range: 0x{:X} (needed {} bytes, available {})",
                    offset, needed, available
                ),
            },
            ParseError::InvalidIdent(id) => write!(f, "invalid ident: {:?}", id),
            ParseError::UnsupportedVersion(v) => {
                write!(f, "unsupported trace version: 0x{:04X}", v)
            }
            ParseError::HeaderTooShort(name) => write!(f, "header too short: {}", name),
            ParseError::InvalidString(field) => write!(f, "invalid UTF-8 in {}", field),
            ParseError::UnknownOpcode { opcode, offset } => write!(
                f,
                "unknown opcode 0x{:02X} at offset 0x{:X}",
                opcode, offset
            ),
        }
    }
}

impl std::error::Error for ParseError {}

fn out_of_range(bytes: &[u8], off: usize, needed: usize) -> ParseError {
    ParseError::OffsetOutOfRange {
        offset: off,
        needed,
        available: bytes.len(),
        context: None,
    }
}

/// Read a 32-bit little-endian unsigned integer from `bytes` at `off`.
pub fn read_u32_le_at(bytes: &[u8], off: usize) -> Result<u32, ParseError> {
    let raw = bytes
        .get(off..off.saturating_add(4))
        .ok_or_else(|| out_of_range(bytes, off, 4))?;
    let mut tmp = [0_u8; 4];
    tmp.copy_from_slice(raw);
    Ok(u32::from_le_bytes(tmp))
}

/// Read a 16-bit little-endian unsigned integer from `bytes` at `off`.
pub fn read_u16_le_at(bytes: &[u8], off: usize) -> Result<u16, ParseError> {
    let raw = bytes
        .get(off..off.saturating_add(2))
        .ok_or_else(|| out_of_range(bytes, off, 2))?;
    Ok(u16::from_le_bytes([raw[0], raw[1]]))
}

/// Read a single byte from `bytes` at `off`.
pub fn read_u8_at(bytes: &[u8], off: usize) -> Result<u8, ParseError> {
    bytes
        .get(off)
        .copied()
        .ok_or_else(|| out_of_range(bytes, off, 1))
}

/// Read a 32-bit little-endian signed integer from `bytes` at `off`.
pub fn read_i32_le_at(bytes: &[u8], off: usize) -> Result<i32, ParseError> {
    let v = read_u32_le_at(bytes, off)?;
    Ok(i32::from_le_bytes(v.to_le_bytes()))
}

/// Return a borrowed slice of length `len` starting at `off` from `bytes`.
///
/// The error reports the number of bytes remaining after `off`, and names
/// `context` as the field being read.
pub fn read_slice<'a>(
    bytes: &'a [u8],
    off: usize,
    len: usize,
    context: &str,
) -> Result<&'a [u8], ParseError> {
    bytes
        .get(off..off.saturating_add(len))
        .ok_or_else(|| ParseError::OffsetOutOfRange {
            offset: off,
            needed: len,
            available: bytes.len().saturating_sub(off),
            context: Some(context.into()),
        })
}

/// Read a `u16`-length-prefixed UTF-8 string at `off`.
///
/// Returns the decoded string (empty strings map to `None`) and the number
/// of bytes consumed including the prefix.
pub fn read_str_at(
    bytes: &[u8],
    off: usize,
    context: &str,
) -> Result<(Option<String>, usize), ParseError> {
    let len = read_u16_le_at(bytes, off)? as usize;
    let raw = read_slice(bytes, off + 2, len, context)?;
    let s = std::str::from_utf8(raw).map_err(|_| ParseError::InvalidString(context.into()))?;
    let value = (!s.is_empty()).then(|| s.to_string());
    Ok((value, 2 + len))
}

/// Append `v` to `out` as four little-endian bytes.
pub fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Append `v` to `out` as four little-endian bytes (two's complement).
pub fn push_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Append `v` to `out` as two little-endian bytes.
pub fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Append an optional string as a `u16` length prefix followed by UTF-8 bytes.
///
/// `None` is written as an empty string. Strings longer than `u16::MAX`
/// bytes are cut at the last character boundary that fits.
pub fn push_str(out: &mut Vec<u8>, s: Option<&str>) {
    let s = s.unwrap_or("");
    let mut end = s.len().min(u16::MAX as usize);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    push_u16(out, end as u16);
    out.extend_from_slice(&s.as_bytes()[..end]);
}

/// Overwrite four bytes of `buf` at `off` with `v` in little-endian order.
///
/// Callers must ensure the destination range is valid.
pub fn write_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}
