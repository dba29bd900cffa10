//! Text encodings for string values.

use std::fmt;
use std::str::FromStr;

use crate::error::{MemscopeError, MemscopeResult};

/// Character encoding of strings stored in the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextEncoding
{
    /// UTF-8 (default)
    #[default]
    Utf8,
    /// ISO-8859-1, one byte per code point below U+0100
    Latin1,
    /// 7-bit ASCII
    Ascii,
}

impl TextEncoding
{
    /// Encode `text` into bytes, without a terminator.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` if `text` contains a character the encoding cannot represent.
    pub fn encode(self, text: &str) -> MemscopeResult<Vec<u8>>
    {
        match self {
            Self::Utf8 => Ok(text.as_bytes().to_vec()),
            Self::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).map_err(|_| self.unrepresentable(c)))
                .collect(),
            Self::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { Ok(c as u8) } else { Err(self.unrepresentable(c)) })
                .collect(),
        }
    }

    /// Decode bytes into a string. Invalid sequences are replaced, never rejected.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> String
    {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
            Self::Ascii => bytes.iter().map(|&b| char::from(b & 0x7f)).collect(),
        }
    }

    fn unrepresentable(self, c: char) -> MemscopeError
    {
        MemscopeError::InvalidArgument(format!("character {c:?} cannot be encoded as {self}"))
    }
}

impl fmt::Display for TextEncoding
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::Utf8 => write!(f, "utf8"),
            Self::Latin1 => write!(f, "latin1"),
            Self::Ascii => write!(f, "ascii"),
        }
    }
}

impl FromStr for TextEncoding
{
    type Err = MemscopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Self::Utf8),
            "latin1" | "binary" | "iso-8859-1" => Ok(Self::Latin1),
            "ascii" => Ok(Self::Ascii),
            _ => Err(MemscopeError::InvalidArgument(format!(
                "Unknown text encoding: {s}. Use 'utf8', 'latin1', or 'ascii'"
            ))),
        }
    }
}
