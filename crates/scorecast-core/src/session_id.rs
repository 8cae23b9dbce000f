use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::net::codec::{Decode, DecodeError, Encode, PacketReader, PacketWriter};

const RADIX: u32 = 36;

/// Identifier of a live session. Shown and typed in base-36.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid session id: {0:?}")]
pub struct ParseSessionIdError(pub String);

impl SessionId {
    /// Lowercase base-36 rendering used in URLs.
    pub fn to_base36(self) -> String {
        let mut n = self.0;
        if n == 0 {
            return "0".to_string();
        }
        let mut digits = Vec::new();
        while n > 0 {
            // n % 36 < 36, always a valid digit
            if let Some(c) = char::from_digit(n % RADIX, RADIX) {
                digits.push(c);
            }
            n /= RADIX;
        }
        digits.iter().rev().collect()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base36())
    }
}

impl FromStr for SessionId {
    type Err = ParseSessionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseSessionIdError(s.to_string()));
        }
        u32::from_str_radix(trimmed, RADIX)
            .map(SessionId)
            .map_err(|_| ParseSessionIdError(s.to_string()))
    }
}

impl From<u32> for SessionId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl Encode for SessionId {
    fn encode(&self, writer: &mut PacketWriter) {
        writer.write(&self.0);
    }
}

impl Decode for SessionId {
    fn decode(reader: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        reader.read().map(SessionId)
    }
}
