use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::net::codec::{Decode, DecodeError, Encode, PacketReader, PacketWriter};

/// One of the two competing sides. Wire value 0/1, JSON `"blue"`/`"red"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Alliance {
    Blue = 0,
    Red = 1,
}

impl Alliance {
    pub const ALL: [Alliance; 2] = [Alliance::Blue, Alliance::Red];

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Blue),
            1 => Some(Self::Red),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blue => "blue",
            Self::Red => "red",
        }
    }
}

impl fmt::Display for Alliance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Alliance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blue" => Ok(Self::Blue),
            "red" => Ok(Self::Red),
            other => Err(format!("unknown alliance: {other}")),
        }
    }
}

impl Encode for Alliance {
    fn encode(&self, writer: &mut PacketWriter) {
        writer.write(&(*self as u8));
    }
}

impl Decode for Alliance {
    fn decode(reader: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        let b = reader.read::<u8>()?;
        Self::from_byte(b).ok_or(DecodeError::InvalidAlliance(b))
    }
}
