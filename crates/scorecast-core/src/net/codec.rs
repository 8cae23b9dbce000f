//! Little-endian binary reader and writer for the duplex channel.
//!
//! Every value is written with a fixed width and read back in the exact
//! order it was written. Text carries a `u64` length prefix; optional values
//! carry a one-byte presence flag. There is no self-description on the wire:
//! reader and writer must agree on the field layout of each message.

use thiserror::Error;

/// Errors raised while decoding a binary frame or a broadcast event.
///
/// All of these are fatal for the connection that produced them: the stream
/// is considered desynchronized and must be dropped rather than resumed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("empty message")]
    EmptyMessage,
    #[error("unexpected end of message: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEnd { needed: u64, remaining: usize },
    #[error("invalid bool byte: 0x{0:02x}")]
    InvalidBool(u8),
    #[error("text is not valid UTF-8")]
    InvalidUtf8,
    #[error("unknown opcode: 0x{0:02x}")]
    UnknownOpcode(u8),
    #[error("invalid alliance: {0}")]
    InvalidAlliance(u8),
    #[error("invalid game setup kind: {0}")]
    InvalidSetupKind(u8),
    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),
    #[error("malformed broadcast event: {0}")]
    MalformedEvent(String),
}

/// A value that can be appended to a [`PacketWriter`].
pub trait Encode {
    fn encode(&self, writer: &mut PacketWriter);
}

/// A value that can be read back from a [`PacketReader`].
pub trait Decode: Sized {
    fn decode(reader: &mut PacketReader<'_>) -> Result<Self, DecodeError>;
}

/// Append-only byte buffer for one outbound message.
#[derive(Debug, Default)]
pub struct PacketWriter {
    bytes: Vec<u8>,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a message with its opcode byte.
    pub fn with_opcode(opcode: u8) -> Self {
        let mut writer = Self::new();
        writer.write(&opcode);
        writer
    }

    pub fn write<T: Encode + ?Sized>(&mut self, value: &T) {
        value.encode(self);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Cursor over one inbound message.
#[derive(Debug)]
pub struct PacketReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn read<T: Decode>(&mut self) -> Result<T, DecodeError> {
        T::decode(self)
    }

    /// Borrow the next `len` bytes, failing if the message is shorter.
    pub fn take(&mut self, len: u64) -> Result<&'a [u8], DecodeError> {
        let remaining = self.remaining();
        let end = usize::try_from(len)
            .ok()
            .filter(|&n| n <= remaining)
            .map(|n| self.pos + n)
            .ok_or(DecodeError::UnexpectedEnd {
                needed: len,
                remaining,
            })?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let bytes = self.take(N as u64)?;
        let mut array = [0u8; N];
        array.copy_from_slice(bytes);
        Ok(array)
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// True once every byte of the message has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Assert that a fixed-layout message has been read completely.
    pub fn finish(self) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(DecodeError::TrailingBytes(n)),
        }
    }
}

macro_rules! impl_le_primitive {
    ($($t:ty),* $(,)?) => {
        $(
            impl Encode for $t {
                fn encode(&self, writer: &mut PacketWriter) {
                    writer.write_bytes(&self.to_le_bytes());
                }
            }

            impl Decode for $t {
                fn decode(reader: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
                    Ok(<$t>::from_le_bytes(reader.read_array()?))
                }
            }
        )*
    };
}

impl_le_primitive!(u8, i8, u16, u32, u64);

impl Encode for bool {
    fn encode(&self, writer: &mut PacketWriter) {
        writer.write(&u8::from(*self));
    }
}

impl Decode for bool {
    fn decode(reader: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        match reader.read::<u8>()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(DecodeError::InvalidBool(other)),
        }
    }
}

impl Encode for str {
    fn encode(&self, writer: &mut PacketWriter) {
        writer.write(&(self.len() as u64));
        writer.write_bytes(self.as_bytes());
    }
}

impl Encode for String {
    fn encode(&self, writer: &mut PacketWriter) {
        self.as_str().encode(writer);
    }
}

impl Decode for String {
    fn decode(reader: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        let len = reader.read::<u64>()?;
        let bytes = reader.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8)
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, writer: &mut PacketWriter) {
        writer.write(&self.is_some());
        if let Some(value) = self {
            writer.write(value);
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(reader: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        if reader.read::<bool>()? {
            Ok(Some(reader.read()?))
        } else {
            Ok(None)
        }
    }
}
