//! Opcode-tagged messages exchanged on the duplex channel.
//!
//! Names follow the server's point of view: `Clientbound*` packets are
//! received by a client, `Serverbound*` packets are sent by one.

use crate::alliance::Alliance;
use crate::game::GameDefinition;
use crate::session::ClockAnchor;
use crate::session_id::SessionId;

use super::codec::{DecodeError, PacketReader, PacketWriter};

/// A message with a one-byte opcode followed by its fields.
pub trait Packet: Sized {
    fn opcode(&self) -> u8;

    fn write_fields(&self, writer: &mut PacketWriter);

    /// Read the fields of the message identified by `opcode`.
    fn read_fields(opcode: u8, reader: &mut PacketReader<'_>) -> Result<Self, DecodeError>;

    fn to_bytes(&self) -> Vec<u8> {
        let mut writer = PacketWriter::with_opcode(self.opcode());
        self.write_fields(&mut writer);
        writer.into_bytes()
    }

    /// Decode one complete frame. Bytes left over after the fields are an error.
    fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        let (&opcode, rest) = data.split_first().ok_or(DecodeError::EmptyMessage)?;
        let mut reader = PacketReader::new(rest);
        let packet = Self::read_fields(opcode, &mut reader)?;
        reader.finish()?;
        Ok(packet)
    }
}

/// How the host chooses the game for a new session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameSetup {
    /// Index into the server's builtin game catalog.
    Builtin(u64),
    Custom(GameDefinition),
}

/// Host → server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerboundHostPacket {
    StartGame { time_started: u64 },
    EndGame,
    PauseGame,
    UnpauseGame { paused_duration: u64 },
    /// First frame on a new host connection.
    SetupGame(GameSetup),
    RevealScore,
}

impl Packet for ServerboundHostPacket {
    fn opcode(&self) -> u8 {
        match self {
            Self::StartGame { .. } => 0,
            Self::EndGame => 1,
            Self::PauseGame => 2,
            Self::UnpauseGame { .. } => 3,
            Self::SetupGame(_) => 4,
            Self::RevealScore => 5,
        }
    }

    fn write_fields(&self, writer: &mut PacketWriter) {
        match self {
            Self::StartGame { time_started } => writer.write(time_started),
            Self::UnpauseGame { paused_duration } => writer.write(paused_duration),
            Self::SetupGame(GameSetup::Builtin(id)) => {
                writer.write(&0u8);
                writer.write(id);
            },
            Self::SetupGame(GameSetup::Custom(game)) => {
                writer.write(&1u8);
                writer.write(game);
            },
            Self::EndGame | Self::PauseGame | Self::RevealScore => {},
        }
    }

    fn read_fields(opcode: u8, reader: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        Ok(match opcode {
            0 => Self::StartGame {
                time_started: reader.read()?,
            },
            1 => Self::EndGame,
            2 => Self::PauseGame,
            3 => Self::UnpauseGame {
                paused_duration: reader.read()?,
            },
            4 => match reader.read::<u8>()? {
                0 => Self::SetupGame(GameSetup::Builtin(reader.read()?)),
                1 => Self::SetupGame(GameSetup::Custom(reader.read()?)),
                kind => return Err(DecodeError::InvalidSetupKind(kind)),
            },
            5 => Self::RevealScore,
            other => return Err(DecodeError::UnknownOpcode(other)),
        })
    }
}

/// Server → host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientboundHostPacket {
    /// Sent once the session has been created from the host's setup.
    SessionInfo {
        session_id: SessionId,
        game: GameDefinition,
    },
    /// A score reported by one of the participants.
    Score {
        alliance: Alliance,
        score_point: u8,
        undo: bool,
    },
}

impl Packet for ClientboundHostPacket {
    fn opcode(&self) -> u8 {
        match self {
            Self::SessionInfo { .. } => 0,
            Self::Score { .. } => 1,
        }
    }

    fn write_fields(&self, writer: &mut PacketWriter) {
        match self {
            Self::SessionInfo { session_id, game } => {
                writer.write(session_id);
                writer.write(game);
            },
            Self::Score {
                alliance,
                score_point,
                undo,
            } => {
                writer.write(alliance);
                writer.write(score_point);
                writer.write(undo);
            },
        }
    }

    fn read_fields(opcode: u8, reader: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        match opcode {
            0 => Ok(Self::SessionInfo {
                session_id: reader.read()?,
                game: reader.read()?,
            }),
            1 => Ok(Self::Score {
                alliance: reader.read()?,
                score_point: reader.read()?,
                undo: reader.read()?,
            }),
            other => Err(DecodeError::UnknownOpcode(other)),
        }
    }
}

/// Server → participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientboundParticipantPacket {
    SessionInfo {
        clock: ClockAnchor,
        game: GameDefinition,
    },
    StartGame {
        time_started: u64,
    },
    EndGame,
    PauseGame,
    UnpauseGame {
        paused_duration: u64,
    },
}

impl Packet for ClientboundParticipantPacket {
    fn opcode(&self) -> u8 {
        match self {
            Self::SessionInfo { .. } => 0,
            Self::StartGame { .. } => 1,
            Self::EndGame => 2,
            Self::PauseGame => 3,
            Self::UnpauseGame { .. } => 4,
        }
    }

    fn write_fields(&self, writer: &mut PacketWriter) {
        match self {
            Self::SessionInfo { clock, game } => {
                writer.write(clock);
                writer.write(game);
            },
            Self::StartGame { time_started } => writer.write(time_started),
            Self::UnpauseGame { paused_duration } => writer.write(paused_duration),
            Self::EndGame | Self::PauseGame => {},
        }
    }

    fn read_fields(opcode: u8, reader: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        Ok(match opcode {
            0 => Self::SessionInfo {
                clock: reader.read()?,
                game: reader.read()?,
            },
            1 => Self::StartGame {
                time_started: reader.read()?,
            },
            2 => Self::EndGame,
            3 => Self::PauseGame,
            4 => Self::UnpauseGame {
                paused_duration: reader.read()?,
            },
            other => return Err(DecodeError::UnknownOpcode(other)),
        })
    }
}

/// Participant → server. The alliance is fixed by the connection URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerboundParticipantPacket {
    Score { score_point: u8, undo: bool },
}

impl Packet for ServerboundParticipantPacket {
    fn opcode(&self) -> u8 {
        match self {
            Self::Score { .. } => 0,
        }
    }

    fn write_fields(&self, writer: &mut PacketWriter) {
        match self {
            Self::Score { score_point, undo } => {
                writer.write(score_point);
                writer.write(undo);
            },
        }
    }

    fn read_fields(opcode: u8, reader: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        match opcode {
            0 => Ok(Self::Score {
                score_point: reader.read()?,
                undo: reader.read()?,
            }),
            other => Err(DecodeError::UnknownOpcode(other)),
        }
    }
}
