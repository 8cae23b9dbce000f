use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::net::codec::{Decode, DecodeError, Encode, PacketReader, PacketWriter};

/// Score events address definitions with a `u8`, so at most this many exist.
pub const MAX_SCORE_POINTS: usize = u8::MAX as usize + 1;

/// A named, categorized, point-valued scoring opportunity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScorePointDefinition {
    pub name: String,
    pub category: String,
    /// Negative values are penalties.
    pub points: i8,
}

/// The static shape of a match. Immutable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameDefinition {
    #[serde(rename = "duration")]
    pub duration_secs: u16,
    /// Ordered: score events reference entries by index.
    pub score_points: Vec<ScorePointDefinition>,
}

/// An unvalidated score point as entered during match setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScorePointDraft {
    pub name: String,
    pub category: String,
    pub points: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("duration {0}s does not fit in 16 bits")]
    DurationOutOfRange(u32),
    #[error("score point {index} has {points} points (must be within -128..=127)")]
    PointsOutOfRange { index: usize, points: i32 },
    #[error("score point {index} is worth zero points")]
    ZeroPoints { index: usize },
    #[error("score point {index} has an empty name")]
    EmptyName { index: usize },
    #[error("score point {index} has an empty category")]
    EmptyCategory { index: usize },
    #[error("{0} score points defined (max {MAX_SCORE_POINTS})")]
    TooManyScorePoints(usize),
}

impl GameDefinition {
    pub fn new(duration_secs: u16, score_points: Vec<ScorePointDefinition>) -> Self {
        Self {
            duration_secs,
            score_points,
        }
    }

    /// Validate a definition entered at setup time.
    pub fn author(
        duration_secs: u32,
        drafts: impl IntoIterator<Item = ScorePointDraft>,
    ) -> Result<Self, DefinitionError> {
        let duration_secs = u16::try_from(duration_secs)
            .map_err(|_| DefinitionError::DurationOutOfRange(duration_secs))?;

        let mut score_points = Vec::new();
        for (index, draft) in drafts.into_iter().enumerate() {
            if draft.name.trim().is_empty() {
                return Err(DefinitionError::EmptyName { index });
            }
            if draft.category.trim().is_empty() {
                return Err(DefinitionError::EmptyCategory { index });
            }
            if draft.points == 0 {
                return Err(DefinitionError::ZeroPoints { index });
            }
            let points = i8::try_from(draft.points).map_err(|_| {
                DefinitionError::PointsOutOfRange {
                    index,
                    points: draft.points,
                }
            })?;
            score_points.push(ScorePointDefinition {
                name: draft.name,
                category: draft.category,
                points,
            });
        }

        if score_points.len() > MAX_SCORE_POINTS {
            return Err(DefinitionError::TooManyScorePoints(score_points.len()));
        }

        Ok(Self::new(duration_secs, score_points))
    }

    pub fn score_point(&self, index: u8) -> Option<&ScorePointDefinition> {
        self.score_points.get(usize::from(index))
    }

    /// Distinct categories in order of first appearance.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for sp in &self.score_points {
            if !seen.contains(&sp.category.as_str()) {
                seen.push(&sp.category);
            }
        }
        seen
    }
}

/// Convert whole minutes to a wire duration.
pub fn duration_from_minutes(minutes: u16) -> Result<u16, DefinitionError> {
    minutes
        .checked_mul(60)
        .ok_or(DefinitionError::DurationOutOfRange(u32::from(minutes) * 60))
}

/// Signed label for a point value: `+5`, `-2`.
pub fn points_label(points: i64) -> String {
    let sign = if points < 0 { '-' } else { '+' };
    format!("{sign}{}", points.unsigned_abs())
}

impl Encode for GameDefinition {
    fn encode(&self, writer: &mut PacketWriter) {
        writer.write(&self.duration_secs);
        for sp in &self.score_points {
            writer.write(&sp.name);
            writer.write(&sp.category);
            writer.write(&sp.points);
        }
    }
}

impl Decode for GameDefinition {
    /// Consumes the rest of the message: the score-point list has no count
    /// and ends with the frame.
    fn decode(reader: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        let duration_secs = reader.read()?;
        let mut score_points = Vec::new();
        while !reader.is_exhausted() {
            score_points.push(ScorePointDefinition {
                name: reader.read()?,
                category: reader.read()?,
                points: reader.read()?,
            });
        }
        Ok(Self::new(duration_secs, score_points))
    }
}
