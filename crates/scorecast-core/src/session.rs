//! Client-side replica of a single match.
//!
//! The clock is never decremented in place: it is stored as two absolute
//! anchors (start instant and accumulated pause) from which the remaining
//! time is recomputed on demand. A replica that stalls or reconnects recovers
//! the exact remaining time from the next snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alliance::Alliance;
use crate::game::GameDefinition;
use crate::net::codec::{Decode, DecodeError, Encode, PacketReader, PacketWriter};

/// Lifecycle of a replica. `Paused` and `revealed` are orthogonal flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Snapshot received, clock not started yet.
    Uninitialized,
    Live,
    Ended,
}

/// Event rejected because its precondition does not hold.
///
/// The offending event is ignored and the replica is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("event received before the session snapshot")]
    NoSnapshot,
    #[error("match already started")]
    AlreadyStarted,
    #[error("match is not live ({0:?})")]
    NotLive(Phase),
    #[error("match is already paused")]
    AlreadyPaused,
    #[error("match is not paused")]
    NotPaused,
    #[error("match has not ended")]
    NotEnded,
    #[error("score point {index} out of range ({len} defined)")]
    ScorePointOutOfRange { index: u8, len: usize },
    #[error("nothing left to undo for {alliance} score point {index}")]
    NothingToUndo { alliance: Alliance, index: u8 },
    #[error("scoring is disabled while the match is not running")]
    ScoringDisabled,
    #[error("{role} role may not emit {action}")]
    NotPermitted {
        role: &'static str,
        action: &'static str,
    },
}

impl ProtocolViolation {
    /// Violations that mean the peer and this replica disagree on the game
    /// definition itself. Those desynchronize the stream and close it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ScorePointOutOfRange { .. })
    }
}

/// Absolute-time facts from which the remaining time is derived.
///
/// All instants are milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockAnchor {
    pub time_started: Option<u64>,
    pub accumulated_paused: u64,
    pub paused: bool,
    pub ended: bool,
    /// When the current pause began, as observed locally. Never transmitted.
    pub paused_at: Option<u64>,
}

impl ClockAnchor {
    pub fn phase(&self) -> Phase {
        if self.ended {
            Phase::Ended
        } else if self.time_started.is_some() {
            Phase::Live
        } else {
            Phase::Uninitialized
        }
    }
}

impl Encode for ClockAnchor {
    fn encode(&self, writer: &mut PacketWriter) {
        writer.write(&self.time_started);
        writer.write(&self.accumulated_paused);
        writer.write(&self.paused);
        writer.write(&self.ended);
    }
}

impl Decode for ClockAnchor {
    fn decode(reader: &mut PacketReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            time_started: reader.read()?,
            accumulated_paused: reader.read()?,
            paused: reader.read()?,
            ended: reader.read()?,
            paused_at: None,
        })
    }
}

/// Times a score point was scored and undone. `undone_count` never exceeds
/// `scored_count`; snapshots that break this fail to deserialize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawScoreCount")]
pub struct ScoreCount {
    #[serde(rename = "scored")]
    pub scored_count: u32,
    #[serde(rename = "undo")]
    pub undone_count: u32,
}

#[derive(Deserialize)]
struct RawScoreCount {
    scored: u32,
    undo: u32,
}

impl TryFrom<RawScoreCount> for ScoreCount {
    type Error = String;

    fn try_from(raw: RawScoreCount) -> Result<Self, Self::Error> {
        if raw.undo > raw.scored {
            return Err(format!(
                "undo count {} exceeds scored count {}",
                raw.undo, raw.scored
            ));
        }
        Ok(Self {
            scored_count: raw.scored,
            undone_count: raw.undo,
        })
    }
}

impl ScoreCount {
    pub fn net(&self) -> i64 {
        i64::from(self.scored_count) - i64::from(self.undone_count)
    }
}

/// Per-alliance scoring record keyed by score-point index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreTally {
    counts: BTreeMap<u8, ScoreCount>,
}

impl ScoreTally {
    pub fn count(&self, index: u8) -> ScoreCount {
        self.counts.get(&index).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, ScoreCount)> + '_ {
        self.counts.iter().map(|(&i, &c)| (i, c))
    }

    /// Net points across all score points. Unknown indices contribute nothing.
    pub fn total(&self, game: &GameDefinition) -> i64 {
        self.iter()
            .filter_map(|(i, c)| game.score_point(i).map(|sp| c.net() * i64::from(sp.points)))
            .sum()
    }

    /// Net points of every score point in `category`.
    pub fn category_total(&self, game: &GameDefinition, category: &str) -> i64 {
        self.iter()
            .filter_map(|(i, c)| {
                game.score_point(i)
                    .filter(|sp| sp.category == category)
                    .map(|sp| c.net() * i64::from(sp.points))
            })
            .sum()
    }

    fn entry(&mut self, index: u8) -> &mut ScoreCount {
        self.counts.entry(index).or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllianceTally {
    pub blue: ScoreTally,
    pub red: ScoreTally,
}

impl AllianceTally {
    pub fn get(&self, alliance: Alliance) -> &ScoreTally {
        match alliance {
            Alliance::Blue => &self.blue,
            Alliance::Red => &self.red,
        }
    }

    pub fn get_mut(&mut self, alliance: Alliance) -> &mut ScoreTally {
        match alliance {
            Alliance::Blue => &mut self.blue,
            Alliance::Red => &mut self.red,
        }
    }
}

/// Mutable state of one match instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub game: GameDefinition,
    pub clock: ClockAnchor,
    pub tally: AllianceTally,
    pub revealed: bool,
}

impl SessionState {
    pub fn new(game: GameDefinition) -> Self {
        Self {
            game,
            clock: ClockAnchor::default(),
            tally: AllianceTally::default(),
            revealed: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.clock.phase()
    }

    fn require_live(&self) -> Result<(), ProtocolViolation> {
        match self.phase() {
            Phase::Live => Ok(()),
            other => Err(ProtocolViolation::NotLive(other)),
        }
    }

    pub fn start(&mut self, time_started: u64) -> Result<(), ProtocolViolation> {
        if self.clock.time_started.is_some() || self.clock.ended {
            return Err(ProtocolViolation::AlreadyStarted);
        }
        self.clock.time_started = Some(time_started);
        Ok(())
    }

    /// Record a score or undo. Returns the signed point change.
    pub fn score(
        &mut self,
        alliance: Alliance,
        index: u8,
        undo: bool,
    ) -> Result<i64, ProtocolViolation> {
        self.require_live()?;
        let points = self
            .game
            .score_point(index)
            .map(|sp| i64::from(sp.points))
            .ok_or(ProtocolViolation::ScorePointOutOfRange {
                index,
                len: self.game.score_points.len(),
            })?;

        if undo {
            let count = self.tally.get(alliance).count(index);
            if count.undone_count >= count.scored_count {
                return Err(ProtocolViolation::NothingToUndo { alliance, index });
            }
            self.tally.get_mut(alliance).entry(index).undone_count += 1;
            Ok(-points)
        } else {
            self.tally.get_mut(alliance).entry(index).scored_count += 1;
            Ok(points)
        }
    }

    /// `now` is the local instant the pause is observed at.
    pub fn pause(&mut self, now: u64) -> Result<(), ProtocolViolation> {
        self.require_live()?;
        if self.clock.paused {
            return Err(ProtocolViolation::AlreadyPaused);
        }
        self.clock.paused = true;
        self.clock.paused_at = Some(now);
        Ok(())
    }

    /// `paused_duration` always comes from the host, never from a local clock.
    pub fn unpause(&mut self, paused_duration: u64) -> Result<(), ProtocolViolation> {
        self.require_live()?;
        if !self.clock.paused {
            return Err(ProtocolViolation::NotPaused);
        }
        self.clock.paused = false;
        self.clock.paused_at = None;
        self.clock.accumulated_paused = self.clock.accumulated_paused.saturating_add(paused_duration);
        Ok(())
    }

    pub fn end(&mut self) -> Result<(), ProtocolViolation> {
        self.require_live()?;
        self.clock.ended = true;
        self.clock.paused = false;
        self.clock.paused_at = None;
        Ok(())
    }

    pub fn reveal(&mut self) -> Result<(), ProtocolViolation> {
        if self.phase() != Phase::Ended {
            return Err(ProtocolViolation::NotEnded);
        }
        self.revealed = true;
        Ok(())
    }

    pub fn total(&self, alliance: Alliance) -> i64 {
        self.tally.get(alliance).total(&self.game)
    }

    /// Remaining time in milliseconds at `now`.
    pub fn remaining_millis(&self, now: u64) -> u64 {
        crate::clock::remaining_millis(&self.clock, self.game.duration_secs, now)
    }

    /// Build a replica from the broadcast-channel snapshot. The local pause
    /// instant is left unset; the replicator seeds it on receipt.
    pub fn from_snapshot(game: GameDefinition, snapshot: SessionSnapshot) -> Self {
        Self {
            game,
            clock: ClockAnchor {
                time_started: snapshot.time_started,
                accumulated_paused: snapshot.time_paused,
                paused: snapshot.paused,
                ended: snapshot.ended,
                paused_at: None,
            },
            tally: AllianceTally {
                blue: snapshot.blue_scored,
                red: snapshot.red_scored,
            },
            revealed: snapshot.revealed,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            blue_scored: self.tally.blue.clone(),
            red_scored: self.tally.red.clone(),
            time_started: self.clock.time_started,
            time_paused: self.clock.accumulated_paused,
            paused: self.clock.paused,
            ended: self.clock.ended,
            revealed: self.revealed,
        }
    }
}

/// JSON shape of the mutable half of a session on the broadcast channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub blue_scored: ScoreTally,
    pub red_scored: ScoreTally,
    pub time_started: Option<u64>,
    /// Accumulated paused milliseconds.
    pub time_paused: u64,
    pub paused: bool,
    pub ended: bool,
    #[serde(default)]
    pub revealed: bool,
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::game::ScorePointDefinition;

    fn game() -> GameDefinition {
        GameDefinition::new(
            120,
            vec![
                ScorePointDefinition {
                    name: "Goal".to_string(),
                    category: "Offense".to_string(),
                    points: 5,
                },
                ScorePointDefinition {
                    name: "Foul".to_string(),
                    category: "Penalty".to_string(),
                    points: -3,
                },
            ],
        )
    }

    fn live() -> SessionState {
        let mut state = SessionState::new(game());
        state.start(0).unwrap();
        state
    }

    #[test]
    fn phases_follow_clock() {
        let mut state = SessionState::new(game());
        assert_eq!(state.phase(), Phase::Uninitialized);
        state.start(1_000).unwrap();
        assert_eq!(state.phase(), Phase::Live);
        state.end().unwrap();
        assert_eq!(state.phase(), Phase::Ended);
    }

    #[test]
    fn start_twice_rejected() {
        let mut state = live();
        assert_eq!(state.start(5), Err(ProtocolViolation::AlreadyStarted));
        assert_eq!(state.clock.time_started, Some(0));
    }

    #[test]
    fn score_and_undo() {
        let mut state = live();
        assert_eq!(state.score(Alliance::Blue, 0, false), Ok(5));
        assert_eq!(state.total(Alliance::Blue), 5);
        assert_eq!(state.score(Alliance::Blue, 0, true), Ok(-5));
        assert_eq!(state.total(Alliance::Blue), 0);
        let count = state.tally.blue.count(0);
        assert_eq!(count.scored_count, 1);
        assert_eq!(count.undone_count, 1);
    }

    #[test]
    fn penalty_subtracts() {
        let mut state = live();
        state.score(Alliance::Red, 1, false).unwrap();
        state.score(Alliance::Red, 0, false).unwrap();
        assert_eq!(state.total(Alliance::Red), 2);
        assert_eq!(state.total(Alliance::Blue), 0);
    }

    #[test]
    fn undo_without_score_rejected() {
        let mut state = live();
        let before = state.clone();
        assert_eq!(
            state.score(Alliance::Red, 0, true),
            Err(ProtocolViolation::NothingToUndo {
                alliance: Alliance::Red,
                index: 0
            })
        );
        assert_eq!(state, before);
        assert_eq!(state.tally.red.iter().count(), 0);
        let json = serde_json::to_value(state.snapshot()).unwrap();
        assert_eq!(json["red_scored"], serde_json::json!({}));
    }

    #[test]
    fn snapshot_with_excess_undo_rejected() {
        let json = serde_json::json!({
            "blue_scored": {"0": {"scored": 0, "undo": 3}},
            "red_scored": {},
            "time_started": null,
            "time_paused": 0,
            "paused": false,
            "ended": false,
        });
        let err = serde_json::from_value::<SessionSnapshot>(json).unwrap_err();
        assert!(err.to_string().contains("exceeds scored count"));

        let ok = serde_json::json!({"scored": 2, "undo": 2});
        let count: ScoreCount = serde_json::from_value(ok).unwrap();
        assert_eq!(count.net(), 0);
    }

    #[test]
    fn score_out_of_range_is_fatal() {
        let mut state = live();
        let err = state.score(Alliance::Blue, 9, false).unwrap_err();
        assert_eq!(
            err,
            ProtocolViolation::ScorePointOutOfRange { index: 9, len: 2 }
        );
        assert!(err.is_fatal());
        assert!(!ProtocolViolation::NotPaused.is_fatal());
    }

    #[test]
    fn score_requires_live() {
        let mut state = SessionState::new(game());
        assert_eq!(
            state.score(Alliance::Blue, 0, false),
            Err(ProtocolViolation::NotLive(Phase::Uninitialized))
        );
        let mut state = live();
        state.end().unwrap();
        assert_eq!(
            state.score(Alliance::Blue, 0, false),
            Err(ProtocolViolation::NotLive(Phase::Ended))
        );
    }

    #[test]
    fn pause_unpause_accumulates() {
        let mut state = live();
        state.pause(30_000).unwrap();
        assert_eq!(state.pause(31_000), Err(ProtocolViolation::AlreadyPaused));
        assert_eq!(state.clock.paused_at, Some(30_000));
        state.unpause(15_000).unwrap();
        assert_eq!(state.unpause(1), Err(ProtocolViolation::NotPaused));
        assert_eq!(state.clock.accumulated_paused, 15_000);
        assert_eq!(state.clock.paused_at, None);
    }

    #[test]
    fn end_clears_pause_and_reveal_requires_end() {
        let mut state = live();
        assert_eq!(state.reveal(), Err(ProtocolViolation::NotEnded));
        state.pause(10).unwrap();
        state.end().unwrap();
        assert!(!state.clock.paused);
        assert_eq!(state.end(), Err(ProtocolViolation::NotLive(Phase::Ended)));
        state.reveal().unwrap();
        assert!(state.revealed);
    }

    #[test]
    fn snapshot_roundtrip_through_json() {
        let mut state = live();
        state.score(Alliance::Blue, 0, false).unwrap();
        state.score(Alliance::Blue, 0, false).unwrap();
        state.score(Alliance::Blue, 0, true).unwrap();
        state.score(Alliance::Red, 1, false).unwrap();

        let json = serde_json::to_value(state.snapshot()).unwrap();
        assert_eq!(json["blue_scored"]["0"]["scored"], 2);
        assert_eq!(json["blue_scored"]["0"]["undo"], 1);
        assert_eq!(json["time_started"], 0);

        let snapshot: SessionSnapshot = serde_json::from_value(json).unwrap();
        let rebuilt = SessionState::from_snapshot(game(), snapshot);
        assert_eq!(rebuilt, state);
    }

    #[test]
    fn clock_anchor_wire_layout() {
        let anchor = ClockAnchor {
            time_started: Some(5),
            accumulated_paused: 7,
            paused: true,
            ended: false,
            paused_at: Some(99),
        };
        let mut writer = PacketWriter::new();
        writer.write(&anchor);
        let bytes = writer.into_bytes();
        assert_eq!(bytes.len(), 1 + 8 + 8 + 1 + 1);

        let mut reader = PacketReader::new(&bytes);
        let decoded = reader.read::<ClockAnchor>().unwrap();
        assert_eq!(decoded.time_started, Some(5));
        assert_eq!(decoded.accumulated_paused, 7);
        assert!(decoded.paused);
        assert_eq!(decoded.paused_at, None, "local pause instant is not sent");
    }

    proptest! {
        #[test]
        fn undone_never_exceeds_scored(
            ops in prop::collection::vec((any::<bool>(), 0u8..2, any::<bool>()), 0..64),
        ) {
            let mut state = live();
            for (red, index, undo) in ops {
                let alliance = if red { Alliance::Red } else { Alliance::Blue };
                let before = state.clone();
                if state.score(alliance, index, undo).is_err() {
                    prop_assert_eq!(&state, &before);
                }
                for a in Alliance::ALL {
                    for (_, c) in state.tally.get(a).iter() {
                        prop_assert!(c.undone_count <= c.scored_count);
                    }
                }
            }
        }
    }
}
