//! Snapshot plus ordered deltas, applied the same way for every role.
//!
//! A [`Replicator`] owns at most one [`SessionState`]. The first
//! `SessionInfo` creates it, later ones replace it wholesale, and every other
//! event is validated against it before being applied. What differs between
//! roles is only what they may emit, captured by [`Capabilities`].

use std::fmt;

use crate::alliance::Alliance;
use crate::clock::{format_clock, remaining_millis};
use crate::game::points_label;
use crate::net::events::ViewerEvent;
use crate::net::packets::{
    ClientboundHostPacket, ClientboundParticipantPacket, ServerboundHostPacket,
    ServerboundParticipantPacket,
};
use crate::session::{Phase, ProtocolViolation, SessionState};
use crate::session_id::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Participant(Alliance),
    Spectator,
}

/// What a role may do beyond receiving events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub can_emit_score: bool,
    pub can_emit_control: bool,
    pub tracks_log: bool,
    pub tracks_per_category: bool,
}

impl Role {
    pub fn capabilities(self) -> Capabilities {
        match self {
            Self::Host => Capabilities {
                can_emit_score: false,
                can_emit_control: true,
                tracks_log: true,
                tracks_per_category: false,
            },
            Self::Participant(_) => Capabilities {
                can_emit_score: true,
                can_emit_control: false,
                tracks_log: false,
                tracks_per_category: false,
            },
            Self::Spectator => Capabilities {
                can_emit_score: false,
                can_emit_control: false,
                tracks_log: false,
                tracks_per_category: true,
            },
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Participant(_) => "participant",
            Self::Spectator => "spectator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Participant(alliance) => write!(f, "participant ({alliance})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Transport-independent form of every inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Full replacement of the replica.
    SessionInfo {
        session_id: Option<SessionId>,
        state: SessionState,
    },
    Start {
        time_started: u64,
    },
    Score {
        alliance: Alliance,
        score_point: u8,
        undo: bool,
    },
    Pause,
    Unpause {
        paused_duration: u64,
    },
    End,
    Reveal,
}

impl From<ViewerEvent> for SessionEvent {
    fn from(event: ViewerEvent) -> Self {
        match event {
            ViewerEvent::SessionInfo { data, state } => Self::SessionInfo {
                session_id: None,
                state: SessionState::from_snapshot(data, state),
            },
            ViewerEvent::Score {
                team,
                score_id,
                undo,
            } => Self::Score {
                alliance: team,
                score_point: score_id,
                undo,
            },
            ViewerEvent::GameStart { time_started } => Self::Start { time_started },
            ViewerEvent::GameEnd => Self::End,
            ViewerEvent::RevealScore => Self::Reveal,
            ViewerEvent::GamePause => Self::Pause,
            ViewerEvent::GameUnpause { paused_time } => Self::Unpause {
                paused_duration: paused_time,
            },
        }
    }
}

impl From<ClientboundParticipantPacket> for SessionEvent {
    fn from(packet: ClientboundParticipantPacket) -> Self {
        match packet {
            ClientboundParticipantPacket::SessionInfo { clock, game } => {
                let mut state = SessionState::new(game);
                state.clock = clock;
                Self::SessionInfo {
                    session_id: None,
                    state,
                }
            },
            ClientboundParticipantPacket::StartGame { time_started } => {
                Self::Start { time_started }
            },
            ClientboundParticipantPacket::EndGame => Self::End,
            ClientboundParticipantPacket::PauseGame => Self::Pause,
            ClientboundParticipantPacket::UnpauseGame { paused_duration } => {
                Self::Unpause { paused_duration }
            },
        }
    }
}

impl From<ClientboundHostPacket> for SessionEvent {
    fn from(packet: ClientboundHostPacket) -> Self {
        match packet {
            ClientboundHostPacket::SessionInfo { session_id, game } => Self::SessionInfo {
                session_id: Some(session_id),
                state: SessionState::new(game),
            },
            ClientboundHostPacket::Score {
                alliance,
                score_point,
                undo,
            } => Self::Score {
                alliance,
                score_point,
                undo,
            },
        }
    }
}

/// What an applied event changed, for the front end to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Synced,
    Started,
    Scored {
        alliance: Alliance,
        score_point: u8,
        undo: bool,
        delta: i64,
    },
    Paused,
    Unpaused,
    Ended,
    Revealed,
}

/// A score as seen by the host, stamped with the match clock at receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreLogEntry {
    pub alliance: Alliance,
    pub score_point: u8,
    pub name: String,
    pub undo: bool,
    /// Signed change to the alliance total.
    pub delta: i64,
    pub remaining_millis: u64,
}

impl ScoreLogEntry {
    pub fn scored_label(&self) -> String {
        if self.undo {
            format!("UNDO {}", self.name)
        } else {
            self.name.clone()
        }
    }

    pub fn points_label(&self) -> String {
        points_label(self.delta)
    }

    pub fn timestamp_label(&self) -> String {
        format_clock(self.remaining_millis)
    }
}

impl fmt::Display for ScoreLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<5} {:<24} {:>5} {}",
            self.alliance,
            self.scored_label(),
            self.points_label(),
            self.timestamp_label()
        )
    }
}

/// Points per category for both alliances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTotals {
    pub category: String,
    pub blue: i64,
    pub red: i64,
}

/// Read-side projection of a replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scoreboard {
    pub blue: i64,
    pub red: i64,
    /// Empty unless the role tracks per-category subtotals.
    pub categories: Vec<CategoryTotals>,
    pub revealed: bool,
    pub phase: Phase,
}

impl Scoreboard {
    fn from_state(state: &SessionState, per_category: bool) -> Self {
        let categories = if per_category {
            state
                .game
                .categories()
                .into_iter()
                .map(|category| CategoryTotals {
                    category: category.to_string(),
                    blue: state.tally.blue.category_total(&state.game, category),
                    red: state.tally.red.category_total(&state.game, category),
                })
                .collect()
        } else {
            Vec::new()
        };
        Self {
            blue: state.total(Alliance::Blue),
            red: state.total(Alliance::Red),
            categories,
            revealed: state.revealed,
            phase: state.phase(),
        }
    }

    /// `(blue, red)`, or `None` between the end of the match and the reveal.
    pub fn visible_totals(&self) -> Option<(i64, i64)> {
        if self.phase == Phase::Ended && !self.revealed {
            None
        } else {
            Some((self.blue, self.red))
        }
    }

    /// The alliance ahead, if any.
    pub fn leader(&self) -> Option<Alliance> {
        match self.blue.cmp(&self.red) {
            std::cmp::Ordering::Greater => Some(Alliance::Blue),
            std::cmp::Ordering::Less => Some(Alliance::Red),
            std::cmp::Ordering::Equal => None,
        }
    }
}

#[derive(Debug)]
pub struct Replicator {
    role: Role,
    session_id: Option<SessionId>,
    state: Option<SessionState>,
    log: Vec<ScoreLogEntry>,
}

impl Replicator {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            session_id: None,
            state: None,
            log: Vec::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    pub fn state(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    pub fn phase(&self) -> Option<Phase> {
        self.state.as_ref().map(SessionState::phase)
    }

    /// Host score log, oldest first. Always empty for other roles.
    pub fn log(&self) -> &[ScoreLogEntry] {
        &self.log
    }

    /// Apply one inbound event at local time `now`.
    ///
    /// A rejected event leaves the replica untouched and is logged.
    pub fn apply(
        &mut self,
        event: SessionEvent,
        now: u64,
    ) -> Result<Transition, ProtocolViolation> {
        let result = self.apply_inner(event, now);
        if let Err(e) = &result {
            tracing::warn!(role = self.role.name(), error = %e, "Ignoring session event");
        }
        result
    }

    fn apply_inner(
        &mut self,
        event: SessionEvent,
        now: u64,
    ) -> Result<Transition, ProtocolViolation> {
        if let SessionEvent::SessionInfo {
            session_id,
            mut state,
        } = event
        {
            if state.clock.paused && state.clock.paused_at.is_none() {
                state.clock.paused_at = Some(now);
            }
            if session_id.is_some() {
                self.session_id = session_id;
            }
            tracing::info!(
                role = self.role.name(),
                phase = ?state.phase(),
                score_points = state.game.score_points.len(),
                "Session synced"
            );
            self.state = Some(state);
            return Ok(Transition::Synced);
        }

        let tracks_log = self.role.capabilities().tracks_log;
        let state = self.state.as_mut().ok_or(ProtocolViolation::NoSnapshot)?;
        match event {
            SessionEvent::SessionInfo { .. } => Ok(Transition::Synced),
            SessionEvent::Start { time_started } => {
                state.start(time_started)?;
                tracing::info!(role = self.role.name(), time_started, "Match started");
                Ok(Transition::Started)
            },
            SessionEvent::Score {
                alliance,
                score_point,
                undo,
            } => {
                let delta = state.score(alliance, score_point, undo)?;
                tracing::debug!(%alliance, score_point, undo, delta, "Score applied");
                if tracks_log {
                    let name = state
                        .game
                        .score_point(score_point)
                        .map(|sp| sp.name.clone())
                        .unwrap_or_default();
                    self.log.push(ScoreLogEntry {
                        alliance,
                        score_point,
                        name,
                        undo,
                        delta,
                        remaining_millis: state.remaining_millis(now),
                    });
                }
                Ok(Transition::Scored {
                    alliance,
                    score_point,
                    undo,
                    delta,
                })
            },
            SessionEvent::Pause => {
                state.pause(now)?;
                tracing::info!(role = self.role.name(), "Match paused");
                Ok(Transition::Paused)
            },
            SessionEvent::Unpause { paused_duration } => {
                state.unpause(paused_duration)?;
                tracing::info!(role = self.role.name(), paused_duration, "Match resumed");
                Ok(Transition::Unpaused)
            },
            SessionEvent::End => {
                state.end()?;
                tracing::info!(role = self.role.name(), "Match ended");
                Ok(Transition::Ended)
            },
            SessionEvent::Reveal => {
                state.reveal()?;
                tracing::info!(role = self.role.name(), "Final score revealed");
                Ok(Transition::Revealed)
            },
        }
    }

    /// Remaining time at `now`, or `None` before the first snapshot.
    pub fn remaining_millis(&self, now: u64) -> Option<u64> {
        self.state
            .as_ref()
            .map(|s| remaining_millis(&s.clock, s.game.duration_secs, now))
    }

    pub fn clock_label(&self, now: u64) -> Option<String> {
        self.remaining_millis(now).map(format_clock)
    }

    pub fn scoreboard(&self) -> Option<Scoreboard> {
        let per_category = self.role.capabilities().tracks_per_category;
        self.state
            .as_ref()
            .map(|s| Scoreboard::from_state(s, per_category))
    }

    /// Whether scoring input should currently be accepted.
    pub fn scoring_enabled(&self) -> bool {
        self.role.capabilities().can_emit_score
            && self
                .state
                .as_ref()
                .is_some_and(|s| s.phase() == Phase::Live && !s.clock.paused)
    }

    /// Build a score packet for this participant's alliance.
    ///
    /// Local state is not touched: the score only counts once the server
    /// has accepted it.
    pub fn score(
        &self,
        score_point: u8,
        undo: bool,
    ) -> Result<ServerboundParticipantPacket, ProtocolViolation> {
        self.require(self.role.capabilities().can_emit_score, "score")?;
        let state = self.state.as_ref().ok_or(ProtocolViolation::NoSnapshot)?;
        if !self.scoring_enabled() {
            return Err(ProtocolViolation::ScoringDisabled);
        }
        if state.game.score_point(score_point).is_none() {
            return Err(ProtocolViolation::ScorePointOutOfRange {
                index: score_point,
                len: state.game.score_points.len(),
            });
        }
        Ok(ServerboundParticipantPacket::Score { score_point, undo })
    }

    pub fn start(&mut self, now: u64) -> Result<ServerboundHostPacket, ProtocolViolation> {
        self.control("start")?.start(now)?;
        tracing::info!(time_started = now, "Match started");
        Ok(ServerboundHostPacket::StartGame { time_started: now })
    }

    pub fn pause(&mut self, now: u64) -> Result<ServerboundHostPacket, ProtocolViolation> {
        self.control("pause")?.pause(now)?;
        tracing::info!("Match paused");
        Ok(ServerboundHostPacket::PauseGame)
    }

    /// The pause length is measured here, from the local pause instant.
    pub fn unpause(&mut self, now: u64) -> Result<ServerboundHostPacket, ProtocolViolation> {
        let state = self.control("unpause")?;
        let paused_duration = state
            .clock
            .paused_at
            .map_or(0, |paused_at| now.saturating_sub(paused_at));
        state.unpause(paused_duration)?;
        tracing::info!(paused_duration, "Match resumed");
        Ok(ServerboundHostPacket::UnpauseGame { paused_duration })
    }

    pub fn end(&mut self) -> Result<ServerboundHostPacket, ProtocolViolation> {
        self.control("end")?.end()?;
        tracing::info!("Match ended");
        Ok(ServerboundHostPacket::EndGame)
    }

    pub fn reveal(&mut self) -> Result<ServerboundHostPacket, ProtocolViolation> {
        self.control("reveal")?.reveal()?;
        tracing::info!("Final score revealed");
        Ok(ServerboundHostPacket::RevealScore)
    }

    /// Periodic clock check. Returns the end signal the first time a host sees
    /// the clock run out; the match is then ended and later ticks return `None`.
    pub fn tick(&mut self, now: u64) -> Option<ServerboundHostPacket> {
        if !self.role.capabilities().can_emit_control {
            return None;
        }
        let state = self.state.as_mut()?;
        if state.phase() != Phase::Live || state.remaining_millis(now) > 0 {
            return None;
        }
        state.end().ok()?;
        tracing::info!("Match clock expired");
        Some(ServerboundHostPacket::EndGame)
    }

    fn require(&self, allowed: bool, action: &'static str) -> Result<(), ProtocolViolation> {
        if allowed {
            Ok(())
        } else {
            Err(ProtocolViolation::NotPermitted {
                role: self.role.name(),
                action,
            })
        }
    }

    fn control(&mut self, action: &'static str) -> Result<&mut SessionState, ProtocolViolation> {
        self.require(self.role.capabilities().can_emit_control, action)?;
        self.state.as_mut().ok_or(ProtocolViolation::NoSnapshot)
    }
}
