//! Line-oriented terminal front end.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use scorecast_core::game::points_label;
use scorecast_core::replicator::{Replicator, Role, Scoreboard, Transition};
use scorecast_core::session::Phase;

/// Receives everything the run loops want shown to the user.
pub trait Frontend {
    /// Called after every event the replica accepted.
    fn applied(&mut self, replicator: &Replicator, transition: &Transition) -> io::Result<()>;

    /// Called whenever the rendered countdown changes.
    fn clock(&mut self, label: &str) -> io::Result<()>;

    fn notice(&mut self, message: &str) -> io::Result<()>;
}

/// Writes role-appropriate text to any `Write` sink.
pub struct Console<W> {
    out: W,
}

impl<W: Write> Console<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn synced(&mut self, replicator: &Replicator) -> io::Result<()> {
        let Some(state) = replicator.state() else {
            return Ok(());
        };
        match replicator.role() {
            Role::Host => {
                if let Some(id) = replicator.session_id() {
                    writeln!(self.out, "session {id} ready")?;
                }
                writeln!(
                    self.out,
                    "{} score points, {}s match. commands: start, pause, unpause, end, reveal",
                    state.game.score_points.len(),
                    state.game.duration_secs
                )?;
            },
            Role::Participant(alliance) => {
                writeln!(self.out, "scoring for {alliance}")?;
                for (i, sp) in state.game.score_points.iter().enumerate() {
                    writeln!(
                        self.out,
                        "  [{i}] {} ({}) {}",
                        sp.name,
                        sp.category,
                        points_label(i64::from(sp.points))
                    )?;
                }
                writeln!(
                    self.out,
                    "enter an index to score, `undo <index>` to take one back, `undo` to toggle undo mode"
                )?;
                self.scoring_state(replicator)?;
            },
            Role::Spectator => self.scoreboard(replicator)?,
        }
        Ok(())
    }

    fn scoring_state(&mut self, replicator: &Replicator) -> io::Result<()> {
        let status = if replicator.scoring_enabled() {
            "enabled"
        } else {
            "disabled"
        };
        writeln!(self.out, "scoring {status}")
    }

    fn scoreboard(&mut self, replicator: &Replicator) -> io::Result<()> {
        if let Some(board) = replicator.scoreboard() {
            write!(self.out, "{}", render_scoreboard(&board))?;
        }
        Ok(())
    }
}

impl<W: Write> Frontend for Console<W> {
    fn applied(&mut self, replicator: &Replicator, transition: &Transition) -> io::Result<()> {
        let role = replicator.role();
        match transition {
            Transition::Synced => {
                self.synced(replicator)?;
                return self.out.flush();
            },
            Transition::Scored { .. } => {
                if role == Role::Host
                    && let Some(entry) = replicator.log().last()
                {
                    writeln!(self.out, "{entry}")?;
                }
            },
            Transition::Started => writeln!(self.out, "match started")?,
            Transition::Paused => writeln!(self.out, "match paused")?,
            Transition::Unpaused => writeln!(self.out, "match resumed")?,
            Transition::Ended => writeln!(self.out, "match ended")?,
            Transition::Revealed => writeln!(self.out, "final score revealed")?,
        }
        match role {
            Role::Spectator => self.scoreboard(replicator)?,
            Role::Host
                if matches!(
                    transition,
                    Transition::Scored { .. } | Transition::Ended | Transition::Revealed
                ) =>
            {
                self.scoreboard(replicator)?;
            },
            Role::Participant(_) if !matches!(transition, Transition::Scored { .. }) => {
                self.scoring_state(replicator)?;
            },
            _ => {},
        }
        self.out.flush()
    }

    fn clock(&mut self, label: &str) -> io::Result<()> {
        writeln!(self.out, "clock {label}")?;
        self.out.flush()
    }

    fn notice(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "{message}")?;
        self.out.flush()
    }
}

/// Multi-line scoreboard: totals, then one line per category when tracked.
pub fn render_scoreboard(board: &Scoreboard) -> String {
    let mut text = match board.visible_totals() {
        Some((blue, red)) => {
            let leader = match board.leader() {
                Some(alliance) => format!("  ({alliance} leads)"),
                None => String::new(),
            };
            format!("BLUE {blue:>4} | {red:<4} RED{leader}\n")
        },
        None => "BLUE   ?? | ??   RED  (awaiting reveal)\n".to_string(),
    };
    if board.visible_totals().is_some() {
        for totals in &board.categories {
            text.push_str(&format!(
                "  {:<16} {:>4} | {:<4}\n",
                totals.category, totals.blue, totals.red
            ));
        }
    }
    if board.phase == Phase::Uninitialized {
        text.push_str("waiting for the match to start\n");
    }
    text
}

/// Host console commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    Start,
    Pause,
    Unpause,
    End,
    Reveal,
}

impl FromStr for HostCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "pause" => Ok(Self::Pause),
            "unpause" | "resume" => Ok(Self::Unpause),
            "end" => Ok(Self::End),
            "reveal" => Ok(Self::Reveal),
            other => Err(format!(
                "unknown command {other:?} (expected start, pause, unpause, end or reveal)"
            )),
        }
    }
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Unpause => "unpause",
            Self::End => "end",
            Self::Reveal => "reveal",
        })
    }
}

/// Participant console commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantCommand {
    /// `<index>` or `undo <index>`.
    Score { score_point: u8, undo: bool },
    /// Bare `undo`: flip whether plain indices undo.
    ToggleUndo,
}

impl FromStr for ParticipantCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let (undo, index) = match (words.next(), words.next(), words.next()) {
            (Some("undo"), None, None) => return Ok(Self::ToggleUndo),
            (Some("undo"), Some(index), None) => (true, index),
            (Some(index), None, None) => (false, index),
            _ => return Err(format!("unrecognized input {:?}", s.trim())),
        };
        let score_point = index
            .parse::<u8>()
            .map_err(|_| format!("not a score point index: {index:?}"))?;
        Ok(Self::Score { score_point, undo })
    }
}

/// Forward stdin lines into a channel until EOF.
pub fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).await.is_err() {
                        break;
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Console input failed");
                    break;
                },
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use scorecast_core::alliance::Alliance;
    use scorecast_core::replicator::{CategoryTotals, SessionEvent};
    use scorecast_core::session::SessionState;
    use scorecast_core::test_helpers::goal_game;

    use super::*;

    fn board(blue: i64, red: i64, phase: Phase, revealed: bool) -> Scoreboard {
        Scoreboard {
            blue,
            red,
            categories: vec![CategoryTotals {
                category: "auto".to_string(),
                blue,
                red,
            }],
            revealed,
            phase,
        }
    }

    #[test]
    fn scoreboard_rendering() {
        let text = render_scoreboard(&board(12, 7, Phase::Live, false));
        assert!(text.starts_with("BLUE   12 | 7    RED  (blue leads)\n"));
        assert!(text.contains("auto"));

        let hidden = render_scoreboard(&board(12, 7, Phase::Ended, false));
        assert!(hidden.contains("awaiting reveal"));
        assert!(!hidden.contains("12"));

        let revealed = render_scoreboard(&board(3, 3, Phase::Ended, true));
        assert!(revealed.starts_with("BLUE    3 | 3    RED\n"));
    }

    #[test]
    fn host_commands() {
        assert_eq!("start".parse(), Ok(HostCommand::Start));
        assert_eq!(" Resume ".parse(), Ok(HostCommand::Unpause));
        assert!("launch".parse::<HostCommand>().is_err());
        assert_eq!(HostCommand::Reveal.to_string(), "reveal");
    }

    #[test]
    fn participant_commands() {
        assert_eq!(
            "3".parse(),
            Ok(ParticipantCommand::Score {
                score_point: 3,
                undo: false
            })
        );
        assert_eq!(
            "undo 0".parse(),
            Ok(ParticipantCommand::Score {
                score_point: 0,
                undo: true
            })
        );
        assert_eq!("undo".parse(), Ok(ParticipantCommand::ToggleUndo));
        assert!("256".parse::<ParticipantCommand>().is_err());
        assert!("undo 1 2".parse::<ParticipantCommand>().is_err());
        assert!("".parse::<ParticipantCommand>().is_err());
    }

    #[test]
    fn host_shows_totals_after_reveal() {
        let mut replicator = Replicator::new(Role::Host);
        let events = [
            SessionEvent::SessionInfo {
                session_id: None,
                state: SessionState::new(goal_game()),
            },
            SessionEvent::Start { time_started: 0 },
            SessionEvent::Score {
                alliance: Alliance::Blue,
                score_point: 0,
                undo: false,
            },
        ];
        for event in events {
            replicator.apply(event, 1_000).unwrap();
        }
        let mut console = Console::new(Vec::new());
        console
            .applied(
                &replicator,
                &Transition::Scored {
                    alliance: Alliance::Blue,
                    score_point: 0,
                    undo: false,
                    delta: 5,
                },
            )
            .unwrap();

        replicator.end().unwrap();
        console.applied(&replicator, &Transition::Ended).unwrap();
        replicator.reveal().unwrap();
        console.applied(&replicator, &Transition::Revealed).unwrap();

        let text = String::from_utf8(console.into_inner()).unwrap();
        let mut sections = text.split("match ended\n");
        let live = sections.next().unwrap();
        let after = sections.next().unwrap();
        assert!(live.contains("Goal"));
        assert!(live.contains("BLUE    5 | 0    RED  (blue leads)"));
        let (ended, revealed) = after.split_once("final score revealed\n").unwrap();
        assert!(ended.contains("awaiting reveal"));
        assert!(revealed.contains("BLUE    5 | 0    RED  (blue leads)"));
    }

    #[test]
    fn participant_sync_lists_score_points() {
        let mut replicator = Replicator::new(Role::Participant(Alliance::Blue));
        replicator
            .apply(
                SessionEvent::SessionInfo {
                    session_id: None,
                    state: SessionState::new(goal_game()),
                },
                0,
            )
            .unwrap();
        let mut console = Console::new(Vec::new());
        console
            .applied(&replicator, &Transition::Synced)
            .unwrap();
        let text = String::from_utf8(console.into_inner()).unwrap();
        assert!(text.contains("[0] Goal (Offense) +5"));
        assert!(text.contains("scoring disabled"));
    }
}
