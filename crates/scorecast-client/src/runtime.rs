//! Per-role event loops.
//!
//! Each loop multiplexes three sources on one task: inbound events from the
//! server, console commands, and the clock tick. The tick only re-projects
//! the countdown; for the host it may also send a single end signal.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};

use scorecast_core::alliance::Alliance;
use scorecast_core::net::packets::{GameSetup, ServerboundHostPacket};
use scorecast_core::replicator::{Replicator, Role, SessionEvent, Transition};
use scorecast_core::time::now_millis;

use crate::broadcast::BroadcastConnection;
use crate::console::{Frontend, HostCommand, ParticipantCommand};
use crate::duplex::{HostConnection, ParticipantConnection};
use crate::error::TransportError;

/// Re-renders the countdown only when its text changes.
#[derive(Debug, Default)]
struct ClockLine {
    last: Option<String>,
}

impl ClockLine {
    fn refresh(
        &mut self,
        replicator: &Replicator,
        now: u64,
        frontend: &mut impl Frontend,
    ) -> Result<(), TransportError> {
        let label = replicator.clock_label(now);
        if label != self.last {
            if let Some(text) = &label {
                frontend.clock(text)?;
            }
            self.last = label;
        }
        Ok(())
    }
}

fn ticker(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Apply one inbound event. Violations that desynchronize the replica from
/// the server end the connection; the rest are logged and skipped.
fn apply_event(
    replicator: &mut Replicator,
    event: SessionEvent,
    frontend: &mut impl Frontend,
) -> Result<(), TransportError> {
    match replicator.apply(event, now_millis()) {
        Ok(transition) => frontend.applied(replicator, &transition)?,
        Err(e) if e.is_fatal() => return Err(TransportError::Desync(e)),
        Err(_) => {},
    }
    Ok(())
}

/// Create a session and control it from console commands until the server
/// closes the connection.
pub async fn run_host(
    mut connection: HostConnection,
    setup: GameSetup,
    mut commands: mpsc::Receiver<String>,
    frontend: &mut impl Frontend,
    tick_interval: Duration,
) -> Result<Replicator, TransportError> {
    let mut replicator = Replicator::new(Role::Host);
    let mut clock = ClockLine::default();
    let mut ticks = ticker(tick_interval);
    let mut input_open = true;

    connection
        .send(&ServerboundHostPacket::SetupGame(setup))
        .await?;

    loop {
        tokio::select! {
            packet = connection.recv() => {
                let Some(packet) = packet? else { break };
                apply_event(&mut replicator, packet.into(), frontend)?;
            },
            line = commands.recv(), if input_open => {
                let Some(line) = line else {
                    input_open = false;
                    continue;
                };
                let command = match line.parse::<HostCommand>() {
                    Ok(command) => command,
                    Err(message) => {
                        frontend.notice(&message)?;
                        continue;
                    },
                };
                let now = now_millis();
                let (result, transition) = match command {
                    HostCommand::Start => (replicator.start(now), Transition::Started),
                    HostCommand::Pause => (replicator.pause(now), Transition::Paused),
                    HostCommand::Unpause => (replicator.unpause(now), Transition::Unpaused),
                    HostCommand::End => (replicator.end(), Transition::Ended),
                    HostCommand::Reveal => (replicator.reveal(), Transition::Revealed),
                };
                match result {
                    Ok(packet) => {
                        connection.send(&packet).await?;
                        frontend.applied(&replicator, &transition)?;
                    },
                    Err(e) => frontend.notice(&format!("cannot {command}: {e}"))?,
                }
            },
            _ = ticks.tick() => {
                let now = now_millis();
                if let Some(packet) = replicator.tick(now) {
                    connection.send(&packet).await?;
                    frontend.applied(&replicator, &Transition::Ended)?;
                }
                clock.refresh(&replicator, now, frontend)?;
            },
        }
    }

    connection.close().await;
    Ok(replicator)
}

/// Score for one alliance until the server closes the connection.
pub async fn run_participant(
    mut connection: ParticipantConnection,
    alliance: Alliance,
    mut commands: mpsc::Receiver<String>,
    frontend: &mut impl Frontend,
    tick_interval: Duration,
) -> Result<Replicator, TransportError> {
    let mut replicator = Replicator::new(Role::Participant(alliance));
    let mut clock = ClockLine::default();
    let mut ticks = ticker(tick_interval);
    let mut input_open = true;
    let mut undo_mode = false;

    loop {
        tokio::select! {
            packet = connection.recv() => {
                let Some(packet) = packet? else { break };
                apply_event(&mut replicator, packet.into(), frontend)?;
            },
            line = commands.recv(), if input_open => {
                let Some(line) = line else {
                    input_open = false;
                    continue;
                };
                match line.parse::<ParticipantCommand>() {
                    Ok(ParticipantCommand::ToggleUndo) => {
                        undo_mode = !undo_mode;
                        let state = if undo_mode { "on" } else { "off" };
                        frontend.notice(&format!("undo mode {state}"))?;
                    },
                    Ok(ParticipantCommand::Score { score_point, undo }) => {
                        match replicator.score(score_point, undo || undo_mode) {
                            Ok(packet) => {
                                tracing::debug!(%alliance, score_point, "Score sent");
                                connection.send(&packet).await?;
                            },
                            Err(e) => frontend.notice(&format!("score not sent: {e}"))?,
                        }
                    },
                    Err(message) => frontend.notice(&message)?,
                }
            },
            _ = ticks.tick() => {
                clock.refresh(&replicator, now_millis(), frontend)?;
            },
        }
    }

    connection.close().await;
    Ok(replicator)
}

/// Follow a session read-only until the stream ends.
pub async fn run_spectator(
    mut connection: BroadcastConnection,
    frontend: &mut impl Frontend,
    tick_interval: Duration,
) -> Result<Replicator, TransportError> {
    let mut replicator = Replicator::new(Role::Spectator);
    let mut clock = ClockLine::default();
    let mut ticks = ticker(tick_interval);

    loop {
        tokio::select! {
            event = connection.recv() => {
                let Some(event) = event? else { break };
                apply_event(&mut replicator, event.into(), frontend)?;
            },
            _ = ticks.tick() => {
                clock.refresh(&replicator, now_millis(), frontend)?;
            },
        }
    }

    Ok(replicator)
}
