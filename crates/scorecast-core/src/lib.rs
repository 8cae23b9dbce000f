pub mod alliance;
pub mod clock;
pub mod game;
pub mod net;
pub mod replicator;
pub mod session;
pub mod session_id;
pub mod time;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::alliance::Alliance;
    use crate::game::{GameDefinition, ScorePointDefinition};
    use crate::net::events::ViewerEvent;
    use crate::session::SessionSnapshot;

    fn score_point(name: &str, category: &str, points: i8) -> ScorePointDefinition {
        ScorePointDefinition {
            name: name.to_string(),
            category: category.to_string(),
            points,
        }
    }

    /// Two-minute match with a single five-point "Goal".
    pub fn goal_game() -> GameDefinition {
        GameDefinition::new(120, vec![score_point("Goal", "Offense", 5)])
    }

    /// Two-and-a-half-minute match whose score points share categories:
    /// `auto` (indices 0 and 2), `teleop` (1) and `penalty` (3).
    pub fn multi_category_game() -> GameDefinition {
        GameDefinition::new(
            150,
            vec![
                score_point("Leave", "auto", 2),
                score_point("Amp", "teleop", 1),
                score_point("Auto speaker", "auto", 5),
                score_point("Foul", "penalty", -5),
            ],
        )
    }

    /// `session_info` event as the broadcast channel delivers it.
    pub fn viewer_snapshot(game: GameDefinition, state: SessionSnapshot) -> ViewerEvent {
        ViewerEvent::SessionInfo { data: game, state }
    }

    /// A full match on the broadcast channel, as `(local receipt time, event)`
    /// pairs: start, two blue goals, one undone, a pause, a red goal, end and
    /// reveal. Blue finishes on 5 and red on 5.
    pub fn scripted_viewer_events() -> Vec<(u64, ViewerEvent)> {
        let score = |team, undo| ViewerEvent::Score {
            team,
            score_id: 0,
            undo,
        };
        vec![
            (0, viewer_snapshot(goal_game(), SessionSnapshot::default())),
            (1_000, ViewerEvent::GameStart { time_started: 1_000 }),
            (5_000, score(Alliance::Blue, false)),
            (6_000, score(Alliance::Blue, false)),
            (7_000, score(Alliance::Blue, true)),
            (30_000, ViewerEvent::GamePause),
            (40_000, ViewerEvent::GameUnpause { paused_time: 10_000 }),
            (50_000, score(Alliance::Red, false)),
            (131_000, ViewerEvent::GameEnd),
            (140_000, ViewerEvent::RevealScore),
        ]
    }
}
