//! JSON events on the one-way broadcast channel.

use serde::{Deserialize, Serialize};

use crate::alliance::Alliance;
use crate::game::GameDefinition;
use crate::session::SessionSnapshot;

use super::codec::DecodeError;

/// One `data:` payload of the spectator stream: `{"type": ..., "content": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum ViewerEvent {
    SessionInfo {
        data: GameDefinition,
        state: SessionSnapshot,
    },
    Score {
        team: Alliance,
        score_id: u8,
        undo: bool,
    },
    GameStart {
        time_started: u64,
    },
    GameEnd,
    RevealScore,
    GamePause,
    GameUnpause {
        /// Milliseconds the match spent paused.
        paused_time: u64,
    },
}

impl ViewerEvent {
    pub fn from_json(payload: &str) -> Result<Self, DecodeError> {
        serde_json::from_str(payload).map_err(|e| DecodeError::MalformedEvent(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, DecodeError> {
        serde_json::to_string(self).map_err(|e| DecodeError::MalformedEvent(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_session_info() {
        let payload = r#"{
            "type": "session_info",
            "content": {
                "data": {
                    "duration": 120,
                    "score_points": [{"name": "Goal", "category": "Offense", "points": 5}]
                },
                "state": {
                    "blue_scored": {"0": {"scored": 2, "undo": 1}},
                    "red_scored": {},
                    "time_started": 1000,
                    "time_paused": 0,
                    "paused": false,
                    "ended": false
                }
            }
        }"#;
        let ViewerEvent::SessionInfo { data, state } = ViewerEvent::from_json(payload).unwrap()
        else {
            panic!("expected session_info");
        };
        assert_eq!(data.duration_secs, 120);
        assert_eq!(state.blue_scored.count(0).scored_count, 2);
        assert_eq!(state.blue_scored.count(0).undone_count, 1);
        assert_eq!(state.time_started, Some(1000));
        assert!(!state.revealed, "missing revealed defaults to false");
    }

    #[test]
    fn parses_unstarted_snapshot() {
        let payload = r#"{"type":"session_info","content":{"data":{"duration":60,"score_points":[]},
            "state":{"blue_scored":{},"red_scored":{},"time_started":null,"time_paused":0,
            "paused":false,"ended":false,"revealed":false}}}"#;
        let ViewerEvent::SessionInfo { state, .. } = ViewerEvent::from_json(payload).unwrap()
        else {
            panic!("expected session_info");
        };
        assert_eq!(state.time_started, None);
    }

    #[test]
    fn parses_deltas() {
        assert_eq!(
            ViewerEvent::from_json(r#"{"type":"score","content":{"team":"red","score_id":1,"undo":false}}"#),
            Ok(ViewerEvent::Score {
                team: Alliance::Red,
                score_id: 1,
                undo: false
            })
        );
        assert_eq!(
            ViewerEvent::from_json(r#"{"type":"game_unpause","content":{"paused_time":15000}}"#),
            Ok(ViewerEvent::GameUnpause { paused_time: 15_000 })
        );
        assert_eq!(
            ViewerEvent::from_json(r#"{"type":"game_end"}"#),
            Ok(ViewerEvent::GameEnd)
        );
        assert_eq!(
            ViewerEvent::from_json(r#"{"type":"reveal_score"}"#),
            Ok(ViewerEvent::RevealScore)
        );
    }

    #[test]
    fn serializes_unit_events_without_content() {
        assert_eq!(
            ViewerEvent::GamePause.to_json().unwrap(),
            r#"{"type":"game_pause"}"#
        );
        assert_eq!(
            ViewerEvent::GameStart { time_started: 7 }.to_json().unwrap(),
            r#"{"type":"game_start","content":{"time_started":7}}"#
        );
    }

    #[test]
    fn malformed_payloads_rejected() {
        assert!(matches!(
            ViewerEvent::from_json("not json"),
            Err(DecodeError::MalformedEvent(_))
        ));
        assert!(matches!(
            ViewerEvent::from_json(r#"{"type":"kickoff"}"#),
            Err(DecodeError::MalformedEvent(_))
        ));
        assert!(matches!(
            ViewerEvent::from_json(r#"{"type":"score","content":{"team":"green","score_id":0,"undo":false}}"#),
            Err(DecodeError::MalformedEvent(_))
        ));
    }

    #[test]
    fn snapshot_with_impossible_tally_rejected() {
        let payload = r#"{"type":"session_info","content":{"data":{"duration":120,"score_points":[{"name":"Goal","category":"Offense","points":5}]},"state":{"blue_scored":{"0":{"scored":0,"undo":3}},"red_scored":{},"time_started":null,"time_paused":0,"paused":false,"ended":false}}}"#;
        match ViewerEvent::from_json(payload) {
            Err(DecodeError::MalformedEvent(message)) => {
                assert!(message.contains("exceeds scored count"), "{message}");
            },
            other => panic!("Expected a malformed event, got {other:?}"),
        }
    }
}
