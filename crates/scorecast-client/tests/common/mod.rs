use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::Response;
use axum::routing::get;
use futures::Stream;
use tokio::sync::mpsc;

use scorecast_client::config::Endpoints;
use scorecast_client::console::Frontend;
use scorecast_core::alliance::Alliance;
use scorecast_core::net::packets::{
    ClientboundHostPacket, ClientboundParticipantPacket, GameSetup, Packet,
    ServerboundHostPacket, ServerboundParticipantPacket,
};
use scorecast_core::replicator::{Replicator, Transition};
use scorecast_core::session::ClockAnchor;
use scorecast_core::session_id::SessionId;
use scorecast_core::test_helpers::{goal_game, scripted_viewer_events};
use scorecast_core::time::now_millis;

/// The only session the stub knows about.
pub const STUB_SESSION: u32 = 46_655;

/// Joining this session yields an undecodable frame.
pub const GARBAGE_SESSION: u32 = 999;

/// Everything the stub received from clients.
#[derive(Clone, Default)]
pub struct Recorded {
    pub host: Arc<Mutex<Vec<ServerboundHostPacket>>>,
    pub participant: Arc<Mutex<Vec<(u32, Alliance, ServerboundParticipantPacket)>>>,
}

pub struct StubServer {
    pub addr: SocketAddr,
    pub recorded: Recorded,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl StubServer {
    pub async fn start() -> Self {
        let recorded = Recorded::default();
        let app = Router::new()
            .route("/ws/host", get(host_ws))
            .route("/ws/join/{id}/{alliance}", get(join_ws))
            .route("/sse/view/{id}", get(view_sse))
            .with_state(recorded.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            recorded,
            _shutdown: handle,
        }
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints::new(&format!("http://{}", self.addr)).unwrap()
    }

    pub fn host_packets(&self) -> Vec<ServerboundHostPacket> {
        self.recorded.host.lock().unwrap().clone()
    }

    pub fn participant_packets(&self) -> Vec<(u32, Alliance, ServerboundParticipantPacket)> {
        self.recorded.participant.lock().unwrap().clone()
    }
}

async fn send_packet(socket: &mut WebSocket, packet: &impl Packet) {
    socket
        .send(Message::Binary(packet.to_bytes().into()))
        .await
        .unwrap();
}

async fn host_ws(ws: WebSocketUpgrade, State(recorded): State<Recorded>) -> Response {
    ws.on_upgrade(move |socket| host_session(socket, recorded))
}

/// Answers setup with the session info, echoes three blue scores (two goals
/// and an undo) once the match starts, and hangs up after the end signal.
async fn host_session(mut socket: WebSocket, recorded: Recorded) {
    while let Some(Ok(msg)) = socket.recv().await {
        let Message::Binary(data) = msg else {
            continue;
        };
        let packet = ServerboundHostPacket::from_bytes(&data).unwrap();
        recorded.host.lock().unwrap().push(packet.clone());
        let replies = match packet {
            ServerboundHostPacket::SetupGame(setup) => vec![ClientboundHostPacket::SessionInfo {
                session_id: SessionId(STUB_SESSION),
                game: match setup {
                    GameSetup::Custom(game) => game,
                    GameSetup::Builtin(_) => goal_game(),
                },
            }],
            ServerboundHostPacket::StartGame { .. } => [false, false, true]
                .into_iter()
                .map(|undo| ClientboundHostPacket::Score {
                    alliance: Alliance::Blue,
                    score_point: 0,
                    undo,
                })
                .collect(),
            ServerboundHostPacket::EndGame => {
                let _ = socket.send(Message::Close(None)).await;
                return;
            },
            _ => Vec::new(),
        };
        for reply in &replies {
            send_packet(&mut socket, reply).await;
        }
    }
}

async fn join_ws(
    ws: WebSocketUpgrade,
    Path((id, alliance)): Path<(u32, Alliance)>,
    State(recorded): State<Recorded>,
) -> Response {
    ws.on_upgrade(move |socket| participant_session(socket, id, alliance, recorded))
}

/// Sends a running match, then answers the first score with pause and end.
async fn participant_session(
    mut socket: WebSocket,
    id: u32,
    alliance: Alliance,
    recorded: Recorded,
) {
    if id == GARBAGE_SESSION {
        let _ = socket.send(Message::Binary(vec![9u8].into())).await;
        let _ = socket.recv().await;
        return;
    }

    let info = ClientboundParticipantPacket::SessionInfo {
        clock: ClockAnchor {
            time_started: Some(now_millis()),
            ..ClockAnchor::default()
        },
        game: goal_game(),
    };
    send_packet(&mut socket, &info).await;

    let data = loop {
        match socket.recv().await {
            Some(Ok(Message::Binary(data))) => break data,
            Some(Ok(_)) => continue,
            _ => return,
        }
    };
    let packet = ServerboundParticipantPacket::from_bytes(&data).unwrap();
    recorded
        .participant
        .lock()
        .unwrap()
        .push((id, alliance, packet));
    send_packet(&mut socket, &ClientboundParticipantPacket::PauseGame).await;
    send_packet(&mut socket, &ClientboundParticipantPacket::EndGame).await;
    let _ = socket.send(Message::Close(None)).await;
}

async fn view_sse(
    Path(id): Path<u32>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, StatusCode> {
    if id != STUB_SESSION {
        return Err(StatusCode::NOT_FOUND);
    }
    let mut events = vec![SseEvent::default().comment("connected")];
    events.extend(
        scripted_viewer_events()
            .into_iter()
            .map(|(_, event)| SseEvent::default().data(event.to_json().unwrap())),
    );
    Ok(Sse::new(tokio_stream::iter(events.into_iter().map(Ok))))
}

/// What a run loop showed to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
    Applied(Transition),
    Clock(String),
    Notice(String),
}

/// Front end that forwards everything to a channel.
pub struct Recorder {
    tx: mpsc::UnboundedSender<Seen>,
}

impl Recorder {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Seen>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Frontend for Recorder {
    fn applied(&mut self, _replicator: &Replicator, transition: &Transition) -> io::Result<()> {
        let _ = self.tx.send(Seen::Applied(transition.clone()));
        Ok(())
    }

    fn clock(&mut self, label: &str) -> io::Result<()> {
        let _ = self.tx.send(Seen::Clock(label.to_string()));
        Ok(())
    }

    fn notice(&mut self, message: &str) -> io::Result<()> {
        let _ = self.tx.send(Seen::Notice(message.to_string()));
        Ok(())
    }
}

/// Wait (5s max) until the run loop shows something matching `pred`.
pub async fn wait_for(
    rx: &mut mpsc::UnboundedReceiver<Seen>,
    pred: impl Fn(&Seen) -> bool,
) -> Seen {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Some(seen) if pred(&seen) => return seen,
                Some(_) => continue,
                None => panic!("run loop finished before the expected output"),
            }
        }
    })
    .await
    .expect("Timed out waiting for run loop output")
}
