use thiserror::Error;

use scorecast_core::game::DefinitionError;
use scorecast_core::net::codec::DecodeError;
use scorecast_core::session::ProtocolViolation;
use scorecast_core::session_id::ParseSessionIdError;

/// Failure of a duplex or broadcast connection. Every variant ends the run:
/// there is no automatic reconnect.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server responded with {0}")]
    Status(reqwest::StatusCode),
    #[error("undecodable message: {0}")]
    Decode(#[from] DecodeError),
    #[error("desynchronized from server: {0}")]
    Desync(ProtocolViolation),
    #[error("console error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
    #[error("server_url {0:?} must start with http:// or https://")]
    InvalidServerUrl(String),
    #[error("{0} role requires a session id")]
    MissingSession(&'static str),
    #[error(transparent)]
    InvalidSession(#[from] ParseSessionIdError),
    #[error("participant role requires an alliance")]
    MissingAlliance,
    #[error("host requires exactly one of host.builtin_game or [host.custom]")]
    GameSelection,
    #[error("invalid custom game: {0}")]
    Definition(#[from] DefinitionError),
    #[error("display.tick_interval_ms must be > 0")]
    ZeroTickInterval,
}
