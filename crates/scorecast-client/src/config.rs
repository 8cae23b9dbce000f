use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use scorecast_core::alliance::Alliance;
use scorecast_core::game::{GameDefinition, ScorePointDraft, duration_from_minutes};
use scorecast_core::net::packets::GameSetup;
use scorecast_core::session_id::SessionId;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "scorecast.toml";

/// Which client to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleKind {
    Host,
    Participant,
    #[default]
    Spectator,
}

impl RoleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Participant => "participant",
            Self::Spectator => "spectator",
        }
    }
}

impl FromStr for RoleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "host" => Ok(Self::Host),
            "participant" => Ok(Self::Participant),
            "spectator" | "viewer" => Ok(Self::Spectator),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Top-level client configuration, loaded from `scorecast.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// `http://` or `https://` root of the scoreboard server.
    pub server_url: String,
    pub role: RoleKind,
    /// Base-36 session id, as shown on the host console.
    pub session: Option<String>,
    pub alliance: Option<Alliance>,
    pub host: HostConfig,
    pub display: DisplayConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".to_string(),
            role: RoleKind::default(),
            session: None,
            alliance: None,
            host: HostConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

/// Game selection for a new session. Exactly one of the two must be set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub builtin_game: Option<u64>,
    pub custom: Option<CustomGameConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomGameConfig {
    /// Match length in seconds.
    #[serde(default)]
    pub duration: u32,
    /// Match length in whole minutes. Takes precedence over `duration`.
    #[serde(default)]
    pub duration_minutes: Option<u16>,
    #[serde(default)]
    pub score_points: Vec<ScorePointDraft>,
}

impl CustomGameConfig {
    fn duration_secs(&self) -> Result<u32, ConfigError> {
        match self.duration_minutes {
            Some(minutes) => Ok(u32::from(duration_from_minutes(minutes)?)),
            None => Ok(self.duration),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// How often the countdown is re-projected.
    pub tick_interval_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 250,
        }
    }
}

/// A validated run request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launch {
    Host(GameSetup),
    Participant {
        session: SessionId,
        alliance: Alliance,
    },
    Spectator {
        session: SessionId,
    },
}

/// URLs of the server's client endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    http_base: String,
    ws_base: String,
}

impl Endpoints {
    pub fn new(server_url: &str) -> Result<Self, ConfigError> {
        let trimmed = server_url.trim().trim_end_matches('/');
        let ws_base = if let Some(rest) = trimmed.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = trimmed.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            return Err(ConfigError::InvalidServerUrl(server_url.to_string()));
        };
        Ok(Self {
            http_base: trimmed.to_string(),
            ws_base,
        })
    }

    pub fn host(&self) -> String {
        format!("{}/ws/host", self.ws_base)
    }

    /// Session ids travel in decimal on the wire paths.
    pub fn join(&self, session: SessionId, alliance: Alliance) -> String {
        format!("{}/ws/join/{}/{alliance}", self.ws_base, session.0)
    }

    pub fn view(&self, session: SessionId) -> String {
        format!("{}/sse/view/{}", self.http_base, session.0)
    }
}

impl ClientConfig {
    /// Load config from `path` if it exists, then apply env var overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg = toml::from_str::<ClientConfig>(&content).map_err(|source| {
                    ConfigError::Parse {
                        path: path.display().to_string(),
                        source,
                    }
                })?;
                tracing::info!(path = %path.display(), "Loaded configuration");
                cfg
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No config file found, using defaults");
                ClientConfig::default()
            },
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                });
            },
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Environment variable overrides. Empty values are ignored.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup("SCORECAST_SERVER_URL")
            && !url.is_empty()
        {
            self.server_url = url;
        }
        if let Some(role) = lookup("SCORECAST_ROLE")
            && !role.is_empty()
        {
            self.role = role.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "SCORECAST_ROLE",
                value: role.clone(),
            })?;
        }
        if let Some(session) = lookup("SCORECAST_SESSION")
            && !session.is_empty()
        {
            self.session = Some(session);
        }
        if let Some(alliance) = lookup("SCORECAST_ALLIANCE")
            && !alliance.is_empty()
        {
            self.alliance = Some(alliance.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "SCORECAST_ALLIANCE",
                value: alliance.clone(),
            })?);
        }
        if let Some(game) = lookup("SCORECAST_BUILTIN_GAME")
            && !game.is_empty()
        {
            let id = game.parse::<u64>().map_err(|_| ConfigError::InvalidEnv {
                var: "SCORECAST_BUILTIN_GAME",
                value: game.clone(),
            })?;
            self.host.builtin_game = Some(id);
            self.host.custom = None;
        }
        if let Some(val) = lookup("SCORECAST_TICK_INTERVAL_MS")
            && !val.is_empty()
        {
            self.display.tick_interval_ms =
                val.parse::<u64>().map_err(|_| ConfigError::InvalidEnv {
                    var: "SCORECAST_TICK_INTERVAL_MS",
                    value: val.clone(),
                })?;
        }
        Ok(())
    }

    pub fn endpoints(&self) -> Result<Endpoints, ConfigError> {
        Endpoints::new(&self.server_url)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoints()?;
        if self.display.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroTickInterval);
        }
        Ok(())
    }

    /// Validate and resolve the role-specific settings.
    pub fn launch(&self) -> Result<Launch, ConfigError> {
        self.validate()?;
        match self.role {
            RoleKind::Host => {
                let setup = match (self.host.builtin_game, &self.host.custom) {
                    (Some(id), None) => GameSetup::Builtin(id),
                    (None, Some(custom)) => GameSetup::Custom(GameDefinition::author(
                        custom.duration_secs()?,
                        custom.score_points.iter().cloned(),
                    )?),
                    _ => return Err(ConfigError::GameSelection),
                };
                Ok(Launch::Host(setup))
            },
            RoleKind::Participant => Ok(Launch::Participant {
                session: self.session_id()?,
                alliance: self.alliance.ok_or(ConfigError::MissingAlliance)?,
            }),
            RoleKind::Spectator => Ok(Launch::Spectator {
                session: self.session_id()?,
            }),
        }
    }

    fn session_id(&self) -> Result<SessionId, ConfigError> {
        let raw = self
            .session
            .as_deref()
            .ok_or(ConfigError::MissingSession(self.role.as_str()))?;
        Ok(raw.parse()?)
    }
}
