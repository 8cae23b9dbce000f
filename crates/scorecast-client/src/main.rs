use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use scorecast_client::broadcast::BroadcastConnection;
use scorecast_client::config::{ClientConfig, DEFAULT_CONFIG_FILE, Endpoints, Launch};
use scorecast_client::console::{Console, Frontend, stdin_lines};
use scorecast_client::duplex::{HostConnection, ParticipantConnection};
use scorecast_client::error::TransportError;
use scorecast_client::runtime::{run_host, run_participant, run_spectator};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from);

    let (config, launch, endpoints) = match ClientConfig::load(&path).and_then(|cfg| {
        let launch = cfg.launch()?;
        let endpoints = cfg.endpoints()?;
        Ok((cfg, launch, endpoints))
    }) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        },
    };

    let mut console = Console::new(std::io::stdout());
    let tick = Duration::from_millis(config.display.tick_interval_ms);
    match run(&endpoints, launch, tick, &mut console).await {
        Ok(()) => {
            tracing::info!("Connection closed");
            let _ = console.notice("disconnected");
            ExitCode::SUCCESS
        },
        Err(e) => {
            tracing::error!(error = %e, "Connection lost");
            let _ = console.notice(&format!("disconnected: {e}"));
            ExitCode::FAILURE
        },
    }
}

async fn run(
    endpoints: &Endpoints,
    launch: Launch,
    tick: Duration,
    frontend: &mut impl Frontend,
) -> Result<(), TransportError> {
    match launch {
        Launch::Host(setup) => {
            let connection = HostConnection::connect(&endpoints.host()).await?;
            run_host(connection, setup, stdin_lines(), frontend, tick).await?;
        },
        Launch::Participant { session, alliance } => {
            tracing::info!(session_id = %session, %alliance, "Joining session");
            let connection =
                ParticipantConnection::connect(&endpoints.join(session, alliance)).await?;
            run_participant(connection, alliance, stdin_lines(), frontend, tick).await?;
        },
        Launch::Spectator { session } => {
            tracing::info!(session_id = %session, "Watching session");
            let client = reqwest::Client::new();
            let connection = BroadcastConnection::connect(&client, &endpoints.view(session)).await?;
            run_spectator(connection, frontend, tick).await?;
        },
    }
    Ok(())
}
