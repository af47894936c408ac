mod config;
mod error;
mod paths;
mod protocol;
mod state;

use std::sync::Arc;

use config::DaemonConfig;
use paths::AppPaths;
use protocol::{Request, Response};
use state::DaemonState;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::time::{self, Duration};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let paths = AppPaths::new()?;
    let config = DaemonConfig::load(&paths.config_file())?;
    info!(
        "Data dir {}; {}x{} maze, seed {}",
        paths.data_dir().display(),
        config.width,
        config.height,
        config.seed
    );

    let daemon = DaemonState::new(&config)?;
    tracing::debug!("initial layout:\n{}", daemon.sandbox().grid().render_ascii(None));
    let state = Arc::new(RwLock::new(daemon));

    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C: exiting");
            std::process::exit(0);
        }
    });

    let listener = TcpListener::bind(&config.addr).await?;
    info!("gridlearn daemon listening on {}", config.addr);

    // Step loop task
    let state_clone = Arc::clone(&state);
    tokio::spawn(async move {
        loop {
            // Interval is re-read every step so changes apply immediately.
            let interval = {
                let s = state_clone.read().await;
                s.step_interval()
            };
            time::sleep(interval).await;

            let mut s = state_clone.write().await;
            s.tick();
        }
    });

    // Accept client connections
    loop {
        let (stream, addr) = listener.accept().await?;
        info!("Client connected: {}", addr);
        let state_clone = Arc::clone(&state);

        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, state_clone).await {
                error!("Client handler error: {}", e);
            }
        });
    }
}

async fn handle_client(
    stream: TcpStream,
    state: Arc<RwLock<DaemonState>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let request: Request = match serde_json::from_str(&line) {
            Ok(req) => req,
            Err(e) => {
                warn!("Rejected request: {}", e);
                let resp = Response::Error {
                    message: format!("Invalid request: {}", e),
                };
                writer
                    .write_all(serde_json::to_string(&resp)?.as_bytes())
                    .await?;
                writer.write_all(b"\n").await?;
                continue;
            }
        };

        let shutdown = matches!(request, Request::Shutdown);
        let response = {
            let mut s = state.write().await;
            s.handle(request)
        };

        writer
            .write_all(serde_json::to_string(&response)?.as_bytes())
            .await?;
        writer.write_all(b"\n").await?;

        if shutdown {
            tokio::spawn(async {
                // Give the response a moment to flush before exiting.
                time::sleep(Duration::from_millis(50)).await;
                std::process::exit(0);
            });
        }
    }

    Ok(())
}
