use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use netcontrol_server::{create_router, AppState, FileUserStore, ServerConfig, UpstreamClient};

/// Log to stderr, and to a daily file in `log_dir` when one is set.
///
/// The returned guard flushes the file writer; keep it alive until exit.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "netcontrol-server.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = ServerConfig::from_env()?;
    let _guard = init_tracing(config.log_dir.as_deref());
    config.auth.warn_if_insecure();

    // The only fatal startup condition: no account store.
    let users = FileUserStore::open(&config.data_dir)
        .await
        .with_context(|| format!("Failed to open user store in {}", config.data_dir.display()))?;

    let upstream = UpstreamClient::new(config.upstreams.clone(), config.upstream_timeout)
        .context("Failed to build upstream HTTP client")?;
    for (name, url) in [
        ("devices", &config.upstreams.devices),
        ("blocking", &config.upstreams.blocking),
        ("schedules", &config.upstreams.schedules),
    ] {
        match url {
            Some(url) => info!(service = name, url = %url, "Upstream configured"),
            None => tracing::warn!(service = name, "Upstream not configured; its routes will fail"),
        }
    }

    let state = AppState::new(config.auth.clone(), Arc::new(users), upstream);
    let app = create_router(state, Some(&config.public_dir));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, public_dir = %config.public_dir.display(), "Starting netcontrol server");

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.context("Server error")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    Ok(())
}
