mod cleanup;
mod config;
mod logging;

use std::sync::Arc;

use anyhow::Context;
use axum::http::{
    Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use cardauth_api::mail::{Mailer, NullMailer, SmtpMailer};
use cardauth_api::state::{AppState, AppStateInner};
use cardauth_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = Config::load()?;
    let _log_guard = logging::init(&config.log)?;

    info!("Loaded configuration: {:?}", config);
    if config.has_placeholder_secret() {
        warn!(
            "jwt_secret looks like a placeholder; set a long random value or {}",
            config::JWT_SECRET_ENV
        );
    }

    let db = Database::open(&config.database_path)?;

    let mailer: Arc<dyn Mailer> = match config.smtp() {
        Some(settings) => Arc::new(SmtpMailer::new(&settings)?),
        None => {
            info!("No SMTP host configured, e-mail notifications are disabled");
            Arc::new(NullMailer)
        }
    };

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        token_ttl: chrono::Duration::hours(config.token_ttl_hours),
        mailer,
        app_url: config.app_url(),
    });

    tokio::spawn(cleanup::run_cleanup_loop(
        state.clone(),
        config.sweep_interval_secs,
    ));

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    let app = cardauth_api::router(state)
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = bind(&config).await?;
    info!("Cardauth server listening on {}", listener.local_addr()?);
    info!(
        "Cards expire via a sweep every {}s, tokens live {}h",
        config.sweep_interval_secs, config.token_ttl_hours
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Host names such as `localhost` are resolved, not just literal addresses.
async fn bind(config: &Config) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind((config.host.as_str(), config.http_port))
        .await
        .with_context(|| format!("failed to bind {}:{}", config.host, config.http_port))?;
    Ok(listener)
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_host_names_and_literal_addresses() {
        for host in ["localhost", "127.0.0.1"] {
            let config = Config::from_yaml(&format!("host: {host}\nhttp_port: 0\n")).unwrap();
            let listener = bind(&config).await.unwrap();
            assert!(listener.local_addr().unwrap().ip().is_loopback());
        }
    }
}
