//! Main Entrypoint for the Realtime Relay Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing console and rolling-file logging.
//! 3. Building the session registry, credential client and lifecycle manager.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server (plain or TLS) and handling graceful shutdown.

use anyhow::Context;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use relay_api::{
    config::{Config, TlsConfig},
    logging,
    router::create_router,
    state::AppState,
};
use relay_core::{
    CredentialClient, OpenAICredentialClient, SessionLifecycleManager, SessionRegistry,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

/// How long in-flight connections get to finish after Ctrl+C under TLS.
const TLS_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

async fn serve_tls(app: Router, addr: SocketAddr, tls: &TlsConfig) -> anyhow::Result<()> {
    let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .with_context(|| {
            format!(
                "Failed to load TLS material from {} and {}",
                tls.cert_path.display(),
                tls.key_path.display()
            )
        })?;

    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_handle.graceful_shutdown(Some(TLS_SHUTDOWN_GRACE));
    });

    axum_server::bind_rustls(addr, rustls)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    let _log_guard = logging::init(&config)?;
    info!("Configuration loaded. Initializing application state...");
    if config.api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; session creation will fail until it is configured.");
    }

    // --- 3. Initialize Session Services ---
    let registry = Arc::new(SessionRegistry::new());
    let credentials: Arc<dyn CredentialClient> = Arc::new(OpenAICredentialClient::new(
        config.api_key.clone(),
        config.provider_base_url.clone(),
    ));
    let lifecycle = Arc::new(SessionLifecycleManager::new(
        registry,
        credentials,
        config.session_defaults(),
    ));
    let app_state = Arc::new(AppState::new(lifecycle));

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state, &config.public_dir).layer(cors);

    // --- 5. Start Server ---
    info!(
        model = %config.model,
        voice = %config.voice,
        max_sessions = config.max_sessions,
        bind_address = %config.bind_address,
        tls = config.tls.is_some(),
        "Service configured. Starting server..."
    );

    match &config.tls {
        Some(tls) => serve_tls(app, config.bind_address, tls).await?,
        None => {
            let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        }
    }

    info!("Server has shut down.");
    Ok(())
}
