use anyhow::{anyhow, Result};
use axum::http::HeaderValue;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use embrace::config::{AppConfig, StoreBackend};
use embrace::http;
use embrace::infra::db::Db;
use embrace::infra::memory::MemoryStore;
use embrace::infra::store::{SharedAccountStore, SharedContentStore};
use embrace::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let (content, accounts) = open_stores(&config).await?;

    let state = AppState {
        content,
        accounts,
        paseto_access_key: config.paseto_access_key,
        paseto_refresh_key: config.paseto_refresh_key,
        access_ttl_minutes: config.access_ttl_minutes,
        refresh_ttl_days: config.refresh_ttl_days,
    };

    let mut app: Router = http::router(state).layer(TraceLayer::new_for_http());
    if let Some(origin) = &config.cors_allow_origin {
        let origin = HeaderValue::from_str(origin)
            .map_err(|err| anyhow!("invalid CORS_ALLOW_ORIGIN: {}", err))?;
        app = app.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!("listening on {}", config.http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn open_stores(config: &AppConfig) -> Result<(SharedContentStore, SharedAccountStore)> {
    match &config.store {
        StoreBackend::Postgres { database_url } => {
            let db = Db::connect(config, database_url).await?;
            sqlx::migrate!("./migrations").run(db.pool()).await?;
            tracing::info!("connected to postgres");
            let db = Arc::new(db);
            Ok((db.clone(), db))
        }
        StoreBackend::Memory { seed_demo_content } => {
            let store = if *seed_demo_content {
                MemoryStore::with_demo_content()
            } else {
                MemoryStore::new()
            };
            tracing::warn!(seed_demo_content, "using in-memory store; data is lost on exit");
            let store = Arc::new(store);
            Ok((store.clone(), store))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

