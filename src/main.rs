use std::sync::Arc;

use anyhow::Context;
use axum::{Router, routing::get};
use roomchat::{
    AppState,
    auth::{self, Accounts},
    bus::BroadcastBus,
    chat,
    compose::Outlets,
    config::Config,
    db,
    enrich::HttpContentSource,
    index::index,
    store::{LocalBlobStore, SqliteLocationSink, SqliteMessageStore},
};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::SameSite};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("roomchat=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(config.session_minutes)));

    let db_pool = db::connect(&config.database_url)
        .await
        .with_context(|| format!("cannot open {}", config.database_url))?;

    let bus = BroadcastBus::new(config.bus_capacity);
    let outlets = Outlets {
        store: Arc::new(SqliteMessageStore::open(db_pool.clone(), bus.clone()).await?),
        blobs: Arc::new(LocalBlobStore::new(&config.media_dir, &config.media_base_url)),
        locations: Arc::new(SqliteLocationSink::new(db_pool.clone())),
        source: Arc::new(HttpContentSource::new(reqwest::Client::new(), &config.content_source_url)),
    };
    let app_state = AppState {
        accounts: Accounts::new(db_pool),
        outlets,
        bus,
    };

    let app = Router::new()
        .route("/", get(index))
        .merge(auth::router())
        .nest("/chat", chat::router())
        .nest_service("/media", ServeDir::new(&config.media_dir))
        .with_state(app_state)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
