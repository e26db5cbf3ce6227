use roomcast::{auth, chat::Registry, config::Config, db::Store, rooms, AppState};
use axum::{
    debug_handler, extract::State, routing::get, Json, Router
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "roomcast=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(config.session_expiry_minutes)));

    let store = Store::connect(&config.database_url, config.db_max_connections).await?;
    store.init().await?;

    let bind_addr = config.bind_addr;
    let max_upload_bytes = config.max_upload_bytes;
    let media = ServeDir::new(&config.media_dir);
    let media_url = config.media_url.clone();
    let app_state = AppState::new(store, config);

    let app = Router::new()
        .route("/health", get(health))

        .merge(auth::router())
        .merge(rooms::router(max_upload_bytes))
        .nest_service(&media_url, media)

        .with_state(app_state)
        .layer(session_layer)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(bind_addr).await?;
    info!(%bind_addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[debug_handler(state = AppState)]
async fn health(State(registry): State<Registry>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "rooms": registry.room_count(),
        "connections": registry.connection_count(),
    }))
}
