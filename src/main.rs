//! Childlike Storefront - cart service

use std::sync::Arc;

use anyhow::Result;
use childlike_storefront::{
    api::{self, AppState},
    controller::{spawn_session_listener, TracingObserver},
    notify::NatsObserver,
    store::{FileSlot, LocalCartStore, MemoryCartStore, PgCartStore, RemoteCartStore},
    CartController, Config, SessionHub, SessionNotifier,
};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;

    let remote: Arc<dyn RemoteCartStore> = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(10).connect(url).await?;
            sqlx::migrate!("./migrations").run(&db).await?;
            Arc::new(PgCartStore::new(db))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, account carts live in memory only");
            Arc::new(MemoryCartStore::new())
        }
    };

    let sessions = SessionHub::default();
    let local = LocalCartStore::new(FileSlot::new(config.cart_storage_path.clone()));
    let mut controller = CartController::start(local, remote, &sessions).await;
    controller.subscribe(TracingObserver);
    if let Some(url) = &config.nats_url {
        match async_nats::connect(url.as_str()).await {
            Ok(client) => controller.subscribe(NatsObserver::new(client)),
            Err(e) => tracing::warn!(error = %e, "NATS unavailable, cart events not published"),
        }
    }

    let controller = Arc::new(Mutex::new(controller));
    spawn_session_listener(controller.clone(), sessions.subscribe());
    let state = AppState { controller, sessions, checkout: Arc::new(config.checkout.clone()) };

    let app = api::router(state).layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive());
    tracing::info!("🚀 Childlike Storefront listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}
