use axum::{routing::get, Router};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatbridge::bridge::{BridgeConfig, BridgeManager};
use chatbridge::bus::{BusClient, NatsBusClient};
use chatbridge::config::Config;
use chatbridge::history::{self, JsonlMessageStore, MessageStore};
use chatbridge::persistence::PersistenceConsumer;
use chatbridge::room::{self, InMemoryRoomRepository, RoomRepository, RoomService, SqliteRoomRepository};
use chatbridge::shared::AppState;
use chatbridge::websockets;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatbridge=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting chatbridge server");
    let config = Config::from_env();

    let bus: Arc<dyn BusClient> = Arc::new(
        NatsBusClient::connect(&config.bus_url)
            .await
            .expect("Failed to connect to message bus"),
    );

    // Registry backend is swappable: SQLite when DATABASE_URL is set,
    // in-memory otherwise
    let room_repository: Arc<dyn RoomRepository + Send + Sync> = match &config.database_url {
        Some(url) => Arc::new(
            SqliteRoomRepository::connect(url)
                .await
                .expect("Failed to connect to room registry database"),
        ),
        None => Arc::new(InMemoryRoomRepository::new()),
    };

    RoomService::new(Arc::clone(&room_repository))
        .ensure_default_room()
        .await
        .expect("Failed to bootstrap default room");

    let message_store: Arc<dyn MessageStore + Send + Sync> = Arc::new(
        JsonlMessageStore::new(config.history_dir.clone())
            .expect("Failed to create history directory"),
    );

    let bridge_manager = Arc::new(BridgeManager::new(
        Arc::clone(&bus),
        Arc::clone(&room_repository),
        BridgeConfig::from(&config),
    ));

    // The persistence consumer shares nothing with the bridges but the bus:
    // a stalled log write never blocks live fan-out
    let cancel = CancellationToken::new();
    let consumer = PersistenceConsumer::new(Arc::clone(&bus), Arc::clone(&message_store));
    let consumer_handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { consumer.run(cancel).await }
    });

    let app_state = AppState::new(
        room_repository,
        message_store,
        Arc::clone(&bridge_manager),
    );

    let app = Router::new()
        .route(
            "/rooms",
            get(room::handlers::list_rooms).post(room::handlers::create_room),
        )
        .route(
            "/rooms/:room_id/messages",
            get(history::handlers::get_room_messages),
        )
        .route("/ws/:room_id", get(websockets::websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind listener");
    info!("Server running on http://{}", config.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // drain: let the consumer finish its in-flight append, then drop the
    // bridges and their subscriptions
    cancel.cancel();
    let _ = consumer_handle.await;
    bridge_manager.shutdown().await;
    info!("Shutdown complete");
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
