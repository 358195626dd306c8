use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;

use durak_server::config::Config;
use durak_server::http::{router, AppState};
use durak_server::matchmaker::spawn_matchmaker;
use durak_server::room::RoomRegistry;
use durak_server::store::{InMemoryRoomStore, InMemoryUserStore};
use durak_server::telemetry;

const EVICTION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let config = Config::from_env()?;
    let rooms = RoomRegistry::new();
    let room_store: Arc<_> = Arc::new(InMemoryRoomStore::new());
    let user_store: Arc<_> = Arc::new(InMemoryUserStore::new());
    let matchmaker = spawn_matchmaker(rooms.clone(), room_store.clone());

    let state = AppState {
        bot_token: Arc::from(config.bot_token.as_str()),
        app_secret: Arc::from(config.app_secret.as_slice()),
        rooms: rooms.clone(),
        matchmaker,
        room_store,
        user_store,
    };

    tokio::spawn(evict_idle_rooms(rooms));

    let app = router(state);
    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Background sweep owned by `main`, not by any room (spec.md §5, §4.2.2):
/// drops `RoomHandle`s idle past the 30-minute eviction threshold, which
/// closes their channel and ends the room task. Persisted state survives
/// in `room_store` and rehydrates on next attachment.
async fn evict_idle_rooms(rooms: RoomRegistry) {
    let mut ticker = tokio::time::interval(EVICTION_SWEEP_INTERVAL);
    loop {
        ticker.tick().await;
        rooms.evict_idle();
    }
}
