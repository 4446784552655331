//! Application state shared across connection tasks and routes

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::config::Config;
use crate::matchmaking::Matchmaker;
use crate::room::RoomRegistry;
use crate::ws::PeerHandle;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Every live connection keyed by peer id. Removal from this map gates
    /// disconnect handling so it runs exactly once per connection.
    pub peers: Arc<DashMap<Uuid, PeerHandle>>,
    pub rooms: Arc<RoomRegistry>,
    pub matchmaker: Arc<Matchmaker>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let rooms = Arc::new(RoomRegistry::new());
        let matchmaker = Arc::new(Matchmaker::new(rooms.clone()));

        Self {
            config,
            peers: Arc::new(DashMap::new()),
            rooms,
            matchmaker,
        }
    }
}
