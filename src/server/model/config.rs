use std::net::SocketAddrV4;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use derive_more::Display;

use crate::server::bus::NotificationBus;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StoreKind {
    #[display("memory")]
    Memory,
    #[display("postgres")]
    Postgres,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Self::Memory),
            "postgres" => Ok(Self::Postgres),
            s => Err(format!("Invalid STORE_BACKEND: {s}")),
        }
    }
}

/// Database settings, only read when the postgres backend is selected
#[derive(Debug, Clone)]
pub(crate) struct DbConfig {
    pub read_conn_str: String,
    pub write_conn_str: String,
    pub pool_size: usize,
    pub timeout: Duration,
}

/// Server configs
#[derive(Debug, Clone)]
pub(crate) struct ServerConfig {
    pub addr: SocketAddrV4,
    pub store: StoreKind,
    pub db: DbConfig,
    pub bus_capacity: usize,
    pub room_sweep_interval: Duration,
    pub menu_seed_path: Option<PathBuf>,
}

impl ServerConfig {
    pub fn new(addr: SocketAddrV4, store: StoreKind, db: DbConfig) -> Self {
        Self {
            addr,
            store,
            db,
            bus_capacity: NotificationBus::DEFAULT_CAPACITY,
            room_sweep_interval: Duration::from_secs(60),
            menu_seed_path: None,
        }
    }

    pub fn with_bus(mut self, capacity: usize, sweep_interval: Duration) -> Self {
        self.bus_capacity = capacity;
        self.room_sweep_interval = sweep_interval;
        self
    }

    pub fn with_menu_seed(mut self, path: Option<PathBuf>) -> Self {
        self.menu_seed_path = path;
        self
    }
}
