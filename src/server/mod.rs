//! main file for the server

pub(crate) mod bus;
pub(crate) mod controller;
pub(crate) mod database;
pub(crate) mod model;
pub(crate) mod scheduler;
pub(crate) mod service;
pub(crate) mod state;
pub(crate) mod util;

use std::io;
use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use log::{error, info};
use tokio_util::sync::CancellationToken;

use crate::server::bus::NotificationBus;
use crate::server::database::memory::MemoryStore;
use crate::server::database::postgres::PgStore;
use crate::server::database::StoreBackend;
use crate::server::model::config::{ServerConfig, StoreKind};
use crate::server::scheduler::job::room_sweeper;
use crate::server::service::menu::{MenuCatalog, StaticMenuCatalog};
use crate::server::state::AppState;

/// Run the server
pub async fn run(config: ServerConfig) -> io::Result<()> {
    let store = match config.store {
        StoreKind::Memory => StoreBackend::Memory(MemoryStore::new()),
        StoreKind::Postgres => StoreBackend::Postgres(PgStore::connect(&config.db).await.map_err(io::Error::other)?),
    };
    let menu: Arc<dyn MenuCatalog> = match &config.menu_seed_path {
        Some(path) => Arc::new(StaticMenuCatalog::load(path).map_err(io::Error::other)?),
        None => Arc::new(StaticMenuCatalog::seeded()),
    };
    info!(
        "store={}, menu items={}, bus capacity={}",
        config.store,
        menu.list().len(),
        config.bus_capacity
    );
    let bus = NotificationBus::new(config.bus_capacity);
    let state = AppState::new(store, menu, bus.clone());

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(controller::configure)
    })
    .bind(config.addr)?
    .run();

    let cancel_token = CancellationToken::new();
    let sweeper = tokio::spawn(room_sweeper(bus, config.room_sweep_interval, cancel_token.clone()));

    let result = server.await;
    cancel_token.cancel();
    if let Err(e) = sweeper.await {
        error!("room sweeper ended abnormally, {}", e);
    }
    result
}
