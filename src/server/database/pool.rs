use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Error};
use log::{error, info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time;
use tokio_postgres::Client;

use crate::server::controller::error::CoreError;
use crate::server::database::connection::Connection;
use crate::server::database::pool_config::PoolConfig;

pub(crate) struct CommonPool {
    /// pool name
    name: &'static str,
    conn_str: String,
    acquire_timeout: Duration,
    /// idle clients, accessed in a FIFO manner
    connections: Mutex<VecDeque<Client>>,
    /// one permit per idle client
    available: Arc<Semaphore>,
}

/// Fixed-size set of postgres clients.
#[derive(Clone)]
pub(crate) struct Pool(Arc<CommonPool>);

pub(crate) mod connect_util {
    use anyhow::Context;
    use log::error;
    use tokio_postgres::{Client, NoTls};

    pub async fn connect(conn_str: &str) -> anyhow::Result<Client> {
        let (client, conn) = tokio_postgres::connect(conn_str, NoTls)
            .await
            .context("failed to create connection")?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                error!("connection returned error and aborted, {}", e);
            }
        });
        Ok(client)
    }
}

impl Pool {
    pub const DEFAULT_SIZE: usize = 10;

    /// create an empty pool; `init` fills it
    pub fn new(config: &PoolConfig) -> Self {
        Self(Arc::new(CommonPool {
            name: config.name,
            conn_str: config.conn_str.clone(),
            acquire_timeout: config.acquire_timeout,
            connections: Mutex::new(VecDeque::with_capacity(config.size)),
            available: Arc::new(Semaphore::new(0)),
        }))
    }

    /// open `size` connections concurrently
    pub async fn init(&self, size: usize) -> Result<(), Error> {
        let mut set = JoinSet::new();
        for _ in 0..size {
            let conn_str = self.0.conn_str.clone();
            set.spawn(async move { connect_util::connect(&conn_str).await });
        }
        let mut connected = 0;
        while let Some(res) = set.join_next().await {
            match res {
                Ok(Ok(client)) => {
                    self.release(client);
                    connected += 1;
                }
                Ok(Err(e)) => error!("pool={} failed to connect, {:#}", self.0.name, e),
                Err(e) => error!("join_next failed when joining, {}", e),
            }
        }
        if connected == 0 {
            return Err(anyhow!("pool={} could not open any connection", self.0.name));
        }
        info!("pool={} created with {} idle connections", self.0.name, self.idle());
        Ok(())
    }

    /// acquire a connection, bail out once the pool's acquire timeout passes
    pub async fn acquire(&self) -> Result<Connection, CoreError> {
        let sleep = time::sleep(self.0.acquire_timeout);
        tokio::pin!(sleep);
        let permit = tokio::select! {
            permit = self.0.available.clone().acquire_owned() => {
                permit.map_err(|_| CoreError::ServerIsBusy)?
            },
            _ = &mut sleep => {
                warn!("pool={} timed out to acquire a connection after {:?}", self.0.name, self.0.acquire_timeout);
                return Err(CoreError::ServerIsBusy);
            },
        };
        let idle = self
            .0
            .connections
            .lock()
            .map_err(|_| CoreError::persistence("connection pool lock poisoned"))?
            .pop_front();
        let client = match idle {
            Some(client) if !client.is_closed() => client,
            _ => {
                warn!("pool={} replacing a closed connection", self.0.name);
                connect_util::connect(&self.0.conn_str)
                    .await
                    .map_err(|e| CoreError::persistence(format!("{e:#}")))?
            }
        };
        // the permit is re-issued by `release` when the connection comes back
        permit.forget();
        Ok(Connection::new(client, self.clone()))
    }

    pub fn release(&self, client: Client) {
        match self.0.connections.lock() {
            Ok(mut connections) => {
                connections.push_back(client);
                self.0.available.add_permits(1);
            }
            Err(_) => error!("pool={} lock poisoned, dropping connection", self.0.name),
        }
    }

    /// connections ready to hand out
    pub fn idle(&self) -> usize {
        self.0.available.available_permits()
    }
}
