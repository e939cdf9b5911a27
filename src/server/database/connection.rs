use std::ops::{Deref, DerefMut};

use tokio_postgres::Client;

use crate::server::database::pool::Pool;

/// A pooled client, handed back to its pool on drop.
pub(crate) struct Connection {
    client: Option<Client>,
    pool: Pool,
}

impl Connection {
    pub fn new(client: Client, pool: Pool) -> Self {
        Self { client: Some(client), pool }
    }
}

impl Deref for Connection {
    type Target = Client;

    fn deref(&self) -> &Client {
        // only emptied in drop
        self.client.as_ref().unwrap()
    }
}

impl DerefMut for Connection {
    fn deref_mut(&mut self) -> &mut Client {
        self.client.as_mut().unwrap()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.pool.release(client);
        }
    }
}
