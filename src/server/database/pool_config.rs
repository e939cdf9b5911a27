use std::time::Duration;

pub(crate) struct PoolConfig {
    /// pool name, shows up in logs
    pub name: &'static str,
    /// connection pool size
    pub size: usize,
    /// connection string
    pub conn_str: String,
    /// how long `acquire` waits for a free connection
    pub acquire_timeout: Duration,
}
