use std::path::PathBuf;
use std::time::Duration;

pub const PORT: u16 = 6379;
pub const DATABASES: usize = 16;
pub const DB_FILENAME: &str = "tardis.db";

/// Server wide settings, fixed at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the listener binds to.
    pub bind: String,
    pub port: u16,
    /// Log every request and reply.
    pub debug: bool,
    /// When set, connections must `AUTH` with this password before running anything else.
    pub password: Option<String>,
    /// Snapshot file written by `SAVE` and read back at startup.
    pub dbfilename: PathBuf,
    /// Number of logical databases addressable through `SELECT` and `MOVE`.
    pub databases: usize,
    /// Longest the background expiry sweep sleeps between passes.
    pub expire_sweep_max_idle: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: PORT,
            debug: false,
            password: None,
            dbfilename: PathBuf::from(DB_FILENAME),
            databases: DATABASES,
            expire_sweep_max_idle: Duration::from_secs(1),
        }
    }
}
