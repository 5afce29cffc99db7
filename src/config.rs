use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Runtime settings for the server binary.
#[derive(Parser, Clone, Debug)]
#[command(name = "intention-trading-bot")]
pub struct Config {
    /// Address the HTTP API binds to.
    #[arg(long, env = "BOT_BIND", default_value = "0.0.0.0:7100")]
    pub bind: SocketAddr,

    /// Path of the SQLite configuration store.
    #[arg(long, env = "BOT_DB_PATH", default_value = "intention-bot.db")]
    pub db_path: PathBuf,

    /// Base URL of the host case/session/analysis service.
    #[arg(long, env = "BOT_HOST_API_URL", default_value = "http://localhost:7000")]
    pub host_api_url: String,

    /// Per-request timeout for outbound calls, in seconds. A timeout is
    /// terminal for that call; nothing retries.
    #[arg(long, env = "BOT_REQUEST_TIMEOUT_SECS", default_value_t = 15)]
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
