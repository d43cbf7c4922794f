use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration, read once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP/WebSocket listener binds to
    pub bind_addr: String,
    /// NATS endpoint for the message bus
    pub bus_url: String,
    /// Optional SQLite URL for the room registry; in-memory registry when unset
    pub database_url: Option<String>,
    /// Directory holding the per-room durable logs
    pub history_dir: PathBuf,
    /// Number of recent messages replayed to a newly attached session
    pub replay_capacity: usize,
    /// Per-session outbound channel capacity
    pub session_buffer: usize,
    /// How long a publish waits on a full session buffer before detaching it
    pub slow_consumer_timeout: Duration,
    /// Whether a publisher's own session receives its message back
    pub echo_to_sender: bool,
    /// Whether a room bridge is torn down when its last session detaches
    pub idle_teardown: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:3000"),
            bus_url: env_or("BUS_URL", "nats://127.0.0.1:4222"),
            database_url: env::var("DATABASE_URL").ok(),
            history_dir: PathBuf::from(env_or("HISTORY_DIR", "message_history")),
            replay_capacity: parse_or("REPLAY_CAPACITY", 50),
            session_buffer: parse_or("SESSION_BUFFER", 64),
            slow_consumer_timeout: Duration::from_millis(parse_or(
                "SLOW_CONSUMER_TIMEOUT_MS",
                5_000,
            )),
            echo_to_sender: parse_or("ECHO_TO_SENDER", true),
            idle_teardown: parse_or("IDLE_TEARDOWN", true),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
