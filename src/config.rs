use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Redema realtime server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "redema-server", version, about = "Redema realtime notification server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "REDEMA_PORT", default_value = "5001")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "REDEMA_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./redema.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "REDEMA_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, signing key)
    #[arg(long, env = "REDEMA_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Chat room bounds (loaded from [chat] section in TOML)
    #[arg(skip)]
    #[serde(default)]
    pub chat: Option<ChatConfig>,
}

/// Bounds for the in-memory chat room table. Rooms are ephemeral and never
/// persisted; without these the table grows until process restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Evict a room after this many seconds without a join or message (default: 86400)
    #[serde(default = "default_room_ttl")]
    pub room_ttl_secs: u64,

    /// Hard cap on concurrent rooms; oldest idle rooms are evicted first (default: 10000)
    #[serde(default = "default_max_rooms")]
    pub max_rooms: usize,

    /// Interval in seconds between sweeper runs (default: 600)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            room_ttl_secs: 86400,
            max_rooms: 10_000,
            sweep_interval_secs: 600,
        }
    }
}

fn default_room_ttl() -> u64 {
    86400
}

fn default_max_rooms() -> usize {
    10_000
}

fn default_sweep_interval() -> u64 {
    600
}

impl Config {
    /// Load config with layered precedence: defaults < TOML file < env vars < CLI args.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let cli = Config::parse();

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::parse_from(
                std::env::args().take(1),
            )))
            .merge(Toml::file(&cli.config))
            .merge(Env::prefixed("REDEMA_"))
            .merge(Serialized::defaults(cli));

        let config: Config = figment.extract()?;
        Ok(config)
    }

    pub fn chat(&self) -> ChatConfig {
        self.chat.clone().unwrap_or_default()
    }
}

/// Commented TOML template for `--generate-config`.
pub fn generate_config_template() -> String {
    r#"# Redema realtime server configuration
# Values can also be set via REDEMA_* environment variables or CLI flags.

# Port to listen on
port = 5001

# Bind address
bind_address = "0.0.0.0"

# Data directory for the SQLite database and the JWT signing key
data_dir = "./data"

# Structured JSON logging (recommended in production)
json_logs = false

[chat]
# Evict a chat room after this many seconds of inactivity
room_ttl_secs = 86400

# Maximum number of concurrent in-memory rooms
max_rooms = 10000

# Seconds between room sweeper runs
sweep_interval_secs = 600
"#
    .to_string()
}
