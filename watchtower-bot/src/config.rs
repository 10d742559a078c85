use std::env::var;
use std::time::Duration;

use dotenvy::dotenv;

/// Blocks per chunk edge.
pub const CHUNK_SIZE: f64 = 16.0;

/// Bot configuration with environment variable overrides.
///
/// Nothing here is validated: a missing or unparsable variable silently
/// falls back to its default.
#[derive(Debug, Clone)]
pub struct Config {
    /// Webhook receiving intruder alerts
    /// Env: DISCORD_WEBHOOK_URL (default: "YOUR_DISCORD_WEBHOOK_URL_HERE")
    pub webhook_url: String,

    /// Players that never trigger alerts, exact case-sensitive names
    /// Env: WHITELIST, comma separated (default: "Player1,Player2,YourUsername")
    pub whitelist: Vec<String>,

    /// Minecraft server host
    /// Env: MINECRAFT_HOST (default: "localhost")
    pub minecraft_host: String,

    /// Minecraft server port
    /// Env: MINECRAFT_PORT (default: 25565)
    pub minecraft_port: u16,

    /// Offline-mode username of the bot
    /// Env: BOT_USERNAME (default: "SecurityBot")
    pub bot_username: String,

    /// Status server port
    /// Env: PORT (default: 3000)
    pub port: u16,

    /// Detection radius in chunks
    /// Env: DETECTION_CHUNKS (default: 15)
    pub detection_chunks: u32,

    /// Time between scans
    /// Env: CHECK_INTERVAL_MS (default: 2000)
    pub check_interval: Duration,

    /// How long a player stays suppressed after an alert
    /// Env: NOTIFICATION_COOLDOWN_MS (default: 60000)
    pub notification_cooldown: Duration,

    /// Delay before reconnecting after the session ends
    /// Env: RECONNECT_DELAY_MS (default: 5000)
    pub reconnect_delay: Duration,

    /// Login deadline and longest silence tolerated from the game server
    /// Env: SESSION_TIMEOUT_MS (default: 30000)
    pub session_timeout: Duration,

    /// Timeout for a single webhook delivery
    /// Env: WEBHOOK_TIMEOUT_SECS (default: 10)
    pub webhook_timeout: Duration,

    /// Status server request timeout
    /// Env: REQUEST_TIMEOUT_SECS (default: 30)
    pub request_timeout: Duration,

    /// Alert embed title
    /// Env: ALERT_TITLE (default: "Unauthorized player near base")
    pub alert_title: String,

    /// Alert embed footer
    /// Env: ALERT_FOOTER (default: "base protector bot")
    pub alert_footer: String,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let _ = dotenv(); //for local runs mostly
        let defaults = Self::default();
        Self {
            webhook_url: env_or_default_string("DISCORD_WEBHOOK_URL", &defaults.webhook_url),
            whitelist: var("WHITELIST")
                .map(|list| parse_whitelist(&list))
                .unwrap_or(defaults.whitelist),
            minecraft_host: env_or_default_string("MINECRAFT_HOST", &defaults.minecraft_host),
            minecraft_port: env_or_default("MINECRAFT_PORT", defaults.minecraft_port),
            bot_username: env_or_default_string("BOT_USERNAME", &defaults.bot_username),
            port: env_or_default("PORT", defaults.port),
            detection_chunks: env_or_default("DETECTION_CHUNKS", defaults.detection_chunks),
            check_interval: Duration::from_millis(env_or_default("CHECK_INTERVAL_MS", 2000)),
            notification_cooldown: Duration::from_millis(env_or_default(
                "NOTIFICATION_COOLDOWN_MS",
                60_000,
            )),
            reconnect_delay: Duration::from_millis(env_or_default("RECONNECT_DELAY_MS", 5000)),
            session_timeout: Duration::from_millis(env_or_default("SESSION_TIMEOUT_MS", 30_000)),
            webhook_timeout: Duration::from_secs(env_or_default("WEBHOOK_TIMEOUT_SECS", 10)),
            request_timeout: Duration::from_secs(env_or_default("REQUEST_TIMEOUT_SECS", 30)),
            alert_title: env_or_default_string("ALERT_TITLE", &defaults.alert_title),
            alert_footer: env_or_default_string("ALERT_FOOTER", &defaults.alert_footer),
        }
    }

    /// Detection radius in blocks.
    pub fn detection_radius(&self) -> f64 {
        f64::from(self.detection_chunks) * CHUNK_SIZE
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            webhook_url: "YOUR_DISCORD_WEBHOOK_URL_HERE".to_string(),
            whitelist: parse_whitelist("Player1,Player2,YourUsername"),
            minecraft_host: "localhost".to_string(),
            minecraft_port: 25565,
            bot_username: "SecurityBot".to_string(),
            port: 3000,
            detection_chunks: 15,
            check_interval: Duration::from_millis(2000),
            notification_cooldown: Duration::from_millis(60_000),
            reconnect_delay: Duration::from_millis(5000),
            session_timeout: Duration::from_millis(30_000),
            webhook_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            alert_title: "Unauthorized player near base".to_string(),
            alert_footer: "base protector bot".to_string(),
        }
    }
}

/// Split a comma separated list, dropping surrounding whitespace and empty entries.
pub fn parse_whitelist(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse environment variable or return default value
fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    var(key)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(default)
}

/// Parse environment variable string or return default value
fn env_or_default_string(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|_| default.to_string())
}
