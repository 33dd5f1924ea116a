//! sogs-bot configuration file handling
//!
//! The bot reads one TOML file at startup and never mutates it. The poll
//! cursor lives next to it in `cursor.toml` so that the operator's file is
//! never rewritten by the running bot.
//!
//! ```text
//! ~/.local/share/sogs-bot/
//! ├── config.toml
//! ├── cursor.toml
//! └── recovery-phrase.txt
//! ```

use crate::crypto::{KeyError, SigningMode};
use crate::sogs::poller::MAX_PAGE_LIMIT;
use crate::sogs::retry::RetryPolicy;
use crate::sogs::triggers::{ResponseRule, ResponseTable};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

/// Default delay between poll cycles
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3_500;

const CURSOR_FILE: &str = "cursor.toml";
const PHRASE_FILE: &str = "recovery-phrase.txt";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    InvalidKey(#[from] KeyError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Community server and room
    pub server: ServerConfig,

    /// How the bot presents itself
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Polling cadence
    #[serde(default)]
    pub poll: PollConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Trigger tables
    #[serde(default)]
    pub responses: Vec<ResponseRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL, e.g. `https://sogs.example.org`
    pub url: String,

    /// Server X25519/Ed25519 public key, 64 hex characters
    pub public_key: String,

    /// Room token
    pub room: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Profile name attached to every reply
    pub display_name: Option<String>,

    /// Authenticate with the per-server blinded key instead of the raw key
    #[serde(default)]
    pub blinded: bool,

    /// File holding the recovery phrase
    pub recovery_phrase_file: Option<PathBuf>,

    /// Message posted once at startup
    pub greeting: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay between successful cycles
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Messages requested per page (1..=256)
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,

    /// Backoff after failed cycles
    #[serde(default)]
    pub retry: RetryPolicy,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stdout if not specified)
    pub file: Option<PathBuf>,
}

fn default_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_page_limit() -> u32 {
    MAX_PAGE_LIMIT
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            page_limit: MAX_PAGE_LIMIT,
            retry: RetryPolicy::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

impl BotConfig {
    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let config: BotConfig = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        write_with_parent(path, contents.as_bytes())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server_public_key()?;
        self.server_url()?;

        if self.server.room.is_empty() || self.server.room.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "room token '{}' is not valid",
                self.server.room
            )));
        }
        if !(1..=MAX_PAGE_LIMIT).contains(&self.poll.page_limit) {
            return Err(ConfigError::Invalid(format!(
                "poll.page_limit must be between 1 and {}",
                MAX_PAGE_LIMIT
            )));
        }
        if self.poll.interval_ms == 0 {
            return Err(ConfigError::Invalid("poll.interval_ms must be positive".into()));
        }
        if self.poll.retry.base_ms == 0 || self.poll.retry.cap_ms < self.poll.retry.base_ms {
            return Err(ConfigError::Invalid(
                "poll.retry needs 0 < base_ms <= cap_ms".into(),
            ));
        }
        if self.responses.is_empty() {
            return Err(ConfigError::Invalid("at least one [[responses]] entry is required".into()));
        }
        if let Some(rule) = self.responses.iter().find(|r| r.triggers.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "response '{}' has no triggers",
                rule.response
            )));
        }

        Ok(())
    }

    /// Decoded server public key.
    pub fn server_public_key(&self) -> Result<[u8; 32], KeyError> {
        let bytes = hex::decode(self.server.public_key.trim())
            .map_err(|e| KeyError::InvalidKey(format!("server public key is not hex: {}", e)))?;

        bytes.try_into().map_err(|b: Vec<u8>| {
            KeyError::InvalidKey(format!("server public key must be 32 bytes, got {}", b.len()))
        })
    }

    pub fn server_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.server.url)
            .map_err(|e| ConfigError::Invalid(format!("server.url: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "server.url must be http or https, got '{}'",
                url.scheme()
            )));
        }
        Ok(url)
    }

    pub fn signing_mode(&self) -> SigningMode {
        SigningMode::from_flag(self.identity.blinded)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll.interval_ms)
    }

    pub fn response_table(&self) -> ResponseTable {
        ResponseTable::new(self.responses.clone())
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml(phrase_path: &Path) -> String {
        format!(
            r#"# sogs-bot configuration
#
# The bot polls one room on one community server and answers messages
# that exactly match a trigger (case-insensitive).

[server]
# Base URL of the community server
url = "http://localhost:3000"

# Server public key (64 hex characters), shown on the server's join link
public_key = "f4cd02a9e484e6c30d47b3f48c0442decd9deebd132a023ee812af95a1e8621b"

# Room token
room = "roomtest"

[identity]
# Profile name attached to replies
display_name = "My Bot"

# Authenticate with the blinded (15-prefixed) key for this server
blinded = false

# File holding the 13 word recovery phrase
recovery_phrase_file = {phrase_path}

# Message posted once at startup (optional)
# greeting = "Hello!"

[poll]
# Delay between poll cycles in milliseconds
interval_ms = {interval}

# Messages requested per page (max {max_page})
page_limit = {max_page}

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (optional, logs to stdout if not specified)
# file = "/var/log/sogs-bot/sogs-bot.log"

[[responses]]
triggers = ["!test", "!foobar"]
response = "Test response"

[[responses]]
triggers = ["!author"]
response = "hloth.dev"
"#,
            phrase_path = toml::Value::String(phrase_path.to_string_lossy().into_owned()),
            interval = DEFAULT_POLL_INTERVAL_MS,
            max_page = MAX_PAGE_LIMIT,
        )
    }

    /// Create and save a default configuration file
    pub fn create_default(config_path: &Path) -> Result<(), ConfigError> {
        let contents = Self::generate_default_toml(&default_phrase_path(config_path));
        write_with_parent(config_path, contents.as_bytes())
    }
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sogs-bot")
        .join("config.toml")
}

/// Recovery phrase file next to the config file
pub fn default_phrase_path(config_path: &Path) -> PathBuf {
    sibling(config_path, PHRASE_FILE)
}

/// Cursor file next to the config file
pub fn default_cursor_path(config_path: &Path) -> PathBuf {
    sibling(config_path, CURSOR_FILE)
}

fn sibling(config_path: &Path, name: &str) -> PathBuf {
    config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(name)
}

fn write_with_parent(path: &Path, contents: &[u8]) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
    }
    fs::write(path, contents).map_err(|e| ConfigError::io(path, e))
}

#[derive(Debug, Serialize, Deserialize)]
struct CursorFile {
    last_seqno: i64,
}

/// Persists the poll cursor.
///
/// Writes go to a temporary file that is then renamed over the target, so
/// a crash leaves either the old or the new value.
#[derive(Debug, Clone)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store next to `config_path`.
    pub fn beside(config_path: &Path) -> Self {
        Self::new(default_cursor_path(config_path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last saved seqno, or 0 if nothing was saved yet.
    pub fn load(&self) -> Result<i64, ConfigError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(ConfigError::io(&self.path, e)),
        };

        let file: CursorFile = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(file.last_seqno.max(0))
    }

    pub fn save(&self, seqno: i64) -> Result<(), ConfigError> {
        let contents = toml::to_string(&CursorFile { last_seqno: seqno })?;
        let tmp = self.path.with_extension("toml.tmp");

        write_with_parent(&tmp, contents.as_bytes())?;
        fs::rename(&tmp, &self.path).map_err(|e| ConfigError::io(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
[server]
url = "http://localhost:3000"
public_key = "f4cd02a9e484e6c30d47b3f48c0442decd9deebd132a023ee812af95a1e8621b"
room = "roomtest"

[[responses]]
triggers = ["!ping"]
response = "pong"
"#;

    fn write(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_config_with_defaults() {
        let dir = TempDir::new().unwrap();
        let config = BotConfig::load(&write(&dir, MINIMAL)).unwrap();

        assert_eq!(config.poll.interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.poll.page_limit, 256);
        assert_eq!(config.poll.retry, RetryPolicy::default());
        assert_eq!(config.logging.level, "info");
        assert!(!config.identity.blinded);
        assert_eq!(config.signing_mode(), SigningMode::Unblinded);
        assert_eq!(config.server_public_key().unwrap()[0], 0xf4);
    }

    #[test]
    fn test_create_default_config_loads() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("nested").join("config.toml");

        BotConfig::create_default(&config_path).unwrap();
        let config = BotConfig::load(&config_path).unwrap();

        assert_eq!(config.server.room, "roomtest");
        assert_eq!(config.identity.display_name.as_deref(), Some("My Bot"));
        assert_eq!(
            config.identity.recovery_phrase_file,
            Some(dir.path().join("nested").join(PHRASE_FILE))
        );
        assert_eq!(config.responses.len(), 2);
        assert_eq!(config.response_table().matches("!AUTHOR"), vec!["hloth.dev"]);
    }

    #[test]
    fn test_default_config_escapes_phrase_path() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("odd \"quoted\" \\dir").join("config.toml");

        BotConfig::create_default(&config_path).unwrap();
        let config = BotConfig::load(&config_path).unwrap();

        assert_eq!(
            config.identity.recovery_phrase_file,
            Some(default_phrase_path(&config_path))
        );
    }

    #[test]
    fn test_save_and_load_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = BotConfig::load(&write(&dir, MINIMAL)).unwrap();
        config.identity.blinded = true;
        config.poll.page_limit = 100;
        config.save(&path).unwrap();

        let loaded = BotConfig::load(&path).unwrap();
        assert_eq!(loaded.signing_mode(), SigningMode::Blinded);
        assert_eq!(loaded.poll.page_limit, 100);
    }

    #[test]
    fn test_short_server_key_rejected() {
        let dir = TempDir::new().unwrap();
        let contents = MINIMAL.replace(
            "f4cd02a9e484e6c30d47b3f48c0442decd9deebd132a023ee812af95a1e8621b",
            "f4cd02a9",
        );

        let err = BotConfig::load(&write(&dir, &contents)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidKey(_)));
    }

    #[test]
    fn test_non_hex_server_key_rejected() {
        let dir = TempDir::new().unwrap();
        let contents = MINIMAL.replace("f4cd02a9", "zzzzzzzz");

        let err = BotConfig::load(&write(&dir, &contents)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidKey(_)));
    }

    #[test]
    fn test_page_limit_bounds() {
        let dir = TempDir::new().unwrap();
        for limit in ["0", "257"] {
            let contents = format!("{}\n[poll]\npage_limit = {}\n", MINIMAL, limit);
            let err = BotConfig::load(&write(&dir, &contents)).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "limit {}", limit);
        }
    }

    #[test]
    fn test_responses_required() {
        let dir = TempDir::new().unwrap();
        let contents = MINIMAL.split("[[responses]]").next().unwrap();

        let err = BotConfig::load(&write(&dir, contents)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_bad_url_rejected() {
        let dir = TempDir::new().unwrap();
        let contents = MINIMAL.replace("http://localhost:3000", "ftp://localhost");

        let err = BotConfig::load(&write(&dir, &contents)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = BotConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_sibling_paths() {
        let config = PathBuf::from("/data/sogs-bot/config.toml");
        assert_eq!(
            default_cursor_path(&config),
            PathBuf::from("/data/sogs-bot/cursor.toml")
        );
        assert_eq!(
            default_phrase_path(&config),
            PathBuf::from("/data/sogs-bot/recovery-phrase.txt")
        );
        assert!(default_config_path().ends_with("sogs-bot/config.toml"));
    }

    #[test]
    fn test_cursor_missing_is_zero() {
        let dir = TempDir::new().unwrap();
        let store = CursorStore::beside(&dir.path().join("config.toml"));
        assert_eq!(store.load().unwrap(), 0);
    }

    #[test]
    fn test_cursor_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = CursorStore::beside(&dir.path().join("config.toml"));

        store.save(600).unwrap();
        assert_eq!(store.load().unwrap(), 600);
        store.save(812).unwrap();
        assert_eq!(store.load().unwrap(), 812);

        assert!(!store.path().with_extension("toml.tmp").exists());
        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("last_seqno = 812"));
    }

    #[test]
    fn test_corrupt_cursor_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let store = CursorStore::new(dir.path().join("cursor.toml"));
        fs::write(store.path(), "last_seqno = \"soon\"").unwrap();

        assert!(matches!(store.load(), Err(ConfigError::Parse { .. })));
    }
}
