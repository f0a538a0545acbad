//! Configuration for hookbot
//!
//! The configuration is a JSON object of string keys to arbitrary values.
//! It starts from built-in defaults and is overlaid, key by key, with the
//! optional `config.json` found in the bot directory. Behavior modules are
//! free to keep their own namespaced objects in it (`auth`, `shortlink`, ...);
//! unknown keys are preserved and written back on save.
//!
//! # Recognized keys
//!
//! | key           | type            | default             |
//! |---------------|-----------------|---------------------|
//! | `nick`        | string          | `hookbot`           |
//! | `ident`       | string          | `hookbot`           |
//! | `realname`    | string          | `hookbot irc bot`   |
//! | `server`      | string          | `irc.libera.chat`   |
//! | `port`        | number          | `6667`              |
//! | `channels`    | array of string | `[]`                |
//! | `pluginDirs`  | array of string | `[]`                |
//! | `logToStdout` | bool            | `true`              |
//! | `logLevel`    | string          | `info`              |
//! | `logFormat`   | string          | `full`              |
//! | `logFile`     | string / false  | `false`             |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::error::{BotError, Result};
use crate::logging::{LogFormat, LogSettings};

/// File name of the configuration document inside the bot directory.
pub const CONFIG_FILE: &str = "config.json";

/// Configuration shared between the dispatch loop, hooks and task threads.
pub type SharedConfig = Arc<RwLock<Config>>;

/// Result of reading the configuration document.
#[derive(Debug)]
pub enum LoadOutcome {
    /// The document was read and merged over the defaults.
    Loaded(PathBuf),
    /// There is no document; the defaults are used.
    Missing(PathBuf),
    /// The document could not be read or parsed; the defaults are used.
    Failed { path: PathBuf, error: BotError },
}

impl LoadOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Report the outcome through `tracing`.
    pub fn log(&self) {
        match self {
            Self::Loaded(path) => info!(path = %path.display(), "Configuration loaded"),
            Self::Missing(path) => {
                info!(path = %path.display(), "No configuration file, using defaults")
            }
            Self::Failed { path, error } => {
                warn!(path = %path.display(), "No configuration loaded: {}", error)
            }
        }
    }
}

/// The bot configuration document.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    values: Map<String, Value>,
    path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            values: Self::defaults(),
            path: None,
        }
    }
}

impl Config {
    /// Built-in default values.
    pub fn defaults() -> Map<String, Value> {
        let defaults = json!({
            "nick": "hookbot",
            "ident": "hookbot",
            "realname": "hookbot irc bot",
            "server": "irc.libera.chat",
            "port": 6667,
            "channels": [],
            "pluginDirs": [],
            "logToStdout": true,
            "logLevel": "info",
            "logFormat": "full",
            "logFile": false
        });
        match defaults {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Build a configuration from defaults and `<dir>/config.json`.
    ///
    /// Nothing is logged; the caller reports the outcome once a subscriber
    /// is installed. On failure the defaults are kept.
    pub fn load(dir: &Path) -> (Self, LoadOutcome) {
        let path = dir.join(CONFIG_FILE);
        let mut config = Self {
            values: Self::defaults(),
            path: Some(path.clone()),
        };
        let outcome = match config.reload() {
            Ok(true) => LoadOutcome::Loaded(path),
            Ok(false) => LoadOutcome::Missing(path),
            Err(error) => LoadOutcome::Failed { path, error },
        };
        (config, outcome)
    }

    /// [`Config::load`], logging the outcome right away.
    pub fn load_from(dir: &Path) -> Self {
        let (config, outcome) = Self::load(dir);
        outcome.log();
        config
    }

    /// Re-read the backing document and overlay it onto the current values.
    ///
    /// Returns `Ok(false)` when there is no backing document. On error the
    /// current values are left untouched.
    pub fn reload(&mut self) -> Result<bool> {
        let Some(path) = self.path.clone() else {
            return Ok(false);
        };
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found");
            return Ok(false);
        }
        let content = std::fs::read_to_string(&path)?;
        let document = parse_document(&content)?;
        self.merge(document);
        Ok(true)
    }

    /// Write the configuration back to its document, pretty-printed.
    pub fn save(&self) -> Result<()> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| BotError::Config("configuration has no backing file".to_string()))?;
        let content = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(path, content)?;
        info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Overlay `document` onto the current values; document keys win.
    pub fn merge(&mut self, document: Map<String, Value>) {
        for (key, value) in document {
            self.values.insert(key, value);
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }

    /// Wrap into the shared, lockable form.
    pub fn into_shared(self) -> SharedConfig {
        Arc::new(RwLock::new(self))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Look up a nested value with a dotted path, e.g. `auth.admins`.
    pub fn get_path(&self, dotted: &str) -> Option<&Value> {
        let mut parts = dotted.split('.');
        let mut current = self.values.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Mutable access to a namespaced object, created empty if missing or
    /// not an object.
    pub fn section_mut(&mut self, key: &str) -> &mut Map<String, Value> {
        let entry = self
            .values
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        match entry {
            Value::Object(map) => map,
            _ => unreachable!("entry was just made an object"),
        }
    }

    /// String value of `key`, or `default` when missing or not a string.
    pub fn str_or(&self, key: &str, default: &str) -> String {
        self.get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    /// String list at a dotted path; non-string entries are skipped.
    pub fn string_list(&self, dotted: &str) -> Vec<String> {
        self.get_path(dotted)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn nick(&self) -> String {
        self.str_or("nick", "hookbot")
    }

    pub fn ident(&self) -> String {
        self.str_or("ident", "hookbot")
    }

    pub fn realname(&self) -> String {
        self.str_or("realname", "hookbot irc bot")
    }

    pub fn server(&self) -> String {
        self.str_or("server", "irc.libera.chat")
    }

    /// Server port; accepts a number or a numeric string.
    pub fn port(&self) -> Result<u16> {
        let value = self
            .get("port")
            .ok_or_else(|| BotError::Config("missing 'port'".to_string()))?;
        let port = match value {
            Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
            Value::String(s) => s.trim().parse::<u16>().ok(),
            _ => None,
        };
        port.ok_or_else(|| BotError::Config(format!("invalid 'port': {}", value)))
    }

    /// Channels joined once the connection is ready.
    pub fn channels(&self) -> Vec<String> {
        self.string_list("channels")
    }

    /// Extra plugin directories, with `~/` expanded.
    pub fn plugin_dirs(&self) -> Vec<PathBuf> {
        self.string_list("pluginDirs")
            .iter()
            .map(|dir| expand_home(dir))
            .collect()
    }

    /// Logging options read from `logToStdout`, `logLevel`, `logFormat` and `logFile`.
    pub fn log_settings(&self) -> LogSettings {
        let file = match self.get("logFile") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(expand_home(s)),
            _ => None,
        };
        LogSettings {
            to_stdout: self
                .get("logToStdout")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            level: self.str_or("logLevel", "info").to_lowercase(),
            format: LogFormat::parse(&self.str_or("logFormat", "full")),
            file,
        }
    }

    /// The whole document as a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

/// Parse a configuration document. Only JSON objects are accepted.
///
/// `json5` is used so hand-edited files may carry comments and trailing commas.
fn parse_document(content: &str) -> Result<Map<String, Value>> {
    let value: Value =
        json5::from_str(content).map_err(|e| BotError::Config(format!("invalid config: {}", e)))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(BotError::Config(format!(
            "config must be a JSON object, found {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
