//! Error types for hookbot
//!
//! This module defines all error types used throughout the bot core.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.

use thiserror::Error;

/// The primary error type for hookbot operations.
#[derive(Error, Debug)]
pub enum BotError {
    /// Configuration-related errors (unreadable config, bad values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport errors (refused connection, reset, server closed the stream)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Plugin load errors (invalid manifest, failing load body, etc.)
    #[error("Plugin error: {0}")]
    Plugin(String),

    /// A requested plugin does not exist in any search location
    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    /// A plugin (transitively) requires itself
    #[error("Plugin dependency cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    /// A hook reported a failure from `call`
    #[error("Hook error: {0}")]
    Hook(String),

    /// A background task failed
    #[error("Task error: {0}")]
    Task(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A specialized `Result` type for hookbot operations.
pub type Result<T> = std::result::Result<T, BotError>;

/// Best-effort text of a caught panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BotError::Config("port must be a number".to_string());
        assert_eq!(err.to_string(), "Configuration error: port must be a number");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let bot_err: BotError = io_err.into();
        assert!(matches!(bot_err, BotError::Io(_)));
    }

    #[test]
    fn test_dependency_cycle_display() {
        let err = BotError::DependencyCycle(vec![
            "admin".to_string(),
            "auth".to_string(),
            "admin".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Plugin dependency cycle: admin -> auth -> admin"
        );
    }

    #[test]
    fn test_panic_message() {
        let caught = std::panic::catch_unwind(|| panic!("boom {}", 42)).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "boom 42");

        let caught = std::panic::catch_unwind(|| std::panic::panic_any(7u8)).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "panic with non-string payload");
    }

    #[test]
    fn test_error_variants_display() {
        let cases = [
            (BotError::Transport("reset".into()), "Transport error: reset"),
            (BotError::Plugin("bad manifest".into()), "Plugin error: bad manifest"),
            (BotError::PluginNotFound("weather".into()), "Plugin not found: weather"),
            (BotError::Hook("no target".into()), "Hook error: no target"),
            (BotError::Task("timed out".into()), "Task error: timed out"),
        ];
        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected);
        }

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: BotError = json_err.into();
        assert!(err.to_string().starts_with("JSON error: "));
    }
}
