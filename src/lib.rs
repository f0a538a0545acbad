//! hookbot - a lean, hook-driven IRC bot core
//!
//! The core only reads lines, decodes them into [`Event`]s and offers every
//! event to the hooks contributed by plugins. Logging in, joining channels,
//! admin commands and everything else live in plugins.

pub mod config;
pub mod connection;
pub mod error;
pub mod hooks;
pub mod logging;
pub mod plugins;
pub mod protocol;
pub mod task;

pub use config::Config;
pub use connection::{Bot, BotHandle};
pub use error::{BotError, Result};
pub use hooks::{Hook, HookDispatcher, HookRegistry};
pub use plugins::{Plugin, PluginLoader};
pub use protocol::{Event, IrcCommands};
pub use task::Task;
