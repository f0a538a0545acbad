//! Plugins compiled into hookbot.
//!
//! | plugin      | requires  | hooks                          |
//! |-------------|-----------|--------------------------------|
//! | `default`   |           | `identify`, `ping_pong`        |
//! | `channels`  | `default` | `join_channels`                |
//! | `auth`      | `default` | `admin_management`             |
//! | `admin`     | `auth`    | `save`, `reload`               |
//! | `shortlink` |           | `shortlink`                    |

pub mod admin;
pub mod auth;
pub mod channels;
pub mod default;
pub mod shortlink;

use crate::error::Result;

use super::types::{Plugin, PluginSource};

type Constructor = fn() -> Box<dyn Plugin>;

const CATALOG: &[(&str, Constructor)] = &[
    (default::NAME, default::plugin),
    (channels::NAME, channels::plugin),
    (auth::NAME, auth::plugin),
    (admin::NAME, admin::plugin),
    (shortlink::NAME, shortlink::plugin),
];

/// The compiled-in plugin catalog, searched before any manifest directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinSource;

impl BuiltinSource {
    pub fn new() -> Self {
        Self
    }
}

impl PluginSource for BuiltinSource {
    fn label(&self) -> String {
        "builtin".to_string()
    }

    fn discover(&self) -> Vec<String> {
        CATALOG.iter().map(|(name, _)| name.to_string()).collect()
    }

    fn find(&self, name: &str) -> Result<Option<Box<dyn Plugin>>> {
        Ok(CATALOG
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, build)| build()))
    }
}
