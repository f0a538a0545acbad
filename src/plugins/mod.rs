//! Plugin system for hookbot
//!
//! A plugin is a named unit that registers hook types and may require other
//! plugins. Plugins come from sources: the compiled-in catalog first, then
//! manifest directories on disk.
//!
//! # Architecture
//!
//! - **types**: `Plugin`, `PluginSource`, and the record of loaded plugins
//! - **loader**: load-once resolution with dependency propagation and cycle detection
//! - **builtin**: plugins shipped with the bot
//! - **manifest**: plugins declared by a `plugin.json` manifest
//!
//! # Plugin Directory Structure
//!
//! ```text
//! <bot path>/plugins/
//! ├── greeter/
//! │   └── plugin.json
//! └── uptime/
//!     └── plugin.json
//! ```
//!
//! Extra directories can be listed under `pluginDirs` in the configuration.
//! When two sources provide the same name, the earlier source wins.

pub mod builtin;
mod loader;
pub mod manifest;
pub mod types;

pub use builtin::BuiltinSource;
pub use loader::{LoadContext, LoadReport, PluginLoader};
pub use manifest::{ManifestPlugin, ManifestSource, PluginManifest};
pub use types::{
    LoadedPlugin, Plugin, PluginOrigin, PluginRecord, PluginSource, SharedPluginRecord,
};

use std::path::Path;

use crate::config::Config;

/// Directory under the bot path searched for manifest plugins.
pub const PLUGINS_DIR: &str = "plugins";

/// The plugin sources for a bot rooted at `bot_path`: builtins, then
/// `<bot_path>/plugins`, then every configured `pluginDirs` entry.
pub fn default_sources(bot_path: &Path, config: &Config) -> Vec<Box<dyn PluginSource>> {
    let mut dirs = vec![bot_path.join(PLUGINS_DIR)];
    for dir in config.plugin_dirs() {
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }
    vec![Box::new(BuiltinSource::new()), Box::new(ManifestSource::new(dirs))]
}
