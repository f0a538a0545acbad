//! Plugin types for hookbot
//!
//! This module defines the two seams of the plugin system, [`Plugin`] (a
//! loadable behavior module) and [`PluginSource`] (a place plugins are found),
//! plus the record of what is currently loaded.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;

use super::loader::LoadContext;

/// Where a loaded plugin came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginOrigin {
    /// Compiled into the binary.
    Builtin,
    /// A `plugin.json` manifest directory.
    Manifest(PathBuf),
}

impl fmt::Display for PluginOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin => write!(f, "builtin"),
            Self::Manifest(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A loadable behavior module.
///
/// `load` declares dependencies with [`LoadContext::require`] and registers
/// hook types with [`LoadContext::register_hook`]. It runs once per
/// discovery pass.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &str {
        ""
    }

    fn origin(&self) -> PluginOrigin {
        PluginOrigin::Builtin
    }

    /// Content digest, for plugins backed by a file.
    fn fingerprint(&self) -> Option<String> {
        None
    }

    fn load(&self, ctx: &mut LoadContext<'_>) -> Result<()>;
}

/// A search location for plugins.
pub trait PluginSource: Send + Sync {
    /// Human-readable location, for logs.
    fn label(&self) -> String;

    /// Names of every plugin this source can provide, in a stable order.
    fn discover(&self) -> Vec<String>;

    /// Locate `name`. `Ok(None)` means this source does not have it; an
    /// error means it has it but the plugin is broken.
    fn find(&self, name: &str) -> Result<Option<Box<dyn Plugin>>>;
}

/// A successfully loaded plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPlugin {
    pub name: String,
    pub version: String,
    pub description: String,
    pub origin: PluginOrigin,
    /// Plugins required while loading, in request order.
    pub requires: Vec<String>,
    /// Hook types the plugin registered, in registration order.
    pub hooks: Vec<String>,
    pub fingerprint: Option<String>,
}

/// Loaded plugins by name, in load order.
#[derive(Debug, Default)]
pub struct PluginRecord {
    plugins: HashMap<String, Arc<LoadedPlugin>>,
    order: Vec<String>,
}

/// The plugin record shared between the loader and bot handles.
pub type SharedPluginRecord = Arc<RwLock<PluginRecord>>;

impl PluginRecord {
    pub fn insert(&mut self, plugin: Arc<LoadedPlugin>) {
        if self
            .plugins
            .insert(plugin.name.clone(), Arc::clone(&plugin))
            .is_none()
        {
            self.order.push(plugin.name.clone());
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<LoadedPlugin>> {
        self.plugins.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn clear(&mut self) {
        self.plugins.clear();
        self.order.clear();
    }

    /// Plugin names in load order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Plugins in load order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<LoadedPlugin>> {
        self.order.iter().filter_map(|name| self.plugins.get(name))
    }
}
