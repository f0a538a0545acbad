//! Plugin loading for hookbot
//!
//! The loader walks its sources in order, loads each plugin at most once per
//! discovery pass and resolves dependencies lazily: a plugin asks for what it
//! needs with [`LoadContext::require`] while it loads. A stack of plugins
//! currently being resolved turns a dependency cycle into an error instead of
//! unbounded recursion.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::connection::BotHandle;
use crate::error::{panic_message, BotError, Result};
use crate::hooks::{Hook, HookRegistry, HookType};

use super::types::{LoadedPlugin, Plugin, PluginRecord, PluginSource, SharedPluginRecord};

/// Result of a full discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Plugins loaded, in load order.
    pub loaded: Vec<String>,
    /// Plugins that failed, with the reason.
    pub failed: Vec<(String, String)>,
    /// Manifest plugins whose content changed since the previous pass.
    pub changed: Vec<String>,
    /// Hook types registered by this pass.
    pub hooks: usize,
}

/// Loads plugins from an ordered list of sources.
pub struct PluginLoader {
    sources: Vec<Box<dyn PluginSource>>,
    record: SharedPluginRecord,
    resolving: Vec<String>,
}

impl PluginLoader {
    pub fn new(sources: Vec<Box<dyn PluginSource>>) -> Self {
        Self {
            sources,
            record: Arc::new(RwLock::new(PluginRecord::default())),
            resolving: Vec::new(),
        }
    }

    /// The record of loaded plugins, shared with bot handles.
    pub fn record(&self) -> SharedPluginRecord {
        Arc::clone(&self.record)
    }

    /// Replace the search locations. Already loaded plugins stay loaded.
    pub fn set_sources(&mut self, sources: Vec<Box<dyn PluginSource>>) {
        self.sources = sources;
    }

    /// Source labels in search order.
    pub fn source_labels(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.label()).collect()
    }

    /// Every plugin name across all sources, first occurrence wins.
    pub fn discover(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for source in &self.sources {
            for name in source.discover() {
                if names.contains(&name) {
                    debug!(plugin = %name, source = %source.label(), "Plugin shadowed by an earlier source");
                } else {
                    names.push(name);
                }
            }
        }
        names
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.record.read().contains(name)
    }

    /// Loaded plugin names in load order.
    pub fn loaded_names(&self) -> Vec<String> {
        self.record.read().names()
    }

    /// Forget everything and load every discoverable plugin.
    ///
    /// Clears the plugin record and `registry` first, so calling it twice
    /// yields the same plugins and the same hook types.
    pub fn load_all(&mut self, registry: &mut HookRegistry) -> LoadReport {
        let previous: HashMap<String, Option<String>> = self
            .record
            .read()
            .iter()
            .map(|p| (p.name.clone(), p.fingerprint.clone()))
            .collect();

        self.record.write().clear();
        self.resolving.clear();
        registry.clear();

        let mut report = LoadReport::default();
        for name in self.discover() {
            if self.is_loaded(&name) {
                continue;
            }
            if let Err(e) = self.get(&name, registry) {
                warn!(plugin = %name, error = %e, "Failed to load plugin, skipping");
                report.failed.push((name, e.to_string()));
            }
        }

        report.loaded = self.loaded_names();
        report.hooks = registry.len();
        for plugin in self.record.read().iter() {
            if let Some(Some(old)) = previous.get(&plugin.name) {
                if plugin.fingerprint.as_ref() != Some(old) {
                    info!(plugin = %plugin.name, "Plugin manifest changed");
                    report.changed.push(plugin.name.clone());
                }
            }
        }

        info!(
            plugins = report.loaded.len(),
            failed = report.failed.len(),
            hooks = report.hooks,
            "Plugins loaded"
        );
        report
    }

    /// Load `name` unless it is already loaded.
    ///
    /// Failures are logged, not returned. Returns whether the plugin is
    /// loaded afterwards.
    pub fn load(&mut self, name: &str, registry: &mut HookRegistry) -> bool {
        match self.get(name, registry) {
            Ok(_) => true,
            Err(e) => {
                warn!(plugin = %name, error = %e, "Failed to load plugin");
                false
            }
        }
    }

    /// The loaded plugin `name`, loading it first if needed.
    pub fn get(&mut self, name: &str, registry: &mut HookRegistry) -> Result<Arc<LoadedPlugin>> {
        if let Some(plugin) = self.record.read().get(name) {
            return Ok(plugin);
        }

        if let Some(pos) = self.resolving.iter().position(|n| n == name) {
            let mut chain = self.resolving[pos..].to_vec();
            chain.push(name.to_string());
            return Err(BotError::DependencyCycle(chain));
        }

        let plugin = self.locate(name)?;

        self.resolving.push(name.to_string());
        let outcome = {
            let mut ctx = LoadContext {
                loader: &mut *self,
                registry: &mut *registry,
                plugin: name.to_string(),
                staged: Vec::new(),
                requires: Vec::new(),
            };
            let result = catch_unwind(AssertUnwindSafe(|| plugin.load(&mut ctx)));
            match result {
                Ok(Ok(())) => Ok((ctx.staged, ctx.requires)),
                Ok(Err(e)) => Err(e),
                Err(payload) => Err(BotError::Plugin(format!(
                    "'{}' panicked while loading: {}",
                    name,
                    panic_message(payload.as_ref())
                ))),
            }
        };
        self.resolving.pop();
        let (staged, requires) = outcome?;

        let hooks: Vec<String> = staged.iter().map(|h| h.name().to_string()).collect();
        for hook_type in staged {
            registry.register(hook_type);
        }

        let loaded = Arc::new(LoadedPlugin {
            name: name.to_string(),
            version: plugin.version().to_string(),
            description: plugin.description().to_string(),
            origin: plugin.origin(),
            requires,
            hooks,
            fingerprint: plugin.fingerprint(),
        });
        self.record.write().insert(Arc::clone(&loaded));

        info!(
            plugin = %loaded.name,
            version = %loaded.version,
            origin = %loaded.origin,
            hooks = loaded.hooks.len(),
            "Loaded plugin"
        );
        Ok(loaded)
    }

    fn locate(&self, name: &str) -> Result<Box<dyn Plugin>> {
        for source in &self.sources {
            if let Some(plugin) = source.find(name)? {
                debug!(plugin = %name, source = %source.label(), "Located plugin");
                return Ok(plugin);
            }
        }
        Err(BotError::PluginNotFound(name.to_string()))
    }
}

/// What a plugin sees while it loads.
pub struct LoadContext<'a> {
    loader: &'a mut PluginLoader,
    registry: &'a mut HookRegistry,
    plugin: String,
    staged: Vec<HookType>,
    requires: Vec<String>,
}

impl LoadContext<'_> {
    /// Name of the plugin being loaded.
    pub fn plugin_name(&self) -> &str {
        &self.plugin
    }

    /// Load `name` first. Its hooks are registered before this plugin's.
    pub fn require(&mut self, name: &str) -> Result<Arc<LoadedPlugin>> {
        let plugin = self.loader.get(name, self.registry)?;
        if !self.requires.iter().any(|r| r == name) {
            self.requires.push(name.to_string());
        }
        Ok(plugin)
    }

    /// Stage a hook type; it is registered once the load succeeds.
    pub fn register_hook<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&BotHandle) -> Box<dyn Hook> + Send + Sync + 'static,
    {
        self.staged
            .push(HookType::new(name, self.plugin.clone(), factory));
    }
}
