//! Hook type registry.
//!
//! Plugins register hook *types*: a name, the owning plugin and a factory
//! that builds a fresh instance for a [`BotHandle`]. The registry keeps them
//! in declaration order; the dispatcher instantiates them on activation.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::connection::BotHandle;

use super::Hook;

/// Builds one hook instance bound to a bot handle.
pub type HookFactory = Arc<dyn Fn(&BotHandle) -> Box<dyn Hook> + Send + Sync>;

/// A registered hook type.
#[derive(Clone)]
pub struct HookType {
    name: String,
    plugin: String,
    factory: HookFactory,
}

impl HookType {
    pub fn new<F>(name: impl Into<String>, plugin: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&BotHandle) -> Box<dyn Hook> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            plugin: plugin.into(),
            factory: Arc::new(factory),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the plugin that registered this type.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Build a new instance.
    pub fn build(&self, bot: &BotHandle) -> Box<dyn Hook> {
        (self.factory)(bot)
    }
}

impl fmt::Debug for HookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookType")
            .field("name", &self.name)
            .field("plugin", &self.plugin)
            .finish_non_exhaustive()
    }
}

/// Ordered collection of registered hook types.
#[derive(Debug, Default)]
pub struct HookRegistry {
    types: Vec<HookType>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook type.
    ///
    /// Registering the same type twice is allowed; it will be activated
    /// twice, so it is flagged with a warning.
    pub fn register(&mut self, hook_type: HookType) {
        if self
            .types
            .iter()
            .any(|t| t.name == hook_type.name && t.plugin == hook_type.plugin)
        {
            warn!(
                hook = %hook_type.name,
                plugin = %hook_type.plugin,
                "Hook type registered more than once, it will be activated twice"
            );
        }
        debug!(hook = %hook_type.name, plugin = %hook_type.plugin, "Registered hook type");
        self.types.push(hook_type);
    }

    /// Drop every registered type.
    pub fn clear(&mut self) {
        self.types.clear();
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registered types in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &HookType> {
        self.types.iter()
    }

    /// Hook names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.name.as_str()).collect()
    }

    /// Number of hook types contributed by `plugin`.
    pub fn count_for(&self, plugin: &str) -> usize {
        self.types.iter().filter(|t| t.plugin == plugin).count()
    }
}
