//! The bot handle given to hooks and tasks.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::{Config, SharedConfig};
use crate::error::Result;
use crate::plugins::{LoadedPlugin, PluginRecord, SharedPluginRecord};
use crate::protocol::{encode_line, Event, IrcCommands};
use crate::task::{self, Task, TaskContext, TaskHandle};

/// Cloneable sender side of the outbound line queue.
///
/// The connection writer is the only consumer, so lines from the dispatch
/// loop and from any number of task threads never interleave mid-line.
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::UnboundedSender<String>,
}

impl Outbound {
    /// Create the queue; the receiver belongs to the connection writer.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Frame `raw` and enqueue it. Never blocks.
    pub fn send(&self, raw: &str) {
        debug!(line = %raw, "Queueing outbound line");
        if self.tx.send(encode_line(raw)).is_err() {
            warn!(line = %raw, "Connection closed, dropping outbound line");
        }
    }
}

impl IrcCommands for Outbound {
    fn send_line(&self, raw: &str) {
        self.send(raw);
    }
}

/// Requests applied by the dispatch loop once the current dispatch is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    /// Re-read the configuration, rediscover plugins and reactivate hooks.
    Reload,
    /// Dispatch a synthetic event.
    Emit(Event),
}

/// Receiving ends of a handle's queues.
#[derive(Debug)]
pub struct HandleReceivers {
    pub outbound: mpsc::UnboundedReceiver<String>,
    pub control: mpsc::UnboundedReceiver<Control>,
}

/// What hooks and tasks see of the bot.
///
/// Cheap to clone; every clone talks to the same connection, configuration
/// and plugin record.
#[derive(Debug, Clone)]
pub struct BotHandle {
    outbound: Outbound,
    config: SharedConfig,
    plugins: SharedPluginRecord,
    control: mpsc::UnboundedSender<Control>,
}

impl BotHandle {
    pub fn new(
        outbound: Outbound,
        config: SharedConfig,
        plugins: SharedPluginRecord,
        control: mpsc::UnboundedSender<Control>,
    ) -> Self {
        Self {
            outbound,
            config,
            plugins,
            control,
        }
    }

    /// A handle that is not attached to a connection.
    ///
    /// Lines and control requests accumulate in the returned receivers.
    pub fn detached(config: Config) -> (Self, HandleReceivers) {
        let (outbound, outbound_rx) = Outbound::channel();
        let (control, control_rx) = mpsc::unbounded_channel();
        let handle = Self::new(
            outbound,
            config.into_shared(),
            Arc::new(RwLock::new(PluginRecord::default())),
            control,
        );
        (
            handle,
            HandleReceivers {
                outbound: outbound_rx,
                control: control_rx,
            },
        )
    }

    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    /// Run `f` with read access to the configuration.
    ///
    /// The lock is released when `f` returns; `f` must not call back into
    /// [`BotHandle::update_config`] or [`BotHandle::save_config`].
    pub fn with_config<R>(&self, f: impl FnOnce(&Config) -> R) -> R {
        f(&self.config.read())
    }

    pub fn shared_config(&self) -> SharedConfig {
        Arc::clone(&self.config)
    }

    /// Mutate the configuration under the write lock.
    pub fn update_config<R>(&self, f: impl FnOnce(&mut Config) -> R) -> R {
        let mut config = self.config.write();
        f(&mut config)
    }

    /// Persist the configuration to its document.
    pub fn save_config(&self) -> Result<()> {
        self.config.read().save()
    }

    /// The configured nickname.
    pub fn nick(&self) -> String {
        self.config.read().nick()
    }

    /// A loaded plugin by name.
    pub fn plugin(&self, name: &str) -> Option<Arc<LoadedPlugin>> {
        self.plugins.read().get(name)
    }

    /// Ask the loop to reload configuration, plugins and hooks.
    pub fn request_reload(&self) {
        self.control_request(Control::Reload);
    }

    /// Ask the loop to dispatch `event` after the current dispatch.
    pub fn emit(&self, event: Event) {
        self.control_request(Control::Emit(event));
    }

    fn control_request(&self, request: Control) {
        if self.control.send(request).is_err() {
            warn!("Dispatch loop is gone, dropping control request");
        }
    }

    /// Start `task` on its own thread with a copy of `event`.
    pub fn spawn_task<T>(&self, task: T, hook: &str, event: &Event) -> Result<TaskHandle>
    where
        T: Task + 'static,
    {
        task::start(task, TaskContext::new(self.clone(), hook, event.clone()))
    }
}

impl IrcCommands for BotHandle {
    fn send_line(&self, raw: &str) {
        self.outbound.send(raw);
    }
}
