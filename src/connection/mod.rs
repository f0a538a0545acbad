//! Connection engine for hookbot
//!
//! [`Bot`] owns the socket, the plugin loader, the hook registry and the
//! activated hooks. [`Bot::run`] connects and drives one loop that:
//!
//! 1. reads socket bytes, frames them into events and dispatches each one
//! 2. drains the outbound queue into the socket (the only writer)
//! 3. applies [`Control`] requests queued by hooks and tasks
//!
//! Dispatch is strictly sequential; slow work belongs in a
//! [`Task`](crate::task::Task).

mod handle;

pub use handle::{BotHandle, Control, HandleReceivers, Outbound};

use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{Config, SharedConfig};
use crate::error::{BotError, Result};
use crate::hooks::{DispatchReport, HookDispatcher, HookRegistry};
use crate::logging::LogHandle;
use crate::plugins::{self, LoadReport, PluginLoader};
use crate::protocol::{Event, LineDecoder};

const READ_BUFFER_SIZE: usize = 4096;

/// The bot: configuration, plugins, hooks and the connection loop.
pub struct Bot {
    path: PathBuf,
    config: SharedConfig,
    loader: PluginLoader,
    registry: HookRegistry,
    dispatcher: HookDispatcher,
    handle: BotHandle,
    outbound_rx: Option<mpsc::UnboundedReceiver<String>>,
    control_rx: mpsc::UnboundedReceiver<Control>,
    log: Option<LogHandle>,
    plugins_loaded: bool,
    quit_sent: bool,
}

impl Bot {
    /// A bot rooted at `path`, configured from `<path>/config.json`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let config = Config::load_from(&path);
        Self::with_config(path, config)
    }

    /// A bot rooted at `path` with an explicit configuration.
    pub fn with_config(path: impl Into<PathBuf>, config: Config) -> Self {
        let path = path.into();
        let config = config.into_shared();
        let loader = PluginLoader::new(plugins::default_sources(&path, &config.read()));
        let (outbound, outbound_rx) = Outbound::channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let handle = BotHandle::new(
            outbound,
            SharedConfig::clone(&config),
            loader.record(),
            control_tx,
        );

        Self {
            path,
            config,
            loader,
            registry: HookRegistry::new(),
            dispatcher: HookDispatcher::new(),
            handle,
            outbound_rx: Some(outbound_rx),
            control_rx,
            log: None,
            plugins_loaded: false,
            quit_sent: false,
        }
    }

    /// Re-apply the log settings through `log` whenever the configuration
    /// is reloaded.
    pub fn with_log_handle(mut self, log: LogHandle) -> Self {
        self.log = Some(log);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn handle(&self) -> &BotHandle {
        &self.handle
    }

    pub fn registry(&self) -> &HookRegistry {
        &self.registry
    }

    pub fn dispatcher(&self) -> &HookDispatcher {
        &self.dispatcher
    }

    pub fn loader(&self) -> &PluginLoader {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut PluginLoader {
        &mut self.loader
    }

    /// Discover and load every plugin, then activate their hooks.
    pub fn load_plugins(&mut self) -> LoadReport {
        let report = self.loader.load_all(&mut self.registry);
        self.dispatcher.activate(&self.registry, &self.handle);
        self.plugins_loaded = true;
        report
    }

    /// Re-read the configuration, re-apply log settings, rediscover plugins
    /// and reactivate hooks.
    ///
    /// Running tasks are not affected.
    pub fn reload(&mut self) -> LoadReport {
        let log_settings = {
            let mut config = self.config.write();
            if let Err(e) = config.reload() {
                warn!("Configuration reload failed, keeping current values: {}", e);
            }
            self.loader
                .set_sources(plugins::default_sources(&self.path, &config));
            config.log_settings()
        };
        if let Some(log) = &self.log {
            if let Err(e) = log.apply(&log_settings) {
                warn!("Keeping current log settings: {}", e);
            }
        }
        let report = self.load_plugins();
        info!(
            plugins = report.loaded.len(),
            hooks = self.registry.len(),
            "Reloaded"
        );
        report
    }

    /// Dispatch one event, then apply any control requests it queued.
    pub fn dispatch(&mut self, event: &Event) -> DispatchReport {
        let report = self.dispatcher.dispatch(event);
        self.apply_control();
        report
    }

    fn apply_control(&mut self) {
        while let Ok(request) = self.control_rx.try_recv() {
            self.apply(request);
        }
    }

    fn apply(&mut self, request: Control) {
        match request {
            Control::Reload => {
                self.reload();
            }
            Control::Emit(event) => {
                debug!(event = %event.name(), "Dispatching emitted event");
                self.dispatcher.dispatch(&event);
            }
        }
    }

    /// Connect to the configured server and run until the connection ends.
    ///
    /// Returns `Ok(())` when the server closes the connection after we sent
    /// `QUIT`; any other end of the connection is a transport error.
    pub async fn run(&mut self) -> Result<()> {
        let (server, port) = {
            let config = self.config.read();
            (config.server(), config.port()?)
        };

        info!(server = %server, port, "Connecting");
        let stream = TcpStream::connect((server.as_str(), port))
            .await
            .map_err(|e| {
                BotError::Transport(format!("cannot connect to {}:{}: {}", server, port, e))
            })?;
        info!(server = %server, port, "Connected");

        self.serve(stream).await
    }

    /// Drive the dispatch loop over an established stream.
    pub async fn serve<S>(&mut self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if !self.plugins_loaded {
            self.load_plugins();
        }

        let mut outbound_rx = self
            .outbound_rx
            .take()
            .ok_or_else(|| BotError::Transport("connection loop is already running".to_string()))?;
        self.quit_sent = false;

        let result = self.drive(stream, &mut outbound_rx).await;
        self.outbound_rx = Some(outbound_rx);

        match &result {
            Ok(()) => info!("Connection closed"),
            Err(e) => error!("Connection lost: {}", e),
        }
        result
    }

    async fn drive<S>(
        &mut self,
        stream: S,
        outbound_rx: &mut mpsc::UnboundedReceiver<String>,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut reader, mut writer) = tokio::io::split(stream);
        let mut decoder = LineDecoder::new();
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        self.dispatch(&Event::connected());

        loop {
            tokio::select! {
                biased;

                line = outbound_rx.recv() => {
                    let Some(line) = line else {
                        return Err(BotError::Transport("outbound queue closed".to_string()));
                    };
                    if line.starts_with("QUIT") {
                        self.quit_sent = true;
                    }
                    writer
                        .write_all(line.as_bytes())
                        .await
                        .map_err(|e| BotError::Transport(format!("write failed: {}", e)))?;
                }

                request = self.control_rx.recv() => {
                    if let Some(request) = request {
                        self.apply(request);
                        self.apply_control();
                    }
                }

                read = reader.read(&mut buf) => {
                    match read {
                        Ok(0) if self.quit_sent => return Ok(()),
                        Ok(0) => {
                            return Err(BotError::Transport(
                                "server closed the connection".to_string(),
                            ))
                        }
                        Ok(n) => {
                            decoder.feed(&buf[..n]);
                            while let Some(event) = decoder.next_event() {
                                debug!(event = %event.name(), "Received");
                                self.dispatch(&event);
                            }
                        }
                        Err(e) => {
                            return Err(BotError::Transport(format!("read failed: {}", e)));
                        }
                    }
                }
            }
        }
    }
}
