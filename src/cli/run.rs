//! Run command: connect and serve until the connection ends.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use hookbot::logging::LogHandle;
use hookbot::{Bot, Config};

pub(crate) fn cmd_run(path: PathBuf, config: Config, log: LogHandle) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    let mut bot = Bot::with_config(path, config).with_log_handle(log);
    let report = bot.load_plugins();
    info!(
        plugins = report.loaded.len(),
        failed = report.failed.len(),
        hooks = bot.registry().len(),
        "Plugins loaded"
    );

    runtime
        .block_on(bot.run())
        .context("Bot stopped with an error")?;
    Ok(())
}
