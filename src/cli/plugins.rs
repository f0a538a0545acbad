//! Plugins command: show what would load for a bot directory.

use std::path::PathBuf;

use anyhow::Result;

use hookbot::{Bot, Config};

pub(crate) fn cmd_plugins(path: PathBuf, config: Config) -> Result<()> {
    let mut bot = Bot::with_config(path, config);
    let report = bot.load_plugins();

    println!("Sources:");
    for label in bot.loader().source_labels() {
        println!("  {}", label);
    }
    println!();

    let record = bot.loader().record();
    let record = record.read();
    println!("Loaded plugins ({}):", record.len());
    for plugin in record.iter() {
        println!(
            "  {} v{} [{}] - {} hook(s)",
            plugin.name,
            plugin.version,
            plugin.origin,
            plugin.hooks.len()
        );
        if !plugin.description.is_empty() {
            println!("      {}", plugin.description);
        }
        if !plugin.requires.is_empty() {
            println!("      requires: {}", plugin.requires.join(", "));
        }
    }

    if !report.failed.is_empty() {
        println!();
        println!("Failed plugins ({}):", report.failed.len());
        for (name, error) in &report.failed {
            println!("  {}: {}", name, error);
        }
    }

    println!();
    println!("Hooks in dispatch order: {}", bot.registry().names().join(", "));
    Ok(())
}
