//! The `admin` plugin: `save` and `reload` commands for admins.

use tracing::{error, info};

use crate::connection::BotHandle;
use crate::error::Result;
use crate::hooks::Hook;
use crate::plugins::{LoadContext, Plugin};
use crate::protocol::{Event, IrcCommands};

use super::auth::{self, AdminCommand};
use super::default::CommandMatcher;

pub const NAME: &str = "admin";

/// `<nick>: save` persists the configuration and emits `SAVE`.
struct Save {
    bot: BotHandle,
    command: AdminCommand,
}

impl Hook for Save {
    fn matches(&self, event: &Event) -> bool {
        self.bot.with_config(|config| self.command.matches(event, config))
    }

    fn call(&mut self, event: &Event) -> Result<()> {
        let reply = match self.bot.save_config() {
            Ok(()) => {
                info!(by = ?event.nick(), "Configuration saved on request");
                "saved."
            }
            Err(e) => {
                error!(error = %e, "Saving configuration failed");
                "saving failed, see the log."
            }
        };
        if let Some(target) = event.reply_target() {
            self.bot.msg(target, reply);
        }
        self.bot.emit(Event::new(Event::SAVE));
        Ok(())
    }
}

/// `<nick>: reload` reloads configuration and plugins and emits `RELOAD`.
///
/// Hooks cannot replace the hook set while it dispatches, so the reload
/// itself is queued and runs right after the current event.
struct Reload {
    bot: BotHandle,
    command: AdminCommand,
}

impl Hook for Reload {
    fn matches(&self, event: &Event) -> bool {
        self.bot.with_config(|config| self.command.matches(event, config))
    }

    fn call(&mut self, event: &Event) -> Result<()> {
        info!(by = ?event.nick(), "Reload requested");
        self.bot.request_reload();
        if let Some(target) = event.reply_target() {
            self.bot.msg(target, "reloaded.");
        }
        self.bot.emit(Event::new(Event::RELOAD));
        Ok(())
    }
}

pub struct AdminPlugin;

pub fn plugin() -> Box<dyn Plugin> {
    Box::new(AdminPlugin)
}

impl Plugin for AdminPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Save and reload commands"
    }

    fn load(&self, ctx: &mut LoadContext<'_>) -> Result<()> {
        ctx.require(auth::NAME)?;
        ctx.register_hook("save", |bot| {
            Box::new(Save {
                bot: bot.clone(),
                command: AdminCommand::new(CommandMatcher::new("save")),
            }) as Box<dyn Hook>
        });
        ctx.register_hook("reload", |bot| {
            Box::new(Reload {
                bot: bot.clone(),
                command: AdminCommand::new(CommandMatcher::new("reload")),
            }) as Box<dyn Hook>
        });
        Ok(())
    }
}
