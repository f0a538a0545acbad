//! The `channels` plugin: join the configured channels once the server is ready.

use tracing::info;

use crate::connection::BotHandle;
use crate::error::Result;
use crate::hooks::Hook;
use crate::plugins::{LoadContext, Plugin};
use crate::protocol::{Event, IrcCommands};

use super::default;

pub const NAME: &str = "channels";

struct JoinOnReady {
    bot: BotHandle,
}

impl Hook for JoinOnReady {
    fn matches(&self, event: &Event) -> bool {
        default::is_connection_ready(event)
    }

    fn call(&mut self, _event: &Event) -> Result<()> {
        let channels = self.bot.with_config(|config| config.channels());
        if channels.is_empty() {
            return Ok(());
        }
        info!(channels = ?channels, "Joining channels");
        for channel in &channels {
            self.bot.join(channel);
        }
        Ok(())
    }
}

pub struct ChannelsPlugin;

pub fn plugin() -> Box<dyn Plugin> {
    Box::new(ChannelsPlugin)
}

impl Plugin for ChannelsPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Joins the configured channels when the server is ready"
    }

    fn load(&self, ctx: &mut LoadContext<'_>) -> Result<()> {
        ctx.require(default::NAME)?;
        ctx.register_hook("join_channels", |bot| {
            Box::new(JoinOnReady { bot: bot.clone() }) as Box<dyn Hook>
        });
        Ok(())
    }
}
