//! The `default` plugin: identification and ping replies.
//!
//! The core does nothing on its own, not even log in. This plugin sends
//! `NICK`/`USER` once the socket is up and answers every `PING`. It also
//! provides the matchers other plugins build their hooks on.

use tracing::info;

use crate::connection::BotHandle;
use crate::error::Result;
use crate::hooks::Hook;
use crate::plugins::{LoadContext, Plugin};
use crate::protocol::{commands, Event, IrcCommands};

pub const NAME: &str = "default";

/// Whether the server finished the greeting (end of MOTD, or no MOTD).
pub fn is_connection_ready(event: &Event) -> bool {
    event.is("376") || event.is("422")
}

/// Matches `PRIVMSG` bodies addressed to the bot: `<nick>: <command>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMatcher {
    command: String,
    with_params: bool,
}

impl CommandMatcher {
    /// Exactly `<nick>: <command>`.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            with_params: false,
        }
    }

    /// `<nick>: <command> <params...>`.
    pub fn with_params(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            with_params: true,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// The parameters of a matching command (empty for exact commands).
    pub fn params<'e>(&self, event: &'e Event, nick: &str) -> Option<&'e str> {
        if !event.is("PRIVMSG") {
            return None;
        }
        let rest = event
            .body
            .as_deref()?
            .strip_prefix(nick)?
            .strip_prefix(": ")?
            .strip_prefix(self.command.as_str())?;
        if self.with_params {
            rest.strip_prefix(' ')
        } else if rest.is_empty() {
            Some(rest)
        } else {
            None
        }
    }

    pub fn matches(&self, event: &Event, nick: &str) -> bool {
        self.params(event, nick).is_some()
    }
}

struct Identify {
    bot: BotHandle,
}

impl Hook for Identify {
    fn matches(&self, event: &Event) -> bool {
        event.is(Event::CONNECTED)
    }

    fn call(&mut self, _event: &Event) -> Result<()> {
        let (nick, ident, realname) = self
            .bot
            .with_config(|config| (config.nick(), config.ident(), config.realname()));
        info!(nick = %nick, "Socket is ready, logging in");
        self.bot.send_line(&commands::nick(&nick));
        self.bot.send_line(&commands::user(&ident, &realname));
        Ok(())
    }
}

struct PingPong {
    bot: BotHandle,
}

impl Hook for PingPong {
    fn matches(&self, event: &Event) -> bool {
        event.is("PING")
    }

    fn call(&mut self, event: &Event) -> Result<()> {
        self.bot.send_line(&commands::pong(event.body_str()));
        Ok(())
    }
}

pub struct DefaultPlugin;

pub fn plugin() -> Box<dyn Plugin> {
    Box::new(DefaultPlugin)
}

impl Plugin for DefaultPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Logs in on connect and answers server pings"
    }

    fn load(&self, ctx: &mut LoadContext<'_>) -> Result<()> {
        ctx.register_hook("identify", |bot| {
            Box::new(Identify { bot: bot.clone() }) as Box<dyn Hook>
        });
        ctx.register_hook("ping_pong", |bot| {
            Box::new(PingPong { bot: bot.clone() }) as Box<dyn Hook>
        });
        Ok(())
    }
}
