//! The `auth` plugin: admin list and the `admin` command.
//!
//! Admins are stored in the configuration under `auth.admins`. Other plugins
//! gate their commands with [`is_admin`] or [`AdminCommand`].

use serde_json::{json, Value};
use tracing::info;

use crate::config::Config;
use crate::connection::BotHandle;
use crate::error::Result;
use crate::hooks::Hook;
use crate::plugins::{LoadContext, Plugin};
use crate::protocol::{Event, IrcCommands};

use super::default::{self, CommandMatcher};

pub const NAME: &str = "auth";

/// Whether the sender of `event` is a configured admin.
pub fn is_admin(event: &Event, config: &Config) -> bool {
    match event.nick() {
        Some(nick) => config.string_list("auth.admins").iter().any(|a| a == nick),
        None => false,
    }
}

/// A command that only admins may use.
#[derive(Debug, Clone)]
pub struct AdminCommand {
    matcher: CommandMatcher,
}

impl AdminCommand {
    pub fn new(matcher: CommandMatcher) -> Self {
        Self { matcher }
    }

    /// Parameters of a matching command sent by an admin.
    pub fn params<'e>(&self, event: &'e Event, config: &Config) -> Option<&'e str> {
        if !is_admin(event, config) {
            return None;
        }
        self.matcher.params(event, &config.nick())
    }

    pub fn matches(&self, event: &Event, config: &Config) -> bool {
        self.params(event, config).is_some()
    }
}

/// Add `nick` to the admin list. Returns false if it was already there.
pub fn add_admin(config: &mut Config, nick: &str) -> bool {
    let auth = config.section_mut(NAME);
    let admins = auth
        .entry("admins".to_string())
        .or_insert_with(|| json!([]));
    if !admins.is_array() {
        *admins = json!([]);
    }
    match admins {
        Value::Array(list) if !list.iter().any(|a| a.as_str() == Some(nick)) => {
            list.push(json!(nick));
            true
        }
        _ => false,
    }
}

/// Remove `nick` from the admin list. Returns false if it was not there.
pub fn remove_admin(config: &mut Config, nick: &str) -> bool {
    match config.section_mut(NAME).get_mut("admins") {
        Some(Value::Array(list)) => {
            let before = list.len();
            list.retain(|a| a.as_str() != Some(nick));
            list.len() != before
        }
        _ => false,
    }
}

const SYNTAX: &str = "The required syntax is: <action> [<nick>]";

struct AdminManagement {
    bot: BotHandle,
    command: AdminCommand,
}

impl AdminManagement {
    fn reply(&self, event: &Event, text: &str) {
        if let Some(target) = event.reply_target() {
            self.bot.msg(target, text);
        }
    }
}

impl Hook for AdminManagement {
    fn matches(&self, event: &Event) -> bool {
        self.bot.with_config(|config| self.command.matches(event, config))
    }

    fn call(&mut self, event: &Event) -> Result<()> {
        let params = self.bot.with_config(|config| {
            self.command
                .params(event, config)
                .unwrap_or_default()
                .to_string()
        });
        let mut args = params.split_whitespace();

        let Some(action) = args.next() else {
            self.reply(event, SYNTAX);
            return Ok(());
        };

        if action == "list" {
            let admins = self.bot.with_config(|config| config.string_list("auth.admins"));
            self.reply(event, &format!("Admins are: {}", admins.join(", ")));
            return Ok(());
        }

        let Some(nick) = args.next() else {
            self.reply(event, SYNTAX);
            return Ok(());
        };

        match action {
            "add" => {
                self.bot.update_config(|c| add_admin(c, nick));
                info!(admin = %nick, by = ?event.nick(), "Admin added");
                self.reply(event, &format!("{} is now admin.", nick));
            }
            "remove" | "delete" => {
                self.bot.update_config(|c| remove_admin(c, nick));
                info!(admin = %nick, by = ?event.nick(), "Admin removed");
                self.reply(event, &format!("{} is no longer admin.", nick));
            }
            other => self.reply(event, &format!("Unknown action: {}", other)),
        }
        Ok(())
    }
}

pub struct AuthPlugin;

pub fn plugin() -> Box<dyn Plugin> {
    Box::new(AuthPlugin)
}

impl Plugin for AuthPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Admin list and the admin management command"
    }

    fn load(&self, ctx: &mut LoadContext<'_>) -> Result<()> {
        ctx.require(default::NAME)?;
        ctx.register_hook("admin_management", |bot| {
            Box::new(AdminManagement {
                bot: bot.clone(),
                command: AdminCommand::new(CommandMatcher::with_params("admin")),
            }) as Box<dyn Hook>
        });
        Ok(())
    }
}
