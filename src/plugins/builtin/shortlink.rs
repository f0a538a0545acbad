//! The `shortlink` plugin: shorten long links posted in messages.
//!
//! Configuration:
//!
//! ```json
//! { "shortlink": { "length": 50, "endpoint": "https://short.example/api", "field": "id" } }
//! ```
//!
//! A message starting with an `http(s)://` link of at least `length`
//! characters starts a background task that posts `{"longUrl": <link>}` to
//! `endpoint` and sends the `field` of the JSON answer back to the channel,
//! or to the sender when the link came in a private message.
//! Without an endpoint the hook stays silent.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::Config;
use crate::connection::BotHandle;
use crate::error::{BotError, Result};
use crate::hooks::Hook;
use crate::plugins::{LoadContext, Plugin};
use crate::protocol::{Event, IrcCommands};
use crate::task::{Task, TaskContext};

pub const NAME: &str = "shortlink";

const DEFAULT_LENGTH: usize = 50;
const DEFAULT_FIELD: &str = "id";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(?:[a-zA-Z0-9]|[$-_@.&+]|[!*(),]|%[0-9a-fA-F]{2})+")
        .expect("url pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
struct Settings {
    length: usize,
    endpoint: Option<String>,
    field: String,
}

impl Settings {
    fn from_config(config: &Config) -> Self {
        let length = config
            .get_path("shortlink.length")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_LENGTH);
        let endpoint = config
            .get_path("shortlink.endpoint")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string);
        let field = config
            .get_path("shortlink.field")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_FIELD)
            .to_string();
        Self {
            length,
            endpoint,
            field,
        }
    }
}

/// The link at the start of `body` if it is at least `min_len` long.
pub fn long_url(body: &str, min_len: usize) -> Option<&str> {
    URL_RE
        .find(body)
        .map(|m| m.as_str())
        .filter(|url| url.len() >= min_len)
}

struct ShortLink {
    bot: BotHandle,
}

impl Hook for ShortLink {
    fn matches(&self, event: &Event) -> bool {
        if !event.is("PRIVMSG") {
            return false;
        }
        let settings = self.bot.with_config(Settings::from_config);
        settings.endpoint.is_some() && long_url(event.body_str(), settings.length).is_some()
    }

    fn call(&mut self, event: &Event) -> Result<()> {
        let settings = self.bot.with_config(Settings::from_config);
        let (Some(url), Some(endpoint)) = (
            long_url(event.body_str(), settings.length),
            settings.endpoint,
        ) else {
            return Ok(());
        };
        debug!(url = %url, "Shortening link");
        self.bot.spawn_task(
            RequestShortLink {
                long_url: url.to_string(),
                endpoint,
                field: settings.field,
            },
            NAME,
            event,
        )?;
        Ok(())
    }
}

/// Asks the shortener service for a short link and posts it.
pub struct RequestShortLink {
    pub long_url: String,
    pub endpoint: String,
    pub field: String,
}

impl Task for RequestShortLink {
    fn name(&self) -> &str {
        "request_shortlink"
    }

    fn run(&mut self, ctx: &TaskContext) -> Result<()> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let answer: Value = client
            .post(&self.endpoint)
            .json(&json!({ "longUrl": self.long_url }))
            .send()?
            .error_for_status()?
            .json()?;

        let short = answer
            .get(&self.field)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                BotError::Task(format!("shortener answer has no '{}' field", self.field))
            })?;

        let target = ctx
            .event
            .reply_target()
            .ok_or_else(|| BotError::Task("message has no target".to_string()))?;
        info!(url = %self.long_url, short = %short, "Link shortened");
        ctx.bot.msg(target, short);
        Ok(())
    }
}

pub struct ShortlinkPlugin;

pub fn plugin() -> Box<dyn Plugin> {
    Box::new(ShortlinkPlugin)
}

impl Plugin for ShortlinkPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Posts short versions of long links"
    }

    fn load(&self, ctx: &mut LoadContext<'_>) -> Result<()> {
        ctx.register_hook("shortlink", |bot| {
            Box::new(ShortLink { bot: bot.clone() }) as Box<dyn Hook>
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{self, TaskOutcome};
    use std::io::{Read, Write};
    use std::net::TcpListener;

    const LONG: &str = "https://example.com/a/very/long/path/that/goes/on/and/on/forever";

    fn message(body: &str) -> Event {
        Event::new("PRIVMSG")
            .with_origin("alice!a@h")
            .with_target("#chan")
            .with_body(body)
    }

    /// Answers one HTTP request with `body` and returns what was received.
    fn one_shot_server(body: &'static str) -> (String, std::thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}/shorten", listener.local_addr().unwrap());
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 1024];
            while !String::from_utf8_lossy(&received).contains("longUrl\":") || !received.ends_with(b"}") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&received).into_owned()
        });
        (endpoint, server)
    }

    #[test]
    fn test_long_url() {
        assert_eq!(long_url(LONG, 50), Some(LONG));
        assert_eq!(long_url(&format!("{} trailing words", LONG), 50), Some(LONG));
        assert_eq!(long_url("https://short.io/x", 50), None);
        assert_eq!(long_url("https://short.io/x", 5), Some("https://short.io/x"));
        assert_eq!(long_url(&format!("look: {}", LONG), 10), None);
        assert_eq!(long_url("ftp://example.com/file", 1), None);
    }

    #[test]
    fn test_matches_needs_endpoint_and_length() {
        let (bot, _receivers) = BotHandle::detached(Config::default());
        let hook = ShortLink { bot: bot.clone() };
        assert!(!hook.matches(&message(LONG)));

        bot.update_config(|c| {
            c.set(
                "shortlink",
                json!({ "endpoint": "http://127.0.0.1:9/", "length": 20 }),
            )
        });
        assert!(hook.matches(&message(LONG)));
        assert!(!hook.matches(&message("https://a.io/x")));
        assert!(!hook.matches(&Event::new("NOTICE").with_body(LONG)));
    }

    #[test]
    fn test_task_posts_short_link() {
        let (endpoint, server) = one_shot_server(r#"{"id": "http://sho.rt/abc"}"#);
        let (bot, mut receivers) = BotHandle::detached(Config::default());

        let outcome = task::start(
            RequestShortLink {
                long_url: LONG.to_string(),
                endpoint,
                field: DEFAULT_FIELD.to_string(),
            },
            TaskContext::new(bot, NAME, message(LONG)),
        )
        .unwrap()
        .join();

        assert_eq!(outcome, TaskOutcome::Completed);
        assert!(server.join().unwrap().contains(LONG));
        assert_eq!(
            receivers.outbound.try_recv().unwrap(),
            "PRIVMSG #chan :http://sho.rt/abc\r\n"
        );
    }

    #[test]
    fn test_private_link_is_answered_to_sender() {
        let (endpoint, server) = one_shot_server(r#"{"id": "http://sho.rt/xyz"}"#);
        let (bot, mut receivers) = BotHandle::detached(Config::default());
        let private = Event::new("PRIVMSG")
            .with_origin("alice!a@h")
            .with_target("hookbot")
            .with_body(LONG);

        let outcome = task::start(
            RequestShortLink {
                long_url: LONG.to_string(),
                endpoint,
                field: DEFAULT_FIELD.to_string(),
            },
            TaskContext::new(bot, NAME, private),
        )
        .unwrap()
        .join();

        server.join().unwrap();
        assert_eq!(outcome, TaskOutcome::Completed);
        assert_eq!(
            receivers.outbound.try_recv().unwrap(),
            "PRIVMSG alice :http://sho.rt/xyz\r\n"
        );
    }

    #[test]
    fn test_task_fails_on_missing_field() {
        let (endpoint, server) = one_shot_server(r#"{"error": "quota"}"#);
        let (bot, mut receivers) = BotHandle::detached(Config::default());

        let outcome = task::start(
            RequestShortLink {
                long_url: LONG.to_string(),
                endpoint,
                field: DEFAULT_FIELD.to_string(),
            },
            TaskContext::new(bot, NAME, message(LONG)),
        )
        .unwrap()
        .join();

        server.join().unwrap();
        assert!(matches!(outcome, TaskOutcome::Failed { .. }));
        assert!(receivers.outbound.try_recv().is_err());
    }
}
