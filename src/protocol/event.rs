//! Decoded protocol events.

use std::fmt;

/// The `nick!ident@host` triple of a user prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMask {
    pub nick: String,
    pub ident: String,
    pub host: String,
}

impl UserMask {
    /// Split a raw prefix into its user parts.
    ///
    /// Returns `None` for server prefixes (no `!`) and for masks missing the
    /// `@host` part.
    pub fn parse(origin: &str) -> Option<Self> {
        let (nick, rest) = origin.split_once('!')?;
        let (ident, host) = rest.split_once('@')?;
        Some(Self {
            nick: nick.to_string(),
            ident: ident.to_string(),
            host: host.to_string(),
        })
    }
}

/// One decoded protocol line, or a synthetic lifecycle signal.
///
/// `name` is always present. Depending on the line, `origin`, `target` and
/// `body` may be absent. The user mask (`nick`, `ident`, `host`) is derived
/// once from `origin` when the event is built.
///
/// # Example
///
/// ```
/// use hookbot::protocol::Event;
///
/// let event = Event::new("PRIVMSG")
///     .with_origin("alice!a@h")
///     .with_target("#chan")
///     .with_body("hello");
/// assert_eq!(event.nick(), Some("alice"));
/// assert_eq!(event.host(), Some("h"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    name: String,
    pub origin: Option<String>,
    pub target: Option<String>,
    pub body: Option<String>,
    user: Option<UserMask>,
}

impl Event {
    /// Synthetic event dispatched once the transport is established.
    pub const CONNECTED: &'static str = "CONNECTED";
    /// Synthetic event for lines the decoder does not understand.
    pub const UNKNOWN: &'static str = "UNKNOWN";
    /// Synthetic event emitted after the configuration was saved.
    pub const SAVE: &'static str = "SAVE";
    /// Synthetic event emitted after plugins were reloaded.
    pub const RELOAD: &'static str = "RELOAD";

    /// Create an event with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        let mut name = name.into();
        if name.is_empty() {
            name = Self::UNKNOWN.to_string();
        }
        Self {
            name,
            origin: None,
            target: None,
            body: None,
            user: None,
        }
    }

    /// The synthetic `CONNECTED` event.
    pub fn connected() -> Self {
        Self::new(Self::CONNECTED)
    }

    /// An `UNKNOWN` event carrying the offending line for diagnostics.
    pub fn unknown(line: &str) -> Self {
        Self::new(Self::UNKNOWN).with_body(line)
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        let origin = origin.into();
        self.user = UserMask::parse(&origin);
        self.origin = Some(origin);
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// The event name; never empty.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the event has the given name.
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn user(&self) -> Option<&UserMask> {
        self.user.as_ref()
    }

    pub fn nick(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.nick.as_str())
    }

    pub fn ident(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.ident.as_str())
    }

    pub fn host(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.host.as_str())
    }

    /// Body text, or an empty string when absent.
    pub fn body_str(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }

    /// Where a reply to this event should go.
    ///
    /// Channel messages are answered in the channel, private messages are
    /// answered to the sender.
    pub fn reply_target(&self) -> Option<&str> {
        match self.target.as_deref() {
            Some(t) if t.starts_with('#') || t.starts_with('&') => Some(t),
            _ => self.nick().or(self.target.as_deref()),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Event {}>", self.name)
    }
}
