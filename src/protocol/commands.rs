//! Outbound command formatting.
//!
//! Pure string helpers over a single `send_line` primitive. Anything that
//! can send a raw line (the connection's outbound queue, a hook's bot handle)
//! gets the common command shapes by implementing [`IrcCommands`].

/// Frame a raw line for the wire.
///
/// Embedded `\r` and `\n` are removed so one call can never smuggle a second
/// command onto the connection.
pub fn encode_line(raw: &str) -> String {
    let mut line: String = raw.chars().filter(|c| *c != '\r' && *c != '\n').collect();
    line.push_str("\r\n");
    line
}

pub fn privmsg(target: &str, text: &str) -> String {
    format!("PRIVMSG {} :{}", target, text)
}

pub fn join(channel: &str) -> String {
    format!("JOIN {}", channel)
}

pub fn part(channel: &str, reason: &str) -> String {
    format!("PART {} :{}", channel, reason)
}

pub fn quit(reason: &str) -> String {
    format!("QUIT :{}", reason)
}

pub fn nick(nick: &str) -> String {
    format!("NICK {}", nick)
}

pub fn user(ident: &str, realname: &str) -> String {
    format!("USER {} * {} :{}", ident, ident, realname)
}

pub fn pong(token: &str) -> String {
    format!("PONG {}", token)
}

/// Common outbound command shapes over a raw line sender.
pub trait IrcCommands {
    /// Queue one raw line; the terminator is appended by the transport.
    fn send_line(&self, raw: &str);

    /// Send a message to a channel (with prefix) or a nick.
    fn msg(&self, target: &str, text: &str) {
        self.send_line(&privmsg(target, text));
    }

    fn join(&self, channel: &str) {
        self.send_line(&join(channel));
    }

    fn part(&self, channel: &str, reason: Option<&str>) {
        self.send_line(&part(channel, reason.unwrap_or("Part.")));
    }

    fn quit(&self, reason: Option<&str>) {
        self.send_line(&quit(reason.unwrap_or("Quit.")));
    }
}
