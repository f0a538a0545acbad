//! Wire protocol for hookbot
//!
//! - **event**: the decoded [`Event`] and its derived [`UserMask`]
//! - **codec**: `\r\n` framing ([`LineDecoder`]) and line parsing ([`parse_line`])
//! - **commands**: outbound line formatting and the [`IrcCommands`] helpers

pub mod codec;
pub mod commands;
pub mod event;

pub use codec::{parse_line, LineDecoder};
pub use commands::{encode_line, IrcCommands};
pub use event::{Event, UserMask};
