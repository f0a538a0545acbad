//! Hook system for hookbot
//!
//! Hooks are the unit of behavior. Every decoded [`Event`] is offered to each
//! activated hook in registration order:
//!
//! - `matches` decides, without side effects, whether the hook reacts
//! - `call` reacts, usually by sending lines through its [`BotHandle`]
//!   or by starting a [`Task`](crate::task::Task) for slow work
//!
//! # Architecture
//!
//! - **registry**: ordered list of hook *types* ([`HookType`]), each a named
//!   factory contributed by a plugin
//! - **dispatcher**: the activated instances, one per registered type, and
//!   fan-out dispatch with per-hook failure isolation
//!
//! # Example
//!
//! ```rust
//! use hookbot::hooks::Hook;
//! use hookbot::protocol::{Event, IrcCommands};
//! use hookbot::connection::BotHandle;
//!
//! struct Greeter {
//!     bot: BotHandle,
//! }
//!
//! impl Hook for Greeter {
//!     fn matches(&self, event: &Event) -> bool {
//!         event.is("JOIN")
//!     }
//!
//!     fn call(&mut self, event: &Event) -> hookbot::Result<()> {
//!         if let (Some(channel), Some(nick)) = (event.target.as_deref(), event.nick()) {
//!             self.bot.msg(channel, &format!("welcome, {}", nick));
//!         }
//!         Ok(())
//!     }
//! }
//! ```
//!
//! [`BotHandle`]: crate::connection::BotHandle

pub mod dispatcher;
pub mod registry;

pub use dispatcher::{DispatchReport, HookDispatcher};
pub use registry::{HookFactory, HookRegistry, HookType};

use crate::error::Result;
use crate::protocol::Event;

/// A behavior unit reacting to events.
///
/// Instances are created by their [`HookType`] factory on every activation
/// and dropped on the next one.
#[cfg_attr(test, mockall::automock)]
pub trait Hook: Send {
    /// Whether this hook reacts to `event`. Must not have side effects.
    fn matches(&self, event: &Event) -> bool;

    /// React to a matched event.
    fn call(&mut self, event: &Event) -> Result<()>;
}
