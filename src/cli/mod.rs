//! Subcommand handlers for the `hookbot` binary.

pub(crate) mod plugins;
pub(crate) mod run;
