//! Command-line interface components
//!
//! This module contains CLI-specific code for the Booking Sync application:
//! argument parsing and the command handlers driving the sync engine.

pub mod args;
pub mod commands;

pub use args::{BookArgs, Cli, Commands, GlobalArgs, ListArgs};
pub use commands::{
    build_engine, handle_book, handle_cancel, handle_config, handle_forget, handle_list,
    handle_show, resolve_owner,
};
