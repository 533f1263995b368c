//! Command interpretation engine for `dyshell`.
//!
//! [`shell::Engine`] takes one submitted line at a time, expands it, picks an
//! execution mode and writes everything it produces to a caller-supplied sink.
//! The interactive front end in `main.rs` is only a producer of lines and a
//! consumer of that output.

pub mod builtins;
pub mod completions;
pub mod config;
pub mod error;
pub mod expand;
pub mod path;
pub mod persist;
pub mod process_exec;
pub mod prompt;
pub mod settings;
pub mod shell;
pub mod signals;
pub mod store;
pub mod tokens;

pub use error::{Result, ShellError};
pub use shell::{Engine, Status};
pub use store::Store;
