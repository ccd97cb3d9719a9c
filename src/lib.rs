//! A small interactive shell.
//!
//! Each input line is split into tokens with shell quoting rules (single
//! quotes, double quotes and backslash escapes), parsed into a command with
//! optional output redirections (`>`, `1>`, `>>`, `1>>`, `2>`, `2>>`), and run
//! either as one of the builtins `echo`, `type`, `exit`, `pwd` and `cd` or as
//! an external program found through `PATH`.
//!
//! The main entry point is [`Interpreter`], which owns the shell state and
//! runs lines one at a time or as a read-eval loop. The public modules
//! [`command`] and [`env`] expose the traits and types commands are built on,
//! [`lexer`] and [`parser`] the two parsing stages.

mod builtin;
pub mod command;
pub mod env;
mod external;
mod interpreter;
pub mod io_adapters;
pub mod lexer;
pub mod logging;
pub mod parser;

/// Just a convenient re-export of the command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{Interpreter, PROMPT};

pub use external::find_command_path;
