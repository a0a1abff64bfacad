//! A minimal interactive command-line shell.
//!
//! Each input line is trimmed by [`line::trim_line`], split into an owned
//! [`lexer::ArgVector`] by [`lexer::split_into_args`] and handed to the
//! [`Interpreter`], which runs the built-ins `exit`, `cd` and `history`.
//! Everything else is reported as not handled; this crate does not launch
//! external programs.
//!
//! Shell-wide state lives in a [`Session`], which also takes care of the
//! terminal foreground, the shell's process group and the job-control signals
//! when running interactively.

mod builtin;
pub mod cli;
pub mod command;
mod interpreter;
pub mod lexer;
pub mod line;
pub mod session;

pub use interpreter::{Dispatch, Interpreter};
pub use session::Session;
