//! A small line-oriented command interpreter.
//!
//! A command line is parsed in two stages. [`parser`] splits it at unquoted
//! `;` and `|` into a tree of sequences, pipes and raw calls. Each call is
//! tokenized by [`lexer`] only when it is about to run, so that back-quoted
//! command substitution sees the effects of everything evaluated before it.
//! After redirection and glob expansion ([`globbing`]) the call is dispatched
//! to an [`Application`](command::Application) from the [`Registry`].
//!
//! The main entry point is [`Interpreter`]. Calls whose name starts with `_`
//! are unsafe: their errors are reported instead of aborting the line.

mod builtin;
pub mod cli;
pub mod command;
pub mod env;
pub mod error;
pub mod globbing;
mod interpreter;
mod io_adapters;
pub mod lexer;
pub mod parser;

pub use command::{ExitCode, Registry};
pub use env::Environment;
pub use error::ShellError;
pub use interpreter::{DEFAULT_SUBSTITUTION_LIMIT, Interpreter};
pub use io_adapters::{MemReader, MemWriter};
pub use parser::Node;
