//! Process entry point: argument parsing, logger set-up and mode selection.

use crate::command::ExitCode;
use crate::interpreter::Interpreter;
use crate::parser;
use argh::{EarlyExit, FromArgs};
use simplelog::{Config, LevelFilter, WriteLogger};
use std::io::{self, Write};

/// Exit code for a malformed command line.
pub const USAGE_ERROR: ExitCode = 2;

/// Environment variable holding the log level (`off`, `error`, ..., `trace`).
pub const LOG_ENV: &str = "MINISH_LOG";

#[derive(FromArgs, Debug)]
/// A small line-oriented command interpreter.
/// Starts an interactive session unless a line is given with -c.
pub struct Cli {
    #[argh(option, short = 'c')]
    /// evaluate this line and exit
    pub command: Option<String>,

    #[argh(switch, short = 't')]
    /// print the command tree of the -c line instead of evaluating it
    pub tree: bool,

    #[argh(switch, short = 'v')]
    /// log debug information to stderr
    pub verbose: bool,
}

fn log_level(verbose: bool) -> LevelFilter {
    if verbose {
        return LevelFilter::Debug;
    }
    std::env::var(LOG_ENV)
        .ok()
        .and_then(|level| level.parse().ok())
        .unwrap_or(LevelFilter::Off)
}

fn init_logging(verbose: bool) {
    let level = log_level(verbose);
    if level != LevelFilter::Off {
        // Fails only if a logger is already installed, e.g. by a test harness.
        let _ = WriteLogger::init(level, Config::default(), io::stderr());
    }
}

/// Runs the program with `args` (program name first).
///
/// Usage errors are reported on `stderr` and yield [`USAGE_ERROR`]; otherwise
/// the exit code is that of the evaluated line.
pub fn run(args: &[&str], stdout: &mut dyn Write, mut stderr: Box<dyn Write>) -> ExitCode {
    let (name, rest) = match args.split_first() {
        Some((name, rest)) => (*name, rest),
        None => ("minish", &[][..]),
    };

    let cli = match Cli::from_args(&[name], rest) {
        Ok(cli) => cli,
        Err(EarlyExit {
            output,
            status: Ok(()),
        }) => {
            let _ = stdout.write_all(output.as_bytes());
            return 0;
        }
        Err(EarlyExit {
            output,
            status: Err(()),
        }) => {
            let _ = write!(stderr, "{}", output);
            return USAGE_ERROR;
        }
    };

    init_logging(cli.verbose);

    match (cli.command, cli.tree) {
        (Some(line), true) => match parser::construct_ast(&line) {
            Ok(tree) => {
                let _ = write!(stdout, "{}", tree);
                0
            }
            Err(e) => {
                let _ = writeln!(stderr, "{}", e);
                1
            }
        },
        (Some(line), false) => Interpreter::default().with_stderr(stderr).eval(&line, stdout),
        (None, true) => {
            let _ = writeln!(stderr, "{}: --tree requires --command", name);
            USAGE_ERROR
        }
        (None, false) => match Interpreter::default().with_stderr(stderr).repl() {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("{}: {:#}", name, e);
                1
            }
        },
    }
}
