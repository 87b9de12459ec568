use crate::builtin;
use crate::command::{ExitCode, Registry};
use crate::env::Environment;
use crate::error::{Result, ShellError};
use crate::globbing;
use crate::io_adapters::{MemReader, MemWriter};
use crate::lexer::{self, Token, WordPart};
use crate::parser::{self, Node};
use log::{debug, trace};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::fs::File;
use std::io::{self, Read, Write};

/// How deep back-quotes may nest before the innermost one is refused.
pub const DEFAULT_SUBSTITUTION_LIMIT: usize = 64;

/// A line-oriented command interpreter.
///
/// The interpreter owns the [`Environment`] (working directory and history),
/// the [`Registry`] of applications and the error channel. Standard output is
/// supplied per line, so callers can capture it.
///
/// Example
/// ```
/// use minish::{Interpreter, MemWriter};
/// let mut sh = Interpreter::default().with_stderr(Box::new(MemWriter::new()));
/// let mut out = Vec::new();
/// let code = sh.eval("echo hello `echo world`", &mut out);
/// assert_eq!(code, 0);
/// assert_eq!(out, b"hello world\n");
/// ```
pub struct Interpreter {
    env: Environment,
    registry: Registry,
    stderr: Box<dyn Write>,
    depth: usize,
    max_depth: usize,
}

/// Shortens an optional input for a nested evaluation.
fn reborrow<'a>(stdin: &'a mut Option<&mut dyn Read>) -> Option<&'a mut dyn Read> {
    match stdin {
        Some(r) => Some(&mut **r as &mut dyn Read),
        None => None,
    }
}

impl Interpreter {
    /// Create a new interpreter with a custom set of applications.
    pub fn new(registry: Registry) -> Self {
        Self {
            env: Environment::new(),
            registry,
            stderr: Box::new(io::stderr()),
            depth: 0,
            max_depth: DEFAULT_SUBSTITUTION_LIMIT,
        }
    }

    /// Redirect the error channel.
    pub fn with_stderr(mut self, stderr: Box<dyn Write>) -> Self {
        self.stderr = stderr;
        self
    }

    pub fn with_environment(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    pub fn with_substitution_limit(mut self, limit: usize) -> Self {
        self.max_depth = limit;
        self
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// Evaluates one command line at top level.
    ///
    /// Nothing feeds the first call. Whatever error escapes the line is
    /// written to the error channel and turned into a non-zero exit code.
    pub fn eval(&mut self, line: &str, stdout: &mut dyn Write) -> ExitCode {
        match self.run_line(line, None, stdout) {
            Ok(()) => 0,
            Err(e) => {
                debug!("line failed: {:?}", e);
                let _ = writeln!(self.stderr, "{}", e);
                1
            }
        }
    }

    /// Parses and evaluates `line`, propagating the first error.
    pub fn run_line(
        &mut self,
        line: &str,
        stdin: Option<&mut dyn Read>,
        stdout: &mut dyn Write,
    ) -> Result<()> {
        let tree = parser::construct_ast(line)?;
        debug!("command tree:\n{}", tree);
        self.evaluate(&tree, stdin, stdout)
    }

    fn evaluate(
        &mut self,
        node: &Node,
        mut stdin: Option<&mut dyn Read>,
        stdout: &mut dyn Write,
    ) -> Result<()> {
        match node {
            Node::Sequence { left, right } => {
                self.evaluate(left, reborrow(&mut stdin), stdout)?;
                self.evaluate(right, stdin, stdout)
            }
            Node::Pipe { left, right } => {
                let (mut writer, buffer) = MemWriter::with_handle();
                self.evaluate(left, stdin, &mut writer)?;
                let mut mem_reader = MemReader::new(buffer.take());
                let reader: &mut dyn Read = &mut mem_reader;
                self.evaluate(right, Some(reader), stdout)
            }
            Node::Call { text } => self.eval_call(text, stdin, stdout),
        }
    }

    fn eval_call(
        &mut self,
        text: &str,
        stdin: Option<&mut dyn Read>,
        stdout: &mut dyn Write,
    ) -> Result<()> {
        let tokens = lexer::split_into_tokens(text)?;
        trace!("tokens of {:?}: {:?}", text, tokens);

        let markers = |kind: &Token| tokens.iter().filter(|t| *t == kind).count();
        if markers(&Token::RedirectLeft) > 1 {
            return Err(ShellError::Redirection(
                "too many files for input redirection".to_string(),
            ));
        }
        if markers(&Token::RedirectRight) > 1 {
            return Err(ShellError::Redirection(
                "too many files for output redirection".to_string(),
            ));
        }

        // At most one marker of each kind from here on.
        let mut words = Vec::new();
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        let mut tokens = tokens.into_iter().peekable();
        while let Some(token) = tokens.next() {
            match token {
                Token::Word(parts) => {
                    let word = self.resolve_word(parts)?;
                    words.push(word);
                }
                marker @ (Token::RedirectLeft | Token::RedirectRight) => {
                    let is_input = marker == Token::RedirectLeft;
                    match tokens.next_if(|t| matches!(t, Token::Word(_))) {
                        Some(Token::Word(parts)) => {
                            let target = self.resolve_word(parts)?;
                            if is_input {
                                inputs.push(target);
                            } else {
                                outputs.push(target);
                            }
                        }
                        _ => words.push(if is_input { "<" } else { ">" }.to_string()),
                    }
                }
            }
        }

        let mut input_file = match inputs.first() {
            Some(path) => Some(
                File::open(self.env.resolve(path))
                    .map_err(|e| ShellError::filesystem("redirection", path, e))?,
            ),
            None => None,
        };
        let mut output_file = match outputs.first() {
            Some(path) => Some(
                File::create(self.env.resolve(path))
                    .map_err(|e| ShellError::filesystem("redirection", path, e))?,
            ),
            None => None,
        };

        let stdin: Option<&mut dyn Read> = match input_file.as_mut() {
            Some(file) => Some(file as &mut dyn Read),
            None => stdin.map(|r| r as &mut dyn Read),
        };
        let stdout: &mut dyn Write = match output_file.as_mut() {
            Some(file) => file as &mut dyn Write,
            None => stdout,
        };
        self.dispatch(&words, stdin, stdout)
    }

    /// Looks the application up, expands globs and runs it under its mode.
    fn dispatch(
        &mut self,
        words: &[String],
        stdin: Option<&mut dyn Read>,
        stdout: &mut dyn Write,
    ) -> Result<()> {
        let Some((command, args)) = words.split_first() else {
            return Ok(());
        };

        let (app, mode) = self.registry.resolve(command)?;
        let args = globbing::expand_arguments(
            args,
            app.glob_ignore_index(args),
            &self.env.current_dir,
        );
        debug!("{} {:?} ({:?})", app.name(), args, mode);

        let result = app.run(&args, stdin, stdout, &mut self.env);
        mode.apply(result, &mut *self.stderr)
    }

    fn resolve_word(&mut self, parts: Vec<WordPart>) -> Result<String> {
        let mut word = String::new();
        for part in parts {
            match part {
                WordPart::Literal(text) => word.push_str(&text),
                WordPart::CmdSubst(command) => word.push_str(&self.substitute(&command)?),
            }
        }
        Ok(word)
    }

    /// Output of `command` with one trailing newline removed.
    ///
    /// Errors inside the command are reported, not propagated; the output
    /// produced before the error is kept. Nesting past the limit counts as
    /// such an error.
    fn substitute(&mut self, command: &str) -> Result<String> {
        let mut captured = MemWriter::new();
        let result = if self.depth >= self.max_depth {
            Err(ShellError::SubstitutionDepth(self.max_depth))
        } else {
            self.depth += 1;
            trace!("substitution depth {}: {:?}", self.depth, command);
            let result = self.run_line(command, None, &mut captured);
            self.depth -= 1;
            result
        };

        if let Err(e) = result {
            debug!("substitution failed, reporting: {}", e);
            writeln!(self.stderr, "{}", e).map_err(ShellError::io("substitution"))?;
        }

        let mut output = captured.contents();
        if output.ends_with('\n') {
            output.pop();
            if output.ends_with('\r') {
                output.pop();
            }
        }
        Ok(output)
    }

    /// Interactive loop: prompt with the working directory, record the line
    /// in history, evaluate it. Ends on end of input.
    pub fn repl(&mut self) -> anyhow::Result<()> {
        let mut rl = DefaultEditor::new()?;
        let mut stdout = io::stdout();

        loop {
            let prompt = format!("{} ", self.env.current_dir.display());
            match rl.readline(&prompt) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    rl.add_history_entry(line.as_str())?;
                    self.env.push_history(line.as_str());
                    self.eval(&line, &mut stdout);
                    stdout.flush()?;
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err.into()),
            }
        }

        Ok(())
    }
}

impl Default for Interpreter {
    /// An interpreter with every builtin registered, reporting on stderr.
    fn default() -> Self {
        Self::new(builtin::all().into_iter().collect())
    }
}
