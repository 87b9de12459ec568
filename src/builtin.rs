use crate::command::{Application, Factory};
use crate::env::Environment;
use crate::error::{Result, ShellError};
use argh::{EarlyExit, FromArgs};
use regex::{Regex, RegexBuilder};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

/// Built-in commands whose flags are parsed with [`argh`] (`FromArgs`).
///
/// They are registered through [`Factory`], which parses the argument list
/// into `Self` and turns `argh` errors into [`ShellError::Argument`].
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cat" or "cd".
    fn name() -> &'static str;

    /// See [`Application::glob_ignore_index`].
    fn glob_ignore_index(_args: &[String]) -> Option<usize> {
        None
    }

    /// Executes the command using provided IO streams and environment.
    fn execute(
        self,
        stdin: Option<&mut dyn Read>,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<()>;
}

impl<T: BuiltinCommand> Application for Factory<T> {
    fn name(&self) -> &'static str {
        T::name()
    }

    fn glob_ignore_index(&self, args: &[String]) -> Option<usize> {
        T::glob_ignore_index(args)
    }

    fn run(
        &self,
        args: &[String],
        stdin: Option<&mut dyn Read>,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<()> {
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        match T::from_args(&[T::name()], &argv) {
            Ok(cmd) => cmd.execute(stdin, stdout, env),
            // --help
            Err(EarlyExit {
                output,
                status: Ok(()),
            }) => stdout
                .write_all(output.as_bytes())
                .map_err(ShellError::io(T::name())),
            Err(EarlyExit {
                output,
                status: Err(()),
            }) => Err(ShellError::argument(
                T::name(),
                output.split_whitespace().collect::<Vec<_>>().join(" "),
            )),
        }
    }
}

/// Every builtin, ready to be registered.
pub fn all() -> Vec<Box<dyn Application>> {
    vec![
        Box::new(Factory::<Pwd>::default()),
        Box::new(Factory::<Cd>::default()),
        Box::new(Factory::<Ls>::default()),
        Box::new(Factory::<Cat>::default()),
        Box::new(Echo),
        Box::new(Factory::<Head>::default()),
        Box::new(Factory::<Tail>::default()),
        Box::new(Factory::<Grep>::default()),
        Box::new(Factory::<Sed>::default()),
        Box::new(Find),
        Box::new(Factory::<History>::default()),
        Box::new(Wc),
    ]
}

/// Opens `path` for reading, rejecting directories.
fn open_file(app: &'static str, env: &Environment, path: &str) -> Result<File> {
    let resolved = env.resolve(path);
    if resolved.is_dir() {
        return Err(ShellError::not_found(app, format!("{}: is a directory", path)));
    }
    File::open(&resolved).map_err(|e| ShellError::filesystem(app, path, e))
}

fn require_input<'a>(
    app: &'static str,
    stdin: Option<&'a mut dyn Read>,
) -> Result<&'a mut dyn Read> {
    stdin.ok_or_else(|| ShellError::argument(app, "missing input"))
}

fn read_lines(app: &'static str, reader: &mut dyn Read) -> Result<Vec<String>> {
    BufReader::new(reader)
        .lines()
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(ShellError::io(app))
}

fn write_lines<'a>(
    app: &'static str,
    stdout: &mut dyn Write,
    lines: impl IntoIterator<Item = &'a String>,
) -> Result<()> {
    for line in lines {
        writeln!(stdout, "{}", line).map_err(ShellError::io(app))?;
    }
    Ok(())
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(
        self,
        _stdin: Option<&mut dyn Read>,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<()> {
        writeln!(stdout, "{}", env.current_dir.to_string_lossy()).map_err(ShellError::io("pwd"))
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the home directory captured at start-up.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(
        self,
        _stdin: Option<&mut dyn Read>,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<()> {
        let (shown, new_dir) = match &self.target {
            Some(t) => (t.clone(), env.resolve(t)),
            None => match &env.home {
                Some(home) => (home.to_string_lossy().into_owned(), home.clone()),
                None => return Err(ShellError::argument("cd", "missing argument")),
            },
        };

        if !new_dir.is_dir() {
            return Err(ShellError::not_found(
                "cd",
                format!("{} is not an existing directory", shown),
            ));
        }

        env.current_dir =
            fs::canonicalize(&new_dir).map_err(|e| ShellError::filesystem("cd", &shown, e))?;
        Ok(())
    }
}

#[derive(FromArgs)]
/// List the non-hidden entries of a directory on one tab-separated line.
pub struct Ls {
    #[argh(positional)]
    /// directory to list; defaults to the working directory.
    pub path: Option<String>,
}

impl BuiltinCommand for Ls {
    fn name() -> &'static str {
        "ls"
    }

    fn execute(
        self,
        _stdin: Option<&mut dyn Read>,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<()> {
        let shown = self.path.unwrap_or_else(|| ".".to_string());
        let entries =
            fs::read_dir(env.resolve(&shown)).map_err(|e| ShellError::filesystem("ls", &shown, e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(ShellError::io("ls"))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') {
                names.push(name);
            }
        }

        if !names.is_empty() {
            writeln!(stdout, "{}", names.join("\t")).map_err(ShellError::io("ls"))?;
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// Print files (or the input when none are given) line by line.
pub struct Cat {
    #[argh(positional, greedy)]
    /// files to concatenate.
    pub files: Vec<String>,
}

impl BuiltinCommand for Cat {
    fn name() -> &'static str {
        "cat"
    }

    fn execute(
        self,
        stdin: Option<&mut dyn Read>,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<()> {
        if self.files.is_empty() {
            let input = require_input("cat", stdin)?;
            return write_lines("cat", stdout, &read_lines("cat", input)?);
        }
        for fname in &self.files {
            let mut f = open_file("cat", env, fname)?;
            write_lines("cat", stdout, &read_lines("cat", &mut f)?)?;
        }
        Ok(())
    }
}

/// Write the arguments to standard output, separated by spaces, then a newline.
///
/// Takes no flags, so it bypasses `argh`: `echo -n` prints `-n`.
pub struct Echo;

impl Application for Echo {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn run(
        &self,
        args: &[String],
        _stdin: Option<&mut dyn Read>,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<()> {
        writeln!(stdout, "{}", args.join(" ")).map_err(ShellError::io("echo"))
    }
}

/// Lines of the optional file, or of the input.
fn file_or_input_lines(
    app: &'static str,
    file: Option<&str>,
    stdin: Option<&mut dyn Read>,
    env: &Environment,
) -> Result<Vec<String>> {
    match file {
        Some(path) => read_lines(app, &mut open_file(app, env, path)?),
        None => read_lines(app, require_input(app, stdin)?),
    }
}

fn check_line_count(app: &'static str, lines: usize) -> Result<()> {
    if lines == 0 {
        return Err(ShellError::argument(app, "illegal line count -- 0"));
    }
    Ok(())
}

#[derive(FromArgs)]
/// Print the first lines of a file or of the input.
pub struct Head {
    #[argh(option, short = 'n', default = "10")]
    /// number of lines to print.
    pub lines: usize,

    #[argh(positional)]
    /// file to read; the input is used when omitted.
    pub file: Option<String>,
}

impl BuiltinCommand for Head {
    fn name() -> &'static str {
        "head"
    }

    fn execute(
        self,
        stdin: Option<&mut dyn Read>,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<()> {
        check_line_count("head", self.lines)?;
        let lines = file_or_input_lines("head", self.file.as_deref(), stdin, env)?;
        write_lines("head", stdout, lines.iter().take(self.lines))
    }
}

#[derive(FromArgs)]
/// Print the last lines of a file or of the input.
pub struct Tail {
    #[argh(option, short = 'n', default = "10")]
    /// number of lines to print.
    pub lines: usize,

    #[argh(positional)]
    /// file to read; the input is used when omitted.
    pub file: Option<String>,
}

impl BuiltinCommand for Tail {
    fn name() -> &'static str {
        "tail"
    }

    fn execute(
        self,
        stdin: Option<&mut dyn Read>,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<()> {
        check_line_count("tail", self.lines)?;
        let lines = file_or_input_lines("tail", self.file.as_deref(), stdin, env)?;
        let skip = lines.len().saturating_sub(self.lines);
        write_lines("tail", stdout, lines.iter().skip(skip))
    }
}

#[derive(FromArgs)]
/// print lines matching a pattern
pub struct Grep {
    #[argh(positional)]
    /// the pattern to search for (a regular expression)
    pub pattern: String,

    #[argh(positional, greedy)]
    /// files to search. If none provided, reads from the input.
    pub files: Vec<String>,

    #[argh(switch, short = 'w')]
    /// match only whole words (using non-word characters as boundaries)
    pub word_regexp: bool,

    #[argh(switch, short = 'i')]
    /// ignore case distinctions
    pub ignore_case: bool,

    #[argh(option, short = 'A', default = "0")]
    /// print NUM lines of trailing context after matching lines
    pub after_context: usize,
}

impl Grep {
    fn process_source(
        &self,
        lines: &[String],
        stdout: &mut dyn Write,
        file_name: Option<&str>,
        re: &Regex,
    ) -> Result<()> {
        let mut to_print = vec![false; lines.len()];
        for (i, line) in lines.iter().enumerate() {
            if re.is_match(line) {
                let end = (i + self.after_context + 1).min(lines.len());
                to_print[i..end].iter_mut().for_each(|p| *p = true);
            }
        }

        let prefix = file_name
            .map(|name| format!("{}:", name))
            .unwrap_or_default();
        let mut last_printed: Option<usize> = None;

        for (i, line) in lines.iter().enumerate() {
            if !to_print[i] {
                continue;
            }
            if self.after_context > 0 && last_printed.is_some_and(|last| i > last + 1) {
                stdout.write_all(b"--\n").map_err(ShellError::io("grep"))?;
            }
            writeln!(stdout, "{}{}", prefix, line).map_err(ShellError::io("grep"))?;
            last_printed = Some(i);
        }
        Ok(())
    }
}

impl BuiltinCommand for Grep {
    fn name() -> &'static str {
        "grep"
    }

    /// The first positional argument is the regex.
    fn glob_ignore_index(args: &[String]) -> Option<usize> {
        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "-A" | "--after-context" => i += 2,
                arg if arg.starts_with('-') && arg.len() > 1 => i += 1,
                _ => return Some(i),
            }
        }
        None
    }

    fn execute(
        self,
        stdin: Option<&mut dyn Read>,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<()> {
        let pattern = if self.word_regexp {
            format!(r"\b({})\b", self.pattern)
        } else {
            self.pattern.clone()
        };

        let re = RegexBuilder::new(&pattern)
            .case_insensitive(self.ignore_case)
            .build()
            .map_err(|e| ShellError::pattern("grep", e))?;

        if self.files.is_empty() {
            let lines = read_lines("grep", require_input("grep", stdin)?)?;
            return self.process_source(&lines, stdout, None, &re);
        }

        let show_names = self.files.len() > 1;
        for file_name in &self.files {
            let lines = read_lines("grep", &mut open_file("grep", env, file_name)?)?;
            let label = show_names.then_some(file_name.as_str());
            self.process_source(&lines, stdout, label, &re)?;
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// Replace the first (or, with a trailing g, every) regex match on each line.
pub struct Sed {
    #[argh(positional)]
    /// substitution in the form s/REGEX/REPLACEMENT/ or s/REGEX/REPLACEMENT/g; any delimiter works.
    pub expression: String,

    #[argh(positional)]
    /// file to read; the input is used when omitted.
    pub file: Option<String>,
}

/// A parsed `s` command.
struct Substitution {
    regex: Regex,
    replacement: String,
    global: bool,
}

impl Substitution {
    fn parse(expression: &str) -> Result<Self> {
        let invalid = || ShellError::argument("sed", "invalid first argument");

        let mut chars = expression.chars();
        if chars.next() != Some('s') {
            return Err(invalid());
        }
        let delimiter = chars.next().ok_or_else(invalid)?;
        if delimiter.is_alphanumeric() || delimiter.is_whitespace() || delimiter == '\\' {
            return Err(invalid());
        }

        let body = &expression[1 + delimiter.len_utf8()..];
        let parts: Vec<&str> = body.split(delimiter).collect();
        let [regex, replacement, flags] = parts.as_slice() else {
            return Err(invalid());
        };
        if regex.is_empty() || !(flags.is_empty() || *flags == "g") {
            return Err(invalid());
        }

        Ok(Self {
            regex: Regex::new(regex).map_err(|e| ShellError::pattern("sed", e))?,
            replacement: replacement.to_string(),
            global: *flags == "g",
        })
    }

    fn apply(&self, line: &str) -> String {
        if self.global {
            self.regex.replace_all(line, self.replacement.as_str()).into_owned()
        } else {
            self.regex.replace(line, self.replacement.as_str()).into_owned()
        }
    }
}

impl BuiltinCommand for Sed {
    fn name() -> &'static str {
        "sed"
    }

    fn glob_ignore_index(_args: &[String]) -> Option<usize> {
        Some(0)
    }

    fn execute(
        self,
        stdin: Option<&mut dyn Read>,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<()> {
        let substitution = Substitution::parse(&self.expression)?;
        let lines = file_or_input_lines("sed", self.file.as_deref(), stdin, env)?;
        for line in &lines {
            writeln!(stdout, "{}", substitution.apply(line)).map_err(ShellError::io("sed"))?;
        }
        Ok(())
    }
}

/// `find [DIR] -name PATTERN`: recursively print files whose name matches PATTERN.
///
/// Parsed by hand because `-name` is a single-dash long option.
pub struct Find;

impl Find {
    fn search(
        dir: &Path,
        shown: &str,
        pattern: &glob::Pattern,
        stdout: &mut dyn Write,
    ) -> Result<()> {
        let entries = fs::read_dir(dir).map_err(|e| ShellError::filesystem("find", shown, e))?;
        for entry in entries {
            let entry = entry.map_err(ShellError::io("find"))?;
            let file_type = entry.file_type().map_err(ShellError::io("find"))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let path_shown = format!("{}/{}", shown.trim_end_matches('/'), name);
            if file_type.is_file() && pattern.matches(&name) {
                writeln!(stdout, "{}", path_shown).map_err(ShellError::io("find"))?;
            }
            if file_type.is_dir() {
                Self::search(&entry.path(), &path_shown, pattern, stdout)?;
            }
        }
        Ok(())
    }
}

impl Application for Find {
    fn name(&self) -> &'static str {
        "find"
    }

    fn glob_ignore_index(&self, args: &[String]) -> Option<usize> {
        args.len().checked_sub(1)
    }

    fn run(
        &self,
        args: &[String],
        _stdin: Option<&mut dyn Read>,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<()> {
        let (root, flag, pattern) = match args {
            [] | [_] => return Err(ShellError::argument("find", "missing arguments")),
            [flag, pattern] => (".", flag, pattern),
            [root, flag, pattern] => (root.as_str(), flag, pattern),
            _ => return Err(ShellError::argument("find", "too many arguments")),
        };
        if flag != "-name" {
            return Err(ShellError::argument("find", format!("invalid argument {}", flag)));
        }

        let root_dir = env.resolve(root);
        if !root_dir.is_dir() {
            return Err(ShellError::not_found("find", format!("could not open {}", root)));
        }
        let pattern = glob::Pattern::new(pattern).map_err(|e| ShellError::pattern("find", e))?;
        Self::search(&root_dir, root, &pattern, stdout)
    }
}

#[derive(FromArgs)]
/// Print previously entered command lines, numbered from the first one.
pub struct History {
    #[argh(positional)]
    /// how many of the most recent lines to print; all of them (up to 500) when omitted.
    pub count: Option<i64>,
}

impl BuiltinCommand for History {
    fn name() -> &'static str {
        "history"
    }

    fn execute(
        self,
        _stdin: Option<&mut dyn Read>,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<()> {
        let count = match self.count {
            Some(n) if n < 0 => return Err(ShellError::argument("history", "invalid option")),
            Some(n) => Some(usize::try_from(n).unwrap_or(usize::MAX)),
            None => None,
        };
        for (index, line) in env.recent_history(count) {
            writeln!(stdout, "{}. {}", index, line).map_err(ShellError::io("history"))?;
        }
        Ok(())
    }
}

/// `wc [-l] [-w] [-m] [FILE...]`: totals of lines, words and characters.
///
/// Parsed by hand so that flags can be combined (`-lw`).
pub struct Wc;

#[derive(Debug, Default, PartialEq, Eq)]
struct Counts {
    lines: usize,
    words: usize,
    chars: usize,
}

impl Counts {
    fn add(&mut self, text: &str) {
        self.lines += text.matches('\n').count();
        self.words += text.split_whitespace().count();
        self.chars += text.chars().count();
    }
}

fn is_wc_flag(arg: &str) -> bool {
    arg.len() > 1 && arg.starts_with('-') && arg[1..].chars().all(|c| "lwm".contains(c))
}

impl Application for Wc {
    fn name(&self) -> &'static str {
        "wc"
    }

    fn run(
        &self,
        args: &[String],
        stdin: Option<&mut dyn Read>,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<()> {
        let (flags, files): (Vec<&String>, Vec<&String>) =
            args.iter().partition(|arg| is_wc_flag(arg));
        let selected = |c: char| flags.iter().any(|f| f.contains(c));

        let mut counts = Counts::default();
        if files.is_empty() {
            let mut text = String::new();
            require_input("wc", stdin)?
                .read_to_string(&mut text)
                .map_err(ShellError::io("wc"))?;
            counts.add(&text);
        }
        for file in &files {
            let mut text = String::new();
            open_file("wc", env, file)?
                .read_to_string(&mut text)
                .map_err(ShellError::io("wc"))?;
            counts.add(&text);
        }

        let mut fields = Vec::new();
        if flags.is_empty() || selected('l') {
            fields.push(counts.lines.to_string());
        }
        if flags.is_empty() || selected('w') {
            fields.push(counts.words.to_string());
        }
        if flags.is_empty() || selected('m') {
            fields.push(counts.chars.to_string());
        }
        writeln!(stdout, "{}", fields.join(" ")).map_err(ShellError::io("wc"))
    }
}
