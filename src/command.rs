use crate::env::Environment;
use crate::error::{Result, ShellError};
use log::debug;
use std::collections::HashMap;
use std::io::{Read, Write};

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

/// Prefix that turns a call into its unsafe variant (`_ls` is an unsafe `ls`).
pub const UNSAFE_PREFIX: char = '_';

/// Object-safe trait for anything the dispatcher can run.
///
/// Implemented by the builtins, either directly or through [`Factory`] for
/// those whose flags are parsed with `argh`.
pub trait Application {
    /// Name the application is registered under, lower case.
    fn name(&self) -> &'static str;

    /// Argument that must not be glob-expanded because it is a pattern of its
    /// own (a regex or a `-name` glob).
    fn glob_ignore_index(&self, _args: &[String]) -> Option<usize> {
        None
    }

    /// Executes the application.
    ///
    /// `stdin` is `None` when nothing feeds the call (top level, no `<`).
    fn run(
        &self,
        args: &[String],
        stdin: Option<&mut dyn Read>,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<()>;
}

/// Stateless adapter that makes a `T: BuiltinCommand` an [`Application`].
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// How a failing application affects the rest of the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Errors propagate and abort the enclosing sequence or pipe.
    Safe,
    /// Errors are written to the error channel and swallowed.
    Unsafe,
}

impl Mode {
    /// Splits the unsafe marker off a lower-cased command name.
    pub fn from_command_name(name: &str) -> (Mode, String) {
        let name = name.to_lowercase();
        match name.strip_prefix(UNSAFE_PREFIX) {
            Some(stripped) => (Mode::Unsafe, stripped.to_string()),
            None => (Mode::Safe, name),
        }
    }

    /// Applies the failure policy to an application's result.
    pub fn apply(self, result: Result<()>, stderr: &mut dyn Write) -> Result<()> {
        match (self, result) {
            (Mode::Unsafe, Err(e)) => {
                debug!("unsafe call failed, reporting: {}", e);
                writeln!(stderr, "{}", e).map_err(ShellError::io("unsafe"))?;
                Ok(())
            }
            (_, result) => result,
        }
    }
}

/// Name → application map, filled once and only read afterwards.
#[derive(Default)]
pub struct Registry {
    apps: HashMap<&'static str, Box<dyn Application>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `app` under its own name, replacing any previous entry.
    pub fn register(&mut self, app: Box<dyn Application>) {
        self.apps.insert(app.name(), app);
    }

    pub fn with(mut self, app: Box<dyn Application>) -> Self {
        self.register(app);
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn Application> {
        self.apps.get(name).map(|app| app.as_ref())
    }

    /// Resolves a raw command word to its application and execution mode.
    pub fn resolve(&self, command: &str) -> Result<(&dyn Application, Mode)> {
        let (mode, name) = Mode::from_command_name(command);
        match self.get(&name) {
            Some(app) => Ok((app, mode)),
            None => Err(ShellError::UnknownApplication(name)),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.apps.keys().copied()
    }
}

impl FromIterator<Box<dyn Application>> for Registry {
    fn from_iter<I: IntoIterator<Item = Box<dyn Application>>>(iter: I) -> Self {
        let mut registry = Registry::new();
        for app in iter {
            registry.register(app);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fail;

    impl Application for Fail {
        fn name(&self) -> &'static str {
            "fail"
        }

        fn run(
            &self,
            _args: &[String],
            _stdin: Option<&mut dyn Read>,
            _stdout: &mut dyn Write,
            _env: &mut Environment,
        ) -> Result<()> {
            Err(ShellError::argument("fail", "always fails"))
        }
    }

    #[test]
    fn test_mode_from_command_name() {
        assert_eq!(Mode::from_command_name("LS"), (Mode::Safe, "ls".to_string()));
        assert_eq!(Mode::from_command_name("_Ls"), (Mode::Unsafe, "ls".to_string()));
    }

    #[test]
    fn test_resolve_unknown_reports_stripped_name() {
        let registry = Registry::new().with(Box::new(Fail));
        let err = registry.resolve("_nope").err().unwrap();
        assert_eq!(err.to_string(), "nope: unknown application");
        assert!(registry.resolve("FAIL").is_ok());
    }

    #[test]
    fn test_unsafe_mode_swallows_and_reports() {
        let mut stderr = Vec::new();
        let failing = Err(ShellError::argument("fail", "always fails"));
        assert!(Mode::Unsafe.apply(failing, &mut stderr).is_ok());
        assert_eq!(String::from_utf8(stderr).unwrap(), "fail: always fails\n");
    }

    #[test]
    fn test_safe_mode_propagates() {
        let mut stderr = Vec::new();
        let failing = Err(ShellError::argument("fail", "always fails"));
        assert!(Mode::Safe.apply(failing, &mut stderr).is_err());
        assert!(stderr.is_empty());
    }
}
