use std::io;
use thiserror::Error;

/// Every failure the interpreter can report.
///
/// The `Display` form is the exact line written to the error channel, always
/// prefixed with the name of the component that produced it.
#[derive(Debug, Error)]
pub enum ShellError {
    /// Unbalanced quoting in a command line or a call.
    #[error("parser: {0}")]
    Parse(String),

    /// Wrong number or shape of arguments for an application.
    #[error("{app}: {message}")]
    Argument { app: &'static str, message: String },

    /// The first word of a call does not name a registered application.
    #[error("{0}: unknown application")]
    UnknownApplication(String),

    /// More than one `<` or `>` in a single call.
    #[error("redirection: {0}")]
    Redirection(String),

    /// Missing file, or a file where a directory was expected (and vice versa).
    #[error("{app}: {message}")]
    Filesystem { app: &'static str, message: String },

    /// Malformed regular expression or glob.
    #[error("{app}: {message}")]
    Pattern { app: &'static str, message: String },

    /// Reading input or writing output failed.
    #[error("{app}: {source}")]
    Io {
        app: &'static str,
        #[source]
        source: io::Error,
    },

    /// Command substitution nested deeper than the configured limit.
    #[error("substitution: nesting deeper than {0} levels")]
    SubstitutionDepth(usize),
}

/// Convenient alias used across the crate.
pub type Result<T, E = ShellError> = std::result::Result<T, E>;

impl ShellError {
    pub fn argument(app: &'static str, message: impl Into<String>) -> Self {
        Self::Argument {
            app,
            message: message.into(),
        }
    }

    /// Filesystem failure on `path`, keeping the OS description.
    pub fn filesystem(app: &'static str, path: &str, err: io::Error) -> Self {
        Self::Filesystem {
            app,
            message: format!("{}: {}", path, err),
        }
    }

    pub fn not_found(app: &'static str, message: impl Into<String>) -> Self {
        Self::Filesystem {
            app,
            message: message.into(),
        }
    }

    pub fn pattern(app: &'static str, message: impl ToString) -> Self {
        Self::Pattern {
            app,
            message: message.to_string(),
        }
    }

    /// Adapter for `map_err` on plain I/O results inside an application.
    pub fn io(app: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::Io { app, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_prefixed_by_component() {
        assert_eq!(
            ShellError::UnknownApplication("b".into()).to_string(),
            "b: unknown application"
        );
        assert_eq!(
            ShellError::argument("cd", "too many arguments").to_string(),
            "cd: too many arguments"
        );
        assert_eq!(
            ShellError::Redirection("too many files for input redirection".into()).to_string(),
            "redirection: too many files for input redirection"
        );
    }

    #[test]
    fn filesystem_error_keeps_path_and_cause() {
        let err = ShellError::filesystem(
            "cat",
            "missing.txt",
            io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        );
        assert_eq!(err.to_string(), "cat: missing.txt: No such file or directory");
    }
}
