use std::env as stdenv;
use std::fs;
use std::path::{Path, PathBuf};

/// Maximum number of entries `history` will ever print.
pub const HISTORY_PRINT_LIMIT: usize = 500;

/// Mutable state shared by every application invoked from one interpreter.
///
/// The environment contains:
/// - `current_dir`: the canonical working directory all relative paths resolve against.
/// - `home`: where `cd` goes without an argument, captured at start-up.
/// - `history`: every command line accepted by the interactive loop, oldest first.
///
/// Nothing here touches the process working directory, so several interpreters
/// can live side by side (tests rely on that).
#[derive(Debug, Clone)]
pub struct Environment {
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
    /// Target of a bare `cd`.
    pub home: Option<PathBuf>,
    history: Vec<String>,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    ///
    /// `current_dir` comes from `std::env::current_dir()` (canonicalised when
    /// possible) and `home` from the `HOME` variable.
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        let current_dir = fs::canonicalize(&current_dir).unwrap_or(current_dir);
        Self {
            current_dir,
            home: stdenv::var_os("HOME").map(PathBuf::from),
            history: Vec::new(),
        }
    }

    /// An environment rooted at `dir`, with no home and empty history.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let current_dir = fs::canonicalize(&dir).unwrap_or(dir);
        Self {
            current_dir,
            home: None,
            history: Vec::new(),
        }
    }

    /// Resolve `path` against the working directory unless it is absolute.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.current_dir.join(path)
        }
    }

    pub fn push_history(&mut self, line: impl Into<String>) {
        self.history.push(line.into());
    }

    /// Forget every recorded line.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// The last `count` entries (all of them when `None`), capped at
    /// [`HISTORY_PRINT_LIMIT`], paired with their 1-based position.
    pub fn recent_history(&self, count: Option<usize>) -> impl Iterator<Item = (usize, &str)> {
        let wanted = count
            .unwrap_or(self.history.len())
            .min(self.history.len())
            .min(HISTORY_PRINT_LIMIT);
        let start = self.history.len() - wanted;
        self.history[start..]
            .iter()
            .enumerate()
            .map(move |(i, line)| (start + i + 1, line.as_str()))
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_and_absolute() {
        let env = Environment {
            current_dir: PathBuf::from("/work"),
            home: None,
            history: Vec::new(),
        };
        assert_eq!(env.resolve("a/b"), PathBuf::from("/work/a/b"));
        assert_eq!(env.resolve("/etc"), PathBuf::from("/etc"));
    }

    #[test]
    fn test_recent_history_numbers_by_true_position() {
        let mut env = Environment::at("/");
        for i in 1..=5 {
            env.push_history(format!("cmd {}", i));
        }
        let last_two: Vec<_> = env.recent_history(Some(2)).collect();
        assert_eq!(last_two, vec![(4, "cmd 4"), (5, "cmd 5")]);

        let all: Vec<_> = env.recent_history(Some(100)).collect();
        assert_eq!(all.len(), 5);
        assert_eq!(all[0], (1, "cmd 1"));
    }

    #[test]
    fn test_recent_history_is_capped() {
        let mut env = Environment::at("/");
        for i in 0..(HISTORY_PRINT_LIMIT + 20) {
            env.push_history(i.to_string());
        }
        let shown: Vec<_> = env.recent_history(None).collect();
        assert_eq!(shown.len(), HISTORY_PRINT_LIMIT);
        assert_eq!(shown[0].0, 21);
        assert_eq!(shown.last().map(|e| e.0), Some(HISTORY_PRINT_LIMIT + 20));
    }

    #[test]
    fn test_clear_history() {
        let mut env = Environment::at("/");
        env.push_history("echo a");
        env.clear_history();
        assert!(env.history().is_empty());
    }
}
