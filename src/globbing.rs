//! Wildcard expansion of call arguments against the real filesystem.
//!
//! Only `*` is special. Each `/`-separated segment containing `*` is matched
//! against the entries of the directory reached so far and forks one branch
//! per match; literal segments are appended as written, whether or not they
//! exist. A branch dies only when a `*` segment matches nothing (or its
//! directory cannot be read). Results keep the shape of the pattern: a
//! relative pattern yields paths relative to the working directory, an
//! absolute one yields absolute paths. Entries come out in directory
//! enumeration order, which is not sorted.
//!
//! Symlink cycles are not detected; a pattern only descends as deep as it has
//! segments, so expansion always terminates.

use glob::{MatchOptions, Pattern};
use log::trace;
use std::fs;
use std::path::{Path, PathBuf};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Expands every argument except the one at `ignore_index`.
///
/// An argument with `*` that matches nothing is kept unchanged.
pub fn expand_arguments(args: &[String], ignore_index: Option<usize>, cwd: &Path) -> Vec<String> {
    let mut expanded = Vec::with_capacity(args.len());
    for (i, arg) in args.iter().enumerate() {
        if Some(i) == ignore_index || !arg.contains('*') {
            expanded.push(arg.clone());
        } else {
            expanded.extend(expand(arg, cwd));
        }
    }
    expanded
}

/// Expands one pattern; returns the pattern itself when nothing matches.
pub fn expand(token: &str, cwd: &Path) -> Vec<String> {
    let mut found = Vec::new();
    match token.strip_prefix('/') {
        Some(rest) => {
            let segments: Vec<&str> = rest.split('/').collect();
            walk(PathBuf::from("/"), String::from("/"), &segments, &mut found);
        }
        None => {
            let segments: Vec<&str> = token.split('/').collect();
            walk(cwd.to_path_buf(), String::new(), &segments, &mut found);
        }
    }
    trace!("glob {:?} -> {:?}", token, found);

    if found.is_empty() {
        vec![token.to_string()]
    } else {
        found
    }
}

/// `current` is the real location, `shown` the same location as the user wrote it.
fn walk(current: PathBuf, shown: String, segments: &[&str], found: &mut Vec<String>) {
    let Some((segment, rest)) = segments.split_first() else {
        found.push(shown);
        return;
    };

    if segment.is_empty() {
        walk(current, shown, rest, found);
        return;
    }

    if !segment.contains('*') {
        let next_shown = join_shown(&shown, segment);
        walk(current.join(segment), next_shown, rest, found);
        return;
    }

    let Some(pattern) = segment_pattern(segment) else {
        return;
    };
    let Ok(entries) = fs::read_dir(&current) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if pattern.matches_with(name, MATCH_OPTIONS) {
            walk(current.join(name), join_shown(&shown, name), rest, found);
        }
    }
}

fn join_shown(shown: &str, segment: &str) -> String {
    if shown.is_empty() {
        segment.to_string()
    } else if shown.ends_with('/') {
        format!("{}{}", shown, segment)
    } else {
        format!("{}/{}", shown, segment)
    }
}

/// Builds a pattern where every character but `*` is literal.
fn segment_pattern(segment: &str) -> Option<Pattern> {
    let escaped = segment
        .split('*')
        .map(Pattern::escape)
        .collect::<Vec<_>>()
        .join("*");
    Pattern::new(&escaped).ok()
}
