use minish::lexer::{Token, WordPart, split_into_tokens};
use minish::parser::construct_ast;
use minish::{Environment, ExitCode, Interpreter, MemWriter, Node};
use std::fs::{self, File};
use tempfile::TempDir;

struct Session {
    _dir: TempDir,
    sh: Interpreter,
    stderr: MemWriter,
}

impl Session {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("Soft"), "This is a test\nThis is a test of another test\n\n").unwrap();
        fs::create_dir_all(root.join("Other/Empty")).unwrap();
        File::create(root.join("Other/Oth1")).unwrap();
        File::create(root.join("Other/Oth2")).unwrap();

        let stderr = MemWriter::new();
        let sh = Interpreter::default()
            .with_environment(Environment::at(root))
            .with_stderr(Box::new(stderr.clone()));
        Session {
            _dir: dir,
            sh,
            stderr,
        }
    }

    fn eval(&mut self, line: &str) -> (ExitCode, String) {
        let mut out = Vec::new();
        let code = self.sh.eval(line, &mut out);
        (code, String::from_utf8(out).unwrap())
    }
}

fn word(s: &str) -> Token {
    Token::Word(vec![WordPart::Literal(s.to_string())])
}

#[test]
fn grammar_folds_to_the_left() {
    let expected = Node::sequence(
        Node::sequence(
            Node::pipe(Node::pipe(Node::call("a"), Node::call("b")), Node::call("c")),
            Node::call("d"),
        ),
        Node::call("e"),
    );
    assert_eq!(construct_ast("a|b|c;d;e").unwrap(), expected);
}

#[test]
fn single_quotes_hide_backquotes() {
    assert_eq!(
        split_into_tokens("a 'bc `echo def`'").unwrap(),
        vec![word("a"), word("bc `echo def`")]
    );
}

#[test]
fn substitution_becomes_a_word() {
    let mut s = Session::new();
    assert_eq!(s.eval("echo a `echo mno`"), (0, "a mno\n".to_string()));
    assert_eq!(s.eval("echo a ``"), (0, "a \n".to_string()));
}

#[test]
fn safe_failure_aborts_the_sequence() {
    let mut s = Session::new();
    let (code, out) = s.eval("echo hello; ls InvalidPath; echo world");
    assert_eq!(code, 1);
    assert_eq!(out, "hello\n");
    assert!(s.stderr.contents().starts_with("ls: InvalidPath: "));
}

#[test]
fn unsafe_failure_is_reported_and_skipped() {
    let mut s = Session::new();
    let (code, out) = s.eval("echo hello; _ls InvalidPath; echo world");
    assert_eq!(code, 0);
    assert_eq!(out, "hello\nworld\n");
    assert_eq!(s.stderr.contents().lines().count(), 1);
}

#[test]
fn failed_substitution_is_reported_locally() {
    let mut s = Session::new();
    let (code, out) = s.eval("echo a `echo a`; echo b`b`");
    assert_eq!(code, 0);
    assert_eq!(out, "a a\nb\n");
    assert_eq!(s.stderr.contents(), "b: unknown application\n");
}

#[test]
fn names_are_case_insensitive() {
    let mut s = Session::new();
    assert_eq!(s.eval("ECHO hi"), (0, "hi\n".to_string()));
}

#[test]
fn globs_expand_relative_to_working_directory() {
    let mut s = Session::new();
    assert_eq!(s.eval("cd Other").0, 0);
    let (_, out) = s.eval("echo Oth*");
    let mut names: Vec<&str> = out.split_whitespace().collect();
    names.sort();
    assert_eq!(names, vec!["Oth1", "Oth2"]);
    assert_eq!(s.eval("echo Zzz*"), (0, "Zzz*\n".to_string()));
}

#[test]
fn grep_pattern_is_not_globbed() {
    let mut s = Session::new();
    assert_eq!(s.eval("grep 'a*other' Soft"), (0, "This is a test of another test\n".to_string()));
    assert_eq!(s.eval("find Other -name Oth1"), (0, "Other/Oth1\n".to_string()));
}

#[test]
fn input_redirection_replaces_piped_input() {
    let mut s = Session::new();
    let expected = "This is a test\nThis is a test of another test\n\n".to_string();
    assert_eq!(s.eval("cat < Soft"), (0, expected.clone()));
    assert_eq!(s.eval("echo ignored | cat < Soft"), (0, expected));
}

#[test]
fn double_input_redirection_fails_without_output() {
    let mut s = Session::new();
    let (code, out) = s.eval("cat < Soft < Soft");
    assert_eq!((code, out.as_str()), (1, ""));
    assert_eq!(
        s.stderr.contents(),
        "redirection: too many files for input redirection\n"
    );
}

#[test]
fn output_redirection_then_read_back() {
    let mut s = Session::new();
    assert_eq!(s.eval("echo Hello | sed s/Hello/Bye/ > bye.txt"), (0, String::new()));
    assert_eq!(s.eval("cat bye.txt"), (0, "Bye\n".to_string()));
}

#[test]
fn history_sees_recorded_lines() {
    let mut s = Session::new();
    s.sh.env_mut().push_history("echo one");
    s.sh.env_mut().push_history("history");
    assert_eq!(s.eval("history"), (0, "1. echo one\n2. history\n".to_string()));
    assert_eq!(s.eval("history 1"), (0, "2. history\n".to_string()));
}

#[test]
fn head_tail_wc_over_pipes() {
    let mut s = Session::new();
    assert_eq!(s.eval("cat Soft | head -n 1"), (0, "This is a test\n".to_string()));
    assert_eq!(s.eval("tail -n 2 Soft | wc -l"), (0, "2\n".to_string()));
}

#[test]
fn cli_runs_one_line() {
    let stderr = MemWriter::new();
    let mut out = Vec::new();
    let code = minish::cli::run(
        &["minish", "-c", "echo `echo nested`"],
        &mut out,
        Box::new(stderr.clone()),
    );
    assert_eq!(code, 0);
    assert_eq!(out, b"nested\n");
    assert_eq!(stderr.contents(), "");
}

#[test]
fn cli_rejects_extra_arguments() {
    let stderr = MemWriter::new();
    let mut out = Vec::new();
    let code = minish::cli::run(&["minish", "-c", "echo a", "b"], &mut out, Box::new(stderr.clone()));
    assert_eq!(code, minish::cli::USAGE_ERROR);
    assert!(out.is_empty());
}

#[test]
fn substitution_inside_double_quotes_stays_one_word() {
    let mut s = Session::new();
    assert_eq!(s.eval("echo \"x `echo y z`\""), (0, "x y z\n".to_string()));
    assert_eq!(s.eval("wc -w < Soft | cat; echo \"`echo a b`\" | wc -w"), (0, "11\n2\n".to_string()));
}

#[test]
fn dangling_output_marker_is_an_argument() {
    let mut s = Session::new();
    assert_eq!(s.eval("echo a >"), (0, "a >\n".to_string()));
    assert_eq!(s.stderr.contents(), "");
}

#[test]
fn unknown_unsafe_name_aborts_the_sequence() {
    let mut s = Session::new();
    let (code, out) = s.eval("echo a; _nope x; echo b");
    assert_eq!(code, 1);
    assert_eq!(out, "a\n");
    assert_eq!(s.stderr.contents(), "nope: unknown application\n");
}

#[test]
fn repeated_marker_fails_even_without_target() {
    let mut s = Session::new();
    let (code, out) = s.eval("echo a < Soft <");
    assert_eq!((code, out.as_str()), (1, ""));
    assert_eq!(
        s.stderr.contents(),
        "redirection: too many files for input redirection\n"
    );
}
