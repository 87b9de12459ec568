use crate::error::{Result, ShellError};
use std::fmt;

/// Command tree for one command line.
///
/// Calls keep their raw, untokenized text; tokenizing happens only when the
/// call is evaluated, because command substitution inside it must observe the
/// effects of everything evaluated before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// `left ; right`: run `left`, then `right`, unless `left` failed.
    Sequence { left: Box<Node>, right: Box<Node> },

    /// `left | right`: the output of `left` is the input of `right`.
    Pipe { left: Box<Node>, right: Box<Node> },

    /// A single invocation, surrounding whitespace included.
    Call { text: String },
}

impl Node {
    pub fn call(text: impl Into<String>) -> Self {
        Node::Call { text: text.into() }
    }

    pub fn sequence(left: Node, right: Node) -> Self {
        Node::Sequence {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn pipe(left: Node, right: Node) -> Self {
        Node::Pipe {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn outline(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "\t".repeat(depth);
        match self {
            Node::Sequence { left, right } => {
                writeln!(f, "{}Seq Node", indent)?;
                left.outline(f, depth + 1)?;
                right.outline(f, depth + 1)
            }
            Node::Pipe { left, right } => {
                writeln!(f, "{}Pipe Node", indent)?;
                left.outline(f, depth + 1)?;
                right.outline(f, depth + 1)
            }
            Node::Call { text } => writeln!(f, "{}Call node: {}", indent, text),
        }
    }
}

/// Indented outline, one node per line, children one tab deeper.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.outline(f, 0)
    }
}

/// Pieces of a command line at the top nesting level.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LineToken {
    Text(String),
    Semi,
    Pipe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
    Back,
    /// Back-quote region opened inside double quotes.
    DoubleBack,
}

/// Splits at unquoted `;` and `|`. The result always alternates text and
/// separators and starts and ends with text, possibly empty.
fn split_line(line: &str) -> Result<Vec<LineToken>> {
    let mut out = Vec::new();
    let mut text = String::new();
    let mut quote = Quote::None;

    for ch in line.chars() {
        quote = match (quote, ch) {
            (Quote::None, ';') | (Quote::None, '|') => {
                out.push(LineToken::Text(std::mem::take(&mut text)));
                out.push(if ch == ';' {
                    LineToken::Semi
                } else {
                    LineToken::Pipe
                });
                continue;
            }
            (Quote::None, '\'') => Quote::Single,
            (Quote::None, '"') => Quote::Double,
            (Quote::None, '`') => Quote::Back,
            (Quote::Single, '\'') | (Quote::Double, '"') | (Quote::Back, '`') => Quote::None,
            (Quote::Double, '`') => Quote::DoubleBack,
            (Quote::DoubleBack, '`') => Quote::Double,
            (q, _) => q,
        };
        text.push(ch);
    }

    let open = match quote {
        Quote::None => None,
        Quote::Single => Some('\''),
        Quote::Double => Some('"'),
        Quote::Back | Quote::DoubleBack => Some('`'),
    };
    if let Some(q) = open {
        return Err(ShellError::Parse(format!("unterminated {} quote", q)));
    }

    out.push(LineToken::Text(text));
    Ok(out)
}

struct AstBuilder {
    tokens: Vec<LineToken>,
    pos: usize,
}

impl AstBuilder {
    fn from(tokens: Vec<LineToken>) -> Self {
        AstBuilder { tokens, pos: 0 }
    }

    fn build_ast(mut self) -> Result<Node> {
        let ast = self.parse_sequence()?;

        if let Some(token) = self.peek() {
            return Err(ShellError::Parse(format!("unexpected {:?}", token)));
        }

        Ok(ast)
    }

    fn peek(&self) -> Option<&LineToken> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<LineToken> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Parse a sequence: command (';' command)*, folded to the left.
    fn parse_sequence(&mut self) -> Result<Node> {
        let mut node = self.parse_command()?;
        while let Some(LineToken::Semi) = self.peek() {
            self.consume();
            let right = self.parse_command()?;
            node = Node::sequence(node, right);
        }
        Ok(node)
    }

    /// Parse a command: call ('|' call)*, folded to the left.
    fn parse_command(&mut self) -> Result<Node> {
        let mut node = self.parse_call()?;
        while let Some(LineToken::Pipe) = self.peek() {
            self.consume();
            let right = self.parse_call()?;
            node = Node::pipe(node, right);
        }
        Ok(node)
    }

    fn parse_call(&mut self) -> Result<Node> {
        match self.consume() {
            Some(LineToken::Text(text)) => Ok(Node::call(text)),
            Some(token) => Err(ShellError::Parse(format!("unexpected {:?}", token))),
            None => Err(ShellError::Parse("unexpected end of line".to_string())),
        }
    }
}

/// Parses a whole command line into its command tree.
///
/// Only unbalanced quoting is rejected; empty calls (as in `a;` or `a||b`)
/// become calls with blank text.
pub fn construct_ast(line: &str) -> Result<Node> {
    let tokens = split_line(line)?;
    AstBuilder::from(tokens).build_ast()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_call_keeps_raw_text() {
        let line = "a bc'def' \"ghi\" `jkl`";
        assert_eq!(construct_ast(line).unwrap(), Node::call(line));
    }

    #[test]
    fn test_pipe_and_sequence_keep_whitespace() {
        assert_eq!(
            construct_ast("a | b").unwrap(),
            Node::pipe(Node::call("a "), Node::call(" b"))
        );
        assert_eq!(
            construct_ast("a ; b").unwrap(),
            Node::sequence(Node::call("a "), Node::call(" b"))
        );
    }

    #[test]
    fn test_left_associativity() {
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
    fn test_separators_inside_quotes_are_opaque() {
        let line = "echo 'a;b' \"c|d\" `echo e; echo f`";
        assert_eq!(construct_ast(line).unwrap(), Node::call(line));

        let line = "echo \"x `echo \"y;z\"`\"";
        assert_eq!(construct_ast(line).unwrap(), Node::call(line));
    }

    #[test]
    fn test_unbalanced_quotes_fail() {
        assert!(matches!(construct_ast("echo 'a; b"), Err(ShellError::Parse(_))));
        assert!(matches!(construct_ast("echo `a | b"), Err(ShellError::Parse(_))));
        assert!(matches!(construct_ast("echo \"a"), Err(ShellError::Parse(_))));
    }

    #[test]
    fn test_trailing_separator_yields_empty_call() {
        assert_eq!(
            construct_ast("echo a;").unwrap(),
            Node::sequence(Node::call("echo a"), Node::call(""))
        );
    }

    #[test]
    fn test_display_outline() {
        let tree = construct_ast("a|b;c").unwrap();
        assert_eq!(
            tree.to_string(),
            "Seq Node\n\tPipe Node\n\t\tCall node: a\n\t\tCall node: b\n\tCall node: c\n"
        );
    }
}
