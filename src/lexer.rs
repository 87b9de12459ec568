//! Lexical analysis of a single call: quoting, back-quote regions and the
//! redirection markers.
//!
//! The lexer does not run anything. Back-quoted text is returned as a
//! [`WordPart::CmdSubst`] and the interpreter substitutes it afterwards, so this
//! module stays a pure function of its input.

use crate::error::{Result, ShellError};

/// A part of a word: literal text or a pending command substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordPart {
    /// Literal text that requires no further processing.
    Literal(String),
    /// Command substitution written as `` `...` ``. Contains the text between the back-quotes.
    CmdSubst(String),
}

/// Represents a token resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A word token; adjacent quoted and unquoted segments are already joined.
    Word(Vec<WordPart>),
    /// Unquoted `<`.
    RedirectLeft,
    /// Unquoted `>`.
    RedirectRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    current_word: Vec<WordPart>,
    buffer: String,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            current_word: Vec::new(),
            buffer: String::new(),
        }
    }

    /// Runs the machine over the whole input.
    ///
    /// Fails only when a quote or back-quote is left open.
    fn make_tokens(&mut self) -> Result<Vec<Token>> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start => self.handle_start(ch, &mut out)?,
                LexingState::ReadingWord => self.handle_word(ch, &mut out)?,
                LexingState::ReadingSingleQuote => self.handle_single_quote(ch),
                LexingState::ReadingDoubleQuote => self.handle_double_quote(ch)?,
            }
        }

        match self.state {
            LexingState::ReadingSingleQuote => return Err(unterminated('\'')),
            LexingState::ReadingDoubleQuote => return Err(unterminated('"')),
            LexingState::ReadingWord => self.finish_word(&mut out),
            LexingState::Start => {}
        }

        Ok(out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn handle_start(&mut self, ch: char, out: &mut Vec<Token>) -> Result<()> {
        match ch {
            c if c.is_whitespace() => {}
            '<' => out.push(Token::RedirectLeft),
            '>' => out.push(Token::RedirectRight),
            '\'' => self.state = LexingState::ReadingSingleQuote,
            '"' => self.state = LexingState::ReadingDoubleQuote,
            '`' => {
                let nested = self.collect_backquoted()?;
                self.current_word.push(WordPart::CmdSubst(nested));
                self.state = LexingState::ReadingWord;
            }
            c => {
                self.buffer.push(c);
                self.state = LexingState::ReadingWord;
            }
        }
        Ok(())
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<Token>) -> Result<()> {
        match ch {
            c if c.is_whitespace() => {
                self.finish_word(out);
                self.state = LexingState::Start;
            }
            '<' | '>' => {
                self.finish_word(out);
                out.push(if ch == '<' {
                    Token::RedirectLeft
                } else {
                    Token::RedirectRight
                });
                self.state = LexingState::Start;
            }
            '\'' => self.state = LexingState::ReadingSingleQuote,
            '"' => self.state = LexingState::ReadingDoubleQuote,
            '`' => {
                self.finalize_current_word_part();
                let nested = self.collect_backquoted()?;
                self.current_word.push(WordPart::CmdSubst(nested));
            }
            c => self.buffer.push(c),
        }
        Ok(())
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::ReadingWord,
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) -> Result<()> {
        match ch {
            '"' => self.state = LexingState::ReadingWord,
            '`' => {
                self.finalize_current_word_part();
                let nested = self.collect_backquoted()?;
                self.current_word.push(WordPart::CmdSubst(nested));
            }
            c => self.buffer.push(c),
        }
        Ok(())
    }

    /// Collects everything up to the closing back-quote, other quotes included.
    fn collect_backquoted(&mut self) -> Result<String> {
        let mut s = String::new();
        while let Some(ch) = self.read_char() {
            if ch == '`' {
                return Ok(s);
            }
            s.push(ch);
        }
        Err(unterminated('`'))
    }

    fn finalize_current_word_part(&mut self) {
        if !self.buffer.is_empty() {
            self.current_word
                .push(WordPart::Literal(std::mem::take(&mut self.buffer)));
        }
    }

    /// Emits the word being built. A word made only of empty quotes is still a word.
    fn finish_word(&mut self, out: &mut Vec<Token>) {
        self.finalize_current_word_part();
        if self.current_word.is_empty() {
            self.current_word.push(WordPart::Literal(String::new()));
        }
        out.push(Token::Word(std::mem::take(&mut self.current_word)));
    }
}

fn unterminated(quote: char) -> ShellError {
    ShellError::Parse(format!("unterminated {} quote", quote))
}

/// Splits the raw text of one call into tokens.
///
/// # Returns
/// The tokens in input order, or [`ShellError::Parse`] if a quote is left open.
pub fn split_into_tokens(line: &str) -> Result<Vec<Token>> {
    let mut lexer = LexingFSM::new(line);
    lexer.make_tokens()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(s: &str) -> Token {
        Token::Word(vec![WordPart::Literal(s.to_string())])
    }

    #[test]
    fn test_unquoted_words_split_on_whitespace() {
        let tokens = split_into_tokens("   a    bc def    ").unwrap();
        assert_eq!(tokens, vec![word("a"), word("bc"), word("def")]);
    }

    #[test]
    fn test_adjacent_segments_join() {
        let tokens = split_into_tokens("a'bc'd \"e f\"g").unwrap();
        assert_eq!(tokens, vec![word("abcd"), word("e fg")]);
    }

    #[test]
    fn test_single_quotes_keep_everything() {
        let tokens = split_into_tokens("  a a'bc `echo def`'  ").unwrap();
        assert_eq!(tokens, vec![word("a"), word("abc `echo def`")]);

        let tokens = split_into_tokens("echo '; | < >'").unwrap();
        assert_eq!(tokens, vec![word("echo"), word("; | < >")]);
    }

    #[test]
    fn test_backquote_inside_double_quotes() {
        let tokens = split_into_tokens("\"ghi `echo jkl`\"").unwrap();
        assert_eq!(
            tokens,
            vec![Token::Word(vec![
                WordPart::Literal("ghi ".to_string()),
                WordPart::CmdSubst("echo jkl".to_string()),
            ])]
        );
    }

    #[test]
    fn test_backquote_joins_adjacent_text() {
        let tokens = split_into_tokens("b`b`c").unwrap();
        assert_eq!(
            tokens,
            vec![Token::Word(vec![
                WordPart::Literal("b".to_string()),
                WordPart::CmdSubst("b".to_string()),
                WordPart::Literal("c".to_string()),
            ])]
        );
    }

    #[test]
    fn test_empty_backquote_and_empty_quotes_are_words() {
        let tokens = split_into_tokens("a `` ''").unwrap();
        assert_eq!(
            tokens,
            vec![
                word("a"),
                Token::Word(vec![WordPart::CmdSubst(String::new())]),
                word(""),
            ]
        );
    }

    #[test]
    fn test_redirection_markers_stand_alone() {
        let tokens = split_into_tokens("a<b >c").unwrap();
        assert_eq!(
            tokens,
            vec![
                word("a"),
                Token::RedirectLeft,
                word("b"),
                Token::RedirectRight,
                word("c"),
            ]
        );
    }

    #[test]
    fn test_unterminated_quotes_fail() {
        assert!(matches!(split_into_tokens("echo 'abc"), Err(ShellError::Parse(_))));
        assert!(matches!(split_into_tokens("echo \"abc"), Err(ShellError::Parse(_))));
        assert!(matches!(split_into_tokens("echo `abc"), Err(ShellError::Parse(_))));
    }
}
