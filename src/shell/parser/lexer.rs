use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use crate::shell::error::{Result, ShellError};

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Token {
    Word(String),
    Pipe,
    Redirect(RedirectOp),
    Sequence,
    Background,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RedirectOp {
    Input,  // <
    Output, // >
    Append, // >>
}

impl RedirectOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            RedirectOp::Input => "<",
            RedirectOp::Output => ">",
            RedirectOp::Append => ">>",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(word) => write!(f, "{}", word),
            Token::Pipe => write!(f, "|"),
            Token::Redirect(op) => write!(f, "{}", op.symbol()),
            Token::Sequence => write!(f, ";"),
            Token::Background => write!(f, "&"),
        }
    }
}

const OPERATOR_CHARS: &str = "|<>;&";

/// Splits one input line into tokens.
///
/// The lexer is an iterator: it yields tokens in input order and stops after
/// the end of the line or the first error.
pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
    failed: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.chars().peekable(),
            failed: false,
        }
    }

    pub fn next_token(&mut self) -> Option<Result<Token>> {
        self.skip_whitespace();

        let c = self.peek_char()?;
        let token = match c {
            '|' => {
                self.read_char();
                Token::Pipe
            }
            ';' => {
                self.read_char();
                Token::Sequence
            }
            '&' => {
                self.read_char();
                Token::Background
            }
            '<' => {
                self.read_char();
                Token::Redirect(RedirectOp::Input)
            }
            '>' => {
                self.read_char();
                if self.peek_char() == Some('>') {
                    self.read_char();
                    Token::Redirect(RedirectOp::Append)
                } else {
                    Token::Redirect(RedirectOp::Output)
                }
            }
            _ => return Some(self.read_word()),
        };
        Some(Ok(token))
    }

    fn read_char(&mut self) -> Option<char> {
        self.input.next()
    }

    fn peek_char(&mut self) -> Option<char> {
        self.input.peek().copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if !c.is_whitespace() {
                break;
            }
            self.read_char();
        }
    }

    // Quoted and unquoted spans glue together until whitespace or an operator.
    fn read_word(&mut self) -> Result<Token> {
        let mut word = String::new();

        while let Some(c) = self.peek_char() {
            match c {
                c if c.is_whitespace() || OPERATOR_CHARS.contains(c) => break,
                '"' => {
                    self.read_char();
                    self.read_double_quoted(&mut word)?;
                }
                '\'' => {
                    self.read_char();
                    self.read_single_quoted(&mut word)?;
                }
                '\\' => {
                    self.read_char();
                    // a trailing backslash is kept as is
                    word.push(self.read_char().unwrap_or('\\'));
                }
                c => {
                    self.read_char();
                    word.push(c);
                }
            }
        }

        Ok(Token::Word(word))
    }

    fn read_single_quoted(&mut self, word: &mut String) -> Result<()> {
        while let Some(c) = self.read_char() {
            if c == '\'' {
                return Ok(());
            }
            word.push(c);
        }
        Err(ShellError::syntax("unterminated quote `'`"))
    }

    fn read_double_quoted(&mut self, word: &mut String) -> Result<()> {
        while let Some(c) = self.read_char() {
            match c {
                '"' => return Ok(()),
                '\\' => match self.read_char() {
                    Some('n') => word.push('\n'),
                    Some('t') => word.push('\t'),
                    Some(escaped) => word.push(escaped),
                    None => break,
                },
                c => word.push(c),
            }
        }
        Err(ShellError::syntax("unterminated quote `\"`"))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let token = self.next_token();
        if matches!(token, Some(Err(_))) {
            self.failed = true;
        }
        token
    }
}

pub fn tokenize(line: &str) -> Result<Vec<Token>> {
    Lexer::new(line).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn word(s: &str) -> Token {
        Token::Word(s.to_string())
    }

    fn words(line: &str) -> Vec<String> {
        tokenize(line)
            .unwrap()
            .into_iter()
            .map(|token| match token {
                Token::Word(w) => w,
                other => panic!("unexpected operator {}", other),
            })
            .collect()
    }

    #[test]
    fn test_simple_command() {
        let mut lexer = Lexer::new("ls -l");
        assert_eq!(lexer.next().unwrap().unwrap(), word("ls"));
        assert_eq!(lexer.next().unwrap().unwrap(), word("-l"));
        assert!(lexer.next().is_none());
        assert!(lexer.next().is_none());
    }

    #[test]
    fn test_pipe() {
        assert_eq!(
            tokenize("ls | grep foo").unwrap(),
            vec![word("ls"), Token::Pipe, word("grep"), word("foo")]
        );
    }

    #[test]
    fn test_redirections() {
        assert_eq!(
            tokenize("sort<in.txt >out.txt>>log").unwrap(),
            vec![
                word("sort"),
                Token::Redirect(RedirectOp::Input),
                word("in.txt"),
                Token::Redirect(RedirectOp::Output),
                word("out.txt"),
                Token::Redirect(RedirectOp::Append),
                word("log"),
            ]
        );
    }

    #[test]
    fn test_operators_end_words() {
        assert_eq!(
            tokenize("a;b&c|d").unwrap(),
            vec![
                word("a"),
                Token::Sequence,
                word("b"),
                Token::Background,
                word("c"),
                Token::Pipe,
                word("d"),
            ]
        );
    }

    #[test]
    fn test_quoted_strings() {
        assert_eq!(words(r#"a "b c" d"#), vec!["a", "b c", "d"]);
        assert_eq!(words(r#"echo "hello world" 'foo bar'"#), vec!["echo", "hello world", "foo bar"]);
    }

    #[test]
    fn test_quotes_suppress_operators() {
        assert_eq!(words(r#"echo "a | b; c > d &""#), vec!["echo", "a | b; c > d &"]);
        assert_eq!(words("echo 'x>>y'"), vec!["echo", "x>>y"]);
    }

    #[test]
    fn test_adjacent_spans_concatenate() {
        assert_eq!(words(r#"foo"bar baz""#), vec!["foobar baz"]);
        assert_eq!(words(r#"'a'"b"c"#), vec!["abc"]);
        assert_eq!(words(r#"echo """#), vec!["echo", ""]);
    }

    #[test]
    fn test_escapes() {
        assert_eq!(words(r#""1\n2\t3""#), vec!["1\n2\t3"]);
        assert_eq!(words(r#""say \"hi\"""#), vec![r#"say "hi""#]);
        assert_eq!(words(r#"'no\nescape'"#), vec![r"no\nescape"]);
        assert_eq!(words(r"a\ b c\;"), vec!["a b", "c;"]);
    }

    #[test]
    fn test_unterminated_quote() {
        assert!(matches!(tokenize("echo \"oops"), Err(ShellError::Syntax(_))));
        assert!(matches!(tokenize("echo 'oops"), Err(ShellError::Syntax(_))));

        let mut lexer = Lexer::new("a 'b");
        assert_eq!(lexer.next().unwrap().unwrap(), word("a"));
        assert!(lexer.next().unwrap().is_err());
        assert!(lexer.next().is_none());
    }

    #[test]
    fn test_unquoted_words_round_trip() {
        for line in ["echo one two three", "ls -la /tmp", "a", "x1 y_2 z-3 w.4"] {
            assert_eq!(words(line).join(" "), line);
        }
    }

    #[test]
    fn test_blank_line() {
        assert!(tokenize("   \t ").unwrap().is_empty());
    }
}
