use super::{
    position::Position,
    token::{Keyword, Kind, Token},
};
use std::{iter, str};

/// Default line comment character.
pub const COMMENT: char = '#';

#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Starts a comment running to the end of the line.
    pub comment: char,
}

impl Default for Config {
    fn default() -> Self {
        Self { comment: COMMENT }
    }
}

/// Lex the entire source.
/// The final token is always [`Kind::Eof`].
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all, fields(src = %src.as_ref())))]
pub fn tokenize(src: impl AsRef<str>) -> Vec<Token> {
    Lexer::from(src.as_ref()).collect()
}

/// Character source which tracks the position of the next character.
struct Scanner<I: Iterator<Item = char>> {
    iter: iter::Peekable<I>,
    position: Position,
}

impl<I: Iterator<Item = char>> Scanner<I> {
    fn new(chars: I) -> Self {
        Self {
            iter: chars.peekable(),
            position: Position::start(),
        }
    }

    /// Position of the next character.
    fn position(&self) -> Position {
        self.position
    }

    /// Peek at the next character without consuming it.
    fn peek(&mut self) -> Option<char> {
        self.iter.peek().copied()
    }

    /// Consume the next character if it satisfies the predicate.
    fn next_if(&mut self, predicate: impl FnOnce(&char) -> bool) -> Option<char> {
        let ch = self.iter.next_if(predicate)?;
        self.position = self.position.advance(ch);
        Some(ch)
    }

    /// Consume the next character if it is equal to the expected one.
    fn next_if_eq(&mut self, expected: char) -> Option<char> {
        self.next_if(|ch| *ch == expected)
    }
}

impl<I: Iterator<Item = char>> Iterator for Scanner<I> {
    type Item = char;
    fn next(&mut self) -> Option<Self::Item> {
        let ch = self.iter.next()?;
        self.position = self.position.advance(ch);
        Some(ch)
    }
}

/// Lazily converts characters into tokens, one token per call to [`Lexer::next_token`].
pub struct Lexer<I: Iterator<Item = char>> {
    it: Scanner<I>,
    config: Config,

    /// Token already lexed, returned by the following call.
    pending: Option<Token>,

    /// If a token other than a newline has been produced on the current line.
    significant: bool,

    /// If the end of input has been yielded through [`Iterator`].
    complete: bool,
}

impl<I: Iterator<Item = char>> Lexer<I> {
    pub fn new(chars: I) -> Self {
        Self::with_config(chars, Config::default())
    }

    pub fn with_config(chars: I, config: Config) -> Self {
        Self {
            it: Scanner::new(chars),
            config,
            pending: None,
            significant: false,
            complete: false,
        }
    }

    /// Produce the next token.
    /// Once the input is exhausted every call returns an [`Kind::Eof`] token.
    pub fn next_token(&mut self) -> Token {
        let token = match self.pending.take() {
            Some(token) => token,
            None => self.match_next_token(),
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(%token);

        self.significant = !token.is(Kind::Newline);
        token
    }

    /// Skip insignificant characters.
    fn skip(&mut self) {
        let comment = self.config.comment;
        loop {
            match self.it.peek() {
                Some(ch) if ch == comment => {
                    while self.it.next_if(|ch| *ch != '\n').is_some() {}
                }
                Some('\n') if !self.significant => {
                    self.it.next();
                }
                Some(ch) if ch.is_whitespace() && ch != '\n' => {
                    self.it.next();
                }
                _ => break,
            }
        }
    }

    fn next_while(&mut self, predicate: impl Fn(char) -> bool) -> Vec<char> {
        let mut chars = vec![];
        while let Some(ch) = self.it.next_if(|ch| predicate(*ch)) {
            chars.push(ch);
        }
        chars
    }

    fn match_next_token(&mut self) -> Token {
        self.skip();
        let position = self.it.position();
        let Some(char) = self.it.next() else {
            return Token::new(Kind::Eof, "", position);
        };

        let single = |kind| Token::new(kind, char, position);
        match char {
            '\n' => single(Kind::Newline),
            '+' => single(Kind::Plus),
            '-' => single(Kind::Minus),
            '*' => single(Kind::Times),
            '/' => single(Kind::Divide),
            '^' => single(Kind::Pow),
            '(' => single(Kind::ParenLeft),
            ')' => single(Kind::ParenRight),
            '[' => single(Kind::BracketLeft),
            ']' => single(Kind::BracketRight),
            ',' => single(Kind::Comma),
            '.' => single(Kind::Dot),

            '=' => {
                if self.it.next_if_eq('=').is_some() {
                    Token::new(Kind::Equal, "==", position)
                } else {
                    single(Kind::Assign)
                }
            }

            '!' => {
                if self.it.next_if_eq('=').is_some() {
                    Token::new(Kind::NotEqual, "!=", position)
                } else {
                    single(Kind::Invalid)
                }
            }

            char if char.is_ascii_digit() => self.lex_number(char, position),
            char if Self::is_valid_ident_start(char) => self.lex_word(char, position),
            _ => single(Kind::Invalid),
        }
    }

    /// Lex an integer or real literal.
    /// A radix point not followed by a digit ends the integer and
    /// is reported as its own invalid token.
    fn lex_number(&mut self, first: char, position: Position) -> Token {
        let rest = self.next_while(|ch| ch.is_ascii_digit());
        let mut value = iter::once(first).chain(rest).collect::<String>();

        let dot_position = self.it.position();
        if self.it.next_if_eq('.').is_none() {
            return Token::new(Kind::IntLit, value, position);
        }

        let fraction = self.next_while(|ch| ch.is_ascii_digit());
        if fraction.is_empty() {
            self.pending = Some(Token::new(Kind::Invalid, ".", dot_position));
            Token::new(Kind::IntLit, value, position)
        } else {
            value.push('.');
            value.extend(fraction);
            Token::new(Kind::RealLit, value, position)
        }
    }

    fn lex_word(&mut self, first: char, position: Position) -> Token {
        let rest = self.next_while(Self::is_valid_ident_char);
        let value = iter::once(first).chain(rest).collect::<String>();
        match Keyword::from_str(&value) {
            Some(word) => Token::new(Kind::Keyword(word), value, position),
            None => Token::new(Kind::Identifier, value, position),
        }
    }

    /// Identifiers begin with a letter (`a-z`, `A-Z`) or underscore (`_`).
    fn is_valid_ident_start(ch: char) -> bool {
        ch.is_ascii_alphabetic() || ch == '_'
    }

    /// Identifiers continue with letters, digits, or underscores.
    fn is_valid_ident_char(ch: char) -> bool {
        ch.is_ascii_alphanumeric() || ch == '_'
    }
}

impl<'a> From<&'a str> for Lexer<str::Chars<'a>> {
    fn from(src: &'a str) -> Self {
        Self::new(src.chars())
    }
}

/// Yields every token up to and including the first [`Kind::Eof`].
impl<I: Iterator<Item = char>> Iterator for Lexer<I> {
    type Item = Token;
    fn next(&mut self) -> Option<Self::Item> {
        if self.complete {
            return None;
        }

        let token = self.next_token();
        if token.is(Kind::Eof) {
            self.complete = true;
        }
        Some(token)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn kinds(src: &str) -> Vec<Kind> {
        tokenize(src).into_iter().map(|token| token.kind).collect()
    }

    #[test]
    fn tokenize_empty() {
        let tokens = tokenize("");
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].is(Kind::Eof));

        assert_eq!(kinds(" \t\r\n\n"), vec![Kind::Eof]);
    }

    #[test]
    fn eof_repeats() {
        let mut lexer = Lexer::from("x");
        assert!(lexer.next_token().is(Kind::Identifier));
        assert!(lexer.next_token().is(Kind::Eof));
        assert!(lexer.next_token().is(Kind::Eof));
        assert!(lexer.next_token().is(Kind::Eof));
    }

    #[test]
    fn tokenize_operators() {
        assert_eq!(
            kinds("+ - * / ^ ( ) [ ] , . = == !="),
            vec![
                Kind::Plus,
                Kind::Minus,
                Kind::Times,
                Kind::Divide,
                Kind::Pow,
                Kind::ParenLeft,
                Kind::ParenRight,
                Kind::BracketLeft,
                Kind::BracketRight,
                Kind::Comma,
                Kind::Dot,
                Kind::Assign,
                Kind::Equal,
                Kind::NotEqual,
                Kind::Eof,
            ]
        );
    }

    #[test]
    fn tokenize_number() {
        let tokens = tokenize("3");
        assert_eq!(tokens[0].kind, Kind::IntLit);
        assert_eq!(tokens[0].lexeme, "3");

        let tokens = tokenize("3.25");
        assert_eq!(tokens[0].kind, Kind::RealLit);
        assert_eq!(tokens[0].lexeme, "3.25");

        let tokens = tokenize("1234567");
        assert_eq!(tokens[0].kind, Kind::IntLit);
        assert_eq!(tokens[0].lexeme, "1234567");
    }

    #[test]
    fn tokenize_number_radix_terminator() {
        let tokens = tokenize("12. 5");
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].kind, Kind::IntLit);
        assert_eq!(tokens[0].lexeme, "12");
        assert_eq!(tokens[1].kind, Kind::Invalid);
        assert_eq!(tokens[1].lexeme, ".");
        assert_eq!(tokens[1].position, Position::new(1, 2));
        assert_eq!(tokens[2].kind, Kind::IntLit);
        assert_eq!(tokens[2].lexeme, "5");
    }

    #[test]
    fn tokenize_ident() {
        for input in ["a", "a_b", "_x", "x1", "camelCase2_"] {
            let tokens = tokenize(input);
            assert_eq!(tokens.len(), 2);
            assert_eq!(tokens[0].kind, Kind::Identifier);
            assert_eq!(tokens[0].lexeme, input);
        }
    }

    #[test]
    fn tokenize_keyword() {
        for word in Keyword::ALL {
            let tokens = tokenize(word.as_str());
            assert_eq!(tokens.len(), 2);
            assert_eq!(tokens[0].kind, Kind::Keyword(word));
        }

        // case sensitive
        let tokens = tokenize("While");
        assert_eq!(tokens[0].kind, Kind::Identifier);
    }

    #[test]
    fn tokenize_invalid() {
        let tokens = tokenize("x @ !");
        assert_eq!(tokens[1].kind, Kind::Invalid);
        assert_eq!(tokens[1].lexeme, "@");
        assert_eq!(tokens[2].kind, Kind::Invalid);
        assert_eq!(tokens[2].lexeme, "!");
    }

    #[test]
    fn newline_significance() {
        assert_eq!(
            kinds("\n\n  x\n\n\ny\n"),
            vec![
                Kind::Identifier,
                Kind::Newline,
                Kind::Identifier,
                Kind::Newline,
                Kind::Eof
            ]
        );
    }

    #[test]
    fn comments() {
        assert_eq!(
            kinds("# leading comment\nx = 1 # trailing\n# another\nprint x"),
            vec![
                Kind::Identifier,
                Kind::Assign,
                Kind::IntLit,
                Kind::Newline,
                Kind::Keyword(Keyword::Print),
                Kind::Identifier,
                Kind::Eof,
            ]
        );

        let lexer = Lexer::with_config("x % note\ny".chars(), Config { comment: '%' });
        let kinds = lexer.map(|token| token.kind).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![Kind::Identifier, Kind::Newline, Kind::Identifier, Kind::Eof]
        );
    }

    #[test]
    fn positions() {
        let tokens = tokenize("integer x\n  x = 10\n");
        let positions = tokens
            .iter()
            .map(|token| (token.position.line, token.position.column))
            .collect::<Vec<_>>();
        assert_eq!(
            positions,
            vec![(1, 0), (1, 8), (1, 9), (2, 2), (2, 4), (2, 6), (2, 8), (3, 0)]
        );
    }

    #[test]
    fn tokenize_idempotent() {
        let src = "function f(integer a) returns integer\n  a ^ 2\nend\nprint f(3)\n";
        assert_eq!(tokenize(src), tokenize(src));
    }
}
