use super::position::Position;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Keyword {
    Print,
    Integer,
    Real,
    Record,
    End,
    While,
    If,
    Function,
    Returns,
    Void,
}

impl Keyword {
    pub const ALL: [Keyword; 10] = [
        Keyword::Print,
        Keyword::Integer,
        Keyword::Real,
        Keyword::Record,
        Keyword::End,
        Keyword::While,
        Keyword::If,
        Keyword::Function,
        Keyword::Returns,
        Keyword::Void,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Print => "print",
            Keyword::Integer => "integer",
            Keyword::Real => "real",
            Keyword::Record => "record",
            Keyword::End => "end",
            Keyword::While => "while",
            Keyword::If => "if",
            Keyword::Function => "function",
            Keyword::Returns => "returns",
            Keyword::Void => "void",
        }
    }

    /// Match a lexeme against the keyword table.
    /// Matching is case sensitive.
    pub fn from_str(value: impl AsRef<str>) -> Option<Self> {
        match value.as_ref() {
            "print" => Some(Self::Print),
            "integer" => Some(Self::Integer),
            "real" => Some(Self::Real),
            "record" => Some(Self::Record),
            "end" => Some(Self::End),
            "while" => Some(Self::While),
            "if" => Some(Self::If),
            "function" => Some(Self::Function),
            "returns" => Some(Self::Returns),
            "void" => Some(Self::Void),
            _ => None,
        }
    }

    /// Diagnostic name of the keyword's token kind.
    pub fn name(&self) -> &'static str {
        match self {
            Keyword::Print => "PRINT",
            Keyword::Integer => "INTEGER",
            Keyword::Real => "REAL",
            Keyword::Record => "RECORD",
            Keyword::End => "END",
            Keyword::While => "WHILE",
            Keyword::If => "IF",
            Keyword::Function => "FUNCTION",
            Keyword::Returns => "RETURNS",
            Keyword::Void => "VOID",
        }
    }
}

/// Kind of token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Kind {
    /// A character no rule matched.
    Invalid,
    Eof,
    Newline,
    Plus,
    Minus,
    Times,
    Divide,
    Pow,
    ParenLeft,
    ParenRight,
    BracketLeft,
    BracketRight,
    Comma,
    Dot,
    /// `=`
    Assign,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    IntLit,
    RealLit,
    Identifier,
    Keyword(Keyword),
}

impl Kind {
    pub fn name(&self) -> &'static str {
        match self {
            Kind::Invalid => "INVALID",
            Kind::Eof => "EOF",
            Kind::Newline => "NEWLINE",
            Kind::Plus => "PLUS",
            Kind::Minus => "MINUS",
            Kind::Times => "TIMES",
            Kind::Divide => "DIVIDE",
            Kind::Pow => "POW",
            Kind::ParenLeft => "LPAREN",
            Kind::ParenRight => "RPAREN",
            Kind::BracketLeft => "LBRACKET",
            Kind::BracketRight => "RBRACKET",
            Kind::Comma => "COMMA",
            Kind::Dot => "DOT",
            Kind::Assign => "ASSIGN",
            Kind::Equal => "EQUAL",
            Kind::NotEqual => "NOTEQUAL",
            Kind::IntLit => "INTLIT",
            Kind::RealLit => "REALLIT",
            Kind::Identifier => "IDENTIFIER",
            Kind::Keyword(word) => word.name(),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A lexed token.
/// Grammar matching compares `kind`, content comparisons use `lexeme`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Token {
    pub kind: Kind,
    /// Exact source text matched.
    pub lexeme: String,
    /// Position of the first character.
    pub position: Position,
}

impl Token {
    pub fn new(kind: Kind, lexeme: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            position,
        }
    }

    pub fn is(&self, kind: Kind) -> bool {
        self.kind == kind
    }

    pub fn is_keyword(&self, word: Keyword) -> bool {
        self.kind == Kind::Keyword(word)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: \"{}\" {}", self.kind, self.lexeme, self.position)
    }
}
