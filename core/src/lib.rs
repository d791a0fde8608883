//! Lexer, parser and tree-walking evaluator for the calc language.
//!
//! # Inspiration
//! + [Crafting Interpreters](https://craftinginterpreters.com)
//! + [Lox in Rust](https://github.com/Darksecond/lox)
pub mod ast;
pub mod env;
pub mod eval;
pub mod lex;
pub mod parse;
pub mod position;
pub mod token;

pub use env::Environment;
pub use eval::{Context, Runtime, Type, Value};
pub use lex::Lexer;
pub use parse::ParseError;
pub use position::Position;
pub use token::{Kind, Token};

/// Failure to parse or evaluate a program.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, derive_more::From)]
pub enum Error {
    #[error("{0}")]
    Parse(ParseError),

    #[error("{0}")]
    Runtime(Runtime),
}

/// Parse a complete program.
pub fn parse(src: impl AsRef<str>) -> Result<ast::NodeNary, ParseError> {
    parse::parse_str(src.as_ref())
}

/// Parse then evaluate a program in `env`.
/// Nothing is evaluated if the program fails to parse.
/// Returns the value of the last statement.
pub fn run<C>(src: impl AsRef<str>, env: &Environment, ctx: &mut C) -> Result<Value, Error>
where
    C: Context + ?Sized,
{
    let program = parse(src)?;
    let value = eval::eval_program(&program, env, ctx)?;
    Ok(value)
}
