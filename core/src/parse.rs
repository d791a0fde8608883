use super::{
    ast,
    eval::{Type, Value},
    lex::Lexer,
    token::{Keyword, Kind, Token},
};
use std::{mem, rc::Rc};

pub use error::ParseError;

type Result<T> = std::result::Result<T, ParseError>;

/// Maximum nesting of blocks and factors.
pub const MAX_NESTING: usize = 128;

/// Holds the single token of lookahead.
pub struct Parser<I: Iterator<Item = char>> {
    lexer: Lexer<I>,
    current: Token,

    /// Nesting of the production being parsed.
    depth: usize,
}

impl<I: Iterator<Item = char>> Parser<I> {
    pub fn new(mut lexer: Lexer<I>) -> Self {
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            depth: 0,
        }
    }

    /// Parse the entire input into a program.
    pub fn parse(mut self) -> Result<ast::NodeNary> {
        parse_program(&mut self)
    }

    /// Parse a nested production.
    /// Fails at the current token once [`MAX_NESTING`] is reached.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING {
            return Err(self.unexpected(vec![]));
        }

        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn has(&self, kind: Kind) -> bool {
        self.current.is(kind)
    }

    fn has_keyword(&self, word: Keyword) -> bool {
        self.current.is_keyword(word)
    }

    fn must_be(&self, kind: Kind) -> Result<()> {
        if self.has(kind) {
            Ok(())
        } else {
            Err(self.unexpected(vec![kind]))
        }
    }

    /// Consume the current token, returning it.
    fn advance(&mut self) -> Token {
        let next = self.lexer.next_token();
        mem::replace(&mut self.current, next)
    }

    /// Consume the current token if it is of the expected kind.
    fn expect(&mut self, kind: Kind) -> Result<Token> {
        self.must_be(kind)?;
        Ok(self.advance())
    }

    fn expect_keyword(&mut self, word: Keyword) -> Result<Token> {
        self.expect(Kind::Keyword(word))
    }

    fn unexpected(&self, expected: Vec<Kind>) -> ParseError {
        ParseError {
            token: self.current.clone(),
            expected,
        }
    }
}

pub fn parse<I>(lexer: Lexer<I>) -> Result<ast::NodeNary>
where
    I: Iterator<Item = char>,
{
    Parser::new(lexer).parse()
}

pub fn parse_str(src: &str) -> Result<ast::NodeNary> {
    parse(Lexer::from(src))
}

/// ```text
/// Program ::= { Statement }
/// ```
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
fn parse_program<I>(parser: &mut Parser<I>) -> Result<ast::NodeNary>
where
    I: Iterator<Item = char>,
{
    let mut program = ast::NodeNary::new(parser.current.clone(), ast::OpNary::Program);
    while !parser.has(Kind::Eof) {
        program.push(parse_statement(parser)?);
    }
    Ok(program)
}

/// ```text
/// Statement ::= ( Ref Statement'
///               | VarDecl
///               | Print
///               | While
///               | Branch
///               | FunctionDef
///               | RecordDef
///               | Expression ) NEWLINE
/// ```
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
fn parse_statement<I>(parser: &mut Parser<I>) -> Result<ast::Node>
where
    I: Iterator<Item = char>,
{
    #[cfg(feature = "tracing")]
    tracing::debug!(current = %parser.current);

    let statement = match parser.current.kind {
        Kind::Identifier => {
            let left = parse_ref(parser)?;
            parse_statement_prime(parser, left)?
        }
        Kind::Keyword(Keyword::Integer | Keyword::Real) => parse_var_decl(parser)?,
        Kind::Keyword(Keyword::Print) => parse_print(parser)?,
        Kind::Keyword(Keyword::While) => parse_while(parser)?,
        Kind::Keyword(Keyword::If) => parse_branch(parser)?,
        Kind::Keyword(Keyword::Function) => parse_function_def(parser)?,
        Kind::Keyword(Keyword::Record) => parse_record_def(parser)?.into(),
        _ => parse_expression(parser)?,
    };

    parser.expect(Kind::Newline)?;
    Ok(statement)
}

/// ```text
/// Statement' ::= ASSIGN Expression
///              | IDENTIFIER
///              | Expression'
/// ```
fn parse_statement_prime<I>(parser: &mut Parser<I>, left: ast::Node) -> Result<ast::Node>
where
    I: Iterator<Item = char>,
{
    match parser.current.kind {
        Kind::Assign => {
            let token = parser.advance();
            let right = parse_expression(parser)?;
            Ok(ast::NodeBinary {
                token,
                op: ast::OpBinary::Assign,
                left: Box::new(left),
                right: Box::new(right),
            }
            .into())
        }
        Kind::Identifier => parse_record_decl(parser, left),
        _ => parse_expression_rest(parser, left),
    }
}

/// Declaration of a record typed variable, the type already parsed as `left`.
///
/// ```text
/// RecordDecl ::= IDENTIFIER IDENTIFIER
///              | IDENTIFIER LBRACKET Bounds RBRACKET IDENTIFIER
/// ```
fn parse_record_decl<I>(parser: &mut Parser<I>, left: ast::Node) -> Result<ast::Node>
where
    I: Iterator<Item = char>,
{
    match left {
        ast::Node::Var(record) => {
            let var = parser.expect(Kind::Identifier)?;
            Ok(ast::NodeUnary {
                token: record.token,
                op: ast::OpUnary::VarDecl(ast::DeclType::Record),
                child: Box::new(ast::NodeVar { token: var }.into()),
            }
            .into())
        }

        ast::Node::Binary(ast::NodeBinary {
            op: ast::OpBinary::ArrayAccess,
            left: record,
            right: bounds,
            ..
        }) if matches!(*record, ast::Node::Var(_)) => {
            let var = parser.expect(Kind::Identifier)?;
            Ok(ast::NodeBinary {
                token: record.token().clone(),
                op: ast::OpBinary::ArrayDecl(ast::DeclType::Record),
                left: bounds,
                right: Box::new(ast::NodeVar { token: var }.into()),
            }
            .into())
        }

        _ => Err(parser.unexpected(vec![
            Kind::Assign,
            Kind::Newline,
            Kind::Plus,
            Kind::Minus,
            Kind::Times,
            Kind::Divide,
            Kind::Pow,
        ])),
    }
}

/// ```text
/// VarDecl ::= Type IDENTIFIER
///           | Type LBRACKET Bounds RBRACKET IDENTIFIER
/// ```
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
fn parse_var_decl<I>(parser: &mut Parser<I>) -> Result<ast::Node>
where
    I: Iterator<Item = char>,
{
    let Some(decl_type) = ast::DeclType::from_token(&parser.current.kind) else {
        return Err(parser.unexpected(vec![
            Kind::Keyword(Keyword::Integer),
            Kind::Keyword(Keyword::Real),
            Kind::Identifier,
        ]));
    };
    let token = parser.advance();

    if parser.has(Kind::BracketLeft) {
        parser.advance();
        let bounds = parse_bounds(parser)?;
        parser.expect(Kind::BracketRight)?;
        let var = parser.expect(Kind::Identifier)?;
        Ok(ast::NodeBinary {
            token,
            op: ast::OpBinary::ArrayDecl(decl_type),
            left: Box::new(bounds.into()),
            right: Box::new(ast::NodeVar { token: var }.into()),
        }
        .into())
    } else {
        let var = parser.expect(Kind::Identifier)?;
        Ok(ast::NodeUnary {
            token,
            op: ast::OpUnary::VarDecl(decl_type),
            child: Box::new(ast::NodeVar { token: var }.into()),
        }
        .into())
    }
}

/// ```text
/// Bounds ::= INTLIT { COMMA INTLIT }
/// ```
fn parse_bounds<I>(parser: &mut Parser<I>) -> Result<ast::NodeNary>
where
    I: Iterator<Item = char>,
{
    let mut bounds = ast::NodeNary::new(parser.current.clone(), ast::OpNary::ArrayIndex);
    loop {
        parser.must_be(Kind::IntLit)?;
        bounds.push(parse_literal(parser)?);
        if parser.has(Kind::Comma) {
            parser.advance();
        } else {
            break;
        }
    }
    Ok(bounds)
}

/// ```text
/// RecordDef ::= RECORD IDENTIFIER NEWLINE { VarDecl NEWLINE } END
/// ```
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
fn parse_record_def<I>(parser: &mut Parser<I>) -> Result<ast::NodeNary>
where
    I: Iterator<Item = char>,
{
    parser.expect_keyword(Keyword::Record)?;
    let name = parser.expect(Kind::Identifier)?;
    parser.expect(Kind::Newline)?;

    let mut record = ast::NodeNary::new(name, ast::OpNary::RecordDef);
    loop {
        match parser.current.kind {
            Kind::Keyword(Keyword::Integer | Keyword::Real) => {
                record.push(parse_var_decl(parser)?);
            }
            Kind::Identifier => {
                let left = parse_ref(parser)?;
                record.push(parse_record_decl(parser, left)?);
            }
            _ => break,
        }
        parser.expect(Kind::Newline)?;
    }

    parser.expect_keyword(Keyword::End)?;
    Ok(record)
}

/// ```text
/// Print ::= PRINT Expression
/// ```
fn parse_print<I>(parser: &mut Parser<I>) -> Result<ast::Node>
where
    I: Iterator<Item = char>,
{
    let token = parser.expect_keyword(Keyword::Print)?;
    let child = parse_expression(parser)?;
    Ok(ast::NodeUnary {
        token,
        op: ast::OpUnary::Print,
        child: Box::new(child),
    }
    .into())
}

/// ```text
/// While ::= WHILE Condition NEWLINE Block
/// ```
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
fn parse_while<I>(parser: &mut Parser<I>) -> Result<ast::Node>
where
    I: Iterator<Item = char>,
{
    let token = parser.expect_keyword(Keyword::While)?;
    parse_guarded_block(parser, token, ast::OpBinary::While)
}

/// ```text
/// Branch ::= IF Condition NEWLINE Block
/// ```
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
fn parse_branch<I>(parser: &mut Parser<I>) -> Result<ast::Node>
where
    I: Iterator<Item = char>,
{
    let token = parser.expect_keyword(Keyword::If)?;
    parse_guarded_block(parser, token, ast::OpBinary::Branch)
}

fn parse_guarded_block<I>(
    parser: &mut Parser<I>,
    token: Token,
    op: ast::OpBinary,
) -> Result<ast::Node>
where
    I: Iterator<Item = char>,
{
    let condition = parse_condition(parser)?;
    parser.expect(Kind::Newline)?;
    let body = parse_block(parser)?;
    Ok(ast::NodeBinary {
        token,
        op,
        left: Box::new(condition),
        right: Box::new(body.into()),
    }
    .into())
}

/// ```text
/// Condition ::= Expression EQUAL Expression
///             | Expression NOTEQUAL Expression
/// ```
fn parse_condition<I>(parser: &mut Parser<I>) -> Result<ast::Node>
where
    I: Iterator<Item = char>,
{
    let left = parse_expression(parser)?;
    let op = match parser.current.kind {
        Kind::Equal => ast::OpBinary::Equal,
        Kind::NotEqual => ast::OpBinary::NotEqual,
        _ => return Err(parser.unexpected(vec![Kind::Equal, Kind::NotEqual])),
    };
    let token = parser.advance();
    let right = parse_expression(parser)?;
    Ok(ast::NodeBinary {
        token,
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
    .into())
}

/// Consumes the closing `end`.
///
/// ```text
/// Block ::= Statement { Statement } END
/// ```
fn parse_block<I>(parser: &mut Parser<I>) -> Result<ast::NodeNary>
where
    I: Iterator<Item = char>,
{
    parser.nested(|parser| {
        let mut block = ast::NodeNary::new(parser.current.clone(), ast::OpNary::Program);
        loop {
            block.push(parse_statement(parser)?);
            if parser.has_keyword(Keyword::End) {
                break;
            }
        }
        parser.advance();
        Ok(block)
    })
}

/// ```text
/// FunctionDef ::= FUNCTION IDENTIFIER LPAREN ParamList RPAREN RETURNS ReturnType NEWLINE Block
/// ReturnType  ::= INTEGER | REAL | VOID
/// ```
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
fn parse_function_def<I>(parser: &mut Parser<I>) -> Result<ast::Node>
where
    I: Iterator<Item = char>,
{
    let token = parser.expect_keyword(Keyword::Function)?;
    let name = parser.expect(Kind::Identifier)?;
    parser.expect(Kind::ParenLeft)?;
    let parameters = parse_parameter_list(parser)?;
    parser.expect(Kind::ParenRight)?;
    parser.expect_keyword(Keyword::Returns)?;

    let return_type = match parser.current.kind {
        Kind::Keyword(Keyword::Integer) => Type::Integer,
        Kind::Keyword(Keyword::Real) => Type::Real,
        Kind::Keyword(Keyword::Void) => Type::Void,
        _ => {
            return Err(parser.unexpected(vec![
                Kind::Keyword(Keyword::Integer),
                Kind::Keyword(Keyword::Real),
                Kind::Keyword(Keyword::Void),
            ]));
        }
    };
    parser.advance();
    parser.expect(Kind::Newline)?;
    let body = parse_block(parser)?;

    Ok(Rc::new(ast::FunctionDef {
        token,
        name: name.lexeme,
        parameters,
        body,
        return_type,
    })
    .into())
}

/// ```text
/// ParamList ::= [ Param { COMMA Param } ]
/// Param     ::= ( INTEGER | REAL ) IDENTIFIER
/// ```
fn parse_parameter_list<I>(parser: &mut Parser<I>) -> Result<ast::NodeNary>
where
    I: Iterator<Item = char>,
{
    let mut parameters = ast::NodeNary::new(parser.current.clone(), ast::OpNary::ArgList);
    if parser.has(Kind::ParenRight) {
        return Ok(parameters);
    }

    loop {
        let decl_type = match parser.current.kind {
            Kind::Keyword(Keyword::Integer) => ast::DeclType::Integer,
            Kind::Keyword(Keyword::Real) => ast::DeclType::Real,
            _ => {
                return Err(parser.unexpected(vec![
                    Kind::Keyword(Keyword::Integer),
                    Kind::Keyword(Keyword::Real),
                ]));
            }
        };
        let token = parser.advance();
        let var = parser.expect(Kind::Identifier)?;
        parameters.push(ast::NodeUnary {
            token,
            op: ast::OpUnary::VarDecl(decl_type),
            child: Box::new(ast::NodeVar { token: var }.into()),
        });

        if parser.has(Kind::Comma) {
            parser.advance();
        } else {
            break;
        }
    }

    Ok(parameters)
}

/// ```text
/// Expression ::= Term Expression'
/// ```
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
fn parse_expression<I>(parser: &mut Parser<I>) -> Result<ast::Node>
where
    I: Iterator<Item = char>,
{
    let left = parse_term(parser)?;
    parse_expression_prime(parser, left)
}

/// Continue an expression whose leading operand has already been parsed.
fn parse_expression_rest<I>(parser: &mut Parser<I>, left: ast::Node) -> Result<ast::Node>
where
    I: Iterator<Item = char>,
{
    let left = parse_factor_prime(parser, left)?;
    let left = parse_term_prime(parser, left)?;
    parse_expression_prime(parser, left)
}

/// Left associative.
///
/// ```text
/// Expression' ::= { ( PLUS | MINUS ) Term }
/// ```
fn parse_expression_prime<I>(parser: &mut Parser<I>, mut left: ast::Node) -> Result<ast::Node>
where
    I: Iterator<Item = char>,
{
    while parser.has(Kind::Plus) || parser.has(Kind::Minus) {
        left = parse_binary(parser, left, parse_term)?;
    }
    Ok(left)
}

/// ```text
/// Term ::= Factor Term'
/// ```
fn parse_term<I>(parser: &mut Parser<I>) -> Result<ast::Node>
where
    I: Iterator<Item = char>,
{
    let left = parse_factor(parser)?;
    parse_term_prime(parser, left)
}

/// Left associative.
///
/// ```text
/// Term' ::= { ( TIMES | DIVIDE ) Factor }
/// ```
fn parse_term_prime<I>(parser: &mut Parser<I>, mut left: ast::Node) -> Result<ast::Node>
where
    I: Iterator<Item = char>,
{
    while parser.has(Kind::Times) || parser.has(Kind::Divide) {
        left = parse_binary(parser, left, parse_factor)?;
    }
    Ok(left)
}

/// Right associative.
///
/// ```text
/// Factor ::= Base [ POW Factor ]
/// ```
fn parse_factor<I>(parser: &mut Parser<I>) -> Result<ast::Node>
where
    I: Iterator<Item = char>,
{
    parser.nested(|parser| {
        let left = parse_base(parser)?;
        parse_factor_prime(parser, left)
    })
}

fn parse_factor_prime<I>(parser: &mut Parser<I>, left: ast::Node) -> Result<ast::Node>
where
    I: Iterator<Item = char>,
{
    if parser.has(Kind::Pow) {
        parse_binary(parser, left, parse_factor)
    } else {
        Ok(left)
    }
}

/// Consume the operator token at the cursor and parse its right operand.
fn parse_binary<I, F>(parser: &mut Parser<I>, left: ast::Node, parse_rhs: F) -> Result<ast::Node>
where
    I: Iterator<Item = char>,
    F: Fn(&mut Parser<I>) -> Result<ast::Node>,
{
    let Some(op) = ast::OpBinary::from_token(&parser.current.kind) else {
        return Err(parser.unexpected(vec![
            Kind::Plus,
            Kind::Minus,
            Kind::Times,
            Kind::Divide,
            Kind::Pow,
        ]));
    };
    let token = parser.advance();
    let right = parse_rhs(parser)?;
    Ok(ast::NodeBinary {
        token,
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
    .into())
}

/// Unary minus negates a factor, so `^` binds tighter.
///
/// ```text
/// Base ::= LPAREN Expression RPAREN
///        | MINUS Factor
///        | Number
/// ```
fn parse_base<I>(parser: &mut Parser<I>) -> Result<ast::Node>
where
    I: Iterator<Item = char>,
{
    match parser.current.kind {
        Kind::ParenLeft => {
            parser.advance();
            let expr = parse_expression(parser)?;
            parser.expect(Kind::ParenRight)?;
            Ok(expr)
        }
        Kind::Minus => {
            let token = parser.advance();
            let child = parse_factor(parser)?;
            Ok(ast::NodeUnary {
                token,
                op: ast::OpUnary::Neg,
                child: Box::new(child),
            }
            .into())
        }
        _ => parse_number(parser),
    }
}

/// ```text
/// Number ::= INTLIT | REALLIT | Ref
/// ```
fn parse_number<I>(parser: &mut Parser<I>) -> Result<ast::Node>
where
    I: Iterator<Item = char>,
{
    match parser.current.kind {
        Kind::Identifier => parse_ref(parser),
        Kind::IntLit | Kind::RealLit => Ok(parse_literal(parser)?.into()),
        _ => Err(parser.unexpected(vec![
            Kind::IntLit,
            Kind::RealLit,
            Kind::Identifier,
            Kind::ParenLeft,
            Kind::Minus,
        ])),
    }
}

fn parse_literal<I>(parser: &mut Parser<I>) -> Result<ast::NodeNumber>
where
    I: Iterator<Item = char>,
{
    let value = match parser.current.kind {
        Kind::IntLit => parser.current.lexeme.parse::<i64>().map(Value::Integer).ok(),
        Kind::RealLit => parser.current.lexeme.parse::<f64>().map(Value::Real).ok(),
        _ => None,
    };
    let Some(value) = value else {
        return Err(parser.unexpected(vec![Kind::IntLit, Kind::RealLit]));
    };

    let token = parser.advance();
    Ok(ast::NodeNumber { token, value })
}

/// ```text
/// Ref  ::= IDENTIFIER LPAREN ArgList RPAREN
///        | IDENTIFIER Ref'
/// ```
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
fn parse_ref<I>(parser: &mut Parser<I>) -> Result<ast::Node>
where
    I: Iterator<Item = char>,
{
    let token = parser.expect(Kind::Identifier)?;
    let var = ast::Node::from(ast::NodeVar {
        token: token.clone(),
    });

    if !parser.has(Kind::ParenLeft) {
        return parse_ref_prime(parser, var);
    }

    parser.advance();
    let args = parse_arg_list(parser)?;
    parser.expect(Kind::ParenRight)?;
    Ok(ast::NodeBinary {
        token,
        op: ast::OpBinary::FunctionCall,
        left: Box::new(var),
        right: Box::new(args.into()),
    }
    .into())
}

/// ```text
/// Ref' ::= DOT Ref
///        | LBRACKET Index RBRACKET Ref'
///        | ""
/// ```
fn parse_ref_prime<I>(parser: &mut Parser<I>, left: ast::Node) -> Result<ast::Node>
where
    I: Iterator<Item = char>,
{
    match parser.current.kind {
        Kind::Dot => {
            let token = parser.advance();
            let right = parse_ref(parser)?;
            Ok(ast::NodeBinary {
                token,
                op: ast::OpBinary::RecordAccess,
                left: Box::new(left),
                right: Box::new(right),
            }
            .into())
        }
        Kind::BracketLeft => {
            let token = parser.advance();
            let index = parse_index(parser)?;
            parser.expect(Kind::BracketRight)?;
            let access = ast::NodeBinary {
                token,
                op: ast::OpBinary::ArrayAccess,
                left: Box::new(left),
                right: Box::new(index.into()),
            };
            parse_ref_prime(parser, access.into())
        }
        _ => Ok(left),
    }
}

/// ```text
/// Index ::= Expression { COMMA Expression }
/// ```
fn parse_index<I>(parser: &mut Parser<I>) -> Result<ast::NodeNary>
where
    I: Iterator<Item = char>,
{
    let mut index = ast::NodeNary::new(parser.current.clone(), ast::OpNary::ArrayIndex);
    loop {
        index.push(parse_expression(parser)?);
        if parser.has(Kind::Comma) {
            parser.advance();
        } else {
            break;
        }
    }
    Ok(index)
}

/// ```text
/// ArgList ::= [ Expression { COMMA Expression } ]
/// ```
fn parse_arg_list<I>(parser: &mut Parser<I>) -> Result<ast::NodeNary>
where
    I: Iterator<Item = char>,
{
    let mut args = ast::NodeNary::new(parser.current.clone(), ast::OpNary::ArgList);
    if parser.has(Kind::ParenRight) {
        return Ok(args);
    }

    loop {
        args.push(parse_expression(parser)?);
        if parser.has(Kind::Comma) {
            parser.advance();
        } else {
            break;
        }
    }
    Ok(args)
}

pub mod error {
    use crate::token::{Kind, Token};

    /// The parser expected a different kind of token.
    /// Parsing stops at the first mismatch.
    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[error("Unexpected Token {token}")]
    pub struct ParseError {
        /// Offending token.
        pub token: Token,

        /// Empty if the input is nested too deeply.
        pub expected: Vec<Kind>,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ast::{Node, NodeBinary, NodeNumber, NodeUnary, OpBinary, OpNary, OpUnary};

    fn parse_one(src: &str) -> Node {
        let mut program = parse_str(src).expect("input to be valid");
        assert_eq!(program.len(), 1);
        program.children.remove(0)
    }

    fn int(node: &Node) -> i64 {
        let Node::Number(NodeNumber {
            value: Value::Integer(value),
            ..
        }) = node
        else {
            panic!("expected integer literal, found {node:?}");
        };
        *value
    }

    fn binary(node: &Node) -> (OpBinary, &Node, &Node) {
        let Node::Binary(NodeBinary {
            op, left, right, ..
        }) = node
        else {
            panic!("expected binary node, found {node:?}");
        };
        (*op, left.as_ref(), right.as_ref())
    }

    #[test]
    fn parse_empty() {
        let program = parse_str("").expect("input to be valid");
        assert_eq!(program.op, OpNary::Program);
        assert!(program.is_empty());

        let program = parse_str("\n\n# only a comment\n").expect("input to be valid");
        assert!(program.is_empty());
    }

    #[test]
    fn parse_literals() {
        let node = parse_one("7\n");
        assert_eq!(int(&node), 7);

        let node = parse_one("2.5\n");
        let Node::Number(NodeNumber {
            value: Value::Real(value),
            ..
        }) = node
        else {
            panic!("invalid expression");
        };
        assert_eq!(value, 2.5);
    }

    #[test]
    fn parse_precedence() {
        // 1 + (2 * 3)
        let node = parse_one("1 + 2 * 3\n");
        let (op, left, right) = binary(&node);
        assert_eq!(op, OpBinary::Add);
        assert_eq!(int(left), 1);
        let (op, left, right) = binary(right);
        assert_eq!(op, OpBinary::Mul);
        assert_eq!(int(left), 2);
        assert_eq!(int(right), 3);

        // (1 * 2) ^ 3 binds as 1 * (2 ^ 3)
        let node = parse_one("1 * 2 ^ 3\n");
        let (op, _, right) = binary(&node);
        assert_eq!(op, OpBinary::Mul);
        let (op, _, _) = binary(right);
        assert_eq!(op, OpBinary::Pow);
    }

    #[test]
    fn parse_associativity() {
        // (8 - 4) - 2
        let node = parse_one("8 - 4 - 2\n");
        let (op, left, right) = binary(&node);
        assert_eq!(op, OpBinary::Sub);
        assert_eq!(int(right), 2);
        let (op, left, right) = binary(left);
        assert_eq!(op, OpBinary::Sub);
        assert_eq!(int(left), 8);
        assert_eq!(int(right), 4);

        // (8 / 4) / 2
        let node = parse_one("8 / 4 / 2\n");
        let (op, left, _) = binary(&node);
        assert_eq!(op, OpBinary::Div);
        let (op, _, _) = binary(left);
        assert_eq!(op, OpBinary::Div);

        // 2 ^ (3 ^ 2)
        let node = parse_one("2 ^ 3 ^ 2\n");
        let (op, left, right) = binary(&node);
        assert_eq!(op, OpBinary::Pow);
        assert_eq!(int(left), 2);
        let (op, left, right) = binary(right);
        assert_eq!(op, OpBinary::Pow);
        assert_eq!(int(left), 3);
        assert_eq!(int(right), 2);
    }

    #[test]
    fn parse_unary_minus() {
        // binary minus
        let node = parse_one("3 - 1\n");
        assert_eq!(binary(&node).0, OpBinary::Sub);

        // -(2 ^ 2)
        let node = parse_one("-2 ^ 2\n");
        let Node::Unary(NodeUnary {
            op: OpUnary::Neg,
            child,
            ..
        }) = &node
        else {
            panic!("invalid expression");
        };
        assert_eq!(binary(child).0, OpBinary::Pow);

        // (-2) + 3
        let node = parse_one("-2 + 3\n");
        let (op, left, _) = binary(&node);
        assert_eq!(op, OpBinary::Add);
        assert!(matches!(
            left,
            Node::Unary(NodeUnary {
                op: OpUnary::Neg,
                ..
            })
        ));

        // 4 - (-1)
        let node = parse_one("4 - -1\n");
        let (op, _, right) = binary(&node);
        assert_eq!(op, OpBinary::Sub);
        assert!(matches!(right, Node::Unary(_)));
    }

    #[test]
    fn parse_group() {
        // (1 + 2) * 3
        let node = parse_one("(1 + 2) * 3\n");
        let (op, left, _) = binary(&node);
        assert_eq!(op, OpBinary::Mul);
        assert_eq!(binary(left).0, OpBinary::Add);

        let err = parse_str("(1 + 2\n").expect_err("input should be invalid");
        assert_eq!(err.token.kind, Kind::Newline);
        assert_eq!(err.expected, vec![Kind::ParenRight]);
    }

    #[test]
    fn parse_statements() {
        let program = parse_str("integer x\nreal y\nx = 5\nprint x + y\n").expect("input to be valid");
        assert_eq!(program.len(), 4);
        assert!(matches!(
            program.children[0],
            Node::Unary(NodeUnary {
                op: OpUnary::VarDecl(ast::DeclType::Integer),
                ..
            })
        ));
        assert!(matches!(
            program.children[1],
            Node::Unary(NodeUnary {
                op: OpUnary::VarDecl(ast::DeclType::Real),
                ..
            })
        ));
        assert_eq!(binary(&program.children[2]).0, OpBinary::Assign);
        assert!(matches!(
            program.children[3],
            Node::Unary(NodeUnary {
                op: OpUnary::Print,
                ..
            })
        ));
    }

    #[test]
    fn parse_identifier_led_expression() {
        // x * 2 + 1
        let node = parse_one("x * 2 + 1\n");
        let (op, left, _) = binary(&node);
        assert_eq!(op, OpBinary::Add);
        assert_eq!(binary(left).0, OpBinary::Mul);

        let node = parse_one("x ^ 2\n");
        assert_eq!(binary(&node).0, OpBinary::Pow);

        let node = parse_one("f(1, 2) - 3\n");
        let (op, left, _) = binary(&node);
        assert_eq!(op, OpBinary::Sub);
        assert_eq!(binary(left).0, OpBinary::FunctionCall);
    }

    #[test]
    fn parse_function_call() {
        let node = parse_one("f()\n");
        let (op, left, right) = binary(&node);
        assert_eq!(op, OpBinary::FunctionCall);
        assert!(matches!(left, Node::Var(_)));
        let Node::Nary(args) = right else {
            panic!("invalid arguments");
        };
        assert_eq!(args.op, OpNary::ArgList);
        assert!(args.is_empty());

        let node = parse_one("f(1, x + 1, g(2))\n");
        let (_, _, right) = binary(&node);
        let Node::Nary(args) = right else {
            panic!("invalid arguments");
        };
        assert_eq!(args.len(), 3);
        assert_eq!(binary(&args.children[2]).0, OpBinary::FunctionCall);

        let err = parse_str("f(1,)\n").expect_err("input should be invalid");
        assert_eq!(err.token.kind, Kind::ParenRight);
    }

    #[test]
    fn parse_while_branch() {
        let src = "while x != 3\nx = x + 1\nend\nif x == 3\nprint x\nprint 1\nend\n";
        let program = parse_str(src).expect("input to be valid");
        assert_eq!(program.len(), 2);

        let (op, cond, body) = binary(&program.children[0]);
        assert_eq!(op, OpBinary::While);
        assert_eq!(binary(cond).0, OpBinary::NotEqual);
        let Node::Nary(body) = body else {
            panic!("invalid body");
        };
        assert_eq!(body.op, OpNary::Program);
        assert_eq!(body.len(), 1);

        let (op, cond, body) = binary(&program.children[1]);
        assert_eq!(op, OpBinary::Branch);
        assert_eq!(binary(cond).0, OpBinary::Equal);
        let Node::Nary(body) = body else {
            panic!("invalid body");
        };
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn parse_condition_requires_comparison() {
        let err = parse_str("while x\nend\n").expect_err("input should be invalid");
        assert_eq!(err.token.kind, Kind::Newline);
        assert_eq!(err.expected, vec![Kind::Equal, Kind::NotEqual]);

        let err = parse_str("if x = 1\nend\n").expect_err("input should be invalid");
        assert_eq!(err.token.kind, Kind::Assign);
    }

    #[test]
    fn parse_nesting_limit() {
        let parens = |depth: usize| format!("{}1{}\n", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(int(&parse_one(&parens(MAX_NESTING - 1))), 1);

        let err = parse_str(&parens(MAX_NESTING)).expect_err("input should be invalid");
        assert_eq!(err.token.kind, Kind::IntLit);
        assert!(err.expected.is_empty());

        let err = parse_str(&format!("{}1\n", "-".repeat(MAX_NESTING)))
            .expect_err("input should be invalid");
        assert_eq!(err.token.kind, Kind::IntLit);
        assert!(err.expected.is_empty());

        let src = format!("{}1\n", "2 ^ ".repeat(10_000));
        let err = parse_str(&src).expect_err("input should be invalid");
        assert!(err.expected.is_empty());

        let src = format!("{}print 1\n{}", "if 1 == 1\n".repeat(10_000), "end\n".repeat(10_000));
        let err = parse_str(&src).expect_err("input should be invalid");
        assert!(err.expected.is_empty());

        // depth is released after each production
        let src = format!("{}print 1\n", "((1))\n".repeat(MAX_NESTING * 2));
        assert_eq!(parse_str(&src).expect("input to be valid").len(), MAX_NESTING * 2 + 1);
    }

    #[test]
    fn parse_block_requires_end() {
        let err = parse_str("while x != 3\nx = x + 1\n").expect_err("input should be invalid");
        assert_eq!(err.token.kind, Kind::Eof);
    }

    #[test]
    fn parse_function_def() {
        let src = "function add(integer a, real b) returns real\na + b\nend\n";
        let node = parse_one(src);
        let Node::FunctionDef(def) = node else {
            panic!("invalid statement");
        };
        assert_eq!(def.name, "add");
        assert_eq!(def.return_type, Type::Real);
        assert_eq!(def.parameters.op, OpNary::ArgList);
        assert_eq!(def.parameters.len(), 2);
        assert_eq!(def.body.len(), 1);

        let node = parse_one("function f() returns void\nprint 1\nend\n");
        let Node::FunctionDef(def) = node else {
            panic!("invalid statement");
        };
        assert!(def.parameters.is_empty());
        assert_eq!(def.return_type, Type::Void);

        let err = parse_str("function f() returns\nprint 1\nend\n").expect_err("input should be invalid");
        assert_eq!(err.token.kind, Kind::Newline);

        let err = parse_str("function f(x) returns void\nprint 1\nend\n")
            .expect_err("input should be invalid");
        assert_eq!(err.token.kind, Kind::Identifier);
        assert_eq!(err.token.lexeme, "x");
    }

    #[test]
    fn parse_records_and_arrays() {
        let src = "\
record Point
  real x
  real y
  integer[2] tags
end
Point p
Point[3] ps
integer[2, 3] grid
p.x = 1.5
grid[1, 2] = p.x
";
        let program = parse_str(src).expect("input to be valid");
        assert_eq!(program.len(), 6);

        let Node::Nary(record) = &program.children[0] else {
            panic!("invalid record");
        };
        assert_eq!(record.op, OpNary::RecordDef);
        assert_eq!(record.token.lexeme, "Point");
        assert_eq!(record.len(), 3);

        assert!(matches!(
            program.children[1],
            Node::Unary(NodeUnary {
                op: OpUnary::VarDecl(ast::DeclType::Record),
                ..
            })
        ));
        assert_eq!(
            binary(&program.children[2]).0,
            OpBinary::ArrayDecl(ast::DeclType::Record)
        );

        let (op, bounds, _) = binary(&program.children[3]);
        assert_eq!(op, OpBinary::ArrayDecl(ast::DeclType::Integer));
        let Node::Nary(bounds) = bounds else {
            panic!("invalid bounds");
        };
        assert_eq!(bounds.op, OpNary::ArrayIndex);
        assert_eq!(bounds.len(), 2);

        let (op, left, _) = binary(&program.children[4]);
        assert_eq!(op, OpBinary::Assign);
        assert_eq!(binary(left).0, OpBinary::RecordAccess);

        let (op, left, right) = binary(&program.children[5]);
        assert_eq!(op, OpBinary::Assign);
        assert_eq!(binary(left).0, OpBinary::ArrayAccess);
        assert_eq!(binary(right).0, OpBinary::RecordAccess);
    }

    #[test]
    fn parse_error_end_of_input() {
        let err = parse_str("1 +").expect_err("input should be invalid");
        assert_eq!(err.token.kind, Kind::Eof);
        assert_eq!(
            err.to_string(),
            "Unexpected Token EOF: \"\" Line: 1 Column: 3"
        );

        // statements must be terminated
        let err = parse_str("print 1").expect_err("input should be invalid");
        assert_eq!(err.token.kind, Kind::Eof);
        assert_eq!(err.expected, vec![Kind::Newline]);
    }

    #[test]
    fn parse_error_invalid_token() {
        let err = parse_str("x = 3 @ 4\n").expect_err("input should be invalid");
        assert_eq!(err.token.kind, Kind::Invalid);
        assert_eq!(
            err.to_string(),
            "Unexpected Token INVALID: \"@\" Line: 1 Column: 6"
        );

        let err = parse_str("x = 12.\n").expect_err("input should be invalid");
        assert_eq!(err.token.kind, Kind::Invalid);
        assert_eq!(err.token.lexeme, ".");
    }

    #[test]
    fn parse_error_integer_out_of_range() {
        let err = parse_str("print 99999999999999999999\n").expect_err("input should be invalid");
        assert_eq!(err.token.kind, Kind::IntLit);
    }

    #[test]
    fn parse_idempotent() {
        let src = "integer x\nx = 0\nwhile x != 3\nx = x + 1\nend\nprint x\n";
        assert_eq!(parse_str(src), parse_str(src));
    }
}
