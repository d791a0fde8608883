use super::{ast, env::Environment};
use std::{fmt, io, rc::Rc};

pub use error::Runtime;
use error::Kind;

type Result<T = Value> = std::result::Result<T, Runtime>;

/// Receives the output of `print` statements.
pub trait Context {
    fn print(&mut self, value: &Value) -> io::Result<()>;
}

/// Values are written one per line.
impl<W: io::Write + ?Sized> Context for W {
    fn print(&mut self, value: &Value) -> io::Result<()> {
        writeln!(self, "{value}")
    }
}

/// Runtime value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Void,
    Integer(i64),
    Real(f64),
    Function(Rc<ast::FunctionDef>),
}

impl Value {
    pub fn kind(&self) -> Type {
        match self {
            Self::Void => Type::Void,
            Self::Integer(_) => Type::Integer,
            Self::Real(_) => Type::Real,
            Self::Function(_) => Type::Function,
        }
    }

    /// Value as a real.
    /// Converts `Integer` to `f64`.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Real(value) => Some(*value),
            _ => None,
        }
    }

    /// Convert the value to another type.
    /// `Real` to `Integer` truncates toward zero.
    /// `None` if the conversion is not possible,
    /// including reals which are not finite or out of the integer range.
    pub fn convert(&self, to: Type) -> Option<Value> {
        match (self, to) {
            (Self::Integer(value), Type::Integer) => Some(Self::Integer(*value)),
            (Self::Integer(value), Type::Real) => Some(Self::Real(*value as f64)),
            (Self::Real(value), Type::Integer) => {
                let value = value.trunc();
                // `i64::MAX as f64` rounds up to 2^63
                if value.is_finite() && value >= i64::MIN as f64 && value < i64::MAX as f64 {
                    Some(Self::Integer(value as i64))
                } else {
                    None
                }
            }
            (Self::Real(value), Type::Real) => Some(Self::Real(*value)),
            (Self::Void, Type::Void) => Some(Self::Void),
            (Self::Function(def), Type::Function) => Some(Self::Function(def.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => Ok(()),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value}"),
            Self::Function(def) => write!(f, "function {}", def.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Type {
    Void,
    Integer,
    Real,
    Function,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Void => "void",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Function => "function",
        };
        f.write_str(name)
    }
}

/// Result type of a binary operation on the operand types.
///
/// # Errors
/// + [`Kind::InvalidOperand`] if either operand is a function.
pub fn coerce(left: Type, right: Type) -> std::result::Result<Type, Kind> {
    match (left, right) {
        (Type::Function, _) | (_, Type::Function) => Err(Kind::InvalidOperand(Type::Function)),
        (left, right) if left == right => Ok(left),
        (Type::Void, _) | (_, Type::Void) => Ok(Type::Void),
        _ => Ok(Type::Real),
    }
}

/// Execute each statement in order.
/// Returns the value of the last statement, `Void` if there are none.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
pub fn eval_program<C>(program: &ast::NodeNary, env: &Environment, ctx: &mut C) -> Result
where
    C: Context + ?Sized,
{
    let mut result = Value::Void;
    for statement in program.children.iter() {
        result = eval(statement, env, ctx)?;
    }
    Ok(result)
}

pub fn eval<C>(node: &ast::Node, env: &Environment, ctx: &mut C) -> Result
where
    C: Context + ?Sized,
{
    match node {
        ast::Node::Number(node) => Ok(node.value.clone()),
        ast::Node::Var(node) => env
            .get(node.name())
            .ok_or_else(|| Kind::Undeclared(node.name().to_string()).at(&node.token)),
        ast::Node::Unary(node) => eval_unary(node, env, ctx),
        ast::Node::Binary(node) => eval_binary(node, env, ctx),
        ast::Node::Nary(node) => eval_nary(node, env, ctx),
        ast::Node::FunctionDef(def) => {
            env.declare(def.name.clone(), Value::Function(def.clone()))
                .map_err(|kind| kind.at(&def.token))?;

            #[cfg(feature = "tracing")]
            tracing::debug!(name = %def.name, "define");

            Ok(Value::Void)
        }
    }
}

fn eval_unary<C>(node: &ast::NodeUnary, env: &Environment, ctx: &mut C) -> Result
where
    C: Context + ?Sized,
{
    match node.op {
        ast::OpUnary::Neg => {
            let value = eval(&node.child, env, ctx)?;
            negate(&value).map_err(|kind| kind.at(&node.token))
        }
        ast::OpUnary::Print => {
            let value = eval(&node.child, env, ctx)?;
            ctx.print(&value)
                .map_err(|err| Kind::Io(err.kind()).at(&node.token))?;
            Ok(Value::Void)
        }
        ast::OpUnary::VarDecl(decl_type) => {
            let value = match decl_type {
                ast::DeclType::Integer => Value::Integer(0),
                ast::DeclType::Real => Value::Real(0.0),
                ast::DeclType::Record => return Ok(Value::Void),
            };

            let name = &node.child.token().lexeme;
            env.declare(name.clone(), value)
                .map_err(|kind| kind.at(node.child.token()))?;

            #[cfg(feature = "tracing")]
            tracing::debug!(%name, ?decl_type, "declare");

            Ok(Value::Void)
        }
    }
}

fn eval_binary<C>(node: &ast::NodeBinary, env: &Environment, ctx: &mut C) -> Result
where
    C: Context + ?Sized,
{
    let at = |kind: Kind| kind.at(&node.token);
    match node.op {
        ast::OpBinary::Add => {
            let (left, right) = eval_operands(node, env, ctx)?;
            arithmetic(&left, &right, |l, r| l.checked_add(r).ok_or(Kind::Overflow), |l, r| l + r)
                .map_err(at)
        }
        ast::OpBinary::Sub => {
            let (left, right) = eval_operands(node, env, ctx)?;
            arithmetic(&left, &right, |l, r| l.checked_sub(r).ok_or(Kind::Overflow), |l, r| l - r)
                .map_err(at)
        }
        ast::OpBinary::Mul => {
            let (left, right) = eval_operands(node, env, ctx)?;
            arithmetic(&left, &right, |l, r| l.checked_mul(r).ok_or(Kind::Overflow), |l, r| l * r)
                .map_err(at)
        }
        ast::OpBinary::Div => {
            let (left, right) = eval_operands(node, env, ctx)?;
            arithmetic(&left, &right, integer_div, |l, r| l / r).map_err(at)
        }
        ast::OpBinary::Pow => {
            let (left, right) = eval_operands(node, env, ctx)?;
            arithmetic(&left, &right, integer_pow, f64::powf).map_err(at)
        }
        ast::OpBinary::Equal => {
            let (left, right) = eval_operands(node, env, ctx)?;
            compare(&left, &right, true).map_err(at)
        }
        ast::OpBinary::NotEqual => {
            let (left, right) = eval_operands(node, env, ctx)?;
            compare(&left, &right, false).map_err(at)
        }
        ast::OpBinary::Assign => eval_assign(node, env, ctx),
        ast::OpBinary::While => {
            while eval_condition(node, env, ctx)? {
                eval(&node.right, env, ctx)?;
            }
            Ok(Value::Void)
        }
        ast::OpBinary::Branch => {
            if eval_condition(node, env, ctx)? {
                eval(&node.right, env, ctx)?;
            }
            Ok(Value::Void)
        }
        ast::OpBinary::FunctionCall => eval_call(node, env, ctx),

        // no storage backs arrays or records
        ast::OpBinary::ArrayDecl(_)
        | ast::OpBinary::ArrayAccess
        | ast::OpBinary::RecordAccess => Ok(Value::Void),
    }
}

fn eval_nary<C>(node: &ast::NodeNary, env: &Environment, ctx: &mut C) -> Result
where
    C: Context + ?Sized,
{
    match node.op {
        ast::OpNary::Program => eval_program(node, env, ctx),
        ast::OpNary::ArgList | ast::OpNary::ArrayIndex | ast::OpNary::RecordDef => {
            Ok(Value::Void)
        }
    }
}

/// Evaluate the left then the right child.
fn eval_operands<C>(
    node: &ast::NodeBinary,
    env: &Environment,
    ctx: &mut C,
) -> Result<(Value, Value)>
where
    C: Context + ?Sized,
{
    let left = eval(&node.left, env, ctx)?;
    let right = eval(&node.right, env, ctx)?;
    Ok((left, right))
}

fn eval_condition<C>(node: &ast::NodeBinary, env: &Environment, ctx: &mut C) -> Result<bool>
where
    C: Context + ?Sized,
{
    let value = eval(&node.left, env, ctx)?;
    match value.as_real() {
        Some(value) => Ok(value != 0.0),
        None => Err(Kind::InvalidCondition(value.kind()).at(&node.token)),
    }
}

fn eval_assign<C>(node: &ast::NodeBinary, env: &Environment, ctx: &mut C) -> Result
where
    C: Context + ?Sized,
{
    let Some(target) = node.left.target() else {
        let token = node.left.token();
        return Err(Kind::NotAssignable(token.lexeme.clone()).at(token));
    };

    let value = eval(&node.right, env, ctx)?;
    match target {
        ast::Target::Variable(name) => {
            env.assign(name, value).map_err(|kind| kind.at(&node.token))?;
        }
        ast::Target::Placeholder => {}
    }

    Ok(Value::Void)
}

/// Call frames are children of the root frame.
/// Arguments are evaluated in the caller's frame.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
fn eval_call<C>(node: &ast::NodeBinary, env: &Environment, ctx: &mut C) -> Result
where
    C: Context + ?Sized,
{
    let callee = node.left.token();
    let Value::Function(def) = eval(&node.left, env, ctx)? else {
        return Err(Kind::NotCallable(callee.lexeme.clone()).at(callee));
    };

    let args = match node.right.as_ref() {
        ast::Node::Nary(args) => &args.children[..],
        arg => std::slice::from_ref(arg),
    };

    if args.len() != def.parameters.len() {
        return Err(Kind::ArgumentCount {
            name: def.name.clone(),
            expected: def.parameters.len(),
            found: args.len(),
        }
        .at(&node.token));
    }

    let args = args
        .iter()
        .map(|arg| eval(arg, env, ctx))
        .collect::<Result<Vec<_>>>()?;

    #[cfg(feature = "tracing")]
    tracing::debug!(name = %def.name, ?args, "call");

    let frame = env.call_frame().map_err(|kind| kind.at(&node.token))?;
    for ((param, name), arg) in def
        .parameters
        .children
        .iter()
        .zip(def.parameter_names())
        .zip(args)
    {
        eval(param, &frame, ctx)?;
        frame
            .assign(name, arg)
            .map_err(|kind| kind.at(param.token()))?;
    }

    let result = eval_program(&def.body, &frame, ctx)?;
    if def.return_type == Type::Void {
        Ok(Value::Void)
    } else {
        Ok(result)
    }
}

/// Apply an arithmetic operation in the coerced type of its operands.
fn arithmetic(
    left: &Value,
    right: &Value,
    integer: impl Fn(i64, i64) -> std::result::Result<i64, Kind>,
    real: impl Fn(f64, f64) -> f64,
) -> std::result::Result<Value, Kind> {
    let to = coerce(left.kind(), right.kind())?;
    match (left.convert(to), right.convert(to)) {
        (Some(Value::Integer(left)), Some(Value::Integer(right))) => {
            integer(left, right).map(Value::Integer)
        }
        (Some(Value::Real(left)), Some(Value::Real(right))) => Ok(Value::Real(real(left, right))),
        _ => Ok(Value::Void),
    }
}

/// Truncating division.
fn integer_div(left: i64, right: i64) -> std::result::Result<i64, Kind> {
    if right == 0 {
        return Err(Kind::DivideByZero);
    }
    left.checked_div(right).ok_or(Kind::Overflow)
}

/// Negative exponents are computed as reals and truncated toward zero.
fn integer_pow(base: i64, exp: i64) -> std::result::Result<i64, Kind> {
    match base {
        1 => return Ok(1),
        -1 => return Ok(if exp % 2 == 0 { 1 } else { -1 }),
        0 if exp > 0 => return Ok(0),
        _ => {}
    }

    if exp >= 0 {
        let exp = u32::try_from(exp).map_err(|_| Kind::Overflow)?;
        base.checked_pow(exp).ok_or(Kind::Overflow)
    } else if base == 0 {
        Err(Kind::DivideByZero)
    } else {
        Ok((base as f64).powf(exp as f64).trunc() as i64)
    }
}

/// Compare the operands in their coerced type.
/// Produces `Integer` `1` if the comparison holds, otherwise `0`.
fn compare(left: &Value, right: &Value, equal: bool) -> std::result::Result<Value, Kind> {
    let to = coerce(left.kind(), right.kind())?;
    let eq = match (left.convert(to), right.convert(to)) {
        (Some(Value::Integer(left)), Some(Value::Integer(right))) => left == right,
        (Some(Value::Real(left)), Some(Value::Real(right))) => left == right,
        _ => return Ok(Value::Void),
    };
    Ok(Value::Integer(i64::from(eq == equal)))
}

fn negate(value: &Value) -> std::result::Result<Value, Kind> {
    match value {
        Value::Void => Ok(Value::Void),
        Value::Integer(value) => value
            .checked_neg()
            .map(Value::Integer)
            .ok_or(Kind::Overflow),
        Value::Real(value) => Ok(Value::Real(-value)),
        Value::Function(_) => Err(Kind::InvalidOperand(Type::Function)),
    }
}

pub mod error {
    use super::Type;
    use crate::{position::Position, token::Token};
    use std::io;

    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    pub enum Kind {
        #[error("undeclared name `{0}`")]
        Undeclared(String),

        #[error("`{0}` is already declared")]
        Redeclared(String),

        #[error("`{name}` expects {expected} arguments, found {found}")]
        ArgumentCount {
            name: String,
            expected: usize,
            found: usize,
        },

        #[error("`{0}` is not a function")]
        NotCallable(String),

        #[error("`{0}` can not be assigned to")]
        NotAssignable(String),

        /// The value can not be converted to the binding's type.
        #[error("can not store {from} in {to} `{name}`")]
        InvalidStore { name: String, from: Type, to: Type },

        #[error("invalid operand of type {0}")]
        InvalidOperand(Type),

        #[error("condition of type {0} is not numeric")]
        InvalidCondition(Type),

        /// Integer division by zero.
        #[error("division by zero")]
        DivideByZero,

        /// Integer overflow.
        #[error("integer overflow")]
        Overflow,

        /// Too many nested function calls.
        #[error("call depth exceeds {0}")]
        RecursionLimit(usize),

        /// Output could not be written.
        #[error("could not write output: {0}")]
        Io(io::ErrorKind),
    }

    impl Kind {
        /// Locate the error at a token.
        pub fn at(self, token: &Token) -> Runtime {
            Runtime {
                kind: self,
                position: token.position,
            }
        }
    }

    /// Evaluation failed.
    /// Evaluation stops at the first failure.
    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    #[error("{kind} {position}")]
    pub struct Runtime {
        pub kind: Kind,
        pub position: Position,
    }
}
