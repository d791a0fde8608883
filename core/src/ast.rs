use super::{
    eval::{Type, Value},
    token::{Keyword, Kind, Token},
};
use std::{fmt::Write, rc::Rc};

#[derive(Debug, Clone, PartialEq, derive_more::From)]
pub enum Node {
    Number(NodeNumber),
    Var(NodeVar),
    Unary(NodeUnary),
    Binary(NodeBinary),
    Nary(NodeNary),
    FunctionDef(Rc<FunctionDef>),
}

/// A literal, its value fixed at parse time.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeNumber {
    pub token: Token,
    pub value: Value,
}

/// A name reference.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeVar {
    pub token: Token,
}

impl NodeVar {
    pub fn name(&self) -> &str {
        &self.token.lexeme
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeUnary {
    pub token: Token,
    pub op: OpUnary,
    pub child: Box<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpUnary {
    Neg,
    Print,
    /// Declare the child [`NodeVar`].
    VarDecl(DeclType),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeBinary {
    pub token: Token,
    pub op: OpBinary,
    pub left: Box<Node>,
    pub right: Box<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpBinary {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    /// `left` is the accessor, `right` the value.
    Assign,
    Equal,
    NotEqual,
    /// `left` is the condition, `right` the body.
    While,
    /// `left` is the condition, `right` the body.
    Branch,
    /// `left` is the callee, `right` the argument list.
    FunctionCall,
    /// `left` are the bounds, `right` the declared variable.
    ArrayDecl(DeclType),
    /// `left` is the array, `right` the index.
    ArrayAccess,
    /// `left` is the record, `right` the field.
    RecordAccess,
}

impl OpBinary {
    pub fn from_token(token: &Kind) -> Option<Self> {
        match token {
            Kind::Plus => Some(Self::Add),
            Kind::Minus => Some(Self::Sub),
            Kind::Times => Some(Self::Mul),
            Kind::Divide => Some(Self::Div),
            Kind::Pow => Some(Self::Pow),
            Kind::Assign => Some(Self::Assign),
            Kind::Equal => Some(Self::Equal),
            Kind::NotEqual => Some(Self::NotEqual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeNary {
    pub token: Token,
    pub op: OpNary,
    pub children: Vec<Node>,
}

impl NodeNary {
    pub fn new(token: Token, op: OpNary) -> Self {
        Self {
            token,
            op,
            children: vec![],
        }
    }

    pub fn push(&mut self, child: impl Into<Node>) {
        self.children.push(child.into());
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpNary {
    /// A statement sequence.
    Program,
    /// Declared parameters or actual arguments.
    ArgList,
    /// Array bounds or indices.
    ArrayIndex,
    /// Field declarations of a record type.
    RecordDef,
}

/// Type named in a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclType {
    Integer,
    Real,
    /// A user defined record type, named by the declaration's token.
    Record,
}

impl DeclType {
    pub fn from_token(token: &Kind) -> Option<Self> {
        match token {
            Kind::Keyword(Keyword::Integer) => Some(Self::Integer),
            Kind::Keyword(Keyword::Real) => Some(Self::Real),
            Kind::Identifier => Some(Self::Record),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub token: Token,
    pub name: String,
    /// [`OpNary::ArgList`] of [`OpUnary::VarDecl`] nodes.
    pub parameters: NodeNary,
    /// [`OpNary::Program`].
    pub body: NodeNary,
    pub return_type: Type,
}

impl FunctionDef {
    /// Names of the formal parameters, in order.
    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameters
            .children
            .iter()
            .filter_map(|param| match param {
                Node::Unary(NodeUnary {
                    op: OpUnary::VarDecl(_),
                    child,
                    ..
                }) => Some(child.token().lexeme.as_str()),
                _ => None,
            })
    }
}

/// Storage an accessor resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    /// A variable binding in the environment chain.
    Variable(&'a str),
    /// Array element or record field.
    /// No storage backs these, reads produce `Void` and writes are discarded.
    Placeholder,
}

impl Node {
    /// Token the node originated from.
    pub fn token(&self) -> &Token {
        match self {
            Node::Number(node) => &node.token,
            Node::Var(node) => &node.token,
            Node::Unary(node) => &node.token,
            Node::Binary(node) => &node.token,
            Node::Nary(node) => &node.token,
            Node::FunctionDef(node) => &node.token,
        }
    }

    /// Resolve the node as an assignment target.
    /// `None` if the node is not an accessor.
    pub fn target(&self) -> Option<Target<'_>> {
        match self {
            Node::Var(var) => Some(Target::Variable(var.name())),
            Node::Binary(NodeBinary {
                op: OpBinary::ArrayAccess | OpBinary::RecordAccess,
                ..
            }) => Some(Target::Placeholder),
            _ => None,
        }
    }

    /// Render the parse tree sideways, rightmost children on top.
    pub fn tree(&self) -> String {
        let mut out = String::new();
        write_tree(self, 0, &mut out);
        out
    }
}

impl NodeNary {
    pub fn tree(&self) -> String {
        let mut out = String::new();
        write_nary(self, 0, &mut out);
        out
    }
}

fn write_prefix(depth: usize, out: &mut String) {
    if depth == 0 {
        return;
    }

    for _ in 1..depth {
        out.push_str("  |");
    }

    if depth > 1 {
        out.push_str("--+");
    } else {
        out.push_str("  +");
    }
}

fn write_label(token: &Token, depth: usize, out: &mut String) {
    write_prefix(depth, out);
    let _ = writeln!(out, "{}: {}", token.kind, token.lexeme);
}

fn write_tree(node: &Node, depth: usize, out: &mut String) {
    match node {
        Node::Number(NodeNumber { token, .. }) | Node::Var(NodeVar { token }) => {
            write_label(token, depth, out)
        }

        Node::Unary(unary) => {
            write_prefix(depth, out);
            match unary.op {
                OpUnary::Neg => out.push_str("NEG: -\n"),
                _ => {
                    let _ = writeln!(out, "{}: {}", unary.token.kind, unary.token.lexeme);
                }
            }
            write_tree(&unary.child, depth + 1, out);
        }

        Node::Binary(binary) => {
            write_tree(&binary.right, depth + 1, out);
            write_label(&binary.token, depth, out);
            write_tree(&binary.left, depth + 1, out);
        }

        Node::Nary(nary) => write_nary(nary, depth, out),

        Node::FunctionDef(def) => {
            write_prefix(depth, out);
            let _ = writeln!(out, "function {}", def.name);
            write_nary(&def.parameters, depth + 1, out);
            write_nary(&def.body, depth + 1, out);
        }
    }
}

fn write_nary(nary: &NodeNary, depth: usize, out: &mut String) {
    let mid = nary.children.len() / 2;
    for child in nary.children[mid..].iter().rev() {
        write_tree(child, depth + 1, out);
    }

    match nary.op {
        OpNary::Program => {
            write_prefix(depth, out);
            out.push_str("PROGRAM\n");
        }
        _ => write_label(&nary.token, depth, out),
    }

    for child in nary.children[..mid].iter().rev() {
        write_tree(child, depth + 1, out);
    }
}
