//! Syntax tree for `.qb` sources.

use std::f64::consts::PI;

/// One parsed source file.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub name: String,
    pub namespace: Option<String>,
    pub operations: Vec<OperationDecl>,
}

/// `[@entry] operation Name { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDecl {
    pub name: String,
    pub is_entry: bool,
    pub line: usize,
    pub body: Vec<Statement>,
}

/// A statement with the line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    /// `name(params) q0, q1, ...;`
    Gate(GateCall),
    /// `measure q;`
    Measure(usize),
    /// `reset q;`
    Reset(usize),
    /// `call Name;` or `call Ns.Name;`
    Call(QualifiedName),
}

/// A gate application before it is checked against the gate table.
#[derive(Debug, Clone, PartialEq)]
pub struct GateCall {
    pub name: String,
    pub params: Vec<Expression>,
    pub qubits: Vec<usize>,
}

/// `Name` or `Ns.Name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub namespace: Option<String>,
    pub name: String,
}

impl std::fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}.{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Angle expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Number(f64),
    Pi,
    Neg(Box<Expression>),
    BinOp {
        left: Box<Expression>,
        op: BinOp,
        right: Box<Expression>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    /// Binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Add | BinOp::Sub => 1,
            BinOp::Mul | BinOp::Div => 2,
        }
    }
}

impl Expression {
    /// Evaluate to radians.
    pub fn eval(&self) -> f64 {
        match self {
            Expression::Number(v) => *v,
            Expression::Pi => PI,
            Expression::Neg(e) => -e.eval(),
            Expression::BinOp { left, op, right } => {
                let (l, r) = (left.eval(), right.eval());
                match op {
                    BinOp::Add => l + r,
                    BinOp::Sub => l - r,
                    BinOp::Mul => l * r,
                    BinOp::Div => l / r,
                }
            }
        }
    }
}
