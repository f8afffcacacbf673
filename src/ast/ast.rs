use std::{fmt::Display, rc::Rc};

use crate::Span;

use super::statements::Stmt;

/// Unique identity of a syntax node within one parse.
///
/// The checker keys its per-node memo and the external type-hint overlay on it.
pub type NodeId = usize;

/// Root of a parsed source file.
#[derive(Debug, Clone)]
pub struct Module {
    pub body: Vec<Stmt>,
    pub file: Rc<String>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mult,
    MatMult,
    Div,
    FloorDiv,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mult => "*",
            BinaryOperator::MatMult => "@",
            BinaryOperator::Div => "/",
            BinaryOperator::FloorDiv => "//",
            BinaryOperator::Mod => "%",
            BinaryOperator::Pow => "**",
            BinaryOperator::LShift => "<<",
            BinaryOperator::RShift => ">>",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitXor => "^",
            BinaryOperator::BitAnd => "&",
        }
    }

    /// Name of the special method implementing the operator.
    pub fn dunder(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "__add__",
            BinaryOperator::Sub => "__sub__",
            BinaryOperator::Mult => "__mul__",
            BinaryOperator::MatMult => "__matmul__",
            BinaryOperator::Div => "__truediv__",
            BinaryOperator::FloorDiv => "__floordiv__",
            BinaryOperator::Mod => "__mod__",
            BinaryOperator::Pow => "__pow__",
            BinaryOperator::LShift => "__lshift__",
            BinaryOperator::RShift => "__rshift__",
            BinaryOperator::BitOr => "__or__",
            BinaryOperator::BitXor => "__xor__",
            BinaryOperator::BitAnd => "__and__",
        }
    }
}

impl Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Neg,
    Pos,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOperator {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOperator {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}
