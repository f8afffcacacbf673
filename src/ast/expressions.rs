use std::rc::Rc;

use crate::Span;

use super::{
    ast::{BinaryOperator, BoolOperator, CompareOperator, NodeId, UnaryOperator},
    statements::Parameters,
};

#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberLiteral {
    Int(i64),
    Float(f64),
    Complex(f64),
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    // Literals
    Name(String),
    Number(NumberLiteral),
    Str(String),
    Bytes(String),
    FString(String),
    Bool(bool),
    NoneLiteral,
    Ellipsis,

    // Displays
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Set(Vec<Expr>),
    /// A `None` key marks a `**mapping` spread.
    Dict {
        keys: Vec<Option<Expr>>,
        values: Vec<Expr>,
    },

    // Comprehensions
    ListComp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    SetComp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    GeneratorExp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    DictComp {
        key: Box<Expr>,
        value: Box<Expr>,
        generators: Vec<Comprehension>,
    },

    Lambda {
        params: Rc<Parameters>,
        body: Rc<Expr>,
    },
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    BoolOp {
        op: BoolOperator,
        values: Vec<Expr>,
    },
    BinOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    Compare {
        left: Box<Expr>,
        ops: Vec<CompareOperator>,
        comparators: Vec<Expr>,
    },
    /// Positional arguments may contain `Starred` entries.
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Subscript {
        value: Box<Expr>,
        slice: Box<Expr>,
    },
    Slice {
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    Starred(Box<Expr>),
    Await(Box<Expr>),
    Yield(Option<Box<Expr>>),
    YieldFrom(Box<Expr>),
    NamedExpr {
        target: Box<Expr>,
        value: Box<Expr>,
    },
}

/// One `for target in iter if cond` clause of a comprehension.
#[derive(Debug, Clone)]
pub struct Comprehension {
    pub target: Expr,
    pub iter: Expr,
    pub ifs: Vec<Expr>,
    pub is_async: bool,
}

/// A keyword argument; `arg` is `None` for a `**mapping` spread.
#[derive(Debug, Clone)]
pub struct Keyword {
    pub arg: Option<String>,
    pub value: Expr,
}

impl Expr {
    pub fn line(&self) -> u32 {
        self.span.start.line
    }

    pub fn as_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Name(name) => Some(name),
            _ => None,
        }
    }

    /// Dotted source form of names and attribute chains (`a.b.c`), used as
    /// the identifier of diagnostics.
    pub fn dotted_name(&self) -> Option<String> {
        match &self.kind {
            ExprKind::Name(name) => Some(name.clone()),
            ExprKind::Attribute { value, attr } => {
                value.dotted_name().map(|base| format!("{}.{}", base, attr))
            }
            _ => None,
        }
    }

    /// Every name read anywhere in the expression, once each.
    pub fn names(&self, out: &mut Vec<String>) {
        if let ExprKind::Name(name) = &self.kind {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        for child in self.children() {
            child.names(out);
        }
    }

    /// Direct sub-expressions, in source order. A lambda's body is included.
    pub fn children(&self) -> Vec<&Expr> {
        fn generators<'a>(out: &mut Vec<&'a Expr>, generators: &'a [Comprehension]) {
            for generator in generators {
                out.push(&generator.target);
                out.push(&generator.iter);
                out.extend(generator.ifs.iter());
            }
        }

        let mut out: Vec<&Expr> = vec![];
        match &self.kind {
            ExprKind::Name(_)
            | ExprKind::Number(_)
            | ExprKind::Str(_)
            | ExprKind::Bytes(_)
            | ExprKind::FString(_)
            | ExprKind::Bool(_)
            | ExprKind::NoneLiteral
            | ExprKind::Ellipsis => {}
            ExprKind::List(elts) | ExprKind::Tuple(elts) | ExprKind::Set(elts) => {
                out.extend(elts.iter())
            }
            ExprKind::Dict { keys, values } => {
                for (key, value) in keys.iter().zip(values.iter()) {
                    if let Some(key) = key {
                        out.push(key);
                    }
                    out.push(value);
                }
            }
            ExprKind::ListComp { elt, generators: gens }
            | ExprKind::SetComp { elt, generators: gens }
            | ExprKind::GeneratorExp { elt, generators: gens } => {
                out.push(elt);
                generators(&mut out, gens);
            }
            ExprKind::DictComp {
                key,
                value,
                generators: gens,
            } => {
                out.push(key);
                out.push(value);
                generators(&mut out, gens);
            }
            ExprKind::Lambda { params, body } => {
                out.extend(params.defaults.iter());
                out.extend(params.kw_defaults.iter().flatten());
                out.push(body);
            }
            ExprKind::IfExp { test, body, orelse } => {
                out.push(test);
                out.push(body);
                out.push(orelse);
            }
            ExprKind::BoolOp { values, .. } => out.extend(values.iter()),
            ExprKind::BinOp { left, right, .. } => {
                out.push(left);
                out.push(right);
            }
            ExprKind::UnaryOp { operand, .. } => out.push(operand),
            ExprKind::Compare {
                left, comparators, ..
            } => {
                out.push(left);
                out.extend(comparators.iter());
            }
            ExprKind::Call {
                func,
                args,
                keywords,
            } => {
                out.push(func);
                out.extend(args.iter());
                out.extend(keywords.iter().map(|keyword| &keyword.value));
            }
            ExprKind::Attribute { value, .. } => out.push(value),
            ExprKind::Subscript { value, slice } => {
                out.push(value);
                out.push(slice);
            }
            ExprKind::Slice { lower, upper, step } => {
                out.extend(lower.iter().map(|expr| &**expr));
                out.extend(upper.iter().map(|expr| &**expr));
                out.extend(step.iter().map(|expr| &**expr));
            }
            ExprKind::Starred(inner) | ExprKind::Await(inner) | ExprKind::YieldFrom(inner) => {
                out.push(inner)
            }
            ExprKind::Yield(value) => out.extend(value.iter().map(|expr| &**expr)),
            ExprKind::NamedExpr { target, value } => {
                out.push(target);
                out.push(value);
            }
        }
        out
    }

    /// Whether a `yield` occurs in the expression, outside of nested lambdas.
    pub fn contains_yield(&self) -> bool {
        match &self.kind {
            ExprKind::Yield(_) | ExprKind::YieldFrom(_) => true,
            ExprKind::Lambda { .. } => false,
            _ => self.children().into_iter().any(|child| child.contains_yield()),
        }
    }

    /// Short human description of the node.
    pub fn describe(&self) -> String {
        if let Some(name) = self.dotted_name() {
            return name;
        }

        match &self.kind {
            ExprKind::Call { func, .. } => format!("{}()", func.describe()),
            ExprKind::Subscript { value, .. } => format!("{}[]", value.describe()),
            ExprKind::Number(_) => String::from("<number>"),
            ExprKind::Str(_) | ExprKind::FString(_) => String::from("<str>"),
            ExprKind::List(_) => String::from("<list>"),
            ExprKind::Tuple(_) => String::from("<tuple>"),
            ExprKind::Dict { .. } => String::from("<dict>"),
            _ => String::from("<expr>"),
        }
    }
}
