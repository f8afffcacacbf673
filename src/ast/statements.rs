use std::rc::Rc;

use crate::Span;

use super::{
    ast::{BinaryOperator, NodeId},
    expressions::{Expr, ExprKind, Keyword},
};

#[derive(Debug, Clone)]
pub struct Stmt {
    pub id: NodeId,
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(Expr),
    /// `a = b = value`: one entry in `targets` per `=`.
    Assign {
        targets: Vec<Expr>,
        value: Expr,
    },
    AnnAssign {
        target: Expr,
        annotation: Expr,
        value: Option<Expr>,
    },
    AugAssign {
        target: Expr,
        op: BinaryOperator,
        value: Expr,
    },
    Return(Option<Expr>),
    Pass,
    Break,
    Continue,
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
        is_async: bool,
    },
    Try {
        body: Vec<Stmt>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<Stmt>,
        finalbody: Vec<Stmt>,
    },
    With {
        items: Vec<WithItem>,
        body: Vec<Stmt>,
        is_async: bool,
    },
    FunctionDef(Rc<FunctionDef>),
    ClassDef(Rc<ClassDef>),
    Import(Vec<Alias>),
    /// `level` counts the leading dots of a relative import.
    ImportFrom {
        module: String,
        names: Vec<Alias>,
        level: usize,
    },
    Global(Vec<String>),
    Nonlocal(Vec<String>),
    Delete(Vec<Expr>),
    Assert {
        test: Expr,
        msg: Option<Expr>,
    },
    Raise {
        exc: Option<Expr>,
        cause: Option<Expr>,
    },
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub annotation: Option<Expr>,
    pub span: Span,
}

/// Parameter list of a function or lambda.
///
/// `defaults` align with the trailing entries of `args`, and `kw_defaults`
/// has one slot per keyword-only parameter.
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    pub args: Vec<Param>,
    pub defaults: Vec<Expr>,
    pub vararg: Option<Param>,
    pub kwonly: Vec<Param>,
    pub kw_defaults: Vec<Option<Expr>>,
    pub kwarg: Option<Param>,
}

impl Parameters {
    pub fn all(&self) -> impl Iterator<Item = &Param> {
        self.args
            .iter()
            .chain(self.vararg.iter())
            .chain(self.kwonly.iter())
            .chain(self.kwarg.iter())
    }

    /// Default for the positional parameter at `index`, if it has one.
    pub fn default_for(&self, index: usize) -> Option<&Expr> {
        let first_default = self.args.len().saturating_sub(self.defaults.len());
        if index >= first_default {
            self.defaults.get(index - first_default)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub params: Parameters,
    pub body: Vec<Stmt>,
    pub returns: Option<Expr>,
    pub decorators: Vec<Expr>,
    pub is_async: bool,
    pub span: Span,
}

impl FunctionDef {
    /// A body made of a lone `...` (optionally after a docstring).
    pub fn is_stub(&self) -> bool {
        body_is_stub(&self.body)
    }

    pub fn has_decorator(&self, name: &str) -> bool {
        self.decorators
            .iter()
            .any(|decorator| decorator.dotted_name().as_deref() == Some(name))
    }
}

/// Names used anywhere in a body, nested definitions included.
pub fn names_used(body: &[Stmt]) -> Vec<String> {
    fn walk(body: &[Stmt], out: &mut Vec<String>) {
        for stmt in body {
            for expr in stmt.expressions() {
                expr.names(out);
            }
            for block in stmt.blocks() {
                walk(block, out);
            }
            match &stmt.kind {
                StmtKind::FunctionDef(def) => walk(&def.body, out),
                StmtKind::ClassDef(def) => walk(&def.body, out),
                _ => {}
            }
        }
    }

    let mut out = vec![];
    walk(body, &mut out);
    out
}

pub fn body_is_stub(body: &[Stmt]) -> bool {
    let statements: Vec<&Stmt> = body
        .iter()
        .filter(|stmt| !matches!(&stmt.kind, StmtKind::Expr(Expr { kind: ExprKind::Str(_), .. })))
        .collect();

    matches!(
        statements.as_slice(),
        [Stmt {
            kind: StmtKind::Expr(Expr {
                kind: ExprKind::Ellipsis,
                ..
            }),
            ..
        }]
    )
}

#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: String,
    pub bases: Vec<Expr>,
    pub keywords: Vec<Keyword>,
    pub body: Vec<Stmt>,
    pub decorators: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ExceptHandler {
    pub type_: Option<Expr>,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct WithItem {
    pub context: Expr,
    pub vars: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
}

impl Alias {
    /// The name bound in the importing scope.
    pub fn bound_name(&self) -> &str {
        match &self.asname {
            Some(asname) => asname,
            None => self.name.split('.').next().unwrap_or(&self.name),
        }
    }
}

impl Stmt {
    pub fn line(&self) -> u32 {
        self.span.start.line
    }

    /// Expressions owned directly by the statement, not by nested blocks.
    /// Definitions contribute their decorators, defaults and bases only.
    pub fn expressions(&self) -> Vec<&Expr> {
        match &self.kind {
            StmtKind::Expr(expr) => vec![expr],
            StmtKind::Assign { targets, value } => {
                targets.iter().chain(std::iter::once(value)).collect()
            }
            StmtKind::AnnAssign {
                target,
                annotation,
                value,
            } => {
                let mut out = vec![target, annotation];
                out.extend(value.iter());
                out
            }
            StmtKind::AugAssign { target, value, .. } => vec![target, value],
            StmtKind::Return(value) => value.iter().collect(),
            StmtKind::If { test, .. } | StmtKind::While { test, .. } => vec![test],
            StmtKind::For { target, iter, .. } => vec![target, iter],
            StmtKind::Try { handlers, .. } => handlers
                .iter()
                .filter_map(|handler| handler.type_.as_ref())
                .collect(),
            StmtKind::With { items, .. } => items
                .iter()
                .flat_map(|item| std::iter::once(&item.context).chain(item.vars.iter()))
                .collect(),
            StmtKind::FunctionDef(def) => def
                .decorators
                .iter()
                .chain(def.params.defaults.iter())
                .chain(def.params.kw_defaults.iter().flatten())
                .collect(),
            StmtKind::ClassDef(def) => def.decorators.iter().chain(def.bases.iter()).collect(),
            StmtKind::Delete(targets) => targets.iter().collect(),
            StmtKind::Assert { test, msg } => std::iter::once(test).chain(msg.iter()).collect(),
            StmtKind::Raise { exc, cause } => exc.iter().chain(cause.iter()).collect(),
            StmtKind::Pass
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Import(_)
            | StmtKind::ImportFrom { .. }
            | StmtKind::Global(_)
            | StmtKind::Nonlocal(_) => vec![],
        }
    }

    /// Nested statement blocks that run in the same function, so nested
    /// function and class bodies are not included.
    pub fn blocks(&self) -> Vec<&[Stmt]> {
        match &self.kind {
            StmtKind::If { body, orelse, .. }
            | StmtKind::While { body, orelse, .. }
            | StmtKind::For { body, orelse, .. } => vec![body.as_slice(), orelse.as_slice()],
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                let mut out: Vec<&[Stmt]> = vec![body.as_slice()];
                out.extend(handlers.iter().map(|handler| handler.body.as_slice()));
                out.push(orelse.as_slice());
                out.push(finalbody.as_slice());
                out
            }
            StmtKind::With { body, .. } => vec![body.as_slice()],
            _ => vec![],
        }
    }
}
