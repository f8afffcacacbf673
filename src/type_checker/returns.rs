use crate::ast::{
    expressions::ExprKind,
    statements::{Stmt, StmtKind},
};

/// Static return facts of a function body. Nested definitions are not
/// part of the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReturnFacts {
    /// Some `return` statement exists.
    pub has_return: bool,
    /// No path falls off the end of the body.
    pub always_returns: bool,
    pub is_generator: bool,
}

pub fn analyse(body: &[Stmt]) -> ReturnFacts {
    ReturnFacts {
        has_return: has_return(body),
        always_returns: always_returns(body),
        is_generator: is_generator(body),
    }
}

fn has_return(body: &[Stmt]) -> bool {
    body.iter().any(|stmt| {
        matches!(stmt.kind, StmtKind::Return(_))
            || stmt.blocks().into_iter().any(has_return)
    })
}

pub fn always_returns(body: &[Stmt]) -> bool {
    body.iter().any(stmt_always_returns)
}

fn stmt_always_returns(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Return(_) | StmtKind::Raise { .. } => true,
        StmtKind::If { body, orelse, .. } => {
            !orelse.is_empty() && always_returns(body) && always_returns(orelse)
        }
        StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            always_returns(finalbody)
                || ((always_returns(body) || always_returns(orelse))
                    && handlers.iter().all(|handler| always_returns(&handler.body)))
        }
        StmtKind::With { body, .. } => always_returns(body),
        StmtKind::While { test, body, .. } => {
            matches!(test.kind, ExprKind::Bool(true)) && !breaks(body)
        }
        _ => false,
    }
}

/// A `break` leaving the loop that owns `body`.
fn breaks(body: &[Stmt]) -> bool {
    body.iter().any(|stmt| match &stmt.kind {
        StmtKind::Break => true,
        StmtKind::While { .. } | StmtKind::For { .. } => false,
        _ => stmt.blocks().into_iter().any(breaks),
    })
}

fn is_generator(body: &[Stmt]) -> bool {
    body.iter().any(|stmt| {
        let own = !matches!(stmt.kind, StmtKind::FunctionDef(_) | StmtKind::ClassDef(_))
            && stmt
                .expressions()
                .into_iter()
                .any(|expr| expr.contains_yield());
        own || stmt.blocks().into_iter().any(is_generator)
    })
}
