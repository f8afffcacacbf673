use indexmap::IndexMap;

use crate::{
    ast::{
        expressions::{Expr, ExprKind},
        statements::{Alias, ExceptHandler, Stmt, StmtKind, WithItem},
    },
    diagnostics::diagnostics::{error_probability, DiagnosticKind},
    errors::errors::Error,
    types::{
        arena::ModuleData,
        attributes::delete_attribute,
        subtype::is_subtype,
        types::Type,
    },
};

use super::{
    annotations::convert_annotation,
    assign::{assign_target, BindMode},
    call::call_dunder,
    definitions::{check_class_def, check_function_def},
    expr::{binary_result, check_condition, check_expr, instance_type, iteration_type},
    modules::{module_path, Adopter},
    type_checker::{SymbolTable, TypeChecker},
};

/// Records a returned value in the current frame and checks it against
/// the function's declared return type.
fn check_return(type_checker: &mut TypeChecker, value: Option<&Expr>) -> Result<(), Error> {
    let ty = match value {
        Some(value) => check_expr(type_checker, value)?,
        None => Type::none(),
    };
    let function = type_checker.frames.last().and_then(|frame| frame.function);
    if let Some(function) = function {
        let data = type_checker.types.function(function);
        let declared = data.declared_return.clone().filter(|declared| !declared.is_unknown());
        if let Some(declared) = declared {
            let exempt = data.is_generator || ty.is_unknown() || ty.is_none();
            if !exempt && !is_subtype(&type_checker.types, &ty, &declared) {
                let name = data.name.clone();
                let message = format!(
                    "{}() is declared to return {} but returns {}",
                    name,
                    type_checker.display(&declared),
                    type_checker.display(&ty)
                );
                let confidence = value
                    .map(|value| type_checker.confidence_of(value))
                    .unwrap_or(type_checker.config.default_confidence);
                let probability = error_probability(confidence);
                type_checker.report(DiagnosticKind::ValueAnnotationMismatch, &name, probability, message);
            }
        }
    }
    if let Some(frame) = type_checker.frames.last_mut() {
        frame.returns.push(ty);
    }
    Ok(())
}

/// Checks a block of statements. A statement failing with an internal
/// error is logged and skipped.
pub fn check_block(type_checker: &mut TypeChecker, body: &[Stmt]) {
    for stmt in body {
        if let Err(error) = check_stmt(type_checker, stmt) {
            log::warn!(
                "skipping statement at {}:{}: {}",
                type_checker.session.diagnostics.file(),
                stmt.line(),
                error
            );
        }
    }
    type_checker.flush();
}

fn check_stmt(type_checker: &mut TypeChecker, stmt: &Stmt) -> Result<(), Error> {
    type_checker.session.diagnostics.set_line(stmt.line());

    match &stmt.kind {
        StmtKind::Expr(expr) => {
            check_expr(type_checker, expr)?;
        }
        StmtKind::Assign { targets, value } => {
            let ty = check_expr(type_checker, value)?;
            let confidence = type_checker.confidence_of(value);
            for target in targets {
                assign_target(type_checker, target, ty.clone(), confidence, BindMode::Checked)?;
            }
        }
        StmtKind::AnnAssign {
            target,
            annotation,
            value,
        } => check_annotated_assign(type_checker, target, annotation, value.as_ref())?,
        StmtKind::AugAssign { target, op, value } => {
            let current = check_expr(type_checker, target)?;
            let operand = check_expr(type_checker, value)?;
            let confidence = type_checker
                .confidence_of(target)
                .min(type_checker.confidence_of(value));
            let result = binary_result(type_checker, *op, &current, &operand, confidence)?;
            assign_target(type_checker, target, result, confidence, BindMode::Checked)?;
        }
        StmtKind::Return(value) => check_return(type_checker, value.as_ref())?,
        StmtKind::Pass | StmtKind::Break | StmtKind::Continue => {}
        StmtKind::If { test, body, orelse } | StmtKind::While { test, body, orelse } => {
            check_branch(type_checker, "<if>", |type_checker| {
                check_condition(type_checker, test)?;
                check_block(type_checker, body);
                Ok(())
            })?;
            if !orelse.is_empty() {
                check_branch(type_checker, "<else>", |type_checker| {
                    check_block(type_checker, orelse);
                    Ok(())
                })?;
            }
        }
        StmtKind::For {
            target,
            iter,
            body,
            orelse,
            ..
        } => {
            let iterable = check_expr(type_checker, iter)?;
            let element = iteration_type(type_checker, &iterable)?;
            let confidence = type_checker.confidence_of(iter);
            check_branch(type_checker, "<for>", |type_checker| {
                assign_target(type_checker, target, element, confidence, BindMode::Checked)?;
                check_block(type_checker, body);
                Ok(())
            })?;
            if !orelse.is_empty() {
                check_branch(type_checker, "<else>", |type_checker| {
                    check_block(type_checker, orelse);
                    Ok(())
                })?;
            }
        }
        StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => check_try(type_checker, body, handlers, orelse, finalbody)?,
        StmtKind::With { items, body, .. } => check_with(type_checker, items, body)?,
        StmtKind::FunctionDef(def) => check_function_def(type_checker, def)?,
        StmtKind::ClassDef(def) => check_class_def(type_checker, def)?,
        StmtKind::Import(names) => {
            for alias in names {
                check_import(type_checker, alias);
            }
        }
        StmtKind::ImportFrom { module, names, .. } => check_import_from(type_checker, module, names),
        StmtKind::Global(names) => {
            for name in names {
                type_checker.type_map.declare_global(name);
            }
        }
        StmtKind::Nonlocal(names) => {
            for name in names {
                type_checker.type_map.declare_nonlocal(name);
            }
        }
        StmtKind::Delete(targets) => {
            for target in targets {
                check_delete(type_checker, target)?;
            }
        }
        StmtKind::Assert { test, msg } => {
            check_condition(type_checker, test)?;
            if let Some(msg) = msg {
                check_expr(type_checker, msg)?;
            }
        }
        StmtKind::Raise { exc, cause } => {
            for expr in exc.iter().chain(cause.iter()) {
                check_expr(type_checker, expr)?;
            }
        }
    }
    Ok(())
}

/// Runs `check` in a branch namespace whose bindings merge into the
/// enclosing one afterwards. Narrowed bindings stay in the branch.
fn check_branch<F>(type_checker: &mut TypeChecker, name: &str, check: F) -> Result<(), Error>
where
    F: FnOnce(&mut TypeChecker) -> Result<(), Error>,
{
    type_checker.type_map.enter_namespace(name);
    let result = check(type_checker);
    type_checker.type_map.exit_branch_namespace(&type_checker.types);
    result
}

fn check_annotated_assign(
    type_checker: &mut TypeChecker,
    target: &Expr,
    annotation: &Expr,
    value: Option<&Expr>,
) -> Result<(), Error> {
    let declared = convert_annotation(type_checker, annotation);
    let name = match &target.kind {
        ExprKind::Name(name) => name,
        _ => {
            if let Some(value) = value {
                let ty = check_expr(type_checker, value)?;
                let confidence = type_checker.confidence_of(value);
                assign_target(type_checker, target, ty, confidence, BindMode::Checked)?;
            }
            return Ok(());
        }
    };

    match value {
        Some(value) => {
            let ty = check_expr(type_checker, value)?;
            let confidence = type_checker.confidence_of(value);
            type_checker.type_map.add_annotated_variable(
                &type_checker.types,
                &mut type_checker.session.diagnostics,
                name,
                declared,
                ty,
                confidence,
            );
        }
        None => {
            if !type_checker.type_map.in_namespace(name) {
                type_checker.type_map.set_variable(name, declared, 1.0);
            }
        }
    }
    Ok(())
}

/// Diagnostic kinds a handler for the exception named `name` silences.
fn handled_kinds(name: &str) -> Vec<DiagnosticKind> {
    match name.rsplit('.').next().unwrap_or(name) {
        "AttributeError" => vec![DiagnosticKind::AttributeError, DiagnosticKind::ClassAttributeError],
        "TypeError" => vec![DiagnosticKind::TypeError, DiagnosticKind::SubTypeError],
        _ => vec![],
    }
}

fn exception_names(expr: &Expr) -> Vec<String> {
    match &expr.kind {
        ExprKind::Tuple(elts) => elts.iter().flat_map(exception_names).collect(),
        _ => expr.dotted_name().into_iter().collect(),
    }
}

fn check_try(
    type_checker: &mut TypeChecker,
    body: &[Stmt],
    handlers: &[ExceptHandler],
    orelse: &[Stmt],
    finalbody: &[Stmt],
) -> Result<(), Error> {
    let suppressed: Vec<DiagnosticKind> = handlers
        .iter()
        .filter_map(|handler| handler.type_.as_ref())
        .flat_map(exception_names)
        .flat_map(|name| handled_kinds(&name))
        .collect();

    type_checker.session.diagnostics.push_suppression(suppressed);
    check_block(type_checker, body);
    type_checker.session.diagnostics.pop_suppression();

    for handler in handlers {
        type_checker.session.diagnostics.set_line(handler.span.start.line);
        let caught = match &handler.type_ {
            Some(expr) => {
                let classes = check_expr(type_checker, expr)?;
                instance_type(type_checker, &classes).unwrap_or(Type::Any)
            }
            None => Type::Any,
        };
        match &handler.name {
            Some(name) => {
                type_checker.type_map.set_variable(name, caught, 1.0);
                check_block(type_checker, &handler.body);
                type_checker.type_map.remove_variable(name);
            }
            None => check_block(type_checker, &handler.body),
        }
    }

    check_block(type_checker, orelse);
    check_block(type_checker, finalbody);
    Ok(())
}

/// Whether a `with` item silences attribute errors in its body, as
/// `suppress(AttributeError)` does.
fn suppresses_attribute_errors(context: &Expr) -> bool {
    match &context.kind {
        ExprKind::Call { args, .. } => args
            .iter()
            .flat_map(exception_names)
            .any(|name| name.rsplit('.').next() == Some("AttributeError")),
        _ => false,
    }
}

fn check_with(type_checker: &mut TypeChecker, items: &[WithItem], body: &[Stmt]) -> Result<(), Error> {
    let mut suppress = false;
    for item in items {
        let context = check_expr(type_checker, &item.context)?;
        suppress |= suppresses_attribute_errors(&item.context);

        let Some(vars) = &item.vars else {
            continue;
        };
        let entered = match &context {
            Type::Instance(instance) => {
                call_dunder(type_checker, *instance, "__enter__", vec![])?.unwrap_or(Type::Any)
            }
            _ => context.clone(),
        };
        let confidence = type_checker.confidence_of(&item.context);
        assign_target(type_checker, vars, entered, confidence, BindMode::Checked)?;
    }

    let kinds = if suppress {
        vec![DiagnosticKind::AttributeError, DiagnosticKind::ClassAttributeError]
    } else {
        vec![]
    };
    type_checker.session.diagnostics.push_suppression(kinds);
    check_block(type_checker, body);
    type_checker.session.diagnostics.pop_suppression();
    Ok(())
}

fn check_delete(type_checker: &mut TypeChecker, target: &Expr) -> Result<(), Error> {
    match &target.kind {
        ExprKind::Name(name) => {
            type_checker.type_map.remove_variable(name);
        }
        ExprKind::Attribute { value, attr } => {
            let owner = check_expr(type_checker, value)?;
            delete_attribute(&mut type_checker.types, &owner, attr);
        }
        ExprKind::Tuple(targets) | ExprKind::List(targets) => {
            for target in targets {
                check_delete(type_checker, target)?;
            }
        }
        _ => {
            check_expr(type_checker, target)?;
        }
    }
    Ok(())
}

/// Module value for the cached table at `path`, adopted into this run.
fn adopted_module(type_checker: &mut TypeChecker, path: &str, name: &str) -> Option<Type> {
    let table = type_checker.modules.lookup(path)?;
    Some(adopt_table(type_checker, name, &table))
}

fn adopt_table(type_checker: &mut TypeChecker, name: &str, table: &SymbolTable) -> Type {
    let mut adopter = Adopter::new(table.world());
    adopter.adopt_module(&mut type_checker.types, &mut type_checker.type_map, name, table)
}

/// `import a.b.c` binds `a`, a module whose `b` export leads to `c`;
/// `import a.b.c as d` binds the `a/b/c` module itself as `d`.
fn check_import(type_checker: &mut TypeChecker, alias: &Alias) {
    let path = module_path(&alias.name);
    let imported = adopted_module(type_checker, &path, &alias.name);

    if alias.asname.is_some() || !alias.name.contains('.') {
        if imported.is_none() {
            log::debug!("module {} is not available", alias.name);
        }
        let value = imported.unwrap_or(Type::Any);
        type_checker.type_map.add_module(alias.bound_name(), value);
        return;
    }

    let mut value = match imported {
        Some(module) => module,
        None => {
            log::debug!("module {} is not available", alias.name);
            Type::Any
        }
    };
    let parts: Vec<&str> = alias.name.split('.').collect();
    for depth in (1..parts.len()).rev() {
        let prefix = parts[..depth].join(".");
        let child = parts[depth];
        value = match adopted_module(type_checker, &module_path(&prefix), &prefix) {
            Some(Type::Module(parent)) => {
                type_checker
                    .types
                    .module_mut(parent)
                    .exports
                    .insert(child.to_string(), value);
                Type::Module(parent)
            }
            _ => {
                let mut exports = IndexMap::new();
                exports.insert(child.to_string(), value);
                Type::Module(type_checker.types.add_module(ModuleData { name: prefix, exports }))
            }
        };
    }
    type_checker.type_map.add_module(alias.bound_name(), value);
}

fn check_import_from(type_checker: &mut TypeChecker, module: &str, names: &[Alias]) {
    let path = module_path(module);
    let table = type_checker.modules.lookup(&path);

    for alias in names {
        if alias.name == "*" {
            match &table {
                Some(table) => import_star(type_checker, table),
                None => log::debug!("module {} is not available", module),
            }
            continue;
        }

        let bound = alias.bound_name();
        let found = table.as_ref().and_then(|table| {
            table.get(&alias.name).map(|ty| {
                let mut adopter = Adopter::new(table.world());
                let confidence = table.confidence(&alias.name).unwrap_or(1.0);
                (
                    adopter.adopt(&mut type_checker.types, &mut type_checker.type_map, ty),
                    confidence,
                )
            })
        });

        match found {
            Some((ty, confidence)) => type_checker.type_map.set_variable(bound, ty, confidence),
            None => {
                let submodule = format!("{}/{}", path, alias.name);
                let dotted = format!("{}.{}", module, alias.name);
                match adopted_module(type_checker, &submodule, &dotted) {
                    Some(value) => type_checker.type_map.add_module(bound, value),
                    None => {
                        log::debug!("cannot import {} from {}", alias.name, module);
                        type_checker.type_map.set_variable(bound, Type::Any, 0.0);
                    }
                }
            }
        }
    }
}

fn import_star(type_checker: &mut TypeChecker, table: &SymbolTable) {
    let mut adopter = Adopter::new(table.world());
    let public: Vec<(String, Type, f64)> = table
        .bindings()
        .filter(|(name, _)| !name.starts_with('_'))
        .map(|(name, binding)| (name.clone(), binding.ty.clone(), binding.confidence))
        .collect();
    for (name, ty, confidence) in public {
        let adopted = adopter.adopt(&mut type_checker.types, &mut type_checker.type_map, &ty);
        type_checker.type_map.set_variable(&name, adopted, confidence);
    }
}

