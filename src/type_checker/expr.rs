use std::{collections::HashMap, rc::Rc};

use crate::{
    ast::{
        ast::{BinaryOperator, BoolOperator, CompareOperator, UnaryOperator},
        expressions::{Comprehension, Expr, ExprKind, NumberLiteral},
    },
    diagnostics::diagnostics::{error_probability, DiagnosticKind},
    errors::errors::Error,
    types::{
        arena::{FunctionBody, FunctionData, MethodBinding},
        binop::{resolve_binary_op, resolve_unary_op},
        subtype::is_subtype,
        types::{Compound, CompoundKind, Primitive, Type},
    },
};

use super::{
    assign::{assign_target, BindMode},
    call::{call_dunder, check_call_expr, is_builtin_call},
    definitions::build_signature,
    type_checker::TypeChecker,
};

/// Type of `expr`, memoised per node while the scope and arenas are
/// unchanged. A hint for the node replaces the inferred type.
pub fn check_expr(type_checker: &mut TypeChecker, expr: &Expr) -> Result<Type, Error> {
    let file = Rc::clone(&expr.span.start.file);
    let stamp = type_checker.stamp();
    if let Some(ty) = type_checker.session.memo.get(&file, expr.id, stamp) {
        return Ok(ty);
    }

    let mut ty = evaluate(type_checker, expr)?;
    if let Some((hinted, _)) = type_checker.hint(expr) {
        if !hinted.is_unknown() {
            ty = hinted.clone();
        }
    }

    let stamp = type_checker.stamp();
    type_checker
        .session
        .memo
        .store(&file, expr.id, ty.clone(), stamp);
    Ok(ty)
}

fn evaluate(type_checker: &mut TypeChecker, expr: &Expr) -> Result<Type, Error> {
    match &expr.kind {
        ExprKind::Name(name) => Ok(match type_checker.type_map.lookup(name) {
            Some(binding) if !matches!(binding.ty, Type::Undefined) => binding.ty.clone(),
            _ => Type::Any,
        }),
        ExprKind::Number(NumberLiteral::Int(_)) => Ok(Type::int()),
        ExprKind::Number(NumberLiteral::Float(_)) => Ok(Type::float()),
        ExprKind::Number(NumberLiteral::Complex(_)) => Ok(Type::complex()),
        ExprKind::Str(_) | ExprKind::FString(_) => Ok(Type::str()),
        ExprKind::Bytes(_) => Ok(Type::bytes()),
        ExprKind::Bool(_) => Ok(Type::bool()),
        ExprKind::NoneLiteral => Ok(Type::none()),
        ExprKind::Ellipsis => Ok(Type::Any),

        ExprKind::List(elts) => check_display(type_checker, CompoundKind::List, elts),
        ExprKind::Tuple(elts) => check_display(type_checker, CompoundKind::Tuple, elts),
        ExprKind::Set(elts) => check_display(type_checker, CompoundKind::Set, elts),
        ExprKind::Dict { keys, values } => check_dict(type_checker, keys, values),

        // Generator expressions are modelled as the list they would produce
        ExprKind::ListComp { elt, generators } | ExprKind::GeneratorExp { elt, generators } => {
            check_comprehension(type_checker, CompoundKind::List, generators, elt, None)
        }
        ExprKind::SetComp { elt, generators } => {
            check_comprehension(type_checker, CompoundKind::Set, generators, elt, None)
        }
        ExprKind::DictComp {
            key,
            value,
            generators,
        } => check_comprehension(type_checker, CompoundKind::Dict, generators, key, Some(value)),

        ExprKind::Lambda { params, body } => {
            let signature = build_signature(type_checker, params)?;
            let function = FunctionData {
                name: String::from("<lambda>"),
                signature,
                declared_return: None,
                body: FunctionBody::Lambda(Rc::clone(body)),
                captured: type_checker.type_map.current(),
                owner: None,
                binding: MethodBinding::Instance,
                has_return: true,
                always_returns: true,
                is_stub: false,
                is_generator: false,
                reads: lambda_reads(body).into(),
                cached_return: None,
                call_cache: HashMap::new(),
                line: expr.line(),
                file: type_checker.session.diagnostics.file(),
            };
            Ok(Type::Function(type_checker.types.add_function(function)))
        }
        ExprKind::IfExp { test, body, orelse } => {
            check_condition(type_checker, test)?;
            let body = check_expr(type_checker, body)?;
            let orelse = check_expr(type_checker, orelse)?;
            Ok(Type::union_of(vec![body, orelse], None))
        }
        ExprKind::BoolOp { values, .. } => {
            let mut results = vec![];
            for value in values {
                results.push(check_expr(type_checker, value)?);
            }
            Ok(Type::union_of(results, None))
        }
        ExprKind::BinOp { left, op, right } => {
            let left_ty = check_expr(type_checker, left)?;
            let right_ty = check_expr(type_checker, right)?;
            let confidence = type_checker
                .confidence_of(left)
                .min(type_checker.confidence_of(right));
            binary_result(type_checker, *op, &left_ty, &right_ty, confidence)
        }
        ExprKind::UnaryOp { op, operand } => {
            let operand_ty = check_expr(type_checker, operand)?;
            let dunder = match op {
                UnaryOperator::Not => return Ok(Type::bool()),
                UnaryOperator::Neg => "__neg__",
                UnaryOperator::Pos => "__pos__",
                UnaryOperator::Invert => "__invert__",
            };
            if let Type::Instance(instance) = operand_ty {
                if let Some(result) = call_dunder(type_checker, instance, dunder, vec![])? {
                    return Ok(result);
                }
            }
            Ok(resolve_unary_op(*op, &operand_ty))
        }
        ExprKind::Compare {
            left,
            ops,
            comparators,
        } => {
            let mut previous = check_expr(type_checker, left)?;
            for (op, comparator) in ops.iter().zip(comparators.iter()) {
                let right = check_expr(type_checker, comparator)?;
                if matches!(op, CompareOperator::In | CompareOperator::NotIn) {
                    if let Type::Instance(instance) = right {
                        call_dunder(type_checker, instance, "__contains__", vec![previous.clone()])?;
                    }
                }
                previous = right;
            }
            Ok(Type::bool())
        }
        ExprKind::Call {
            func,
            args,
            keywords,
        } => check_call_expr(type_checker, func, args, keywords),
        ExprKind::Attribute { value, attr } => {
            let owner = check_expr(type_checker, value)?;
            let confidence = type_checker.confidence_of(value);
            Ok(type_checker.attribute(&owner, attr, confidence).0)
        }
        ExprKind::Subscript { value, slice } => check_subscript(type_checker, value, slice),
        ExprKind::Slice { lower, upper, step } => {
            for part in [lower, upper, step].into_iter().flatten() {
                check_expr(type_checker, part)?;
            }
            Ok(Type::Any)
        }
        ExprKind::Starred(inner) | ExprKind::Await(inner) => check_expr(type_checker, inner),
        ExprKind::Yield(value) => {
            let yielded = match value {
                Some(value) => check_expr(type_checker, value)?,
                None => Type::none(),
            };
            if let Some(frame) = type_checker.frames.last_mut() {
                frame.yields.push(yielded);
            }
            Ok(Type::Any)
        }
        ExprKind::YieldFrom(inner) => {
            let iterable = check_expr(type_checker, inner)?;
            let yielded = iteration_type(type_checker, &iterable)?;
            if let Some(frame) = type_checker.frames.last_mut() {
                frame.yields.push(yielded);
            }
            Ok(Type::Any)
        }
        ExprKind::NamedExpr { target, value } => {
            let ty = check_expr(type_checker, value)?;
            let confidence = type_checker.confidence_of(value);
            assign_target(type_checker, target, ty.clone(), confidence, BindMode::Checked)?;
            Ok(ty)
        }
    }
}

fn lambda_reads(body: &Expr) -> Vec<String> {
    let mut out = vec![];
    body.names(&mut out);
    out
}

/// Adds `ty` to a list or set model unless it is unknown.
pub fn push_known(compound: &mut Compound, ty: Type) {
    if !ty.is_unknown() {
        compound.push(ty, None);
    }
}

fn check_display(type_checker: &mut TypeChecker, kind: CompoundKind, elts: &[Expr]) -> Result<Type, Error> {
    let mut compound = Compound::new(kind, vec![]);
    for elt in elts {
        match &elt.kind {
            ExprKind::Starred(inner) => {
                let spread = check_expr(type_checker, inner)?;
                push_known(&mut compound, spread.element_type());
            }
            _ => {
                let ty = check_expr(type_checker, elt)?;
                if kind == CompoundKind::Tuple {
                    compound.push(ty, None);
                } else {
                    push_known(&mut compound, ty);
                }
            }
        }
    }
    Ok(Type::Compound(compound))
}

fn check_dict(type_checker: &mut TypeChecker, keys: &[Option<Expr>], values: &[Expr]) -> Result<Type, Error> {
    let mut compound = Compound::new(CompoundKind::Dict, vec![]);
    for (key, value) in keys.iter().zip(values.iter()) {
        match key {
            Some(key) => {
                let key = check_expr(type_checker, key)?;
                let value = check_expr(type_checker, value)?;
                if !(key.is_unknown() && value.is_unknown()) {
                    compound.push(key, Some(value));
                }
            }
            None => {
                if let Type::Compound(spread) = check_expr(type_checker, value)? {
                    if spread.kind == CompoundKind::Dict {
                        compound = compound.extended(&spread);
                    }
                }
            }
        }
    }
    Ok(Type::Compound(compound))
}

fn check_comprehension(
    type_checker: &mut TypeChecker,
    kind: CompoundKind,
    generators: &[Comprehension],
    elt: &Expr,
    value: Option<&Expr>,
) -> Result<Type, Error> {
    type_checker.type_map.enter_namespace("<comprehension>");
    let result = comprehension_element(type_checker, generators, elt, value);
    type_checker.type_map.exit_namespace();
    let (elt, value) = result?;

    let mut compound = Compound::new(kind, vec![]);
    match value {
        Some(value) if !(elt.is_unknown() && value.is_unknown()) => compound.push(elt, Some(value)),
        Some(_) => {}
        None => push_known(&mut compound, elt),
    }
    Ok(Type::Compound(compound))
}

fn comprehension_element(
    type_checker: &mut TypeChecker,
    generators: &[Comprehension],
    elt: &Expr,
    value: Option<&Expr>,
) -> Result<(Type, Option<Type>), Error> {
    for generator in generators {
        let iterable = check_expr(type_checker, &generator.iter)?;
        let element = iteration_type(type_checker, &iterable)?;
        assign_target(type_checker, &generator.target, element, 1.0, BindMode::Fresh)?;
        for condition in generator.ifs.iter() {
            check_condition(type_checker, condition)?;
        }
    }

    let elt = check_expr(type_checker, elt)?;
    let value = match value {
        Some(value) => Some(check_expr(type_checker, value)?),
        None => None,
    };
    Ok((elt, value))
}

/// Element type produced by iterating over a value of type `iterable`.
///
/// Instances iterate through their `__iter__` and `__next__` methods.
pub fn iteration_type(type_checker: &mut TypeChecker, iterable: &Type) -> Result<Type, Error> {
    match iterable {
        Type::Instance(instance) => {
            match call_dunder(type_checker, *instance, "__iter__", vec![])? {
                Some(Type::Instance(iterator)) => {
                    Ok(call_dunder(type_checker, iterator, "__next__", vec![])?.unwrap_or(Type::Any))
                }
                Some(other) => Ok(other.element_type()),
                None => Ok(Type::Any),
            }
        }
        Type::Union(union) => {
            let mut elements = vec![];
            for alternative in union.elts() {
                elements.push(iteration_type(type_checker, alternative)?);
            }
            Ok(Type::union_of(elements, Some(union.probs().to_vec())))
        }
        other => Ok(other.element_type()),
    }
}

/// Result of `left op right`, going through operator methods of instance
/// operands first. A mismatch reports `TypeError` once per operand
/// signature and gives `Any`.
pub fn binary_result(
    type_checker: &mut TypeChecker,
    op: BinaryOperator,
    left: &Type,
    right: &Type,
    confidence: f64,
) -> Result<Type, Error> {
    if let Type::Instance(instance) = left {
        if let Some(result) = call_dunder(type_checker, *instance, op.dunder(), vec![right.clone()])? {
            return Ok(result);
        }
    }
    if let Type::Instance(instance) = right {
        let reflected = format!("__r{}", &op.dunder()[2..]);
        if let Some(result) = call_dunder(type_checker, *instance, &reflected, vec![left.clone()])? {
            return Ok(result);
        }
    }

    match resolve_binary_op(&type_checker.types, op, left, right) {
        Ok(ty) => Ok(ty),
        Err(marker) => {
            let signature = marker.signature(&type_checker.types);
            let message = format!("unsupported operand types for {}: {}", op, signature);
            let probability = error_probability(confidence);
            type_checker.report(DiagnosticKind::TypeError, &signature, probability, message);
            Ok(Type::Any)
        }
    }
}

fn literal_index(expr: &Expr) -> Option<i64> {
    match &expr.kind {
        ExprKind::Number(NumberLiteral::Int(value)) => Some(*value),
        ExprKind::UnaryOp {
            op: UnaryOperator::Neg,
            operand,
        } => literal_index(operand).map(|value| -value),
        _ => None,
    }
}

fn sliced(container: &Type) -> Type {
    match container {
        Type::Compound(compound) if compound.kind == CompoundKind::List => container.clone(),
        Type::Compound(compound) if compound.kind == CompoundKind::Tuple => {
            Type::Compound(Compound::new(CompoundKind::Tuple, vec![]))
        }
        Type::Primitive(Primitive::Str) | Type::Primitive(Primitive::Bytes) => container.clone(),
        Type::Union(union) => Type::union_of(
            union.elts().iter().map(sliced).collect(),
            Some(union.probs().to_vec()),
        ),
        _ => Type::Any,
    }
}

fn check_subscript(type_checker: &mut TypeChecker, value: &Expr, slice: &Expr) -> Result<Type, Error> {
    let container = check_expr(type_checker, value)?;
    if let ExprKind::Slice { .. } = &slice.kind {
        check_expr(type_checker, slice)?;
        return Ok(sliced(&container));
    }
    let index = check_expr(type_checker, slice)?;
    subscript_type(type_checker, &container, slice, &index)
}

fn subscript_type(type_checker: &mut TypeChecker, container: &Type, slice: &Expr, index: &Type) -> Result<Type, Error> {
    let ty = match container {
        Type::Union(union) => {
            let mut results = vec![];
            for alternative in union.elts() {
                results.push(subscript_type(type_checker, alternative, slice, index)?);
            }
            Type::union_of(results, Some(union.probs().to_vec()))
        }
        Type::Compound(compound) => match compound.kind {
            CompoundKind::List | CompoundKind::Set => compound.element_type(),
            CompoundKind::Dict => compound.value_type(),
            CompoundKind::Tuple => {
                let length = compound.elts.len() as i64;
                match literal_index(slice) {
                    Some(position) => {
                        let position = if position < 0 { length + position } else { position };
                        if (0..length).contains(&position) {
                            compound.elts[position as usize].clone()
                        } else {
                            compound.element_type()
                        }
                    }
                    None => compound.element_type(),
                }
            }
        },
        Type::Primitive(Primitive::Str) => Type::str(),
        Type::Primitive(Primitive::Bytes) => Type::int(),
        Type::Instance(instance) => {
            call_dunder(type_checker, *instance, "__getitem__", vec![index.clone()])?.unwrap_or(Type::Any)
        }
        _ => Type::Any,
    };
    Ok(ty)
}

/// Checks an `if`/`while`/`assert` test, narrowing names tested with
/// `isinstance`, including inside `and` chains. Nothing is narrowed under
/// `not` or `or`.
pub fn check_condition(type_checker: &mut TypeChecker, expr: &Expr) -> Result<Type, Error> {
    match &expr.kind {
        ExprKind::BoolOp {
            op: BoolOperator::And,
            values,
        } => {
            for value in values {
                check_condition(type_checker, value)?;
            }
            Ok(Type::bool())
        }
        ExprKind::Call { func, args, .. }
            if args.len() == 2 && is_builtin_call(type_checker, func, "isinstance") =>
        {
            let result = check_expr(type_checker, expr)?;
            narrow_isinstance(type_checker, &args[0], &args[1])?;
            Ok(result)
        }
        _ => check_expr(type_checker, expr),
    }
}

/// Value type a class argument of `isinstance` stands for.
pub fn instance_type(type_checker: &mut TypeChecker, classes: &Type) -> Option<Type> {
    match classes {
        Type::Class(class) => Some(type_checker.instance_of(*class)),
        Type::Builtin(builtin) => {
            let name = builtin.name.as_str();
            Primitive::from_name(name).map(Type::from).or_else(|| {
                CompoundKind::from_name(name).map(|kind| Type::Compound(Compound::new(kind, vec![])))
            })
        }
        Type::Compound(compound) if compound.kind == CompoundKind::Tuple => {
            let mut alternatives = vec![];
            for elt in compound.elts.iter() {
                alternatives.extend(instance_type(type_checker, elt));
            }
            if alternatives.is_empty() {
                None
            } else {
                Some(Type::union_of(alternatives, None))
            }
        }
        _ => None,
    }
}

fn narrow_isinstance(type_checker: &mut TypeChecker, subject: &Expr, classes: &Expr) -> Result<(), Error> {
    let name = match subject.as_name() {
        Some(name) => name,
        None => return Ok(()),
    };
    let classes = check_expr(type_checker, classes)?;
    let narrowed = match instance_type(type_checker, &classes) {
        Some(narrowed) => narrowed,
        None => return Ok(()),
    };

    // Alternatives already known to fit keep their identity
    let kept: Vec<(Type, f64)> = type_checker
        .type_map
        .find(name)
        .alternatives()
        .into_iter()
        .filter(|(alternative, _)| {
            !alternative.is_unknown() && is_subtype(&type_checker.types, alternative, &narrowed)
        })
        .collect();
    let ty = if kept.is_empty() {
        narrowed
    } else {
        let (elts, probs): (Vec<Type>, Vec<f64>) = kept.into_iter().unzip();
        Type::union_of(elts, Some(probs))
    };

    log::trace!("narrowed {} to {}", name, type_checker.display(&ty));
    type_checker.type_map.narrow_variable(name, ty);
    Ok(())
}
