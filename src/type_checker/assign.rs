use crate::{
    ast::expressions::{Expr, ExprKind},
    errors::errors::{Error, ErrorImpl},
    types::{
        attributes::{replace_attribute, set_attribute},
        types::{Compound, CompoundKind, Type},
    },
};

use super::{
    call::call_dunder,
    expr::{check_expr, push_known},
    type_checker::TypeChecker,
};

/// How a name target is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    /// Through the override checks of the scope manager.
    Checked,
    /// Unconditionally, for loop and comprehension variables the checker
    /// introduces itself.
    Fresh,
}

/// Assigns a value of type `value` to an assignment target.
pub fn assign_target(
    type_checker: &mut TypeChecker,
    target: &Expr,
    value: Type,
    confidence: f64,
    mode: BindMode,
) -> Result<(), Error> {
    match &target.kind {
        ExprKind::Name(name) => {
            match mode {
                BindMode::Checked => type_checker.bind(name, value, confidence),
                BindMode::Fresh => type_checker.type_map.set_variable(name, value, confidence),
            }
            Ok(())
        }
        ExprKind::Attribute { value: owner, attr } => {
            let owner = check_expr(type_checker, owner)?;
            set_attribute(&mut type_checker.types, &owner, attr, value)
                .map_err(|error| Error::new(error, target.span.start.clone()))
        }
        ExprKind::Subscript { value: container, slice } => store_item(type_checker, container, slice, value),
        ExprKind::Tuple(targets) | ExprKind::List(targets) => {
            destructure(type_checker, targets, value, confidence, mode)
        }
        ExprKind::Starred(inner) => {
            let element = value.element_type();
            assign_target(type_checker, inner, Type::list(known(element)), confidence, mode)
        }
        _ => Err(Error::new(
            ErrorImpl::UnsupportedTarget {
                target: target.describe(),
            },
            target.span.start.clone(),
        )),
    }
}

fn known(ty: Type) -> Vec<Type> {
    if ty.is_unknown() {
        vec![]
    } else {
        vec![ty]
    }
}

/// Tuple and list targets. A tuple value of matching arity is assigned
/// position by position, a starred target taking the middle; any other
/// value gives each target its element model, or the value itself when it
/// has none.
fn destructure(
    type_checker: &mut TypeChecker,
    targets: &[Expr],
    value: Type,
    confidence: f64,
    mode: BindMode,
) -> Result<(), Error> {
    let starred = targets
        .iter()
        .position(|target| matches!(target.kind, ExprKind::Starred(_)));

    if let Type::Compound(compound) = &value {
        if compound.kind == CompoundKind::Tuple && !compound.is_empty() {
            let elts = &compound.elts;
            match starred {
                None if elts.len() == targets.len() => {
                    for (target, elt) in targets.iter().zip(elts.iter()) {
                        assign_target(type_checker, target, elt.clone(), confidence, mode)?;
                    }
                    return Ok(());
                }
                Some(star) if elts.len() + 1 >= targets.len() => {
                    let after = targets.len() - star - 1;
                    let middle_end = elts.len() - after;
                    for (target, elt) in targets[..star].iter().zip(elts[..star].iter()) {
                        assign_target(type_checker, target, elt.clone(), confidence, mode)?;
                    }
                    let mut middle = Compound::new(CompoundKind::List, vec![]);
                    for elt in elts[star..middle_end].iter() {
                        push_known(&mut middle, elt.clone());
                    }
                    if let ExprKind::Starred(inner) = &targets[star].kind {
                        assign_target(type_checker, inner, Type::Compound(middle), confidence, mode)?;
                    }
                    for (target, elt) in targets[star + 1..].iter().zip(elts[middle_end..].iter()) {
                        assign_target(type_checker, target, elt.clone(), confidence, mode)?;
                    }
                    return Ok(());
                }
                _ => {}
            }
        }
    }

    let element = value.element_type();
    let spread = if element.is_unknown() && !matches!(value, Type::Compound(_)) {
        value.clone()
    } else {
        element
    };
    for target in targets {
        match &target.kind {
            ExprKind::Starred(inner) => {
                assign_target(type_checker, inner, Type::list(known(spread.clone())), confidence, mode)?
            }
            _ => assign_target(type_checker, target, spread.clone(), confidence, mode)?,
        }
    }
    Ok(())
}

/// `container[index] = value`: grows the container's element model and
/// rebinds it, or calls `__setitem__` on an instance.
fn store_item(type_checker: &mut TypeChecker, container_expr: &Expr, slice: &Expr, value: Type) -> Result<(), Error> {
    let container = check_expr(type_checker, container_expr)?;
    let is_slice = matches!(slice.kind, ExprKind::Slice { .. });
    let index = check_expr(type_checker, slice)?;

    let compound = match &container {
        Type::Compound(compound) => compound,
        Type::Instance(instance) => {
            call_dunder(type_checker, *instance, "__setitem__", vec![index, value])?;
            return Ok(());
        }
        _ => return Ok(()),
    };

    let mut grown = compound.clone();
    match compound.kind {
        CompoundKind::List if is_slice => {
            for (element, _) in value.element_type().alternatives() {
                push_known(&mut grown, element);
            }
        }
        CompoundKind::List => push_known(&mut grown, value),
        CompoundKind::Dict => {
            if !(index.is_unknown() && value.is_unknown()) {
                grown.push(index, Some(value));
            }
        }
        CompoundKind::Set | CompoundKind::Tuple => return Ok(()),
    }

    if grown != *compound {
        rebind_container(type_checker, container_expr, Type::Compound(grown))?;
    }
    Ok(())
}

/// Stores a grown container model back where `expr` reads it from: the
/// name's defining scope or the owning object's attribute.
pub fn rebind_container(type_checker: &mut TypeChecker, expr: &Expr, grown: Type) -> Result<(), Error> {
    match &expr.kind {
        ExprKind::Name(name) => type_checker.type_map.update_variable(name, grown),
        ExprKind::Attribute { value, attr } => {
            let owner = check_expr(type_checker, value)?;
            replace_attribute(&mut type_checker.types, &owner, attr, grown);
        }
        _ => {}
    }
    Ok(())
}
