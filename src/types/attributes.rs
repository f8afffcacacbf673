use std::rc::Rc;

use crate::{
    builtins::functions::{object_method, primitive_attribute, BuiltinFunction},
    diagnostics::diagnostics::{error_probability, DiagnosticKind, Diagnostics},
    errors::errors::ErrorImpl,
};

use super::{
    arena::{AttributeSlot, MethodBinding, TypeArena},
    subtype::is_subtype,
    types::{Compound, CompoundKind, InstanceId, Primitive, Type},
};

fn builtin(name: &str, params: Vec<Type>, ret: Type) -> Type {
    Type::Builtin(Rc::new(BuiltinFunction::new(name, params, ret)))
}

fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

/// Method of a container, typed from its element model.
pub fn compound_attribute(compound: &Compound, name: &str) -> Option<Type> {
    let element = compound.element_type();
    let this = Type::Compound(compound.clone());
    let attribute = match (compound.kind, name) {
        (_, "__len__") => builtin(name, vec![], Type::int()),
        (_, "__contains__") => builtin(name, vec![Type::Any], Type::bool()),
        (_, "__iter__") => builtin(name, vec![], this),
        (CompoundKind::Tuple, "count" | "index") => builtin(name, vec![Type::Any], Type::int()),
        (CompoundKind::Tuple, "__getitem__") => builtin(name, vec![Type::Any], element),
        (CompoundKind::List, "append" | "remove") => builtin(name, vec![Type::Any], Type::none()),
        (CompoundKind::List, "extend") => builtin(name, vec![Type::Any], Type::none()),
        (CompoundKind::List, "insert") => builtin(name, vec![Type::int(), Type::Any], Type::none()),
        (CompoundKind::List, "pop" | "__getitem__") => builtin(name, vec![Type::Any], element),
        (CompoundKind::List, "index" | "count") => builtin(name, vec![Type::Any], Type::int()),
        (CompoundKind::List, "copy") => builtin(name, vec![], this),
        (CompoundKind::List, "sort" | "reverse" | "clear") => builtin(name, vec![], Type::none()),
        (CompoundKind::Dict, "keys") => builtin(name, vec![], Type::list(compound.elts.clone())),
        (CompoundKind::Dict, "values") => {
            builtin(name, vec![], Type::list(compound.values.clone()))
        }
        (CompoundKind::Dict, "items") => builtin(
            name,
            vec![],
            Type::list(vec![Type::tuple(vec![element, compound.value_type()])]),
        ),
        (CompoundKind::Dict, "popitem") => {
            builtin(name, vec![], Type::tuple(vec![element, compound.value_type()]))
        }
        (CompoundKind::Dict, "get" | "pop" | "setdefault" | "__getitem__") => {
            builtin(name, vec![Type::Any], compound.value_type())
        }
        (CompoundKind::Dict, "update") => builtin(name, vec![Type::Any], Type::none()),
        (CompoundKind::Dict, "copy") => builtin(name, vec![], this),
        (CompoundKind::Dict, "fromkeys") => builtin(name, vec![Type::Any], Type::dict(vec![], vec![])),
        (CompoundKind::Dict, "clear") => builtin(name, vec![], Type::none()),
        (CompoundKind::Set, "add" | "discard" | "remove" | "update") => {
            builtin(name, vec![Type::Any], Type::none())
        }
        (CompoundKind::Set, "pop") => builtin(name, vec![], element),
        (
            CompoundKind::Set,
            "union" | "intersection" | "difference" | "symmetric_difference",
        ) => builtin(name, vec![Type::Any], this),
        (CompoundKind::Set, "issubset" | "issuperset" | "isdisjoint") => {
            builtin(name, vec![Type::Any], Type::bool())
        }
        (CompoundKind::Set, "copy") => builtin(name, vec![], this),
        (CompoundKind::Set, "clear") => builtin(name, vec![], Type::none()),
        _ => return object_method(name),
    };
    Some(attribute)
}

/// Reads `name` on a value of type `ty`.
///
/// Returns the attribute type and whether it was found. A miss degrades to
/// `Any`; on an instance it is reported as `AttributeError` with `1 -
/// confidence` and the attribute is then bound to `Any` on the instance, so
/// later reads resolve silently.
pub fn get_attribute(
    types: &mut TypeArena,
    diagnostics: &mut Diagnostics,
    ty: &Type,
    name: &str,
    confidence: f64,
) -> (Type, bool) {
    if ty.is_unknown() {
        return (Type::Any, true);
    }
    if name == "__doc__" {
        return (Type::str(), true);
    }

    match ty {
        Type::Union(union) => {
            let mut results = vec![];
            let mut probs = vec![];
            let mut found = false;
            for (alternative, prob) in union.iter() {
                let (attribute, hit) = get_attribute(types, diagnostics, alternative, name, prob);
                found |= hit;
                results.push(attribute);
                probs.push(prob);
            }
            (Type::union_of(results, Some(probs)), found)
        }
        Type::Primitive(primitive) => {
            if let Some(attribute) = primitive_attribute(*primitive, name) {
                return (attribute, true);
            }
            if is_dunder(name) {
                return (builtin(name, vec![Type::Any], Type::Any), true);
            }
            report_miss(types, diagnostics, ty, name, confidence, *primitive != Primitive::NoneType);
            (Type::Any, false)
        }
        Type::Compound(compound) => {
            if let Some(attribute) = compound_attribute(compound, name) {
                return (attribute, true);
            }
            if is_dunder(name) {
                return (builtin(name, vec![Type::Any], Type::Any), true);
            }
            report_miss(types, diagnostics, ty, name, confidence, true);
            (Type::Any, false)
        }
        Type::Class(class) => {
            if name == "__name__" || name == "__qualname__" || name == "__module__" {
                return (Type::str(), true);
            }
            if let Some(slot) = types.class_lookup(*class, name) {
                return (slot.to_type(), true);
            }
            if let Some(method) = object_method(name) {
                return (method, true);
            }

            let data = types.class(*class);
            if data.name.is_some() && !is_dunder(name) && !data.opaque_bases {
                let message = format!("class {} has no attribute {}", types.class_name(*class), name);
                let probability = error_probability(confidence);
                diagnostics.report(DiagnosticKind::ClassAttributeError, name, probability, message);
            }
            (Type::Any, false)
        }
        Type::Instance(instance) => instance_attribute(types, diagnostics, *instance, name, confidence),
        Type::Function(_) | Type::Method { .. } => match name {
            "__name__" | "__qualname__" | "__module__" => (Type::str(), true),
            "__call__" => (ty.clone(), true),
            _ => (object_method(name).unwrap_or(Type::Any), true),
        },
        Type::Builtin(_) => (Type::Any, true),
        Type::Module(module) => {
            if name == "__name__" || name == "__file__" {
                return (Type::str(), true);
            }
            if let Some(export) = types.module(*module).exports.get(name) {
                return (export.clone(), true);
            }
            report_miss(types, diagnostics, ty, name, confidence, true);
            (Type::Any, false)
        }
        Type::Any | Type::Undefined => (Type::Any, true),
    }
}

fn instance_attribute(
    types: &mut TypeArena,
    diagnostics: &mut Diagnostics,
    instance: InstanceId,
    name: &str,
    confidence: f64,
) -> (Type, bool) {
    let class = types.instance(instance).class;
    if name == "__class__" {
        return (Type::Class(class), true);
    }

    match types.instance_lookup(instance, name) {
        Some(AttributeSlot::Function(function)) => {
            let bound = match types.function(function).binding {
                MethodBinding::Instance => Type::Method { instance, function },
                MethodBinding::Class | MethodBinding::Static => Type::Function(function),
            };
            (bound, true)
        }
        Some(AttributeSlot::Type(Type::Undefined)) => (Type::Any, true),
        Some(AttributeSlot::Type(attribute)) => (attribute, true),
        None => {
            if let Some(method) = object_method(name) {
                return (method, true);
            }
            if is_dunder(name) {
                return (Type::Any, false);
            }

            let data = types.class(class);
            if data.name.is_some() && !data.opaque_bases {
                let message = format!("{} has no attribute {}", types.class_name(class), name);
                let probability = error_probability(confidence);
                diagnostics.report(DiagnosticKind::AttributeError, name, probability, message);
            }
            types.instance_mut(instance).overlay.insert(name.to_string(), Type::Any);
            (Type::Any, false)
        }
    }
}

fn report_miss(
    types: &TypeArena,
    diagnostics: &mut Diagnostics,
    ty: &Type,
    name: &str,
    confidence: f64,
    reportable: bool,
) {
    if !reportable {
        return;
    }
    let message = format!("{} has no attribute {}", types.display(ty), name);
    let probability = error_probability(confidence);
    diagnostics.report(DiagnosticKind::AttributeError, name, probability, message);
}

/// Whether reading `name` on `ty` would resolve, without reporting.
pub fn has_attribute(types: &TypeArena, ty: &Type, name: &str) -> bool {
    match ty {
        Type::Any | Type::Undefined | Type::Builtin(_) => true,
        Type::Union(union) => union.elts().iter().any(|elt| has_attribute(types, elt, name)),
        Type::Primitive(primitive) => primitive_attribute(*primitive, name).is_some(),
        Type::Compound(compound) => compound_attribute(compound, name).is_some(),
        Type::Class(class) => types.class_lookup(*class, name).is_some(),
        Type::Instance(instance) => types.instance_lookup(*instance, name).is_some(),
        Type::Function(_) | Type::Method { .. } => name == "__name__" || name == "__call__",
        Type::Module(module) => types.module(*module).exports.contains_key(name),
    }
}

/// Merged value for an attribute rebinding: an incompatible new type joins
/// the old one in a union instead of replacing it.
fn merged(types: &TypeArena, old: Option<Type>, value: Type) -> Type {
    match old {
        Some(old) if !old.is_unknown() && !is_subtype(types, &value, &old) => {
            Type::union_of(vec![old, value], None)
        }
        _ => value,
    }
}

/// Writes `name` on a value of type `ty`.
///
/// Builtin primitive, container and function values reject writes.
pub fn set_attribute(types: &mut TypeArena, ty: &Type, name: &str, value: Type) -> Result<(), ErrorImpl> {
    match ty {
        Type::Any | Type::Undefined | Type::Function(_) | Type::Method { .. } => Ok(()),
        Type::Union(union) => {
            for elt in union.elts() {
                if !matches!(elt, Type::Primitive(_) | Type::Compound(_) | Type::Builtin(_)) {
                    set_attribute(types, elt, name, value.clone())?;
                }
            }
            Ok(())
        }
        Type::Instance(instance) => {
            let old = types
                .instance_lookup(*instance, name)
                .map(|slot| slot.to_type());
            let value = merged(types, old, value);
            log::trace!("instance attribute {} = {}", name, types.display(&value));
            types
                .instance_mut(*instance)
                .overlay
                .insert(name.to_string(), value);
            Ok(())
        }
        Type::Class(class) => {
            let old = types.class_lookup(*class, name).map(|slot| slot.to_type());
            let value = merged(types, old, value);
            types
                .class_mut(*class)
                .attributes
                .insert(name.to_string(), AttributeSlot::from(value));
            Ok(())
        }
        Type::Module(_) => Ok(()),
        Type::Primitive(_) | Type::Compound(_) | Type::Builtin(_) => Err(ErrorImpl::CantSetAttribute {
            attribute: name.to_string(),
            type_: types.display(ty),
        }),
    }
}

/// Removes an attribute written on an instance. Returns whether it existed.
pub fn delete_attribute(types: &mut TypeArena, ty: &Type, name: &str) -> bool {
    match ty {
        Type::Instance(instance) => types
            .instance_mut(*instance)
            .overlay
            .shift_remove(name)
            .is_some(),
        Type::Class(class) => types
            .class_mut(*class)
            .attributes
            .shift_remove(name)
            .is_some(),
        _ => false,
    }
}

/// Overwrites an attribute without merging, used when a container stored
/// on an object grows its element model.
pub fn replace_attribute(types: &mut TypeArena, ty: &Type, name: &str, value: Type) {
    match ty {
        Type::Instance(instance) => {
            types
                .instance_mut(*instance)
                .overlay
                .insert(name.to_string(), value);
        }
        Type::Class(class) => {
            types
                .class_mut(*class)
                .attributes
                .insert(name.to_string(), AttributeSlot::from(value));
        }
        _ => {}
    }
}
