//! Unit tests for the builtin tables.
//!
//! Covers:
//! - Global bindings
//! - Call results and argument-aware refinements
//! - Primitive attribute tables

use pretty_assertions::assert_eq;

use super::functions::*;
use crate::types::types::{Primitive, Type};

fn builtin(name: &str) -> BuiltinFunction {
    match builtin_bindings()
        .into_iter()
        .find(|(bound, _)| bound == name)
        .map(|(_, ty)| ty)
    {
        Some(Type::Builtin(function)) => (*function).clone(),
        other => panic!("{} is not a builtin function: {:?}", name, other),
    }
}

#[test]
fn test_bindings_include_constants() {
    let bindings = builtin_bindings();
    let find = |name: &str| {
        bindings
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, ty)| ty.clone())
    };
    assert_eq!(find("True"), Some(Type::bool()));
    assert_eq!(find("None"), Some(Type::none()));
    assert!(matches!(find("len"), Some(Type::Builtin(_))));
    assert!(bindings.len() > 140);
}

#[test]
fn test_fixed_return_types() {
    assert_eq!(builtin("len").check_call(&[Type::list(vec![])]), Type::int());
    assert_eq!(builtin("repr").check_call(&[Type::int()]), Type::str());
    assert_eq!(builtin("print").check_call(&[]), Type::none());
}

#[test]
fn test_arity_mismatch_keeps_return_type() {
    let chr = builtin("chr");
    assert_eq!(chr.check_call(&[]), Type::str());
    assert_eq!(chr.check_call(&[Type::int(), Type::int()]), Type::str());
}

#[test]
fn test_refined_call_skips_arity_warning() {
    let words = Type::list(vec![Type::str()]);
    let zip = BuiltinFunction::new("zip", vec![Type::list(vec![])], Type::list(vec![]));
    let (ty, warning) = zip.resolve_call(&[words.clone(), words.clone(), words]);
    assert_eq!(ty, Type::list(vec![Type::tuple(vec![Type::str(), Type::str(), Type::str()])]));
    assert_eq!(warning, None);

    let range = BuiltinFunction::new("range", vec![Type::int()], Type::list(vec![]));
    assert_eq!(
        range.resolve_call(&[Type::int(), Type::int(), Type::int()]),
        (Type::list(vec![Type::int()]), None)
    );

    let (ty, warning) = builtin("chr").resolve_call(&[]);
    assert_eq!(ty, Type::str());
    assert_eq!(warning.as_deref(), Some("builtin chr called with 0 arguments, expected 1"));
}

#[test]
fn test_refinements() {
    let words = Type::list(vec![Type::str()]);
    assert_eq!(refine_call("sorted", &[words.clone()]), Some(words.clone()));
    assert_eq!(
        refine_call("set", &[Type::str()]),
        Some(Type::set(vec![Type::str()]))
    );
    assert_eq!(refine_call("range", &[Type::int()]), Some(Type::list(vec![Type::int()])));
    assert_eq!(
        refine_call("enumerate", &[words.clone()]),
        Some(Type::list(vec![Type::tuple(vec![Type::int(), Type::str()])]))
    );
    assert_eq!(
        refine_call("zip", &[words.clone(), Type::list(vec![Type::int()])]),
        Some(Type::list(vec![Type::tuple(vec![Type::str(), Type::int()])]))
    );
    assert_eq!(refine_call("abs", &[Type::complex()]), Some(Type::float()));
    assert_eq!(refine_call("next", &[words]), Some(Type::str()));
    assert_eq!(refine_call("dict", &[Type::int()]), None);
    assert_eq!(refine_call("len", &[Type::int()]), None);
}

#[test]
fn test_min_max_and_sum() {
    assert_eq!(
        refine_call("max", &[Type::int(), Type::float()]),
        Some(Type::union_of(vec![Type::int(), Type::float()], None))
    );
    assert_eq!(
        refine_call("min", &[Type::list(vec![Type::float()])]),
        Some(Type::float())
    );
    assert_eq!(
        refine_call("sum", &[Type::list(vec![Type::float()])]),
        Some(Type::float())
    );
    assert_eq!(refine_call("sum", &[Type::list(vec![])]), Some(Type::int()));
}

#[test]
fn test_list_of_unknown_is_empty_model() {
    assert_eq!(refine_call("list", &[Type::Any]), Some(Type::list(vec![])));
    assert_eq!(refine_call("tuple", &[]), Some(Type::tuple(vec![])));
}

#[test]
fn test_primitive_attributes() {
    match primitive_attribute(Primitive::Str, "upper") {
        Some(Type::Builtin(method)) => {
            assert_eq!(method.name, "str.upper");
            assert_eq!(method.check_call(&[]), Type::str());
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(primitive_attribute(Primitive::Int, "real"), Some(Type::int()));
    assert_eq!(primitive_attribute(Primitive::Float, "imag"), Some(Type::float()));
    assert!(primitive_attribute(Primitive::Bytes, "__len__").is_some());
    assert!(primitive_attribute(Primitive::Int, "__len__").is_none());
    assert!(primitive_attribute(Primitive::Str, "missing").is_none());
    assert!(primitive_attribute(Primitive::NoneType, "__repr__").is_some());
}

#[test]
fn test_exception_names() {
    assert!(is_exception_name("ValueError"));
    assert!(is_exception_name("StopIteration"));
    assert!(is_exception_name("Exception"));
    assert!(!is_exception_name("len"));
    assert!(!is_exception_name("MyError"));
    assert!(is_builtin_name("isinstance"));
    assert!(object_method("__hash__").is_some());
}
