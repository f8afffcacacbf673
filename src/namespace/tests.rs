//! Unit tests for the scope manager.
//!
//! Covers:
//! - Lookup through the parent chain
//! - Override and annotation diagnostics
//! - Function scope copies
//! - Branch merging, narrowing and removal
//! - `global` and `nonlocal` redirects

use std::rc::Rc;

use pretty_assertions::assert_eq;

use super::type_map::TypeMap;
use crate::{
    diagnostics::diagnostics::{DiagnosticFilter, DiagnosticKind, Diagnostics},
    types::{
        arena::{ClassData, ModuleData, TypeArena},
        types::Type,
    },
};

fn setup() -> (TypeMap, TypeArena, Diagnostics) {
    (
        TypeMap::new(),
        TypeArena::new(),
        Diagnostics::new(Rc::new(String::from("scope.py")), DiagnosticFilter::default()),
    )
}

#[test]
fn test_find_walks_parents() {
    let (mut map, types, mut diagnostics) = setup();
    map.add_variable(&types, &mut diagnostics, "x", Type::int(), 1.0);
    map.enter_namespace("inner");
    assert_eq!(map.find("x"), Type::int());
    assert!(!map.in_namespace("x"));
    assert_eq!(map.find("missing"), Type::Any);

    map.add_variable(&types, &mut diagnostics, "y", Type::str(), 1.0);
    map.exit_namespace();
    assert_eq!(map.find("y"), Type::Any);
}

#[test]
fn test_exit_global_is_noop() {
    let (mut map, _, _) = setup();
    map.exit_namespace();
    assert_eq!(map.current(), map.global());
}

#[test]
fn test_override_reported_and_merged() {
    let (mut map, types, mut diagnostics) = setup();
    map.add_variable(&types, &mut diagnostics, "x", Type::int(), 1.0);
    map.add_variable(&types, &mut diagnostics, "x", Type::bool(), 1.0);
    assert!(diagnostics.drain().is_empty());
    assert_eq!(map.find("x"), Type::bool());

    map.add_variable(&types, &mut diagnostics, "x", Type::str(), 0.5);
    let reported = diagnostics.drain();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].kind, DiagnosticKind::OverrideTypeError);
    assert_eq!(map.find("x"), Type::union_of(vec![Type::bool(), Type::str()], None));
}

#[test]
fn test_override_confidence_is_error_probability() {
    let (mut map, types, mut diagnostics) = setup();
    map.add_variable(&types, &mut diagnostics, "x", Type::int(), 1.0);
    map.add_variable(&types, &mut diagnostics, "x", Type::str(), 0.9);
    let reported = diagnostics.drain();
    assert_eq!(reported.len(), 1);
    assert!((reported[0].confidence - 0.1).abs() < 1e-9, "{:?}", reported[0]);
}

#[test]
fn test_lookup_from_other_namespace() {
    let (mut map, types, mut diagnostics) = setup();
    let module = map.current();
    map.add_variable(&types, &mut diagnostics, "x", Type::int(), 1.0);
    map.enter_namespace("inner");
    map.add_variable(&types, &mut diagnostics, "y", Type::str(), 1.0);

    assert_eq!(map.lookup_from(module, "x").map(|binding| binding.ty.clone()), Some(Type::int()));
    assert!(map.lookup_from(module, "y").is_none());
    assert!(map.lookup("y").is_some());
}

#[test]
fn test_override_exemptions() {
    let (mut map, types, mut diagnostics) = setup();
    map.add_variable(&types, &mut diagnostics, "a", Type::Any, 1.0);
    map.add_variable(&types, &mut diagnostics, "a", Type::str(), 1.0);
    map.add_variable(&types, &mut diagnostics, "b", Type::none(), 1.0);
    map.add_variable(&types, &mut diagnostics, "b", Type::int(), 1.0);
    map.add_variable(&types, &mut diagnostics, "c", Type::int(), 1.0);
    map.add_variable(&types, &mut diagnostics, "c", Type::Any, 1.0);
    assert!(diagnostics.drain().is_empty());
    assert_eq!(map.find("b"), Type::int());
}

#[test]
fn test_shadowing_reports_without_merging() {
    let (mut map, types, mut diagnostics) = setup();
    map.add_variable(&types, &mut diagnostics, "x", Type::int(), 1.0);
    map.enter_namespace("inner");
    diagnostics.set_line(2);
    map.add_variable(&types, &mut diagnostics, "x", Type::str(), 1.0);
    assert_eq!(diagnostics.drain().len(), 1);
    assert_eq!(map.find("x"), Type::str());
}

#[test]
fn test_annotated_variable() {
    let (mut map, types, mut diagnostics) = setup();
    map.add_annotated_variable(&types, &mut diagnostics, "n", Type::int(), Type::bool(), 1.0);
    assert_eq!(map.find("n"), Type::bool());

    map.add_annotated_variable(&types, &mut diagnostics, "m", Type::int(), Type::none(), 1.0);
    assert_eq!(map.find("m"), Type::int());
    assert!(diagnostics.drain().is_empty());

    map.add_annotated_variable(&types, &mut diagnostics, "s", Type::int(), Type::str(), 0.5);
    let reported = diagnostics.drain();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].kind, DiagnosticKind::ValueAnnotationMismatch);
    assert_eq!(map.find("s"), Type::int());
}

#[test]
fn test_function_scope_is_a_copy() {
    let (mut map, types, mut diagnostics) = setup();
    map.add_variable(&types, &mut diagnostics, "outer", Type::int(), 1.0);
    let module = map.current();

    let first = map.enter_function_scope("f", module, vec![(String::from("n"), Type::int())]);
    map.add_variable(&types, &mut diagnostics, "local", Type::str(), 1.0);
    assert_eq!(map.find("outer"), Type::int());

    let second = map.enter_function_scope("f", module, vec![(String::from("n"), Type::float())]);
    assert_ne!(first, second);
    assert_eq!(map.find("local"), Type::Any);
    assert_eq!(map.find("n"), Type::float());
    map.exit_function_scope();

    assert_eq!(map.current(), first);
    assert_eq!(map.find("n"), Type::int());
    map.exit_function_scope();

    assert_eq!(map.current(), module);
    assert_eq!(map.find("local"), Type::Any);
    assert!(!map.namespace(module).contains("n"));
}

#[test]
fn test_branch_merge() {
    let (mut map, types, mut diagnostics) = setup();
    map.add_variable(&types, &mut diagnostics, "x", Type::int(), 1.0);
    map.enter_namespace("if");
    map.add_variable(&types, &mut diagnostics, "x", Type::str(), 1.0);
    map.add_variable(&types, &mut diagnostics, "fresh", Type::float(), 1.0);
    map.narrow_variable("narrowed", Type::bytes());
    map.exit_branch_namespace(&types);

    assert_eq!(map.find("x"), Type::union_of(vec![Type::int(), Type::str()], None));
    assert_eq!(map.find("fresh"), Type::float());
    assert_eq!(map.find("narrowed"), Type::Any);
}

#[test]
fn test_narrow_skips_checks() {
    let (mut map, types, mut diagnostics) = setup();
    map.add_variable(&types, &mut diagnostics, "x", Type::int(), 1.0);
    map.narrow_variable("x", Type::str());
    assert!(diagnostics.drain().is_empty());
    assert!(map.lookup("x").unwrap().narrowed);
}

#[test]
fn test_remove_variable() {
    let (mut map, types, mut diagnostics) = setup();
    map.add_variable(&types, &mut diagnostics, "e", Type::Any, 1.0);
    map.enter_namespace("inner");
    assert!(map.remove_variable("e"));
    assert!(!map.remove_variable("e"));
    map.exit_namespace();
    assert!(!map.in_namespace("e"));
}

#[test]
fn test_generation_moves() {
    let (mut map, types, mut diagnostics) = setup();
    let before = map.generation();
    map.add_variable(&types, &mut diagnostics, "x", Type::int(), 1.0);
    assert!(map.generation() > before);
}

#[test]
fn test_global_and_nonlocal() {
    let (mut map, types, mut diagnostics) = setup();
    map.enter_namespace("module");
    map.enter_namespace("outer");
    map.add_variable(&types, &mut diagnostics, "count", Type::int(), 1.0);
    map.enter_namespace("inner");
    map.declare_nonlocal("count");
    map.declare_global("flag");
    map.add_variable(&types, &mut diagnostics, "count", Type::int(), 1.0);
    map.add_variable(&types, &mut diagnostics, "flag", Type::bool(), 1.0);
    assert!(!map.in_namespace("count"));
    assert!(!map.in_namespace("flag"));
    assert!(map.namespace(map.global()).contains("flag"));
}

#[test]
fn test_global_targets_module_scope() {
    let (mut map, types, mut diagnostics) = setup();
    let module = map.enter_namespace("module");
    map.set_module_scope(module);
    map.add_variable(&types, &mut diagnostics, "total", Type::int(), 1.0);

    let call = map.enter_function_scope("bump", module, vec![]);
    map.declare_global("total");
    map.add_variable(&types, &mut diagnostics, "total", Type::str(), 1.0);
    assert_eq!(map.find("total"), Type::union_of(vec![Type::int(), Type::str()], None));
    map.exit_function_scope();

    assert!(!map.namespace(call).redirects.is_empty());
    assert_eq!(
        map.namespace(module).get("total").map(|binding| binding.ty.clone()),
        Some(Type::union_of(vec![Type::int(), Type::str()], None))
    );
    assert!(!map.namespace(map.global()).contains("total"));
}

#[test]
fn test_find_dotted() {
    let (mut map, mut types, mut diagnostics) = setup();
    let class = types.add_class(ClassData::new(
        Some(String::from("Config")),
        vec![],
        Rc::new(String::from("scope.py")),
        1,
    ));
    let mut exports = indexmap::IndexMap::new();
    exports.insert(String::from("Config"), Type::Class(class));
    let module = types.add_module(ModuleData {
        name: String::from("settings"),
        exports,
    });
    map.add_module("settings", Type::Module(module));
    map.add_variable(&types, &mut diagnostics, "n", Type::int(), 1.0);

    assert_eq!(map.find_dotted(&types, "settings.Config"), Type::Class(class));
    assert_eq!(map.find_dotted(&types, "settings.Missing"), Type::Any);
    assert_eq!(map.find_dotted(&types, "n.real"), Type::Any);
}

#[test]
fn test_update_variable_in_defining_scope() {
    let (mut map, types, mut diagnostics) = setup();
    map.add_variable(&types, &mut diagnostics, "items", Type::list(vec![]), 0.5);
    map.enter_namespace("inner");
    map.update_variable("items", Type::list(vec![Type::int()]));
    assert!(!map.in_namespace("items"));
    map.exit_namespace();

    let binding = map.lookup("items").unwrap();
    assert_eq!(binding.ty, Type::list(vec![Type::int()]));
    assert_eq!(binding.confidence, 0.5);

    map.update_variable("fresh", Type::str());
    assert!(map.in_namespace("fresh"));
}

#[test]
fn test_set_variable_skips_checks() {
    let (mut map, types, mut diagnostics) = setup();
    map.add_variable(&types, &mut diagnostics, "e", Type::int(), 1.0);
    map.set_variable("e", Type::str(), 1.0);
    assert!(diagnostics.drain().is_empty());
    assert_eq!(map.find("e"), Type::str());
}
