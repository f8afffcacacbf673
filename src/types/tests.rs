//! Unit tests for the type algebra.
//!
//! Covers:
//! - Union construction and normalisation
//! - Subtyping of primitives, containers, classes and unions
//! - Binary and unary operator results
//! - Attribute reads, writes and misses
//! - Display
//! - Algebraic properties (proptest)

use std::rc::Rc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::{
    arena::{AttributeSlot, ClassData, TypeArena},
    attributes::{delete_attribute, get_attribute, has_attribute, set_attribute},
    binop::{resolve_binary_op, resolve_unary_op},
    subtype::is_subtype,
    types::{ClassId, Compound, CompoundKind, Primitive, ProbUnion, Type},
};
use crate::{
    ast::ast::{BinaryOperator, UnaryOperator},
    diagnostics::diagnostics::{DiagnosticFilter, DiagnosticKind, Diagnostics},
    errors::errors::ErrorImpl,
};

fn diagnostics() -> Diagnostics {
    let mut diagnostics = Diagnostics::new(Rc::new(String::from("t.py")), DiagnosticFilter::default());
    diagnostics.set_line(1);
    diagnostics
}

fn class(types: &mut TypeArena, name: &str, bases: Vec<ClassId>) -> ClassId {
    types.add_class(ClassData::new(
        Some(name.to_string()),
        bases,
        Rc::new(String::from("t.py")),
        1,
    ))
}

fn approx(left: f64, right: f64) -> bool {
    (left - right).abs() < 1e-9
}

#[test]
fn test_union_dedups_and_normalises() {
    let union = ProbUnion::new(vec![Type::int(), Type::int(), Type::str()], None);
    assert_eq!(union.len(), 2);
    assert!(approx(union.probs().iter().sum::<f64>(), 1.0));
    assert!(approx(union.probs()[0], 2.0 / 3.0));
}

#[test]
fn test_union_weights() {
    let union = ProbUnion::new(
        vec![Type::int(), Type::str(), Type::int()],
        Some(vec![0.2, 0.6, 0.2]),
    );
    assert_eq!(union.elts(), &[Type::int(), Type::str()]);
    assert!(approx(union.probs()[0], 0.4));
    assert!(approx(union.probs()[1], 0.6));
}

#[test]
fn test_union_mismatched_weights_are_uniform() {
    let union = ProbUnion::new(vec![Type::int(), Type::str()], Some(vec![1.0]));
    assert!(approx(union.probs()[0], 0.5));
}

#[test]
fn test_union_flattens_and_drops_undefined() {
    let inner = Type::union_of(vec![Type::int(), Type::str()], None);
    let union = ProbUnion::new(vec![inner, Type::Undefined, Type::float()], None);
    assert_eq!(union.len(), 3);
    assert!(!union.contains(&Type::Undefined));
    assert!(approx(union.probs()[2], 0.5));
}

#[test]
fn test_union_of_collapses() {
    assert_eq!(Type::union_of(vec![], None), Type::Any);
    assert_eq!(Type::union_of(vec![Type::int(), Type::int()], None), Type::int());
    assert_eq!(Type::union_of(vec![Type::Undefined], None), Type::Any);
}

#[test]
fn test_union_keeps_unhashable_after_hashable() {
    let list = Type::list(vec![Type::int()]);
    let dict = Type::dict(vec![Type::str()], vec![Type::int()]);
    let union = ProbUnion::new(
        vec![list.clone(), Type::int(), dict.clone(), Type::str(), list.clone()],
        None,
    );
    assert_eq!(union.elts(), &[Type::int(), Type::str(), list, dict]);
}

#[test]
fn test_union_equality_is_order_independent() {
    let left = Type::union_of(vec![Type::int(), Type::str()], None);
    let right = Type::union_of(vec![Type::str(), Type::int()], Some(vec![0.9, 0.1]));
    assert_eq!(left, right);
}

#[test]
fn test_primitive_promotion() {
    let types = TypeArena::new();
    assert!(is_subtype(&types, &Type::bool(), &Type::int()));
    assert!(is_subtype(&types, &Type::int(), &Type::float()));
    assert!(is_subtype(&types, &Type::float(), &Type::complex()));
    assert!(is_subtype(&types, &Type::bytes(), &Type::str()));
    assert!(!is_subtype(&types, &Type::int(), &Type::bool()));
    assert!(!is_subtype(&types, &Type::float(), &Type::int()));
    assert!(!is_subtype(&types, &Type::complex(), &Type::float()));
    assert!(!is_subtype(&types, &Type::str(), &Type::int()));
    assert!(!is_subtype(&types, &Type::none(), &Type::int()));
}

#[test]
fn test_any_absorbs_subtyping() {
    let types = TypeArena::new();
    for ty in [Type::int(), Type::list(vec![Type::str()]), Type::none()] {
        assert!(is_subtype(&types, &Type::Any, &ty));
        assert!(is_subtype(&types, &ty, &Type::Any));
        assert!(is_subtype(&types, &Type::Undefined, &ty));
    }
}

#[test]
fn test_container_subtyping() {
    let types = TypeArena::new();
    let ints = Type::list(vec![Type::int()]);
    let numbers = Type::list(vec![Type::int(), Type::float()]);
    let strings = Type::list(vec![Type::str()]);
    assert!(is_subtype(&types, &ints, &numbers));
    assert!(!is_subtype(&types, &strings, &numbers));
    assert!(is_subtype(&types, &Type::list(vec![]), &strings));
    assert!(!is_subtype(&types, &ints, &Type::set(vec![Type::int()])));

    let pair = Type::tuple(vec![Type::int(), Type::str()]);
    assert!(is_subtype(&types, &pair, &Type::tuple(vec![Type::float(), Type::str()])));
    assert!(!is_subtype(&types, &pair, &Type::tuple(vec![Type::int()])));

    let dict = Type::dict(vec![Type::str()], vec![Type::int()]);
    assert!(is_subtype(&types, &dict, &Type::dict(vec![Type::str()], vec![Type::float()])));
    assert!(!is_subtype(&types, &dict, &Type::dict(vec![Type::int()], vec![Type::int()])));
}

#[test]
fn test_union_subtyping() {
    let types = TypeArena::new();
    let union = Type::union_of(vec![Type::int(), Type::str()], None);
    assert!(is_subtype(&types, &union, &Type::str()));
    assert!(is_subtype(&types, &Type::int(), &union));
    assert!(!is_subtype(&types, &union, &Type::bytes()));
}

#[test]
fn test_class_subtyping_by_name() {
    let mut types = TypeArena::new();
    let base = class(&mut types, "Base", vec![]);
    let derived = class(&mut types, "Derived", vec![base]);
    let other = class(&mut types, "Other", vec![]);
    assert!(is_subtype(&types, &Type::Class(derived), &Type::Class(base)));
    assert!(!is_subtype(&types, &Type::Class(base), &Type::Class(derived)));
    assert!(!is_subtype(&types, &Type::Class(other), &Type::Class(base)));

    let instance = types.add_instance(derived);
    let base_instance = types.add_instance(base);
    assert!(is_subtype(&types, &Type::Instance(instance), &Type::Instance(base_instance)));
    assert!(is_subtype(&types, &Type::Instance(instance), &Type::Class(derived)));
}

#[test]
fn test_numeric_binary_ops() {
    let types = TypeArena::new();
    let add = resolve_binary_op(&types, BinaryOperator::Add, &Type::int(), &Type::float());
    assert_eq!(add, Ok(Type::float()));
    let div = resolve_binary_op(&types, BinaryOperator::Div, &Type::int(), &Type::int());
    assert_eq!(div, Ok(Type::float()));
    let floor = resolve_binary_op(&types, BinaryOperator::FloorDiv, &Type::int(), &Type::bool());
    assert_eq!(floor, Ok(Type::int()));
    let complex = resolve_binary_op(&types, BinaryOperator::Mult, &Type::complex(), &Type::int());
    assert_eq!(complex, Ok(Type::complex()));
}

#[test]
fn test_sequence_binary_ops() {
    let types = TypeArena::new();
    assert_eq!(
        resolve_binary_op(&types, BinaryOperator::Mult, &Type::str(), &Type::int()),
        Ok(Type::str())
    );
    assert_eq!(
        resolve_binary_op(&types, BinaryOperator::Mult, &Type::int(), &Type::str()),
        Ok(Type::str())
    );
    assert_eq!(
        resolve_binary_op(&types, BinaryOperator::Mod, &Type::str(), &Type::tuple(vec![Type::int()])),
        Ok(Type::str())
    );

    let concatenated = resolve_binary_op(
        &types,
        BinaryOperator::Add,
        &Type::list(vec![Type::int()]),
        &Type::list(vec![Type::str()]),
    );
    assert_eq!(concatenated, Ok(Type::list(vec![Type::int(), Type::str()])));

    let repeated = resolve_binary_op(
        &types,
        BinaryOperator::Mult,
        &Type::list(vec![Type::int()]),
        &Type::int(),
    );
    assert_eq!(repeated, Ok(Type::list(vec![Type::int()])));
}

#[test]
fn test_binary_mismatch() {
    let types = TypeArena::new();
    let error = resolve_binary_op(&types, BinaryOperator::Add, &Type::str(), &Type::int()).unwrap_err();
    assert_eq!(error.left, Type::str());
    assert_eq!(error.signature(&types), "str + int");

    assert!(resolve_binary_op(&types, BinaryOperator::Sub, &Type::list(vec![]), &Type::int()).is_err());
}

#[test]
fn test_binary_exemptions() {
    let types = TypeArena::new();
    assert_eq!(
        resolve_binary_op(&types, BinaryOperator::Add, &Type::Any, &Type::str()),
        Ok(Type::Any)
    );
    assert_eq!(
        resolve_binary_op(&types, BinaryOperator::Add, &Type::none(), &Type::int()),
        Ok(Type::Any)
    );
    assert_eq!(
        resolve_binary_op(&types, BinaryOperator::BitOr, &Type::str(), &Type::int()),
        Ok(Type::Any)
    );
}

#[test]
fn test_union_operands() {
    let types = TypeArena::new();
    let union = Type::union_of(vec![Type::int(), Type::str()], None);
    assert_eq!(
        resolve_binary_op(&types, BinaryOperator::Add, &union, &Type::int()),
        Ok(Type::int())
    );
    let bytes_or_list = Type::union_of(vec![Type::bytes(), Type::list(vec![])], None);
    assert!(resolve_binary_op(&types, BinaryOperator::Sub, &bytes_or_list, &Type::float()).is_err());
}

#[test]
fn test_unary_ops() {
    assert_eq!(resolve_unary_op(UnaryOperator::Not, &Type::str()), Type::bool());
    assert_eq!(resolve_unary_op(UnaryOperator::Neg, &Type::bool()), Type::int());
    assert_eq!(resolve_unary_op(UnaryOperator::Neg, &Type::float()), Type::float());
    assert_eq!(resolve_unary_op(UnaryOperator::Invert, &Type::float()), Type::Any);
    assert_eq!(resolve_unary_op(UnaryOperator::Pos, &Type::str()), Type::Any);
}

#[test]
fn test_instance_attribute_miss() {
    let mut types = TypeArena::new();
    let mut diagnostics = diagnostics();
    let point = class(&mut types, "Point", vec![]);
    let instance = types.add_instance(point);

    let (ty, found) = get_attribute(&mut types, &mut diagnostics, &Type::Instance(instance), "missing", 0.9);
    assert_eq!(ty, Type::Any);
    assert!(!found);

    let reported = diagnostics.drain();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].kind, DiagnosticKind::AttributeError);
    assert!(approx(reported[0].confidence, 0.1));

    let (ty, found) = get_attribute(&mut types, &mut diagnostics, &Type::Instance(instance), "missing", 0.9);
    assert_eq!(ty, Type::Any);
    assert!(found);
    assert!(diagnostics.drain().is_empty());
}

#[test]
fn test_instance_reads_class_attributes() {
    let mut types = TypeArena::new();
    let mut diagnostics = diagnostics();
    let base = class(&mut types, "Base", vec![]);
    types
        .class_mut(base)
        .attributes
        .insert(String::from("size"), AttributeSlot::Type(Type::int()));
    let derived = class(&mut types, "Derived", vec![base]);
    let instance = types.add_instance(derived);

    assert!(!types.class(derived).bases_merged());
    let (ty, found) = get_attribute(&mut types, &mut diagnostics, &Type::Instance(instance), "size", 1.0);
    assert_eq!((ty, found), (Type::int(), true));
    assert!(types.class(derived).bases_merged());
    assert!(has_attribute(&types, &Type::Class(derived), "size"));
}

#[test]
fn test_class_attribute_miss() {
    let mut types = TypeArena::new();
    let mut diagnostics = diagnostics();
    let named = class(&mut types, "Config", vec![]);
    let (ty, found) = get_attribute(&mut types, &mut diagnostics, &Type::Class(named), "debug", 0.5);
    assert_eq!((ty, found), (Type::Any, false));
    let reported = diagnostics.drain();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].kind, DiagnosticKind::ClassAttributeError);

    let anonymous = types.add_class(ClassData::new(None, vec![], Rc::new(String::from("t.py")), 1));
    get_attribute(&mut types, &mut diagnostics, &Type::Class(anonymous), "debug", 0.5);
    get_attribute(&mut types, &mut diagnostics, &Type::Class(named), "__slots__", 0.5);
    assert!(diagnostics.drain().is_empty());
}

#[test]
fn test_primitive_attributes() {
    let mut types = TypeArena::new();
    let mut diagnostics = diagnostics();
    let (upper, found) = get_attribute(&mut types, &mut diagnostics, &Type::str(), "upper", 1.0);
    assert!(found);
    match upper {
        Type::Builtin(builtin) => assert_eq!(builtin.check_call(&[]), Type::str()),
        other => panic!("expected builtin, got {:?}", other),
    }

    let (real, _) = get_attribute(&mut types, &mut diagnostics, &Type::int(), "real", 1.0);
    assert_eq!(real, Type::int());
    let (_, found) = get_attribute(&mut types, &mut diagnostics, &Type::int(), "__add__", 1.0);
    assert!(found);
    assert!(diagnostics.drain().is_empty());

    let (_, found) = get_attribute(&mut types, &mut diagnostics, &Type::str(), "foo", 0.75);
    assert!(!found);
    let reported = diagnostics.drain();
    assert_eq!(reported.len(), 1);
    assert!(approx(reported[0].confidence, 0.25));
}

#[test]
fn test_unknown_and_doc_attributes() {
    let mut types = TypeArena::new();
    let mut diagnostics = diagnostics();
    assert_eq!(get_attribute(&mut types, &mut diagnostics, &Type::Any, "x", 0.5), (Type::Any, true));
    assert_eq!(
        get_attribute(&mut types, &mut diagnostics, &Type::Undefined, "x", 0.5),
        (Type::Any, true)
    );
    assert_eq!(
        get_attribute(&mut types, &mut diagnostics, &Type::int(), "__doc__", 0.5),
        (Type::str(), true)
    );
}

#[test]
fn test_dict_attributes() {
    let mut types = TypeArena::new();
    let mut diagnostics = diagnostics();
    let dict = Type::dict(vec![Type::str()], vec![Type::int()]);
    let (keys, _) = get_attribute(&mut types, &mut diagnostics, &dict, "keys", 1.0);
    match keys {
        Type::Builtin(builtin) => assert_eq!(builtin.check_call(&[]), Type::list(vec![Type::str()])),
        other => panic!("expected builtin, got {:?}", other),
    }
    let (get, _) = get_attribute(&mut types, &mut diagnostics, &dict, "get", 1.0);
    match get {
        Type::Builtin(builtin) => assert_eq!(builtin.ret, Type::int()),
        other => panic!("expected builtin, got {:?}", other),
    }
}

#[test]
fn test_union_attribute_access() {
    let mut types = TypeArena::new();
    let mut diagnostics = diagnostics();
    let union = Type::union_of(vec![Type::int(), Type::float()], None);
    let (real, found) = get_attribute(&mut types, &mut diagnostics, &union, "real", 1.0);
    assert!(found);
    assert_eq!(real, Type::union_of(vec![Type::int(), Type::float()], None));
}

#[test]
fn test_set_attribute_merges_incompatible() {
    let mut types = TypeArena::new();
    let point = class(&mut types, "Point", vec![]);
    let instance = Type::Instance(types.add_instance(point));

    set_attribute(&mut types, &instance, "x", Type::int()).unwrap();
    set_attribute(&mut types, &instance, "x", Type::bool()).unwrap();
    let mut diagnostics = diagnostics();
    let (x, _) = get_attribute(&mut types, &mut diagnostics, &instance, "x", 1.0);
    assert_eq!(x, Type::bool());

    set_attribute(&mut types, &instance, "x", Type::str()).unwrap();
    let (x, _) = get_attribute(&mut types, &mut diagnostics, &instance, "x", 1.0);
    assert_eq!(x, Type::union_of(vec![Type::bool(), Type::str()], None));

    assert!(types.class(point).attributes.is_empty());
    assert!(delete_attribute(&mut types, &instance, "x"));
    assert!(!delete_attribute(&mut types, &instance, "x"));
}

#[test]
fn test_set_attribute_on_builtin_fails() {
    let mut types = TypeArena::new();
    let error = set_attribute(&mut types, &Type::int(), "x", Type::int()).unwrap_err();
    match error {
        ErrorImpl::CantSetAttribute { attribute, type_ } => {
            assert_eq!(attribute, "x");
            assert_eq!(type_, "int");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_display() {
    let mut types = TypeArena::new();
    let point = class(&mut types, "Point", vec![]);
    let instance = types.add_instance(point);
    assert_eq!(types.display(&Type::int()), "int");
    assert_eq!(types.display(&Type::none()), "None");
    assert_eq!(types.display(&Type::list(vec![Type::int()])), "List[int]");
    assert_eq!(types.display(&Type::list(vec![])), "List");
    assert_eq!(
        types.display(&Type::dict(vec![Type::str()], vec![Type::int()])),
        "Dict[str, int]"
    );
    assert_eq!(
        types.display(&Type::tuple(vec![Type::int(), Type::str()])),
        "Tuple[int, str]"
    );
    assert_eq!(
        types.display(&Type::union_of(vec![Type::int(), Type::str()], None)),
        "ProbType{int:0.5,str:0.5}"
    );
    assert_eq!(types.display(&Type::Class(point)), "class Point");
    assert_eq!(types.display(&Type::Instance(instance)), "Point");
}

#[test]
fn test_element_types() {
    assert_eq!(Type::list(vec![Type::int()]).element_type(), Type::int());
    assert_eq!(Type::str().element_type(), Type::str());
    assert_eq!(Type::bytes().element_type(), Type::int());
    assert_eq!(Type::dict(vec![Type::str()], vec![Type::int()]).element_type(), Type::str());
    assert_eq!(Type::int().element_type(), Type::Any);
    assert_eq!(Type::list(vec![]).element_type(), Type::Any);
}

#[test]
fn test_compound_model() {
    let mut list = Compound::new(CompoundKind::List, vec![Type::int(), Type::int()]);
    assert_eq!(list.elts.len(), 1);
    list.push(Type::str(), None);
    list.push(Type::Undefined, None);
    assert_eq!(list.elts, vec![Type::int(), Type::str()]);

    let tuple = Compound::new(CompoundKind::Tuple, vec![Type::int(), Type::int()]);
    assert_eq!(tuple.elts.len(), 2);
    assert_eq!(Primitive::from_name("NoneType"), Some(Primitive::NoneType));
}

fn primitive_strategy() -> impl Strategy<Value = Type> {
    prop_oneof![
        Just(Type::int()),
        Just(Type::float()),
        Just(Type::complex()),
        Just(Type::bool()),
        Just(Type::str()),
        Just(Type::bytes()),
        Just(Type::none()),
    ]
}

fn type_strategy() -> impl Strategy<Value = Type> {
    primitive_strategy().prop_recursive(2, 12, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(Type::list),
            prop::collection::vec(inner.clone(), 0..3).prop_map(Type::tuple),
            prop::collection::vec(inner.clone(), 1..4).prop_map(|elts| Type::union_of(elts, None)),
        ]
    })
}

proptest! {
    #[test]
    fn test_subtype_reflexive(ty in type_strategy()) {
        let types = TypeArena::new();
        prop_assert!(is_subtype(&types, &ty, &ty));
    }

    #[test]
    fn test_any_absorption(ty in type_strategy()) {
        let types = TypeArena::new();
        prop_assert!(is_subtype(&types, &Type::Any, &ty));
        prop_assert!(is_subtype(&types, &ty, &Type::Any));
        for op in [BinaryOperator::Add, BinaryOperator::Sub, BinaryOperator::Mult, BinaryOperator::Mod] {
            prop_assert!(resolve_binary_op(&types, op, &Type::Any, &ty).is_ok());
            prop_assert!(resolve_binary_op(&types, op, &ty, &Type::Any).is_ok());
        }
    }

    #[test]
    fn test_union_probabilities_sum_to_one(
        elts in prop::collection::vec(type_strategy(), 1..6),
        weights in prop::collection::vec(0.0f64..10.0, 1..6),
    ) {
        let probs = if weights.len() == elts.len() { Some(weights) } else { None };
        let union = ProbUnion::new(elts, probs);
        prop_assert_eq!(union.elts().len(), union.probs().len());
        prop_assert!(!union.is_empty());
        prop_assert!((union.probs().iter().sum::<f64>() - 1.0).abs() < 1e-9);
        for (index, elt) in union.elts().iter().enumerate() {
            prop_assert!(!matches!(elt, Type::Union(_) | Type::Undefined));
            prop_assert!(!union.elts()[index + 1..].contains(elt));
        }
    }
}
