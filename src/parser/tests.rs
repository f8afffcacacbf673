//! Unit tests for the parser module.
//!
//! This module contains tests for parsing various language constructs including:
//! - Assignments (plain, chained, annotated, augmented, destructuring)
//! - Function and class definitions
//! - Operator precedence and comparison chains
//! - Displays and comprehensions
//! - Control flow and exception handling
//! - Imports
//! - Error cases

use std::rc::Rc;

use indoc::indoc;

use super::parser::parse;
use crate::{
    ast::{
        ast::{BinaryOperator, BoolOperator, CompareOperator, Module, UnaryOperator},
        expressions::{ExprKind, NumberLiteral},
        statements::{names_used, Stmt, StmtKind},
    },
    errors::errors::Error,
    lexer::lexer::tokenize,
};

fn parse_source(source: &str) -> Result<Module, Error> {
    let tokens = tokenize(source.to_string(), Some("test.py".to_string())).unwrap();
    parse(tokens, Rc::new("test.py".to_string())).1
}

fn single(source: &str) -> Stmt {
    let mut module = parse_source(source).unwrap();
    assert_eq!(module.body.len(), 1);
    module.body.remove(0)
}

#[test]
fn test_parse_assignment() {
    let stmt = single("x = 42\n");

    match stmt.kind {
        StmtKind::Assign { targets, value } => {
            assert_eq!(targets.len(), 1);
            assert_eq!(targets[0].as_name(), Some("x"));
            assert!(matches!(value.kind, ExprKind::Number(NumberLiteral::Int(42))));
        }
        other => panic!("unexpected statement {:?}", other),
    }
}

#[test]
fn test_parse_chained_assignment() {
    let stmt = single("a = b = 1.5\n");
    match stmt.kind {
        StmtKind::Assign { targets, value } => {
            assert_eq!(targets.len(), 2);
            assert!(matches!(value.kind, ExprKind::Number(NumberLiteral::Float(_))));
        }
        other => panic!("unexpected statement {:?}", other),
    }
}

#[test]
fn test_parse_tuple_unpacking() {
    let stmt = single("a, b = b, a\n");
    match stmt.kind {
        StmtKind::Assign { targets, value } => {
            assert!(matches!(&targets[0].kind, ExprKind::Tuple(elements) if elements.len() == 2));
            assert!(matches!(&value.kind, ExprKind::Tuple(elements) if elements.len() == 2));
        }
        other => panic!("unexpected statement {:?}", other),
    }
}

#[test]
fn test_parse_annotated_and_augmented() {
    let module = parse_source("x: int = 1\ny: str\nx += 2\n").unwrap();

    assert!(matches!(
        &module.body[0].kind,
        StmtKind::AnnAssign { value: Some(_), .. }
    ));
    assert!(matches!(&module.body[1].kind, StmtKind::AnnAssign { value: None, .. }));
    assert!(matches!(
        &module.body[2].kind,
        StmtKind::AugAssign {
            op: BinaryOperator::Add,
            ..
        }
    ));
}

#[test]
fn test_parse_precedence() {
    let stmt = single("x = 1 + 2 * 3 ** 2\n");
    let StmtKind::Assign { value, .. } = stmt.kind else {
        panic!("expected assignment");
    };

    match value.kind {
        ExprKind::BinOp { op, right, .. } => {
            assert_eq!(op, BinaryOperator::Add);
            match right.kind {
                ExprKind::BinOp { op, right, .. } => {
                    assert_eq!(op, BinaryOperator::Mult);
                    assert!(matches!(right.kind, ExprKind::BinOp { op: BinaryOperator::Pow, .. }));
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_parse_unary_minus_power() {
    let stmt = single("-x ** 2\n");
    let StmtKind::Expr(expr) = stmt.kind else {
        panic!("expected expression");
    };
    assert!(matches!(
        expr.kind,
        ExprKind::UnaryOp {
            op: UnaryOperator::Neg,
            ..
        }
    ));
}

#[test]
fn test_parse_comparison_chain() {
    let stmt = single("a < b <= c not in d\n");
    let StmtKind::Expr(expr) = stmt.kind else {
        panic!("expected expression");
    };

    match expr.kind {
        ExprKind::Compare { ops, comparators, .. } => {
            assert_eq!(
                ops,
                vec![CompareOperator::Lt, CompareOperator::LtE, CompareOperator::NotIn]
            );
            assert_eq!(comparators.len(), 3);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_parse_boolean_flattening() {
    let stmt = single("a and b and not c or d\n");
    let StmtKind::Expr(expr) = stmt.kind else {
        panic!("expected expression");
    };

    match expr.kind {
        ExprKind::BoolOp { op, values } => {
            assert_eq!(op, BoolOperator::Or);
            assert!(matches!(&values[0].kind, ExprKind::BoolOp { op: BoolOperator::And, values } if values.len() == 3));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_parse_ternary_and_lambda() {
    let stmt = single("f = lambda x, y=1: x if y else -x\n");
    let StmtKind::Assign { value, .. } = stmt.kind else {
        panic!("expected assignment");
    };

    match value.kind {
        ExprKind::Lambda { params, body } => {
            assert_eq!(params.args.len(), 2);
            assert_eq!(params.defaults.len(), 1);
            assert!(matches!(body.kind, ExprKind::IfExp { .. }));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_parse_call_arguments() {
    let stmt = single("f(1, *rest, key=2, **extra)\n");
    let StmtKind::Expr(expr) = stmt.kind else {
        panic!("expected expression");
    };

    match expr.kind {
        ExprKind::Call { args, keywords, .. } => {
            assert_eq!(args.len(), 2);
            assert!(matches!(args[1].kind, ExprKind::Starred(_)));
            assert_eq!(keywords.len(), 2);
            assert_eq!(keywords[0].arg.as_deref(), Some("key"));
            assert!(keywords[1].arg.is_none());
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_parse_displays_and_comprehensions() {
    let module = parse_source(indoc! {"
        a = [x * 2 for x in range(3) if x]
        b = {k: v for k, v in items}
        c = {1, 2}
        d = {'a': 1, **rest}
        e = (x for x in y)
        f = ()
        g = (1,)
    "})
    .unwrap();

    let values: Vec<&ExprKind> = module
        .body
        .iter()
        .map(|stmt| match &stmt.kind {
            StmtKind::Assign { value, .. } => &value.kind,
            other => panic!("unexpected {:?}", other),
        })
        .collect();

    assert!(matches!(values[0], ExprKind::ListComp { generators, .. } if generators[0].ifs.len() == 1));
    assert!(matches!(values[1], ExprKind::DictComp { .. }));
    assert!(matches!(values[2], ExprKind::Set(elements) if elements.len() == 2));
    assert!(matches!(values[3], ExprKind::Dict { keys, .. } if keys.len() == 2 && keys[1].is_none()));
    assert!(matches!(values[4], ExprKind::GeneratorExp { .. }));
    assert!(matches!(values[5], ExprKind::Tuple(elements) if elements.is_empty()));
    assert!(matches!(values[6], ExprKind::Tuple(elements) if elements.len() == 1));
}

#[test]
fn test_parse_subscripts_and_slices() {
    let stmt = single("x = a[1:2, ::3][0].b\n");
    let StmtKind::Assign { value, .. } = stmt.kind else {
        panic!("expected assignment");
    };

    let ExprKind::Attribute { value, attr } = value.kind else {
        panic!("expected attribute");
    };
    assert_eq!(attr, "b");

    let ExprKind::Subscript { value, .. } = value.kind else {
        panic!("expected subscript");
    };
    let ExprKind::Subscript { slice, .. } = value.kind else {
        panic!("expected subscript");
    };
    assert!(matches!(&slice.kind, ExprKind::Tuple(elements) if matches!(elements[1].kind, ExprKind::Slice { .. })));
}

#[test]
fn test_parse_function_declaration() {
    let stmt = single(indoc! {"
        @decorator
        def add(a: int, b: int = 1, *args, c, d=2, **kw) -> int:
            '''Adds.'''
            return a + b
    "});

    match stmt.kind {
        StmtKind::FunctionDef(def) => {
            assert_eq!(def.name, "add");
            assert_eq!(def.params.args.len(), 2);
            assert_eq!(def.params.defaults.len(), 1);
            assert_eq!(def.params.vararg.as_ref().map(|p| p.name.as_str()), Some("args"));
            assert_eq!(def.params.kwonly.len(), 2);
            assert!(def.params.kw_defaults[0].is_none());
            assert!(def.params.kwarg.is_some());
            assert!(def.returns.is_some());
            assert!(def.has_decorator("decorator"));
            assert_eq!(def.body.len(), 2);
            assert_eq!(stmt.span.start.line, 2);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_parse_stub_function() {
    let stmt = single("def f(x: int) -> str: ...\n");
    match stmt.kind {
        StmtKind::FunctionDef(def) => assert!(def.is_stub()),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_parse_class_declaration() {
    let stmt = single(indoc! {"
        class Point(Base, metaclass=Meta):
            x = 0

            def __init__(self, x):
                self.x = x
    "});

    match stmt.kind {
        StmtKind::ClassDef(def) => {
            assert_eq!(def.name, "Point");
            assert_eq!(def.bases.len(), 1);
            assert_eq!(def.keywords.len(), 1);
            assert_eq!(def.body.len(), 2);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_parse_if_elif_else() {
    let stmt = single(indoc! {"
        if a:
            x = 1
        elif b:
            x = 2
        else:
            x = 3
    "});

    match stmt.kind {
        StmtKind::If { orelse, .. } => {
            assert_eq!(orelse.len(), 1);
            assert!(matches!(&orelse[0].kind, StmtKind::If { orelse, .. } if orelse.len() == 1));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_parse_loops() {
    let module = parse_source(indoc! {"
        for i, v in enumerate(xs):
            continue
        else:
            pass
        while True: break
    "})
    .unwrap();

    assert!(matches!(&module.body[0].kind, StmtKind::For { target, orelse, .. }
        if matches!(target.kind, ExprKind::Tuple(_)) && orelse.len() == 1));
    assert!(matches!(&module.body[1].kind, StmtKind::While { body, .. } if body.len() == 1));
}

#[test]
fn test_parse_try_with() {
    let module = parse_source(indoc! {"
        try:
            x = a.b
        except (AttributeError, KeyError) as e:
            pass
        except:
            raise
        finally:
            done()
        with open(p) as fh, lock:
            pass
    "})
    .unwrap();

    match &module.body[0].kind {
        StmtKind::Try {
            handlers,
            finalbody,
            ..
        } => {
            assert_eq!(handlers.len(), 2);
            assert_eq!(handlers[0].name.as_deref(), Some("e"));
            assert!(handlers[1].type_.is_none());
            assert_eq!(finalbody.len(), 1);
        }
        other => panic!("unexpected {:?}", other),
    }

    assert!(matches!(&module.body[1].kind, StmtKind::With { items, .. }
        if items.len() == 2 && items[0].vars.is_some()));
}

#[test]
fn test_parse_imports() {
    let module = parse_source(indoc! {"
        import os.path as p, sys
        from ..pkg.mod import (a as b, c)
        from m import *
    "})
    .unwrap();

    match &module.body[0].kind {
        StmtKind::Import(names) => {
            assert_eq!(names[0].name, "os.path");
            assert_eq!(names[0].bound_name(), "p");
            assert_eq!(names[1].bound_name(), "sys");
        }
        other => panic!("unexpected {:?}", other),
    }

    match &module.body[1].kind {
        StmtKind::ImportFrom {
            module,
            names,
            level,
        } => {
            assert_eq!(module, "pkg.mod");
            assert_eq!(*level, 2);
            assert_eq!(names.len(), 2);
            assert_eq!(names[0].bound_name(), "b");
        }
        other => panic!("unexpected {:?}", other),
    }

    assert!(matches!(&module.body[2].kind, StmtKind::ImportFrom { names, .. } if names[0].name == "*"));
}

#[test]
fn test_parse_simple_statements_on_one_line() {
    let module = parse_source("x = 1; del x; global y\n").unwrap();
    assert_eq!(module.body.len(), 3);
    assert!(matches!(&module.body[1].kind, StmtKind::Delete(targets) if targets.len() == 1));
    assert!(matches!(&module.body[2].kind, StmtKind::Global(names) if names == &vec!["y".to_string()]));
}

#[test]
fn test_node_ids_are_unique() {
    let module = parse_source("a = b + c\nd = e\n").unwrap();
    let first = &module.body[0];
    let second = &module.body[1];
    assert_ne!(first.id, second.id);

    let StmtKind::Assign { value, targets } = &first.kind else {
        panic!("expected assignment");
    };
    assert_ne!(value.id, targets[0].id);
}

#[test]
fn test_names_used_walks_nested_blocks() {
    let module = parse_source(indoc! {r#"
        total = offset
        for item in items:
            if item:
                total = total + item
        def inner():
            return [x * scale for x in values]
    "#})
    .unwrap();

    let names = names_used(&module.body);
    for expected in ["offset", "items", "item", "total", "scale", "values"] {
        assert!(names.contains(&expected.to_string()), "{} missing from {:?}", expected, names);
    }
    let mut unique = names.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), names.len());
}

#[test]
fn test_parse_error_missing_colon() {
    let result = parse_source("if x\n    pass\n");
    assert!(result.is_err());
}

#[test]
fn test_parse_error_missing_indent() {
    let result = parse_source("def f():\nreturn 1\n");
    assert_eq!(result.err().unwrap().get_error_name(), "UnexpectedTokenDetailed");
}
