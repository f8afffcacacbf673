//! Integration tests for the full checking pipeline.
//!
//! Source text goes through tokenization, parsing and checking; the tests
//! look at the exported symbol table and the diagnostics that reached the
//! sink.

use std::rc::Rc;

use indoc::indoc;
use pretty_assertions::assert_eq;
use probcheck::{
    diagnostics::diagnostics::{Diagnostic, DiagnosticKind},
    lexer::lexer::tokenize,
    parser::parser::parse,
    type_checker::{
        config::CheckConfig,
        modules::{MemoryModuleCache, ModuleCache},
        type_checker::{check, check_with, CheckContext, SymbolTable},
    },
    types::types::Type,
};

fn check_source(source: &str, file: &str) -> (SymbolTable, Vec<Diagnostic>) {
    let tokens = tokenize(source.to_string(), Some(file.to_string())).unwrap();
    let (_, module) = parse(tokens, Rc::new(file.to_string()));
    let module = module.unwrap();
    let mut diagnostics: Vec<Diagnostic> = vec![];
    let table = check(&module, None, file, &mut diagnostics);
    (table, diagnostics)
}

fn check_in_project(source: &str, file: &str, modules: &mut MemoryModuleCache) -> (SymbolTable, Vec<Diagnostic>) {
    let tokens = tokenize(source.to_string(), Some(file.to_string())).unwrap();
    let (_, module) = parse(tokens, Rc::new(file.to_string()));
    let module = module.unwrap();
    let mut diagnostics: Vec<Diagnostic> = vec![];
    let table = check_with(
        &module,
        None,
        file,
        CheckContext {
            sink: &mut diagnostics,
            modules,
            hints: None,
            config: CheckConfig::default(),
        },
    );
    (table, diagnostics)
}

fn kinds(diagnostics: &[Diagnostic]) -> Vec<DiagnosticKind> {
    diagnostics.iter().map(|diagnostic| diagnostic.kind).collect()
}

#[test]
fn test_return_aggregation() {
    let (table, diagnostics) = check_source(
        indoc! {r#"
            def pick(flag):
                if flag:
                    return 10
                else:
                    return "ten"

            choice = pick(False)
        "#},
        "returns.py",
    );

    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert_eq!(
        table.get("choice"),
        Some(&Type::union_of(vec![Type::int(), Type::str()], None))
    );
}

#[test]
fn test_missing_return_single_diagnostic() {
    let (_, diagnostics) = check_source(
        indoc! {r#"
            x = 1

            def total(values) -> int:
                count = 0
                for value in values:
                    count = count + value

            total([1, 2])
            total([3])
        "#},
        "missing.py",
    );

    assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::ReturnValueMissing]);
    assert_eq!(diagnostics[0].file, "missing.py");
    assert_eq!(diagnostics[0].line, 3);
    assert_eq!(diagnostics[0].identifier, "total");
}

#[test]
fn test_attribute_miss_is_uncertain() {
    let (table, diagnostics) = check_source(
        indoc! {r#"
            class Empty:
                pass

            e = Empty()
            value = e.missing
        "#},
        "attrs.py",
    );

    assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::AttributeError]);
    assert!(diagnostics[0].confidence < 1.0);
    assert_eq!(diagnostics[0].line, 5);
    assert_eq!(table.get("value"), Some(&Type::Any));
}

#[test]
fn test_instantiation_with_wrong_argument() {
    let (table, diagnostics) = check_source(
        indoc! {r#"
            class Point:
                def __init__(self, x: int):
                    self.x = x

            p = Point("origin")
            after = 1
        "#},
        "point.py",
    );

    assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::ValueAnnotationMismatch]);
    assert_eq!(table.render("p").as_deref(), Some("Point"));
    assert_eq!(table.get("after"), Some(&Type::int()));
}

#[test]
fn test_self_recursion_terminates() {
    let (table, diagnostics) = check_source(
        indoc! {r#"
            def forever(n):
                return forever(n + 1)

            def fib(n):
                if n < 2:
                    return n
                return fib(n - 1) + fib(n - 2)

            a = forever(0)
            b = fib(10)
        "#},
        "recursion.py",
    );

    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert!(table.get("a").is_some());
    assert_eq!(table.get("b"), Some(&Type::int()));
}

#[test]
fn test_mutual_recursion_terminates() {
    let (table, diagnostics) = check_source(
        indoc! {r#"
            def even(n):
                if n == 0:
                    return True
                return odd(n - 1)

            def odd(n):
                if n == 0:
                    return False
                return even(n - 1)

            r = even(4)
        "#},
        "mutual.py",
    );

    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert!(table.get("r").is_some());
}

#[test]
fn test_recursive_calls_keep_locals_apart() {
    let (table, diagnostics) = check_source(
        indoc! {r#"
            def walk(depth, label):
                local = label
                if depth > 0:
                    walk(depth - 1, 1.5)
                return local

            first = walk(2, "root")
            second = walk(0, 7)
        "#},
        "scopes.py",
    );

    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert_eq!(table.get("first"), Some(&Type::str()));
    assert_eq!(table.get("second"), Some(&Type::int()));
    assert_eq!(table.get("local"), None);
}

#[test]
fn test_binary_operator_mismatch() {
    let (table, diagnostics) = check_source(
        indoc! {r#"
            count = 3
            label = "items"
            broken = count + label
            fine = count * 2.0
        "#},
        "ops.py",
    );

    assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::TypeError]);
    assert_eq!(diagnostics[0].line, 3);
    assert_eq!(table.get("fine"), Some(&Type::float()));
}

#[test]
fn test_project_of_two_modules() {
    let mut modules = MemoryModuleCache::new();
    let (shapes, diagnostics) = check_in_project(
        indoc! {r#"
            class Square:
                def __init__(self, side):
                    self.side = side

                def area(self):
                    return self.side * self.side

            def unit():
                return Square(1)
        "#},
        "geo/shapes.py",
        &mut modules,
    );
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    modules.store("geo/shapes", shapes);

    let (table, diagnostics) = check_in_project(
        indoc! {r#"
            from geo.shapes import Square, unit
            import geo.shapes as shapes

            big = Square(2.5)
            area = big.area()
            small = unit().area()
            other = shapes.Square(3)
            oops = big.perimeter
        "#},
        "main.py",
        &mut modules,
    );

    assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::AttributeError]);
    assert_eq!(diagnostics[0].identifier, "perimeter");
    assert_eq!(table.get("area"), Some(&Type::float()));
    assert_eq!(table.get("small"), Some(&Type::int()));
    assert_eq!(table.render("other").as_deref(), Some("Square"));
}

#[test]
fn test_front_end_error_is_reported() {
    let tokens = tokenize("x = (1 +\n".to_string(), Some("broken.py".to_string())).unwrap();
    let (_, module) = parse(tokens, Rc::new("broken.py".to_string()));
    assert!(module.is_err());
}

#[test]
fn test_runs_do_not_share_state() {
    let source = indoc! {r#"
        class A:
            pass

        A().missing
    "#};
    let (_, first) = check_source(source, "same.py");
    let (_, second) = check_source(source, "same.py");

    assert_eq!(kinds(&first), vec![DiagnosticKind::AttributeError]);
    assert_eq!(kinds(&second), vec![DiagnosticKind::AttributeError]);
}
