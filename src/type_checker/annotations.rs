use std::rc::Rc;

use crate::{
    ast::{
        ast::BinaryOperator,
        expressions::{Expr, ExprKind},
        statements::StmtKind,
    },
    lexer::lexer::tokenize,
    parser::parser::parse,
    types::types::{Compound, CompoundKind, Primitive, Type},
};

use super::type_checker::TypeChecker;

fn typing_name(name: &str) -> &str {
    for prefix in ["typing.", "typing_extensions.", "collections.abc.", "collections."] {
        if let Some(stripped) = name.strip_prefix(prefix) {
            return stripped;
        }
    }
    name
}

/// Container kind an annotation generic stands for.
fn container_kind(name: &str) -> Option<CompoundKind> {
    CompoundKind::from_name(name).or(match name {
        "Sequence" | "MutableSequence" | "Iterable" | "Iterator" | "Generator" | "Collection"
        | "Deque" | "deque" => Some(CompoundKind::List),
        "AbstractSet" | "MutableSet" => Some(CompoundKind::Set),
        "Mapping" | "MutableMapping" | "DefaultDict" | "defaultdict" | "OrderedDict" | "Counter" => {
            Some(CompoundKind::Dict)
        }
        _ => None,
    })
}

/// Type an annotation expression declares.
///
/// Class names stand for instances of the class; unknown names and
/// unsupported forms give `Any`.
pub fn convert_annotation(type_checker: &mut TypeChecker, expr: &Expr) -> Type {
    match &expr.kind {
        ExprKind::NoneLiteral => Type::none(),
        ExprKind::Str(text) => forward_reference(type_checker, text),
        ExprKind::Name(_) | ExprKind::Attribute { .. } => match expr.dotted_name() {
            Some(name) => named_annotation(type_checker, &name),
            None => Type::Any,
        },
        ExprKind::Subscript { value, slice } => generic_annotation(type_checker, value, slice),
        ExprKind::BinOp {
            left,
            op: BinaryOperator::BitOr,
            right,
        } => Type::union_of(
            vec![
                convert_annotation(type_checker, left),
                convert_annotation(type_checker, right),
            ],
            None,
        ),
        _ => Type::Any,
    }
}

fn named_annotation(type_checker: &mut TypeChecker, name: &str) -> Type {
    let short = typing_name(name);
    if let Some(primitive) = Primitive::from_name(short) {
        return primitive.into();
    }
    if let Some(kind) = container_kind(short) {
        return Type::Compound(Compound::new(kind, vec![]));
    }

    match type_checker.type_map.find_dotted(&type_checker.types, name) {
        Type::Class(class) => type_checker.instance_of(class),
        _ => Type::Any,
    }
}

fn generic_annotation(type_checker: &mut TypeChecker, value: &Expr, slice: &Expr) -> Type {
    let name = match value.dotted_name() {
        Some(name) => name,
        None => return Type::Any,
    };
    let short = typing_name(&name);
    let arguments: Vec<&Expr> = match &slice.kind {
        ExprKind::Tuple(elts) => elts.iter().collect(),
        _ => vec![slice],
    };

    match short {
        "Optional" => {
            let inner = arguments
                .first()
                .map(|argument| convert_annotation(type_checker, argument))
                .unwrap_or(Type::Any);
            Type::union_of(vec![inner, Type::none()], Some(vec![0.5, 0.5]))
        }
        "Union" => Type::union_of(
            arguments
                .iter()
                .map(|argument| convert_annotation(type_checker, argument))
                .collect(),
            None,
        ),
        "Type" | "type" => match arguments.first() {
            Some(argument) => match convert_annotation(type_checker, argument) {
                Type::Instance(instance) => Type::Class(type_checker.types.instance(instance).class),
                _ => Type::Any,
            },
            None => Type::Any,
        },
        "Annotated" | "Final" | "ClassVar" => arguments
            .first()
            .map(|argument| convert_annotation(type_checker, argument))
            .unwrap_or(Type::Any),
        _ => match container_kind(short) {
            Some(CompoundKind::Dict) => {
                let key = arguments
                    .first()
                    .map(|argument| convert_annotation(type_checker, argument))
                    .unwrap_or(Type::Any);
                let value = arguments
                    .get(1)
                    .map(|argument| convert_annotation(type_checker, argument))
                    .unwrap_or(Type::Any);
                Type::dict(vec![key], vec![value])
            }
            Some(CompoundKind::Tuple) => Type::tuple(
                arguments
                    .iter()
                    .filter(|argument| !matches!(argument.kind, ExprKind::Ellipsis))
                    .map(|argument| convert_annotation(type_checker, argument))
                    .collect(),
            ),
            Some(kind) => {
                let element = arguments
                    .first()
                    .map(|argument| convert_annotation(type_checker, argument))
                    .unwrap_or(Type::Any);
                Type::Compound(Compound::new(kind, vec![element]))
            }
            // Callable, Literal and user generics
            None => Type::Any,
        },
    }
}

fn forward_reference(type_checker: &mut TypeChecker, text: &str) -> Type {
    let file = String::from("<annotation>");
    let tokens = match tokenize(text.to_string(), Some(file.clone())) {
        Ok(tokens) => tokens,
        Err(error) => {
            log::debug!("unreadable forward reference {:?}: {}", text, error);
            return Type::Any;
        }
    };

    match parse(tokens, Rc::new(file)).1 {
        Ok(module) => match module.body.first().map(|stmt| &stmt.kind) {
            Some(StmtKind::Expr(expr)) => convert_annotation(type_checker, expr),
            _ => Type::Any,
        },
        Err(error) => {
            log::debug!("unreadable forward reference {:?}: {}", text, error);
            Type::Any
        }
    }
}
