use std::{collections::HashMap, rc::Rc};

use crate::{
    ast::{
        expressions::{Expr, ExprKind},
        statements::{names_used, ClassDef, FunctionDef, Param, Parameters, Stmt, StmtKind},
    },
    diagnostics::diagnostics::DiagnosticKind,
    errors::errors::Error,
    namespace::namespace::NamespaceId,
    types::{
        arena::{AttributeSlot, ClassData, FunctionBody, FunctionData, MethodBinding, ParamInfo, Signature},
        types::{ClassId, FunctionId, Type},
    },
};

use super::{
    annotations::convert_annotation,
    call::{call_function, call_type, CallArgs},
    expr::check_expr,
    returns,
    stmt::check_block,
    type_checker::TypeChecker,
};

fn param_info(type_checker: &mut TypeChecker, param: &Param, default: Option<&Expr>) -> Result<ParamInfo, Error> {
    let annotation = param
        .annotation
        .as_ref()
        .map(|annotation| convert_annotation(type_checker, annotation));
    let default = match default {
        Some(default) => Some(check_expr(type_checker, default)?),
        None => None,
    };
    Ok(ParamInfo {
        name: param.name.clone(),
        annotation,
        default,
    })
}

/// Resolves annotations and evaluates defaults of a parameter list in the
/// current scope.
pub fn build_signature(type_checker: &mut TypeChecker, params: &Parameters) -> Result<Signature, Error> {
    let mut signature = Signature::default();
    for (index, param) in params.args.iter().enumerate() {
        let info = param_info(type_checker, param, params.default_for(index))?;
        signature.args.push(info);
    }
    if let Some(vararg) = &params.vararg {
        signature.vararg = Some(param_info(type_checker, vararg, None)?);
    }
    for (index, param) in params.kwonly.iter().enumerate() {
        let default = params.kw_defaults.get(index).and_then(Option::as_ref);
        let info = param_info(type_checker, param, default)?;
        signature.kwonly.push(info);
    }
    if let Some(kwarg) = &params.kwarg {
        signature.kwarg = Some(param_info(type_checker, kwarg, None)?);
    }
    Ok(signature)
}

/// The class whose body is being checked, with its namespace, when the
/// current namespace is that body or a branch nested in it.
fn enclosing_class(type_checker: &TypeChecker) -> Option<(NamespaceId, ClassId)> {
    let (class_namespace, class) = *type_checker.class_scopes.last()?;
    let mut namespace = Some(type_checker.type_map.current());
    while let Some(id) = namespace {
        if id == class_namespace {
            return Some((class_namespace, class));
        }
        namespace = type_checker.type_map.namespace(id).parent;
    }
    None
}

fn method_binding(def: &FunctionDef) -> MethodBinding {
    if def.has_decorator("staticmethod") {
        MethodBinding::Static
    } else if def.has_decorator("classmethod") {
        MethodBinding::Class
    } else {
        MethodBinding::Instance
    }
}

/// Every parameter except a method's receiver carries an annotation.
fn fully_annotated(def: &FunctionDef, binding: MethodBinding, is_method: bool) -> bool {
    let skip = usize::from(is_method && binding != MethodBinding::Static);
    def.params
        .args
        .iter()
        .skip(skip)
        .chain(def.params.kwonly.iter())
        .all(|param| param.annotation.is_some())
}

/// Checks a `def` statement and binds the resulting function.
pub fn check_function_def(type_checker: &mut TypeChecker, def: &Rc<FunctionDef>) -> Result<(), Error> {
    let facts = returns::analyse(&def.body);
    let enclosing = enclosing_class(type_checker);
    let owner = enclosing.map(|(_, class)| class);
    let captured = match enclosing {
        Some((class_namespace, _)) => type_checker
            .type_map
            .namespace(class_namespace)
            .parent
            .unwrap_or_else(|| type_checker.type_map.global()),
        None => type_checker.type_map.current(),
    };
    let binding = method_binding(def);

    let signature = build_signature(type_checker, &def.params)?;
    let declared_return = def
        .returns
        .as_ref()
        .map(|annotation| convert_annotation(type_checker, annotation));
    let file = type_checker.session.diagnostics.file();
    let line = def.span.start.line;

    if let Some(declared) = &declared_return {
        let exempt = def.is_stub()
            || def.has_decorator("abstractmethod")
            || def.has_decorator("overload")
            || facts.has_return
            || facts.always_returns
            || facts.is_generator;
        if !declared.is_unknown() && !declared.is_none() && !exempt {
            let message = format!(
                "{}() is declared to return {} but has no return statement",
                def.name,
                type_checker.display(declared)
            );
            type_checker.session.diagnostics.report_at(
                DiagnosticKind::ReturnValueMissing,
                &file,
                line,
                &def.name,
                1.0,
                message,
            );
        }
    }

    let function = type_checker.types.add_function(FunctionData {
        name: def.name.clone(),
        signature,
        declared_return,
        body: FunctionBody::Def(Rc::clone(def)),
        captured,
        owner,
        binding,
        has_return: facts.has_return,
        always_returns: facts.always_returns,
        is_stub: def.is_stub(),
        is_generator: facts.is_generator,
        reads: names_used(&def.body).into(),
        cached_return: None,
        call_cache: HashMap::new(),
        line,
        file,
    });
    log::debug!("defined {} ({:?})", def.name, function);

    let value = match apply_decorators(type_checker, def, function)? {
        Some(value) => value,
        None => return Ok(()),
    };
    type_checker.bind(&def.name, value, 1.0);

    let eager = type_checker.config.eager_check_annotated
        && owner.is_none()
        && fully_annotated(def, binding, false);
    if eager {
        eager_check(type_checker, function, None)?;
    }
    Ok(())
}

/// Value the decorated name is bound to, or `None` when the decorators
/// leave an existing binding in place (property setters and deleters).
fn apply_decorators(
    type_checker: &mut TypeChecker,
    def: &FunctionDef,
    function: FunctionId,
) -> Result<Option<Type>, Error> {
    let mut value = Type::Function(function);
    for decorator in def.decorators.iter().rev() {
        let name = decorator.dotted_name().unwrap_or_default();
        let short = name.rsplit('.').next().unwrap_or(&name);
        match short {
            "staticmethod" | "classmethod" | "abstractmethod" | "overload" => {}
            "property" | "cached_property" => {
                let declared = type_checker.types.function(function).declared_return.clone();
                value = declared.unwrap_or(Type::Any);
            }
            "setter" | "deleter" => return Ok(None),
            _ => {
                let decorator_type = check_expr(type_checker, decorator)?;
                value = call_type(type_checker, &decorator_type, CallArgs::positional(vec![value]))?;
            }
        }
    }
    Ok(Some(value))
}

/// Runs the body of a fully annotated function once, with its annotations
/// as arguments.
fn eager_check(type_checker: &mut TypeChecker, function: FunctionId, receiver: Option<Type>) -> Result<(), Error> {
    let data = type_checker.types.function(function);
    let skip = usize::from(receiver.is_some());
    let args = CallArgs {
        positional: data
            .signature
            .args
            .iter()
            .skip(skip)
            .map(|param| param.annotation.clone().unwrap_or(Type::Any))
            .collect(),
        keywords: data
            .signature
            .kwonly
            .iter()
            .map(|param| (param.name.clone(), param.annotation.clone().unwrap_or(Type::Any)))
            .collect(),
        open_positional: false,
        open_keywords: false,
    };
    log::trace!("eager check of {}", data.name);
    call_function(type_checker, function, receiver, args)?;
    Ok(())
}

/// Names assigned through `receiver.<name>` anywhere in a method body.
fn receiver_attributes(receiver: &str, body: &[Stmt], out: &mut Vec<String>) {
    for stmt in body {
        let targets: Vec<&Expr> = match &stmt.kind {
            StmtKind::Assign { targets, .. } => targets.iter().collect(),
            StmtKind::AnnAssign { target, .. } | StmtKind::AugAssign { target, .. } => vec![target],
            StmtKind::For { target, .. } => vec![target],
            StmtKind::With { items, .. } => items.iter().filter_map(|item| item.vars.as_ref()).collect(),
            _ => vec![],
        };
        for target in targets {
            collect_receiver_targets(receiver, target, out);
        }
        for block in stmt.blocks() {
            receiver_attributes(receiver, block, out);
        }
    }
}

fn collect_receiver_targets(receiver: &str, target: &Expr, out: &mut Vec<String>) {
    match &target.kind {
        ExprKind::Attribute { value, attr } if value.as_name() == Some(receiver) => {
            if !out.contains(attr) {
                out.push(attr.clone());
            }
        }
        ExprKind::Tuple(elts) | ExprKind::List(elts) => {
            for elt in elts {
                collect_receiver_targets(receiver, elt, out);
            }
        }
        ExprKind::Starred(inner) => collect_receiver_targets(receiver, inner, out),
        _ => {}
    }
}

/// Attributes the methods of a class body assign on their receiver.
fn instance_attributes(def: &ClassDef) -> Vec<String> {
    let mut out = vec![];
    for stmt in &def.body {
        if let StmtKind::FunctionDef(method) = &stmt.kind {
            if method_binding(method) == MethodBinding::Static {
                continue;
            }
            if let Some(receiver) = method.params.args.first() {
                receiver_attributes(&receiver.name, &method.body, &mut out);
            }
        }
    }
    out
}

/// Checks a `class` statement: builds the class from its body namespace
/// and binds it.
pub fn check_class_def(type_checker: &mut TypeChecker, def: &Rc<ClassDef>) -> Result<(), Error> {
    for decorator in &def.decorators {
        check_expr(type_checker, decorator)?;
    }

    let mut bases = vec![];
    let mut opaque_bases = false;
    for base in &def.bases {
        if base.as_name() == Some("object") {
            continue;
        }
        match check_expr(type_checker, base)? {
            Type::Class(class) => bases.push(class),
            _ => opaque_bases = true,
        }
    }
    for keyword in &def.keywords {
        check_expr(type_checker, &keyword.value)?;
    }

    let file = type_checker.session.diagnostics.file();
    let mut data = ClassData::new(Some(def.name.clone()), bases, file, def.span.start.line);
    data.opaque_bases = opaque_bases;
    data.definition = Some(Rc::clone(def));
    for attribute in instance_attributes(def) {
        data.attributes.insert(attribute, AttributeSlot::Type(Type::Undefined));
    }
    let class = type_checker.types.add_class(data);
    log::debug!("defining class {} ({:?})", def.name, class);

    let namespace = type_checker.type_map.enter_namespace(&def.name);
    type_checker.class_scopes.push((namespace, class));
    check_block(type_checker, &def.body);
    type_checker.class_scopes.pop();
    let members: Vec<(String, Type)> = type_checker
        .type_map
        .bindings_of(namespace)
        .iter()
        .map(|(name, binding)| (name.clone(), binding.ty.clone()))
        .collect();
    type_checker.type_map.exit_namespace();

    let class_data = type_checker.types.class_mut(class);
    for (name, ty) in members {
        class_data.attributes.insert(name, AttributeSlot::from(ty));
    }
    type_checker.bind(&def.name, Type::Class(class), 1.0);

    if type_checker.config.eager_check_annotated {
        eager_check_methods(type_checker, class)?;
    }
    Ok(())
}

fn eager_check_methods(type_checker: &mut TypeChecker, class: ClassId) -> Result<(), Error> {
    let methods: Vec<FunctionId> = type_checker
        .types
        .class(class)
        .attributes
        .values()
        .filter_map(|slot| match slot {
            AttributeSlot::Function(function) => Some(*function),
            AttributeSlot::Type(_) => None,
        })
        .filter(|function| type_checker.types.function(*function).owner == Some(class))
        .collect();

    for function in methods {
        let data = type_checker.types.function(function);
        let def = match &data.body {
            FunctionBody::Def(def) => Rc::clone(def),
            FunctionBody::Lambda(_) => continue,
        };
        let binding = data.binding;
        if !fully_annotated(&def, binding, true) {
            continue;
        }
        let receiver = match binding {
            MethodBinding::Instance if def.params.args.is_empty() => continue,
            MethodBinding::Instance => Some(Type::Instance(type_checker.types.add_instance(class))),
            MethodBinding::Class if def.params.args.is_empty() => continue,
            MethodBinding::Class => Some(Type::Class(class)),
            MethodBinding::Static => None,
        };
        eager_check(type_checker, function, receiver)?;
    }
    Ok(())
}
