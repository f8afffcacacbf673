use indexmap::IndexMap;

use crate::{
    ast::expressions::{Expr, ExprKind, Keyword},
    diagnostics::diagnostics::{error_probability, DiagnosticKind},
    errors::errors::Error,
    types::{
        arena::{AttributeSlot, FunctionBody, FunctionData, MethodBinding},
        subtype::is_subtype,
        types::{ClassId, Compound, CompoundKind, FunctionId, InstanceId, Type},
    },
};

use super::{
    assign::rebind_container,
    expr::{check_expr, push_known},
    stmt::check_block,
    type_checker::{Frame, TypeChecker},
};

/// Evaluated arguments of a call site.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    pub positional: Vec<Type>,
    pub keywords: Vec<(String, Type)>,
    /// A `*iterable` of unknown length was passed.
    pub open_positional: bool,
    /// A `**mapping` was passed.
    pub open_keywords: bool,
}

impl CallArgs {
    pub fn positional(positional: Vec<Type>) -> Self {
        CallArgs {
            positional,
            ..CallArgs::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keywords.is_empty() && !self.open_positional && !self.open_keywords
    }
}

/// Whether `func` names the builtin `name` and has not been rebound.
pub fn is_builtin_call(type_checker: &TypeChecker, func: &Expr, name: &str) -> bool {
    if func.as_name() != Some(name) {
        return false;
    }
    match type_checker.type_map.find(name) {
        Type::Builtin(builtin) => builtin.name == name,
        _ => false,
    }
}

fn evaluate_arguments(type_checker: &mut TypeChecker, args: &[Expr], keywords: &[Keyword]) -> Result<CallArgs, Error> {
    let mut call_args = CallArgs::default();
    for arg in args {
        match &arg.kind {
            ExprKind::Starred(inner) => match check_expr(type_checker, inner)? {
                Type::Compound(compound) if compound.kind == CompoundKind::Tuple && !compound.is_empty() => {
                    call_args.positional.extend(compound.elts.iter().cloned())
                }
                _ => call_args.open_positional = true,
            },
            _ => call_args.positional.push(check_expr(type_checker, arg)?),
        }
    }
    for keyword in keywords {
        let value = check_expr(type_checker, &keyword.value)?;
        match &keyword.arg {
            Some(name) => call_args.keywords.push((name.clone(), value)),
            None => call_args.open_keywords = true,
        }
    }
    Ok(call_args)
}

/// Checks a call expression.
///
/// `isinstance`, `issubclass`, `hasattr` and one-argument `type` are
/// handled here because their arguments are classes or names rather than
/// values. Mutating container methods called on a name or attribute
/// rebind it with the grown element model.
pub fn check_call_expr(
    type_checker: &mut TypeChecker,
    func: &Expr,
    args: &[Expr],
    keywords: &[Keyword],
) -> Result<Type, Error> {
    if is_builtin_call(type_checker, func, "isinstance") || is_builtin_call(type_checker, func, "hasattr") {
        evaluate_arguments(type_checker, args, keywords)?;
        return Ok(Type::bool());
    }
    if is_builtin_call(type_checker, func, "issubclass") {
        return check_issubclass(type_checker, args);
    }
    if is_builtin_call(type_checker, func, "type") && args.len() == 1 {
        return Ok(match check_expr(type_checker, &args[0])? {
            Type::Instance(instance) => Type::Class(type_checker.types.instance(instance).class),
            _ => Type::Any,
        });
    }

    let (callee, receiver) = match &func.kind {
        ExprKind::Attribute { value, attr } => {
            let receiver = check_expr(type_checker, value)?;
            let confidence = type_checker.confidence_of(value);
            let callee = type_checker.attribute(&receiver, attr, confidence).0;
            (callee, Some((&**value, attr.as_str(), receiver)))
        }
        _ => (check_expr(type_checker, func)?, None),
    };

    let call_args = evaluate_arguments(type_checker, args, keywords)?;
    let result = call_type(type_checker, &callee, call_args.clone())?;

    if let Some((owner, method, receiver)) = receiver {
        if let Some(grown) = grown_container(&receiver, method, &call_args) {
            log::trace!("{} grows to {}", owner.describe(), type_checker.display(&grown));
            rebind_container(type_checker, owner, grown)?;
        }
    }
    Ok(result)
}

fn check_issubclass(type_checker: &mut TypeChecker, args: &[Expr]) -> Result<Type, Error> {
    for arg in args {
        let ty = check_expr(type_checker, arg)?;
        let confidence = type_checker.confidence_of(arg);
        let candidates: Vec<Type> = match &ty {
            Type::Compound(compound) if compound.kind == CompoundKind::Tuple => compound.elts.clone(),
            _ => vec![ty.clone()],
        };
        for candidate in candidates {
            let alternatives = candidate.alternatives();
            let single = alternatives.len() == 1;
            for (alternative, prob) in alternatives {
                // A union alternative carries its own probability.
                let prob = if single { confidence } else { prob };
                if !matches!(
                    alternative,
                    Type::Class(_) | Type::Builtin(_) | Type::Any | Type::Undefined
                ) {
                    let identifier = arg.describe();
                    let message = format!(
                        "issubclass argument {} is {}, not a class",
                        identifier,
                        type_checker.display(&alternative)
                    );
                    let probability = error_probability(prob);
                    type_checker.report(DiagnosticKind::SubTypeError, &identifier, probability, message);
                }
            }
        }
    }
    Ok(Type::bool())
}

/// Element model of a container after a mutating method call, if it grew.
fn grown_container(receiver: &Type, method: &str, args: &CallArgs) -> Option<Type> {
    let compound = receiver.as_compound()?;
    let mut grown = compound.clone();
    match (compound.kind, method, args.positional.as_slice()) {
        (CompoundKind::List, "append", [item]) | (CompoundKind::Set, "add", [item]) => {
            push_known(&mut grown, item.clone())
        }
        (CompoundKind::List, "insert", [_, item]) => push_known(&mut grown, item.clone()),
        (CompoundKind::List, "extend", [items]) | (CompoundKind::Set, "update", [items]) => {
            for (element, _) in items.element_type().alternatives() {
                push_known(&mut grown, element);
            }
        }
        (CompoundKind::Dict, "update", [Type::Compound(other)]) if other.kind == CompoundKind::Dict => {
            grown = grown.extended(other)
        }
        (CompoundKind::Dict, "setdefault", [key, value]) => {
            if !(key.is_unknown() && value.is_unknown()) {
                grown.push(key.clone(), Some(value.clone()))
            }
        }
        _ => return None,
    }

    if grown == *compound {
        None
    } else {
        Some(Type::Compound(grown))
    }
}

/// Result of calling a value of type `callee`.
pub fn call_type(type_checker: &mut TypeChecker, callee: &Type, args: CallArgs) -> Result<Type, Error> {
    match callee {
        Type::Any | Type::Undefined => Ok(Type::Any),
        Type::Union(union) => {
            let mut results = vec![];
            for alternative in union.elts() {
                results.push(call_type(type_checker, alternative, args.clone())?);
            }
            Ok(Type::union_of(results, Some(union.probs().to_vec())))
        }
        Type::Builtin(builtin) => Ok(builtin.check_call(&args.positional)),
        Type::Function(function) => {
            let data = type_checker.types.function(*function);
            let receiver = match (data.binding, data.owner) {
                (MethodBinding::Class, Some(owner)) => Some(Type::Class(owner)),
                _ => None,
            };
            call_function(type_checker, *function, receiver, args)
        }
        Type::Method { instance, function } => {
            call_function(type_checker, *function, Some(Type::Instance(*instance)), args)
        }
        Type::Class(class) => instantiate(type_checker, *class, args),
        Type::Instance(instance) => {
            Ok(call_dunder_with(type_checker, *instance, "__call__", args)?.unwrap_or(Type::Any))
        }
        _ => {
            log::debug!("{} is not callable", type_checker.display(callee));
            Ok(Type::Any)
        }
    }
}

/// Calls the special method `name` of an instance's class, when the class
/// defines one.
pub fn call_dunder(
    type_checker: &mut TypeChecker,
    instance: InstanceId,
    name: &str,
    args: Vec<Type>,
) -> Result<Option<Type>, Error> {
    call_dunder_with(type_checker, instance, name, CallArgs::positional(args))
}

fn call_dunder_with(
    type_checker: &mut TypeChecker,
    instance: InstanceId,
    name: &str,
    args: CallArgs,
) -> Result<Option<Type>, Error> {
    let class = type_checker.types.instance(instance).class;
    match type_checker.types.class_lookup(class, name) {
        Some(AttributeSlot::Function(function)) => {
            let receiver = match type_checker.types.function(function).binding {
                MethodBinding::Instance => Some(Type::Instance(instance)),
                MethodBinding::Class => Some(Type::Class(class)),
                MethodBinding::Static => None,
            };
            Ok(Some(call_function(type_checker, function, receiver, args)?))
        }
        _ => Ok(None),
    }
}

/// Creates an instance of `class`: `__new__` when the class defines one,
/// then `__init__` with the new instance as receiver.
pub fn instantiate(type_checker: &mut TypeChecker, class: ClassId, args: CallArgs) -> Result<Type, Error> {
    let mut created = None;
    if let Some(AttributeSlot::Function(new)) = type_checker.types.class_lookup(class, "__new__") {
        if let Type::Instance(instance) = call_function(type_checker, new, Some(Type::Class(class)), args.clone())? {
            if type_checker
                .types
                .is_subclass(type_checker.types.instance(instance).class, class)
            {
                created = Some(instance);
            }
        }
    }
    let has_new = created.is_some();
    let instance = match created {
        Some(instance) => instance,
        None => type_checker.types.add_instance(class),
    };

    match type_checker.types.class_lookup(class, "__init__") {
        Some(AttributeSlot::Function(init)) => {
            call_function(type_checker, init, Some(Type::Instance(instance)), args)?;
        }
        _ => {
            let data = type_checker.types.class(class);
            let decorated = data
                .definition
                .as_ref()
                .map(|definition| !definition.decorators.is_empty())
                .unwrap_or(false);
            if !args.is_empty() && !has_new && !data.opaque_bases && !decorated && data.name.is_some() {
                let name = type_checker.types.class_name(class).to_string();
                let message = format!("{}() takes no arguments", name);
                let probability = error_probability(type_checker.config.default_confidence);
                type_checker.report(DiagnosticKind::ArgLenTypeError, &name, probability, message);
            }
        }
    }
    Ok(Type::Instance(instance))
}

fn report_argument(type_checker: &mut TypeChecker, kind: DiagnosticKind, identifier: &str, message: String) {
    let probability = error_probability(type_checker.config.default_confidence);
    type_checker.report(kind, identifier, probability, message);
}

/// Binds call arguments to the parameters of `data`, reporting arity,
/// keyword and annotation mismatches. Parameters bound to nothing get
/// their default or `Any`; an annotated parameter takes its annotation
/// when the argument is unknown or does not fit.
fn bind_arguments(
    type_checker: &mut TypeChecker,
    data: &FunctionData,
    receiver: Option<Type>,
    args: CallArgs,
) -> Vec<(String, Type)> {
    let signature = &data.signature;
    let mut bound: IndexMap<String, Type> = IndexMap::new();
    let mut extra_positional = vec![];

    let positional = receiver.into_iter().chain(args.positional);
    for (index, value) in positional.enumerate() {
        match signature.args.get(index) {
            Some(param) => {
                bound.insert(param.name.clone(), value);
            }
            None => extra_positional.push(value),
        }
    }

    let mut extra_keywords = vec![];
    for (name, value) in args.keywords {
        let known = signature
            .args
            .iter()
            .chain(signature.kwonly.iter())
            .any(|param| param.name == name);
        if known {
            if bound.contains_key(&name) {
                let message = format!("{}() got multiple values for argument {}", data.name, name);
                report_argument(type_checker, DiagnosticKind::ArgTypeError, &name, message);
            } else {
                bound.insert(name, value);
            }
        } else if signature.kwarg.is_some() {
            extra_keywords.push(value);
        } else {
            let message = format!("{}() got an unexpected keyword argument {}", data.name, name);
            report_argument(type_checker, DiagnosticKind::ArgTypeError, &name, message);
        }
    }

    let open = args.open_positional || args.open_keywords;
    let mut missing = vec![];
    for param in signature.args.iter().chain(signature.kwonly.iter()) {
        if bound.contains_key(&param.name) {
            continue;
        }
        let value = match &param.default {
            Some(default) => default.clone(),
            None => {
                if !open {
                    missing.push(param.name.clone());
                }
                Type::Any
            }
        };
        bound.insert(param.name.clone(), value);
    }
    if !missing.is_empty() {
        let message = format!("{}() missing arguments: {}", data.name, missing.join(", "));
        report_argument(type_checker, DiagnosticKind::ArgLenTypeError, &data.name, message);
    }
    if !extra_positional.is_empty() && signature.vararg.is_none() {
        let message = format!(
            "{}() takes {} positional arguments but {} were given",
            data.name,
            signature.args.len(),
            signature.args.len() + extra_positional.len()
        );
        report_argument(type_checker, DiagnosticKind::ArgLenTypeError, &data.name, message);
    }

    if let Some(vararg) = &signature.vararg {
        bound.insert(vararg.name.clone(), Type::tuple(extra_positional));
    }
    if let Some(kwarg) = &signature.kwarg {
        let values = Type::union_of(extra_keywords, None);
        let mapping = if values.is_unknown() {
            Type::dict(vec![], vec![])
        } else {
            Type::dict(vec![Type::str()], vec![values])
        };
        bound.insert(kwarg.name.clone(), mapping);
    }

    for param in signature.args.iter().chain(signature.kwonly.iter()) {
        let annotation = match &param.annotation {
            Some(annotation) if !annotation.is_unknown() => annotation,
            _ => continue,
        };
        let value = match bound.get(&param.name) {
            Some(value) => value.clone(),
            None => continue,
        };
        if value.is_unknown() || value.is_none() {
            bound.insert(param.name.clone(), annotation.clone());
        } else if !is_subtype(&type_checker.types, &value, annotation) {
            let message = format!(
                "argument {} of {}() expects {}, got {}",
                param.name,
                data.name,
                type_checker.display(annotation),
                type_checker.display(&value)
            );
            report_argument(type_checker, DiagnosticKind::ValueAnnotationMismatch, &param.name, message);
            bound.insert(param.name.clone(), annotation.clone());
        }
    }

    bound.into_iter().collect()
}

/// Calls a user-defined function or lambda.
///
/// The body runs in a fresh copy of the captured scope. A call arriving
/// while the same function is already being evaluated does not re-enter
/// the body and resolves to the declared return type, the returns seen so
/// far, the previous result or `Any`, in that order.
pub fn call_function(
    type_checker: &mut TypeChecker,
    function: FunctionId,
    receiver: Option<Type>,
    args: CallArgs,
) -> Result<Type, Error> {
    let data = type_checker.types.function(function).clone();
    let bindings = bind_arguments(type_checker, &data, receiver, args);
    let declared = data
        .declared_return
        .clone()
        .filter(|declared| !declared.is_unknown());

    if data.is_stub {
        return Ok(declared.unwrap_or(Type::Any));
    }

    let signature = format!("{:?} {:?}", bindings, captured_view(type_checker, &data));
    if let Some(cached) = data.call_cache.get(&signature) {
        return Ok(cached.clone());
    }

    let key = type_checker.function_key(function);
    if !type_checker.session.guard.try_enter(&key) {
        return Ok(recursive_result(type_checker, function, &data, declared));
    }

    log::trace!("calling {}", key);
    let cursor = type_checker
        .session
        .diagnostics
        .move_to(data.file.clone(), data.line);
    type_checker
        .type_map
        .enter_function_scope(&data.name, data.captured, bindings);
    type_checker.frames.push(Frame::new(Some(function)));

    let lambda_result = match &data.body {
        FunctionBody::Def(def) => {
            check_block(type_checker, &def.body);
            None
        }
        FunctionBody::Lambda(body) => Some(check_expr(type_checker, body)),
    };

    let frame = type_checker.frames.pop().unwrap_or_default();
    type_checker.type_map.exit_function_scope();
    type_checker.session.diagnostics.restore(cursor);
    type_checker.session.guard.exit(&key);

    let inferred = match lambda_result {
        Some(result) => result?,
        None => returned_type(&data, frame),
    };
    let result = declared.unwrap_or(inferred);

    let stored = type_checker.types.function_mut(function);
    stored.cached_return = Some(result.clone());
    stored.call_cache.insert(signature, result.clone());
    Ok(result)
}

/// Types of the names a body reads, as its captured scope sees them now.
fn captured_view(type_checker: &TypeChecker, data: &FunctionData) -> Vec<Option<Type>> {
    data.reads
        .iter()
        .map(|name| {
            type_checker
                .type_map
                .lookup_from(data.captured, name)
                .map(|binding| binding.ty.clone())
        })
        .collect()
}

fn returned_type(data: &FunctionData, frame: Frame) -> Type {
    if data.is_generator {
        let mut produced = Compound::new(CompoundKind::List, vec![]);
        for yielded in frame.yields {
            push_known(&mut produced, yielded);
        }
        return Type::Compound(produced);
    }

    let mut returns = frame.returns;
    if !data.always_returns {
        returns.push(Type::none());
    }
    Type::union_of(returns, None)
}

fn recursive_result(
    type_checker: &TypeChecker,
    function: FunctionId,
    data: &FunctionData,
    declared: Option<Type>,
) -> Type {
    if let Some(declared) = declared {
        return declared;
    }
    let seen = type_checker
        .frames
        .iter()
        .rev()
        .find(|frame| frame.function == Some(function))
        .map(|frame| frame.returns.clone())
        .unwrap_or_default();
    if !seen.is_empty() {
        return Type::union_of(seen, None);
    }
    data.cached_return.clone().unwrap_or(Type::Any)
}
