use std::{collections::HashMap, fmt::Display, rc::Rc};

use crate::{
    ast::{ast::Module, expressions::Expr},
    builtins::functions::builtin_bindings,
    diagnostics::diagnostics::{DiagnosticKind, DiagnosticSink, Diagnostics},
    namespace::{
        namespace::{Binding, NamespaceId},
        type_map::TypeMap,
    },
    recursion::recursion::RecursionGuard,
    types::{
        arena::TypeArena,
        attributes::get_attribute,
        types::{ClassId, FunctionId, InstanceId, Type},
    },
};

use super::{
    config::CheckConfig,
    hints::TypeHints,
    memo::{NodeMemo, Stamp},
    modules::{ModuleCache, NoModules},
    stmt::check_block,
};

/// Arenas of one run: every type value and every namespace.
#[derive(Debug, Clone, Default)]
pub struct World {
    pub types: TypeArena,
    pub type_map: TypeMap,
}

impl World {
    pub fn new() -> Self {
        World::default()
    }

    /// A world whose global namespace holds the builtin names.
    pub fn with_builtins() -> Self {
        let mut world = World::new();
        for (name, ty) in builtin_bindings() {
            world.type_map.set_variable(&name, ty, 1.0);
        }
        world
    }
}

/// Exported namespace of a checked module.
///
/// Owns the arenas of the run that produced it, so the table stays
/// inspectable and can seed later runs as a parent scope or import source.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    world: Rc<World>,
    namespace: NamespaceId,
    file: Rc<String>,
}

impl SymbolTable {
    pub fn new(world: World, namespace: NamespaceId, file: Rc<String>) -> Self {
        SymbolTable {
            world: Rc::new(world),
            namespace,
            file,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn types(&self) -> &TypeArena {
        &self.world.types
    }

    pub fn namespace(&self) -> NamespaceId {
        self.namespace
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&String, &Binding)> {
        self.world.type_map.bindings_of(self.namespace).iter()
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.world
            .type_map
            .bindings_of(self.namespace)
            .get(name)
            .map(|binding| &binding.ty)
    }

    pub fn confidence(&self, name: &str) -> Option<f64> {
        self.world
            .type_map
            .bindings_of(self.namespace)
            .get(name)
            .map(|binding| binding.confidence)
    }

    pub fn names(&self) -> Vec<&str> {
        self.bindings().map(|(name, _)| name.as_str()).collect()
    }

    /// Display form of the type bound to `name`.
    pub fn render(&self, name: &str) -> Option<String> {
        self.get(name).map(|ty| self.display(ty))
    }

    pub fn display(&self, ty: &Type) -> String {
        self.world.types.display(ty)
    }

    pub fn len(&self) -> usize {
        self.world.type_map.bindings_of(self.namespace).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Display for SymbolTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (name, binding) in self.bindings() {
            if name.starts_with("__") {
                continue;
            }
            writeln!(f, "{}: {}", name, self.display(&binding.ty))?;
        }
        Ok(())
    }
}

/// State scoped to one `check` invocation.
#[derive(Debug)]
pub struct CheckSession {
    pub diagnostics: Diagnostics,
    pub guard: RecursionGuard,
    pub memo: NodeMemo,
}

impl CheckSession {
    pub fn new(file: Rc<String>, config: &CheckConfig) -> Self {
        CheckSession {
            diagnostics: Diagnostics::new(file, config.filter()),
            guard: RecursionGuard::new(),
            memo: NodeMemo::new(),
        }
    }
}

/// Collaborators of a run supplied by the caller.
pub struct CheckContext<'a> {
    pub sink: &'a mut dyn DiagnosticSink,
    pub modules: &'a mut dyn ModuleCache,
    pub hints: Option<&'a TypeHints>,
    pub config: CheckConfig,
}

/// A function body under evaluation.
#[derive(Debug, Default)]
pub struct Frame {
    pub function: Option<FunctionId>,
    pub returns: Vec<Type>,
    pub yields: Vec<Type>,
}

impl Frame {
    pub fn new(function: Option<FunctionId>) -> Self {
        Frame {
            function,
            returns: vec![],
            yields: vec![],
        }
    }
}

pub struct TypeChecker<'a> {
    pub types: TypeArena,
    pub type_map: TypeMap,
    pub session: CheckSession,
    pub config: CheckConfig,
    /// File of the parsed tree; nodes of other files get no hints.
    pub tree_file: Rc<String>,
    pub frames: Vec<Frame>,
    /// Class bodies being built, with the namespace each one runs in.
    pub class_scopes: Vec<(NamespaceId, ClassId)>,
    /// Instance standing for each class named in an annotation.
    pub annotation_instances: HashMap<ClassId, InstanceId>,
    pub modules: &'a mut dyn ModuleCache,
    hints: Option<&'a TypeHints>,
    sink: &'a mut dyn DiagnosticSink,
}

impl<'a> TypeChecker<'a> {
    pub fn new(world: World, source_path: Rc<String>, tree_file: Rc<String>, context: CheckContext<'a>) -> Self {
        TypeChecker {
            types: world.types,
            type_map: world.type_map,
            session: CheckSession::new(source_path, &context.config),
            config: context.config,
            tree_file,
            frames: vec![],
            class_scopes: vec![],
            annotation_instances: HashMap::new(),
            modules: context.modules,
            hints: context.hints,
            sink: context.sink,
        }
    }

    /// Reports at the current cursor. Returns whether it was accepted.
    pub fn report(&mut self, kind: DiagnosticKind, identifier: &str, confidence: f64, message: String) -> bool {
        self.session
            .diagnostics
            .report(kind, identifier, confidence, message)
    }

    /// Hands queued diagnostics to the sink.
    pub fn flush(&mut self) {
        for diagnostic in self.session.diagnostics.drain() {
            self.sink.report(&diagnostic);
        }
    }

    pub fn display(&self, ty: &Type) -> String {
        self.types.display(ty)
    }

    pub fn stamp(&self) -> Stamp {
        Stamp {
            namespace: self.type_map.current(),
            namespace_generation: self.type_map.generation(),
            type_generation: self.types.generation(),
        }
    }

    pub fn hint(&self, expr: &Expr) -> Option<&(Type, f64)> {
        if *expr.span.start.file != *self.tree_file {
            return None;
        }
        self.hints.and_then(|hints| hints.get(&expr.span))
    }

    /// Confidence of the type inferred for `expr`.
    pub fn confidence_of(&self, expr: &Expr) -> f64 {
        self.hint(expr)
            .map(|(_, probability)| *probability)
            .unwrap_or(self.config.default_confidence)
    }

    pub fn attribute(&mut self, ty: &Type, name: &str, confidence: f64) -> (Type, bool) {
        get_attribute(&mut self.types, &mut self.session.diagnostics, ty, name, confidence)
    }

    /// Binds `name` in the current scope with override checks.
    pub fn bind(&mut self, name: &str, value: Type, confidence: f64) {
        self.type_map
            .add_variable(&self.types, &mut self.session.diagnostics, name, value, confidence);
    }

    /// The instance an annotation naming `class` stands for.
    pub fn instance_of(&mut self, class: ClassId) -> Type {
        if let Some(instance) = self.annotation_instances.get(&class) {
            return Type::Instance(*instance);
        }
        let instance = self.types.add_instance(class);
        self.annotation_instances.insert(class, instance);
        Type::Instance(instance)
    }

    /// Recursion guard key of a function: `file:line:name`.
    pub fn function_key(&self, function: FunctionId) -> String {
        let data = self.types.function(function);
        format!("{}:{}:{}", data.file, data.line, data.name)
    }

    pub fn into_world(self) -> World {
        World {
            types: self.types,
            type_map: self.type_map,
        }
    }
}

/// Module name for a source path: the file stem.
fn module_name(source_path: &str) -> &str {
    let file = source_path.rsplit('/').next().unwrap_or(source_path);
    file.split('.').next().unwrap_or(file)
}

/// Checks a parsed module with default configuration and no importable
/// modules, reporting into `sink`.
pub fn check(
    module: &Module,
    parent: Option<&SymbolTable>,
    source_path: &str,
    sink: &mut dyn DiagnosticSink,
) -> SymbolTable {
    let mut modules = NoModules;
    check_with(
        module,
        parent,
        source_path,
        CheckContext {
            sink,
            modules: &mut modules,
            hints: None,
            config: CheckConfig::default(),
        },
    )
}

/// Checks a parsed module and returns its exported symbol table.
///
/// Without a parent a fresh global namespace seeded with the builtins is
/// created. With one, the parent's arenas are copied and the module
/// namespace becomes a child of the parent's namespace.
pub fn check_with(
    module: &Module,
    parent: Option<&SymbolTable>,
    source_path: &str,
    context: CheckContext,
) -> SymbolTable {
    let world = match parent {
        Some(parent) => parent.world().clone(),
        None => World::with_builtins(),
    };
    let file = Rc::new(source_path.to_string());
    let mut type_checker = TypeChecker::new(world, Rc::clone(&file), Rc::clone(&module.file), context);

    if let Some(parent) = parent {
        type_checker.type_map.push_scope(parent.namespace());
    }
    let namespace = type_checker.type_map.enter_namespace(module_name(source_path));
    type_checker.type_map.set_module_scope(namespace);
    for name in ["__name__", "__file__", "__doc__"] {
        type_checker.type_map.set_variable(name, Type::str(), 1.0);
    }

    log::debug!("checking {}", source_path);
    check_block(&mut type_checker, &module.body);
    type_checker.flush();
    log::debug!(
        "checked {}: {} diagnostics, {} memo hits",
        source_path,
        type_checker.session.diagnostics.total(),
        type_checker.session.memo.hits()
    );

    SymbolTable::new(type_checker.into_world(), namespace, file)
}
