use indexmap::IndexMap;

use crate::{
    diagnostics::diagnostics::{error_probability, DiagnosticKind, Diagnostics},
    types::{
        arena::{AttributeSlot, TypeArena},
        subtype::is_subtype,
        types::Type,
    },
};

use super::namespace::{Binding, Namespace, NamespaceId};

/// Scope manager of a run.
///
/// Owns every namespace in an arena, the cursor naming the current one
/// and a stack of namespaces saved while a function body or another
/// out-of-line scope is being checked.
#[derive(Debug, Clone)]
pub struct TypeMap {
    namespaces: Vec<Namespace>,
    global: NamespaceId,
    /// Target of `global` declarations; the global namespace when unset.
    module: Option<NamespaceId>,
    current: NamespaceId,
    saved: Vec<NamespaceId>,
    generation: u64,
}

impl Default for TypeMap {
    fn default() -> Self {
        TypeMap::new()
    }
}

impl TypeMap {
    pub fn new() -> Self {
        TypeMap {
            namespaces: vec![Namespace::new("__global__", None)],
            global: NamespaceId(0),
            module: None,
            current: NamespaceId(0),
            saved: vec![],
            generation: 0,
        }
    }

    pub fn set_module_scope(&mut self, namespace: NamespaceId) {
        self.module = Some(namespace);
    }

    pub fn module_scope(&self) -> NamespaceId {
        self.module.unwrap_or(self.global)
    }

    pub fn global(&self) -> NamespaceId {
        self.global
    }

    pub fn current(&self) -> NamespaceId {
        self.current
    }

    pub fn namespace(&self, id: NamespaceId) -> &Namespace {
        &self.namespaces[id.0]
    }

    pub fn current_namespace(&self) -> &Namespace {
        self.namespace(self.current)
    }

    /// Moves whenever a binding changes or the cursor moves to a new scope.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn touch(&mut self) {
        self.generation += 1;
    }

    fn alloc(&mut self, namespace: Namespace) -> NamespaceId {
        self.namespaces.push(namespace);
        NamespaceId(self.namespaces.len() - 1)
    }

    /// Pushes a new child of the current namespace and makes it current.
    pub fn enter_namespace(&mut self, name: &str) -> NamespaceId {
        let child = self.alloc(Namespace::new(name, Some(self.current)));
        log::trace!("enter namespace {} ({:?})", name, child);
        self.current = child;
        self.touch();
        child
    }

    /// Pops back to the parent of the current namespace.
    pub fn exit_namespace(&mut self) {
        if let Some(parent) = self.current_namespace().parent {
            log::trace!("exit namespace {}", self.current_namespace().name);
            self.current = parent;
            self.touch();
        }
    }

    /// Saves the current namespace and switches to a copy of `captured`
    /// updated with `bindings`. Each call gets its own copy so recursive
    /// calls never share locals.
    pub fn enter_function_scope(
        &mut self,
        name: &str,
        captured: NamespaceId,
        bindings: Vec<(String, Type)>,
    ) -> NamespaceId {
        let mut scope = self.namespace(captured).clone();
        scope.name = name.to_string();
        scope.redirects.clear();
        for (param, ty) in bindings {
            scope.bindings.insert(param, Binding::new(ty, 1.0));
        }

        let id = self.alloc(scope);
        log::trace!("enter function scope {} ({:?})", name, id);
        self.saved.push(self.current);
        self.current = id;
        self.touch();
        id
    }

    pub fn exit_function_scope(&mut self) {
        if let Some(previous) = self.saved.pop() {
            self.current = previous;
            self.touch();
        }
    }

    /// Saves the current namespace and switches to `namespace`.
    pub fn push_scope(&mut self, namespace: NamespaceId) {
        self.saved.push(self.current);
        self.current = namespace;
        self.touch();
    }

    fn chain(&self, start: NamespaceId) -> impl Iterator<Item = NamespaceId> + '_ {
        std::iter::successors(Some(start), move |id| self.namespace(*id).parent)
    }

    /// First binding of `name` walking up from the current namespace. A
    /// `global` or `nonlocal` name is read from the scope it redirects to.
    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        if let Some(target) = self.current_namespace().redirects.get(name) {
            if let Some(binding) = self.namespace(*target).get(name) {
                return Some(binding);
            }
        }
        self.chain(self.current)
            .find_map(|id| self.namespace(id).get(name))
    }

    /// Resolves `name` starting at `namespace` instead of the current one.
    pub fn lookup_from(&self, namespace: NamespaceId, name: &str) -> Option<&Binding> {
        self.chain(namespace).find_map(|id| self.namespace(id).get(name))
    }

    /// Namespace that defines `name`, if any.
    pub fn defining_namespace(&self, name: &str) -> Option<NamespaceId> {
        self.chain(self.current)
            .find(|id| self.namespace(*id).contains(name))
    }

    /// Type of `name`, `Any` when unresolved.
    pub fn find(&self, name: &str) -> Type {
        self.lookup(name)
            .map(|binding| binding.ty.clone())
            .unwrap_or(Type::Any)
    }

    /// Resolves `a.b.c` component by component through modules, classes
    /// and instances. Anything unresolved gives `Any`.
    pub fn find_dotted(&self, types: &TypeArena, name: &str) -> Type {
        let mut parts = name.split('.');
        let mut ty = match parts.next() {
            Some(first) => self.find(first),
            None => return Type::Any,
        };
        for part in parts {
            ty = match &ty {
                Type::Module(module) => types
                    .module(*module)
                    .exports
                    .get(part)
                    .cloned()
                    .unwrap_or(Type::Any),
                Type::Class(class) => types
                    .class_lookup(*class, part)
                    .map(|slot| slot.to_type())
                    .unwrap_or(Type::Any),
                Type::Instance(instance) => types
                    .instance_lookup(*instance, part)
                    .map(|slot| match slot {
                        AttributeSlot::Type(ty) => ty,
                        AttributeSlot::Function(function) => Type::Function(function),
                    })
                    .unwrap_or(Type::Any),
                _ => Type::Any,
            };
        }
        ty
    }

    pub fn in_namespace(&self, name: &str) -> bool {
        self.current_namespace().contains(name)
    }

    pub fn current_bindings(&self) -> &IndexMap<String, Binding> {
        &self.current_namespace().bindings
    }

    fn target_namespace(&self, name: &str) -> NamespaceId {
        self.current_namespace()
            .redirects
            .get(name)
            .copied()
            .unwrap_or(self.current)
    }

    fn bind(&mut self, namespace: NamespaceId, name: &str, binding: Binding) {
        self.namespaces[namespace.0]
            .bindings
            .insert(name.to_string(), binding);
        self.touch();
    }

    /// Binds `name` in the current namespace.
    ///
    /// Rebinding a name whose visible type is concrete (not unknown and not
    /// `None`) to an incompatible type reports `OverrideTypeError`. A
    /// rebinding in the same namespace then keeps both shapes as a union; a
    /// shadowing binding in an inner namespace stores the new type.
    pub fn add_variable(
        &mut self,
        types: &TypeArena,
        diagnostics: &mut Diagnostics,
        name: &str,
        value: Type,
        confidence: f64,
    ) {
        let target = self.target_namespace(name);
        let value = self.checked_rebind(types, diagnostics, target, name, value, confidence);
        self.bind(target, name, Binding::new(value, confidence));
    }

    fn checked_rebind(
        &self,
        types: &TypeArena,
        diagnostics: &mut Diagnostics,
        target: NamespaceId,
        name: &str,
        value: Type,
        confidence: f64,
    ) -> Type {
        let existing = match self.namespace(target).get(name) {
            Some(binding) => Some((binding.ty.clone(), true)),
            None => self.lookup(name).map(|binding| (binding.ty.clone(), false)),
        };

        let (old, same_scope) = match existing {
            Some(found) => found,
            None => return value,
        };
        if old.is_unknown() || old.is_none() || value.is_unknown() || is_subtype(types, &value, &old) {
            return value;
        }

        let message = format!(
            "{} of type {} is rebound to {}",
            name,
            types.display(&old),
            types.display(&value)
        );
        diagnostics.report(
            DiagnosticKind::OverrideTypeError,
            name,
            error_probability(confidence),
            message,
        );

        if same_scope {
            Type::union_of(vec![old, value], None)
        } else {
            value
        }
    }

    /// Binds an annotated name. A value that does not fit the annotation
    /// reports `ValueAnnotationMismatch` and the annotation is stored; an
    /// unknown or `None` value also stores the annotation.
    pub fn add_annotated_variable(
        &mut self,
        types: &TypeArena,
        diagnostics: &mut Diagnostics,
        name: &str,
        annotation: Type,
        value: Type,
        confidence: f64,
    ) {
        let stored = if value.is_unknown() || value.is_none() {
            annotation
        } else if !is_subtype(types, &value, &annotation) {
            let message = format!(
                "{} is annotated {} but assigned {}",
                name,
                types.display(&annotation),
                types.display(&value)
            );
            diagnostics.report(
                DiagnosticKind::ValueAnnotationMismatch,
                name,
                error_probability(confidence),
                message,
            );
            annotation
        } else {
            value
        };
        self.add_variable(types, diagnostics, name, stored, confidence);
    }

    /// Binds without conflict checks, marking the binding as narrowed.
    pub fn narrow_variable(&mut self, name: &str, ty: Type) {
        let current = self.current;
        self.bind(
            current,
            name,
            Binding {
                ty,
                confidence: 1.0,
                narrowed: true,
            },
        );
    }

    /// Binds without conflict checks.
    pub fn set_variable(&mut self, name: &str, ty: Type, confidence: f64) {
        let target = self.target_namespace(name);
        self.bind(target, name, Binding::new(ty, confidence));
    }

    /// Binds an imported module value.
    pub fn add_module(&mut self, name: &str, module: Type) {
        self.set_variable(name, module, 1.0);
    }

    /// Replaces the type of an existing binding where it is defined, keeping
    /// its confidence. Unbound names are bound in the current namespace.
    pub fn update_variable(&mut self, name: &str, ty: Type) {
        let redirected = self.current_namespace().redirects.get(name).copied();
        let target = redirected.or_else(|| self.defining_namespace(name));
        match target {
            Some(namespace) => {
                let confidence = self
                    .namespace(namespace)
                    .get(name)
                    .map(|binding| binding.confidence)
                    .unwrap_or(1.0);
                self.bind(namespace, name, Binding::new(ty, confidence));
            }
            None => self.set_variable(name, ty, 1.0),
        }
    }

    /// Removes `name` from the first namespace up the chain that defines it.
    pub fn remove_variable(&mut self, name: &str) -> bool {
        match self.defining_namespace(name) {
            Some(namespace) => {
                self.namespaces[namespace.0].bindings.shift_remove(name);
                self.touch();
                true
            }
            None => false,
        }
    }

    /// `global name`: later bindings of `name` in the current namespace go
    /// to the module scope.
    pub fn declare_global(&mut self, name: &str) {
        let global = self.module_scope();
        let current = self.current;
        self.namespaces[current.0]
            .redirects
            .insert(name.to_string(), global);
    }

    /// `nonlocal name`: later bindings go to the nearest enclosing scope
    /// that defines it.
    pub fn declare_nonlocal(&mut self, name: &str) {
        let current = self.current;
        let parent = self.current_namespace().parent;
        let outer = parent.and_then(|parent| {
            self.chain(parent)
                .find(|id| *id != self.global && self.namespace(*id).contains(name))
        });
        if let Some(outer) = outer {
            self.namespaces[current.0]
                .redirects
                .insert(name.to_string(), outer);
        }
    }

    /// Leaves a branch namespace, merging its bindings into the parent.
    ///
    /// Narrowed bindings stay behind. A name already visible with an
    /// incompatible type merges into a union.
    pub fn exit_branch_namespace(&mut self, types: &TypeArena) {
        let branch = self.current;
        let parent = match self.current_namespace().parent {
            Some(parent) => parent,
            None => return,
        };
        self.current = parent;

        let bindings: Vec<(String, Binding)> = self
            .namespace(branch)
            .bindings
            .iter()
            .filter(|(_, binding)| !binding.narrowed)
            .map(|(name, binding)| (name.clone(), binding.clone()))
            .collect();

        for (name, binding) in bindings {
            let target = self.target_namespace(&name);
            let merged = match self.lookup(&name) {
                Some(existing)
                    if !existing.ty.is_unknown()
                        && !is_subtype(types, &binding.ty, &existing.ty) =>
                {
                    Type::union_of(vec![existing.ty.clone(), binding.ty.clone()], None)
                }
                _ => binding.ty.clone(),
            };
            self.bind(target, &name, Binding::new(merged, binding.confidence));
        }
        self.touch();
    }

    /// Bindings of a namespace, for export.
    pub fn bindings_of(&self, namespace: NamespaceId) -> &IndexMap<String, Binding> {
        &self.namespace(namespace).bindings
    }

    /// Allocates a detached namespace, used when importing scopes from
    /// another run.
    pub fn add_namespace(&mut self, namespace: Namespace) -> NamespaceId {
        self.touch();
        self.alloc(namespace)
    }

    pub fn namespace_mut(&mut self, id: NamespaceId) -> &mut Namespace {
        self.touch();
        &mut self.namespaces[id.0]
    }
}
