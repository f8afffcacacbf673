use std::collections::HashMap;

use indexmap::IndexMap;

use crate::{
    namespace::{
        namespace::{Binding, Namespace, NamespaceId},
        type_map::TypeMap,
    },
    types::{
        arena::{AttributeSlot, ClassData, ModuleData, ParamInfo, Signature, TypeArena},
        types::{ClassId, Compound, FunctionId, InstanceId, ModuleId, ProbUnion, Type},
    },
};

use super::type_checker::{SymbolTable, World};

/// Symbol tables of already checked modules, keyed by slash-separated path.
pub trait ModuleCache {
    fn lookup(&self, path: &str) -> Option<SymbolTable>;
    fn store(&mut self, path: &str, table: SymbolTable);
}

#[derive(Debug, Default)]
pub struct MemoryModuleCache {
    tables: HashMap<String, SymbolTable>,
}

impl MemoryModuleCache {
    pub fn new() -> Self {
        MemoryModuleCache::default()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl ModuleCache for MemoryModuleCache {
    fn lookup(&self, path: &str) -> Option<SymbolTable> {
        self.tables.get(path).cloned()
    }

    fn store(&mut self, path: &str, table: SymbolTable) {
        log::debug!("caching module {} ({} names)", path, table.len());
        self.tables.insert(path.to_string(), table);
    }
}

/// Cache that never resolves anything; every import binds `Any`.
#[derive(Debug, Default)]
pub struct NoModules;

impl ModuleCache for NoModules {
    fn lookup(&self, _path: &str) -> Option<SymbolTable> {
        None
    }

    fn store(&mut self, _path: &str, _table: SymbolTable) {}
}

/// `a.b.c` -> `a/b/c`.
pub fn module_path(dotted: &str) -> String {
    dotted.replace('.', "/")
}

/// Copies values of another run's arenas into the current run.
///
/// Every class, instance, function, module and namespace reached from an
/// adopted type is re-allocated once; cycles resolve through placeholders
/// allocated before their contents are copied. The source global
/// namespace maps onto the current global namespace, so builtins are
/// shared. Call caches are not carried over.
pub struct Adopter<'a> {
    source: &'a World,
    classes: HashMap<ClassId, ClassId>,
    instances: HashMap<InstanceId, InstanceId>,
    functions: HashMap<FunctionId, FunctionId>,
    modules: HashMap<ModuleId, ModuleId>,
    namespaces: HashMap<NamespaceId, NamespaceId>,
}

impl<'a> Adopter<'a> {
    pub fn new(source: &'a World) -> Self {
        Adopter {
            source,
            classes: HashMap::new(),
            instances: HashMap::new(),
            functions: HashMap::new(),
            modules: HashMap::new(),
            namespaces: HashMap::new(),
        }
    }

    pub fn adopt(&mut self, types: &mut TypeArena, type_map: &mut TypeMap, ty: &Type) -> Type {
        match ty {
            Type::Any | Type::Undefined | Type::Primitive(_) | Type::Builtin(_) => ty.clone(),
            Type::Compound(compound) => Type::Compound(Compound {
                kind: compound.kind,
                elts: compound
                    .elts
                    .iter()
                    .map(|elt| self.adopt(types, type_map, elt))
                    .collect(),
                values: compound
                    .values
                    .iter()
                    .map(|value| self.adopt(types, type_map, value))
                    .collect(),
                probs: compound.probs.clone(),
            }),
            Type::Union(union) => {
                let elts = union
                    .elts()
                    .iter()
                    .map(|elt| self.adopt(types, type_map, elt))
                    .collect();
                Type::Union(ProbUnion::new(elts, Some(union.probs().to_vec())))
            }
            Type::Class(class) => Type::Class(self.class(types, type_map, *class)),
            Type::Instance(instance) => Type::Instance(self.instance(types, type_map, *instance)),
            Type::Function(function) => Type::Function(self.function(types, type_map, *function)),
            Type::Method { instance, function } => Type::Method {
                instance: self.instance(types, type_map, *instance),
                function: self.function(types, type_map, *function),
            },
            Type::Module(module) => Type::Module(self.module(types, type_map, *module)),
        }
    }

    fn class(&mut self, types: &mut TypeArena, type_map: &mut TypeMap, id: ClassId) -> ClassId {
        if let Some(adopted) = self.classes.get(&id) {
            return *adopted;
        }

        // Bases must get lower ids than the class for inherited lookups.
        let world = self.source;
        let source = world.types.class(id);
        let bases: Vec<ClassId> = source
            .bases
            .iter()
            .map(|base| self.class(types, type_map, *base))
            .collect();
        if let Some(adopted) = self.classes.get(&id) {
            return *adopted;
        }

        let mut data = ClassData::new(source.name.clone(), bases, source.file.clone(), source.line);
        data.opaque_bases = source.opaque_bases;
        data.definition = source.definition.clone();
        let adopted = types.add_class(data);
        self.classes.insert(id, adopted);

        let mut adopted_attributes = IndexMap::new();
        for (name, slot) in source.attributes.iter() {
            let slot = match slot {
                AttributeSlot::Function(function) => {
                    AttributeSlot::Function(self.function(types, type_map, *function))
                }
                AttributeSlot::Type(ty) => AttributeSlot::Type(self.adopt(types, type_map, ty)),
            };
            adopted_attributes.insert(name.clone(), slot);
        }

        types.class_mut(adopted).attributes = adopted_attributes;
        adopted
    }

    fn instance(
        &mut self,
        types: &mut TypeArena,
        type_map: &mut TypeMap,
        id: InstanceId,
    ) -> InstanceId {
        if let Some(adopted) = self.instances.get(&id) {
            return *adopted;
        }

        let world = self.source;
        let source = world.types.instance(id);
        let class = self.class(types, type_map, source.class);
        let adopted = types.add_instance(class);
        self.instances.insert(id, adopted);

        let mut overlay = IndexMap::new();
        for (name, ty) in source.overlay.iter() {
            overlay.insert(name.clone(), self.adopt(types, type_map, ty));
        }
        types.instance_mut(adopted).overlay = overlay;
        adopted
    }

    fn function(
        &mut self,
        types: &mut TypeArena,
        type_map: &mut TypeMap,
        id: FunctionId,
    ) -> FunctionId {
        if let Some(adopted) = self.functions.get(&id) {
            return *adopted;
        }

        let world = self.source;
        let source = world.types.function(id);
        let mut placeholder = source.clone();
        placeholder.call_cache.clear();
        placeholder.cached_return = None;
        placeholder.owner = None;
        placeholder.captured = type_map.global();
        let adopted = types.add_function(placeholder);
        self.functions.insert(id, adopted);

        let signature = self.signature(types, type_map, &source.signature);
        let declared_return = source
            .declared_return
            .as_ref()
            .map(|ty| self.adopt(types, type_map, ty));
        let cached_return = source
            .cached_return
            .as_ref()
            .map(|ty| self.adopt(types, type_map, ty));
        let owner = source.owner.map(|owner| self.class(types, type_map, owner));
        let captured = self.namespace(types, type_map, source.captured);

        let data = types.function_mut(adopted);
        data.signature = signature;
        data.declared_return = declared_return;
        data.cached_return = cached_return;
        data.owner = owner;
        data.captured = captured;
        adopted
    }

    fn signature(
        &mut self,
        types: &mut TypeArena,
        type_map: &mut TypeMap,
        signature: &Signature,
    ) -> Signature {
        Signature {
            args: signature
                .args
                .iter()
                .map(|info| self.param(types, type_map, info))
                .collect(),
            vararg: signature
                .vararg
                .as_ref()
                .map(|info| self.param(types, type_map, info)),
            kwonly: signature
                .kwonly
                .iter()
                .map(|info| self.param(types, type_map, info))
                .collect(),
            kwarg: signature
                .kwarg
                .as_ref()
                .map(|info| self.param(types, type_map, info)),
        }
    }

    fn param(&mut self, types: &mut TypeArena, type_map: &mut TypeMap, info: &ParamInfo) -> ParamInfo {
        ParamInfo {
            name: info.name.clone(),
            annotation: info
                .annotation
                .as_ref()
                .map(|ty| self.adopt(types, type_map, ty)),
            default: info
                .default
                .as_ref()
                .map(|ty| self.adopt(types, type_map, ty)),
        }
    }

    fn module(&mut self, types: &mut TypeArena, type_map: &mut TypeMap, id: ModuleId) -> ModuleId {
        if let Some(adopted) = self.modules.get(&id) {
            return *adopted;
        }

        let world = self.source;
        let source = world.types.module(id);
        let adopted = types.add_module(ModuleData {
            name: source.name.clone(),
            exports: IndexMap::new(),
        });
        self.modules.insert(id, adopted);

        let mut exports = IndexMap::new();
        for (name, ty) in source.exports.iter() {
            exports.insert(name.clone(), self.adopt(types, type_map, ty));
        }
        types.module_mut(adopted).exports = exports;
        adopted
    }

    /// Namespace of the source run re-created in the current one.
    pub fn namespace(
        &mut self,
        types: &mut TypeArena,
        type_map: &mut TypeMap,
        id: NamespaceId,
    ) -> NamespaceId {
        if id == self.source.type_map.global() {
            return type_map.global();
        }
        if let Some(adopted) = self.namespaces.get(&id) {
            return *adopted;
        }

        let world = self.source;
        let source = world.type_map.namespace(id);
        let adopted = type_map.add_namespace(Namespace::new(&source.name, None));
        self.namespaces.insert(id, adopted);

        let parent = source
            .parent
            .map(|parent| self.namespace(types, type_map, parent));
        let mut bindings = IndexMap::new();
        for (name, binding) in source.bindings.iter() {
            let ty = self.adopt(types, type_map, &binding.ty);
            bindings.insert(
                name.clone(),
                Binding {
                    ty,
                    confidence: binding.confidence,
                    narrowed: binding.narrowed,
                },
            );
        }

        let namespace = type_map.namespace_mut(adopted);
        namespace.parent = parent;
        namespace.bindings = bindings;
        adopted
    }

    /// Exported bindings of `table` as a module value of the current run.
    pub fn adopt_module(
        &mut self,
        types: &mut TypeArena,
        type_map: &mut TypeMap,
        name: &str,
        table: &SymbolTable,
    ) -> Type {
        let mut exports = IndexMap::new();
        for (export, binding) in table.bindings() {
            exports.insert(export.clone(), self.adopt(types, type_map, &binding.ty));
        }
        Type::Module(types.add_module(ModuleData {
            name: name.to_string(),
            exports,
        }))
    }
}
