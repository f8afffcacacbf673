use std::{collections::HashMap, rc::Rc};

use indexmap::IndexMap;
use once_cell::unsync::OnceCell;

use crate::{
    ast::{
        expressions::Expr,
        statements::{ClassDef, FunctionDef},
    },
    namespace::namespace::NamespaceId,
};

use super::types::{ClassId, CompoundKind, FunctionId, InstanceId, ModuleId, Type};

/// A class or instance member: a data type or a function defined in the
/// class body.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeSlot {
    Type(Type),
    Function(FunctionId),
}

impl AttributeSlot {
    pub fn to_type(&self) -> Type {
        match self {
            AttributeSlot::Type(ty) => ty.clone(),
            AttributeSlot::Function(function) => Type::Function(*function),
        }
    }
}

impl From<Type> for AttributeSlot {
    fn from(ty: Type) -> Self {
        match ty {
            Type::Function(function) => AttributeSlot::Function(function),
            other => AttributeSlot::Type(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassData {
    pub name: Option<String>,
    pub bases: Vec<ClassId>,
    /// Some base expression did not resolve to a class.
    pub opaque_bases: bool,
    pub attributes: IndexMap<String, AttributeSlot>,
    inherited: OnceCell<IndexMap<String, AttributeSlot>>,
    pub definition: Option<Rc<ClassDef>>,
    pub line: u32,
    pub file: Rc<String>,
}

impl ClassData {
    pub fn new(name: Option<String>, bases: Vec<ClassId>, file: Rc<String>, line: u32) -> Self {
        ClassData {
            name,
            bases,
            opaque_bases: false,
            attributes: IndexMap::new(),
            inherited: OnceCell::new(),
            definition: None,
            line,
            file,
        }
    }

    /// Whether the bases were already merged into the inherited map.
    pub fn bases_merged(&self) -> bool {
        self.inherited.get().is_some()
    }
}

#[derive(Debug, Clone)]
pub struct InstanceData {
    pub class: ClassId,
    /// Attributes written on the instance; reads fall back to the class.
    pub overlay: IndexMap<String, Type>,
}

#[derive(Debug, Clone)]
pub struct ParamInfo {
    pub name: String,
    pub annotation: Option<Type>,
    pub default: Option<Type>,
}

impl ParamInfo {
    pub fn new(name: &str) -> Self {
        ParamInfo {
            name: name.to_string(),
            annotation: None,
            default: None,
        }
    }
}

/// Resolved parameter list of a function.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    pub args: Vec<ParamInfo>,
    pub vararg: Option<ParamInfo>,
    pub kwonly: Vec<ParamInfo>,
    pub kwarg: Option<ParamInfo>,
}

impl Signature {
    pub fn all(&self) -> impl Iterator<Item = &ParamInfo> {
        self.args
            .iter()
            .chain(self.vararg.iter())
            .chain(self.kwonly.iter())
            .chain(self.kwarg.iter())
    }
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
    Def(Rc<FunctionDef>),
    Lambda(Rc<Expr>),
}

/// How a function stored on a class binds when read through an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodBinding {
    Instance,
    Class,
    Static,
}

#[derive(Debug, Clone)]
pub struct FunctionData {
    pub name: String,
    pub signature: Signature,
    pub declared_return: Option<Type>,
    pub body: FunctionBody,
    /// Scope the function was defined in; calls run in a copy of it.
    pub captured: NamespaceId,
    pub owner: Option<ClassId>,
    pub binding: MethodBinding,
    pub has_return: bool,
    pub always_returns: bool,
    pub is_stub: bool,
    pub is_generator: bool,
    /// Names the body reads; their types in the captured scope are part
    /// of the call cache key.
    pub reads: Rc<[String]>,
    pub cached_return: Option<Type>,
    pub call_cache: HashMap<String, Type>,
    pub line: u32,
    pub file: Rc<String>,
}

#[derive(Debug, Clone)]
pub struct ModuleData {
    pub name: String,
    pub exports: IndexMap<String, Type>,
}

/// Owner of every class, instance, function and module value of a run.
///
/// `generation` moves whenever an entry is mutated so that cached
/// evaluation results can tell when they went stale.
#[derive(Debug, Clone, Default)]
pub struct TypeArena {
    classes: Vec<ClassData>,
    instances: Vec<InstanceData>,
    functions: Vec<FunctionData>,
    modules: Vec<ModuleData>,
    generation: u64,
}

impl TypeArena {
    pub fn new() -> Self {
        TypeArena::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn touch(&mut self) {
        self.generation += 1;
    }

    pub fn add_class(&mut self, class: ClassData) -> ClassId {
        self.touch();
        self.classes.push(class);
        ClassId(self.classes.len() - 1)
    }

    pub fn class(&self, id: ClassId) -> &ClassData {
        &self.classes[id.0]
    }

    pub fn class_mut(&mut self, id: ClassId) -> &mut ClassData {
        self.touch();
        &mut self.classes[id.0]
    }

    pub fn add_instance(&mut self, class: ClassId) -> InstanceId {
        self.touch();
        self.instances.push(InstanceData {
            class,
            overlay: IndexMap::new(),
        });
        InstanceId(self.instances.len() - 1)
    }

    pub fn instance(&self, id: InstanceId) -> &InstanceData {
        &self.instances[id.0]
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> &mut InstanceData {
        self.touch();
        &mut self.instances[id.0]
    }

    pub fn add_function(&mut self, function: FunctionData) -> FunctionId {
        self.touch();
        self.functions.push(function);
        FunctionId(self.functions.len() - 1)
    }

    pub fn function(&self, id: FunctionId) -> &FunctionData {
        &self.functions[id.0]
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut FunctionData {
        self.touch();
        &mut self.functions[id.0]
    }

    pub fn add_module(&mut self, module: ModuleData) -> ModuleId {
        self.touch();
        self.modules.push(module);
        ModuleId(self.modules.len() - 1)
    }

    pub fn module(&self, id: ModuleId) -> &ModuleData {
        &self.modules[id.0]
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut ModuleData {
        self.touch();
        &mut self.modules[id.0]
    }

    pub fn class_name(&self, id: ClassId) -> &str {
        self.class(id).name.as_deref().unwrap_or("<class>")
    }

    /// Attribute map the class inherits from its bases, merged on first use
    /// and never recomputed afterwards.
    pub fn inherited(&self, id: ClassId) -> &IndexMap<String, AttributeSlot> {
        self.classes[id.0]
            .inherited
            .get_or_init(|| self.merge_bases(id))
    }

    fn merge_bases(&self, id: ClassId) -> IndexMap<String, AttributeSlot> {
        let mut merged = IndexMap::new();
        for base in self.class(id).bases.iter().copied() {
            if base.0 >= id.0 {
                continue;
            }
            for (name, slot) in self.class(base).attributes.iter() {
                merged.entry(name.clone()).or_insert_with(|| slot.clone());
            }
            for (name, slot) in self.inherited(base).iter() {
                merged.entry(name.clone()).or_insert_with(|| slot.clone());
            }
        }
        log::trace!("merged bases of {}: {} attributes", self.class_name(id), merged.len());
        merged
    }

    /// Class member lookup: own attributes first, then the merged bases.
    pub fn class_lookup(&self, id: ClassId, name: &str) -> Option<AttributeSlot> {
        if let Some(slot) = self.class(id).attributes.get(name) {
            return Some(slot.clone());
        }
        self.inherited(id).get(name).cloned()
    }

    /// Instance lookup: the overlay, then the class.
    pub fn instance_lookup(&self, id: InstanceId, name: &str) -> Option<AttributeSlot> {
        let instance = self.instance(id);
        if let Some(ty) = instance.overlay.get(name) {
            return Some(AttributeSlot::Type(ty.clone()));
        }
        self.class_lookup(instance.class, name)
    }

    /// Names of the class and all of its transitive bases.
    pub fn ancestor_names(&self, id: ClassId) -> Vec<String> {
        let mut names = vec![];
        let mut pending = vec![id];
        let mut seen = vec![];
        while let Some(current) = pending.pop() {
            if seen.contains(&current) {
                continue;
            }
            seen.push(current);
            names.push(self.class_name(current).to_string());
            pending.extend(self.class(current).bases.iter().copied());
        }
        names
    }

    /// Class identity by name, following transitive bases of `sub`.
    pub fn is_subclass(&self, sub: ClassId, sup: ClassId) -> bool {
        if sub == sup {
            return true;
        }
        let target = self.class_name(sup);
        self.ancestor_names(sub).iter().any(|name| name == target)
    }

    pub fn display(&self, ty: &Type) -> String {
        match ty {
            Type::Any => String::from("Any"),
            Type::Undefined => String::from("Undefined"),
            Type::Primitive(primitive) => primitive.name().to_string(),
            Type::Compound(compound) => {
                if compound.is_empty() {
                    return compound.kind.name().to_string();
                }
                match compound.kind {
                    CompoundKind::Dict => format!(
                        "Dict[{}, {}]",
                        self.display(&compound.element_type()),
                        self.display(&compound.value_type())
                    ),
                    kind => format!(
                        "{}[{}]",
                        kind.name(),
                        compound
                            .elts
                            .iter()
                            .map(|elt| self.display(elt))
                            .collect::<Vec<String>>()
                            .join(", ")
                    ),
                }
            }
            Type::Union(union) => format!(
                "ProbType{{{}}}",
                union
                    .iter()
                    .map(|(elt, prob)| format!("{}:{}", self.display(elt), round_prob(prob)))
                    .collect::<Vec<String>>()
                    .join(",")
            ),
            Type::Class(class) => format!("class {}", self.class_name(*class)),
            Type::Instance(instance) => self.class_name(self.instance(*instance).class).to_string(),
            Type::Function(function) => format!("def {}", self.function(*function).name),
            Type::Method { function, .. } => format!("def {}", self.function(*function).name),
            Type::Builtin(builtin) => format!("{}()", builtin.name),
            Type::Module(module) => format!("module {}", self.module(*module).name),
        }
    }
}

fn round_prob(prob: f64) -> f64 {
    (prob * 1000.0).round() / 1000.0
}
