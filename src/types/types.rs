use std::rc::Rc;

use crate::builtins::functions::BuiltinFunction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub usize);

/// Builtin scalar kinds.
///
/// Numeric promotion follows `Bool < Int < Float < Complex`; `Bytes < Str`
/// is the only other ordered pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Int,
    Float,
    Complex,
    Bool,
    Str,
    Bytes,
    NoneType,
}

impl Primitive {
    pub fn name(&self) -> &'static str {
        match self {
            Primitive::Int => "int",
            Primitive::Float => "float",
            Primitive::Complex => "complex",
            Primitive::Bool => "bool",
            Primitive::Str => "str",
            Primitive::Bytes => "bytes",
            Primitive::NoneType => "None",
        }
    }

    pub fn from_name(name: &str) -> Option<Primitive> {
        match name {
            "int" => Some(Primitive::Int),
            "float" => Some(Primitive::Float),
            "complex" => Some(Primitive::Complex),
            "bool" => Some(Primitive::Bool),
            "str" => Some(Primitive::Str),
            "bytes" => Some(Primitive::Bytes),
            "None" | "NoneType" => Some(Primitive::NoneType),
            _ => None,
        }
    }

    /// Rank on the numeric tower, `None` for non-numeric kinds.
    pub fn numeric_rank(&self) -> Option<u8> {
        match self {
            Primitive::Bool => Some(0),
            Primitive::Int => Some(1),
            Primitive::Float => Some(2),
            Primitive::Complex => Some(3),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.numeric_rank().is_some()
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, Primitive::Str | Primitive::Bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompoundKind {
    List,
    Set,
    Tuple,
    Dict,
}

impl CompoundKind {
    pub fn name(&self) -> &'static str {
        match self {
            CompoundKind::List => "List",
            CompoundKind::Set => "Set",
            CompoundKind::Tuple => "Tuple",
            CompoundKind::Dict => "Dict",
        }
    }

    pub fn from_name(name: &str) -> Option<CompoundKind> {
        match name {
            "List" | "list" => Some(CompoundKind::List),
            "Set" | "set" | "FrozenSet" | "frozenset" => Some(CompoundKind::Set),
            "Tuple" | "tuple" => Some(CompoundKind::Tuple),
            "Dict" | "dict" => Some(CompoundKind::Dict),
            _ => None,
        }
    }
}

/// A container type with its modelled elements.
///
/// Tuples keep one element per position. Lists and sets keep the distinct
/// element types seen. Dicts keep distinct `(key, value)` pairs in `elts`
/// and `values`. `probs` carries one confidence per element.
#[derive(Debug, Clone)]
pub struct Compound {
    pub kind: CompoundKind,
    pub elts: Vec<Type>,
    pub values: Vec<Type>,
    pub probs: Vec<f64>,
}

impl Compound {
    pub fn new(kind: CompoundKind, elts: Vec<Type>) -> Self {
        let probs = vec![1.0; elts.len()];
        Compound::with_probs(kind, elts, probs)
    }

    pub fn with_probs(kind: CompoundKind, elts: Vec<Type>, probs: Vec<f64>) -> Self {
        let mut compound = Compound {
            kind,
            elts: vec![],
            values: vec![],
            probs: vec![],
        };
        let probs = if probs.len() == elts.len() {
            probs
        } else {
            vec![1.0; elts.len()]
        };
        for (elt, prob) in elts.into_iter().zip(probs) {
            compound.push_with(elt, None, prob);
        }
        compound
    }

    pub fn dict(keys: Vec<Type>, values: Vec<Type>) -> Self {
        let mut compound = Compound {
            kind: CompoundKind::Dict,
            elts: vec![],
            values: vec![],
            probs: vec![],
        };
        for (key, value) in keys.into_iter().zip(values) {
            compound.push_with(key, Some(value), 1.0);
        }
        compound
    }

    /// Adds an element (or a key/value pair for dicts) to the model.
    pub fn push(&mut self, elt: Type, value: Option<Type>) {
        self.push_with(elt, value, 1.0)
    }

    fn push_with(&mut self, elt: Type, value: Option<Type>, prob: f64) {
        if matches!(elt, Type::Undefined) {
            return;
        }

        match self.kind {
            CompoundKind::Tuple => {
                self.elts.push(elt);
                self.probs.push(prob);
            }
            CompoundKind::List | CompoundKind::Set => {
                if !self.elts.contains(&elt) {
                    self.elts.push(elt);
                    self.probs.push(prob);
                }
            }
            CompoundKind::Dict => {
                let value = value.unwrap_or(Type::Any);
                let exists = self
                    .elts
                    .iter()
                    .zip(self.values.iter())
                    .any(|(key, existing)| *key == elt && *existing == value);
                if !exists {
                    self.elts.push(elt);
                    self.values.push(value);
                    self.probs.push(prob);
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.elts.is_empty()
    }

    /// Union of the modelled elements (dict keys), `Any` when nothing is modelled.
    pub fn element_type(&self) -> Type {
        Type::union_of(self.elts.clone(), Some(self.probs.clone()))
    }

    /// Union of the modelled dict values, `Any` for other kinds.
    pub fn value_type(&self) -> Type {
        if self.kind != CompoundKind::Dict {
            return Type::Any;
        }
        Type::union_of(self.values.clone(), Some(self.probs.clone()))
    }

    /// Model with every element of `other` added, keeping this kind.
    pub fn extended(&self, other: &Compound) -> Compound {
        let mut result = self.clone();
        if result.kind == CompoundKind::Tuple && other.kind != CompoundKind::Tuple {
            result.kind = CompoundKind::List;
        }
        if result.kind == CompoundKind::Dict && other.kind == CompoundKind::Dict {
            for (key, value) in other.elts.iter().zip(other.values.iter()) {
                result.push(key.clone(), Some(value.clone()));
            }
        } else if result.kind != CompoundKind::Dict {
            for elt in other.elts.iter() {
                result.push(elt.clone(), None);
            }
        }
        result
    }

    pub fn is_hashable(&self) -> bool {
        self.kind == CompoundKind::Tuple
    }
}

impl PartialEq for Compound {
    fn eq(&self, other: &Self) -> bool {
        if self.kind != other.kind || self.elts.len() != other.elts.len() {
            return false;
        }

        match self.kind {
            CompoundKind::Tuple => self.elts == other.elts,
            CompoundKind::List | CompoundKind::Set => {
                self.elts.iter().all(|elt| other.elts.contains(elt))
            }
            CompoundKind::Dict => self
                .elts
                .iter()
                .zip(self.values.iter())
                .all(|(key, value)| {
                    other
                        .elts
                        .iter()
                        .zip(other.values.iter())
                        .any(|(other_key, other_value)| key == other_key && value == other_value)
                }),
        }
    }
}

/// Several plausible alternatives with a probability each.
///
/// Built through [`ProbUnion::new`], which flattens nested unions, drops
/// `Undefined`, merges equal alternatives and renormalises the weights so
/// that `probs` sums to 1. Hashable alternatives come first in insertion
/// order, followed by the list, set and dict alternatives.
#[derive(Debug, Clone)]
pub struct ProbUnion {
    elts: Vec<Type>,
    probs: Vec<f64>,
}

impl ProbUnion {
    pub fn new(elts: Vec<Type>, probs: Option<Vec<f64>>) -> Self {
        let weights = match probs {
            Some(probs)
                if probs.len() == elts.len()
                    && probs.iter().all(|prob| prob.is_finite() && *prob >= 0.0) =>
            {
                probs
            }
            _ => vec![1.0; elts.len()],
        };

        let mut flat = vec![];
        for (elt, weight) in elts.into_iter().zip(weights) {
            match elt {
                Type::Union(union) => {
                    for (inner, prob) in union.elts.into_iter().zip(union.probs) {
                        flat.push((inner, prob * weight));
                    }
                }
                other => flat.push((other, weight)),
            }
        }

        let mut hashable: Vec<(Type, f64)> = vec![];
        let mut unhashable: Vec<(Type, f64)> = vec![];
        for (elt, weight) in flat {
            if matches!(elt, Type::Undefined) {
                continue;
            }
            let bucket = if elt.is_hashable() {
                &mut hashable
            } else {
                &mut unhashable
            };
            match bucket.iter_mut().find(|(existing, _)| *existing == elt) {
                Some(entry) => entry.1 += weight,
                None => bucket.push((elt, weight)),
            }
        }

        let entries: Vec<(Type, f64)> = hashable.into_iter().chain(unhashable).collect();
        let total: f64 = entries.iter().map(|(_, weight)| weight).sum();
        let count = entries.len();
        let (elts, weights): (Vec<Type>, Vec<f64>) = entries.into_iter().unzip();
        let probs = if total > 0.0 {
            weights.iter().map(|weight| weight / total).collect()
        } else {
            vec![1.0 / count as f64; count]
        };

        ProbUnion { elts, probs }
    }

    pub fn elts(&self) -> &[Type] {
        &self.elts
    }

    pub fn probs(&self) -> &[f64] {
        &self.probs
    }

    pub fn len(&self) -> usize {
        self.elts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Type, f64)> {
        self.elts.iter().zip(self.probs.iter().copied())
    }

    pub fn contains(&self, ty: &Type) -> bool {
        self.elts.contains(ty)
    }
}

impl PartialEq for ProbUnion {
    fn eq(&self, other: &Self) -> bool {
        self.elts.len() == other.elts.len() && self.elts.iter().all(|elt| other.elts.contains(elt))
    }
}

/// A type value.
///
/// Classes, instances, functions and modules live in the
/// [`TypeArena`](super::arena::TypeArena) and are referenced by id, so
/// cloning a type is cheap.
#[derive(Debug, Clone)]
pub enum Type {
    Any,
    Undefined,
    Primitive(Primitive),
    Compound(Compound),
    Union(ProbUnion),
    Class(ClassId),
    Instance(InstanceId),
    Function(FunctionId),
    Method {
        instance: InstanceId,
        function: FunctionId,
    },
    Builtin(Rc<BuiltinFunction>),
    Module(ModuleId),
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Any, Type::Any) => true,
            (Type::Undefined, Type::Undefined) => true,
            (Type::Primitive(left), Type::Primitive(right)) => left == right,
            (Type::Compound(left), Type::Compound(right)) => left == right,
            (Type::Union(left), Type::Union(right)) => left == right,
            (Type::Class(left), Type::Class(right)) => left == right,
            (Type::Instance(left), Type::Instance(right)) => left == right,
            (Type::Function(left), Type::Function(right)) => left == right,
            (
                Type::Method {
                    instance: left_instance,
                    function: left_function,
                },
                Type::Method {
                    instance: right_instance,
                    function: right_function,
                },
            ) => left_instance == right_instance && left_function == right_function,
            (Type::Builtin(left), Type::Builtin(right)) => left.name == right.name,
            (Type::Module(left), Type::Module(right)) => left == right,
            _ => false,
        }
    }
}

impl Type {
    pub fn int() -> Type {
        Type::Primitive(Primitive::Int)
    }

    pub fn float() -> Type {
        Type::Primitive(Primitive::Float)
    }

    pub fn complex() -> Type {
        Type::Primitive(Primitive::Complex)
    }

    pub fn bool() -> Type {
        Type::Primitive(Primitive::Bool)
    }

    pub fn str() -> Type {
        Type::Primitive(Primitive::Str)
    }

    pub fn bytes() -> Type {
        Type::Primitive(Primitive::Bytes)
    }

    pub fn none() -> Type {
        Type::Primitive(Primitive::NoneType)
    }

    pub fn list(elts: Vec<Type>) -> Type {
        Type::Compound(Compound::new(CompoundKind::List, elts))
    }

    pub fn set(elts: Vec<Type>) -> Type {
        Type::Compound(Compound::new(CompoundKind::Set, elts))
    }

    pub fn tuple(elts: Vec<Type>) -> Type {
        Type::Compound(Compound::new(CompoundKind::Tuple, elts))
    }

    pub fn dict(keys: Vec<Type>, values: Vec<Type>) -> Type {
        Type::Compound(Compound::dict(keys, values))
    }

    /// Collapsing union constructor: no alternative gives `Any`, a single
    /// alternative gives that alternative itself.
    pub fn union_of(elts: Vec<Type>, probs: Option<Vec<f64>>) -> Type {
        let union = ProbUnion::new(elts, probs);
        match union.len() {
            0 => Type::Any,
            1 => union.elts.into_iter().next().unwrap_or(Type::Any),
            _ => Type::Union(union),
        }
    }

    /// `Any` and `Undefined`, the types that absorb every check.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Any | Type::Undefined)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Type::Primitive(Primitive::NoneType))
    }

    pub fn is_hashable(&self) -> bool {
        match self {
            Type::Compound(compound) => compound.is_hashable(),
            _ => true,
        }
    }

    pub fn as_compound(&self) -> Option<&Compound> {
        match self {
            Type::Compound(compound) => Some(compound),
            _ => None,
        }
    }

    /// Alternatives with their probabilities; a non-union type is its own
    /// single alternative.
    pub fn alternatives(&self) -> Vec<(Type, f64)> {
        match self {
            Type::Union(union) => union.iter().map(|(ty, prob)| (ty.clone(), prob)).collect(),
            other => vec![(other.clone(), 1.0)],
        }
    }

    /// Modelled iteration element of the type.
    pub fn element_type(&self) -> Type {
        match self {
            Type::Compound(compound) => compound.element_type(),
            Type::Primitive(Primitive::Str) => Type::str(),
            Type::Primitive(Primitive::Bytes) => Type::int(),
            Type::Union(union) => Type::union_of(
                union.elts.iter().map(|elt| elt.element_type()).collect(),
                Some(union.probs.clone()),
            ),
            _ => Type::Any,
        }
    }
}

impl From<Primitive> for Type {
    fn from(primitive: Primitive) -> Self {
        Type::Primitive(primitive)
    }
}
