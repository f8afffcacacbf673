use indexmap::IndexMap;
use lazy_static::lazy_static;

use crate::types::types::{Compound, CompoundKind, Primitive, Type};

/// Static shape of a builtin parameter or return type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sig {
    Any,
    Int,
    Float,
    Complex,
    Bool,
    Str,
    Bytes,
    None,
    List,
    Dict,
    Set,
    Tuple,
    ListOfStr,
    ListOfBytes,
    StrTriple,
    BytesTriple,
    IntPair,
}

impl Sig {
    pub fn to_type(self) -> Type {
        match self {
            Sig::Any => Type::Any,
            Sig::Int => Type::int(),
            Sig::Float => Type::float(),
            Sig::Complex => Type::complex(),
            Sig::Bool => Type::bool(),
            Sig::Str => Type::str(),
            Sig::Bytes => Type::bytes(),
            Sig::None => Type::none(),
            Sig::List => Type::list(vec![]),
            Sig::Dict => Type::dict(vec![], vec![]),
            Sig::Set => Type::set(vec![]),
            Sig::Tuple => Type::tuple(vec![]),
            Sig::ListOfStr => Type::list(vec![Type::str()]),
            Sig::ListOfBytes => Type::list(vec![Type::bytes()]),
            Sig::StrTriple => Type::tuple(vec![Type::str(), Type::str(), Type::str()]),
            Sig::BytesTriple => Type::tuple(vec![Type::bytes(), Type::bytes(), Type::bytes()]),
            Sig::IntPair => Type::tuple(vec![Type::int(), Type::int()]),
        }
    }
}

type SigTable = IndexMap<&'static str, (Vec<Sig>, Sig)>;

fn table(entries: &[(&'static str, &[Sig], Sig)]) -> SigTable {
    entries
        .iter()
        .map(|(name, params, ret)| (*name, (params.to_vec(), *ret)))
        .collect()
}

lazy_static! {
    /// Builtin functions, constants and exception names bound in the
    /// global namespace.
    static ref BUILTIN_SIGNATURES: SigTable = table(&[
        ("__builtins__", &[], Sig::Any),
        ("__package__", &[], Sig::Any),
        ("__spec__", &[], Sig::Any),
        ("__loader__", &[], Sig::Any),
        ("__doc__", &[], Sig::Str),
        ("__name__", &[], Sig::Str),
        ("__file__", &[], Sig::Str),
        ("__debug__", &[], Sig::Bool),
        ("__import__", &[], Sig::Any),
        ("__build_class__", &[], Sig::Any),
        ("abs", &[Sig::Any], Sig::Int),
        ("all", &[Sig::Any], Sig::Bool),
        ("any", &[Sig::Any], Sig::Bool),
        ("ascii", &[Sig::Any], Sig::Str),
        ("bin", &[Sig::Int], Sig::Str),
        ("bool", &[Sig::Any], Sig::Bool),
        ("breakpoint", &[], Sig::None),
        ("bytearray", &[Sig::Any], Sig::Bytes),
        ("bytes", &[Sig::Any], Sig::Bytes),
        ("callable", &[Sig::Any], Sig::Bool),
        ("chr", &[Sig::Int], Sig::Str),
        ("classmethod", &[Sig::Any], Sig::Any),
        ("compile", &[Sig::Any], Sig::Any),
        ("complex", &[Sig::Any], Sig::Complex),
        ("copyright", &[], Sig::Any),
        ("credits", &[], Sig::Any),
        ("delattr", &[Sig::Any, Sig::Str], Sig::None),
        ("dict", &[Sig::Any], Sig::Dict),
        ("dir", &[Sig::Any], Sig::ListOfStr),
        ("divmod", &[Sig::Any, Sig::Any], Sig::Tuple),
        ("enumerate", &[Sig::Any], Sig::List),
        ("eval", &[Sig::Any], Sig::Any),
        ("exec", &[Sig::Any], Sig::None),
        ("exit", &[Sig::Any], Sig::Any),
        ("filter", &[Sig::Any, Sig::Any], Sig::Any),
        ("float", &[Sig::Any], Sig::Float),
        ("format", &[Sig::Any], Sig::Str),
        ("frozenset", &[Sig::Any], Sig::Set),
        ("getattr", &[Sig::Any], Sig::Any),
        ("globals", &[], Sig::Dict),
        ("hasattr", &[Sig::Any, Sig::Str], Sig::Bool),
        ("hash", &[Sig::Any], Sig::Int),
        ("help", &[Sig::Any], Sig::Any),
        ("hex", &[Sig::Int], Sig::Str),
        ("id", &[Sig::Any], Sig::Int),
        ("input", &[Sig::Any], Sig::Str),
        ("int", &[Sig::Any], Sig::Int),
        ("isinstance", &[Sig::Any, Sig::Any], Sig::Bool),
        ("issubclass", &[Sig::Any, Sig::Any], Sig::Bool),
        ("iter", &[Sig::Any], Sig::Any),
        ("len", &[Sig::Any], Sig::Int),
        ("license", &[], Sig::Any),
        ("list", &[Sig::Any], Sig::List),
        ("locals", &[], Sig::Dict),
        ("map", &[Sig::Any, Sig::Any], Sig::Any),
        ("max", &[Sig::Any], Sig::Int),
        ("memoryview", &[Sig::Any], Sig::Any),
        ("min", &[Sig::Any], Sig::Int),
        ("next", &[Sig::Any], Sig::Any),
        ("object", &[Sig::Any], Sig::Any),
        ("oct", &[Sig::Int], Sig::Str),
        ("open", &[Sig::Any], Sig::Any),
        ("ord", &[Sig::Str], Sig::Int),
        ("pow", &[Sig::Any, Sig::Any], Sig::Float),
        ("print", &[Sig::Any], Sig::None),
        ("property", &[Sig::Any], Sig::Any),
        ("quit", &[], Sig::Any),
        ("range", &[Sig::Any], Sig::List),
        ("repr", &[Sig::Any], Sig::Str),
        ("reversed", &[Sig::Any], Sig::List),
        ("round", &[Sig::Any], Sig::Int),
        ("set", &[Sig::Any], Sig::Set),
        ("setattr", &[Sig::Any, Sig::Str, Sig::Any], Sig::None),
        ("slice", &[Sig::Any], Sig::Any),
        ("sorted", &[Sig::Any], Sig::List),
        ("staticmethod", &[Sig::Any], Sig::Any),
        ("str", &[Sig::Any], Sig::Str),
        ("sum", &[Sig::Any], Sig::Int),
        ("super", &[Sig::Any], Sig::Any),
        ("tuple", &[Sig::Any], Sig::Tuple),
        ("type", &[Sig::Any], Sig::Any),
        ("vars", &[Sig::Any], Sig::Dict),
        ("zip", &[Sig::Any], Sig::List),
        ("NotImplemented", &[Sig::Any], Sig::Any),
        ("Ellipsis", &[Sig::Any], Sig::Any),
        ("ArithmeticError", &[Sig::Any], Sig::Any),
        ("AssertionError", &[Sig::Any], Sig::Any),
        ("AttributeError", &[Sig::Any], Sig::Any),
        ("BaseException", &[Sig::Any], Sig::Any),
        ("BlockingIOError", &[Sig::Any], Sig::Any),
        ("BrokenPipeError", &[Sig::Any], Sig::Any),
        ("BufferError", &[Sig::Any], Sig::Any),
        ("BytesWarning", &[Sig::Any], Sig::Any),
        ("ChildProcessError", &[Sig::Any], Sig::Any),
        ("ConnectionAbortedError", &[Sig::Any], Sig::Any),
        ("ConnectionError", &[Sig::Any], Sig::Any),
        ("ConnectionRefusedError", &[Sig::Any], Sig::Any),
        ("ConnectionResetError", &[Sig::Any], Sig::Any),
        ("DeprecationWarning", &[Sig::Any], Sig::Any),
        ("EOFError", &[Sig::Any], Sig::Any),
        ("EnvironmentError", &[Sig::Any], Sig::Any),
        ("Exception", &[Sig::Any], Sig::Any),
        ("FileExistsError", &[Sig::Any], Sig::Any),
        ("FileNotFoundError", &[Sig::Any], Sig::Any),
        ("FloatingPointError", &[Sig::Any], Sig::Any),
        ("FutureWarning", &[Sig::Any], Sig::Any),
        ("GeneratorExit", &[Sig::Any], Sig::Any),
        ("IOError", &[Sig::Any], Sig::Any),
        ("ImportError", &[Sig::Any], Sig::Any),
        ("ImportWarning", &[Sig::Any], Sig::Any),
        ("IndentationError", &[Sig::Any], Sig::Any),
        ("IndexError", &[Sig::Any], Sig::Any),
        ("InterruptedError", &[Sig::Any], Sig::Any),
        ("IsADirectoryError", &[Sig::Any], Sig::Any),
        ("KeyError", &[Sig::Any], Sig::Any),
        ("KeyboardInterrupt", &[Sig::Any], Sig::Any),
        ("LookupError", &[Sig::Any], Sig::Any),
        ("MemoryError", &[Sig::Any], Sig::Any),
        ("ModuleNotFoundError", &[Sig::Any], Sig::Any),
        ("NameError", &[Sig::Any], Sig::Any),
        ("NotADirectoryError", &[Sig::Any], Sig::Any),
        ("NotImplementedError", &[Sig::Any], Sig::Any),
        ("OSError", &[Sig::Any], Sig::Any),
        ("OverflowError", &[Sig::Any], Sig::Any),
        ("PendingDeprecationWarning", &[Sig::Any], Sig::Any),
        ("PermissionError", &[Sig::Any], Sig::Any),
        ("ProcessLookupError", &[Sig::Any], Sig::Any),
        ("RecursionError", &[Sig::Any], Sig::Any),
        ("ReferenceError", &[Sig::Any], Sig::Any),
        ("ResourceWarning", &[Sig::Any], Sig::Any),
        ("RuntimeError", &[Sig::Any], Sig::Any),
        ("RuntimeWarning", &[Sig::Any], Sig::Any),
        ("StopAsyncIteration", &[Sig::Any], Sig::Any),
        ("StopIteration", &[Sig::Any], Sig::Any),
        ("SyntaxError", &[Sig::Any], Sig::Any),
        ("SyntaxWarning", &[Sig::Any], Sig::Any),
        ("SystemError", &[Sig::Any], Sig::Any),
        ("SystemExit", &[Sig::Any], Sig::Any),
        ("TabError", &[Sig::Any], Sig::Any),
        ("TimeoutError", &[Sig::Any], Sig::Any),
        ("TypeError", &[Sig::Any], Sig::Any),
        ("UnboundLocalError", &[Sig::Any], Sig::Any),
        ("UnicodeDecodeError", &[Sig::Any], Sig::Any),
        ("UnicodeEncodeError", &[Sig::Any], Sig::Any),
        ("UnicodeError", &[Sig::Any], Sig::Any),
        ("UnicodeTranslateError", &[Sig::Any], Sig::Any),
        ("UnicodeWarning", &[Sig::Any], Sig::Any),
        ("UserWarning", &[Sig::Any], Sig::Any),
        ("ValueError", &[Sig::Any], Sig::Any),
        ("Warning", &[Sig::Any], Sig::Any),
        ("ZeroDivisionError", &[Sig::Any], Sig::Any),
    ]);

    static ref OBJECT_METHODS: SigTable = table(&[
        ("__eq__", &[Sig::Any], Sig::Bool),
        ("__ne__", &[Sig::Any], Sig::Bool),
        ("__hash__", &[], Sig::Int),
        ("__repr__", &[], Sig::Str),
        ("__str__", &[], Sig::Str),
        ("__format__", &[Sig::Str], Sig::Str),
        ("__sizeof__", &[], Sig::Int),
        ("__bool__", &[], Sig::Bool),
        ("__dir__", &[], Sig::ListOfStr),
        ("__reduce__", &[], Sig::Any),
        ("__init__", &[], Sig::None),
        ("__new__", &[], Sig::Any),
        ("__setattr__", &[Sig::Str, Sig::Any], Sig::None),
        ("__getattribute__", &[Sig::Str], Sig::Any),
        ("__delattr__", &[Sig::Str], Sig::None),
    ]);

    static ref INT_ATTRIBUTES: SigTable = table(&[
        ("real", &[], Sig::Int),
        ("imag", &[], Sig::Int),
        ("numerator", &[], Sig::Int),
        ("denominator", &[], Sig::Int),
    ]);

    static ref INT_METHODS: SigTable = table(&[
        ("bit_length", &[], Sig::Int),
        ("bit_count", &[], Sig::Int),
        ("conjugate", &[], Sig::Int),
        ("to_bytes", &[Sig::Int, Sig::Str], Sig::Bytes),
        ("from_bytes", &[Sig::Bytes, Sig::Str], Sig::Int),
        ("as_integer_ratio", &[], Sig::IntPair),
        ("is_integer", &[], Sig::Bool),
    ]);

    static ref FLOAT_ATTRIBUTES: SigTable = table(&[
        ("real", &[], Sig::Float),
        ("imag", &[], Sig::Float),
    ]);

    static ref FLOAT_METHODS: SigTable = table(&[
        ("is_integer", &[], Sig::Bool),
        ("hex", &[], Sig::Str),
        ("fromhex", &[Sig::Str], Sig::Float),
        ("conjugate", &[], Sig::Float),
        ("as_integer_ratio", &[], Sig::IntPair),
    ]);

    static ref COMPLEX_METHODS: SigTable = table(&[
        ("conjugate", &[], Sig::Complex),
    ]);

    static ref STR_METHODS: SigTable = table(&[
        ("capitalize", &[], Sig::Str),
        ("casefold", &[], Sig::Str),
        ("center", &[Sig::Int], Sig::Str),
        ("count", &[Sig::Str], Sig::Int),
        ("encode", &[], Sig::Bytes),
        ("endswith", &[Sig::Any], Sig::Bool),
        ("expandtabs", &[], Sig::Str),
        ("find", &[Sig::Str], Sig::Int),
        ("format", &[], Sig::Str),
        ("format_map", &[Sig::Any], Sig::Str),
        ("index", &[Sig::Str], Sig::Int),
        ("isalnum", &[], Sig::Bool),
        ("isalpha", &[], Sig::Bool),
        ("isascii", &[], Sig::Bool),
        ("isdecimal", &[], Sig::Bool),
        ("isdigit", &[], Sig::Bool),
        ("isidentifier", &[], Sig::Bool),
        ("islower", &[], Sig::Bool),
        ("isnumeric", &[], Sig::Bool),
        ("isprintable", &[], Sig::Bool),
        ("isspace", &[], Sig::Bool),
        ("istitle", &[], Sig::Bool),
        ("isupper", &[], Sig::Bool),
        ("join", &[Sig::Any], Sig::Str),
        ("ljust", &[Sig::Int], Sig::Str),
        ("lower", &[], Sig::Str),
        ("lstrip", &[], Sig::Str),
        ("maketrans", &[Sig::Any], Sig::Dict),
        ("partition", &[Sig::Str], Sig::StrTriple),
        ("removeprefix", &[Sig::Str], Sig::Str),
        ("removesuffix", &[Sig::Str], Sig::Str),
        ("replace", &[Sig::Str, Sig::Str], Sig::Str),
        ("rfind", &[Sig::Str], Sig::Int),
        ("rindex", &[Sig::Str], Sig::Int),
        ("rjust", &[Sig::Int], Sig::Str),
        ("rpartition", &[Sig::Str], Sig::StrTriple),
        ("rsplit", &[], Sig::ListOfStr),
        ("rstrip", &[], Sig::Str),
        ("split", &[], Sig::ListOfStr),
        ("splitlines", &[], Sig::ListOfStr),
        ("startswith", &[Sig::Any], Sig::Bool),
        ("strip", &[], Sig::Str),
        ("swapcase", &[], Sig::Str),
        ("title", &[], Sig::Str),
        ("translate", &[Sig::Any], Sig::Str),
        ("upper", &[], Sig::Str),
        ("zfill", &[Sig::Int], Sig::Str),
    ]);

    static ref BYTES_METHODS: SigTable = table(&[
        ("count", &[Sig::Bytes], Sig::Int),
        ("decode", &[], Sig::Str),
        ("endswith", &[Sig::Any], Sig::Bool),
        ("find", &[Sig::Bytes], Sig::Int),
        ("hex", &[], Sig::Str),
        ("index", &[Sig::Bytes], Sig::Int),
        ("isalnum", &[], Sig::Bool),
        ("isalpha", &[], Sig::Bool),
        ("isdigit", &[], Sig::Bool),
        ("islower", &[], Sig::Bool),
        ("isspace", &[], Sig::Bool),
        ("isupper", &[], Sig::Bool),
        ("join", &[Sig::Any], Sig::Bytes),
        ("lower", &[], Sig::Bytes),
        ("lstrip", &[], Sig::Bytes),
        ("partition", &[Sig::Bytes], Sig::BytesTriple),
        ("replace", &[Sig::Bytes, Sig::Bytes], Sig::Bytes),
        ("rsplit", &[], Sig::ListOfBytes),
        ("rstrip", &[], Sig::Bytes),
        ("split", &[], Sig::ListOfBytes),
        ("splitlines", &[], Sig::ListOfBytes),
        ("startswith", &[Sig::Any], Sig::Bool),
        ("strip", &[], Sig::Bytes),
        ("upper", &[], Sig::Bytes),
    ]);

    static ref SEQUENCE_PROTOCOL: SigTable = table(&[
        ("__len__", &[], Sig::Int),
        ("__contains__", &[Sig::Any], Sig::Bool),
        ("__iter__", &[], Sig::Any),
    ]);
}

/// A builtin callable with a fixed signature.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinFunction {
    pub name: String,
    pub params: Vec<Type>,
    pub ret: Type,
}

impl BuiltinFunction {
    pub fn new(name: &str, params: Vec<Type>, ret: Type) -> Self {
        BuiltinFunction {
            name: name.to_string(),
            params,
            ret,
        }
    }

    fn from_sig(name: &str, params: &[Sig], ret: Sig) -> Self {
        BuiltinFunction::new(
            name,
            params.iter().map(|param| param.to_type()).collect(),
            ret.to_type(),
        )
    }

    /// Result of calling the builtin with `args`.
    ///
    /// A wrong argument count never fails. A call the argument-aware
    /// refinements understand takes the refined type; otherwise the call
    /// resolves to the declared return type, logging a warning unless an
    /// `Any` parameter accepts any count.
    pub fn check_call(&self, args: &[Type]) -> Type {
        let (ty, warning) = self.resolve_call(args);
        if let Some(warning) = warning {
            log::warn!("{}", warning);
        }
        ty
    }

    /// Call result plus the arity warning it raises, if any.
    pub fn resolve_call(&self, args: &[Type]) -> (Type, Option<String>) {
        if let Some(refined) = refine_call(&self.name, args) {
            return (refined, None);
        }
        let warning = (args.len() != self.params.len() && !self.params.iter().any(|param| param.is_unknown()))
            .then(|| {
                format!(
                    "builtin {} called with {} arguments, expected {}",
                    self.name,
                    args.len(),
                    self.params.len()
                )
            });
        (self.ret.clone(), warning)
    }
}

/// Every builtin name bound in a fresh global namespace.
pub fn builtin_bindings() -> Vec<(String, Type)> {
    let mut bindings: Vec<(String, Type)> = BUILTIN_SIGNATURES
        .iter()
        .map(|(name, (params, ret))| {
            (
                name.to_string(),
                Type::Builtin(std::rc::Rc::new(BuiltinFunction::from_sig(name, params, *ret))),
            )
        })
        .collect();
    bindings.push((String::from("True"), Type::bool()));
    bindings.push((String::from("False"), Type::bool()));
    bindings.push((String::from("None"), Type::none()));
    bindings
}

pub fn is_builtin_name(name: &str) -> bool {
    BUILTIN_SIGNATURES.contains_key(name)
}

/// Names the builtins table treats as exception classes.
pub fn is_exception_name(name: &str) -> bool {
    BUILTIN_SIGNATURES.contains_key(name)
        && (name.ends_with("Error")
            || name.ends_with("Exception")
            || name.ends_with("Warning")
            || matches!(
                name,
                "StopIteration" | "StopAsyncIteration" | "KeyboardInterrupt" | "SystemExit" | "GeneratorExit"
            ))
}

/// Data attribute or method of a primitive, if the primitive has it.
pub fn primitive_attribute(primitive: Primitive, name: &str) -> Option<Type> {
    let (attributes, methods): (Option<&SigTable>, Option<&SigTable>) = match primitive {
        Primitive::Int | Primitive::Bool => (Some(&INT_ATTRIBUTES), Some(&INT_METHODS)),
        Primitive::Float => (Some(&FLOAT_ATTRIBUTES), Some(&FLOAT_METHODS)),
        Primitive::Complex => (Some(&FLOAT_ATTRIBUTES), Some(&COMPLEX_METHODS)),
        Primitive::Str => (None, Some(&STR_METHODS)),
        Primitive::Bytes => (None, Some(&BYTES_METHODS)),
        Primitive::NoneType => (None, None),
    };

    if let Some((_, ret)) = attributes.and_then(|table| table.get(name)) {
        return Some(ret.to_type());
    }

    let sequence = if primitive.is_sequence() {
        Some(&*SEQUENCE_PROTOCOL)
    } else {
        None
    };
    [methods, sequence, Some(&*OBJECT_METHODS)]
        .into_iter()
        .flatten()
        .find_map(|table| table.get(name))
        .map(|(params, ret)| {
            Type::Builtin(std::rc::Rc::new(BuiltinFunction::from_sig(
                &format!("{}.{}", primitive.name(), name),
                params,
                *ret,
            )))
        })
}

/// Object protocol method shared by every value.
pub fn object_method(name: &str) -> Option<Type> {
    OBJECT_METHODS.get(name).map(|(params, ret)| {
        Type::Builtin(std::rc::Rc::new(BuiltinFunction::from_sig(name, params, *ret)))
    })
}

fn elements_of(ty: Option<&Type>) -> Type {
    ty.map(|ty| ty.element_type()).unwrap_or(Type::Any)
}

fn container(kind: CompoundKind, elts: Vec<Type>) -> Type {
    Type::Compound(Compound::new(kind, elts))
}

fn known_elements(element: Type) -> Vec<Type> {
    match element {
        Type::Any => vec![],
        other => vec![other],
    }
}

/// Element-aware results for builtins whose return depends on the argument.
pub fn refine_call(name: &str, args: &[Type]) -> Option<Type> {
    let first = args.first();
    let refined = match name {
        "list" | "sorted" | "reversed" => {
            container(CompoundKind::List, known_elements(elements_of(first)))
        }
        "set" | "frozenset" => container(CompoundKind::Set, known_elements(elements_of(first))),
        "tuple" => match first {
            Some(Type::Compound(compound)) => container(CompoundKind::Tuple, compound.elts.clone()),
            Some(other) => container(CompoundKind::Tuple, known_elements(other.element_type())),
            None => container(CompoundKind::Tuple, vec![]),
        },
        "range" => Type::list(vec![Type::int()]),
        "enumerate" => Type::list(vec![Type::tuple(vec![Type::int(), elements_of(first)])]),
        "zip" => Type::list(vec![Type::tuple(
            args.iter().map(|arg| arg.element_type()).collect(),
        )]),
        "dict" => match first {
            Some(Type::Compound(compound)) if compound.kind == CompoundKind::Dict => {
                Type::Compound(compound.clone())
            }
            _ => return None,
        },
        "abs" => match first {
            Some(Type::Primitive(primitive)) if primitive.is_numeric() => {
                if *primitive == Primitive::Complex {
                    Type::float()
                } else {
                    Type::Primitive(*primitive)
                }
            }
            Some(_) => Type::Any,
            None => return None,
        },
        "min" | "max" => match args {
            [] => return None,
            [single] => single.element_type(),
            many => Type::union_of(many.to_vec(), None),
        },
        "sum" => match elements_of(first) {
            Type::Primitive(primitive) if primitive.is_numeric() => Type::Primitive(primitive),
            Type::Any => Type::int(),
            _ => Type::Any,
        },
        "iter" => first.cloned().unwrap_or(Type::Any),
        "next" => elements_of(first),
        _ => return None,
    };
    Some(refined)
}
