use super::{
    arena::TypeArena,
    types::{Compound, CompoundKind, Primitive, Type},
};

/// Whether `sub` can stand where `sup` is expected.
///
/// `Any` and `Undefined` are compatible with everything in both
/// directions. A union on the left needs one compatible alternative, a
/// union on the right accepts anything compatible with one of its
/// alternatives.
pub fn is_subtype(types: &TypeArena, sub: &Type, sup: &Type) -> bool {
    if sub.is_unknown() || sup.is_unknown() {
        return true;
    }

    match (sub, sup) {
        (Type::Union(union), _) => union.elts().iter().any(|elt| is_subtype(types, elt, sup)),
        (_, Type::Union(union)) => union.elts().iter().any(|elt| is_subtype(types, sub, elt)),
        (Type::Primitive(left), Type::Primitive(right)) => primitive_subtype(*left, *right),
        (Type::Compound(left), Type::Compound(right)) => compound_subtype(types, left, right),
        (Type::Class(left), Type::Class(right)) => types.is_subclass(*left, *right),
        (Type::Instance(left), Type::Instance(right)) => types.is_subclass(
            types.instance(*left).class,
            types.instance(*right).class,
        ),
        (Type::Instance(instance), Type::Class(class))
        | (Type::Class(class), Type::Instance(instance)) => {
            types.is_subclass(types.instance(*instance).class, *class)
        }
        (Type::Module(left), Type::Module(right)) => left == right,
        (left, right) if is_function_like(left) && is_function_like(right) => true,
        _ => false,
    }
}

fn is_function_like(ty: &Type) -> bool {
    matches!(ty, Type::Function(_) | Type::Method { .. } | Type::Builtin(_))
}

pub fn primitive_subtype(sub: Primitive, sup: Primitive) -> bool {
    if sub == sup {
        return true;
    }
    match (sub.numeric_rank(), sup.numeric_rank()) {
        (Some(left), Some(right)) => left <= right,
        _ => sub == Primitive::Bytes && sup == Primitive::Str,
    }
}

fn compound_subtype(types: &TypeArena, sub: &Compound, sup: &Compound) -> bool {
    if sub.kind != sup.kind {
        return false;
    }

    match sub.kind {
        CompoundKind::Tuple => {
            if sub.is_empty() || sup.is_empty() {
                return true;
            }
            sub.elts.len() == sup.elts.len()
                && sub
                    .elts
                    .iter()
                    .zip(sup.elts.iter())
                    .all(|(left, right)| is_subtype(types, left, right))
        }
        CompoundKind::List | CompoundKind::Set => contained(types, &sub.elts, &sup.elts),
        CompoundKind::Dict => {
            contained(types, &sub.elts, &sup.elts) && contained(types, &sub.values, &sup.values)
        }
    }
}

/// Every modelled element of `sub` fits some element of `sup`; an empty
/// model on either side fits.
fn contained(types: &TypeArena, sub: &[Type], sup: &[Type]) -> bool {
    if sub.is_empty() || sup.is_empty() {
        return true;
    }
    sub.iter()
        .all(|elt| sup.iter().any(|candidate| is_subtype(types, elt, candidate)))
}

/// Subtyping in either direction.
pub fn is_consistent(types: &TypeArena, left: &Type, right: &Type) -> bool {
    is_subtype(types, left, right) || is_subtype(types, right, left)
}
