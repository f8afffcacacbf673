use crate::ast::ast::{BinaryOperator, UnaryOperator};

use super::{
    arena::TypeArena,
    subtype::is_consistent,
    types::{Compound, CompoundKind, Primitive, Type},
};

/// Operand types of a binary operation with no valid result.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeErrorMarker {
    pub op: BinaryOperator,
    pub left: Type,
    pub right: Type,
}

impl TypeErrorMarker {
    /// Operator and operand signature, the identity under which the
    /// mismatch is reported.
    pub fn signature(&self, types: &TypeArena) -> String {
        format!(
            "{} {} {}",
            types.display(&self.left),
            self.op,
            types.display(&self.right)
        )
    }
}

/// Result type of `left op right`.
///
/// Operands outside the numeric and sequence rules must be compatible in
/// one direction, and the result then has the left operand's type. Union
/// operands resolve every pair of alternatives; the operation fails only
/// when no pair succeeds. Instance operands whose class defines the
/// operator method are resolved by the caller before getting here.
pub fn resolve_binary_op(
    types: &TypeArena,
    op: BinaryOperator,
    left: &Type,
    right: &Type,
) -> Result<Type, TypeErrorMarker> {
    if left.is_unknown() || right.is_unknown() {
        return Ok(Type::Any);
    }

    if matches!(left, Type::Union(_)) || matches!(right, Type::Union(_)) {
        let mut results = vec![];
        let mut probs = vec![];
        for (left_alt, left_prob) in left.alternatives() {
            for (right_alt, right_prob) in right.alternatives() {
                if let Ok(result) = resolve_binary_op(types, op, &left_alt, &right_alt) {
                    results.push(result);
                    probs.push(left_prob * right_prob);
                }
            }
        }
        if results.is_empty() {
            return Err(mismatch(op, left, right));
        }
        return Ok(Type::union_of(results, Some(probs)));
    }

    if left.is_none() || right.is_none() {
        return Ok(Type::Any);
    }

    if matches!(
        op,
        BinaryOperator::BitAnd
            | BinaryOperator::BitOr
            | BinaryOperator::BitXor
            | BinaryOperator::LShift
            | BinaryOperator::RShift
            | BinaryOperator::MatMult
    ) {
        return Ok(Type::Any);
    }

    match (left, right) {
        (Type::Primitive(left_prim), Type::Primitive(right_prim)) => {
            primitive_op(op, *left_prim, *right_prim)
                .or_else(|| consistent_fallback(types, left, right))
                .ok_or_else(|| mismatch(op, left, right))
        }
        (Type::Primitive(Primitive::Str), _) if op == BinaryOperator::Mod => Ok(Type::str()),
        (Type::Primitive(Primitive::Bytes), _) if op == BinaryOperator::Mod => Ok(Type::bytes()),
        (Type::Compound(compound), Type::Primitive(Primitive::Int | Primitive::Bool))
        | (Type::Primitive(Primitive::Int | Primitive::Bool), Type::Compound(compound))
            if op == BinaryOperator::Mult && is_sequence(compound) =>
        {
            Ok(Type::Compound(compound.clone()))
        }
        (Type::Compound(left_compound), Type::Compound(right_compound))
            if op == BinaryOperator::Add
                && left_compound.kind == right_compound.kind
                && is_sequence(left_compound) =>
        {
            Ok(Type::Compound(left_compound.extended(right_compound)))
        }
        (Type::Instance(instance), _) | (_, Type::Instance(instance))
            if types.class(types.instance(*instance).class).opaque_bases =>
        {
            Ok(Type::Any)
        }
        _ => consistent_fallback(types, left, right).ok_or_else(|| mismatch(op, left, right)),
    }
}

fn is_sequence(compound: &Compound) -> bool {
    matches!(compound.kind, CompoundKind::List | CompoundKind::Tuple)
}

fn mismatch(op: BinaryOperator, left: &Type, right: &Type) -> TypeErrorMarker {
    TypeErrorMarker {
        op,
        left: left.clone(),
        right: right.clone(),
    }
}

fn promote(primitive: Primitive) -> Primitive {
    if primitive == Primitive::Bool {
        Primitive::Int
    } else {
        primitive
    }
}

fn primitive_op(op: BinaryOperator, left: Primitive, right: Primitive) -> Option<Type> {
    if let (Some(left_rank), Some(right_rank)) = (left.numeric_rank(), right.numeric_rank()) {
        let wider = promote(if left_rank >= right_rank { left } else { right });
        return Some(match op {
            BinaryOperator::Div if wider == Primitive::Int => Type::float(),
            _ => Type::Primitive(wider),
        });
    }

    match (op, left, right) {
        (BinaryOperator::Mod, Primitive::Str, _) => Some(Type::str()),
        (BinaryOperator::Mod, Primitive::Bytes, _) => Some(Type::bytes()),
        (BinaryOperator::Mult, sequence, Primitive::Int | Primitive::Bool)
        | (BinaryOperator::Mult, Primitive::Int | Primitive::Bool, sequence)
            if sequence.is_sequence() =>
        {
            Some(Type::Primitive(sequence))
        }
        (BinaryOperator::Add, Primitive::Str, Primitive::Str) => Some(Type::str()),
        (BinaryOperator::Add, Primitive::Bytes, Primitive::Bytes) => Some(Type::bytes()),
        _ => None,
    }
}

fn consistent_fallback(types: &TypeArena, left: &Type, right: &Type) -> Option<Type> {
    if is_consistent(types, left, right) {
        Some(left.clone())
    } else {
        None
    }
}

/// Result type of a unary operation.
pub fn resolve_unary_op(op: UnaryOperator, operand: &Type) -> Type {
    if op == UnaryOperator::Not {
        return Type::bool();
    }

    match operand {
        Type::Union(union) => Type::union_of(
            union
                .elts()
                .iter()
                .map(|elt| resolve_unary_op(op, elt))
                .collect(),
            Some(union.probs().to_vec()),
        ),
        Type::Primitive(primitive) if primitive.is_numeric() => match op {
            UnaryOperator::Invert if !matches!(primitive, Primitive::Int | Primitive::Bool) => {
                Type::Any
            }
            _ => Type::Primitive(promote(*primitive)),
        },
        _ => Type::Any,
    }
}
