//! Conversion contexts (JLS 5): assignment, method invocation and casting.
//!
//! A legal conversion is described as a list of [`ConvStep`]s that the code
//! generator applies after evaluating the converted expression; an empty
//! list is the identity or a widening reference conversion.

use crate::common::model::ConstValue;
use crate::common::types::{PrimitiveType, TypeArena, TypeId, TypeKind};
use crate::error::Result;

use super::const_fold::fits_narrowing;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvStep {
    /// Widening or narrowing between two primitive types
    Primitive(PrimitiveType, PrimitiveType),
    /// `Wrapper.valueOf`
    Box(PrimitiveType),
    /// `wrapper.xValue()` on a reference already of the wrapper type
    Unbox(PrimitiveType),
    /// `checkcast` to this type
    Checkcast(TypeId),
}

/// Which conversions a context allows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    Assignment,
    /// Overload phase one: no boxing
    StrictInvocation,
    /// Overload phases two and three
    LooseInvocation,
}

fn primitive_steps(from: PrimitiveType, to: PrimitiveType) -> Vec<ConvStep> {
    if from == to {
        Vec::new()
    } else {
        vec![ConvStep::Primitive(from, to)]
    }
}

/// Conversion of a value of type `from` to `to` in an assignment or
/// invocation context, or `None` when the types are incompatible
pub fn convert(
    arena: &mut TypeArena,
    from: TypeId,
    to: TypeId,
    constant: Option<&ConstValue>,
    context: Context,
) -> Result<Option<Vec<ConvStep>>> {
    if from == to {
        return Ok(Some(Vec::new()));
    }
    if from == TypeId::VOID || to == TypeId::VOID {
        return Ok(None);
    }
    match (arena.primitive(from), arena.primitive(to)) {
        (Some(f), Some(t)) => {
            if f.widens_to(t) {
                return Ok(Some(primitive_steps(f, t)));
            }
            if context == Context::Assignment && f.is_int_like() && f != PrimitiveType::Boolean {
                if let Some(value) = constant {
                    if fits_narrowing(value, t) {
                        return Ok(Some(primitive_steps(f, t)));
                    }
                }
            }
            Ok(None)
        }
        (Some(f), None) => {
            if context == Context::StrictInvocation {
                return Ok(None);
            }
            // boxing then widening reference
            if let Some(boxed) = arena.box_type(f) {
                if arena.is_subtype(boxed, to)? {
                    return Ok(Some(vec![ConvStep::Box(f)]));
                }
            }
            // narrowing of a constant, then boxing: `Byte b = 1`
            if context == Context::Assignment {
                if let (Some(value), Some(target)) = (constant, arena.unboxed(to)) {
                    if matches!(target, PrimitiveType::Byte | PrimitiveType::Short | PrimitiveType::Char)
                        && f.is_int_like()
                        && fits_narrowing(value, target)
                    {
                        let mut steps = primitive_steps(f, target);
                        steps.push(ConvStep::Box(target));
                        return Ok(Some(steps));
                    }
                }
            }
            Ok(None)
        }
        (None, Some(t)) => {
            if context == Context::StrictInvocation {
                return Ok(None);
            }
            // unboxing then widening primitive
            match arena.unboxed(from) {
                Some(p) if p == t || p.widens_to(t) => {
                    let mut steps = vec![ConvStep::Unbox(p)];
                    steps.extend(primitive_steps(p, t));
                    Ok(Some(steps))
                }
                _ => Ok(None),
            }
        }
        (None, None) => {
            if arena.is_subtype(from, to)? {
                Ok(Some(Vec::new()))
            } else {
                Ok(None)
            }
        }
    }
}

/// Is a reference of type `from` castable to `to`? Covers the widening and
/// narrowing reference conversions.
pub fn reference_castable(arena: &mut TypeArena, from: TypeId, to: TypeId) -> Result<bool> {
    if arena.is_subtype(from, to)? || arena.is_subtype(to, from)? {
        return Ok(true);
    }
    match (arena.kind(from), arena.kind(to)) {
        (TypeKind::Array(a), TypeKind::Array(b)) => {
            if arena.is_reference(a) && arena.is_reference(b) {
                reference_castable(arena, a, b)
            } else {
                Ok(false)
            }
        }
        (TypeKind::Class(_), TypeKind::Class(_)) => {
            let from_interface = arena.is_interface(from)?;
            let to_interface = arena.is_interface(to)?;
            match (from_interface, to_interface) {
                (true, true) => Ok(true),
                (true, false) => Ok(!arena.class_data(to)?.is_final()),
                (false, true) => Ok(!arena.class_data(from)?.is_final()),
                (false, false) => Ok(false),
            }
        }
        _ => Ok(false),
    }
}

/// Conversion in a casting context (JLS 5.5), or `None` if illegal
pub fn cast(arena: &mut TypeArena, from: TypeId, to: TypeId) -> Result<Option<Vec<ConvStep>>> {
    if from == to {
        return Ok(Some(Vec::new()));
    }
    if from == TypeId::VOID || to == TypeId::VOID {
        return Ok(None);
    }
    match (arena.primitive(from), arena.primitive(to)) {
        (Some(f), Some(t)) => {
            if f == PrimitiveType::Boolean || t == PrimitiveType::Boolean {
                Ok(None)
            } else {
                Ok(Some(primitive_steps(f, t)))
            }
        }
        (Some(_), None) => convert(arena, from, to, None, Context::LooseInvocation),
        (None, Some(t)) => {
            if let Some(steps) = convert(arena, from, to, None, Context::LooseInvocation)? {
                return Ok(Some(steps));
            }
            // `(int) obj`: checkcast to the wrapper, then unbox
            let Some(boxed) = arena.box_type(t) else {
                return Ok(None);
            };
            if from == TypeId::NULL || !arena.is_subtype(boxed, from)? {
                return Ok(None);
            }
            Ok(Some(vec![ConvStep::Checkcast(boxed), ConvStep::Unbox(t)]))
        }
        (None, None) => {
            if from == TypeId::NULL || arena.is_subtype(from, to)? {
                Ok(Some(Vec::new()))
            } else if reference_castable(arena, from, to)? {
                Ok(Some(vec![ConvStep::Checkcast(to)]))
            } else {
                Ok(None)
            }
        }
    }
}

/// Unary numeric promotion (JLS 5.6.1)
pub fn unary_promotion(p: PrimitiveType) -> PrimitiveType {
    match p {
        PrimitiveType::Byte | PrimitiveType::Short | PrimitiveType::Char => PrimitiveType::Int,
        other => other,
    }
}

/// Binary numeric promotion (JLS 5.6.2)
pub fn binary_promotion(a: PrimitiveType, b: PrimitiveType) -> PrimitiveType {
    use PrimitiveType::*;
    if a == Double || b == Double {
        Double
    } else if a == Float || b == Float {
        Float
    } else if a == Long || b == Long {
        Long
    } else {
        Int
    }
}

/// Steps converting an operand of type `from` to the primitive `to` for
/// numeric promotion, unboxing first when needed
pub fn promote(arena: &TypeArena, from: TypeId, to: PrimitiveType) -> Vec<ConvStep> {
    match arena.primitive(from) {
        Some(p) => primitive_steps(p, to),
        None => match arena.unboxed(from) {
            Some(p) => {
                let mut steps = vec![ConvStep::Unbox(p)];
                steps.extend(primitive_steps(p, to));
                steps
            }
            None => Vec::new(),
        },
    }
}

/// Primitive type after unboxing, when the type is numeric
pub fn numeric(arena: &TypeArena, ty: TypeId) -> Option<PrimitiveType> {
    arena.unboxed_or_primitive(ty).filter(|p| p.is_numeric())
}

/// Is the type `boolean` or `Boolean`?
pub fn is_boolean(arena: &TypeArena, ty: TypeId) -> bool {
    arena.unboxed_or_primitive(ty) == Some(PrimitiveType::Boolean)
}

/// Is a checked exception type (not a subclass of `RuntimeException` or `Error`)?
pub fn is_checked_exception(arena: &mut TypeArena, ty: TypeId) -> Result<bool> {
    Ok(arena.is_subtype(ty, TypeId::THROWABLE)?
        && !arena.is_subtype(ty, TypeId::RUNTIME_EXCEPTION)?
        && !arena.is_subtype(ty, TypeId::ERROR)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::cache::ExternalTypes;

    fn arena() -> TypeArena {
        TypeArena::new(ExternalTypes::bootstrap())
    }

    #[test]
    fn widening_and_constant_narrowing() {
        let mut arena = arena();
        let steps = convert(&mut arena, TypeId::INT, TypeId::LONG, None, Context::Assignment).unwrap();
        assert_eq!(steps, Some(vec![ConvStep::Primitive(PrimitiveType::Int, PrimitiveType::Long)]));
        let small = ConstValue::Int(10);
        let big = ConstValue::Int(1000);
        assert!(convert(&mut arena, TypeId::INT, TypeId::BYTE, Some(&small), Context::Assignment)
            .unwrap()
            .is_some());
        assert!(convert(&mut arena, TypeId::INT, TypeId::BYTE, Some(&big), Context::Assignment)
            .unwrap()
            .is_none());
        assert!(convert(&mut arena, TypeId::INT, TypeId::BYTE, Some(&small), Context::LooseInvocation)
            .unwrap()
            .is_none());
    }

    #[test]
    fn boxing_is_not_allowed_in_strict_invocation() {
        let mut arena = arena();
        let integer = arena.class_named("java/lang/Integer");
        assert!(convert(&mut arena, TypeId::INT, integer, None, Context::StrictInvocation)
            .unwrap()
            .is_none());
        assert_eq!(
            convert(&mut arena, TypeId::INT, TypeId::OBJECT, None, Context::LooseInvocation).unwrap(),
            Some(vec![ConvStep::Box(PrimitiveType::Int)])
        );
        assert_eq!(
            convert(&mut arena, integer, TypeId::LONG, None, Context::Assignment).unwrap(),
            Some(vec![
                ConvStep::Unbox(PrimitiveType::Int),
                ConvStep::Primitive(PrimitiveType::Int, PrimitiveType::Long)
            ])
        );
    }

    #[test]
    fn casts_between_references() {
        let mut arena = arena();
        let integer = arena.class_named("java/lang/Integer");
        assert_eq!(
            cast(&mut arena, TypeId::OBJECT, TypeId::STRING).unwrap(),
            Some(vec![ConvStep::Checkcast(TypeId::STRING)])
        );
        assert_eq!(cast(&mut arena, integer, TypeId::STRING).unwrap(), None);
        assert_eq!(
            cast(&mut arena, TypeId::OBJECT, TypeId::INT).unwrap(),
            Some(vec![ConvStep::Checkcast(integer), ConvStep::Unbox(PrimitiveType::Int)])
        );
        assert_eq!(cast(&mut arena, TypeId::BOOLEAN, TypeId::INT).unwrap(), None);
    }

    #[test]
    fn promotions() {
        assert_eq!(unary_promotion(PrimitiveType::Char), PrimitiveType::Int);
        assert_eq!(binary_promotion(PrimitiveType::Int, PrimitiveType::Float), PrimitiveType::Float);
        assert_eq!(binary_promotion(PrimitiveType::Short, PrimitiveType::Byte), PrimitiveType::Int);
    }

    #[test]
    fn checked_exceptions() {
        let mut arena = arena();
        let io = arena.class_named("java/io/IOException");
        assert!(is_checked_exception(&mut arena, io).unwrap());
        assert!(!is_checked_exception(&mut arena, TypeId::RUNTIME_EXCEPTION).unwrap());
        assert!(is_checked_exception(&mut arena, TypeId::THROWABLE).unwrap());
    }
}
