//! Compile-time evaluation of constant expressions (JLS 15.28)
//!
//! Arithmetic follows the JVM's fixed-width semantics: integer operations
//! wrap, shift distances are masked, and integer division by zero is not a
//! constant (the expression is left to fail at run time).

use crate::ast::{BinaryOp, UnaryOp};
use crate::common::model::ConstValue;
use crate::common::types::PrimitiveType;

/// Apply a unary operator to a constant already promoted to `ty`
pub fn fold_unary(op: UnaryOp, value: &ConstValue, ty: PrimitiveType) -> Option<ConstValue> {
    use PrimitiveType::*;
    match op {
        UnaryOp::Plus => value.convert_to(ty),
        UnaryOp::Minus => Some(match ty {
            Int => ConstValue::Int(value.as_int()?.wrapping_neg()),
            Long => ConstValue::Long(value.as_long()?.wrapping_neg()),
            Float => ConstValue::Float(-value.as_float()?),
            Double => ConstValue::Double(-value.as_double()?),
            _ => return None,
        }),
        UnaryOp::BitNot => Some(match ty {
            Int => ConstValue::Int(!value.as_int()?),
            Long => ConstValue::Long(!value.as_long()?),
            _ => return None,
        }),
        UnaryOp::Not => Some(ConstValue::Boolean(!value.as_bool()?)),
        _ => None,
    }
}

/// Apply a binary operator; `ty` is the promoted operand type (for shifts,
/// the promoted left operand type)
pub fn fold_binary(op: BinaryOp, left: &ConstValue, right: &ConstValue, ty: PrimitiveType) -> Option<ConstValue> {
    use PrimitiveType::*;
    if op.is_shift() {
        let distance = right.as_long()?;
        return Some(match ty {
            Int => {
                let l = left.as_int()?;
                let d = (distance & 0x1f) as u32;
                ConstValue::Int(match op {
                    BinaryOp::Shl => l.wrapping_shl(d),
                    BinaryOp::Shr => l.wrapping_shr(d),
                    _ => ((l as u32) >> d) as i32,
                })
            }
            Long => {
                let l = left.as_long()?;
                let d = (distance & 0x3f) as u32;
                ConstValue::Long(match op {
                    BinaryOp::Shl => l.wrapping_shl(d),
                    BinaryOp::Shr => l.wrapping_shr(d),
                    _ => ((l as u64) >> d) as i64,
                })
            }
            _ => return None,
        });
    }
    match ty {
        Boolean => {
            let (l, r) = (left.as_bool()?, right.as_bool()?);
            Some(ConstValue::Boolean(match op {
                BinaryOp::And | BinaryOp::BitAnd => l && r,
                BinaryOp::Or | BinaryOp::BitOr => l || r,
                BinaryOp::BitXor | BinaryOp::Ne => l != r,
                BinaryOp::Eq => l == r,
                _ => return None,
            }))
        }
        Int => {
            let (l, r) = (left.as_int()?, right.as_int()?);
            Some(match op {
                BinaryOp::Add => ConstValue::Int(l.wrapping_add(r)),
                BinaryOp::Sub => ConstValue::Int(l.wrapping_sub(r)),
                BinaryOp::Mul => ConstValue::Int(l.wrapping_mul(r)),
                BinaryOp::Div if r != 0 => ConstValue::Int(l.wrapping_div(r)),
                BinaryOp::Rem if r != 0 => ConstValue::Int(l.wrapping_rem(r)),
                BinaryOp::BitAnd => ConstValue::Int(l & r),
                BinaryOp::BitOr => ConstValue::Int(l | r),
                BinaryOp::BitXor => ConstValue::Int(l ^ r),
                _ => return compare(op, l.cmp(&r)),
            })
        }
        Long => {
            let (l, r) = (left.as_long()?, right.as_long()?);
            Some(match op {
                BinaryOp::Add => ConstValue::Long(l.wrapping_add(r)),
                BinaryOp::Sub => ConstValue::Long(l.wrapping_sub(r)),
                BinaryOp::Mul => ConstValue::Long(l.wrapping_mul(r)),
                BinaryOp::Div if r != 0 => ConstValue::Long(l.wrapping_div(r)),
                BinaryOp::Rem if r != 0 => ConstValue::Long(l.wrapping_rem(r)),
                BinaryOp::BitAnd => ConstValue::Long(l & r),
                BinaryOp::BitOr => ConstValue::Long(l | r),
                BinaryOp::BitXor => ConstValue::Long(l ^ r),
                _ => return compare(op, l.cmp(&r)),
            })
        }
        Float => {
            let (l, r) = (left.as_float()?, right.as_float()?);
            Some(match op {
                BinaryOp::Add => ConstValue::Float(l + r),
                BinaryOp::Sub => ConstValue::Float(l - r),
                BinaryOp::Mul => ConstValue::Float(l * r),
                BinaryOp::Div => ConstValue::Float(l / r),
                BinaryOp::Rem => ConstValue::Float(l % r),
                _ => return compare_float(op, l.partial_cmp(&r)),
            })
        }
        Double => {
            let (l, r) = (left.as_double()?, right.as_double()?);
            Some(match op {
                BinaryOp::Add => ConstValue::Double(l + r),
                BinaryOp::Sub => ConstValue::Double(l - r),
                BinaryOp::Mul => ConstValue::Double(l * r),
                BinaryOp::Div => ConstValue::Double(l / r),
                BinaryOp::Rem => ConstValue::Double(l % r),
                _ => return compare_float(op, l.partial_cmp(&r)),
            })
        }
        _ => None,
    }
}

fn compare(op: BinaryOp, ordering: std::cmp::Ordering) -> Option<ConstValue> {
    use std::cmp::Ordering::*;
    Some(ConstValue::Boolean(match op {
        BinaryOp::Lt => ordering == Less,
        BinaryOp::Le => ordering != Greater,
        BinaryOp::Gt => ordering == Greater,
        BinaryOp::Ge => ordering != Less,
        BinaryOp::Eq => ordering == Equal,
        BinaryOp::Ne => ordering != Equal,
        _ => return None,
    }))
}

/// Comparisons involving NaN are false, except `!=`
fn compare_float(op: BinaryOp, ordering: Option<std::cmp::Ordering>) -> Option<ConstValue> {
    match ordering {
        Some(ordering) => compare(op, ordering),
        None if op.is_comparison() => Some(ConstValue::Boolean(op == BinaryOp::Ne)),
        None => None,
    }
}

/// String concatenation of two constants
pub fn fold_concat(left: &ConstValue, right: &ConstValue) -> ConstValue {
    ConstValue::String(format!("{}{}", left.to_java_string(), right.to_java_string()))
}

/// `==`/`!=` between two string constants; interned literals compare by value
pub fn fold_string_equality(op: BinaryOp, left: &ConstValue, right: &ConstValue) -> Option<ConstValue> {
    match (left, right, op) {
        (ConstValue::String(l), ConstValue::String(r), BinaryOp::Eq) => Some(ConstValue::Boolean(l == r)),
        (ConstValue::String(l), ConstValue::String(r), BinaryOp::Ne) => Some(ConstValue::Boolean(l != r)),
        _ => None,
    }
}

/// Can `value` be assigned to `target` by implicit narrowing (JLS 5.2)?
pub fn fits_narrowing(value: &ConstValue, target: PrimitiveType) -> bool {
    let Some(v) = value.as_int() else {
        return false;
    };
    if matches!(value, ConstValue::Boolean(_)) {
        return false;
    }
    match target {
        PrimitiveType::Byte => (i8::MIN as i32..=i8::MAX as i32).contains(&v),
        PrimitiveType::Short => (i16::MIN as i32..=i16::MAX as i32).contains(&v),
        PrimitiveType::Char => (0..=u16::MAX as i32).contains(&v),
        PrimitiveType::Int => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arithmetic_wraps() {
        let max = ConstValue::Int(i32::MAX);
        let one = ConstValue::Int(1);
        assert_eq!(
            fold_binary(BinaryOp::Add, &max, &one, PrimitiveType::Int),
            Some(ConstValue::Int(i32::MIN))
        );
        assert_eq!(
            fold_binary(BinaryOp::Div, &ConstValue::Int(i32::MIN), &ConstValue::Int(-1), PrimitiveType::Int),
            Some(ConstValue::Int(i32::MIN))
        );
        assert_eq!(fold_unary(UnaryOp::Minus, &ConstValue::Int(i32::MIN), PrimitiveType::Int), Some(ConstValue::Int(i32::MIN)));
    }

    #[test]
    fn division_by_zero_is_not_constant() {
        assert_eq!(fold_binary(BinaryOp::Div, &ConstValue::Int(1), &ConstValue::Int(0), PrimitiveType::Int), None);
        assert_eq!(
            fold_binary(BinaryOp::Div, &ConstValue::Double(1.0), &ConstValue::Double(0.0), PrimitiveType::Double),
            Some(ConstValue::Double(f64::INFINITY))
        );
    }

    #[test]
    fn shift_distances_are_masked() {
        assert_eq!(
            fold_binary(BinaryOp::Shl, &ConstValue::Int(1), &ConstValue::Int(33), PrimitiveType::Int),
            Some(ConstValue::Int(2))
        );
        assert_eq!(
            fold_binary(BinaryOp::UShr, &ConstValue::Int(-1), &ConstValue::Int(28), PrimitiveType::Int),
            Some(ConstValue::Int(15))
        );
        assert_eq!(
            fold_binary(BinaryOp::Shr, &ConstValue::Long(-16), &ConstValue::Int(2), PrimitiveType::Long),
            Some(ConstValue::Long(-4))
        );
    }

    #[test]
    fn nan_comparisons() {
        let nan = ConstValue::Double(f64::NAN);
        assert_eq!(fold_binary(BinaryOp::Eq, &nan, &nan, PrimitiveType::Double), Some(ConstValue::Boolean(false)));
        assert_eq!(fold_binary(BinaryOp::Ne, &nan, &nan, PrimitiveType::Double), Some(ConstValue::Boolean(true)));
    }

    #[test]
    fn concatenation_uses_java_text() {
        let folded = fold_concat(&ConstValue::String("x".into()), &ConstValue::Char(b'y' as u16));
        assert_eq!(folded, ConstValue::String("xy".into()));
        let folded = fold_concat(&ConstValue::Double(1.0), &ConstValue::Boolean(true));
        assert_eq!(folded, ConstValue::String("1.0true".into()));
    }

    #[test]
    fn narrowing_ranges() {
        assert!(fits_narrowing(&ConstValue::Int(127), PrimitiveType::Byte));
        assert!(!fits_narrowing(&ConstValue::Int(128), PrimitiveType::Byte));
        assert!(!fits_narrowing(&ConstValue::Int(-1), PrimitiveType::Char));
        assert!(fits_narrowing(&ConstValue::Char(65), PrimitiveType::Short));
        assert!(!fits_narrowing(&ConstValue::Long(1), PrimitiveType::Int));
    }
}
