//! Conditions compiled to jumps rather than boolean values.
//!
//! `gen_branch(e, jump_if, target)` jumps to `target` when `e` evaluates to
//! `jump_if` and falls through otherwise. Short-circuit operators and
//! negation are folded into the jump structure; comparisons against zero or
//! `null` use the one-operand branch instructions.

use super::code::Label;
use super::gen::MethodGen;
use super::opcodes::*;
use crate::ast::{BinaryOp, Expr, ExprKind, Literal, UnaryOp};
use crate::common::model::ConstValue;
use crate::common::types::{PrimitiveType, TypeId};
use crate::error::{Error, Result};
use crate::wash::{BinaryKind, Binding, ConvStep};

/// `if<cond>` opcode comparing a value against zero for a comparison
/// operator
fn zero_branch(op: BinaryOp) -> Option<u8> {
    Some(match op {
        BinaryOp::Eq => IFEQ,
        BinaryOp::Ne => IFNE,
        BinaryOp::Lt => IFLT,
        BinaryOp::Ge => IFGE,
        BinaryOp::Gt => IFGT,
        BinaryOp::Le => IFLE,
        _ => return None,
    })
}

/// `if_icmp<cond>` opcode for a comparison operator
fn int_branch(op: BinaryOp) -> Option<u8> {
    Some(match op {
        BinaryOp::Eq => IF_ICMPEQ,
        BinaryOp::Ne => IF_ICMPNE,
        BinaryOp::Lt => IF_ICMPLT,
        BinaryOp::Ge => IF_ICMPGE,
        BinaryOp::Gt => IF_ICMPGT,
        BinaryOp::Le => IF_ICMPLE,
        _ => return None,
    })
}

/// The operator with its operands swapped: `a < b` is `b > a`
fn swapped(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::Lt => BinaryOp::Gt,
        BinaryOp::Gt => BinaryOp::Lt,
        BinaryOp::Le => BinaryOp::Ge,
        BinaryOp::Ge => BinaryOp::Le,
        other => other,
    }
}

impl<'g, 'u> MethodGen<'g, 'u> {
    /// Jump to `target` if `expr` is `jump_if`
    pub(super) fn gen_branch(&mut self, expr: &'u Expr, jump_if: bool, target: Label) -> Result<()> {
        let tables = self.tables;
        let info = tables.expr(expr.id)?;
        if let Some(value) = info.constant.as_ref().and_then(ConstValue::as_bool) {
            if value == jump_if {
                self.code.goto(target);
            }
            return Ok(());
        }
        if !info.conversion.is_empty() {
            // a Boolean operand: unbox, then test
            self.gen_expr(expr)?;
            self.code.jump(if jump_if { IFNE } else { IFEQ }, target);
            return Ok(());
        }
        self.gen_cond_raw(expr, jump_if, target)
    }

    /// Like `gen_branch`, ignoring the expression's own constant value and
    /// conversions
    pub(super) fn gen_cond_raw(&mut self, expr: &'u Expr, jump_if: bool, target: Label) -> Result<()> {
        let tables = self.tables;
        let info = tables.expr(expr.id)?;
        match (&expr.kind, &info.binding) {
            (ExprKind::Paren(inner), _) => self.gen_branch(inner, jump_if, target),
            (ExprKind::Unary { op: UnaryOp::Not, operand }, Binding::Unary(_)) => {
                self.gen_branch(operand, !jump_if, target)
            }
            (ExprKind::Binary { op: BinaryOp::And, left, right }, _) => {
                if jump_if {
                    let skip = self.code.new_label();
                    self.gen_branch(left, false, skip)?;
                    self.gen_branch(right, true, target)?;
                    self.code.place(skip);
                } else {
                    self.gen_branch(left, false, target)?;
                    self.gen_branch(right, false, target)?;
                }
                Ok(())
            }
            (ExprKind::Binary { op: BinaryOp::Or, left, right }, _) => {
                if jump_if {
                    self.gen_branch(left, true, target)?;
                    self.gen_branch(right, true, target)?;
                } else {
                    let skip = self.code.new_label();
                    self.gen_branch(left, true, skip)?;
                    self.gen_branch(right, false, target)?;
                    self.code.place(skip);
                }
                Ok(())
            }
            (ExprKind::Binary { op, left, right }, Binding::Binary(kind)) if op.is_comparison() => {
                self.gen_comparison(*op, *kind, left, right, jump_if, target)
            }
            _ => {
                self.gen_raw(expr)?;
                self.code.jump(if jump_if { IFNE } else { IFEQ }, target);
                Ok(())
            }
        }
    }

    fn gen_comparison(
        &mut self,
        op: BinaryOp,
        kind: BinaryKind,
        left: &'u Expr,
        right: &'u Expr,
        jump_if: bool,
        target: Label,
    ) -> Result<()> {
        // NaN must make the source comparison false, so pick fcmpg/fcmpl on
        // the operator as written
        let nan_high = matches!(op, BinaryOp::Lt | BinaryOp::Le);
        let op = if jump_if { op } else { negate(op) };
        match kind {
            BinaryKind::Numeric(p) if matches!(p, PrimitiveType::Long | PrimitiveType::Float | PrimitiveType::Double) => {
                self.gen_expr(left)?;
                self.gen_expr(right)?;
                let compare = match p {
                    PrimitiveType::Long => LCMP,
                    PrimitiveType::Float if nan_high => FCMPG,
                    PrimitiveType::Float => FCMPL,
                    _ if nan_high => DCMPG,
                    _ => DCMPL,
                };
                self.code.emitop(compare);
                self.code.jump(zero_branch(op).ok_or_else(|| bad_comparison(op))?, target);
            }
            BinaryKind::Numeric(_) | BinaryKind::Boolean => {
                if self.is_zero(right)? {
                    self.gen_expr(left)?;
                    self.code.jump(zero_branch(op).ok_or_else(|| bad_comparison(op))?, target);
                } else if self.is_zero(left)? {
                    self.gen_expr(right)?;
                    let op = swapped(op);
                    self.code.jump(zero_branch(op).ok_or_else(|| bad_comparison(op))?, target);
                } else {
                    self.gen_expr(left)?;
                    self.gen_expr(right)?;
                    self.code.jump(int_branch(op).ok_or_else(|| bad_comparison(op))?, target);
                }
            }
            BinaryKind::Reference => {
                let null_test = |op: BinaryOp| if op == BinaryOp::Eq { IFNULL } else { IFNONNULL };
                if self.is_null(right)? {
                    self.gen_expr(left)?;
                    self.code.jump(null_test(op), target);
                } else if self.is_null(left)? {
                    self.gen_expr(right)?;
                    self.code.jump(null_test(op), target);
                } else {
                    self.gen_expr(left)?;
                    self.gen_expr(right)?;
                    let branch = if op == BinaryOp::Eq { IF_ACMPEQ } else { IF_ACMPNE };
                    self.code.jump(branch, target);
                }
            }
            BinaryKind::Concat => return Err(bad_comparison(op)),
        }
        Ok(())
    }

    /// An `int` operand that is the constant zero
    fn is_zero(&self, expr: &Expr) -> Result<bool> {
        let info = self.tables.expr(expr.id)?;
        let converted_int = info
            .conversion
            .iter()
            .all(|step| matches!(step, ConvStep::Primitive(_, PrimitiveType::Int)));
        Ok(converted_int && info.constant.as_ref().and_then(ConstValue::as_int) == Some(0) && info.ty != TypeId::BOOLEAN)
    }

    fn is_null(&self, expr: &Expr) -> Result<bool> {
        Ok(matches!(expr.unparen().kind, ExprKind::Literal(Literal::Null)) && self.tables.expr(expr.id)?.conversion.is_empty())
    }
}

/// The comparison that holds exactly when `op` does not
fn negate(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::Eq => BinaryOp::Ne,
        BinaryOp::Ne => BinaryOp::Eq,
        BinaryOp::Lt => BinaryOp::Ge,
        BinaryOp::Ge => BinaryOp::Lt,
        BinaryOp::Gt => BinaryOp::Le,
        BinaryOp::Le => BinaryOp::Gt,
        other => other,
    }
}

fn bad_comparison(op: BinaryOp) -> Error {
    Error::internal(format!("no branch instruction for {}", op.symbol()))
}
