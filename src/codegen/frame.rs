//! Verification types and `StackMapTable` frames (JVMS 4.7.4)

use std::collections::HashMap;

use super::code::Label;
use super::constpool::ConstantPool;
use crate::common::types::{PrimitiveType, TypeArena, TypeId, TypeKind};
use crate::error::{Error, Result};

/// Type of one local slot or operand stack entry as the verifier sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VType {
    Top,
    Integer,
    Float,
    Long,
    Double,
    Null,
    UninitializedThis,
    /// Class reference name: internal name, or descriptor for arrays
    Object(String),
    /// Result of the `new` placed at this label, before `<init>` ran
    Uninitialized(Label),
}

impl VType {
    pub fn object(name: impl Into<String>) -> Self {
        VType::Object(name.into())
    }

    pub fn of_primitive(p: PrimitiveType) -> Self {
        match p {
            PrimitiveType::Long => VType::Long,
            PrimitiveType::Float => VType::Float,
            PrimitiveType::Double => VType::Double,
            PrimitiveType::Void => VType::Top,
            _ => VType::Integer,
        }
    }

    pub fn of(arena: &TypeArena, ty: TypeId) -> Self {
        match arena.kind(ty) {
            TypeKind::Primitive(p) => VType::of_primitive(p),
            TypeKind::Null => VType::Null,
            TypeKind::Array(_) | TypeKind::Class(_) => VType::Object(arena.class_ref_name(ty)),
        }
    }

    /// Slots occupied
    pub fn size(&self) -> u16 {
        match self {
            VType::Long | VType::Double => 2,
            _ => 1,
        }
    }

    pub fn is_wide(&self) -> bool {
        self.size() == 2
    }

    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            VType::Null | VType::Object(_) | VType::UninitializedThis | VType::Uninitialized(_)
        )
    }

    /// Least upper bound as far as frames need it
    pub fn merge(&self, other: &VType) -> VType {
        match (self, other) {
            (a, b) if a == b => a.clone(),
            (VType::Null, VType::Object(name)) | (VType::Object(name), VType::Null) => VType::Object(name.clone()),
            (VType::Object(_), VType::Object(_)) => VType::object("java/lang/Object"),
            _ => VType::Top,
        }
    }

    fn write(&self, pool: &mut ConstantPool, offsets: &HashMap<Label, u32>, out: &mut Vec<u8>) -> Result<()> {
        match self {
            VType::Top => out.push(0),
            VType::Integer => out.push(1),
            VType::Float => out.push(2),
            VType::Double => out.push(3),
            VType::Long => out.push(4),
            VType::Null => out.push(5),
            VType::UninitializedThis => out.push(6),
            VType::Object(name) => {
                out.push(7);
                out.extend_from_slice(&pool.class(name)?.to_be_bytes());
            }
            VType::Uninitialized(label) => {
                let offset = offsets
                    .get(label)
                    .ok_or_else(|| Error::internal("uninitialized value refers to an unplaced `new`"))?;
                out.push(8);
                out.extend_from_slice(&(*offset as u16).to_be_bytes());
            }
        }
        Ok(())
    }
}

/// Verifier state at one instruction. Locals are per slot, with the second
/// half of a long or double stored as `Top`; the stack holds one entry per
/// value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub locals: Vec<VType>,
    pub stack: Vec<VType>,
}

impl Frame {
    pub fn new(locals: Vec<VType>, stack: Vec<VType>) -> Self {
        Self { locals, stack }
    }

    pub fn merge(&self, other: &Frame) -> Frame {
        let len = self.locals.len().max(other.locals.len());
        let locals = (0..len)
            .map(|i| match (self.locals.get(i), other.locals.get(i)) {
                (Some(a), Some(b)) => a.merge(b),
                _ => VType::Top,
            })
            .collect();
        let stack = if self.stack.len() == other.stack.len() {
            self.stack.iter().zip(&other.stack).map(|(a, b)| a.merge(b)).collect()
        } else {
            log::error!("stack height mismatch at merge: {:?} vs {:?}", self.stack, other.stack);
            self.stack.clone()
        };
        Frame { locals, stack }
    }

    pub fn truncate_locals(&mut self, slots: usize) {
        self.locals.truncate(slots);
    }

    /// Replace every occurrence of an uninitialized value once `<init>` ran
    pub fn initialize(&mut self, from: &VType, to: &VType) {
        for v in self.locals.iter_mut().chain(self.stack.iter_mut()) {
            if v == from {
                *v = to.clone();
            }
        }
    }

    /// Locals in table form: one entry per value, trailing `Top`s dropped
    pub fn compact_locals(&self) -> Vec<VType> {
        let mut out = Vec::with_capacity(self.locals.len());
        let mut i = 0;
        while i < self.locals.len() {
            let v = &self.locals[i];
            out.push(v.clone());
            i += v.size() as usize;
        }
        while out.last() == Some(&VType::Top) {
            out.pop();
        }
        out
    }
}

fn write_all(types: &[VType], pool: &mut ConstantPool, offsets: &HashMap<Label, u32>, out: &mut Vec<u8>) -> Result<()> {
    for t in types {
        t.write(pool, offsets, out)?;
    }
    Ok(())
}

/// Encode frames, sorted by offset, relative to the method's entry frame.
/// Returns the entry count and the encoded entries.
pub fn encode_stack_map(
    pool: &mut ConstantPool,
    initial: &Frame,
    frames: &[(u32, Frame)],
    offsets: &HashMap<Label, u32>,
) -> Result<(u16, Vec<u8>)> {
    let mut out = Vec::new();
    let mut previous_locals = initial.compact_locals();
    let mut previous_offset: Option<u32> = None;

    for (offset, frame) in frames {
        let delta = match previous_offset {
            None => *offset,
            Some(prev) => offset
                .checked_sub(prev + 1)
                .ok_or_else(|| Error::internal("stack map frames out of order"))?,
        };
        if delta > u32::from(u16::MAX) {
            return Err(Error::internal("stack map offset delta overflow"));
        }
        let delta = delta as u16;
        let locals = frame.compact_locals();
        let same_locals = locals == previous_locals;

        if same_locals && frame.stack.is_empty() {
            if delta <= 63 {
                out.push(delta as u8);
            } else {
                out.push(251);
                out.extend_from_slice(&delta.to_be_bytes());
            }
        } else if same_locals && frame.stack.len() == 1 {
            if delta <= 63 {
                out.push(64 + delta as u8);
            } else {
                out.push(247);
                out.extend_from_slice(&delta.to_be_bytes());
            }
            frame.stack[0].write(pool, offsets, &mut out)?;
        } else if frame.stack.is_empty()
            && locals.len() < previous_locals.len()
            && previous_locals.len() - locals.len() <= 3
            && previous_locals.starts_with(&locals)
        {
            out.push(251 - (previous_locals.len() - locals.len()) as u8);
            out.extend_from_slice(&delta.to_be_bytes());
        } else if frame.stack.is_empty()
            && locals.len() > previous_locals.len()
            && locals.len() - previous_locals.len() <= 3
            && locals.starts_with(&previous_locals)
        {
            let added = &locals[previous_locals.len()..];
            out.push(251 + added.len() as u8);
            out.extend_from_slice(&delta.to_be_bytes());
            write_all(added, pool, offsets, &mut out)?;
        } else {
            out.push(255);
            out.extend_from_slice(&delta.to_be_bytes());
            out.extend_from_slice(&(locals.len() as u16).to_be_bytes());
            write_all(&locals, pool, offsets, &mut out)?;
            out.extend_from_slice(&(frame.stack.len() as u16).to_be_bytes());
            write_all(&frame.stack, pool, offsets, &mut out)?;
        }

        previous_locals = locals;
        previous_offset = Some(*offset);
    }

    Ok((frames.len() as u16, out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(locals: Vec<VType>, stack: Vec<VType>) -> Frame {
        Frame::new(locals, stack)
    }

    #[test]
    fn merge_widens_to_common_types() {
        assert_eq!(VType::Null.merge(&VType::object("java/lang/String")), VType::object("java/lang/String"));
        assert_eq!(
            VType::object("java/lang/String").merge(&VType::object("java/lang/Integer")),
            VType::object("java/lang/Object")
        );
        assert_eq!(VType::Integer.merge(&VType::Float), VType::Top);
    }

    #[test]
    fn compact_locals_skip_wide_halves() {
        let f = frame(vec![VType::Long, VType::Top, VType::Integer, VType::Top], vec![]);
        assert_eq!(f.compact_locals(), vec![VType::Long, VType::Integer]);
    }

    #[test]
    fn frame_kinds_are_chosen_by_difference() {
        let mut pool = ConstantPool::new();
        let offsets = HashMap::new();
        let initial = frame(vec![VType::Integer], vec![]);
        let frames = vec![
            (5, frame(vec![VType::Integer], vec![])),
            (9, frame(vec![VType::Integer], vec![VType::Integer])),
            (12, frame(vec![VType::Integer, VType::Integer], vec![])),
            (20, frame(vec![], vec![])),
        ];
        let (count, bytes) = encode_stack_map(&mut pool, &initial, &frames, &offsets).unwrap();
        assert_eq!(count, 4);
        // same(5), same_locals_1(3) int, append1 delta 2 int, chop2 delta 7
        assert_eq!(bytes, vec![5, 64 + 3, 1, 252, 0, 2, 1, 249, 0, 7]);
    }

    #[test]
    fn large_deltas_use_extended_forms() {
        let mut pool = ConstantPool::new();
        let offsets = HashMap::new();
        let initial = Frame::default();
        let frames = vec![(100, Frame::default())];
        let (_, bytes) = encode_stack_map(&mut pool, &initial, &frames, &offsets).unwrap();
        assert_eq!(bytes, vec![251, 0, 100]);
    }
}
