//! Two-pass assembly of a [`Code`] buffer into bytecode.
//!
//! Pass one assigns constant pool indices and then offsets, widening
//! branches whose displacement does not fit 16 bits until the layout is
//! stable. Pass two writes the bytes and resolves every label to its final
//! offset for the exception, debug and stack map tables.

use std::collections::{BTreeMap, HashMap};

use super::attribute::{ExceptionTableEntry, LocalVariableEntry};
use super::code::{Code, Insn, Label, LdcValue};
use super::constpool::ConstantPool;
use super::frame::{encode_stack_map, Frame};
use super::opcodes::*;
use crate::error::{Error, Result};

const MAX_CODE_LENGTH: u32 = 65535;

#[derive(Debug, Default)]
pub struct Assembled {
    pub bytecode: Vec<u8>,
    pub max_stack: u16,
    pub max_locals: u16,
    pub exception_table: Vec<ExceptionTableEntry>,
    /// (start_pc, line)
    pub lines: Vec<(u16, u16)>,
    pub local_vars: Vec<LocalVariableEntry>,
    /// Entry count and encoded frames, when requested and non-empty
    pub stack_map: Option<(u16, Vec<u8>)>,
}

fn switch_padding(pc: u32) -> u32 {
    (4 - (pc + 1) % 4) % 4
}

fn is_short_form_local(op: u8, slot: u16) -> bool {
    slot <= 3 && matches!(op, ILOAD..=ALOAD | ISTORE..=ASTORE)
}

fn insn_size(insn: &Insn, pc: u32, index: u16, wide: bool) -> u32 {
    match insn {
        Insn::Op(_) => 1,
        Insn::Byte(..) => 2,
        Insn::Short(..) => 3,
        Insn::Local(op, slot) => {
            if is_short_form_local(*op, *slot) {
                1
            } else if *slot <= 255 {
                2
            } else {
                4
            }
        }
        Insn::Iinc(slot, delta) => {
            if *slot <= 255 && (-128..=127).contains(delta) {
                3
            } else {
                6
            }
        }
        Insn::Ldc(value) => {
            if value.is_wide() || index > 255 {
                3
            } else {
                2
            }
        }
        Insn::Type(..) | Insn::Field(..) => 3,
        Insn::Invoke(op, _) => {
            if *op == INVOKEINTERFACE {
                5
            } else {
                3
            }
        }
        Insn::MultiANewArray(..) => 4,
        Insn::Jump { op, .. } => match (wide, *op == GOTO) {
            (false, _) => 3,
            (true, true) => 5,
            // inverted branch over a goto_w
            (true, false) => 8,
        },
        Insn::TableSwitch { targets, .. } => 1 + switch_padding(pc) + 12 + 4 * targets.len() as u32,
        Insn::LookupSwitch { pairs, .. } => 1 + switch_padding(pc) + 8 + 8 * pairs.len() as u32,
        Insn::Mark(_) | Insn::Line(_) => 0,
    }
}

struct Layout {
    offsets: Vec<u32>,
    labels: HashMap<Label, u32>,
    length: u32,
}

fn layout(insns: &[Insn], indices: &[u16], wide: &[bool]) -> Layout {
    let mut offsets = Vec::with_capacity(insns.len());
    let mut labels = HashMap::new();
    let mut pc = 0u32;
    for (i, insn) in insns.iter().enumerate() {
        offsets.push(pc);
        if let Insn::Mark(label) = insn {
            labels.insert(*label, pc);
        }
        pc += insn_size(insn, pc, indices[i], wide[i]);
    }
    Layout {
        offsets,
        labels,
        length: pc,
    }
}

fn label_offset(layout: &Layout, label: Label) -> Result<u32> {
    layout
        .labels
        .get(&label)
        .copied()
        .ok_or_else(|| Error::internal(format!("label {:?} was never placed", label)))
}

fn intern(insn: &Insn, pool: &mut ConstantPool) -> Result<u16> {
    Ok(match insn {
        Insn::Ldc(value) => match value {
            LdcValue::Int(v) => pool.integer(*v)?,
            LdcValue::Float(v) => pool.float(*v)?,
            LdcValue::Long(v) => pool.long(*v)?,
            LdcValue::Double(v) => pool.double(*v)?,
            LdcValue::String(s) => pool.string(s)?,
            LdcValue::Class(name) => pool.class(name)?,
        },
        Insn::Type(_, name) | Insn::MultiANewArray(name, _) => pool.class(name)?,
        Insn::Field(_, member) => pool.field_ref(member)?,
        Insn::Invoke(INVOKEINTERFACE, member) => pool.interface_method_ref(member)?,
        Insn::Invoke(_, member) => pool.method_ref(member)?,
        _ => 0,
    })
}

/// Argument slots of `invokeinterface`, receiver included
fn interface_count(descriptor: &str) -> Result<u8> {
    let desc = crate::common::descriptor::parse_method_descriptor(descriptor)?;
    Ok((crate::common::descriptor::param_slots(&desc) + 1) as u8)
}

pub fn assemble(code: &Code, pool: &mut ConstantPool, with_frames: bool) -> Result<Assembled> {
    if let Some(message) = &code.error {
        return Err(Error::internal(format!("in {}: {}", code.this_class(), message)));
    }
    let insns = &code.insns;

    let indices = insns.iter().map(|i| intern(i, pool)).collect::<Result<Vec<_>>>()?;

    let mut wide = vec![false; insns.len()];
    let mut current = layout(insns, &indices, &wide);
    loop {
        let mut changed = false;
        for (i, insn) in insns.iter().enumerate() {
            if let Insn::Jump { target, .. } = insn {
                if wide[i] {
                    continue;
                }
                let displacement = i64::from(label_offset(&current, *target)?) - i64::from(current.offsets[i]);
                if displacement < i64::from(i16::MIN) || displacement > i64::from(i16::MAX) {
                    wide[i] = true;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
        current = layout(insns, &indices, &wide);
    }
    if current.length > MAX_CODE_LENGTH {
        return Err(Error::internal(format!("code of a method in {} is too large", code.this_class())));
    }

    let mut bytes = Vec::with_capacity(current.length as usize);
    let mut lines: Vec<(u16, u16)> = Vec::new();
    let mut widened_fallthroughs: Vec<(u32, Frame)> = Vec::new();

    for (i, insn) in insns.iter().enumerate() {
        let pc = current.offsets[i];
        let index = indices[i];
        match insn {
            Insn::Op(op) => bytes.push(*op),
            Insn::Byte(op, value) => bytes.extend_from_slice(&[*op, *value]),
            Insn::Short(op, value) => {
                bytes.push(*op);
                bytes.extend_from_slice(&value.to_be_bytes());
            }
            Insn::Local(op, slot) => {
                if is_short_form_local(*op, *slot) {
                    let short = if *op <= ALOAD {
                        ILOAD_0 + (op - ILOAD) * 4
                    } else {
                        ISTORE_0 + (op - ISTORE) * 4
                    };
                    bytes.push(short + *slot as u8);
                } else if *slot <= 255 {
                    bytes.extend_from_slice(&[*op, *slot as u8]);
                } else {
                    bytes.extend_from_slice(&[WIDE, *op]);
                    bytes.extend_from_slice(&slot.to_be_bytes());
                }
            }
            Insn::Iinc(slot, delta) => {
                if *slot <= 255 && (-128..=127).contains(delta) {
                    bytes.extend_from_slice(&[IINC, *slot as u8, *delta as i8 as u8]);
                } else {
                    bytes.extend_from_slice(&[WIDE, IINC]);
                    bytes.extend_from_slice(&slot.to_be_bytes());
                    bytes.extend_from_slice(&delta.to_be_bytes());
                }
            }
            Insn::Ldc(value) => {
                if value.is_wide() {
                    bytes.push(LDC2_W);
                    bytes.extend_from_slice(&index.to_be_bytes());
                } else if index <= 255 {
                    bytes.extend_from_slice(&[LDC, index as u8]);
                } else {
                    bytes.push(LDC_W);
                    bytes.extend_from_slice(&index.to_be_bytes());
                }
            }
            Insn::Type(op, _) | Insn::Field(op, _) => {
                bytes.push(*op);
                bytes.extend_from_slice(&index.to_be_bytes());
            }
            Insn::Invoke(op, member) => {
                bytes.push(*op);
                bytes.extend_from_slice(&index.to_be_bytes());
                if *op == INVOKEINTERFACE {
                    bytes.extend_from_slice(&[interface_count(&member.descriptor)?, 0]);
                }
            }
            Insn::MultiANewArray(_, dims) => {
                bytes.push(MULTIANEWARRAY);
                bytes.extend_from_slice(&index.to_be_bytes());
                bytes.push(*dims);
            }
            Insn::Jump { op, target, fallthrough } => {
                let target_pc = label_offset(&current, *target)?;
                if !wide[i] {
                    let displacement = (i64::from(target_pc) - i64::from(pc)) as i16;
                    bytes.push(*op);
                    bytes.extend_from_slice(&displacement.to_be_bytes());
                } else if *op == GOTO {
                    let displacement = (i64::from(target_pc) - i64::from(pc)) as i32;
                    bytes.push(GOTO_W);
                    bytes.extend_from_slice(&displacement.to_be_bytes());
                } else {
                    bytes.push(negate_branch(*op));
                    bytes.extend_from_slice(&8i16.to_be_bytes());
                    let displacement = (i64::from(target_pc) - i64::from(pc + 3)) as i32;
                    bytes.push(GOTO_W);
                    bytes.extend_from_slice(&displacement.to_be_bytes());
                    if let Some(frame) = fallthrough {
                        widened_fallthroughs.push((pc + 8, (**frame).clone()));
                    }
                }
            }
            Insn::TableSwitch { low, default, targets } => {
                bytes.push(TABLESWITCH);
                bytes.resize(bytes.len() + switch_padding(pc) as usize, 0);
                let relative = |label: Label| -> Result<i32> {
                    Ok((i64::from(label_offset(&current, label)?) - i64::from(pc)) as i32)
                };
                bytes.extend_from_slice(&relative(*default)?.to_be_bytes());
                bytes.extend_from_slice(&low.to_be_bytes());
                let high = low + targets.len() as i32 - 1;
                bytes.extend_from_slice(&high.to_be_bytes());
                for target in targets {
                    bytes.extend_from_slice(&relative(*target)?.to_be_bytes());
                }
            }
            Insn::LookupSwitch { default, pairs } => {
                bytes.push(LOOKUPSWITCH);
                bytes.resize(bytes.len() + switch_padding(pc) as usize, 0);
                let relative = |label: Label| -> Result<i32> {
                    Ok((i64::from(label_offset(&current, label)?) - i64::from(pc)) as i32)
                };
                bytes.extend_from_slice(&relative(*default)?.to_be_bytes());
                bytes.extend_from_slice(&(pairs.len() as i32).to_be_bytes());
                for (key, target) in pairs {
                    bytes.extend_from_slice(&key.to_be_bytes());
                    bytes.extend_from_slice(&relative(*target)?.to_be_bytes());
                }
            }
            Insn::Mark(_) => {}
            Insn::Line(line) => {
                let pc = pc as u16;
                match lines.last_mut() {
                    Some(last) if last.0 == pc => last.1 = *line,
                    Some(last) if last.1 == *line => {}
                    _ => lines.push((pc, *line)),
                }
            }
        }
    }
    debug_assert_eq!(bytes.len() as u32, current.length);
    // a line entry at the very end of the code describes nothing
    if lines.last().is_some_and(|l| u32::from(l.0) >= current.length) {
        lines.pop();
    }

    let mut exception_table = Vec::with_capacity(code.handlers.len());
    for handler in &code.handlers {
        let start = label_offset(&current, handler.start)?;
        let end = label_offset(&current, handler.end)?;
        if start >= end {
            continue;
        }
        let handler_pc = label_offset(&current, handler.handler)?;
        let catch_type = match &handler.catch_type {
            Some(name) => pool.class(name)?,
            None => 0,
        };
        exception_table.push(ExceptionTableEntry::new(start as u16, end as u16, handler_pc as u16, catch_type));
    }

    let mut local_vars = Vec::new();
    for var in &code.local_vars {
        let (Some(start), Some(end)) = (
            current.labels.get(&var.start).copied(),
            var.end.and_then(|e| current.labels.get(&e).copied()),
        ) else {
            continue;
        };
        if start >= end {
            continue;
        }
        local_vars.push(LocalVariableEntry {
            start_pc: start as u16,
            length: (end - start) as u16,
            name_index: pool.utf8(&var.name)?,
            descriptor_index: pool.utf8(&var.descriptor)?,
            index: var.slot,
        });
    }

    let stack_map = if with_frames {
        let mut frames: BTreeMap<u32, Frame> = BTreeMap::new();
        for (pc, frame) in widened_fallthroughs {
            frames.insert(pc, frame);
        }
        for (index, info) in code.labels.iter().enumerate() {
            if !info.target {
                continue;
            }
            let Some(frame) = &info.frame else { continue };
            let Some(&pc) = current.labels.get(&Label::from_index(index)) else {
                continue;
            };
            if pc < current.length {
                frames.insert(pc, frame.clone());
            }
        }
        if frames.is_empty() {
            None
        } else {
            let frames: Vec<(u32, Frame)> = frames.into_iter().collect();
            Some(encode_stack_map(pool, &code.initial, &frames, &current.labels)?)
        }
    } else {
        None
    };

    log::trace!(
        "assembled {} bytes of code, {} handlers, {} frames",
        bytes.len(),
        exception_table.len(),
        stack_map.as_ref().map(|s| s.0).unwrap_or(0)
    );

    Ok(Assembled {
        bytecode: bytes,
        max_stack: code.max_stack(),
        max_locals: code.max_locals(),
        exception_table,
        lines,
        local_vars,
        stack_map,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::frame::VType;

    #[test]
    fn small_constants_use_bipush() {
        let mut code = Code::new("T", true, false, &[]);
        code.push_int(7);
        code.emit_return(Some(&VType::Integer));
        code.finish();
        let mut pool = ConstantPool::new();
        let out = assemble(&code, &mut pool, true).unwrap();
        assert_eq!(out.bytecode, vec![BIPUSH, 7, IRETURN]);
        assert!(out.stack_map.is_none());
        assert_eq!(out.max_stack, 1);
    }

    #[test]
    fn forward_branch_targets_get_frames() {
        let mut code = Code::new("T", true, false, &[VType::Integer]);
        let skip = code.new_label();
        code.load(0, VType::Integer);
        code.jump(IFEQ, skip);
        code.iinc(0, 1);
        code.place(skip);
        code.emitop(RETURN);
        code.finish();
        let mut pool = ConstantPool::new();
        let out = assemble(&code, &mut pool, true).unwrap();
        // iload_0; ifeq +6; iinc 0 1; return
        assert_eq!(out.bytecode, vec![ILOAD_0, IFEQ, 0, 6, IINC, 0, 1, RETURN]);
        assert_eq!(out.stack_map, Some((1, vec![7])));
    }

    #[test]
    fn far_branches_are_widened() {
        let mut code = Code::new("T", true, false, &[VType::Integer]);
        let end = code.new_label();
        code.load(0, VType::Integer);
        code.jump(IFNE, end);
        for _ in 0..11000 {
            code.iinc(0, 1);
        }
        code.place(end);
        code.emitop(RETURN);
        code.finish();
        let mut pool = ConstantPool::new();
        let out = assemble(&code, &mut pool, true).unwrap();
        assert_eq!(out.bytecode[1], IFEQ);
        assert_eq!(&out.bytecode[2..4], &8i16.to_be_bytes());
        assert_eq!(out.bytecode[4], GOTO_W);
        let displacement = i32::from_be_bytes([out.bytecode[5], out.bytecode[6], out.bytecode[7], out.bytecode[8]]);
        assert_eq!(displacement as usize, 5 + 3 * 11000);
        let (count, _) = out.stack_map.unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn table_switch_is_aligned() {
        let mut code = Code::new("T", true, false, &[VType::Integer]);
        let a = code.new_label();
        let b = code.new_label();
        let default = code.new_label();
        code.load(0, VType::Integer);
        code.table_switch(0, default, vec![a, b]);
        code.place(a);
        code.place(b);
        code.place(default);
        code.emitop(RETURN);
        code.finish();
        let mut pool = ConstantPool::new();
        let out = assemble(&code, &mut pool, false).unwrap();
        // iload_0 at 0, tableswitch at 1, two padding bytes, then 4-aligned operands
        assert_eq!(out.bytecode[1], TABLESWITCH);
        assert_eq!(&out.bytecode[2..4], &[0, 0]);
        assert_eq!(out.bytecode.len(), 4 + 12 + 8 + 1);
    }

    #[test]
    fn empty_try_ranges_are_dropped() {
        let mut code = Code::new("T", true, false, &[]);
        let start = code.new_label();
        let end = code.new_label();
        let handler = code.new_label();
        code.place(start);
        code.place(end);
        code.emitop(RETURN);
        code.add_handler(start, end, handler, None);
        code.place_handler(handler, vec![], VType::object("java/lang/Throwable"));
        code.emitop(ATHROW);
        code.finish();
        let mut pool = ConstantPool::new();
        let out = assemble(&code, &mut pool, true).unwrap();
        assert!(out.exception_table.is_empty());
    }
}
