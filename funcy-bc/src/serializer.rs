//! IR to bytecode (§4.10): two-pass address assignment, then byte emission.

use std::collections::HashMap;

use funcy_ir::{IRCode, IROp, END_LABEL};

use crate::opcode::{Opcode, FORMAT_VERSION, HEADER_SIZE, MAGIC};
use crate::string_table::StringTable;

/// Words written by `CALL` before the first parameter (saved FP, saved
/// IP); local offsets are biased by this so offset 0 addresses the first
/// parameter (§4.11).
const FRAME_HEADER_WORDS: u32 = 2;

/// The compiled size, in bytes, of a single IR op (§4.10).
fn op_size(op: &IROp) -> u32 {
    match op {
        IROp::Halt
        | IROp::Return
        | IROp::Drop
        | IROp::Duplicate
        | IROp::UnaryDereference
        | IROp::UnaryNegate
        | IROp::UnaryNot
        | IROp::BinaryAdd
        | IROp::BinarySubtract
        | IROp::BinaryMultiply
        | IROp::BinaryDivide
        | IROp::BinaryModulo
        | IROp::BinaryEquals
        | IROp::BinaryNotEquals
        | IROp::BinaryGreater
        | IROp::BinaryGreaterEquals
        | IROp::BinaryLess
        | IROp::BinaryLessEquals
        | IROp::BinaryAnd
        | IROp::BinaryOr
        | IROp::PutChr => 1,
        IROp::PushChr(_) => 2,
        IROp::PushLabel(_) | IROp::PushInt(_) | IROp::PushStr(_) => 5,
        IROp::JumpLabel(_)
        | IROp::JumpNotZeroLabel(_)
        | IROp::JumpZeroLabel(_)
        | IROp::CallParamc(_)
        | IROp::LoadLocalOffset(_)
        | IROp::StoreLocalOffset(_) => 6,
    }
}

/// Byte offset of every block's first op, relative to the start of the
/// code segment. `.end` maps to the total code segment size.
fn label_addresses(code: &IRCode) -> HashMap<String, u32> {
    let mut addresses = HashMap::new();
    let mut offset = 0u32;

    for block in code.blocks() {
        addresses.insert(block.label.clone(), offset);
        for op in &block.ops {
            offset += op_size(op);
        }
    }
    addresses.insert(END_LABEL.to_string(), offset);
    addresses
}

fn push_u8(out: &mut Vec<u8>, opcode: Opcode, value: u8) {
    out.push(opcode as u8);
    out.push(value);
}

fn push_u32(out: &mut Vec<u8>, opcode: Opcode, value: u32) {
    out.push(opcode as u8);
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_s32(out: &mut Vec<u8>, opcode: Opcode, value: i32) {
    out.push(opcode as u8);
    out.extend_from_slice(&value.to_le_bytes());
}

fn binary_opcode(op: &IROp) -> Opcode {
    match op {
        IROp::BinaryAdd => Opcode::BinaryAdd,
        IROp::BinarySubtract => Opcode::BinarySubtract,
        IROp::BinaryMultiply => Opcode::BinaryMultiply,
        IROp::BinaryDivide => Opcode::BinaryDivide,
        IROp::BinaryModulo => Opcode::BinaryModulo,
        IROp::BinaryEquals => Opcode::BinaryEquals,
        IROp::BinaryNotEquals => Opcode::BinaryNotEquals,
        IROp::BinaryGreater => Opcode::BinaryGreater,
        IROp::BinaryGreaterEquals => Opcode::BinaryGreaterEquals,
        IROp::BinaryLess => Opcode::BinaryLess,
        IROp::BinaryLessEquals => Opcode::BinaryLessEquals,
        IROp::BinaryAnd => Opcode::BinaryAnd,
        IROp::BinaryOr => Opcode::BinaryOr,
        other => unreachable!("{other:?} is not a binary op"),
    }
}

/// Serialize `code` to a flat code segment plus its string table, without
/// the 16-byte header. Used by `serialize` and directly by callers that
/// only want the raw instruction stream (e.g. disassembly tooling).
pub fn serialize_flat(code: &IRCode) -> Vec<u8> {
    let labels = label_addresses(code);
    let strings: Vec<String> = code
        .blocks()
        .iter()
        .flat_map(|b| &b.ops)
        .filter_map(|op| match op {
            IROp::PushStr(s) => Some(s.clone()),
            _ => None,
        })
        .collect();
    let (table, string_offsets) = StringTable::build(strings);
    let code_size = labels[END_LABEL];

    let mut out = Vec::new();
    for block in code.blocks() {
        for op in &block.ops {
            emit_op(&mut out, op, &labels, &string_offsets, code_size);
        }
    }

    out.extend(table.into_bytes());
    out
}

fn emit_op(
    out: &mut Vec<u8>,
    op: &IROp,
    labels: &HashMap<String, u32>,
    string_offsets: &HashMap<String, u32>,
    code_size: u32,
) {
    match op {
        IROp::Halt => out.push(Opcode::Halt as u8),
        IROp::Return => out.push(Opcode::Return as u8),
        IROp::Drop => out.push(Opcode::Drop as u8),
        IROp::Duplicate => out.push(Opcode::Duplicate as u8),
        IROp::UnaryDereference => out.push(Opcode::UnaryDereference as u8),
        IROp::UnaryNegate => out.push(Opcode::UnaryNegate as u8),
        IROp::UnaryNot => out.push(Opcode::UnaryNot as u8),
        IROp::PutChr => out.push(Opcode::PutChr as u8),
        op @ (IROp::BinaryAdd
        | IROp::BinarySubtract
        | IROp::BinaryMultiply
        | IROp::BinaryDivide
        | IROp::BinaryModulo
        | IROp::BinaryEquals
        | IROp::BinaryNotEquals
        | IROp::BinaryGreater
        | IROp::BinaryGreaterEquals
        | IROp::BinaryLess
        | IROp::BinaryLessEquals
        | IROp::BinaryAnd
        | IROp::BinaryOr) => out.push(binary_opcode(op) as u8),
        IROp::PushChr(c) => push_u8(out, Opcode::PushU8, *c),
        IROp::PushInt(v) => push_s32(out, Opcode::PushS32, *v),
        IROp::PushLabel(label) => push_u32(out, Opcode::PushU32, *labels.get(label).unwrap_or(&0)),
        IROp::PushStr(s) => push_u32(out, Opcode::PushU32, code_size + string_offsets[s]),
        IROp::CallParamc(n) => {
            push_u32(out, Opcode::PushU32, *n);
            out.push(Opcode::Call as u8);
        }
        IROp::JumpLabel(label) => {
            push_u32(out, Opcode::PushU32, *labels.get(label).unwrap_or(&0));
            out.push(Opcode::Jump as u8);
        }
        IROp::JumpZeroLabel(label) => {
            push_u32(out, Opcode::PushU32, *labels.get(label).unwrap_or(&0));
            out.push(Opcode::JumpZero as u8);
        }
        IROp::JumpNotZeroLabel(label) => {
            push_u32(out, Opcode::PushU32, *labels.get(label).unwrap_or(&0));
            out.push(Opcode::JumpNotZero as u8);
        }
        IROp::LoadLocalOffset(offset) => {
            push_u32(out, Opcode::PushU32, offset + FRAME_HEADER_WORDS);
            out.push(Opcode::LoadLocal as u8);
        }
        IROp::StoreLocalOffset(offset) => {
            push_u32(out, Opcode::PushU32, offset + FRAME_HEADER_WORDS);
            out.push(Opcode::StoreLocal as u8);
        }
    }
}

/// Serialize `code` with the 16-byte bytecode header (§3, §6) in front.
pub fn serialize(code: &IRCode) -> Vec<u8> {
    let payload = serialize_flat(code);

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend(payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use funcy_ir::MAIN_LABEL;

    #[test]
    fn header_carries_magic_version_and_payload_length() {
        let mut code = IRCode::new();
        code.emit(IROp::PushInt(42));
        code.emit(IROp::Halt);

        let bytes = serialize(&code);
        assert_eq!(&bytes[..8], &MAGIC);
        assert_eq!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()), FORMAT_VERSION);
        let payload_len = u32::from_le_bytes(bytes[12..16].try_into().unwrap());
        assert_eq!(payload_len as usize, bytes.len() - HEADER_SIZE);
    }

    #[test]
    fn push_int_then_halt_is_six_bytes_of_payload() {
        let mut code = IRCode::new();
        code.emit(IROp::PushInt(42));
        code.emit(IROp::Halt);

        let payload = serialize_flat(&code);
        assert_eq!(payload.len(), 6);
        assert_eq!(payload[0], Opcode::PushS32 as u8);
        assert_eq!(i32::from_le_bytes(payload[1..5].try_into().unwrap()), 42);
        assert_eq!(payload[5], Opcode::Halt as u8);
    }

    #[test]
    fn jump_label_resolves_to_the_targets_byte_offset() {
        let mut code = IRCode::new();
        code.emit(IROp::Halt); // 1 byte, so `other` starts at offset 1
        let other = code.append_block("other");
        code.emit(IROp::Return);
        code.set_cursor(MAIN_LABEL);
        code.emit(IROp::JumpLabel(other));

        let payload = serialize_flat(&code);
        // main: [HALT, PUSH_U32 1, JUMP]; other: [RETURN]
        assert_eq!(payload[0], Opcode::Halt as u8);
        assert_eq!(payload[1], Opcode::PushU32 as u8);
        assert_eq!(u32::from_le_bytes(payload[2..6].try_into().unwrap()), 1);
        assert_eq!(payload[6], Opcode::Jump as u8);
        assert_eq!(payload[7], Opcode::Return as u8);
    }

    #[test]
    fn local_offsets_are_biased_by_the_frame_header() {
        let mut code = IRCode::new();
        code.emit(IROp::LoadLocalOffset(0));
        code.emit(IROp::Halt);

        let payload = serialize_flat(&code);
        assert_eq!(payload[0], Opcode::PushU32 as u8);
        assert_eq!(u32::from_le_bytes(payload[1..5].try_into().unwrap()), FRAME_HEADER_WORDS);
        assert_eq!(payload[5], Opcode::LoadLocal as u8);
    }

    #[test]
    fn push_str_operand_points_past_the_code_segment() {
        let mut code = IRCode::new();
        code.emit(IROp::PushStr("hi".to_string()));
        code.emit(IROp::Halt);

        let payload = serialize_flat(&code);
        let operand = u32::from_le_bytes(payload[1..5].try_into().unwrap());
        assert_eq!(operand, 6); // code segment is PUSH_U32(5) + HALT(1) = 6 bytes
        assert_eq!(&payload[6..8], b"hi");
        assert_eq!(payload[8], 0);
    }

    #[test]
    fn serializing_twice_is_byte_identical() {
        let mut code = IRCode::new();
        code.emit(IROp::PushStr("a".to_string()));
        code.emit(IROp::PushStr("ba".to_string()));
        code.emit(IROp::Halt);

        assert_eq!(serialize(&code), serialize(&code));
    }
}
