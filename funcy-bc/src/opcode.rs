//! The FVM's bytecode instruction set (§4.11) and bytecode header (§3, §6).
//!
//! Defined here rather than in `funcy-vm` so the serializer and the
//! interpreter share one source of truth for the byte encoding; `funcy-vm`
//! depends on this crate for decoding.

/// 16-byte bytecode header magic: `0x83 'F' 'V' 'M' 0x0D 0x0A 0x1A 0x0A`.
pub const MAGIC: [u8; 8] = [0x83, 0x46, 0x56, 0x4D, 0x0D, 0x0A, 0x1A, 0x0A];
pub const FORMAT_VERSION: u32 = 1;
pub const HEADER_SIZE: usize = 16;

/// A single FVM instruction opcode. Values are this workspace's own
/// encoding (the upstream `fvm.py`/`serializer.py` pair only implements a
/// handful of opcodes and never assigns stable byte values worth copying).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Halt = 0,
    NoOperation = 1,
    Jump = 2,
    JumpNotZero = 3,
    JumpZero = 4,
    Call = 5,
    Return = 6,
    Drop = 7,
    Duplicate = 8,
    PushU8 = 9,
    PushS8 = 10,
    PushU16 = 11,
    PushS16 = 12,
    PushU32 = 13,
    PushS32 = 14,
    LoadLocal = 15,
    StoreLocal = 16,
    UnaryDereference = 17,
    UnaryNegate = 18,
    UnaryNot = 19,
    BinaryAdd = 20,
    BinarySubtract = 21,
    BinaryMultiply = 22,
    BinaryDivide = 23,
    BinaryModulo = 24,
    BinaryEquals = 25,
    BinaryNotEquals = 26,
    BinaryGreater = 27,
    BinaryGreaterEquals = 28,
    BinaryLess = 29,
    BinaryLessEquals = 30,
    BinaryAnd = 31,
    BinaryOr = 32,
    PutChr = 33,
    /// Legacy: pop and print a decimal integer followed by a newline. Kept
    /// only so bytecode compiled before `putChr`-based IO still decodes;
    /// the visitor never emits it (see DESIGN.md).
    Print = 34,
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        use Opcode::*;
        Some(match byte {
            0 => Halt,
            1 => NoOperation,
            2 => Jump,
            3 => JumpNotZero,
            4 => JumpZero,
            5 => Call,
            6 => Return,
            7 => Drop,
            8 => Duplicate,
            9 => PushU8,
            10 => PushS8,
            11 => PushU16,
            12 => PushS16,
            13 => PushU32,
            14 => PushS32,
            15 => LoadLocal,
            16 => StoreLocal,
            17 => UnaryDereference,
            18 => UnaryNegate,
            19 => UnaryNot,
            20 => BinaryAdd,
            21 => BinarySubtract,
            22 => BinaryMultiply,
            23 => BinaryDivide,
            24 => BinaryModulo,
            25 => BinaryEquals,
            26 => BinaryNotEquals,
            27 => BinaryGreater,
            28 => BinaryGreaterEquals,
            29 => BinaryLess,
            30 => BinaryLessEquals,
            31 => BinaryAnd,
            32 => BinaryOr,
            33 => PutChr,
            34 => Print,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_opcode_round_trips_through_its_byte_value() {
        for byte in 0..=34u8 {
            assert_eq!(Opcode::from_byte(byte).map(|o| o as u8), Some(byte));
        }
    }

    #[test]
    fn out_of_range_byte_decodes_to_none() {
        assert_eq!(Opcode::from_byte(255), None);
    }
}
