/// A single IR operation (§4.8). The set is closed: every variant the
/// visitor or optimizer needs to reason about is listed here, rather than a
/// generic opcode-plus-payload record.
#[derive(Clone, Debug, PartialEq)]
pub enum IROp {
    Halt,
    JumpLabel(String),
    JumpNotZeroLabel(String),
    JumpZeroLabel(String),
    CallParamc(u32),
    Return,
    Drop,
    Duplicate,
    PushLabel(String),
    PushInt(i32),
    PushChr(u8),
    PushStr(String),
    LoadLocalOffset(u32),
    StoreLocalOffset(u32),
    UnaryDereference,
    UnaryNegate,
    UnaryNot,
    BinaryAdd,
    BinarySubtract,
    BinaryMultiply,
    BinaryDivide,
    BinaryModulo,
    BinaryEquals,
    BinaryNotEquals,
    BinaryGreater,
    BinaryGreaterEquals,
    BinaryLess,
    BinaryLessEquals,
    BinaryAnd,
    BinaryOr,
    PutChr,
}

impl IROp {
    /// Whether control can never fall through past this op to the next one
    /// in the same block (§4.8, §4.9).
    pub fn is_terminator(&self) -> bool {
        matches!(self, IROp::Halt | IROp::JumpLabel(_) | IROp::Return)
    }

    /// The block label this op references, for the optimizer's reachability
    /// walk.
    pub fn label_ref(&self) -> Option<&str> {
        match self {
            IROp::JumpLabel(l) | IROp::JumpNotZeroLabel(l) | IROp::JumpZeroLabel(l)
            | IROp::PushLabel(l) => Some(l),
            _ => None,
        }
    }
}

impl std::fmt::Display for IROp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IROp::CallParamc(n) => write!(f, "CALL_PARAMC {n};"),
            IROp::PushInt(v) => write!(f, "PUSH_INT {v};"),
            IROp::LoadLocalOffset(o) => write!(f, "LOAD_LOCAL_OFFSET {o};"),
            IROp::StoreLocalOffset(o) => write!(f, "STORE_LOCAL_OFFSET {o};"),
            IROp::JumpLabel(l) => write!(f, "JUMP_LABEL {l};"),
            IROp::JumpNotZeroLabel(l) => write!(f, "JUMP_NOT_ZERO_LABEL {l};"),
            IROp::JumpZeroLabel(l) => write!(f, "JUMP_ZERO_LABEL {l};"),
            IROp::PushLabel(l) => write!(f, "PUSH_LABEL {l};"),
            IROp::PushChr(c) => write!(f, "PUSH_CHR {c};"),
            IROp::PushStr(s) => write!(f, "PUSH_STR {s:?};"),
            other => write!(f, "{other:?};"),
        }
    }
}
