//! funcy-bc - lowers [`funcy_ir::IRCode`] to the FVM's bytecode encoding
//! (§4.10, §4.11): instruction opcodes, the suffix-compressed string table,
//! and the serializer that ties them together.

mod opcode;
mod serializer;
mod string_table;

pub use opcode::{Opcode, FORMAT_VERSION, HEADER_SIZE, MAGIC};
pub use serializer::{serialize, serialize_flat};
pub use string_table::StringTable;
