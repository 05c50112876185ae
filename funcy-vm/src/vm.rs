use std::io::{self, Stdout, Write};

use funcy_bc::{Opcode, FORMAT_VERSION, HEADER_SIZE, MAGIC};

use crate::error::LoadError;

/// The Funcy Virtual Machine (§4.11): a stack machine over 32-bit signed
/// words, with a byte-addressed program memory. `W` is where `PUT_CHR`/
/// `PRINT` write; tests plug in a `Vec<u8>`, the driver plugs in stdout.
pub struct Vm<W: Write = Stdout> {
    execution_flag: bool,
    exit_code: i32,
    program_memory: Vec<u8>,
    stack_memory: Vec<i32>,
    instruction_pointer: u32,
    frame_pointer: u32,
    output: W,
}

impl Vm<Stdout> {
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Vm<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Vm<W> {
    pub fn with_output(output: W) -> Self {
        Self {
            execution_flag: false,
            exit_code: 0,
            program_memory: Vec::new(),
            stack_memory: Vec::new(),
            instruction_pointer: 0,
            frame_pointer: 0,
            output,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn is_running(&self) -> bool {
        self.execution_flag
    }

    /// The output sink written by `PUT_CHR`/`PRINT`.
    pub fn output(&self) -> &W {
        &self.output
    }

    /// Verify header bytes, version, and declared payload length (§4.11,
    /// §6), then load the payload as flat code.
    pub fn load(&mut self, bytecode: &[u8]) -> Result<(), LoadError> {
        if bytecode.len() < HEADER_SIZE {
            return Err(LoadError::TooShortForHeader { len: bytecode.len() });
        }
        if bytecode[0..8] != MAGIC {
            return Err(LoadError::MagicMismatch);
        }
        let version = u32::from_le_bytes(bytecode[8..12].try_into().unwrap());
        if version != FORMAT_VERSION {
            return Err(LoadError::VersionMismatch { found: version, expected: FORMAT_VERSION });
        }
        let size = u32::from_le_bytes(bytecode[12..16].try_into().unwrap());
        let payload = &bytecode[HEADER_SIZE..];
        if (payload.len() as u32) < size {
            return Err(LoadError::TruncatedPayload { declared: size, available: payload.len() });
        }

        self.load_flat(payload[..size as usize].to_vec());
        Ok(())
    }

    /// Load flat bytecode with no header. Returns `false` (and leaves any
    /// previously loaded program in place) if the VM is mid-execution.
    pub fn load_flat(&mut self, bytecode: Vec<u8>) -> bool {
        if self.execution_flag {
            return false;
        }
        self.program_memory = bytecode;
        true
    }

    /// Reset stack/FP/IP/EC and set the execution flag. Returns `false` if
    /// already running.
    pub fn begin(&mut self) -> bool {
        if self.execution_flag {
            return false;
        }
        self.instruction_pointer = 0;
        self.stack_memory.clear();
        self.frame_pointer = 0;
        self.exit_code = 0;
        self.execution_flag = true;
        true
    }

    /// Run `begin` then step until the execution flag clears, returning the
    /// exit code.
    pub fn run(&mut self) -> i32 {
        self.begin();
        while self.execution_flag {
            self.step();
        }
        let _ = self.output.flush();
        self.exit_code
    }

    fn crash(&mut self) {
        self.exit_code = 1;
        self.execution_flag = false;
    }

    fn validate_fetch(&mut self, amount: u32) -> bool {
        if (self.instruction_pointer as usize) + amount as usize > self.program_memory.len() {
            self.crash();
            return false;
        }
        true
    }

    fn validate_pop(&mut self, amount: usize) -> bool {
        if self.stack_memory.len() < amount {
            self.crash();
            return false;
        }
        true
    }

    fn fetch_int(&mut self, size: u32, is_signed: bool) -> i64 {
        let start = self.instruction_pointer as usize;
        let end = start + size as usize;
        let bytes = &self.program_memory[start..end];
        let mut buf = [0u8; 8];
        buf[..bytes.len()].copy_from_slice(bytes);
        let value = i64::from_le_bytes(buf);
        self.instruction_pointer += size;

        if is_signed && size < 8 {
            let shift = 64 - size * 8;
            (value << shift) >> shift
        } else {
            value
        }
    }

    fn pop(&mut self) -> i32 {
        self.stack_memory.pop().expect("validate_pop checked this pop")
    }

    fn push(&mut self, value: i32) {
        self.stack_memory.push(value);
    }

    /// Execute one instruction, or crash if the fetch or any operand is
    /// invalid. A no-op once the execution flag has cleared.
    pub fn step(&mut self) {
        if !self.execution_flag || !self.validate_fetch(1) {
            return;
        }

        let byte = self.fetch_int(1, false) as u8;
        let Some(opcode) = Opcode::from_byte(byte) else {
            self.crash();
            return;
        };

        match opcode {
            Opcode::Halt => {
                if self.validate_pop(1) {
                    self.exit_code = self.pop();
                    self.execution_flag = false;
                }
            }
            Opcode::NoOperation => {}
            Opcode::Jump => {
                if self.validate_pop(1) {
                    self.instruction_pointer = self.pop() as u32;
                }
            }
            Opcode::JumpNotZero => {
                if self.validate_pop(2) {
                    let addr = self.pop();
                    if self.pop() != 0 {
                        self.instruction_pointer = addr as u32;
                    }
                }
            }
            Opcode::JumpZero => {
                if self.validate_pop(2) {
                    let addr = self.pop();
                    if self.pop() == 0 {
                        self.instruction_pointer = addr as u32;
                    }
                }
            }
            Opcode::Call => self.exec_call(),
            Opcode::Return => self.exec_return(),
            Opcode::Drop => {
                if self.validate_pop(1) {
                    self.pop();
                }
            }
            Opcode::Duplicate => {
                if self.validate_pop(1) {
                    let top = *self.stack_memory.last().unwrap();
                    self.push(top);
                }
            }
            Opcode::PushU8 => {
                if self.validate_fetch(1) {
                    let v = self.fetch_int(1, false);
                    self.push(v as i32);
                }
            }
            Opcode::PushS8 => {
                if self.validate_fetch(1) {
                    let v = self.fetch_int(1, true);
                    self.push(v as i32);
                }
            }
            Opcode::PushU16 => {
                if self.validate_fetch(2) {
                    let v = self.fetch_int(2, false);
                    self.push(v as i32);
                }
            }
            Opcode::PushS16 => {
                if self.validate_fetch(2) {
                    let v = self.fetch_int(2, true);
                    self.push(v as i32);
                }
            }
            Opcode::PushU32 => {
                if self.validate_fetch(4) {
                    let v = self.fetch_int(4, false);
                    self.push(v as i32);
                }
            }
            Opcode::PushS32 => {
                if self.validate_fetch(4) {
                    let v = self.fetch_int(4, true);
                    self.push(v as i32);
                }
            }
            Opcode::LoadLocal => self.exec_load_local(),
            Opcode::StoreLocal => self.exec_store_local(),
            Opcode::UnaryDereference => self.exec_unary_dereference(),
            Opcode::UnaryNegate => {
                if self.validate_pop(1) {
                    let v = self.pop();
                    self.push(-v);
                }
            }
            Opcode::UnaryNot => {
                if self.validate_pop(1) {
                    let v = self.pop();
                    self.push((v == 0) as i32);
                }
            }
            Opcode::BinaryAdd => self.exec_binary(|x, y| x.wrapping_add(y)),
            Opcode::BinarySubtract => self.exec_binary(|x, y| x.wrapping_sub(y)),
            Opcode::BinaryMultiply => self.exec_binary(|x, y| x.wrapping_mul(y)),
            Opcode::BinaryDivide => self.exec_binary_checked_div(|x, y| x.wrapping_div(y)),
            Opcode::BinaryModulo => self.exec_binary_checked_div(|x, y| x.wrapping_rem(y)),
            Opcode::BinaryEquals => self.exec_binary(|x, y| (x == y) as i32),
            Opcode::BinaryNotEquals => self.exec_binary(|x, y| (x != y) as i32),
            Opcode::BinaryGreater => self.exec_binary(|x, y| (x > y) as i32),
            Opcode::BinaryGreaterEquals => self.exec_binary(|x, y| (x >= y) as i32),
            Opcode::BinaryLess => self.exec_binary(|x, y| (x < y) as i32),
            Opcode::BinaryLessEquals => self.exec_binary(|x, y| (x <= y) as i32),
            Opcode::BinaryAnd => self.exec_binary(|x, y| (x != 0 && y != 0) as i32),
            Opcode::BinaryOr => self.exec_binary(|x, y| (x != 0 || y != 0) as i32),
            Opcode::PutChr => {
                if self.validate_pop(1) {
                    let byte = (*self.stack_memory.last().unwrap() & 0xFF) as u8;
                    if self.output.write_all(&[byte]).is_err() {
                        self.crash();
                    }
                }
            }
            Opcode::Print => {
                if self.validate_pop(1) {
                    let v = self.pop();
                    if writeln!(self.output, "{v}").is_err() {
                        self.crash();
                    }
                }
            }
        }
    }

    fn exec_binary(&mut self, f: impl FnOnce(i32, i32) -> i32) {
        if self.validate_pop(2) {
            let y = self.pop();
            let x = self.pop();
            self.push(f(x, y));
        }
    }

    fn exec_binary_checked_div(&mut self, f: impl FnOnce(i32, i32) -> i32) {
        if !self.validate_pop(2) {
            return;
        }
        let y = self.pop();
        if y == 0 {
            self.crash();
            return;
        }
        let x = self.pop();
        self.push(f(x, y));
    }

    fn exec_call(&mut self) {
        if !self.validate_pop(2) {
            return;
        }
        let paramc = self.pop();
        let target = self.pop();
        let Ok(paramc) = usize::try_from(paramc) else {
            self.crash();
            return;
        };
        if !self.validate_pop(paramc) {
            return;
        }

        let split = self.stack_memory.len() - paramc;
        let args: Vec<i32> = self.stack_memory.split_off(split);

        self.push(self.frame_pointer as i32);
        self.frame_pointer = (self.stack_memory.len() - 1) as u32;
        self.push(self.instruction_pointer as i32);
        self.instruction_pointer = target as u32;
        self.stack_memory.extend(args);
    }

    fn exec_return(&mut self) {
        if !self.validate_pop(1) {
            return;
        }
        let old_fp = self.frame_pointer as usize;
        if old_fp + 1 >= self.stack_memory.len() {
            self.crash();
            return;
        }
        self.instruction_pointer = self.stack_memory[old_fp + 1] as u32;
        self.frame_pointer = self.stack_memory[old_fp] as u32;
        let return_value = self.pop();
        self.stack_memory.truncate(old_fp);
        self.push(return_value);
    }

    fn exec_load_local(&mut self) {
        if !self.validate_pop(1) {
            return;
        }
        let offset = self.pop();
        match self.local_index(offset) {
            Some(index) => {
                let value = self.stack_memory[index];
                self.push(value);
            }
            None => self.crash(),
        }
    }

    fn exec_store_local(&mut self) {
        if !self.validate_pop(2) {
            return;
        }
        let offset = self.pop();
        let top = *self.stack_memory.last().unwrap();
        match self.local_index(offset) {
            Some(index) => self.stack_memory[index] = top,
            None => self.crash(),
        }
    }

    fn local_index(&self, offset: i32) -> Option<usize> {
        let index = self.frame_pointer as i64 + offset as i64;
        if index < 0 || index as usize >= self.stack_memory.len() {
            None
        } else {
            Some(index as usize)
        }
    }

    fn exec_unary_dereference(&mut self) {
        if !self.validate_pop(1) {
            return;
        }
        let address = self.pop();
        match usize::try_from(address).ok().and_then(|a| self.program_memory.get(a)) {
            Some(byte) => self.push(*byte as i32),
            None => self.crash(),
        }
    }
}
