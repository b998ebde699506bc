//! Chunk: a unit of compiled bytecode.
//!
//! A `Chunk` owns three growable buffers filled in lockstep by the compiler:
//! the instruction stream (`code`), the constant pool (`constants`), and a
//! run-length-encoded line table used only for diagnostics. `Chunk` growth
//! is whatever `Vec` already gives us (amortized doubling); the run-length
//! line table is the one structure this module hand-rolls, since it has no
//! `std` equivalent.

use crate::value::Value;

/// One run in the line table: `line` repeats for `run` consecutive bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineRun {
    line: u32,
    run: u32,
}

/// Bytecode opcodes. Numeric values are stable within a single compile/run
/// pair (the spec does not promise cross-version stability, and nothing here
/// persists a chunk to disk).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Constant = 0,
    ConstantLong = 1,
    Negate = 2,
    Add = 3,
    Subtract = 4,
    Multiply = 5,
    Divide = 6,
    Return = 7,
    Nil = 8,
    True = 9,
    False = 10,
    Print = 11,
    Not = 12,
    Equal = 13,
    Greater = 14,
    Less = 15,
    Pop = 16,
    DefineGlobal = 17,
    GetGlobal = 18,
    SetGlobal = 19,
}

impl OpCode {
    /// Decode a raw byte into an opcode. Any value the compiler could not
    /// have produced is a fatal, not a recoverable, condition -- a malformed
    /// chunk means the compiler itself is broken.
    pub fn from_byte(byte: u8) -> Option<OpCode> {
        use OpCode::*;
        Some(match byte {
            0 => Constant,
            1 => ConstantLong,
            2 => Negate,
            3 => Add,
            4 => Subtract,
            5 => Multiply,
            6 => Divide,
            7 => Return,
            8 => Nil,
            9 => True,
            10 => False,
            11 => Print,
            12 => Not,
            13 => Equal,
            14 => Greater,
            15 => Less,
            16 => Pop,
            17 => DefineGlobal,
            18 => GetGlobal,
            19 => SetGlobal,
            _ => return None,
        })
    }

    pub fn mnemonic(self) -> &'static str {
        use OpCode::*;
        match self {
            Constant => "OP_CONSTANT",
            ConstantLong => "OP_CONSTANT_LONG",
            Negate => "OP_NEGATE",
            Add => "OP_ADD",
            Subtract => "OP_SUBTRACT",
            Multiply => "OP_MULTIPLY",
            Divide => "OP_DIVIDE",
            Return => "OP_RETURN",
            Nil => "OP_NIL",
            True => "OP_TRUE",
            False => "OP_FALSE",
            Print => "OP_PRINT",
            Not => "OP_NOT",
            Equal => "OP_EQUAL",
            Greater => "OP_GREATER",
            Less => "OP_LESS",
            Pop => "OP_POP",
            DefineGlobal => "OP_DEFINE_GLOBAL",
            GetGlobal => "OP_GET_GLOBAL",
            SetGlobal => "OP_SET_GLOBAL",
        }
    }
}

/// Threshold below which a constant-pool index is encoded with the
/// one-byte `Constant` opcode instead of the three-byte `ConstantLong`.
const SHORT_CONSTANT_LIMIT: usize = 256;

#[derive(Default)]
pub struct Chunk {
    code: Vec<u8>,
    constants: Vec<Value>,
    lines: Vec<LineRun>,
}

impl Chunk {
    pub fn new() -> Self {
        Chunk {
            code: Vec::new(),
            constants: Vec::new(),
            lines: Vec::new(),
        }
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    pub fn read_byte(&self, offset: usize) -> u8 {
        self.code[offset]
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Append one byte emitted from source line `line`.
    pub fn write(&mut self, byte: u8, line: u32) {
        let capacity_before = self.code.capacity();
        self.code.push(byte);
        if self.code.capacity() != capacity_before {
            tracing::trace!(target: "ash_core::chunk", new_capacity = self.code.capacity(), "code buffer grew");
        }
        match self.lines.last_mut() {
            Some(last) if last.line == line => last.run += 1,
            _ => self.lines.push(LineRun { line, run: 1 }),
        }
    }

    pub fn write_op(&mut self, op: OpCode, line: u32) {
        self.write(op as u8, line);
    }

    /// Append `value` to the constant pool and return its index.
    pub fn add_constant(&mut self, value: Value) -> usize {
        let capacity_before = self.constants.capacity();
        self.constants.push(value);
        if self.constants.capacity() != capacity_before {
            tracing::trace!(target: "ash_core::chunk", new_capacity = self.constants.capacity(), "constant pool grew");
        }
        self.constants.len() - 1
    }

    /// Add `value` to the constant pool and emit the opcode + operand
    /// (`Constant` for indices `< 256`, `ConstantLong` otherwise) needed to
    /// push it back at runtime.
    pub fn write_constant(&mut self, value: Value, line: u32) {
        let index = self.add_constant(value);
        if index < SHORT_CONSTANT_LIMIT {
            self.write_op(OpCode::Constant, line);
            self.write(index as u8, line);
        } else {
            self.write_op(OpCode::ConstantLong, line);
            let bytes = (index as u32).to_le_bytes();
            self.write(bytes[0], line);
            self.write(bytes[1], line);
            self.write(bytes[2], line);
        }
    }

    /// Source line for the byte at `offset`. Panics if `offset` is outside
    /// `[0, code.len())`, per the invariant in SPEC_FULL.md §4.2.
    pub fn get_line(&self, offset: usize) -> u32 {
        assert!(
            offset < self.code.len(),
            "get_line offset {offset} out of bounds for chunk of length {}",
            self.code.len()
        );
        let mut cumulative = 0usize;
        for run in &self.lines {
            cumulative += run.run as usize;
            if offset < cumulative {
                return run.line;
            }
        }
        unreachable!("line table invariant violated: runs do not cover offset {offset}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_table_sums_to_code_length() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Nil, 1);
        chunk.write_op(OpCode::Nil, 1);
        chunk.write_op(OpCode::Pop, 2);
        chunk.write_op(OpCode::Return, 3);

        let total_run: u32 = chunk.lines.iter().map(|r| r.run).sum();
        assert_eq!(total_run as usize, chunk.len());
        assert_eq!(chunk.len(), 4);
    }

    #[test]
    fn get_line_is_monotonically_non_decreasing() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Nil, 1);
        chunk.write_op(OpCode::Nil, 1);
        chunk.write_op(OpCode::Pop, 2);
        chunk.write_op(OpCode::Return, 5);

        let lines: Vec<u32> = (0..chunk.len()).map(|i| chunk.get_line(i)).collect();
        assert_eq!(lines, vec![1, 1, 2, 5]);
        for window in lines.windows(2) {
            assert!(window[0] <= window[1]);
        }
    }

    #[test]
    fn short_vs_long_constant_encoding() {
        let mut chunk = Chunk::new();
        chunk.write_constant(Value::Number(1.0), 1);
        assert_eq!(chunk.code()[0], OpCode::Constant as u8);
        assert_eq!(chunk.code().len(), 2);

        let mut chunk = Chunk::new();
        for i in 0..300 {
            chunk.add_constant(Value::Number(i as f64));
        }
        // The pool already has 300 entries; the next write must go long.
        chunk.write_constant(Value::Number(999.0), 1);
        let op_offset = chunk.code().len() - 4;
        assert_eq!(chunk.code()[op_offset], OpCode::ConstantLong as u8);
        let idx = u32::from_le_bytes([
            chunk.code()[op_offset + 1],
            chunk.code()[op_offset + 2],
            chunk.code()[op_offset + 3],
            0,
        ]);
        assert_eq!(idx as usize, 300);
        assert_eq!(chunk.constants()[300], Value::Number(999.0));
    }

    #[test]
    fn constant_pool_round_trip() {
        let mut chunk = Chunk::new();
        let values = [Value::Nil, Value::Bool(true), Value::Number(3.5)];
        for v in &values {
            chunk.write_constant(v.clone(), 1);
        }
        for (i, v) in values.iter().enumerate() {
            assert_eq!(&chunk.constants()[i], v);
        }
    }
}
