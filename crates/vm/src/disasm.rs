//! Opt-in bytecode disassembler.
//!
//! Mirrors the reference implementation's `debug.c`: given a chunk, print
//! one line per instruction with its offset, source line (or `|` when
//! unchanged from the previous instruction), mnemonic, and any operands.
//! This is a diagnostic aid wired in behind `ASH_TRACE`, not part of the
//! language's own output contract -- its exact formatting is not tested
//! byte-for-byte, only "doesn't panic and names the right opcode". Like the
//! reference `debug.c`, it prints straight to standard output: disassembly
//! sits alongside `print` output, not behind the stderr-bound `tracing`
//! subscriber, so piping a traced run's stdout still gets you the program's
//! own output interleaved with the instructions that produced it.

use ash_core::{Chunk, OpCode, Value};

/// Print the current stack, bottom to top, the way the reference VM's trace
/// mode does it -- one call per step, right before that step's instruction.
pub fn print_stack(stack: &[Value]) {
    print!("          ");
    for value in stack {
        print!("[ {value} ]");
    }
    println!();
}

/// Disassemble every instruction in `chunk` to stdout under a `== name ==`
/// header.
pub fn disassemble_chunk(chunk: &Chunk, name: &str) {
    println!("== {name} ==");
    let mut offset = 0;
    while offset < chunk.len() {
        offset = disassemble_instruction(chunk, offset);
    }
}

/// Disassemble the single instruction at `offset` to stdout, returning the
/// offset of the next one.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize) -> usize {
    let line = chunk.get_line(offset);
    let line_marker = if offset > 0 && chunk.get_line(offset - 1) == line {
        "   |".to_string()
    } else {
        format!("{line:4}")
    };

    let byte = chunk.read_byte(offset);
    let Some(op) = OpCode::from_byte(byte) else {
        println!("{offset:04} {line_marker} Unknown opcode {byte}");
        return offset + 1;
    };

    match op {
        OpCode::Constant => constant_instruction(chunk, &line_marker, op, offset),
        OpCode::ConstantLong => constant_long_instruction(chunk, &line_marker, op, offset),
        OpCode::DefineGlobal | OpCode::GetGlobal | OpCode::SetGlobal => {
            constant_instruction(chunk, &line_marker, op, offset)
        }
        _ => {
            println!("{offset:04} {line_marker} {}", op.mnemonic());
            offset + 1
        }
    }
}

fn constant_instruction(chunk: &Chunk, line_marker: &str, op: OpCode, offset: usize) -> usize {
    let index = chunk.read_byte(offset + 1) as usize;
    println!(
        "{offset:04} {line_marker} {:<18} {index:4} '{}'",
        op.mnemonic(),
        chunk.constants()[index],
    );
    offset + 2
}

fn constant_long_instruction(chunk: &Chunk, line_marker: &str, op: OpCode, offset: usize) -> usize {
    let bytes = [
        chunk.read_byte(offset + 1),
        chunk.read_byte(offset + 2),
        chunk.read_byte(offset + 3),
        0,
    ];
    let index = u32::from_le_bytes(bytes) as usize;
    println!(
        "{offset:04} {line_marker} {:<18} {index:4} '{}'",
        op.mnemonic(),
        chunk.constants()[index],
    );
    offset + 4
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash_core::Value;

    #[test]
    fn walks_every_instruction_without_panicking() {
        let mut chunk = Chunk::new();
        chunk.write_constant(Value::Number(1.0), 1);
        chunk.write_op(OpCode::Negate, 1);
        chunk.write_op(OpCode::Return, 2);

        let mut offset = 0;
        let mut steps = 0;
        while offset < chunk.len() {
            offset = disassemble_instruction(&chunk, offset);
            steps += 1;
        }
        assert_eq!(steps, 3);
    }
}
