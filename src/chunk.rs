//! This module deals with chunks of bytecodes.

use std::{fmt, io};

use crate::{OpCode, Position, Value};

/// Chunk is a sequence of instructions and data that will be written to by the compiler
/// and later run by the virtual-machine.
///
/// # Examples
///
/// ```
/// use rclox::{Chunk, OpCode, Position, Value};
///
/// let mut chunk = Chunk::default();
/// let const_id = chunk.add_const(Value::Number(1.0));
/// assert!(matches!(chunk.read_const(const_id as u8), &Value::Number(n) if n == 1.0));
///
/// chunk.write(OpCode::Constant(const_id as u8), Position::default());
/// assert!(matches!(
///     chunk.read_instruction(0),
///     (&OpCode::Constant(0), &Position { line: 1, column: 1 }),
/// ));
/// ```
#[derive(Default, Debug)]
pub struct Chunk {
    instructions: Vec<OpCode>,
    constants: Vec<Value>,
    positions: Vec<Position>,
}

impl Chunk {
    /// Add a new instruction to the chunk.
    pub fn write(&mut self, code: OpCode, pos: Position) {
        self.instructions.push(code);
        self.positions.push(pos);
    }

    /// Overwrite a previously written instruction, keeping its position. This
    /// is only used to back-patch the distance of forward jumps.
    pub fn replace(&mut self, idx: usize, code: OpCode) {
        self.instructions[idx] = code;
    }

    /// Read the instruction at the index.
    pub fn read_instruction(&self, idx: usize) -> (&OpCode, &Position) {
        (&self.instructions[idx], &self.positions[idx])
    }

    /// Number of instructions written so far.
    pub fn size(&self) -> usize {
        self.instructions.len()
    }

    /// Add a constant value to the chunk and return its position in the pool.
    /// Indices are never reused, callers must check that it fits their operand.
    pub fn add_const(&mut self, val: Value) -> usize {
        self.constants.push(val);
        self.constants.len() - 1
    }

    /// Read the constant at the given index
    pub fn read_const(&self, idx: u8) -> &Value {
        &self.constants[idx as usize]
    }

    /// All constants in the order they were added.
    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    /// A displayable view of the instruction at the given index.
    pub fn instruction(&self, idx: usize) -> Instruction<'_> {
        Instruction { chunk: self, idx }
    }

    /// Go through the instructions in the chunk and write them in human-readable format.
    pub fn disassemble<W: io::Write>(&self, name: &str, mut w: W) -> io::Result<()> {
        writeln!(w, "== {} ==", name)?;
        for idx in 0..self.instructions.len() {
            writeln!(w, "{}", self.instruction(idx))?;
        }
        Ok(())
    }
}

/// One disassembled instruction: its offset, source line, mnemonic, and operands.
#[derive(Debug, Clone, Copy)]
pub struct Instruction<'a> {
    chunk: &'a Chunk,
    idx: usize,
}

impl fmt::Display for Instruction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { chunk, idx } = *self;
        write!(f, "{:04} ", idx)?;
        if idx > 0 && chunk.positions[idx].line == chunk.positions[idx - 1].line {
            write!(f, "   | ")?;
        } else {
            write!(f, "{:4} ", chunk.positions[idx].line)?;
        }

        let code = chunk.instructions[idx];
        let name = code.name();
        match code {
            OpCode::Constant(c)
            | OpCode::GetGlobal(c)
            | OpCode::DefineGlobal(c)
            | OpCode::SetGlobal(c)
            | OpCode::Closure(c) => {
                write!(f, "{:<16} {:4} '{}'", name, c, chunk.read_const(c))
            }
            OpCode::GetLocal(slot) | OpCode::SetLocal(slot) | OpCode::Call(slot) => {
                write!(f, "{:<16} {:4}", name, slot)
            }
            OpCode::Jump(offset) | OpCode::JumpIfFalse(offset) => {
                write!(f, "{:<16} {:4} -> {}", name, offset, idx + 1 + offset as usize)
            }
            OpCode::Loop(offset) => {
                write!(f, "{:<16} {:4} -> {}", name, offset, idx + 1 - offset as usize)
            }
            _ => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn line(line: usize) -> Position {
        Position { line, column: 1 }
    }

    #[test]
    fn constants_keep_their_index() {
        let mut chunk = Chunk::default();
        assert_eq!(chunk.add_const(Value::Number(1.0)), 0);
        assert_eq!(chunk.add_const(Value::Bool(true)), 1);
        assert_eq!(chunk.add_const(Value::Nil), 2);
        assert!(matches!(chunk.read_const(1), Value::Bool(true)));
        assert_eq!(chunk.constants().len(), 3);
    }

    #[test]
    fn replace_patches_a_single_instruction() {
        let mut chunk = Chunk::default();
        chunk.write(OpCode::Nil, line(1));
        chunk.write(OpCode::JumpIfFalse(u16::MAX), line(1));
        chunk.write(OpCode::Pop, line(2));
        chunk.replace(1, OpCode::JumpIfFalse(1));
        assert_eq!(chunk.size(), 3);
        assert_eq!(
            chunk.read_instruction(1),
            (&OpCode::JumpIfFalse(1), &line(1))
        );
        assert_eq!(chunk.read_instruction(2).0, &OpCode::Pop);
    }

    #[test]
    fn disassemble_chunk() {
        let mut chunk = Chunk::default();
        let c = chunk.add_const(Value::Number(1.2)) as u8;
        chunk.write(OpCode::Constant(c), line(123));
        chunk.write(OpCode::Negate, line(123));
        chunk.write(OpCode::JumpIfFalse(1), line(124));
        chunk.write(OpCode::Print, line(124));
        chunk.write(OpCode::Loop(5), line(124));
        chunk.write(OpCode::Return, line(125));

        let mut out = Vec::new();
        chunk.disassemble("test chunk", &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "== test chunk ==\n\
             0000  123 OP_CONSTANT         0 '1.2'\n\
             0001    | OP_NEGATE\n\
             0002  124 OP_JUMP_IF_FALSE    1 -> 4\n\
             0003    | OP_PRINT\n\
             0004    | OP_LOOP             5 -> 0\n\
             0005  125 OP_RETURN\n"
        );
    }
}
