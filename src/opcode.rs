/// OpCode is a single instruction record. Operands are stored inline with the
/// opcode instead of as separate bytes in the stream, so an offset into a
/// chunk always lands on an instruction boundary.
///
/// # Notes
///
/// We don't have a `OpCode::NotEqual` because we will transform `a != b` to `!(a == b)` to demonstrated
/// that bytecode can deviate from the actual user's code as long as they behave similarly. This is
/// also applied for operator `<=` and operator `>=`.
///
/// `a <= b` does not equals equivalent to `!(a > b)`, similarly with greater and greater or equal.
/// According to [IEEE 754] all comparison operators return `false` when an operand is `NaN`. These
/// are implementation details that we should keep in mind when making a real language.
///
/// [IEEE 754]: https://en.wikipedia.org/wiki/IEEE_754
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    /// Load a constant
    Constant(u8),
    /// Load a `nil` value
    Nil,
    /// Load a `true` value
    True,
    /// Load a `false` value
    False,
    /// Pop the top of the stack
    Pop,
    /// Push a copy of the local variable at the given frame slot
    GetLocal(u8),
    /// Overwrite the local variable at the given frame slot with the top of the stack
    SetLocal(u8),
    /// Push the value of the global whose name is the given constant
    GetGlobal(u8),
    /// Pop the top of the stack and define a variable initialized with that value.
    DefineGlobal(u8),
    /// Assign the top of the stack to an existing global
    SetGlobal(u8),
    /// Check for equality between 2 operands.
    Equal,
    /// Compare if the first operand is greater than the second
    Greater,
    /// Compare if the first operand is less than the second
    Less,
    /// Add two number operands or two string operands
    Add,
    /// Subtract two number operands
    Subtract,
    /// Multiply two number operands
    Multiply,
    /// Divide two number operands
    Divide,
    /// Apply logical `not` to a single operand
    Not,
    /// Negate a single number operand
    Negate,
    /// Print an expression in human readable format
    Print,
    /// Jump forward unconditionally
    Jump(u16),
    /// Jump forward if the top of the stack is falsey, leaving it on the stack
    JumpIfFalse(u16),
    /// Jump backward unconditionally
    Loop(u16),
    /// Call the value sitting below the given number of arguments
    Call(u8),
    /// Wrap the function stored in the given constant into a closure
    Closure(u8),
    /// Return from the current function
    Return,
}

impl OpCode {
    /// The mnemonic used when disassembling this instruction.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Constant(_) => "OP_CONSTANT",
            Self::Nil => "OP_NIL",
            Self::True => "OP_TRUE",
            Self::False => "OP_FALSE",
            Self::Pop => "OP_POP",
            Self::GetLocal(_) => "OP_GET_LOCAL",
            Self::SetLocal(_) => "OP_SET_LOCAL",
            Self::GetGlobal(_) => "OP_GET_GLOBAL",
            Self::DefineGlobal(_) => "OP_DEFINE_GLOBAL",
            Self::SetGlobal(_) => "OP_SET_GLOBAL",
            Self::Equal => "OP_EQUAL",
            Self::Greater => "OP_GREATER",
            Self::Less => "OP_LESS",
            Self::Add => "OP_ADD",
            Self::Subtract => "OP_SUBTRACT",
            Self::Multiply => "OP_MULTIPLY",
            Self::Divide => "OP_DIVIDE",
            Self::Not => "OP_NOT",
            Self::Negate => "OP_NEGATE",
            Self::Print => "OP_PRINT",
            Self::Jump(_) => "OP_JUMP",
            Self::JumpIfFalse(_) => "OP_JUMP_IF_FALSE",
            Self::Loop(_) => "OP_LOOP",
            Self::Call(_) => "OP_CALL",
            Self::Closure(_) => "OP_CLOSURE",
            Self::Return => "OP_RETURN",
        }
    }
}
