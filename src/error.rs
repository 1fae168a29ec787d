use std::{fmt, io};

use itertools::Itertools;
use thiserror::Error;

use crate::Position;

/// Error while scanning Lox source code. The message is self-describing, it
/// never names the offending lexeme as a location.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// A string literal is unterminated
    #[error("Unterminated string.")]
    UnterminatedString(Position),
    /// Invalid character
    #[error("Unexpected character '{1}'.")]
    UnexpectedCharacter(Position, char),
}

impl ScanError {
    /// Where in source the error was found.
    pub fn pos(&self) -> Position {
        match self {
            Self::UnterminatedString(pos) | Self::UnexpectedCharacter(pos, _) => *pos,
        }
    }
}

/// Where a compile error points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// The error was found at the end of the source
    End,
    /// The error was found at the given lexeme
    Lexeme(String),
    /// The message describes the location itself
    Unknown,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::End => write!(f, " at end"),
            Self::Lexeme(lexeme) => write!(f, " at '{}'", lexeme),
            Self::Unknown => Ok(()),
        }
    }
}

/// Error while parsing Lox tokens
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{} Error{}: {}", .pos, .location, .kind)]
pub struct ParseError {
    /// Position of the token the error was reported at
    pub pos: Position,
    /// How the error location is described
    pub location: Location,
    /// What went wrong
    pub kind: ParseErrorKind,
}

/// The kinds of errors the compiler can report
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// Range to jump over exceeds u16
    #[error("Too much code to jump over.")]
    JumpTooLarge,
    /// Loop body exceeds u16::MAX instructions
    #[error("Loop body too large.")]
    LoopTooLarge,
    /// Can not use variable name in its initializer
    #[error("Local variable used before being initialized.")]
    SelfReferencingInitializer,
    /// Local variables of enclosing functions are not captured
    #[error("Can't capture local variable from an enclosing function.")]
    CapturedLocal,
    /// A named can only be declared as variable once in local scope
    #[error("Already a variable with this name in this scope.")]
    VariableRedeclaration,
    /// The number of local variables can not exceed the range of a slot operand
    #[error("Too many local variables in function.")]
    TooManyLocalVariables,
    /// The number of constants can not exceed the range of a constant operand
    #[error("Too many constants in one chunk.")]
    TooManyConstants,
    /// Functions take at most 255 parameters
    #[error("Can't have more than 255 parameters.")]
    TooManyParameters,
    /// Calls pass at most 255 arguments
    #[error("Can't have more than 255 arguments.")]
    TooManyArguments,
    /// Can not assign a value to the LHS
    #[error("Invalid assignment target.")]
    InvalidAssignTarget,
    /// `return` outside of a function body
    #[error("Can't return from top-level code.")]
    TopLevelReturn,
    /// Current token is not supposed to be there
    #[error("{0}")]
    UnexpectedToken(&'static str),
    /// The scanner could not produce a token
    #[error("{0}")]
    Scan(ScanError),
}

/// Virtual machine errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// Push on a full stack or call too deep
    #[error("Stack overflow.")]
    StackOverflow,
    /// Wrong arguments given to binary add operators that only accept two numbers
    /// or two strings
    #[error("Operands for '+' must be either numbers or strings.")]
    InvalidAddOperands,
    /// Wrong arguments given to binary operators that only accept numbers
    #[error("Operands must be numbers.")]
    ExpectedNumbers,
    /// Wrong arguments given to unary operators that only accept a numbers
    #[error("Operand must be a number.")]
    ExpectedNumber,
    /// Accessing an undefined variable
    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(String),
    /// Calling a function with the wrong number of arguments
    #[error("Expected {arity} arguments but got {argc}.")]
    ArityMismatch {
        /// Number of parameters the function declares
        arity: u8,
        /// Number of arguments that were passed
        argc: u8,
    },
    /// Calling something that is not a function
    #[error("Can only call functions.")]
    NotCallable,
    /// Printed values could not be written out
    #[error("Failed to write output: {0}.")]
    Output(io::ErrorKind),
}

/// One line of a runtime stack trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    /// Line of the instruction that was executing in this frame
    pub line: usize,
    /// Name of the function, `None` for top-level code
    pub function: Option<String>,
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.function {
            Some(name) => write!(f, "[line {}] in {}()", self.line, name),
            None => write!(f, "[line {}] in script", self.line),
        }
    }
}

/// Lox virtual machine errors
#[derive(Debug, Error)]
pub enum Error {
    /// One or more compilation errors happened, nothing was executed
    #[error("{}", .0.iter().join("\n"))]
    Compile(Vec<ParseError>),
    /// A runtime error stopped the execution
    #[error("{error}\n{}", .trace.iter().join("\n"))]
    Runtime {
        /// The error itself
        error: RuntimeError,
        /// Active call frames when the error happened, innermost first
        trace: Vec<TraceFrame>,
    },
}

impl Error {
    /// Process exit code conventionally used for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Compile(_) => 65,
            Self::Runtime { .. } => 70,
        }
    }
}

/// The three outcomes of interpreting a unit of source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretResult {
    /// Compiled and ran to completion
    Ok,
    /// Failed to compile, nothing was executed
    CompileError,
    /// Failed while executing
    RuntimeError,
}

impl From<&Result<(), Error>> for InterpretResult {
    fn from(res: &Result<(), Error>) -> Self {
        match res {
            Ok(()) => Self::Ok,
            Err(Error::Compile(_)) => Self::CompileError,
            Err(Error::Runtime { .. }) => Self::RuntimeError,
        }
    }
}
