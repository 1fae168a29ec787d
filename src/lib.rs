//! A single-pass compiler and bytecode virtual machine for the Lox
//! programming language.

#![warn(missing_debug_implementations)]
#![deny(missing_docs)]

mod chunk;
mod compile;
mod error;
pub mod intern;
mod object;
mod opcode;
mod scan;
mod token;
mod value;
mod vm;

pub use chunk::*;
pub use compile::*;
pub use error::*;
pub use intern::StrId;
pub use object::*;
pub use opcode::*;
pub use scan::*;
pub use token::*;
pub use value::*;
pub use vm::*;
