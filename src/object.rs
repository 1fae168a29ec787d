use std::{fmt, rc::Rc};

use crate::{intern, Chunk, StrId};

/// Heap allocated Lox objects. Every variant is a shared handle, copying an
/// `Object` never copies the underlying data.
#[derive(Debug, Clone)]
pub enum Object {
    /// An immutable string
    String(Rc<str>),
    /// A function object
    Fun(Rc<ObjFun>),
    /// A closure wrapping a function object
    Closure(Rc<ObjClosure>),
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Fun(fun) => write!(f, "{fun}"),
            Self::Closure(c) => write!(f, "{c}"),
        }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(s1), Self::String(s2)) => s1 == s2,
            (Self::Fun(f1), Self::Fun(f2)) => Rc::ptr_eq(f1, f2),
            (Self::Closure(c1), Self::Closure(c2)) => Rc::ptr_eq(c1, c2),
            _ => false,
        }
    }
}

/// A function that was compiled for the given arity. Lox closures don't
/// capture anything, so a closure is only a wrapper around its function.
#[derive(Debug)]
pub struct ObjClosure {
    /// The base function of this closure
    pub fun: Rc<ObjFun>,
}

impl ObjClosure {
    /// Create a new closure of the function
    pub fn new(fun: Rc<ObjFun>) -> Self {
        Self { fun }
    }
}

impl fmt::Display for ObjClosure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fun)
    }
}

/// A function object that holds the bytecode of the function along with other metadata
#[derive(Debug)]
pub struct ObjFun {
    /// The name of the function, empty for the top-level script
    pub name: StrId,
    /// Number of parameters the function has
    pub arity: u8,
    /// The bytecode chunk of this function
    pub chunk: Chunk,
}

impl ObjFun {
    /// Create a new function of the given name, with its arity set to 0 and its chunk set to the
    /// default value
    pub fn new(name: StrId) -> Self {
        Self {
            name,
            arity: 0,
            chunk: Chunk::default(),
        }
    }

    /// Create the implicit function that wraps top-level code.
    pub fn script() -> Self {
        Self::new(intern::id(""))
    }

    /// Return true if this is the implicit top-level function
    pub fn is_script(&self) -> bool {
        intern::with_str(self.name, str::is_empty)
    }
}

impl fmt::Display for ObjFun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        intern::with_str(self.name, |name| {
            if name.is_empty() {
                write!(f, "<script>")
            } else {
                write!(f, "<fn {name}>")
            }
        })
    }
}
