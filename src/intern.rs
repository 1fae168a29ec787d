//! Thread-local string interning for function names and global variable keys.
//!
//! ```
//! use rclox::intern;
//!
//! let id = intern::id("answer");
//! assert_eq!(id, intern::id(String::from("answer")));
//! assert_eq!(intern::str(id), "answer");
//! ```

use std::cell::RefCell;

use string_interner::{symbol::SymbolU32, DefaultBackend, DefaultHashBuilder};

/// Default string interner
pub type StringInterner<B = DefaultBackend<StrId>, H = DefaultHashBuilder> =
    string_interner::StringInterner<StrId, B, H>;

/// Interned string id
pub type StrId = SymbolU32;

// Names of globals and functions live for the whole thread, the same way
// their ids are baked into compiled chunks.
thread_local! {
    static INTERN: RefCell<StringInterner> = RefCell::new(StringInterner::with_capacity(256));
}

/// Intern a string if it has not been allocated by the global interner,
/// otherwise, returning the existing id for that string.
pub fn id<S: AsRef<str>>(s: S) -> StrId {
    INTERN.with(|intern| intern.borrow_mut().get_or_intern(s))
}

/// Run a closure on the interned string without copying it out.
pub fn with_str<R>(id: StrId, f: impl FnOnce(&str) -> R) -> R {
    INTERN.with(|intern| {
        let intern = intern.borrow();
        f(intern.resolve(id).unwrap_or_default())
    })
}

/// Get an owned copy of the interned string using its id.
pub fn str(id: StrId) -> String {
    with_str(id, |s| s.to_string())
}
