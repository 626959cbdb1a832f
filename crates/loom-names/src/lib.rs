#![doc = include_str!("../README.md")]

mod error;
pub use error::{NameError, NameErrorKind};

mod fixup;
pub use fixup::{FixupTarget, FixupToken};

mod resolver;
pub use resolver::{Completion, NameResolver, ResolvedFixup, ScopeResolver};

mod scope;
pub use scope::{NameScope, NameStore, SharedStore};
