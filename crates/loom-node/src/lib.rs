#![doc = include_str!("../README.md")]

mod cleanup;
pub use cleanup::{CleanupHandle, CleanupQueue};

mod id;
pub use id::{MemberId, TypeId};

mod identifier;
pub use identifier::is_valid_identifier;

mod node;
pub use node::{LineInfo, NamespaceDeclaration, Node, NodeKind};

mod schema;
pub use schema::{MemberInfo, Schema, TypeInfo, TypeSystem};

mod set_once;
pub use set_once::SetOnce;

mod value;
pub use value::{Object, ObjectKey, Value, WeakObject};
