//! Opaque identifiers for types and members.
//!
//! The pipeline never looks inside these: they are produced by the type
//! system and only compared, hashed and displayed here.

use std::fmt;
use std::sync::Arc;

/// Identifier of a type known to the type system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(Arc<str>);

impl TypeId {
    /// Create a type identifier from its qualified name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The qualified name this identifier was created from.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// The `x:Reference` type: an object written as the name of another
    /// object in scope, through its `Name` directive.
    pub fn reference() -> Self {
        TypeId::new(REFERENCE_TYPE)
    }

    /// Whether this is the `x:Reference` type.
    pub fn is_reference(&self) -> bool {
        &*self.0 == REFERENCE_TYPE
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeId {
    fn from(name: &str) -> Self {
        TypeId::new(name)
    }
}

/// Identifier of a member.
///
/// A member is either a property declared on a type, or a directive: a
/// language-level member with no declaring type (`Name`, `Items`) that every
/// object accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberId {
    declaring: Option<TypeId>,
    name: Arc<str>,
}

const REFERENCE_TYPE: &str = "x:Reference";
const NAME_DIRECTIVE: &str = "Name";
const ITEMS_DIRECTIVE: &str = "Items";

impl MemberId {
    /// Create a property identifier declared on `declaring`.
    pub fn new(declaring: TypeId, name: impl AsRef<str>) -> Self {
        Self {
            declaring: Some(declaring),
            name: Arc::from(name.as_ref()),
        }
    }

    /// Create a directive identifier.
    pub fn directive(name: impl AsRef<str>) -> Self {
        Self {
            declaring: None,
            name: Arc::from(name.as_ref()),
        }
    }

    /// The `Name` directive: registers the enclosing object in the current
    /// name scope under the written value.
    pub fn name_directive() -> Self {
        Self::directive(NAME_DIRECTIVE)
    }

    /// The `Items` directive: collection content of the enclosing object.
    pub fn items_directive() -> Self {
        Self::directive(ITEMS_DIRECTIVE)
    }

    /// The declaring type. `None` for directives.
    pub fn declaring_type(&self) -> Option<&TypeId> {
        self.declaring.as_ref()
    }

    /// The member name without its declaring type.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is a directive rather than a declared member.
    pub fn is_directive(&self) -> bool {
        self.declaring.is_none()
    }

    /// Whether this is the `Name` directive.
    pub fn is_name_directive(&self) -> bool {
        self.is_directive() && &*self.name == NAME_DIRECTIVE
    }

    /// Whether this is the `x:Items` directive.
    pub fn is_items_directive(&self) -> bool {
        self.is_directive() && &*self.name == ITEMS_DIRECTIVE
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.declaring {
            Some(ty) => write!(f, "{}.{}", ty, self.name),
            None => write!(f, "x:{}", self.name),
        }
    }
}
