//! Name registration and resolution errors.

use std::fmt;

/// A failed name operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameError {
    pub kind: NameErrorKind,
}

impl NameError {
    /// Create a new name error.
    pub fn new(kind: NameErrorKind) -> Self {
        Self { kind }
    }
}

impl From<NameErrorKind> for NameError {
    fn from(kind: NameErrorKind) -> Self {
        NameError::new(kind)
    }
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for NameError {}

/// Kind of name error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameErrorKind {
    /// Empty, or not an identifier.
    InvalidName(String),
    /// The name is bound to a different object.
    DuplicateName(String),
    /// The name is not registered in this scope.
    UnknownName(String),
    /// Fixup tokens can no longer be issued.
    FixupTokenUnavailable,
}

impl fmt::Display for NameErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameErrorKind::InvalidName(name) => write!(f, "'{}' is not a valid name", name),
            NameErrorKind::DuplicateName(name) => {
                write!(f, "name '{}' is already registered to another object", name)
            }
            NameErrorKind::UnknownName(name) => write!(f, "name '{}' is not registered", name),
            NameErrorKind::FixupTokenUnavailable => {
                write!(f, "fixup tokens are not available once names are complete")
            }
        }
    }
}
