//! Deferred name resolution.

use loom_node::{LineInfo, MemberId, Object, Value};

/// Where a resolved fixup is written back.
#[derive(Debug, Clone)]
pub struct FixupTarget {
    /// Object owning the member.
    pub object: Object,
    pub member: MemberId,
    /// Position of the placeholder within the member (or within the items).
    pub slot: usize,
    /// Value that triggered the lookup, offered again on resolution when the
    /// token cannot be assigned directly.
    pub original: Value,
}

/// A pending lookup of names that were not registered when requested.
///
/// With `can_assign_directly`, the single resolved object is written to the
/// target as is. Otherwise the resolved names are handed back to the code
/// that requested the token so it can reinterpret the original value.
#[derive(Debug, Clone)]
pub struct FixupToken {
    pub(crate) id: u64,
    pub(crate) names: Vec<String>,
    pub(crate) can_assign_directly: bool,
    pub(crate) target: Option<FixupTarget>,
    pub(crate) line_info: Option<LineInfo>,
}

impl FixupToken {
    /// Identifier unique within the issuing resolver.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Names the token waits for.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Whether the resolved object is stored as is, without a converter.
    pub fn can_assign_directly(&self) -> bool {
        self.can_assign_directly
    }

    /// Where the resolution is written back.
    pub fn target(&self) -> Option<&FixupTarget> {
        self.target.as_ref()
    }

    /// Set where the resolution is written back.
    pub fn set_target(&mut self, target: FixupTarget) {
        self.target = Some(target);
    }

    /// Position of the reference in the source, when known.
    pub fn line_info(&self) -> Option<LineInfo> {
        self.line_info
    }

    /// Set the position reported if the names stay unresolved.
    pub fn set_line_info(&mut self, line_info: Option<LineInfo>) {
        self.line_info = line_info;
    }
}
