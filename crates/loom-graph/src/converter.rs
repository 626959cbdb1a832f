//! Value conversion hooks.

use loom_names::{FixupToken, NameResolver};
use loom_node::{LineInfo, MemberId, Object, Value};

use crate::AmbientProvider;

/// Result of a conversion.
#[derive(Debug)]
pub enum Converted {
    Value(Value),
    /// The value names objects that are not registered yet. The member gets
    /// a placeholder, and the converter is called again with the original
    /// value once names are complete (or the single resolved object is
    /// assigned directly, if the token allows it).
    Deferred(FixupToken),
}

/// What a converter can see while converting.
pub struct ConversionContext<'a> {
    member: &'a MemberId,
    target: &'a Object,
    resolver: &'a dyn NameResolver,
    ambient: AmbientProvider<'a>,
    line_info: Option<LineInfo>,
}

impl<'a> ConversionContext<'a> {
    pub(crate) fn new(
        member: &'a MemberId,
        target: &'a Object,
        resolver: &'a dyn NameResolver,
        ambient: AmbientProvider<'a>,
        line_info: Option<LineInfo>,
    ) -> Self {
        Self {
            member,
            target,
            resolver,
            ambient,
            line_info,
        }
    }

    /// The member being assigned.
    pub fn member(&self) -> &MemberId {
        self.member
    }

    /// The object owning the member.
    pub fn target(&self) -> &Object {
        self.target
    }

    /// Name lookups for the document being built.
    pub fn resolver(&self) -> &dyn NameResolver {
        self.resolver
    }

    /// Ambient lookups from the object being converted.
    pub fn ambient(&self) -> &AmbientProvider<'a> {
        &self.ambient
    }

    /// Position of the value being converted.
    pub fn line_info(&self) -> Option<LineInfo> {
        self.line_info
    }
}

/// Turns a written value into the value stored on the object.
pub trait ValueConverter {
    fn convert(&self, value: &Value, cx: &ConversionContext<'_>) -> Result<Converted, String>;
}

impl<F> ValueConverter for F
where
    F: Fn(&Value, &ConversionContext<'_>) -> Result<Converted, String>,
{
    fn convert(&self, value: &Value, cx: &ConversionContext<'_>) -> Result<Converted, String> {
        self(value, cx)
    }
}
