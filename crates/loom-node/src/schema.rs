//! In-memory type system.
//!
//! The pipeline only needs three answers from a type system: whether one type
//! is assignable to another, what it knows about a member, and whether a
//! string is a valid name. [`TypeSystem`] captures exactly that; [`Schema`] is
//! a small implementation backed by explicit type and member declarations.

use std::collections::HashMap;

use tracing::trace;

use crate::{MemberId, SetOnce, TypeId, is_valid_identifier};

/// Questions the pipeline asks the type system.
pub trait TypeSystem: Send + Sync {
    /// Whether a value of type `from` can be used where `to` is expected.
    fn is_assignable(&self, from: &TypeId, to: &TypeId) -> bool;

    /// Declared information about `member`, if known.
    fn member_info(&self, member: &MemberId) -> Option<&MemberInfo>;

    /// Whether objects of type `ty` carry `member`.
    ///
    /// Directives are carried by every type.
    fn declares(&self, ty: &TypeId, member: &MemberId) -> bool {
        match member.declaring_type() {
            Some(declaring) => self.is_assignable(ty, declaring),
            None => true,
        }
    }

    /// Identifier predicate used when registering names.
    fn is_valid_name(&self, name: &str) -> bool {
        is_valid_identifier(name)
    }
}

/// Declared facts about a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub id: MemberId,
    /// Visible to ambient lookups from nested objects.
    pub ambient: bool,
    /// Content is captured and built later instead of immediately.
    pub deferred: bool,
    /// Text values name another object in scope.
    pub reference: bool,
}

impl MemberInfo {
    /// Plain member information: no flags set.
    pub fn new(id: MemberId) -> Self {
        Self {
            id,
            ambient: false,
            deferred: false,
            reference: false,
        }
    }

    /// Mark the member as ambient.
    pub fn ambient(mut self) -> Self {
        self.ambient = true;
        self
    }

    /// Mark the member as deferred.
    pub fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }

    /// Mark the member as a reference.
    pub fn reference(mut self) -> Self {
        self.reference = true;
        self
    }
}

/// A declared type.
#[derive(Debug)]
pub struct TypeInfo {
    id: TypeId,
    base: Option<TypeId>,
    members: Vec<MemberId>,
    /// Base chain, computed on first use.
    ancestry: SetOnce<Vec<TypeId>>,
}

impl TypeInfo {
    /// The type's identifier.
    pub fn id(&self) -> &TypeId {
        &self.id
    }

    /// The direct base type, if any.
    pub fn base(&self) -> Option<&TypeId> {
        self.base.as_ref()
    }

    /// Members declared directly on this type (not inherited ones).
    pub fn members(&self) -> &[MemberId] {
        &self.members
    }
}

/// Type system backed by explicit declarations.
#[derive(Debug, Default)]
pub struct Schema {
    types: HashMap<TypeId, TypeInfo>,
    members: HashMap<MemberId, MemberInfo>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `id`, optionally deriving from `base`.
    ///
    /// Redeclaring a type replaces its base but keeps its members.
    pub fn add_type(&mut self, id: TypeId, base: Option<TypeId>) -> &mut Self {
        match self.types.get_mut(&id) {
            Some(info) => info.base = base,
            None => {
                self.types.insert(
                    id.clone(),
                    TypeInfo {
                        id,
                        base,
                        members: Vec::new(),
                        ancestry: SetOnce::new(),
                    },
                );
            }
        }
        for info in self.types.values_mut() {
            info.ancestry.set(None);
        }
        self
    }

    /// Declare a member. Its declaring type is declared too if unknown.
    pub fn add_member(&mut self, info: MemberInfo) -> &mut Self {
        if let Some(declaring) = info.id.declaring_type().cloned() {
            if !self.types.contains_key(&declaring) {
                self.add_type(declaring.clone(), None);
            }
            if let Some(ty) = self.types.get_mut(&declaring)
                && !ty.members.contains(&info.id)
            {
                ty.members.push(info.id.clone());
            }
        }
        self.members.insert(info.id.clone(), info);
        self
    }

    /// Declaration of `id`, if declared.
    pub fn type_info(&self, id: &TypeId) -> Option<&TypeInfo> {
        self.types.get(id)
    }

    /// Base types of `ty`, nearest first. Empty for unknown types.
    pub fn ancestry(&self, ty: &TypeId) -> &[TypeId] {
        match self.types.get(ty) {
            Some(info) => info
                .ancestry
                .get_or_init(|| self.compute_ancestry(info))
                .as_slice(),
            None => &[],
        }
    }

    fn compute_ancestry(&self, info: &TypeInfo) -> Vec<TypeId> {
        let mut chain: Vec<TypeId> = Vec::new();
        let mut next = info.base.clone();
        while let Some(base) = next {
            // A cyclic declaration stops the walk instead of looping.
            if base == info.id || chain.contains(&base) {
                break;
            }
            next = self.types.get(&base).and_then(|t| t.base.clone());
            chain.push(base);
        }
        trace!(ty = %info.id, depth = chain.len(), "computed ancestry");
        chain
    }
}

impl TypeSystem for Schema {
    fn is_assignable(&self, from: &TypeId, to: &TypeId) -> bool {
        from == to || self.ancestry(from).contains(to)
    }

    fn member_info(&self, member: &MemberId) -> Option<&MemberInfo> {
        self.members.get(member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(name: &str) -> TypeId {
        TypeId::new(name)
    }

    fn ui_schema() -> Schema {
        let mut schema = Schema::new();
        schema
            .add_type(ty("Element"), None)
            .add_type(ty("Control"), Some(ty("Element")))
            .add_type(ty("Button"), Some(ty("Control")))
            .add_member(MemberInfo::new(MemberId::new(ty("Element"), "Resources")).ambient());
        schema
    }

    #[test]
    fn test_assignability_follows_base_chain() {
        let schema = ui_schema();
        assert!(schema.is_assignable(&ty("Button"), &ty("Button")));
        assert!(schema.is_assignable(&ty("Button"), &ty("Element")));
        assert!(!schema.is_assignable(&ty("Element"), &ty("Button")));
        assert!(!schema.is_assignable(&ty("Unknown"), &ty("Element")));
        assert!(schema.is_assignable(&ty("Unknown"), &ty("Unknown")));
    }

    #[test]
    fn test_inherited_member_is_declared() {
        let schema = ui_schema();
        let resources = MemberId::new(ty("Element"), "Resources");
        assert!(schema.declares(&ty("Button"), &resources));
        assert!(!schema.declares(&ty("Unknown"), &resources));
        assert!(schema.declares(&ty("Unknown"), &MemberId::name_directive()));
        assert!(schema.member_info(&resources).is_some_and(|m| m.ambient));
    }

    #[test]
    fn test_redeclaring_base_invalidates_cache() {
        let mut schema = ui_schema();
        assert_eq!(schema.ancestry(&ty("Button")).len(), 2);
        schema.add_type(ty("Button"), None);
        assert!(schema.ancestry(&ty("Button")).is_empty());
        assert!(!schema.is_assignable(&ty("Button"), &ty("Control")));
    }

    #[test]
    fn test_cyclic_declaration_terminates() {
        let mut schema = Schema::new();
        schema
            .add_type(ty("A"), Some(ty("B")))
            .add_type(ty("B"), Some(ty("A")));
        assert_eq!(schema.ancestry(&ty("A")), &[ty("B")]);
    }

    #[test]
    fn test_members_listed_on_declaring_type() {
        let schema = ui_schema();
        let element = schema.type_info(&ty("Element")).unwrap();
        assert_eq!(element.members().len(), 1);
        assert_eq!(element.members()[0].name(), "Resources");
    }
}
