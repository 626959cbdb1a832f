//! Ambient lookups: values and objects found by climbing the open objects.

use std::collections::HashSet;

use loom_node::{MemberId, ObjectKey, TypeId, TypeSystem, Value};

use crate::{Frame, Instance};

/// A match found by an ambient lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct AmbientValue {
    /// The matching member, or `None` when the object itself matched one of
    /// the requested types.
    pub member: Option<MemberId>,
    /// The member's value, or the matching object.
    pub value: Value,
}

/// Walks the open objects from the innermost outwards.
///
/// The walk stops at the first object whose type is assignable to one of the
/// ceiling types; that object is not inspected. At each object the requested
/// types are checked first, then the requested members in the order given.
/// Only members the type system flags as ambient are considered, and only
/// when they hold a value. A member that is still being built (its value is
/// the object directly inside) reports that inner object.
///
/// Unless a lookup is restricted to the live stack, the frames saved with
/// deferred content are visited after the live ones, so content loaded later
/// sees the objects that enclosed it when it was captured.
pub struct AmbientProvider<'a> {
    schema: &'a dyn TypeSystem,
    live: &'a [Frame],
    saved: &'a [Frame],
}

impl<'a> AmbientProvider<'a> {
    /// Create a provider over the live frames and the saved ones.
    pub fn new(schema: &'a dyn TypeSystem, live: &'a [Frame], saved: &'a [Frame]) -> Self {
        Self {
            schema,
            live,
            saved,
        }
    }

    /// The nearest value of any of `properties`.
    pub fn first_ambient_value(
        &self,
        ceiling: &[TypeId],
        properties: &[MemberId],
    ) -> Option<AmbientValue> {
        self.all_ambient_values(ceiling, properties).next()
    }

    /// Every value of `properties`, innermost first.
    pub fn all_ambient_values<'s>(
        &'s self,
        ceiling: &'s [TypeId],
        properties: &'s [MemberId],
    ) -> impl Iterator<Item = AmbientValue> + 's {
        self.walk(ceiling, false, &[], properties)
    }

    /// The nearest object whose type is assignable to one of `types`.
    pub fn first_ambient_type(&self, ceiling: &[TypeId], types: &[TypeId]) -> Option<Value> {
        self.all_ambient_types(ceiling, types).next()
    }

    /// Every object whose type is assignable to one of `types`, innermost
    /// first.
    pub fn all_ambient_types<'s>(
        &'s self,
        ceiling: &'s [TypeId],
        types: &'s [TypeId],
    ) -> impl Iterator<Item = Value> + 's {
        self.walk(ceiling, false, types, &[]).map(|found| found.value)
    }

    /// Combined lookup over types and members.
    pub fn first_ambient_value_with(
        &self,
        ceiling: &[TypeId],
        search_live_stack_only: bool,
        types: &[TypeId],
        properties: &[MemberId],
    ) -> Option<AmbientValue> {
        self.walk(ceiling, search_live_stack_only, types, properties).next()
    }

    /// Every match of the combined lookup, innermost first.
    pub fn all_ambient_values_with<'s>(
        &'s self,
        ceiling: &'s [TypeId],
        search_live_stack_only: bool,
        types: &'s [TypeId],
        properties: &'s [MemberId],
    ) -> impl Iterator<Item = AmbientValue> + 's {
        self.walk(ceiling, search_live_stack_only, types, properties)
    }

    fn walk<'s>(
        &'s self,
        ceiling: &'s [TypeId],
        live_only: bool,
        types: &'s [TypeId],
        properties: &'s [MemberId],
    ) -> impl Iterator<Item = AmbientValue> + 's {
        let frames: Vec<&'a Frame> = if live_only {
            self.live.iter().collect()
        } else {
            self.saved.iter().chain(self.live).collect()
        };
        let mut seen: HashSet<(ObjectKey, Option<MemberId>)> = HashSet::new();
        (0..frames.len())
            .rev()
            .map(move |i| (frames[i], frames.get(i + 1).copied()))
            .take_while(move |(frame, _)| !self.is_ceiling(frame, ceiling))
            .flat_map(move |(frame, inner)| self.matches(frame, inner, types, properties))
            .filter(move |(key, found)| seen.insert((*key, found.member.clone())))
            .map(|(_, found)| found)
    }

    fn is_ceiling(&self, frame: &Frame, ceiling: &[TypeId]) -> bool {
        ceiling
            .iter()
            .any(|c| self.schema.is_assignable(frame.type_id(), c))
    }

    fn matches(
        &self,
        frame: &Frame,
        inner: Option<&Frame>,
        types: &[TypeId],
        properties: &[MemberId],
    ) -> Vec<(ObjectKey, AmbientValue)> {
        let mut found = Vec::new();
        let Some(object) = frame.instance() else {
            return found;
        };
        let Some(instance) = Instance::of(object) else {
            return found;
        };
        let key = object.key();

        if types
            .iter()
            .any(|ty| self.schema.is_assignable(frame.type_id(), ty))
        {
            found.push((
                key,
                AmbientValue {
                    member: None,
                    value: Value::Object(object.clone()),
                },
            ));
        }

        for property in properties {
            let ambient = self
                .schema
                .member_info(property)
                .is_some_and(|info| info.ambient);
            if !ambient || !self.schema.declares(frame.type_id(), property) {
                continue;
            }
            let in_construction = (frame.member() == Some(property))
                .then(|| inner.filter(|f| !f.is_retrieved()).and_then(Frame::instance))
                .flatten();
            let value = match in_construction {
                Some(inner) => Some(Value::Object(inner.clone())),
                None => instance.get(property),
            };
            if let Some(value) = value {
                found.push((
                    key,
                    AmbientValue {
                        member: Some(property.clone()),
                        value,
                    },
                ));
            }
        }
        found
    }
}
