//! Dynamic objects built from a node stream.

use std::cell::RefCell;

use loom_node::{MemberId, Object, TypeId, Value};

/// An object of a schema type: ordered member values plus collection items.
///
/// Members keep the order they were first assigned in. Identity is by
/// reference: two instances with equal content are still different objects.
#[derive(Debug)]
pub struct Instance {
    ty: TypeId,
    members: RefCell<Vec<(MemberId, Value)>>,
    items: RefCell<Vec<Value>>,
}

impl Instance {
    /// Create an instance of `ty` with no members set.
    pub fn new(ty: TypeId) -> Self {
        Self {
            ty,
            members: RefCell::new(Vec::new()),
            items: RefCell::new(Vec::new()),
        }
    }

    /// A new instance wrapped as a shared [`Object`].
    pub fn create(ty: TypeId) -> Object {
        Object::new(Instance::new(ty))
    }

    /// The instance behind `object`, if it is one.
    pub fn of(object: &Object) -> Option<&Instance> {
        object.downcast_ref::<Instance>()
    }

    /// The instance's type.
    pub fn type_id(&self) -> &TypeId {
        &self.ty
    }

    /// The value of `member`, if set.
    pub fn get(&self, member: &MemberId) -> Option<Value> {
        self.members
            .borrow()
            .iter()
            .find(|(m, _)| m == member)
            .map(|(_, v)| v.clone())
    }

    /// Value of the first member called `name`, whatever its declaring type.
    pub fn get_by_name(&self, name: &str) -> Option<Value> {
        self.members
            .borrow()
            .iter()
            .find(|(m, _)| m.name() == name)
            .map(|(_, v)| v.clone())
    }

    /// Whether `member` is set.
    pub fn has(&self, member: &MemberId) -> bool {
        self.members.borrow().iter().any(|(m, _)| m == member)
    }

    /// Assign `member`, returning its slot.
    pub fn set(&self, member: MemberId, value: Value) -> usize {
        let mut members = self.members.borrow_mut();
        match members.iter().position(|(m, _)| *m == member) {
            Some(slot) => {
                members[slot].1 = value;
                slot
            }
            None => {
                members.push((member, value));
                members.len() - 1
            }
        }
    }

    /// Replace the value in member slot `slot`. Returns `false` if there is
    /// no such slot.
    pub fn set_at(&self, slot: usize, value: Value) -> bool {
        match self.members.borrow_mut().get_mut(slot) {
            Some(entry) => {
                entry.1 = value;
                true
            }
            None => false,
        }
    }

    /// The `Name` directive value, if one was assigned.
    pub fn name(&self) -> Option<String> {
        self.get(&MemberId::name_directive())
            .and_then(|v| v.as_str().map(str::to_string))
    }

    /// Snapshot of every assigned member, in assignment order.
    pub fn members(&self) -> Vec<(MemberId, Value)> {
        self.members.borrow().clone()
    }

    /// Append a collection item, returning its slot.
    pub fn push_item(&self, value: Value) -> usize {
        let mut items = self.items.borrow_mut();
        items.push(value);
        items.len() - 1
    }

    /// Replace the item at `slot`. Returns `false` if there is no such slot.
    pub fn set_item(&self, slot: usize, value: Value) -> bool {
        match self.items.borrow_mut().get_mut(slot) {
            Some(item) => {
                *item = value;
                true
            }
            None => false,
        }
    }

    /// Items, in order.
    pub fn items(&self) -> Vec<Value> {
        self.items.borrow().clone()
    }

    /// Number of items.
    pub fn item_count(&self) -> usize {
        self.items.borrow().len()
    }
}
