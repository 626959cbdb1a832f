//! Name storage.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use loom_node::{Object, TypeSystem, is_valid_identifier};
use tracing::{debug, warn};

use crate::{NameError, NameErrorKind};

/// A registry binding names to objects.
pub trait NameStore {
    /// Bind `name` to `object`.
    ///
    /// Registering the object a name is already bound to is a no-op; binding
    /// it to a different object fails with
    /// [`DuplicateName`](NameErrorKind::DuplicateName).
    fn register_name(&mut self, name: &str, object: Object) -> Result<(), NameError>;

    /// Remove `name`. Fails with [`UnknownName`](NameErrorKind::UnknownName)
    /// if it is not registered.
    fn unregister_name(&mut self, name: &str) -> Result<(), NameError>;

    /// The object bound to `name`, if any.
    fn find_name(&self, name: &str) -> Option<Object>;

    /// Every binding, in registration order.
    fn names(&self) -> Vec<(String, Object)>;
}

/// A store shared between scopes and resolvers.
pub type SharedStore = Rc<RefCell<dyn NameStore>>;

/// Names bound directly in a scope.
#[derive(Default)]
struct OwnedNames {
    map: HashMap<String, Object>,
    order: Vec<String>,
}

enum Backing {
    Owned(OwnedNames),
    Delegating(SharedStore),
}

/// A name scope that either owns its bindings or forwards them to a shared
/// store.
///
/// A delegating scope records which names it added itself. Releasing it (or
/// dropping it) unregisters exactly those names from the underlying store and
/// leaves every other binding alone.
///
/// Names must satisfy [`TypeSystem::is_valid_name`] of the scope's type
/// system, or [`is_valid_identifier`] when it has none. A delegated store
/// applies its own rule as well.
pub struct NameScope {
    backing: Backing,
    /// Names this scope added to a delegated store, in registration order.
    added: Vec<String>,
    types: Option<Arc<dyn TypeSystem>>,
}

impl NameScope {
    /// A scope owning its bindings.
    pub fn new() -> Self {
        Self {
            backing: Backing::Owned(OwnedNames::default()),
            added: Vec::new(),
            types: None,
        }
    }

    /// A scope forwarding to `underlying`.
    pub fn delegating(underlying: SharedStore) -> Self {
        Self {
            backing: Backing::Delegating(underlying),
            added: Vec::new(),
            types: None,
        }
    }

    /// Validate names with `types` instead of the default identifier rule.
    pub fn with_type_system(mut self, types: Arc<dyn TypeSystem>) -> Self {
        self.types = Some(types);
        self
    }

    /// Whether bindings are forwarded to another store.
    pub fn is_delegating(&self) -> bool {
        matches!(self.backing, Backing::Delegating(_))
    }

    /// Names this scope contributed to its underlying store.
    pub fn added_names(&self) -> &[String] {
        &self.added
    }

    /// Unregister every name this scope contributed to its underlying store.
    ///
    /// Does nothing for an owning scope.
    pub fn release(&mut self) {
        let Backing::Delegating(underlying) = &self.backing else {
            return;
        };
        let added = std::mem::take(&mut self.added);
        if added.is_empty() {
            return;
        }
        debug!(count = added.len(), "releasing delegated names");
        let mut store = underlying.borrow_mut();
        for name in added {
            if let Err(err) = store.unregister_name(&name) {
                warn!(%name, %err, "delegated name already gone");
            }
        }
    }

    fn check_name(&self, name: &str) -> Result<(), NameError> {
        let valid = match &self.types {
            Some(types) => types.is_valid_name(name),
            None => is_valid_identifier(name),
        };
        if valid {
            Ok(())
        } else {
            Err(NameErrorKind::InvalidName(name.to_string()).into())
        }
    }
}

impl Default for NameScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NameScope {
    fn drop(&mut self) {
        self.release();
    }
}

impl NameStore for NameScope {
    fn register_name(&mut self, name: &str, object: Object) -> Result<(), NameError> {
        self.check_name(name)?;
        match &mut self.backing {
            Backing::Owned(names) => {
                if let Some(existing) = names.map.get(name) {
                    return if existing.ptr_eq(&object) {
                        Ok(())
                    } else {
                        Err(NameErrorKind::DuplicateName(name.to_string()).into())
                    };
                }
                names.map.insert(name.to_string(), object);
                names.order.push(name.to_string());
            }
            Backing::Delegating(underlying) => {
                let mut store = underlying.borrow_mut();
                if store.find_name(name).is_some_and(|existing| existing.ptr_eq(&object)) {
                    return Ok(());
                }
                store.register_name(name, object)?;
                self.added.push(name.to_string());
            }
        }
        debug!(%name, "registered name");
        Ok(())
    }

    fn unregister_name(&mut self, name: &str) -> Result<(), NameError> {
        match &mut self.backing {
            Backing::Owned(names) => {
                if names.map.remove(name).is_none() {
                    return Err(NameErrorKind::UnknownName(name.to_string()).into());
                }
                names.order.retain(|n| n != name);
            }
            Backing::Delegating(underlying) => {
                underlying.borrow_mut().unregister_name(name)?;
                self.added.retain(|n| n != name);
            }
        }
        debug!(%name, "unregistered name");
        Ok(())
    }

    fn find_name(&self, name: &str) -> Option<Object> {
        match &self.backing {
            Backing::Owned(names) => names.map.get(name).cloned(),
            Backing::Delegating(underlying) => underlying.borrow().find_name(name),
        }
    }

    fn names(&self) -> Vec<(String, Object)> {
        match &self.backing {
            Backing::Owned(names) => names
                .order
                .iter()
                .filter_map(|n| names.map.get(n).map(|o| (n.clone(), o.clone())))
                .collect(),
            Backing::Delegating(underlying) => underlying.borrow().names(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared() -> (Rc<RefCell<NameScope>>, SharedStore) {
        let scope = Rc::new(RefCell::new(NameScope::new()));
        let store: SharedStore = scope.clone();
        (scope, store)
    }

    #[test]
    fn test_register_is_idempotent_for_same_object() {
        let mut scope = NameScope::new();
        let obj = Object::new(1u8);
        scope.register_name("x", obj.clone()).unwrap();
        scope.register_name("x", obj.clone()).unwrap();
        assert!(scope.find_name("x").unwrap().ptr_eq(&obj));
        assert_eq!(scope.names().len(), 1);
    }

    #[test]
    fn test_register_different_object_fails() {
        let mut scope = NameScope::new();
        scope.register_name("x", Object::new(1u8)).unwrap();
        let err = scope.register_name("x", Object::new(1u8)).unwrap_err();
        assert_eq!(err.kind, NameErrorKind::DuplicateName("x".into()));
        assert_eq!(err.to_string(), "name 'x' is already registered to another object");
    }

    #[test]
    fn test_unregister_then_find() {
        let mut scope = NameScope::new();
        scope.register_name("x", Object::new(())).unwrap();
        scope.unregister_name("x").unwrap();
        assert!(scope.find_name("x").is_none());
        let err = scope.unregister_name("x").unwrap_err();
        assert_eq!(err.kind, NameErrorKind::UnknownName("x".into()));
    }

    #[test]
    fn test_invalid_names_rejected() {
        let mut scope = NameScope::new();
        for bad in ["", "1st", "a b", "a-b"] {
            let err = scope.register_name(bad, Object::new(())).unwrap_err();
            assert_eq!(err.kind, NameErrorKind::InvalidName(bad.into()));
        }
        scope.register_name("_private2", Object::new(())).unwrap();
    }

    /// Accepts lowercase names with dashes; nothing else.
    struct KebabNames;

    impl TypeSystem for KebabNames {
        fn is_assignable(&self, from: &loom_node::TypeId, to: &loom_node::TypeId) -> bool {
            from == to
        }

        fn member_info(&self, _member: &loom_node::MemberId) -> Option<&loom_node::MemberInfo> {
            None
        }

        fn is_valid_name(&self, name: &str) -> bool {
            !name.is_empty() && name.chars().all(|c| c.is_ascii_lowercase() || c == '-')
        }
    }

    #[test]
    fn test_type_system_decides_valid_names() {
        let mut scope = NameScope::new().with_type_system(Arc::new(KebabNames));
        scope.register_name("ok-button", Object::new(())).unwrap();
        assert!(scope.find_name("ok-button").is_some());
        let err = scope.register_name("_private", Object::new(())).unwrap_err();
        assert_eq!(err.kind, NameErrorKind::InvalidName("_private".into()));
    }

    #[test]
    fn test_names_in_registration_order() {
        let mut scope = NameScope::new();
        for name in ["b", "a", "c"] {
            scope.register_name(name, Object::new(())).unwrap();
        }
        scope.unregister_name("a").unwrap();
        let names: Vec<_> = scope.names().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["b", "c"]);
    }

    #[test]
    fn test_delegating_release_removes_only_own_names() {
        let (root, store) = shared();
        root.borrow_mut().register_name("outer", Object::new(())).unwrap();

        let mut child = NameScope::delegating(store.clone());
        child.register_name("inner", Object::new(())).unwrap();
        assert!(child.is_delegating());
        assert!(root.borrow().find_name("inner").is_some());
        assert!(child.find_name("outer").is_some());

        child.release();
        assert!(root.borrow().find_name("inner").is_none());
        assert!(root.borrow().find_name("outer").is_some());
    }

    #[test]
    fn test_delegating_drop_releases() {
        let (root, store) = shared();
        {
            let mut a = NameScope::delegating(store.clone());
            let mut b = NameScope::delegating(store.clone());
            a.register_name("a", Object::new(())).unwrap();
            b.register_name("b", Object::new(())).unwrap();
            drop(a);
            assert!(root.borrow().find_name("a").is_none());
            assert!(root.borrow().find_name("b").is_some());
        }
        assert!(root.borrow().names().is_empty());
    }

    #[test]
    fn test_delegating_does_not_claim_existing_binding() {
        let (root, store) = shared();
        let obj = Object::new(());
        root.borrow_mut().register_name("x", obj.clone()).unwrap();
        let mut child = NameScope::delegating(store);
        child.register_name("x", obj).unwrap();
        assert!(child.added_names().is_empty());
        drop(child);
        assert!(root.borrow().find_name("x").is_some());
    }

    #[test]
    fn test_delegating_duplicate_propagates() {
        let (root, store) = shared();
        root.borrow_mut().register_name("x", Object::new(())).unwrap();
        let mut child = NameScope::delegating(store);
        let err = child.register_name("x", Object::new(())).unwrap_err();
        assert_eq!(err.kind, NameErrorKind::DuplicateName("x".into()));
        assert!(child.added_names().is_empty());
    }

    #[test]
    fn test_release_tolerates_names_removed_elsewhere() {
        let (root, store) = shared();
        let mut child = NameScope::delegating(store);
        child.register_name("x", Object::new(())).unwrap();
        root.borrow_mut().unregister_name("x").unwrap();
        child.release();
        assert!(child.added_names().is_empty());
    }
}
