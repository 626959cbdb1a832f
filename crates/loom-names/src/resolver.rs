//! Name resolution over a chain of scopes.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;

use loom_node::{Object, ObjectKey};
use tracing::debug;

use crate::{FixupToken, NameError, NameErrorKind, SharedStore};

/// Lookups available to code running while a document is being built.
pub trait NameResolver {
    /// The object bound to `name`, if any.
    fn resolve(&self, name: &str) -> Option<Object> {
        self.resolve_with_status(name).0
    }

    /// The object bound to `name`, and whether it is fully initialized.
    ///
    /// An object that exists but still waits for references of its own
    /// reports `false`; it can be resolved again once names are complete.
    fn resolve_with_status(&self, name: &str) -> (Option<Object>, bool);

    /// Whether [`fixup_token`](NameResolver::fixup_token) may be called.
    fn is_fixup_token_available(&self) -> bool;

    /// A token deferring the lookup of `names` until every name of the
    /// document is registered.
    fn fixup_token(
        &self,
        names: Vec<String>,
        can_assign_directly: bool,
    ) -> Result<FixupToken, NameError>;

    /// Every binding visible from here, innermost scope first. Names shadowed
    /// by an inner scope are reported once.
    fn names_and_values(&self) -> Box<dyn Iterator<Item = (String, Object)> + '_>;

    /// Run `callback` once every name of the document has been registered.
    ///
    /// Runs immediately if that already happened.
    fn on_names_complete(&self, callback: Box<dyn FnOnce()>);
}

/// A resolved fixup: the token and the objects its names are bound to, in
/// the token's name order.
#[derive(Debug)]
pub struct ResolvedFixup {
    pub token: FixupToken,
    pub values: Vec<Object>,
}

/// Outcome of [`ScopeResolver::complete`].
#[derive(Debug, Default)]
pub struct Completion {
    pub resolved: Vec<ResolvedFixup>,
    /// Tokens with at least one name still unbound.
    pub unresolved: Vec<FixupToken>,
}

/// A [`NameResolver`] over a chain of name stores.
///
/// The last store in the chain is the current one: registrations go there
/// and lookups start there, falling back to outer stores.
pub struct ScopeResolver {
    scopes: Vec<SharedStore>,
    incomplete: RefCell<HashSet<ObjectKey>>,
    pending: RefCell<Vec<FixupToken>>,
    listeners: RefCell<Vec<Box<dyn FnOnce()>>>,
    completed: Cell<bool>,
    next_token: Cell<u64>,
}

impl ScopeResolver {
    /// A resolver over a single scope.
    pub fn new(root: SharedStore) -> Self {
        Self::with_outer(Vec::new(), root)
    }

    /// A resolver registering into `current` and looking up through `outer`
    /// (outermost first) after it.
    pub fn with_outer(mut outer: Vec<SharedStore>, current: SharedStore) -> Self {
        outer.push(current);
        Self {
            scopes: outer,
            incomplete: RefCell::new(HashSet::new()),
            pending: RefCell::new(Vec::new()),
            listeners: RefCell::new(Vec::new()),
            completed: Cell::new(false),
            next_token: Cell::new(0),
        }
    }

    /// Make `scope` the current scope.
    pub fn push_scope(&mut self, scope: SharedStore) {
        self.scopes.push(scope);
    }

    /// Remove the current scope. The outermost scope is never removed.
    pub fn pop_scope(&mut self) -> Option<SharedStore> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    /// The scope chain, outermost first.
    pub fn scopes(&self) -> &[SharedStore] {
        &self.scopes
    }

    /// The innermost scope, where names are registered.
    pub fn current_scope(&self) -> &SharedStore {
        // The chain always holds at least the scope given at construction.
        &self.scopes[self.scopes.len() - 1]
    }

    /// Register `object` under `name` in the current scope.
    pub fn register_name(&self, name: &str, object: Object) -> Result<(), NameError> {
        self.current_scope().borrow_mut().register_name(name, object)
    }

    /// Report `object` as not fully initialized.
    pub fn mark_incomplete(&self, object: &Object) {
        self.incomplete.borrow_mut().insert(object.key());
    }

    /// Mark `object` as fully initialized.
    pub fn mark_complete(&self, object: &Object) {
        self.incomplete.borrow_mut().remove(&object.key());
    }

    /// Whether `object` has no pending initialization.
    pub fn is_fully_initialized(&self, object: &Object) -> bool {
        !self.incomplete.borrow().contains(&object.key())
    }

    /// Queue a token for resolution at completion.
    pub fn defer(&self, token: FixupToken) {
        debug!(id = token.id, names = ?token.names, "fixup deferred");
        self.pending.borrow_mut().push(token);
    }

    /// Number of queued tokens.
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Whether every name of the document is known.
    pub fn is_complete(&self) -> bool {
        self.completed.get()
    }

    /// Signal that every name has been registered.
    ///
    /// Fires the completion callbacks, then resolves the queued tokens. Only
    /// the first call does anything; later calls return an empty result.
    pub fn complete(&self) -> Completion {
        if self.completed.replace(true) {
            return Completion::default();
        }
        let listeners = std::mem::take(&mut *self.listeners.borrow_mut());
        debug!(listeners = listeners.len(), "names complete");
        for listener in listeners {
            listener();
        }

        let tokens = std::mem::take(&mut *self.pending.borrow_mut());
        let mut completion = Completion::default();
        for token in tokens {
            let values: Option<Vec<Object>> = token.names.iter().map(|n| self.resolve(n)).collect();
            match values {
                Some(values) => completion.resolved.push(ResolvedFixup { token, values }),
                None => completion.unresolved.push(token),
            }
        }
        debug!(
            resolved = completion.resolved.len(),
            unresolved = completion.unresolved.len(),
            "fixups processed"
        );
        completion
    }
}

impl NameResolver for ScopeResolver {
    fn resolve_with_status(&self, name: &str) -> (Option<Object>, bool) {
        for scope in self.scopes.iter().rev() {
            if let Some(object) = scope.borrow().find_name(name) {
                let ready = self.is_fully_initialized(&object);
                return (Some(object), ready);
            }
        }
        (None, false)
    }

    fn is_fixup_token_available(&self) -> bool {
        !self.completed.get()
    }

    fn fixup_token(
        &self,
        names: Vec<String>,
        can_assign_directly: bool,
    ) -> Result<FixupToken, NameError> {
        if !self.is_fixup_token_available() {
            return Err(NameErrorKind::FixupTokenUnavailable.into());
        }
        let id = self.next_token.get();
        self.next_token.set(id + 1);
        debug!(id, ?names, can_assign_directly, "fixup token issued");
        Ok(FixupToken {
            id,
            names,
            can_assign_directly,
            target: None,
            line_info: None,
        })
    }

    fn names_and_values(&self) -> Box<dyn Iterator<Item = (String, Object)> + '_> {
        let mut seen = HashSet::new();
        Box::new(
            self.scopes
                .iter()
                .rev()
                .flat_map(|scope| scope.borrow().names())
                .filter(move |(name, _)| seen.insert(name.clone())),
        )
    }

    fn on_names_complete(&self, callback: Box<dyn FnOnce()>) {
        if self.completed.get() {
            callback();
        } else {
            self.listeners.borrow_mut().push(callback);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::NameScope;

    fn scope() -> SharedStore {
        Rc::new(RefCell::new(NameScope::new()))
    }

    #[test]
    fn test_resolve_walks_outward() {
        let outer = scope();
        let inner = scope();
        let a = Object::new("outer a");
        let b = Object::new("inner a");
        outer.borrow_mut().register_name("a", a.clone()).unwrap();
        outer.borrow_mut().register_name("only_outer", a.clone()).unwrap();
        let resolver = ScopeResolver::with_outer(vec![outer], inner);
        resolver.register_name("a", b.clone()).unwrap();

        assert!(resolver.resolve("a").unwrap().ptr_eq(&b));
        assert!(resolver.resolve("only_outer").unwrap().ptr_eq(&a));
        assert!(resolver.resolve("missing").is_none());
    }

    #[test]
    fn test_status_reports_incomplete_objects() {
        let resolver = ScopeResolver::new(scope());
        let obj = Object::new(());
        resolver.register_name("x", obj.clone()).unwrap();
        resolver.mark_incomplete(&obj);
        let (found, ready) = resolver.resolve_with_status("x");
        assert!(found.is_some());
        assert!(!ready);
        resolver.mark_complete(&obj);
        assert!(resolver.resolve_with_status("x").1);
        assert_eq!(resolver.resolve_with_status("y"), (None, false));
    }

    #[test]
    fn test_forward_reference_resolves_on_completion() {
        let resolver = ScopeResolver::new(scope());
        let mut token = resolver.fixup_token(vec!["later".into(), "now".into()], false).unwrap();
        token.set_line_info(Some(loom_node::LineInfo::new(4, 2)));
        resolver.defer(token);
        assert_eq!(resolver.pending(), 1);

        let now = Object::new(1);
        let later = Object::new(2);
        resolver.register_name("now", now.clone()).unwrap();
        resolver.register_name("later", later.clone()).unwrap();

        let completion = resolver.complete();
        assert!(completion.unresolved.is_empty());
        let fixup = &completion.resolved[0];
        assert!(fixup.values[0].ptr_eq(&later));
        assert!(fixup.values[1].ptr_eq(&now));
        assert!(!fixup.token.can_assign_directly());
        assert_eq!(fixup.token.line_info(), Some(loom_node::LineInfo::new(4, 2)));
        assert_eq!(resolver.pending(), 0);
    }

    #[test]
    fn test_missing_names_stay_unresolved() {
        let resolver = ScopeResolver::new(scope());
        let token = resolver.fixup_token(vec!["ghost".into()], true).unwrap();
        resolver.defer(token);
        let completion = resolver.complete();
        assert!(completion.resolved.is_empty());
        assert_eq!(completion.unresolved[0].names(), ["ghost"]);
    }

    #[test]
    fn test_completion_fires_once() {
        let resolver = ScopeResolver::new(scope());
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        resolver.on_names_complete(Box::new(move || counter.set(counter.get() + 1)));

        resolver.complete();
        resolver.complete();
        assert_eq!(fired.get(), 1);
        assert!(resolver.is_complete());

        let late = fired.clone();
        resolver.on_names_complete(Box::new(move || late.set(late.get() + 10)));
        assert_eq!(fired.get(), 11);
    }

    #[test]
    fn test_tokens_unavailable_after_completion() {
        let resolver = ScopeResolver::new(scope());
        assert!(resolver.is_fixup_token_available());
        let first = resolver.fixup_token(vec!["a".into()], true).unwrap();
        let second = resolver.fixup_token(vec!["a".into()], true).unwrap();
        assert_ne!(first.id(), second.id());

        resolver.complete();
        assert!(!resolver.is_fixup_token_available());
        let err = resolver.fixup_token(vec!["a".into()], true).unwrap_err();
        assert_eq!(err.kind, NameErrorKind::FixupTokenUnavailable);
    }

    #[test]
    fn test_names_and_values_innermost_first_without_shadowed() {
        let outer = scope();
        outer.borrow_mut().register_name("shared", Object::new("outer")).unwrap();
        outer.borrow_mut().register_name("root", Object::new("outer")).unwrap();
        let mut resolver = ScopeResolver::new(outer);
        resolver.push_scope(scope());
        resolver.register_name("shared", Object::new("inner")).unwrap();
        resolver.register_name("leaf", Object::new("inner")).unwrap();

        let names: Vec<_> = resolver.names_and_values().map(|(n, _)| n).collect();
        assert_eq!(names, ["shared", "leaf", "root"]);
        let shared = resolver.names_and_values().next().unwrap().1;
        assert_eq!(shared.downcast_ref::<&str>(), Some(&"inner"));
    }

    #[test]
    fn test_outermost_scope_is_kept() {
        let mut resolver = ScopeResolver::new(scope());
        resolver.push_scope(scope());
        assert!(resolver.pop_scope().is_some());
        assert!(resolver.pop_scope().is_none());
        assert_eq!(resolver.scopes().len(), 1);
    }
}
