//! Content captured for later construction.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use loom_names::{NameStore, SharedStore};
use loom_node::{MemberId, Object, TypeSystem, WeakObject};
use loom_stream::{NodeList, transform};
use tracing::debug;

use crate::stack::SavedFrame;
use crate::{Frame, GraphError, GraphErrorKind, ObjectWriter, ObjectWriterSettings};

/// Construction state at the point content was captured: the open objects
/// and the name scopes in effect.
///
/// Nothing here keeps the document alive. Open objects and scopes are held
/// weakly. Once the document completes, its names are recorded (also weakly)
/// so they still resolve after the writer and its scopes are gone.
pub struct SavedContext {
    frames: Vec<SavedFrame>,
    scopes: Vec<Weak<RefCell<dyn NameStore>>>,
    names: RefCell<Vec<(String, WeakObject)>>,
}

impl SavedContext {
    pub(crate) fn new(frames: Vec<SavedFrame>, scopes: &[SharedStore]) -> Self {
        Self {
            frames,
            scopes: scopes.iter().map(Rc::downgrade).collect(),
            names: RefCell::new(Vec::new()),
        }
    }

    /// Objects that were open and are still alive, outermost first.
    pub fn frames(&self) -> Vec<Frame> {
        self.frames.iter().filter_map(SavedFrame::upgrade).collect()
    }

    /// Name scopes that were in effect and are still alive, outermost first.
    pub fn scopes(&self) -> Vec<SharedStore> {
        self.scopes.iter().filter_map(Weak::upgrade).collect()
    }

    /// Names recorded when the document completed, innermost binding first.
    /// Names whose object was dropped are left out.
    pub fn names(&self) -> Vec<(String, Object)> {
        self.names
            .borrow()
            .iter()
            .filter_map(|(name, weak)| weak.upgrade().map(|object| (name.clone(), object)))
            .collect()
    }

    pub(crate) fn record_names(&self, names: impl Iterator<Item = (String, Object)>) {
        let mut recorded = self.names.borrow_mut();
        recorded.clear();
        recorded.extend(names.map(|(name, object)| (name, object.downgrade())));
        debug!(names = recorded.len(), "recorded names for deferred content");
    }
}

impl fmt::Debug for SavedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SavedContext")
            .field("frames", &self.frames.len())
            .field("scopes", &self.scopes.len())
            .field("names", &self.names.borrow().len())
            .finish()
    }
}

/// The nodes of a deferred member together with the context they were
/// written in.
///
/// Loading builds the captured object with ambient lookups and name
/// resolution seeing the saved context. It can be loaded any number of
/// times; each load builds a new object with its own name scope.
#[derive(Debug)]
pub struct DeferredContent {
    member: MemberId,
    nodes: NodeList,
    context: Rc<SavedContext>,
}

impl DeferredContent {
    pub(crate) fn new(member: MemberId, nodes: NodeList, context: Rc<SavedContext>) -> Self {
        Self {
            member,
            nodes,
            context,
        }
    }

    /// The deferred content behind `object`, if it is some.
    pub fn of(object: &Object) -> Option<&DeferredContent> {
        object.downcast_ref::<DeferredContent>()
    }

    /// The member the content was written into.
    pub fn member(&self) -> &MemberId {
        &self.member
    }

    /// The captured nodes.
    pub fn nodes(&self) -> &NodeList {
        &self.nodes
    }

    /// The context the nodes were written in.
    pub fn context(&self) -> &SavedContext {
        &self.context
    }

    /// Build the captured object.
    pub fn load(&self, settings: ObjectWriterSettings) -> Result<Object, GraphError> {
        let schema: Arc<dyn TypeSystem> = self.nodes.schema().cloned().ok_or_else(|| {
            GraphError::new(GraphErrorKind::InvalidDeferredContent(
                "captured nodes have no schema".to_string(),
            ))
        })?;
        debug!(member = %self.member, nodes = self.nodes.len(), "loading deferred content");
        let mut writer = ObjectWriter::resume(schema, settings, &self.context);
        let mut reader = self.nodes.reader()?;
        transform(&mut reader, &mut writer, true)?;
        writer.into_root().ok_or_else(|| {
            GraphError::new(GraphErrorKind::InvalidDeferredContent(format!(
                "{} holds no object",
                self.member
            )))
        })
    }
}
