//! Building object graphs from a node stream.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use loom_names::{
    FixupTarget, FixupToken, NameResolver, NameScope, NameStore, ResolvedFixup, ScopeResolver, SharedStore,
};
use loom_node::{
    LineInfo, MemberId, NamespaceDeclaration, Node, NodeKind, Object, ObjectKey, TypeId, TypeSystem, Value,
};
use loom_stream::{NodeList, NodeReader, NodeWriter, StreamError, StreamErrorKind, transform};
use tracing::{debug, trace, warn};

use crate::stack::{Frame, FrameTarget};
use crate::{
    AmbientProvider, ConstructionStack, ConversionContext, Converted, DeferredContent, GraphError,
    GraphErrorKind, Instance, ObjectWriterSettings, SavedContext,
};

/// Nodes of a deferred member being recorded.
struct Capture {
    member: MemberId,
    nodes: NodeList,
    /// Members opened inside the captured region and not closed yet.
    depth: usize,
}

fn shared(scope: NameScope) -> SharedStore {
    Rc::new(RefCell::new(scope))
}

fn fail(kind: GraphErrorKind, at: Option<LineInfo>) -> GraphError {
    GraphError::new(kind).with_line_info(at)
}

/// A [`NodeWriter`] that builds an object graph.
///
/// `StartObject` creates an [`Instance`] (or, for `x:Reference`, a
/// placeholder resolved by name when it closes). `GetObject` opens the object
/// already held by the current member. Values go through the member's
/// converter if one is registered, are resolved as names for members the
/// schema flags as references, and are stored as is otherwise. `Name`
/// directives register the current object in the document's name scope.
///
/// Names that are not registered yet when referenced are deferred; once the
/// root object closes, every name of the document is known and the deferred
/// references are written back. Any still unbound name fails the document
/// with [`UnresolvedReferences`](GraphErrorKind::UnresolvedReferences).
///
/// Members the schema flags as deferred are not built: their content is
/// recorded into a [`DeferredContent`] stored as the member's value.
pub struct ObjectWriter {
    schema: Arc<dyn TypeSystem>,
    settings: ObjectWriterSettings,
    stack: ConstructionStack,
    resolver: ScopeResolver,
    /// Objects open when the content being built was captured.
    saved_frames: Vec<Frame>,
    /// Contexts of the deferred members captured so far.
    captured: Vec<Rc<SavedContext>>,
    capture: Option<Capture>,
    namespaces: Vec<NamespaceDeclaration>,
    /// Deferred references still waiting to be written into each object.
    pending_targets: HashMap<ObjectKey, usize>,
    root: Option<Object>,
    line_info: Option<LineInfo>,
    closed: bool,
}

impl ObjectWriter {
    /// A writer for a whole document.
    ///
    /// Names are registered in a scope validating them with
    /// [`TypeSystem::is_valid_name`] of `schema`.
    pub fn new(schema: Arc<dyn TypeSystem>, settings: ObjectWriterSettings) -> Self {
        let scope = match &settings.external_name_scope {
            Some(external) if settings.register_names_on_external_scope => {
                NameScope::delegating(external.clone())
            }
            _ => NameScope::new(),
        };
        let scope = shared(scope.with_type_system(schema.clone()));
        let resolver = match &settings.external_name_scope {
            Some(external) if !settings.register_names_on_external_scope => {
                ScopeResolver::with_outer(vec![external.clone()], scope)
            }
            _ => ScopeResolver::new(scope),
        };
        Self::with_resolver(schema, settings, resolver, Vec::new())
    }

    /// A writer building content captured in `context`: names resolve
    /// against the saved scopes that are still alive, then against the names
    /// recorded when the enclosing document completed. Ambient lookups see
    /// the saved objects that are still alive.
    pub fn resume(
        schema: Arc<dyn TypeSystem>,
        settings: ObjectWriterSettings,
        context: &SavedContext,
    ) -> Self {
        let mut outer = Vec::new();
        let recorded = context.names();
        if !recorded.is_empty() {
            let mut snapshot = NameScope::new().with_type_system(schema.clone());
            for (name, object) in recorded {
                if let Err(err) = snapshot.register_name(&name, object) {
                    warn!(%name, %err, "recorded name not restored");
                }
            }
            outer.push(shared(snapshot));
        }
        outer.extend(context.scopes());
        let current = shared(NameScope::new().with_type_system(schema.clone()));
        let resolver = ScopeResolver::with_outer(outer, current);
        Self::with_resolver(schema, settings, resolver, context.frames())
    }

    fn with_resolver(
        schema: Arc<dyn TypeSystem>,
        settings: ObjectWriterSettings,
        resolver: ScopeResolver,
        saved_frames: Vec<Frame>,
    ) -> Self {
        Self {
            schema,
            settings,
            stack: ConstructionStack::new(),
            resolver,
            saved_frames,
            captured: Vec::new(),
            capture: None,
            namespaces: Vec::new(),
            pending_targets: HashMap::new(),
            root: None,
            line_info: None,
            closed: false,
        }
    }

    /// The root object, once it has been closed.
    pub fn root(&self) -> Option<&Object> {
        self.root.as_ref()
    }

    /// Consume the writer, returning the root object.
    pub fn into_root(self) -> Option<Object> {
        self.root
    }

    /// The scope the document's names are registered in.
    ///
    /// With a delegating scope, the names stay in the external scope for as
    /// long as this handle (or the writer) is alive.
    pub fn name_scope(&self) -> SharedStore {
        self.resolver.current_scope().clone()
    }

    /// The resolver for the document's names.
    pub fn resolver(&self) -> &ScopeResolver {
        &self.resolver
    }

    /// Namespace declarations written so far.
    pub fn namespaces(&self) -> &[NamespaceDeclaration] {
        &self.namespaces
    }

    /// Objects currently open.
    pub fn stack(&self) -> &ConstructionStack {
        &self.stack
    }

    /// Position attached to errors.
    fn position(&self) -> Option<LineInfo> {
        if self.settings.provide_line_info {
            self.line_info
        } else {
            None
        }
    }

    fn ensure_open(&self) -> Result<(), GraphError> {
        if self.closed {
            let err = StreamError::new(StreamErrorKind::WriterClosed).with_line_info(self.position());
            return Err(err.into());
        }
        Ok(())
    }

    fn context<'s>(&'s self, member: &'s MemberId, target: &'s Object) -> ConversionContext<'s> {
        let ambient = AmbientProvider::new(&*self.schema, self.stack.frames(), &self.saved_frames);
        ConversionContext::new(member, target, &self.resolver, ambient, self.line_info)
    }

    fn capture_node(&mut self, node: Node) -> Result<(), GraphError> {
        let Some(capture) = self.capture.as_mut() else {
            return Ok(());
        };
        match node.kind() {
            NodeKind::StartMember => capture.depth += 1,
            NodeKind::EndMember => capture.depth = capture.depth.saturating_sub(1),
            _ => {}
        }
        trace!(%node, "captured");
        capture.nodes.append(node)?;
        Ok(())
    }

    fn finish_capture(&mut self) -> Result<(), GraphError> {
        let Some(mut capture) = self.capture.take() else {
            return Ok(());
        };
        capture.nodes.freeze()?;
        let frames = self
            .saved_frames
            .iter()
            .chain(self.stack.frames())
            .map(Frame::downgrade)
            .collect();
        let context = Rc::new(SavedContext::new(frames, self.resolver.scopes()));
        self.captured.push(context.clone());
        debug!(member = %capture.member, nodes = capture.nodes.len(), "captured deferred content");
        let content = DeferredContent::new(capture.member, capture.nodes, context);
        self.assign(Value::Object(Object::new(content)), NodeKind::EndMember)?;
        Ok(())
    }

    /// Store `value` in the open member of the innermost object.
    fn assign(
        &mut self,
        value: Value,
        kind: NodeKind,
    ) -> Result<(Object, MemberId, usize), GraphError> {
        let at = self.position();
        let skip_check = self.settings.skip_duplicate_member_check;
        let frame = self
            .stack
            .top_mut()
            .ok_or_else(|| fail(GraphErrorKind::NoActiveMember(kind), at))?;
        let member = frame
            .member
            .clone()
            .ok_or_else(|| fail(GraphErrorKind::NoActiveMember(kind), at))?;
        let object = frame.instance().cloned().ok_or_else(|| {
            fail(
                GraphErrorKind::UnexpectedNode {
                    kind,
                    expected: "a name",
                },
                at,
            )
        })?;
        let instance = Instance::of(&object)
            .ok_or_else(|| fail(GraphErrorKind::NothingToGet(member.clone()), at))?;

        let slot = if member.is_items_directive() {
            instance.push_item(value)
        } else {
            if !skip_check && (frame.values > 0 || frame.assigned.contains(&member)) {
                return Err(fail(GraphErrorKind::DuplicateMember(member), at));
            }
            instance.set(member.clone(), value)
        };
        frame.values += 1;
        frame.assigned.insert(member.clone());
        trace!(%member, slot, "assigned");
        Ok((object, member, slot))
    }

    /// Store a placeholder now and write the token's resolution into it at
    /// completion.
    fn assign_later(
        &mut self,
        mut token: FixupToken,
        original: Value,
        kind: NodeKind,
    ) -> Result<(), GraphError> {
        let (object, member, slot) = self.assign(Value::Null, kind)?;
        *self.pending_targets.entry(object.key()).or_default() += 1;
        token.set_target(FixupTarget {
            object,
            member,
            slot,
            original,
        });
        token.set_line_info(self.line_info);
        self.resolver.defer(token);
        Ok(())
    }

    /// Every name of the document is known: resolve deferred references.
    fn finish_document(&mut self) -> Result<(), GraphError> {
        let completion = self.resolver.complete();
        let mut unresolved: Vec<String> = Vec::new();
        let mut first_at = None;
        for token in &completion.unresolved {
            first_at = first_at.or(token.line_info());
            for name in token.names() {
                if !unresolved.contains(name) {
                    unresolved.push(name.clone());
                }
            }
        }
        if !unresolved.is_empty() {
            let at = if self.settings.provide_line_info { first_at } else { None };
            return Err(fail(GraphErrorKind::UnresolvedReferences(unresolved), at));
        }
        for fixup in completion.resolved {
            self.apply_fixup(fixup)?;
        }
        for context in &self.captured {
            context.record_names(self.resolver.names_and_values());
        }
        debug!("document complete");
        Ok(())
    }

    fn apply_fixup(&mut self, fixup: ResolvedFixup) -> Result<(), GraphError> {
        let ResolvedFixup { token, values } = fixup;
        let Some(target) = token.target().cloned() else {
            return Ok(());
        };
        let at = if self.settings.provide_line_info {
            token.line_info()
        } else {
            None
        };
        let conversion = |message: String| {
            fail(
                GraphErrorKind::Conversion {
                    member: target.member.clone(),
                    message,
                },
                at,
            )
        };

        let value = if token.can_assign_directly() {
            match values.as_slice() {
                [object] => Value::Object(object.clone()),
                _ => {
                    return Err(conversion(format!(
                        "{} names cannot be assigned directly",
                        values.len()
                    )));
                }
            }
        } else {
            let converter = self
                .settings
                .converters
                .get(&target.member)
                .cloned()
                .ok_or_else(|| conversion("no converter to complete the reference".to_string()))?;
            let converted = {
                let cx = self.context(&target.member, &target.object);
                converter.convert(&target.original, &cx)
            };
            match converted.map_err(conversion)? {
                Converted::Value(value) => value,
                Converted::Deferred(again) => {
                    return Err(fail(
                        GraphErrorKind::UnresolvedReferences(again.names().to_vec()),
                        at,
                    ));
                }
            }
        };

        let written = match Instance::of(&target.object) {
            Some(instance) if target.member.is_items_directive() => {
                instance.set_item(target.slot, value)
            }
            Some(instance) => instance.set_at(target.slot, value),
            None => false,
        };
        if !written {
            warn!(member = %target.member, slot = target.slot, "fixup target slot is gone");
        }
        trace!(id = token.id(), member = %target.member, "fixup applied");

        let key = target.object.key();
        if let Some(count) = self.pending_targets.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                self.pending_targets.remove(&key);
                self.resolver.mark_complete(&target.object);
            }
        }
        Ok(())
    }

    fn new_instance(&self, ty: &TypeId) -> Result<(TypeId, Object), GraphError> {
        match &self.settings.root_object {
            Some(root) if self.stack.is_empty() && self.root.is_none() => {
                let instance = Instance::of(root).ok_or_else(|| {
                    fail(
                        GraphErrorKind::UnexpectedNode {
                            kind: NodeKind::StartObject,
                            expected: "a root object that is an Instance",
                        },
                        self.position(),
                    )
                })?;
                Ok((instance.type_id().clone(), root.clone()))
            }
            _ => Ok((ty.clone(), Instance::create(ty.clone()))),
        }
    }
}

impl NodeWriter for ObjectWriter {
    type Error = GraphError;

    fn write_start_object(&mut self, ty: TypeId) -> Result<(), GraphError> {
        self.ensure_open()?;
        if self.capture.is_some() {
            return self.capture_node(Node::StartObject(ty));
        }
        let at = self.position();
        match self.stack.top() {
            None if self.root.is_some() => {
                return Err(fail(
                    GraphErrorKind::UnexpectedNode {
                        kind: NodeKind::StartObject,
                        expected: "end of stream",
                    },
                    at,
                ));
            }
            Some(frame) if frame.member().is_none() => {
                return Err(fail(
                    GraphErrorKind::UnexpectedNode {
                        kind: NodeKind::StartObject,
                        expected: "StartMember",
                    },
                    at,
                ));
            }
            _ => {}
        }

        let frame = if ty.is_reference() {
            Frame::new(ty, FrameTarget::Reference(None), false, self.line_info)
        } else {
            let (ty, object) = self.new_instance(&ty)?;
            self.resolver.mark_incomplete(&object);
            Frame::new(ty, FrameTarget::Instance(object), false, self.line_info)
        };
        trace!(ty = %frame.type_id(), depth = self.stack.depth(), "object opened");
        self.stack.push(frame);
        Ok(())
    }

    fn write_get_object(&mut self) -> Result<(), GraphError> {
        self.ensure_open()?;
        if self.capture.is_some() {
            return self.capture_node(Node::GetObject);
        }
        let at = self.position();
        let no_member = || fail(GraphErrorKind::NoActiveMember(NodeKind::GetObject), at);
        let frame = self.stack.top().ok_or_else(no_member)?;
        let member = frame.member().cloned().ok_or_else(no_member)?;
        let current = frame.instance().and_then(Instance::of).and_then(|i| i.get(&member));
        let found = match current {
            Some(Value::Object(object)) => {
                Instance::of(&object).map(|i| (i.type_id().clone(), object.clone()))
            }
            _ => None,
        };
        let Some((ty, object)) = found else {
            return Err(fail(GraphErrorKind::NothingToGet(member), at));
        };
        trace!(%ty, %member, "object retrieved");
        self.stack
            .push(Frame::new(ty, FrameTarget::Instance(object), true, self.line_info));
        Ok(())
    }

    fn write_end_object(&mut self) -> Result<(), GraphError> {
        self.ensure_open()?;
        if self.capture.is_some() {
            return self.capture_node(Node::EndObject);
        }
        let at = self.position();
        let frame = self.stack.pop().ok_or_else(|| {
            fail(
                GraphErrorKind::UnexpectedNode {
                    kind: NodeKind::EndObject,
                    expected: "StartObject",
                },
                at,
            )
        })?;
        if frame.member().is_some() {
            return Err(fail(
                GraphErrorKind::UnexpectedNode {
                    kind: NodeKind::EndObject,
                    expected: "EndMember",
                },
                at,
            ));
        }
        let retrieved = frame.is_retrieved();

        match frame.target {
            FrameTarget::Reference(name) => {
                let name = name.ok_or_else(|| {
                    fail(
                        GraphErrorKind::Conversion {
                            member: MemberId::name_directive(),
                            message: "reference has no name".to_string(),
                        },
                        at,
                    )
                })?;
                match self.resolver.resolve(&name) {
                    Some(object) => {
                        trace!(%name, "reference resolved");
                        self.assign(Value::Object(object), NodeKind::EndObject)?;
                    }
                    None => {
                        let token = self
                            .resolver
                            .fixup_token(vec![name.clone()], true)
                            .map_err(|e| GraphError::from(e).with_line_info(at))?;
                        self.assign_later(token, Value::Text(name), NodeKind::EndObject)?;
                    }
                }
            }
            FrameTarget::Instance(object) => {
                if !retrieved {
                    if self.stack.is_empty() {
                        self.root = Some(object.clone());
                    } else {
                        self.assign(Value::Object(object.clone()), NodeKind::EndObject)?;
                    }
                }
                if !self.pending_targets.contains_key(&object.key()) {
                    self.resolver.mark_complete(&object);
                }
                if self.stack.is_empty() && !retrieved {
                    debug!("root object closed");
                    self.finish_document()?;
                }
            }
        }
        Ok(())
    }

    fn write_start_member(&mut self, member: MemberId) -> Result<(), GraphError> {
        self.ensure_open()?;
        if self.capture.is_some() {
            return self.capture_node(Node::StartMember(member));
        }
        let at = self.position();
        let frame = self.stack.top_mut().ok_or_else(|| {
            fail(
                GraphErrorKind::UnexpectedNode {
                    kind: NodeKind::StartMember,
                    expected: "StartObject",
                },
                at,
            )
        })?;
        if frame.member.is_some() {
            return Err(fail(
                GraphErrorKind::UnexpectedNode {
                    kind: NodeKind::StartMember,
                    expected: "EndMember",
                },
                at,
            ));
        }
        if matches!(frame.target, FrameTarget::Reference(_)) && !member.is_name_directive() {
            return Err(fail(
                GraphErrorKind::UnexpectedNode {
                    kind: NodeKind::StartMember,
                    expected: "the Name directive",
                },
                at,
            ));
        }
        if !self.schema.declares(frame.type_id(), &member) {
            return Err(fail(
                GraphErrorKind::UnknownMember {
                    ty: frame.type_id().clone(),
                    member,
                },
                at,
            ));
        }
        trace!(%member, "member opened");
        frame.member = Some(member.clone());
        frame.values = 0;

        if self
            .schema
            .member_info(&member)
            .is_some_and(|info| info.deferred)
        {
            debug!(%member, "capturing deferred member");
            self.capture = Some(Capture {
                member,
                nodes: NodeList::with_schema(self.schema.clone()),
                depth: 0,
            });
        }
        Ok(())
    }

    fn write_end_member(&mut self) -> Result<(), GraphError> {
        self.ensure_open()?;
        match self.capture.as_ref().map(|c| c.depth) {
            Some(0) => self.finish_capture()?,
            Some(_) => return self.capture_node(Node::EndMember),
            None => {}
        }
        let at = self.position();
        let no_member = || fail(GraphErrorKind::NoActiveMember(NodeKind::EndMember), at);
        let frame = self.stack.top_mut().ok_or_else(no_member)?;
        let member = frame.member.take().ok_or_else(no_member)?;
        frame.values = 0;
        trace!(%member, "member closed");
        Ok(())
    }

    fn write_value(&mut self, value: Value) -> Result<(), GraphError> {
        self.ensure_open()?;
        if self.capture.is_some() {
            return self.capture_node(Node::Value(value));
        }
        let at = self.position();
        let no_member = || fail(GraphErrorKind::NoActiveMember(NodeKind::Value), at);
        let frame = self.stack.top().ok_or_else(no_member)?;
        let member = frame.member().cloned().ok_or_else(no_member)?;
        let object = frame.instance().cloned();
        let names_must_be_text = |member: &MemberId| {
            fail(
                GraphErrorKind::Conversion {
                    member: member.clone(),
                    message: "names must be text".to_string(),
                },
                at,
            )
        };

        let Some(object) = object else {
            // x:Reference: the value is the referenced name.
            let name = value.as_str().ok_or_else(|| names_must_be_text(&member))?;
            if let Some(frame) = self.stack.top_mut() {
                frame.target = FrameTarget::Reference(Some(name.to_string()));
            }
            return Ok(());
        };

        if member.is_name_directive() {
            let name = value.as_str().ok_or_else(|| names_must_be_text(&member))?;
            self.resolver
                .register_name(name, object.clone())
                .map_err(|e| GraphError::from(e).with_line_info(at))?;
            return self.assign(value, NodeKind::Value).map(drop);
        }

        if let Some(converter) = self.settings.converters.get(&member).cloned() {
            let converted = {
                let cx = self.context(&member, &object);
                converter.convert(&value, &cx)
            };
            let converted = converted.map_err(|message| {
                fail(
                    GraphErrorKind::Conversion {
                        member: member.clone(),
                        message,
                    },
                    at,
                )
            })?;
            return match converted {
                Converted::Value(converted) => self.assign(converted, NodeKind::Value).map(drop),
                Converted::Deferred(token) => self.assign_later(token, value, NodeKind::Value),
            };
        }

        let reference = self
            .schema
            .member_info(&member)
            .is_some_and(|info| info.reference);
        if reference && let Some(name) = value.as_str() {
            return match self.resolver.resolve(name) {
                Some(target) => self.assign(Value::Object(target), NodeKind::Value).map(drop),
                None => {
                    let token = self
                        .resolver
                        .fixup_token(vec![name.to_string()], true)
                        .map_err(|e| GraphError::from(e).with_line_info(at))?;
                    self.assign_later(token, value, NodeKind::Value)
                }
            };
        }

        self.assign(value, NodeKind::Value).map(drop)
    }

    fn write_namespace(&mut self, decl: NamespaceDeclaration) -> Result<(), GraphError> {
        self.ensure_open()?;
        if self.capture.is_some() {
            return self.capture_node(Node::NamespaceDeclaration(decl));
        }
        debug!(prefix = %decl.prefix, namespace = %decl.namespace, "namespace declared");
        self.namespaces.push(decl);
        Ok(())
    }

    fn close(&mut self) -> Result<(), GraphError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if !self.stack.is_empty() {
            return Err(fail(
                GraphErrorKind::UnclosedObject(self.stack.depth()),
                self.position(),
            ));
        }
        debug!(root = self.root.is_some(), "object writer closed");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn accepts_line_info(&self) -> bool {
        true
    }

    fn set_line_info(&mut self, line_info: LineInfo) -> Result<(), GraphError> {
        self.ensure_open()?;
        self.line_info = Some(line_info);
        if let Some(capture) = self.capture.as_mut() {
            capture.nodes.append_line_info(line_info)?;
        }
        Ok(())
    }
}

/// Build the object graph described by the remaining nodes of `reader`.
pub fn load<R: NodeReader>(
    reader: &mut R,
    schema: Arc<dyn TypeSystem>,
    settings: ObjectWriterSettings,
) -> Result<Object, GraphError> {
    let mut writer = ObjectWriter::new(schema, settings);
    transform(reader, &mut writer, true)?;
    writer.into_root().ok_or_else(|| {
        GraphError::new(GraphErrorKind::UnexpectedNode {
            kind: NodeKind::None,
            expected: "StartObject",
        })
    })
}
