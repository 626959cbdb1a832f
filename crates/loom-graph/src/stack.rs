//! The construction stack: objects currently open in the stream.

use std::collections::HashSet;

use loom_node::{LineInfo, MemberId, Object, TypeId, WeakObject};

/// What an open frame builds.
#[derive(Debug, Clone)]
pub(crate) enum FrameTarget {
    Instance(Object),
    /// An `x:Reference` object; holds the referenced name once written.
    Reference(Option<String>),
}

/// One open object.
#[derive(Debug, Clone)]
pub struct Frame {
    ty: TypeId,
    pub(crate) target: FrameTarget,
    pub(crate) member: Option<MemberId>,
    /// Values written into the open member so far.
    pub(crate) values: usize,
    /// Members assigned on this object by the stream.
    pub(crate) assigned: HashSet<MemberId>,
    retrieved: bool,
    line_info: Option<LineInfo>,
}

impl Frame {
    pub(crate) fn new(
        ty: TypeId,
        target: FrameTarget,
        retrieved: bool,
        line_info: Option<LineInfo>,
    ) -> Self {
        Self {
            ty,
            target,
            member: None,
            values: 0,
            assigned: HashSet::new(),
            retrieved,
            line_info,
        }
    }

    /// The type of the object.
    pub fn type_id(&self) -> &TypeId {
        &self.ty
    }

    /// The object under construction. `None` for reference placeholders.
    pub fn instance(&self) -> Option<&Object> {
        match &self.target {
            FrameTarget::Instance(object) => Some(object),
            FrameTarget::Reference(_) => None,
        }
    }

    /// The member currently open on this object.
    pub fn member(&self) -> Option<&MemberId> {
        self.member.as_ref()
    }

    /// Whether the object was retrieved with `GetObject` rather than created.
    pub fn is_retrieved(&self) -> bool {
        self.retrieved
    }

    /// Position of the node that opened the object.
    pub fn line_info(&self) -> Option<LineInfo> {
        self.line_info
    }

    pub(crate) fn downgrade(&self) -> SavedFrame {
        let target = match &self.target {
            FrameTarget::Instance(object) => SavedTarget::Instance(object.downgrade()),
            FrameTarget::Reference(name) => SavedTarget::Reference(name.clone()),
        };
        SavedFrame {
            ty: self.ty.clone(),
            target,
            member: self.member.clone(),
            retrieved: self.retrieved,
            line_info: self.line_info,
        }
    }
}

#[derive(Debug, Clone)]
enum SavedTarget {
    Instance(WeakObject),
    Reference(Option<String>),
}

/// An open object remembered without keeping it alive.
#[derive(Debug, Clone)]
pub(crate) struct SavedFrame {
    ty: TypeId,
    target: SavedTarget,
    member: Option<MemberId>,
    retrieved: bool,
    line_info: Option<LineInfo>,
}

impl SavedFrame {
    /// The frame again, or `None` once its object has been dropped.
    pub(crate) fn upgrade(&self) -> Option<Frame> {
        let target = match &self.target {
            SavedTarget::Instance(weak) => FrameTarget::Instance(weak.upgrade()?),
            SavedTarget::Reference(name) => FrameTarget::Reference(name.clone()),
        };
        let mut frame = Frame::new(self.ty.clone(), target, self.retrieved, self.line_info);
        frame.member = self.member.clone();
        Some(frame)
    }
}

/// Open objects, outermost first.
#[derive(Debug, Clone, Default)]
pub struct ConstructionStack {
    frames: Vec<Frame>,
}

impl ConstructionStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub(crate) fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// The innermost open object.
    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub(crate) fn top_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    /// Number of open objects.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Whether no object is open.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Open objects, outermost first.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
}
