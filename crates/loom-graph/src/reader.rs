//! Writing object graphs back as node streams.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use loom_node::{LineInfo, MemberId, Node, Object, ObjectKey, TypeId, TypeSystem, Value};
use loom_stream::{IndexedReader, ListReader, NodeList, NodeReader, NodeWriter, StreamError};
use tracing::debug;

use crate::{DeferredContent, GraphError, GraphErrorKind, Instance, ObjectReaderSettings};

/// A [`NodeReader`] over the node stream describing an object graph.
///
/// Every [`Instance`] becomes `StartObject`, its members in assignment
/// order, its items under the `Items` directive, then `EndObject`. An
/// instance reached again (a shared object, or a cycle) is written as an
/// `x:Reference` to its name; unnamed shared instances get a generated name
/// unless [`reference_unnamed_duplicates`] is off. Deferred content is
/// replayed as captured.
///
/// [`reference_unnamed_duplicates`]: ObjectReaderSettings::reference_unnamed_duplicates
pub struct ObjectReader {
    inner: ListReader<NodeList>,
}

impl ObjectReader {
    /// Create a reader over the graph rooted at `root`.
    pub fn new(
        root: &Object,
        schema: Arc<dyn TypeSystem>,
        settings: ObjectReaderSettings,
    ) -> Result<Self, GraphError> {
        let mut emitter = Emitter::new(settings);
        emitter.count(root);
        let mut list = NodeList::with_schema(schema);
        {
            let mut writer = list.writer();
            emitter.object(root, &mut writer)?;
            writer.close()?;
        }
        debug!(nodes = list.len(), "object graph written");
        Ok(Self {
            inner: list.into_reader()?,
        })
    }

    /// The nodes being read.
    pub fn nodes(&self) -> &NodeList {
        self.inner.list()
    }
}

impl NodeReader for ObjectReader {
    fn read(&mut self) -> Result<bool, StreamError> {
        self.inner.read()
    }

    fn node(&self) -> &Node {
        self.inner.node()
    }

    fn is_eof(&self) -> bool {
        self.inner.is_eof()
    }

    fn close(&mut self) {
        self.inner.close()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn schema(&self) -> Option<Arc<dyn TypeSystem>> {
        self.inner.schema()
    }

    fn has_line_info(&self) -> bool {
        self.inner.has_line_info()
    }

    fn line_info(&self) -> Option<LineInfo> {
        self.inner.line_info()
    }
}

impl IndexedReader for ObjectReader {
    fn count(&self) -> usize {
        self.inner.count()
    }

    fn current_index(&self) -> isize {
        self.inner.current_index()
    }

    fn set_current_index(&mut self, index: isize) -> Result<(), StreamError> {
        self.inner.set_current_index(index)
    }
}

struct Emitter {
    settings: ObjectReaderSettings,
    /// How often each instance is reached.
    seen: HashMap<ObjectKey, usize>,
    generated: HashMap<ObjectKey, String>,
    /// Instances being written (ancestors of the current one).
    open: HashSet<ObjectKey>,
    written: HashSet<ObjectKey>,
}

impl Emitter {
    fn new(settings: ObjectReaderSettings) -> Self {
        Self {
            settings,
            seen: HashMap::new(),
            generated: HashMap::new(),
            open: HashSet::new(),
            written: HashSet::new(),
        }
    }

    fn count(&mut self, object: &Object) {
        let Some(instance) = Instance::of(object) else {
            return;
        };
        let count = self.seen.entry(object.key()).or_default();
        *count += 1;
        if *count > 1 {
            return;
        }
        let members = instance.members().into_iter().map(|(_, v)| v);
        for value in members.chain(instance.items()) {
            if let Value::Object(child) = value {
                self.count(&child);
            }
        }
    }

    fn is_shared(&self, key: ObjectKey) -> bool {
        self.seen.get(&key).is_some_and(|n| *n > 1)
    }

    /// Name a later occurrence of the instance can refer to.
    fn reference_name(&mut self, object: &Object, instance: &Instance) -> Option<String> {
        if let Some(name) = instance.name() {
            return Some(name);
        }
        let key = object.key();
        if !self.settings.reference_unnamed_duplicates || !self.is_shared(key) {
            return None;
        }
        let next = self.generated.len();
        Some(
            self.generated
                .entry(key)
                .or_insert_with(|| format!("__ReferenceID{}", next))
                .clone(),
        )
    }

    fn object<W>(&mut self, object: &Object, w: &mut W) -> Result<(), GraphError>
    where
        W: NodeWriter<Error = StreamError>,
    {
        let Some(instance) = Instance::of(object) else {
            return self.opaque(object, w);
        };
        let key = object.key();
        let again = self.open.contains(&key) || self.written.contains(&key);
        if again {
            if let Some(name) = self.reference_name(object, instance) {
                return Ok(reference(&name, w)?);
            }
            if self.open.contains(&key) {
                return Err(GraphError::new(GraphErrorKind::CyclicGraph(
                    instance.type_id().clone(),
                )));
            }
        }

        self.open.insert(key);
        w.write_start_object(instance.type_id().clone())?;
        let explicit = instance.name().is_some();
        if !explicit && let Some(name) = self.reference_name(object, instance) {
            write_member(MemberId::name_directive(), Value::Text(name), w)?;
        }
        for (member, value) in instance.members() {
            if member.is_name_directive() && !self.settings.emit_names && !self.is_shared(key) {
                continue;
            }
            w.write_start_member(member)?;
            self.value(value, w)?;
            w.write_end_member()?;
        }
        let items = instance.items();
        if !items.is_empty() {
            w.write_start_member(MemberId::items_directive())?;
            for item in items {
                self.value(item, w)?;
            }
            w.write_end_member()?;
        }
        w.write_end_object()?;
        self.open.remove(&key);
        self.written.insert(key);
        Ok(())
    }

    fn value<W>(&mut self, value: Value, w: &mut W) -> Result<(), GraphError>
    where
        W: NodeWriter<Error = StreamError>,
    {
        match value {
            Value::Object(object) => self.object(&object, w),
            other => Ok(w.write_value(other)?),
        }
    }

    /// Objects that are not instances: only deferred content can be written.
    fn opaque<W>(&mut self, object: &Object, w: &mut W) -> Result<(), GraphError>
    where
        W: NodeWriter<Error = StreamError>,
    {
        let Some(content) = DeferredContent::of(object) else {
            return Err(GraphError::new(GraphErrorKind::UnsupportedObject(
                format!("{:?}", object),
            )));
        };
        let mut nodes = content.nodes().reader()?;
        while nodes.read()? {
            w.write_node(&nodes)?;
        }
        Ok(())
    }
}

fn reference<W>(name: &str, w: &mut W) -> Result<(), StreamError>
where
    W: NodeWriter<Error = StreamError>,
{
    w.write_start_object(TypeId::reference())?;
    write_member(MemberId::name_directive(), Value::from(name), w)?;
    w.write_end_object()
}

fn write_member<W>(member: MemberId, value: Value, w: &mut W) -> Result<(), StreamError>
where
    W: NodeWriter<Error = StreamError>,
{
    w.write_start_member(member)?;
    w.write_value(value)?;
    w.write_end_member()
}
