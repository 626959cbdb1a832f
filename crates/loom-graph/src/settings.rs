//! Options for building and walking object graphs.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use loom_names::SharedStore;
use loom_node::{MemberId, Object};

use crate::ValueConverter;

/// Options for [`ObjectWriter`](crate::ObjectWriter).
#[derive(Clone, Default)]
pub struct ObjectWriterSettings {
    /// Name store shared with the code hosting the document.
    pub external_name_scope: Option<SharedStore>,

    /// Register document names into `external_name_scope` (default: false).
    ///
    /// Otherwise the document keeps its own scope and only falls back to the
    /// external one for lookups.
    pub register_names_on_external_scope: bool,

    /// Converters applied to values written into a member.
    pub converters: HashMap<MemberId, Rc<dyn ValueConverter>>,

    /// Allow a member to be assigned more than once (default: false).
    pub skip_duplicate_member_check: bool,

    /// Attach source positions to errors (default: false).
    pub provide_line_info: bool,

    /// Instance populated by the root `StartObject` instead of a new one.
    pub root_object: Option<Object>,
}

impl ObjectWriterSettings {
    /// Create the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve names against `scope` as well.
    pub fn external_name_scope(mut self, scope: SharedStore) -> Self {
        self.external_name_scope = Some(scope);
        self
    }

    /// Register the document's names on the external scope.
    pub fn register_names_on_external_scope(mut self, register: bool) -> Self {
        self.register_names_on_external_scope = register;
        self
    }

    /// Convert every value written into `member` with `converter`.
    pub fn converter(mut self, member: MemberId, converter: impl ValueConverter + 'static) -> Self {
        self.converters.insert(member, Rc::new(converter));
        self
    }

    /// Allow a member to be assigned more than once.
    pub fn skip_duplicate_member_check(mut self, skip: bool) -> Self {
        self.skip_duplicate_member_check = skip;
        self
    }

    /// Attach positions to errors.
    pub fn provide_line_info(mut self, provide: bool) -> Self {
        self.provide_line_info = provide;
        self
    }

    /// Fill `root` instead of creating the root object.
    pub fn root_object(mut self, root: Object) -> Self {
        self.root_object = Some(root);
        self
    }
}

impl fmt::Debug for ObjectWriterSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectWriterSettings")
            .field("external_name_scope", &self.external_name_scope.is_some())
            .field(
                "register_names_on_external_scope",
                &self.register_names_on_external_scope,
            )
            .field("converters", &self.converters.keys().collect::<Vec<_>>())
            .field("skip_duplicate_member_check", &self.skip_duplicate_member_check)
            .field("provide_line_info", &self.provide_line_info)
            .field("root_object", &self.root_object)
            .finish()
    }
}

/// Options for [`ObjectReader`](crate::ObjectReader).
#[derive(Debug, Clone)]
pub struct ObjectReaderSettings {
    /// Write `Name` directives of objects nobody references (default: true).
    pub emit_names: bool,

    /// Give unnamed objects reached more than once a generated name and
    /// write later occurrences as references (default: true).
    ///
    /// Otherwise such objects are written out again in full.
    pub reference_unnamed_duplicates: bool,
}

impl Default for ObjectReaderSettings {
    fn default() -> Self {
        Self {
            emit_names: true,
            reference_unnamed_duplicates: true,
        }
    }
}

impl ObjectReaderSettings {
    /// Create the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `Name` directives of objects nobody references.
    pub fn emit_names(mut self, emit: bool) -> Self {
        self.emit_names = emit;
        self
    }

    /// Generate names so shared unnamed objects are written as references.
    pub fn reference_unnamed_duplicates(mut self, reference: bool) -> Self {
        self.reference_unnamed_duplicates = reference;
        self
    }
}
