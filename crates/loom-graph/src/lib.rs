#![doc = include_str!("../README.md")]

mod ambient;
pub use ambient::{AmbientProvider, AmbientValue};

mod converter;
pub use converter::{ConversionContext, Converted, ValueConverter};

mod deferred;
pub use deferred::{DeferredContent, SavedContext};

mod diagnostic;

mod error;
pub use error::{GraphError, GraphErrorKind};

mod instance;
pub use instance::Instance;

mod reader;
pub use reader::ObjectReader;

mod settings;
pub use settings::{ObjectReaderSettings, ObjectWriterSettings};

mod stack;
pub use stack::{ConstructionStack, Frame};

mod writer;
pub use writer::{ObjectWriter, load};
