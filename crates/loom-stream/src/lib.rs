#![doc = include_str!("../README.md")]

mod dump;
pub use dump::dump;

mod error;
pub use error::{StreamError, StreamErrorKind};

mod internal;

mod list;
pub use list::{ListReader, ListWriter, NodeList};

mod queue;
pub use queue::{NodeQueue, QueueReader, QueueWriter};

mod reader;
pub use reader::{IndexedReader, NodeReader};

mod sequential;
pub use sequential::SequentialReader;

mod sink;
pub use sink::SinkWriter;

mod subtree;
pub use subtree::SubtreeReader;

mod writer;
pub use writer::{NodeWriter, transform};
