//! Random-access byte reading over files, memory and HTTP ranges.

mod adapter;
mod byte_source;

pub use adapter::{ByteSourceCursor, RangeReader};
pub use byte_source::{ByteSource, FileSource, HttpSource, MemorySource};
