//! Backtrace buffer decoding
//!
//! Decoding happens in two sequential passes over a read-only [`TraceBuffer`]:
//!
//! 1. [`scan`] locates record boundaries from the header words alone.
//! 2. [`EntryArray::decode`] reads the attribute schema from the first INFO
//!    record and decodes every other record against it.
//!
//! Nothing here resolves symbols; stack payloads stay raw addresses until the
//! renderer asks the [`crate::context::TraceContext`] about them.

pub mod buffer;
pub mod decode;
pub mod entry;
pub mod scan;
pub mod schema;

pub use buffer::TraceBuffer;
pub use decode::EntryArray;
pub use entry::{
    CommonAttributes, Entry, EntryBody, InfoAttributes, MappingAttributes, StackAttributes,
    StatsAttributes,
};
pub use scan::{scan, RawRecord};
pub use schema::{decode_name, AttributeSchema, EntrySchema};
