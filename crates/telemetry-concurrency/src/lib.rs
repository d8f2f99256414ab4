//! Process-wide write exclusivity and single-writer serialization
//! (spec §4.E, §5).

mod writer;
mod writer_guard;

pub use writer::WriterSerializer;
pub use writer_guard::{LockHolder, WriterGuard};
