use anyhow::Result;

use crate::model::Entity;

pub mod jsonl;
pub mod opl;

pub use self::jsonl::JsonlWriter;
pub use self::opl::OplWriter;

/// Destination of a rewritten dataset. Entities arrive one at a time in the
/// order they must appear in the output; the output is only complete once
/// `finish` has returned successfully.
pub trait DatasetWriter: Send {
    fn add(&mut self, entity: Entity) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}
