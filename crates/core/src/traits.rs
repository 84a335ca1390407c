use crate::{InstructionRecord, NewInstruction, RecordId, StoreError};
use std::sync::Arc;

/// Keyed persistence for instruction records.
///
/// Ids are assigned on insert and never reused. Titles are not unique;
/// `find_by_title` returns the earliest record with an exactly matching title.
pub trait RecordStore: Send + Sync {
    fn insert(&self, record: NewInstruction) -> Result<RecordId, StoreError>;

    /// All records in insertion order.
    fn list_all(&self) -> Result<Vec<InstructionRecord>, StoreError>;

    fn find_by_title(&self, title: &str) -> Result<Option<InstructionRecord>, StoreError>;
}

impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    fn insert(&self, record: NewInstruction) -> Result<RecordId, StoreError> {
        (**self).insert(record)
    }

    fn list_all(&self) -> Result<Vec<InstructionRecord>, StoreError> {
        (**self).list_all()
    }

    fn find_by_title(&self, title: &str) -> Result<Option<InstructionRecord>, StoreError> {
        (**self).find_by_title(title)
    }
}
