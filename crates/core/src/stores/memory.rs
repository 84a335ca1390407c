use crate::traits::RecordStore;
use crate::{InstructionRecord, NewInstruction, RecordId, StoreError};
use chrono::Utc;
use std::sync::RwLock;

#[derive(Default)]
struct MemoryState {
    records: Vec<InstructionRecord>,
    last_id: u64,
}

/// Process-local store, used for tests and `--in-memory` sessions.
#[derive(Default)]
pub struct MemoryRecordStore {
    state: RwLock<MemoryState>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|error| StoreError::Poisoned(error.to_string()))?;
        Ok(state.records.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl RecordStore for MemoryRecordStore {
    fn insert(&self, record: NewInstruction) -> Result<RecordId, StoreError> {
        record.validate()?;
        let mut state = self
            .state
            .write()
            .map_err(|error| StoreError::Poisoned(error.to_string()))?;

        state.last_id = state.last_id.saturating_add(1);
        let id = RecordId(state.last_id);
        state.records.push(InstructionRecord {
            id,
            title: record.title,
            content: record.content,
            pdf_path: record.pdf_path,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    fn list_all(&self) -> Result<Vec<InstructionRecord>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|error| StoreError::Poisoned(error.to_string()))?;
        Ok(state.records.clone())
    }

    fn find_by_title(&self, title: &str) -> Result<Option<InstructionRecord>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|error| StoreError::Poisoned(error.to_string()))?;
        Ok(state
            .records
            .iter()
            .find(|record| record.title == title)
            .cloned())
    }
}
