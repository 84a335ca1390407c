use crate::traits::RecordStore;
use crate::{InstructionRecord, StoreError};
use std::path::PathBuf;

/// Download status of a record's PDF, checked when the record is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    NotAttached,
    Available(PathBuf),
    Missing(PathBuf),
}

pub fn check_attachment(record: &InstructionRecord) -> Attachment {
    if !record.has_attachment() {
        return Attachment::NotAttached;
    }

    let path = PathBuf::from(&record.pdf_path);
    if path.is_file() {
        Attachment::Available(path)
    } else {
        Attachment::Missing(path)
    }
}

pub fn find_instruction(
    store: &dyn RecordStore,
    title: &str,
) -> Result<Option<(InstructionRecord, Attachment)>, StoreError> {
    Ok(store.find_by_title(title)?.map(|record| {
        let attachment = check_attachment(&record);
        (record, attachment)
    }))
}
