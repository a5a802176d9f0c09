//! The one-shot path-to-table façade, for callers who don't need streaming
//! iteration and just want the whole table in memory.

use std::path::Path;

use crate::document::{Document, DocumentMetadata, OpenOptions, RecordValues};
use crate::Result;

/// A fully materialized table: metadata plus every decoded record.
#[derive(Debug, Clone)]
pub struct Table {
    /// Table metadata
    pub metadata: DocumentMetadata,
    /// Every record, in block-chain order
    pub records: Vec<RecordValues>,
}

/// Open `path`, read every record, and close the handle, all in one call.
pub fn read_table(path: impl AsRef<Path>) -> Result<Table> {
    read_table_with_options(path, OpenOptions::new())
}

/// Like [`read_table`], but with the same open options `Document::open` takes.
pub fn read_table_with_options(path: impl AsRef<Path>, options: OpenOptions) -> Result<Table> {
    let mut document = Document::open(path, options)?;
    let metadata = document.metadata()?;

    let mut records = Vec::with_capacity(metadata.record_count as usize);
    for record in document.records()? {
        records.push(record?);
    }

    document.close();
    Ok(Table { metadata, records })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_surfaces_io_error() {
        let err = read_table("/nonexistent/path/to/table.db").unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }

    #[test]
    fn empty_table_reads_zero_records() {
        let mut buf = vec![0u8; 0x3E];
        buf[0x00..0x02].copy_from_slice(&2u16.to_le_bytes());
        buf[0x05] = 1;
        buf[0x21] = 4;
        buf[0x30..0x32].copy_from_slice(&5u16.to_le_bytes());
        buf[0x38] = 1;
        buf.push(0x03); // Short
        buf.push(2);
        buf.extend_from_slice(b"ID\0");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&buf).unwrap();

        let table = read_table(file.path()).unwrap();
        assert_eq!(table.metadata.record_count, 0);
        assert_eq!(table.records.len(), 0);
    }
}
