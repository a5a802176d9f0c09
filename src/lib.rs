//! # paradox_db
//!
//! A read-only parser for legacy Paradox (`.DB` / `.MB`) database tables, the
//! format Borland's Paradox and Delphi's `TTable` components used before
//! Paradox was acquired into Corel's product line.
//!
//! ## Features
//!
//! - Parse `.DB` table headers, field schemas, and records
//! - Resolve `MemoBlob`/`Binary`/`Graphic`/`Ole` cells against a companion `.MB` file
//! - Decrypt password-protected tables
//! - Recode legacy DOS/Windows codepages (CP437, CP850, CP852, CP866, CP1250-1252) to UTF-8
//! - Export decoded tables to JSON and CSV
//! - Command-line tool for inspecting and exporting tables
//!
//! ## Example
//!
//! ```no_run
//! use paradox_db::{Document, OpenOptions};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut doc = Document::open("country.db", OpenOptions::new())?;
//!     let metadata = doc.metadata()?;
//!     println!("{} records, {} fields", metadata.record_count, metadata.field_count);
//!
//!     for record in doc.records()? {
//!         let record = record?;
//!         println!("{:?}", record.values());
//!     }
//!
//!     doc.close();
//!     Ok(())
//! }
//! ```

mod block;
mod blob;
mod codepage;
mod convenience;
mod deobfuscate;
mod document;
mod error;
mod field_decoder;
mod header;
mod schema;
mod value;

#[cfg(feature = "mmap")]
mod mmap;

#[cfg(any(feature = "serde", feature = "csv_export"))]
mod export;

pub use convenience::{read_table, read_table_with_options, Table};
pub use document::{Document, DocumentMetadata, FieldSummary, OpenOptions, RecordIter, RecordValues};
pub use error::{Error, Warning};
pub use header::Header;
pub use schema::{FieldDesc, FieldType, Schema};
pub use value::Value;

#[cfg(feature = "mmap")]
pub use mmap::MmapDocument;

#[cfg(feature = "serde")]
pub use export::export_to_json;

#[cfg(feature = "csv_export")]
pub use export::export_to_csv;

/// Result type used throughout the crate.
pub use error::Result;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_country_like_table() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();

        let record_width: u16 = 24 + 24 + 24 + 8 + 8;
        let mut buf = vec![0u8; 0x3E];
        buf[0x00..0x02].copy_from_slice(&record_width.to_le_bytes());
        buf[0x05] = 1;
        buf[0x21] = 4;
        buf[0x30..0x32].copy_from_slice(&5u16.to_le_bytes());
        buf[0x38] = 5;

        for (type_code, len) in [(0x01u8, 24u8), (0x01, 24), (0x01, 24), (0x06, 8), (0x06, 8)] {
            buf.push(type_code);
            buf.push(len);
        }
        for name in ["Name", "Capital", "Continent", "Area", "Population"] {
            buf.extend_from_slice(name.as_bytes());
            buf.push(0);
        }

        let header_size = buf.len() as u16;
        buf[0x02..0x04].copy_from_slice(&header_size.to_le_bytes());

        file.write_all(&buf).unwrap();
        file
    }

    #[test]
    fn open_reports_expected_schema_shape() {
        let file = write_country_like_table();
        let mut doc = Document::open(file.path(), OpenOptions::new()).unwrap();
        let metadata = doc.metadata().unwrap();

        assert_eq!(metadata.field_count, 5);
        let names: Vec<_> = metadata.fields.iter().map(|f| f.name.clone()).collect();
        assert_eq!(names, vec!["Name", "Capital", "Continent", "Area", "Population"]);
        let sizes: Vec<_> = metadata.fields.iter().map(|f| f.size).collect();
        assert_eq!(sizes, vec![24, 24, 24, 8, 8]);

        doc.close();
    }

    #[test]
    fn closed_document_rejects_further_operations() {
        let file = write_country_like_table();
        let mut doc = Document::open(file.path(), OpenOptions::new()).unwrap();
        doc.close();
        let err = doc.metadata().unwrap_err();
        assert!(matches!(err, Error::InvalidHandle));
    }

    #[test]
    fn reading_nonexistent_file_reports_file_not_found() {
        let err = Document::open("/no/such/table.db", OpenOptions::new()).unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }
}
