//! The `Document` handle: open a table, inspect its metadata, iterate its
//! records, and close it. This is the crate's main entry point.

use std::ffi::OsStr;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::block::RecordCursor;
use crate::blob::BlobResolver;
use crate::codepage;
use crate::deobfuscate;
use crate::field_decoder;
use crate::header::Header;
use crate::schema::Schema;
use crate::value::Value;
use crate::{Error, Result, Warning};

/// Options controlling how a table is opened.
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Overrides the header's codepage for all text decoding when set
    pub(crate) encoding: Option<String>,
    /// Required when the table is encrypted; ignored otherwise
    pub(crate) password: Option<String>,
}

impl OpenOptions {
    /// Start from the defaults (no override, no password).
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the codepage used to recode text cells and field names.
    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    /// Supply the password for an encrypted table.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

/// Summary information about an open table, independent of iteration state.
#[derive(Debug, Clone)]
pub struct DocumentMetadata {
    /// Number of records the header declares
    pub record_count: u32,
    /// Number of fields in the schema
    pub field_count: u16,
    /// Codepage label text cells are recoded from (`"CP1252"`, etc.)
    pub codepage: String,
    /// Field name/type/size triples, in schema order
    pub fields: Vec<FieldSummary>,
    /// Header format version (raw `header_version`)
    pub header_version: u16,
    /// Header format version identifier byte (raw `file_version_id`)
    pub file_version_id: u8,
    /// Header modification counter
    pub modify_count: u16,
}

/// One field's public-facing shape inside [`DocumentMetadata`].
#[derive(Debug, Clone)]
pub struct FieldSummary {
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: crate::schema::FieldType,
    /// Declared byte size
    pub size: u16,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum State {
    Open,
    Iterating,
    Closed,
}

/// An open Paradox table. Implements the handle state machine: open ->
/// metadata (idempotent) -> records -> iterate -> close.
pub struct Document {
    path: PathBuf,
    reader: BufReader<File>,
    blob_reader: Option<BufReader<File>>,
    header: Header,
    schema: Schema,
    codepage_label: String,
    checksum: Option<u32>,
    warnings: Vec<Warning>,
    state: State,
}

impl Document {
    /// Open a `.DB` table, locating a sibling `.MB` blob file if one exists.
    pub fn open(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(encoding) = &options.encoding {
            if encoding.trim().is_empty() {
                return Err(Error::InvalidArgument("encoding must not be empty".into()));
            }
        }
        if let Some(password) = &options.password {
            if password.is_empty() {
                return Err(Error::InvalidArgument("password must not be empty".into()));
            }
        }

        let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
        let mut reader = BufReader::new(file);

        let (header, schema) =
            Header::parse_with_schema(&mut reader, options.encoding.as_deref())?;

        let codepage_label = match &options.encoding {
            Some(enc) => enc.clone(),
            None => codepage::label_for_id(header.codepage_id),
        };

        let mut warnings = Vec::new();

        let checksum = if header.is_encrypted() {
            Some(deobfuscate::validate_password(
                options.password.as_deref(),
                header.encryption_word,
            )?)
        } else {
            None
        };

        let has_blob_field = schema.fields.iter().any(|f| f.field_type.is_blob());
        let blob_reader = if has_blob_field {
            match find_blob_sibling(&path) {
                Some(blob_path) => {
                    Some(BufReader::new(File::open(&blob_path).map_err(|e| Error::io(&blob_path, e))?))
                }
                None => {
                    push_warning(&mut warnings, Warning::MissingBlob);
                    None
                }
            }
        } else {
            None
        };

        debug!(
            "opened '{}': {} records, {} fields, codepage={codepage_label}, encrypted={}",
            path.display(),
            header.num_records,
            schema.field_count(),
            header.is_encrypted(),
        );

        Ok(Self {
            path,
            reader,
            blob_reader,
            header,
            schema,
            codepage_label,
            checksum,
            warnings,
            state: State::Open,
        })
    }

    fn ensure_not_closed(&self) -> Result<()> {
        if self.state == State::Closed {
            Err(Error::InvalidHandle)
        } else {
            Ok(())
        }
    }

    /// Table metadata. Callable any number of times while the document is open.
    pub fn metadata(&self) -> Result<DocumentMetadata> {
        self.ensure_not_closed()?;
        Ok(DocumentMetadata {
            record_count: self.header.num_records,
            field_count: self.schema.field_count(),
            codepage: self.codepage_label.clone(),
            fields: self
                .schema
                .fields
                .iter()
                .map(|f| FieldSummary {
                    name: f.name.clone(),
                    field_type: f.field_type,
                    size: f.length,
                })
                .collect(),
            header_version: self.header.header_version,
            file_version_id: self.header.file_version_id,
            modify_count: self.header.modify_count,
        })
    }

    /// The table's schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Warnings accumulated so far. Append-only; cleared only by `close()`.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Start iterating records from the beginning of the block chain.
    /// Only one iterator may be live at a time; starting a new one while
    /// the document is mid-iteration is fine, it simply restarts.
    pub fn records(&mut self) -> Result<RecordIter<'_>> {
        self.ensure_not_closed()?;
        self.state = State::Iterating;
        let cursor = RecordCursor::new(&mut self.reader, &self.header, self.checksum);
        Ok(RecordIter {
            cursor,
            schema: &self.schema,
            codepage_label: &self.codepage_label,
            blob_reader: self.blob_reader.as_mut(),
            declared_count: self.header.num_records,
            warnings: &mut self.warnings,
            finished: false,
        })
    }

    /// Release the underlying file handles. Any further operation on this
    /// document fails with `Error::InvalidHandle`.
    pub fn close(&mut self) {
        self.state = State::Closed;
    }
}

impl Drop for Document {
    fn drop(&mut self) {
        if self.state != State::Closed {
            self.close();
        }
    }
}

/// Appends a warning, collapsing repeats of `MissingBlob` to a single entry
/// since every blob cell in a table without a `.MB` file hits the same cause.
pub(crate) fn push_warning(warnings: &mut Vec<Warning>, warning: Warning) {
    if matches!(warning, Warning::MissingBlob) && warnings.contains(&Warning::MissingBlob) {
        return;
    }
    warnings.push(warning);
}

pub(crate) fn find_blob_sibling(db_path: &Path) -> Option<PathBuf> {
    let stem = db_path.file_stem()?.to_os_string();
    let dir = db_path.parent().unwrap_or_else(|| Path::new("."));

    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let candidate = entry.path();
        if candidate.file_stem() != Some(stem.as_os_str()) {
            continue;
        }
        if let Some(ext) = candidate.extension().and_then(OsStr::to_str) {
            if ext.eq_ignore_ascii_case("mb") {
                return Some(candidate);
            }
        }
    }
    None
}

/// One materialized record: `values()` aligns 1:1 with the schema's field order.
#[derive(Debug, Clone)]
pub struct RecordValues {
    /// Zero-based position in iteration order
    pub index: u64,
    values: Vec<Value>,
}

impl RecordValues {
    pub(crate) fn from_parts(index: u64, values: Vec<Value>) -> Self {
        Self { index, values }
    }

    /// Look up one field's decoded value by position.
    pub fn value(&self, field_index: u16) -> Option<&Value> {
        self.values.get(field_index as usize)
    }

    /// All decoded values, in schema order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

/// Iterator over a document's records. Holds at most one block of the
/// `.DB` file and one block of the `.MB` file in memory at a time.
pub struct RecordIter<'a> {
    cursor: RecordCursor<'a, BufReader<File>>,
    schema: &'a Schema,
    codepage_label: &'a str,
    blob_reader: Option<&'a mut BufReader<File>>,
    declared_count: u32,
    warnings: &'a mut Vec<Warning>,
    finished: bool,
}

impl RecordIter<'_> {
    fn decode_record(&mut self, record: crate::block::Record) -> Result<RecordValues> {
        let mut resolver = BlobResolver::new(self.blob_reader.as_deref_mut());
        let mut values = Vec::with_capacity(self.schema.fields.len());

        let mut offset = 0usize;
        for field in &self.schema.fields {
            let len = field.length as usize;
            let cell = &record.bytes[offset..offset + len];
            offset += len;

            let (value, warning) = field_decoder::decode_field(
                field,
                cell,
                self.codepage_label,
                &mut resolver,
                record.index,
            )?;
            if let Some(w) = warning {
                warn!("{w}");
                push_warning(self.warnings, w);
            }
            values.push(value);
        }

        Ok(RecordValues {
            index: record.index,
            values,
        })
    }
}

impl Iterator for RecordIter<'_> {
    type Item = Result<RecordValues>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.cursor.next_record() {
            Ok(Some(record)) => Some(self.decode_record(record)),
            Ok(None) => {
                self.finished = true;
                let actual = self.cursor.yielded_so_far() as u32;
                if actual != self.declared_count {
                    let w = Warning::RecordCountMismatch {
                        declared: self.declared_count,
                        actual,
                    };
                    warn!("{w}");
                    push_warning(self.warnings, w);
                }
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
