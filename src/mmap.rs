//! Memory-mapped table access, for large tables read read-only and
//! repeatedly without the buffering overhead of `Document`.

use std::io::Cursor;
use std::path::Path;

use memmap2::Mmap;

use crate::block::RecordCursor;
use crate::blob::BlobResolver;
use crate::codepage;
use crate::deobfuscate;
use crate::document::{DocumentMetadata, FieldSummary, OpenOptions, RecordValues};
use crate::field_decoder;
use crate::header::Header;
use crate::schema::Schema;
use crate::{Error, Result, Warning};

/// A memory-mapped `.DB` table. Blob resolution still goes through an
/// ordinary `File`/`BufReader`, since `.MB` files are typically much larger
/// than the win from mapping them is worth.
pub struct MmapDocument {
    mmap: Mmap,
    blob_mmap: Option<Mmap>,
    header: Header,
    schema: Schema,
    codepage_label: String,
    checksum: Option<u32>,
    warnings: Vec<Warning>,
}

impl MmapDocument {
    /// Map `path` and parse its header and schema.
    pub fn open(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
        let mmap = unsafe { Mmap::map(&file).map_err(|e| Error::io(path, e))? };

        let mut cursor = Cursor::new(&mmap[..]);
        let (header, schema) =
            Header::parse_with_schema(&mut cursor, options.encoding.as_deref())?;

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
        let blob_mmap = if has_blob_field {
            match crate::document::find_blob_sibling(path) {
                Some(blob_path) => {
                    let blob_file =
                        std::fs::File::open(&blob_path).map_err(|e| Error::io(&blob_path, e))?;
                    Some(unsafe { Mmap::map(&blob_file).map_err(|e| Error::io(&blob_path, e))? })
                }
                None => {
                    crate::document::push_warning(&mut warnings, Warning::MissingBlob);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            mmap,
            blob_mmap,
            header,
            schema,
            codepage_label,
            checksum,
            warnings,
        })
    }

    /// Table metadata, same shape `Document::metadata` returns.
    pub fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata {
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
        }
    }

    /// Warnings accumulated during open and any prior iteration.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Decode every record into memory. Unlike `Document::records`, this
    /// has no streaming mode: the mapped bytes are already resident.
    pub fn records(&mut self) -> Result<Vec<RecordValues>> {
        let mut db_cursor = Cursor::new(&self.mmap[..]);
        let mut cursor = RecordCursor::new(&mut db_cursor, &self.header, self.checksum);

        let mut blob_cursor = self.blob_mmap.as_deref().map(Cursor::new);
        let mut out = Vec::with_capacity(self.header.num_records as usize);

        while let Some(record) = cursor.next_record()? {
            let mut resolver = BlobResolver::new(blob_cursor.as_mut());
            let mut values = Vec::with_capacity(self.schema.fields.len());
            let mut offset = 0usize;
            for field in &self.schema.fields {
                let len = field.length as usize;
                let cell = &record.bytes[offset..offset + len];
                offset += len;
                let (value, warning) = field_decoder::decode_field(
                    field,
                    cell,
                    &self.codepage_label,
                    &mut resolver,
                    record.index,
                )?;
                if let Some(w) = warning {
                    crate::document::push_warning(&mut self.warnings, w);
                }
                values.push(value);
            }
            out.push(RecordValues::from_parts(record.index, values));
        }

        let actual = out.len() as u32;
        if actual != self.header.num_records {
            crate::document::push_warning(
                &mut self.warnings,
                Warning::RecordCountMismatch {
                    declared: self.header.num_records,
                    actual,
                },
            );
        }

        Ok(out)
    }
}
