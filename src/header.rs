//! Paradox `.DB` header and field-descriptor-table parsing.

use std::io::{Read, Seek, SeekFrom};

use log::debug;

use crate::codepage;
use crate::schema::{FieldDesc, FieldType, Schema};
use crate::{Error, Result};

/// Defensive cap on a single field name's length, guarding against a
/// corrupt file that never supplies the terminating NUL.
const MAX_FIELD_NAME_BYTES: usize = 1024;

/// The fixed-layout portion of a Paradox table header, decoded from the
/// first 0x3C-plus bytes of the `.DB` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Byte width of one record, sum of all field lengths
    pub record_width: u16,
    /// Size in bytes of the header region (fixed header + field table + names + index metadata)
    pub header_size: u16,
    /// Paradox file type code (table, index, etc.)
    pub file_type_code: u8,
    /// Block-size selector; actual block size is `1024 * max_table_size`
    pub max_table_size: u8,
    /// Number of records declared by the header
    pub num_records: u32,
    /// Index of the next block to be allocated
    pub next_block: u16,
    /// Total number of blocks in the file
    pub file_blocks: u16,
    /// Index of the first block in the record linked list
    pub first_block: u16,
    /// Index of the last block in the record linked list
    pub last_block: u16,
    /// Modification counter
    pub modify_count: u16,
    /// File format version identifier
    pub file_version_id: u8,
    /// Password checksum; 0 means the table is not encrypted
    pub encryption_word: u32,
    /// Number of indexed fields
    pub indexed_field_count: u8,
    /// Header version; >=4 is "extended", >=5 carries a codepage id
    pub header_version: u16,
    /// Number of fields in the schema
    pub field_count: u8,
    /// Number of fields in the primary key
    pub primary_key_field_count: u8,
    /// DOS codepage identifier, only meaningful when `header_version >= 5`; 0 = unknown
    pub codepage_id: u16,
}

impl Header {
    /// Effective block size in bytes: `1024 * max_table_size`.
    pub fn block_size(&self) -> u32 {
        1024 * self.max_table_size as u32
    }

    /// Number of live records that fit in one block, given the record width.
    pub fn records_per_block(&self) -> u32 {
        if self.record_width == 0 {
            return 0;
        }
        let usable = self.block_size().saturating_sub(Self::BLOCK_HEADER_SIZE as u32);
        usable / self.record_width as u32
    }

    /// Whether the table declares a non-zero encryption word and therefore
    /// requires a matching password to read.
    pub fn is_encrypted(&self) -> bool {
        self.encryption_word != 0
    }

    /// Size, in bytes, of the small fixed header each data block carries.
    pub const BLOCK_HEADER_SIZE: usize = 6;

    /// Parse the fixed-layout header fields from the start of the `.DB` file.
    /// Does not parse the field descriptor table or name region; see
    /// [`Header::parse_with_schema`].
    fn parse_fixed<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        reader
            .seek(SeekFrom::Start(0))
            .map_err(|e| Error::io("<table>", e))?;

        let mut buf = [0u8; 0x3E];
        reader
            .read_exact(&mut buf)
            .map_err(|e| Error::io("<table>", e))?;

        let record_width = u16::from_le_bytes([buf[0x00], buf[0x01]]);
        let header_size = u16::from_le_bytes([buf[0x02], buf[0x03]]);
        let file_type_code = buf[0x04];
        let max_table_size = buf[0x05];
        let num_records = u32::from_le_bytes([buf[0x06], buf[0x07], buf[0x08], buf[0x09]]);
        let next_block = u16::from_le_bytes([buf[0x0A], buf[0x0B]]);
        let file_blocks = u16::from_le_bytes([buf[0x0C], buf[0x0D]]);
        let first_block = u16::from_le_bytes([buf[0x0E], buf[0x0F]]);
        let last_block = u16::from_le_bytes([buf[0x10], buf[0x11]]);
        let modify_count = u16::from_le_bytes([buf[0x14], buf[0x15]]);
        let file_version_id = buf[0x21];
        let encryption_word = u32::from_le_bytes([buf[0x22], buf[0x23], buf[0x24], buf[0x25]]);
        let indexed_field_count = buf[0x2E];
        let header_version = u16::from_le_bytes([buf[0x30], buf[0x31]]);
        let field_count = buf[0x38];
        let primary_key_field_count = buf[0x39];
        let codepage_id = if header_version >= 5 {
            u16::from_le_bytes([buf[0x3C], buf[0x3D]])
        } else {
            0
        };

        let header = Header {
            record_width,
            header_size,
            file_type_code,
            max_table_size,
            num_records,
            next_block,
            file_blocks,
            first_block,
            last_block,
            modify_count,
            file_version_id,
            encryption_word,
            indexed_field_count,
            header_version,
            field_count,
            primary_key_field_count,
            codepage_id,
        };

        header.validate()?;
        Ok(header)
    }

    fn validate(&self) -> Result<()> {
        if self.record_width == 0 {
            return Err(Error::bad_format("record width is zero", 0x00));
        }

        if self.max_table_size == 0 || self.max_table_size > 32 {
            return Err(Error::bad_format(
                format!("block size selector {} out of range 1..=32", self.max_table_size),
                0x05,
            ));
        }

        // Known Paradox table file type codes; everything else is rejected
        // rather than guessed at.
        const RECOGNIZED_FILE_TYPES: &[u8] = &[0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
        if !RECOGNIZED_FILE_TYPES.contains(&self.file_type_code) {
            return Err(Error::bad_format(
                format!("unrecognized file type code 0x{:02x}", self.file_type_code),
                0x04,
            ));
        }

        Ok(())
    }

    /// Parse the full header plus the field descriptor table and name
    /// region that follow it, producing a [`Schema`].
    pub fn parse_with_schema<R: Read + Seek>(
        reader: &mut R,
        encoding_override: Option<&str>,
    ) -> Result<(Self, Schema)> {
        let header = Self::parse_fixed(reader)?;

        reader
            .seek(SeekFrom::Start(0x3E))
            .map_err(|e| Error::io("<table>", e))?;

        let mut type_codes = Vec::with_capacity(header.field_count as usize);
        let mut lengths = Vec::with_capacity(header.field_count as usize);
        for _ in 0..header.field_count {
            let mut pair = [0u8; 2];
            reader
                .read_exact(&mut pair)
                .map_err(|e| Error::io("<table>", e))?;
            type_codes.push(pair[0]);
            lengths.push(pair[1] as u16);
        }

        let label = match encoding_override {
            Some(enc) => enc.to_string(),
            None => codepage::label_for_id(header.codepage_id),
        };

        let mut fields = Vec::with_capacity(header.field_count as usize);
        for (type_code, length) in type_codes.into_iter().zip(lengths.into_iter()) {
            let raw_name = read_nul_terminated_name(reader)?;
            let name = codepage::recode(&raw_name, &label);

            let field_type = FieldType::from_type_code(type_code).unwrap_or(FieldType::Bytes);
            fields.push(FieldDesc {
                name,
                field_type,
                length,
                raw_type_code: type_code,
            });
        }

        let schema = Schema::new(fields);
        schema.validate(header.field_count as u16, header.record_width as u32)?;

        debug!(
            "parsed header: {} fields, record_width={}, block_size={}, num_records={}, encrypted={}",
            header.field_count,
            header.record_width,
            header.block_size(),
            header.num_records,
            header.is_encrypted(),
        );

        Ok((header, schema))
    }
}

fn read_nul_terminated_name<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut name = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        reader
            .read_exact(&mut byte)
            .map_err(|e| Error::io("<table>", e))?;
        if byte[0] == 0 {
            break;
        }
        name.push(byte[0]);
        if name.len() >= MAX_FIELD_NAME_BYTES {
            break;
        }
    }
    Ok(name)
}
