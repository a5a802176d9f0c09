//! Blob cell parsing and `.MB` blob-block resolution.

use std::io::{Read, Seek, SeekFrom};

use log::warn;

use crate::{Error, Result, Warning};

/// Size, in bytes, of one `.MB` blob block.
pub const MB_BLOCK_SIZE: usize = 4096;

/// A blob-bearing cell as laid out in the main record: a declared-length
/// window holding an inline tail, a blob-offset descriptor, a length, and a
/// modifier.
#[derive(Debug, Clone, Copy)]
pub struct BlobRef {
    /// Offset descriptor: low byte selects the entry within a multi-blob
    /// `.MB` block, the remaining bits give the block's byte offset
    pub offset_descriptor: u32,
    /// Declared payload length
    pub length: u32,
    /// Modifier, checked against the `.MB` block's index entry
    pub modifier: u16,
    /// Inline tail bytes carried directly in the main record
    pub inline_tail: Vec<u8>,
}

impl BlobRef {
    /// Parse a blob cell out of its `declared_length`-byte window. A cell
    /// too short to hold the 10-byte offset/length/modifier trailer (a
    /// corrupt field) is treated as a zero-length blob rather than indexed
    /// out of bounds.
    pub fn parse(cell: &[u8]) -> Self {
        if cell.len() < 10 {
            return BlobRef {
                offset_descriptor: 0,
                length: 0,
                modifier: 0,
                inline_tail: Vec::new(),
            };
        }

        let declared_length = cell.len();
        let tail_len = declared_length.saturating_sub(10);
        let inline_tail = cell[..tail_len].to_vec();

        let offset_descriptor = u32::from_le_bytes([
            cell[tail_len],
            cell[tail_len + 1],
            cell[tail_len + 2],
            cell[tail_len + 3],
        ]);
        let length = u32::from_le_bytes([
            cell[tail_len + 4],
            cell[tail_len + 5],
            cell[tail_len + 6],
            cell[tail_len + 7],
        ]);
        let modifier = u16::from_le_bytes([cell[tail_len + 8], cell[tail_len + 9]]);

        BlobRef {
            offset_descriptor,
            length,
            modifier,
            inline_tail,
        }
    }

    /// Whether this blob is carried entirely inline, needing no `.MB` access.
    pub fn is_inline(&self) -> bool {
        (self.length as usize) <= self.inline_tail.len()
    }

    fn block_index_in_mb(&self) -> u8 {
        (self.offset_descriptor & 0xFF) as u8
    }

    fn block_offset(&self) -> u64 {
        (self.offset_descriptor & 0xFFFF_FF00) as u64
    }
}

/// Block type byte at the start of every `.MB` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MbBlockType {
    SingleBlob,
    MultiBlob,
    Free,
    Unknown(u8),
}

impl MbBlockType {
    fn from_byte(b: u8) -> Self {
        match b {
            2 => MbBlockType::SingleBlob,
            3 => MbBlockType::MultiBlob,
            4 => MbBlockType::Free,
            other => MbBlockType::Unknown(other),
        }
    }
}

/// Resolves blob cells against an optional `.MB` file. Field name is
/// carried only for warning messages.
pub struct BlobResolver<'a, R> {
    reader: Option<&'a mut R>,
}

impl<'a, R: Read + Seek> BlobResolver<'a, R> {
    /// Build a resolver. `reader` is `None` when no `.MB` file was found.
    pub fn new(reader: Option<&'a mut R>) -> Self {
        Self { reader }
    }

    /// Resolve one blob cell, returning the raw payload bytes. Returns
    /// `Ok(None)` for a cell that should decode to `Value::Null` (zero
    /// length, missing `.MB`, or a modifier mismatch), alongside whatever
    /// warning should be recorded by the caller.
    pub fn resolve(
        &mut self,
        field_name: &str,
        record_index: u64,
        blob_ref: &BlobRef,
    ) -> Result<(Option<Vec<u8>>, Option<Warning>)> {
        if blob_ref.length == 0 {
            return Ok((None, None));
        }

        if blob_ref.is_inline() {
            let bytes = blob_ref.inline_tail[..blob_ref.length as usize].to_vec();
            return Ok((Some(bytes), None));
        }

        let Some(reader) = self.reader.as_deref_mut() else {
            return Ok((None, Some(Warning::MissingBlob)));
        };

        let block_start = blob_ref.block_offset();
        reader
            .seek(SeekFrom::Start(block_start))
            .map_err(|e| Error::io("<blob>", e))?;

        let mut block = vec![0u8; MB_BLOCK_SIZE];
        reader
            .read_exact(&mut block)
            .map_err(|e| Error::io("<blob>", e))?;

        let block_type = MbBlockType::from_byte(block[0]);

        match block_type {
            MbBlockType::Free => Err(Error::bad_format(
                format!("blob block at offset {block_start} is a free block"),
                block_start,
            )),
            MbBlockType::Unknown(code) => {
                warn!("unrecognized .MB block type 0x{code:02x} at offset {block_start}");
                Ok((None, Some(Warning::MissingBlob)))
            }
            MbBlockType::SingleBlob => {
                let len = (blob_ref.length as usize).min(MB_BLOCK_SIZE - 3);
                Ok((Some(block[3..3 + len].to_vec()), None))
            }
            MbBlockType::MultiBlob => {
                const ENTRY_SIZE: usize = 6;
                let index = blob_ref.block_index_in_mb() as usize;
                let entry_offset = 3 + index * ENTRY_SIZE;
                if entry_offset + ENTRY_SIZE > MB_BLOCK_SIZE {
                    warn!("blob index {index} out of range in block at offset {block_start}");
                    return Ok((
                        None,
                        Some(Warning::BlobMismatch {
                            field: field_name.to_string(),
                            record_index,
                        }),
                    ));
                }

                let entry = &block[entry_offset..entry_offset + ENTRY_SIZE];
                let entry_data_offset = u16::from_le_bytes([entry[0], entry[1]]) as usize;
                let entry_length = u16::from_le_bytes([entry[2], entry[3]]) as usize;
                let entry_modifier = u16::from_le_bytes([entry[4], entry[5]]);

                if entry_modifier != blob_ref.modifier {
                    return Ok((
                        None,
                        Some(Warning::BlobMismatch {
                            field: field_name.to_string(),
                            record_index,
                        }),
                    ));
                }

                let start = entry_data_offset.min(MB_BLOCK_SIZE);
                let end = (start + entry_length).min(MB_BLOCK_SIZE);
                Ok((Some(block[start..end].to_vec()), None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn make_cell(tail: &[u8], offset_descriptor: u32, length: u32, modifier: u16) -> Vec<u8> {
        let mut cell = tail.to_vec();
        cell.extend_from_slice(&offset_descriptor.to_le_bytes());
        cell.extend_from_slice(&length.to_le_bytes());
        cell.extend_from_slice(&modifier.to_le_bytes());
        cell
    }

    #[test]
    fn undersized_cell_is_treated_as_zero_length_not_indexed_out_of_bounds() {
        let blob_ref = BlobRef::parse(&[1, 2, 3]);
        assert_eq!(blob_ref.length, 0);
        assert!(blob_ref.is_inline());
    }

    #[test]
    fn inline_blob_is_read_from_tail() {
        let cell = make_cell(b"hello world!", 0, 5, 0);
        let blob_ref = BlobRef::parse(&cell);
        assert!(blob_ref.is_inline());

        let mut resolver = BlobResolver::<Cursor<Vec<u8>>>::new(None);
        let (bytes, warning) = resolver.resolve("Notes", 0, &blob_ref).unwrap();
        assert_eq!(bytes.unwrap(), b"hello");
        assert!(warning.is_none());
    }

    #[test]
    fn missing_mb_file_warns_and_returns_null() {
        let cell = make_cell(b"", 0x100, 200, 1);
        let blob_ref = BlobRef::parse(&cell);
        assert!(!blob_ref.is_inline());

        let mut resolver = BlobResolver::<Cursor<Vec<u8>>>::new(None);
        let (bytes, warning) = resolver.resolve("Notes", 0, &blob_ref).unwrap();
        assert!(bytes.is_none());
        assert_eq!(warning, Some(Warning::MissingBlob));
    }

    #[test]
    fn single_blob_block_resolves_payload() {
        let mut mb = vec![0u8; MB_BLOCK_SIZE];
        mb[0] = 2; // single-blob block
        mb[3..8].copy_from_slice(b"stuff");

        let cell = make_cell(b"", 0x000, 5, 0);
        let blob_ref = BlobRef::parse(&cell);

        let mut cursor = Cursor::new(mb);
        let mut resolver = BlobResolver::new(Some(&mut cursor));
        let (bytes, warning) = resolver.resolve("Picture", 0, &blob_ref).unwrap();
        assert_eq!(bytes.unwrap(), b"stuff");
        assert!(warning.is_none());
    }
}
