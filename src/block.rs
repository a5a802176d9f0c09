//! Block-linked-list traversal and record slicing.

use std::collections::HashSet;
use std::io::{Read, Seek, SeekFrom};

use log::trace;

use crate::deobfuscate;
use crate::header::Header;
use crate::{Error, Result};

/// One data block read from the `.DB` file: a 6-byte header followed by a
/// fixed-size payload holding up to `records_per_block` records.
#[derive(Debug, Clone)]
pub struct Block {
    /// This block's own 1-based index in the file
    pub index: u16,
    /// Previous block in the linked list, 0 if none
    pub prev: u16,
    /// Next block in the linked list, 0 if none
    pub next: u16,
    /// Number of live records in this block (0 for an empty block)
    pub records_used: u32,
    /// Full block bytes, header included
    pub data: Vec<u8>,
}

/// A single record: the schema-aligned byte slice sliced out of a block's
/// payload, plus its logical position in iteration order.
#[derive(Debug, Clone)]
pub struct Record {
    /// Raw record bytes, `record_width` long
    pub bytes: Vec<u8>,
    /// Zero-based position among all yielded records
    pub index: u64,
}

/// Read one block at the given 1-based block index, deobfuscating it in
/// place first if the table is encrypted.
fn read_block<R: Read + Seek>(
    reader: &mut R,
    header: &Header,
    block_number: u16,
    checksum: Option<u32>,
) -> Result<Block> {
    let block_size = header.block_size() as u64;
    let offset = header.header_size as u64 + (block_number as u64 - 1) * block_size;

    reader
        .seek(SeekFrom::Start(offset))
        .map_err(|e| Error::io("<table>", e))?;

    let mut data = vec![0u8; block_size as usize];
    reader
        .read_exact(&mut data)
        .map_err(|e| Error::io("<table>", e))?;

    if let Some(sum) = checksum {
        deobfuscate::deobfuscate_block(&mut data, sum, block_number);
    }

    let next = u16::from_le_bytes([data[0], data[1]]);
    let prev = u16::from_le_bytes([data[2], data[3]]);
    let raw_offset = u16::from_le_bytes([data[4], data[5]]) as i16;

    let records_used = if raw_offset < 0 {
        0
    } else {
        (raw_offset as u32 / header.record_width as u32) + 1
    };

    let capacity = header.records_per_block();
    if records_used > capacity {
        return Err(Error::bad_format(
            format!(
                "block {block_number} claims {records_used} records but only holds {capacity}"
            ),
            offset,
        ));
    }

    trace!(
        "block {block_number}: next={next} prev={prev} records_used={records_used}"
    );

    Ok(Block {
        index: block_number,
        prev,
        next,
        records_used,
        data,
    })
}

/// Walks the block-linked-list starting at `header.first_block`, yielding
/// each live record in on-disk order. Holds at most one block in memory.
pub struct RecordCursor<'a, R> {
    reader: &'a mut R,
    header: &'a Header,
    checksum: Option<u32>,
    next_block_to_fetch: u16,
    current_block: Option<Block>,
    position_in_block: u32,
    visited: HashSet<u16>,
    logical_index: u64,
    started: bool,
}

impl<'a, R: Read + Seek> RecordCursor<'a, R> {
    /// Build a cursor starting at the header's first block.
    pub fn new(reader: &'a mut R, header: &'a Header, checksum: Option<u32>) -> Self {
        Self {
            reader,
            header,
            checksum,
            next_block_to_fetch: header.first_block,
            current_block: None,
            position_in_block: 0,
            visited: HashSet::new(),
            logical_index: 0,
            started: false,
        }
    }

    /// How many records this cursor has yielded so far.
    pub fn yielded_so_far(&self) -> u64 {
        self.logical_index
    }

    fn advance_to_next_nonempty_block(&mut self) -> Result<bool> {
        loop {
            if self.next_block_to_fetch == 0 {
                return Ok(false);
            }

            let block_number = self.next_block_to_fetch;
            if !self.started && self.header.first_block == 0 {
                return Ok(false);
            }

            if self.visited.contains(&block_number) {
                return Err(Error::bad_format(
                    format!("cycle detected in block chain at block {block_number}"),
                    0,
                ));
            }
            self.visited.insert(block_number);
            self.started = true;

            let block = read_block(self.reader, self.header, block_number, self.checksum)?;
            self.next_block_to_fetch = block.next;
            let has_records = block.records_used > 0;
            self.current_block = Some(block);
            self.position_in_block = 0;

            if has_records {
                return Ok(true);
            }
        }
    }

    /// Fetch the next record, or `None` once the block chain is exhausted.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            let has_block = match &self.current_block {
                Some(block) => self.position_in_block < block.records_used,
                None => false,
            };

            if !has_block {
                if !self.advance_to_next_nonempty_block()? {
                    return Ok(None);
                }
                continue;
            }

            let block = self.current_block.as_ref().expect("checked above");
            let record_width = self.header.record_width as usize;
            let start = Header::BLOCK_HEADER_SIZE + self.position_in_block as usize * record_width;
            let end = start + record_width;
            let bytes = block.data[start..end].to_vec();

            self.position_in_block += 1;
            let index = self.logical_index;
            self.logical_index += 1;

            return Ok(Some(Record { bytes, index }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn test_header(first_block: u16, record_width: u16, max_table_size: u8) -> Header {
        Header {
            record_width,
            header_size: 0,
            file_type_code: 0,
            max_table_size,
            num_records: 0,
            next_block: 0,
            file_blocks: 1,
            first_block,
            last_block: first_block,
            modify_count: 0,
            file_version_id: 4,
            encryption_word: 0,
            indexed_field_count: 0,
            header_version: 5,
            field_count: 1,
            primary_key_field_count: 0,
            codepage_id: 0,
        }
    }

    #[test]
    fn empty_table_yields_no_records() {
        let header = test_header(0, 4, 1);
        let mut cursor = Cursor::new(Vec::<u8>::new());
        let mut rc = RecordCursor::new(&mut cursor, &header, None);
        assert!(rc.next_record().unwrap().is_none());
    }

    #[test]
    fn single_block_yields_its_records() {
        let header = test_header(1, 4, 1);
        let block_size = header.block_size() as usize;
        let mut data = vec![0u8; block_size];
        // next=0, prev=0, offset=(2-1)*4=4 -> records_used=2
        data[4..6].copy_from_slice(&4u16.to_le_bytes());
        data[6..10].copy_from_slice(&1i32.to_be_bytes());
        data[10..14].copy_from_slice(&2i32.to_be_bytes());

        let mut cursor = Cursor::new(data);
        let mut rc = RecordCursor::new(&mut cursor, &header, None);

        let r0 = rc.next_record().unwrap().unwrap();
        assert_eq!(r0.index, 0);
        assert_eq!(r0.bytes, 1i32.to_be_bytes());

        let r1 = rc.next_record().unwrap().unwrap();
        assert_eq!(r1.index, 1);
        assert_eq!(r1.bytes, 2i32.to_be_bytes());

        assert!(rc.next_record().unwrap().is_none());
    }

    #[test]
    fn bogus_in_block_offset_is_rejected_not_panicked() {
        let header = test_header(1, 2, 1);
        let block_size = header.block_size() as usize;
        let mut data = vec![0u8; block_size];
        // offset 0x7FFE with record_width=2 implies ~16384 records, far past
        // what a 1024-byte block can hold.
        data[4..6].copy_from_slice(&0x7FFEu16.to_le_bytes());

        let mut cursor = Cursor::new(data);
        let mut rc = RecordCursor::new(&mut cursor, &header, None);

        let err = rc.next_record().unwrap_err();
        assert!(matches!(err, Error::BadFormat { .. }));
    }
}
