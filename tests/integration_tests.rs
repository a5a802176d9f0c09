//! End-to-end scenarios built from synthetic fixtures, exercising the
//! header parser, field decoder, blob resolver, deobfuscator, and the
//! `Document` state machine together.

use std::io::Write;

use pretty_assertions::assert_eq;

use paradox_db::{read_table, Document, Error, OpenOptions, Value};

/// Builds a minimal `.DB` fixture in memory: a fixed header, a field
/// descriptor table, NUL-terminated field names, then raw block bytes.
struct TableBuilder {
    fields: Vec<(u8, u8, String)>,
    records: Vec<Vec<u8>>,
    codepage_id: u16,
    encryption_word: u32,
}

impl TableBuilder {
    fn new() -> Self {
        Self {
            fields: Vec::new(),
            records: Vec::new(),
            codepage_id: 0,
            encryption_word: 0,
        }
    }

    fn field(mut self, type_code: u8, length: u8, name: &str) -> Self {
        self.fields.push((type_code, length, name.to_string()));
        self
    }

    fn codepage(mut self, id: u16) -> Self {
        self.codepage_id = id;
        self
    }

    fn record(mut self, bytes: Vec<u8>) -> Self {
        self.records.push(bytes);
        self
    }

    fn record_width(&self) -> u16 {
        self.fields.iter().map(|(_, len, _)| *len as u16).sum()
    }

    fn build(self) -> Vec<u8> {
        let record_width = self.record_width();
        let field_count = self.fields.len() as u8;

        let mut header = vec![0u8; 0x3E];
        header[0x00..0x02].copy_from_slice(&record_width.to_le_bytes());
        header[0x05] = 1; // max_table_size -> 1024-byte blocks
        header[0x06..0x0A].copy_from_slice(&(self.records.len() as u32).to_le_bytes());
        header[0x0E..0x10].copy_from_slice(&1u16.to_le_bytes()); // first_block
        header[0x10..0x12].copy_from_slice(&1u16.to_le_bytes()); // last_block
        header[0x21] = 4;
        header[0x22..0x26].copy_from_slice(&self.encryption_word.to_le_bytes());
        header[0x30..0x32].copy_from_slice(&5u16.to_le_bytes()); // header_version
        header[0x38] = field_count;
        header[0x3C..0x3E].copy_from_slice(&self.codepage_id.to_le_bytes());

        let mut body = Vec::new();
        for (type_code, length, _) in &self.fields {
            body.push(*type_code);
            body.push(*length);
        }
        for (_, _, name) in &self.fields {
            body.extend_from_slice(name.as_bytes());
            body.push(0);
        }

        let header_size = (header.len() + body.len()) as u16;
        header[0x02..0x04].copy_from_slice(&header_size.to_le_bytes());

        let mut out = header;
        out.extend_from_slice(&body);

        // One data block: 6-byte block header then record payload.
        let block_size = 1024usize;
        let mut block = vec![0u8; block_size];
        let records_used = self.records.len() as u32;
        if records_used > 0 {
            let offset = (records_used - 1) * record_width as u32;
            block[4..6].copy_from_slice(&(offset as u16).to_le_bytes());
        } else {
            block[4..6].copy_from_slice(&0xFFFFu16.to_le_bytes());
        }

        let mut position = 6usize;
        for record in &self.records {
            block[position..position + record.len()].copy_from_slice(record);
            position += record.len();
        }

        out.extend_from_slice(&block);
        out
    }

    fn write_to_tempfile(self) -> tempfile::NamedTempFile {
        let bytes = self.build();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        file
    }
}

fn alpha_cell(text: &str, width: usize) -> Vec<u8> {
    let mut cell = vec![0u8; width];
    let bytes = text.as_bytes();
    cell[..bytes.len()].copy_from_slice(bytes);
    cell
}

fn short_cell(value: i16) -> Vec<u8> {
    let biased = (value as u16) ^ 0x8000;
    biased.to_be_bytes().to_vec()
}

fn long_cell(value: i32) -> Vec<u8> {
    let biased = (value as u32) ^ 0x8000_0000;
    biased.to_be_bytes().to_vec()
}

#[test]
fn country_like_table_round_trips_alpha_and_long_fields() {
    let mut record = Vec::new();
    record.extend(alpha_cell("Germany", 24));
    record.extend(alpha_cell("Berlin", 24));
    record.extend(alpha_cell("Europe", 24));
    record.extend(long_cell(357_000));
    record.extend(long_cell(83_000_000));

    let file = TableBuilder::new()
        .field(0x01, 24, "Name")
        .field(0x01, 24, "Capital")
        .field(0x01, 24, "Continent")
        .field(0x04, 4, "Area")
        .field(0x04, 4, "Population")
        .record(record)
        .write_to_tempfile();

    let table = read_table(file.path()).unwrap();
    assert_eq!(table.metadata.record_count, 1);
    assert_eq!(table.records.len(), 1);

    let values = table.records[0].values();
    assert_eq!(values[0], Value::Text("Germany".to_string()));
    assert_eq!(values[1], Value::Text("Berlin".to_string()));
    assert_eq!(values[3], Value::Int64(357_000));
    assert_eq!(values[4], Value::Int64(83_000_000));
}

#[test]
fn empty_table_has_zero_records() {
    let file = TableBuilder::new()
        .field(0x03, 2, "ID")
        .write_to_tempfile();

    let table = read_table(file.path()).unwrap();
    assert_eq!(table.metadata.record_count, 0);
    assert!(table.records.is_empty());
}

#[test]
fn cp866_field_name_is_recoded_to_utf8() {
    // Field names are stored in the header's raw codepage, not UTF-8, so
    // this fixture is built by hand rather than through `TableBuilder`.
    let raw_name: [u8; 3] = [0x88, 0xAD, 0xA2]; // "Инв" in CP866

    let mut header = vec![0u8; 0x3E];
    header[0x00..0x02].copy_from_slice(&2u16.to_le_bytes());
    header[0x05] = 1;
    header[0x21] = 4;
    header[0x30..0x32].copy_from_slice(&5u16.to_le_bytes());
    header[0x38] = 1;
    header[0x3C..0x3E].copy_from_slice(&866u16.to_le_bytes());

    header.push(0x03); // Short
    header.push(2);
    header.extend_from_slice(&raw_name);
    header.push(0);

    let header_size = header.len() as u16;
    header[0x02..0x04].copy_from_slice(&header_size.to_le_bytes());

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&header).unwrap();

    let mut doc = Document::open(file.path(), OpenOptions::new()).unwrap();
    let metadata = doc.metadata().unwrap();
    assert_eq!(metadata.fields[0].name, "Инв");
    doc.close();
}

#[test]
fn short_field_null_marker_decodes_to_null() {
    let record = vec![0x00, 0x00];

    let file = TableBuilder::new()
        .field(0x03, 2, "Value")
        .record(record)
        .write_to_tempfile();

    let table = read_table(file.path()).unwrap();
    assert_eq!(table.records[0].values()[0], Value::Null);
}

#[test]
fn date_field_decodes_relative_to_unix_epoch() {
    let raw_days = 719_163 + 100; // 100 days after 1970-01-01
    let record = long_cell(raw_days);

    let file = TableBuilder::new()
        .field(0x02, 4, "Created")
        .record(record)
        .write_to_tempfile();

    let table = read_table(file.path()).unwrap();
    assert_eq!(table.records[0].values()[0], Value::Date(100));
}

#[test]
fn number_field_decodes_positive_and_negative_via_sign_bit() {
    let positive_bits = 3.5f64.to_bits() | 0x8000_0000_0000_0000;
    let positive_record = positive_bits.to_be_bytes().to_vec();

    let negative_value = -3.5f64;
    let negative_bits = !(negative_value.to_bits());
    let negative_record = negative_bits.to_be_bytes().to_vec();

    let file = TableBuilder::new()
        .field(0x06, 8, "Amount")
        .record(positive_record)
        .record(negative_record)
        .write_to_tempfile();

    let table = read_table(file.path()).unwrap();
    assert_eq!(table.records[0].values()[0], Value::Float64(3.5));
    assert_eq!(table.records[1].values()[0], Value::Float64(-3.5));
}

#[test]
fn missing_file_reports_contractual_message() {
    let err = read_table("/no/such/paradox/table.db").unwrap_err();
    assert!(err.to_string().contains("File not found"));
}

#[test]
fn encrypted_table_without_password_fails() {
    let mut builder = TableBuilder::new().field(0x03, 2, "ID");
    builder.encryption_word = 0xDEAD_BEEF;
    let file = builder.write_to_tempfile();

    let err = Document::open(file.path(), OpenOptions::new()).unwrap_err();
    assert!(matches!(err, Error::Encrypted));
    assert!(err.to_string().contains("password protected"));
}

#[test]
fn reopening_a_table_yields_identical_metadata() {
    let file = TableBuilder::new()
        .field(0x01, 10, "Name")
        .record(alpha_cell("Alice", 10))
        .write_to_tempfile();

    let mut first = Document::open(file.path(), OpenOptions::new()).unwrap();
    let meta1 = first.metadata().unwrap();
    first.close();

    let mut second = Document::open(file.path(), OpenOptions::new()).unwrap();
    let meta2 = second.metadata().unwrap();
    second.close();

    assert_eq!(meta1.record_count, meta2.record_count);
    assert_eq!(meta1.field_count, meta2.field_count);
}

#[test]
fn blob_field_without_mb_file_is_null_with_warning() {
    let mut cell = vec![0u8; 20];
    // declared_length=20, tail=10 bytes, then offset/length/modifier
    cell[10..14].copy_from_slice(&0x100u32.to_le_bytes());
    cell[14..18].copy_from_slice(&500u32.to_le_bytes());
    cell[18..20].copy_from_slice(&1u16.to_le_bytes());

    let file = TableBuilder::new()
        .field(0x0C, 20, "Notes")
        .record(cell)
        .write_to_tempfile();

    let mut doc = Document::open(file.path(), OpenOptions::new()).unwrap();
    let records: Vec<_> = doc.records().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(records[0].values()[0], Value::Null);
    doc.close();
}
