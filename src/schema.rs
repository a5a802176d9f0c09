//! Field descriptors and the per-table schema they form.

use crate::{Error, Result};

/// The closed set of field types a Paradox table can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Fixed-width character data
    Alpha,
    /// Days since 0001-01-01, stored as a signed 32-bit big-endian value
    Date,
    /// Signed 16-bit integer
    Short,
    /// Signed 32-bit integer
    Long,
    /// 8-byte fixed-point currency value (same wire form as `Number`)
    Currency,
    /// 8-byte IEEE-754 double with a sign-bit null/sign protocol
    Number,
    /// Single-byte boolean
    Logical,
    /// Variable-length text resolved through the blob file
    MemoBlob,
    /// Variable-length raw bytes resolved through the blob file
    Binary,
    /// Formatted (rich-text) memo, resolved and recoded like `MemoBlob`
    FmtMemo,
    /// OLE object, resolved through the blob file like `Binary`
    Ole,
    /// Graphic/image payload, resolved through the blob file like `Binary`
    Graphic,
    /// Milliseconds since midnight, stored as a signed 32-bit big-endian value
    Time,
    /// Milliseconds since 0001-01-01 00:00, same sign-bit protocol as `Number`
    Timestamp,
    /// Auto-incrementing signed 32-bit integer (wire form identical to `Long`)
    AutoInc,
    /// Packed binary-coded decimal, rendered as a decimal-string `Value::Text`
    Bcd,
    /// Raw inline bytes, declared length 1..255
    Bytes,
}

impl FieldType {
    /// Decode a Paradox field-type byte, if it names one of the fourteen
    /// recognized types. Unrecognized codes are the caller's problem (they
    /// become a `Warning::UnknownFieldType` + `Value::Null` at decode time).
    pub fn from_type_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(FieldType::Alpha),
            0x02 => Some(FieldType::Date),
            0x03 => Some(FieldType::Short),
            0x04 => Some(FieldType::Long),
            0x05 => Some(FieldType::Currency),
            0x06 => Some(FieldType::Number),
            0x09 => Some(FieldType::Logical),
            0x0C => Some(FieldType::MemoBlob),
            0x0D => Some(FieldType::Binary),
            0x0E => Some(FieldType::FmtMemo),
            0x0F => Some(FieldType::Ole),
            0x10 => Some(FieldType::Graphic),
            0x14 => Some(FieldType::Time),
            0x15 => Some(FieldType::Timestamp),
            0x16 => Some(FieldType::AutoInc),
            0x17 => Some(FieldType::Bcd),
            0x18 => Some(FieldType::Bytes),
            _ => None,
        }
    }

    /// Whether cells of this type are resolved through the `.MB` blob file
    /// rather than decoded directly from the record bytes.
    pub fn is_blob(&self) -> bool {
        matches!(
            self,
            FieldType::MemoBlob
                | FieldType::Binary
                | FieldType::FmtMemo
                | FieldType::Ole
                | FieldType::Graphic
        )
    }

    /// Whether the blob payload for this type is text that should be
    /// codepage-recoded, as opposed to opaque bytes.
    pub fn is_text_blob(&self) -> bool {
        matches!(self, FieldType::MemoBlob | FieldType::FmtMemo)
    }
}

/// One column of a Paradox table: its name, type, and declared byte width.
#[derive(Debug, Clone)]
pub struct FieldDesc {
    /// Field name, already recoded to UTF-8
    pub name: String,
    /// The field's type
    pub field_type: FieldType,
    /// Declared byte length of the field's cell in a record
    pub length: u16,
    /// Raw type code, kept even when it fell outside the recognized set
    pub(crate) raw_type_code: u8,
}

/// Fractional digits in a `Bcd` cell's 32-digit packed value. `Bcd` fields
/// are always declared with `length == 17` (1 sign byte + 16 digit bytes,
/// 32 nibbles total), so the descriptor carries no per-field scale to read;
/// the split is fixed by the wire format itself, matching the 26-integer +
/// 6-fractional digit shape of the documented BCD null sentinel.
const BCD_FRACTIONAL_DIGITS: u8 = 6;

impl FieldDesc {
    /// Number of fractional digits a `Bcd` cell carries.
    pub fn decimal_places(&self) -> u8 {
        BCD_FRACTIONAL_DIGITS
    }
}

/// The ordered set of field descriptors for a table; lengths sum to the
/// record byte-width declared in the header.
#[derive(Debug, Clone)]
pub struct Schema {
    /// Fields in on-disk order
    pub fields: Vec<FieldDesc>,
}

impl Schema {
    pub(crate) fn new(fields: Vec<FieldDesc>) -> Self {
        Self { fields }
    }

    /// Total byte width of one record under this schema.
    pub fn record_width(&self) -> u32 {
        self.fields.iter().map(|f| f.length as u32).sum()
    }

    /// Number of fields in the schema.
    pub fn field_count(&self) -> u16 {
        self.fields.len() as u16
    }

    /// Look up a field's index by name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Validate that the schema's record width matches the header's
    /// declared record width.
    pub(crate) fn validate(&self, declared_field_count: u16, declared_record_width: u32) -> Result<()> {
        if self.fields.len() != declared_field_count as usize {
            return Err(Error::bad_format(
                format!(
                    "schema has {} fields but header declares {declared_field_count}",
                    self.fields.len()
                ),
                0,
            ));
        }

        if self.record_width() != declared_record_width {
            return Err(Error::bad_format(
                format!(
                    "schema record width {} does not match header record width {declared_record_width}",
                    self.record_width()
                ),
                0,
            ));
        }

        Ok(())
    }
}
