//! Per-type decoding of a record's raw field bytes into [`Value`].

use std::io::{Read, Seek};

use crate::blob::{BlobRef, BlobResolver};
use crate::codepage;
use crate::schema::{FieldDesc, FieldType};
use crate::value::Value;
use crate::{Result, Warning};

/// Days from Paradox's epoch (0001-01-01) to the Unix epoch (1970-01-01).
const DAYS_TO_UNIX_EPOCH: i64 = 719_163;
/// Seconds in one day.
const SECONDS_PER_DAY: i64 = 86_400;

/// Sanity bound for a decoded `Date` raw day-count: values outside
/// `(0, 3_000_000]` are treated as `Null` rather than a wild date.
const DATE_RAW_MAX: i64 = 3_000_000;

/// Decode one record's cell for `field` into a [`Value`], resolving blobs
/// against `blob_resolver` when the field type requires it. Returns any
/// non-fatal warning alongside the value.
pub fn decode_field<R: Read + Seek>(
    field: &FieldDesc,
    cell: &[u8],
    codepage_label: &str,
    blob_resolver: &mut BlobResolver<R>,
    record_index: u64,
) -> Result<(Value, Option<Warning>)> {
    if FieldType::from_type_code(field.raw_type_code).is_none() {
        return Ok((
            Value::Null,
            Some(Warning::UnknownFieldType {
                field: field.name.clone(),
                type_code: field.raw_type_code,
            }),
        ));
    }

    let value = match field.field_type {
        FieldType::Alpha => decode_alpha(cell, codepage_label),
        FieldType::Short => decode_short(cell),
        FieldType::Long | FieldType::AutoInc => decode_long(cell),
        FieldType::Date => decode_date(cell),
        FieldType::Time => decode_time(cell),
        FieldType::Number | FieldType::Currency => decode_double(cell),
        FieldType::Timestamp => decode_timestamp(cell),
        FieldType::Logical => decode_logical(cell),
        FieldType::Bcd => decode_bcd(cell, field.decimal_places()),
        FieldType::Bytes => decode_bytes(cell),
        FieldType::MemoBlob | FieldType::FmtMemo | FieldType::Binary | FieldType::Ole | FieldType::Graphic => {
            let blob_ref = BlobRef::parse(cell);
            let (bytes, warning) =
                blob_resolver.resolve(&field.name, record_index, &blob_ref)?;
            let value = match bytes {
                None => Value::Null,
                Some(raw) if field.field_type.is_text_blob() => {
                    Value::Text(codepage::recode(&raw, codepage_label))
                }
                Some(raw) => Value::Bytes(raw),
            };
            return Ok((value, warning));
        }
    };

    Ok((value, None))
}

fn is_all_zero(cell: &[u8]) -> bool {
    cell.iter().all(|&b| b == 0)
}

fn decode_alpha(cell: &[u8], codepage_label: &str) -> Value {
    if is_all_zero(cell) {
        return Value::Null;
    }
    let trimmed = trim_trailing_nul(cell);
    Value::Text(codepage::recode(trimmed, codepage_label))
}

fn trim_trailing_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map(|i| i + 1).unwrap_or(0);
    &bytes[..end]
}

fn decode_short(cell: &[u8]) -> Value {
    if cell.len() != 2 {
        return Value::Null;
    }
    let raw = u16::from_be_bytes([cell[0], cell[1]]);
    if raw & 0x8000 == 0 {
        return Value::Null;
    }
    let signed = (raw ^ 0x8000) as i16;
    Value::Int64(signed as i64)
}

fn decode_long_raw(cell: &[u8]) -> Option<i32> {
    if cell.len() != 4 {
        return None;
    }
    let raw = u32::from_be_bytes([cell[0], cell[1], cell[2], cell[3]]);
    if raw & 0x8000_0000 == 0 {
        return None;
    }
    Some((raw ^ 0x8000_0000) as i32)
}

fn decode_long(cell: &[u8]) -> Value {
    match decode_long_raw(cell) {
        Some(signed) => Value::Int64(signed as i64),
        None => Value::Null,
    }
}

fn decode_date(cell: &[u8]) -> Value {
    match decode_long_raw(cell) {
        Some(raw_days) => {
            let raw_days = raw_days as i64;
            if raw_days <= 0 || raw_days > DATE_RAW_MAX {
                Value::Null
            } else {
                Value::Date(raw_days - DAYS_TO_UNIX_EPOCH)
            }
        }
        None => Value::Null,
    }
}

fn decode_time(cell: &[u8]) -> Value {
    match decode_long_raw(cell) {
        Some(ms) if ms >= 0 => Value::TimeOfDay(ms as f64 / 1000.0),
        _ => Value::Null,
    }
}

fn decode_sign_protocol_double(cell: &[u8]) -> Option<f64> {
    if cell.len() != 8 || is_all_zero(cell) {
        return None;
    }
    let raw = u64::from_be_bytes(cell.try_into().expect("checked length"));
    let bits = if raw & 0x8000_0000_0000_0000 != 0 {
        raw & 0x7FFF_FFFF_FFFF_FFFF
    } else {
        !raw
    };
    Some(f64::from_bits(bits))
}

fn decode_double(cell: &[u8]) -> Value {
    match decode_sign_protocol_double(cell) {
        Some(v) => Value::Float64(v),
        None => Value::Null,
    }
}

fn decode_timestamp(cell: &[u8]) -> Value {
    match decode_sign_protocol_double(cell) {
        Some(ms) if ms > 0.0 => {
            let seconds = (ms / 1000.0) - (DAYS_TO_UNIX_EPOCH * SECONDS_PER_DAY) as f64;
            Value::Timestamp(seconds as i64)
        }
        _ => Value::Null,
    }
}

fn decode_logical(cell: &[u8]) -> Value {
    if cell.len() != 1 {
        return Value::Null;
    }
    let byte = cell[0];
    if byte & 0x80 == 0 {
        return Value::Null;
    }
    Value::Bool(byte != 0x80)
}

fn decode_bcd(cell: &[u8], decimal_places: u8) -> Value {
    if cell.is_empty() || is_all_zero(cell) {
        return Value::Null;
    }

    let negative = cell[0] & 0x80 != 0;
    let mut digits = Vec::with_capacity((cell.len() - 1) * 2);
    for &byte in &cell[1..] {
        let hi = byte >> 4;
        let lo = byte & 0x0F;
        if hi > 9 || lo > 9 {
            return Value::Null;
        }
        digits.push(hi);
        digits.push(lo);
    }

    let decimal_places = decimal_places as usize;
    let split = digits.len().saturating_sub(decimal_places);
    let (int_digits, frac_digits) = digits.split_at(split);

    let int_str: String = int_digits.iter().map(|d| (b'0' + d) as char).collect();
    let int_str = int_str.trim_start_matches('0');
    let int_str = if int_str.is_empty() { "0" } else { int_str };

    let mut text = String::new();
    if negative && int_str != "0" {
        text.push('-');
    }
    text.push_str(int_str);
    if !frac_digits.is_empty() {
        text.push('.');
        text.extend(frac_digits.iter().map(|d| (b'0' + d) as char));
    }

    Value::Text(text)
}

fn decode_bytes(cell: &[u8]) -> Value {
    if cell.is_empty() {
        Value::Null
    } else {
        Value::Bytes(cell.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn resolver() -> BlobResolver<'static, Cursor<Vec<u8>>> {
        BlobResolver::new(None)
    }

    #[test]
    fn short_null_marker_is_null() {
        assert_eq!(decode_short(&[0x00, 0x00]), Value::Null);
    }

    #[test]
    fn short_decodes_biased_value() {
        // biased representation of -1: 0x8000 ^ 0xFFFF = 0x7FFF
        assert_eq!(decode_short(&[0x7F, 0xFF]), Value::Int64(-1));
        assert_eq!(decode_short(&[0x80, 0x01]), Value::Int64(1));
    }

    #[test]
    fn date_out_of_sanity_bound_is_null() {
        let raw = 4_000_000i32 ^ i32::MIN;
        assert_eq!(decode_date(&raw.to_be_bytes()), Value::Null);
    }

    #[test]
    fn date_in_range_converts_to_unix_days() {
        let raw = (DAYS_TO_UNIX_EPOCH as i32 + 100) ^ i32::MIN;
        assert_eq!(decode_date(&raw.to_be_bytes()), Value::Date(100));
    }

    #[test]
    fn logical_decodes_true_false_and_null() {
        assert_eq!(decode_logical(&[0x00]), Value::Null);
        assert_eq!(decode_logical(&[0x80]), Value::Bool(false));
        assert_eq!(decode_logical(&[0x81]), Value::Bool(true));
    }

    #[test]
    fn bcd_all_zero_is_null() {
        let cell = [0u8; 17];
        assert_eq!(decode_bcd(&cell, 2), Value::Null);
    }

    #[test]
    fn bcd_decodes_with_decimal_places() {
        let mut cell = [0u8; 17];
        // digits: 00..00 12 34 -> last two bytes hold 1234
        cell[15] = 0x12;
        cell[16] = 0x34;
        assert_eq!(decode_bcd(&cell, 2), Value::Text("12.34".to_string()));
    }

    #[test]
    fn bytes_empty_cell_is_null() {
        assert_eq!(decode_bytes(&[]), Value::Null);
        assert_eq!(decode_bytes(&[1, 2, 3]), Value::Bytes(vec![1, 2, 3]));
    }

    #[test]
    fn alpha_trims_trailing_nul_and_nulls_empty() {
        assert_eq!(decode_alpha(&[0, 0, 0], ""), Value::Null);
        assert_eq!(decode_alpha(b"Hi\0\0", ""), Value::Text("Hi".to_string()));
    }

    #[test]
    fn unknown_type_code_produces_warning_and_null() {
        let field = FieldDesc {
            name: "Mystery".to_string(),
            field_type: FieldType::Bytes,
            length: 4,
            raw_type_code: 0xFE,
        };
        let mut r = resolver();
        let (value, warning) = decode_field(&field, &[1, 2, 3, 4], "", &mut r, 0).unwrap();
        assert_eq!(value, Value::Null);
        assert!(matches!(warning, Some(Warning::UnknownFieldType { .. })));
    }
}
