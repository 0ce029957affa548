//! Row encoding and decoding
//!
//! Pure functions over byte slices. Offsets are byte positions relative to
//! the start of the slice.

use super::Field;
use bucket_core::{Error, Result};

/// Append one encoded field
fn encode_field(out: &mut Vec<u8>, field: &Field) {
    match field {
        Field::Int(value) => out.extend_from_slice(value.to_string().as_bytes()),
        Field::Str(value) => {
            out.push(b'"');
            for &byte in value.as_bytes() {
                if byte == b'"' {
                    out.push(b'"');
                }
                out.push(byte);
            }
            out.push(b'"');
        }
    }
}

/// Append one encoded row, terminator included
pub fn encode_row(out: &mut Vec<u8>, fields: &[Field]) {
    for (position, field) in fields.iter().enumerate() {
        if position > 0 {
            out.push(b',');
        }
        encode_field(out, field);
    }
    out.push(b'\n');
}

/// Encode rows, returning the bytes and each row's start offset
pub fn encode(rows: &[Vec<Field>]) -> (Vec<u8>, Vec<u64>) {
    let mut bytes = Vec::new();
    let mut offsets = Vec::with_capacity(rows.len());
    for row in rows {
        offsets.push(bytes.len() as u64);
        encode_row(&mut bytes, row);
    }
    (bytes, offsets)
}

/// Decode the row starting at `start`
///
/// Returns the fields and the offset of the next row.
pub fn decode_row(table: &str, bytes: &[u8], start: usize) -> Result<(Vec<Field>, usize)> {
    let mut fields = Vec::new();
    let mut pos = start;

    loop {
        let field_start = pos;
        let field = if bytes.get(pos) == Some(&b'"') {
            pos += 1;
            let mut value = Vec::new();
            loop {
                match bytes.get(pos) {
                    None => {
                        return Err(Error::malformed(
                            table,
                            field_start as u64,
                            "unterminated quoted field",
                        ))
                    }
                    Some(b'"') if bytes.get(pos + 1) == Some(&b'"') => {
                        value.push(b'"');
                        pos += 2;
                    }
                    Some(b'"') => {
                        pos += 1;
                        break;
                    }
                    Some(&byte) => {
                        value.push(byte);
                        pos += 1;
                    }
                }
            }
            let value = String::from_utf8(value).map_err(|e| {
                Error::malformed(table, field_start as u64, format!("invalid UTF-8: {}", e))
            })?;
            Field::Str(value)
        } else {
            while let Some(&byte) = bytes.get(pos) {
                match byte {
                    b',' | b'\n' | b'\r' => break,
                    b'"' => {
                        return Err(Error::malformed(
                            table,
                            pos as u64,
                            "quote inside unquoted field",
                        ))
                    }
                    _ => pos += 1,
                }
            }
            let token = std::str::from_utf8(&bytes[field_start..pos]).map_err(|e| {
                Error::malformed(table, field_start as u64, format!("invalid UTF-8: {}", e))
            })?;
            match token.parse::<i64>() {
                Ok(value) => Field::Int(value),
                Err(_) => Field::Str(token.to_string()),
            }
        };
        fields.push(field);

        match bytes.get(pos) {
            Some(b',') => pos += 1,
            Some(b'\n') => return Ok((fields, pos + 1)),
            Some(b'\r') if bytes.get(pos + 1) == Some(&b'\n') => return Ok((fields, pos + 2)),
            None => return Ok((fields, pos)),
            Some(&byte) => {
                return Err(Error::malformed(
                    table,
                    pos as u64,
                    format!("unexpected byte 0x{:02x} after field", byte),
                ))
            }
        }
    }
}

/// Decode every row of a table
pub fn decode(table: &str, bytes: &[u8]) -> Result<Vec<Vec<Field>>> {
    let mut rows = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let (fields, next) = decode_row(table, bytes, pos)?;
        rows.push(fields);
        pos = next;
    }
    Ok(rows)
}

/// Offset of the row following the one starting at `start`
///
/// Only tracks quoting; field contents are checked when the row is decoded.
fn row_end(table: &str, bytes: &[u8], start: usize) -> Result<usize> {
    let mut pos = start;
    let mut quoted = false;
    while let Some(&byte) = bytes.get(pos) {
        if quoted {
            if byte == b'"' {
                if bytes.get(pos + 1) == Some(&b'"') {
                    pos += 2;
                    continue;
                }
                quoted = false;
            }
        } else {
            match byte {
                b'"' => quoted = true,
                b'\n' => return Ok(pos + 1),
                _ => {}
            }
        }
        pos += 1;
    }
    if quoted {
        return Err(Error::malformed(table, start as u64, "unterminated quoted field"));
    }
    Ok(bytes.len())
}

/// Start offset of every row, strictly increasing
pub fn build_offsets(table: &str, bytes: &[u8]) -> Result<Vec<u64>> {
    let mut offsets = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        offsets.push(pos as u64);
        pos = row_end(table, bytes, pos)?;
    }
    Ok(offsets)
}
