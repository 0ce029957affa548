//! Table Codec
//!
//! Every archive table is a sequence of comma separated rows. Rows are the
//! unit of random access: each table keeps an index of row start offsets so
//! that a byte span recorded in a `definition` or `record` row can be turned
//! back into a row range with a binary search.
//!
//! ## Line format
//!
//! ```text
//! 0,0,1,0,2,0,5,0,1,0,6,6,6,"colors","Sizes, colours and ""quotes"""\n
//! ```
//!
//! - Integers are written bare, strings are always quoted (`""` escapes `"`)
//! - Rows end with `\n`; `\r\n` is accepted on decode
//! - An unquoted empty field decodes as an empty string
//!
//! `Field` is the only untyped representation; typed rows go through
//! [`TableRow`].

pub mod codec;
pub mod index;
pub mod rows;

pub use codec::{build_offsets, decode, encode};
pub use index::{ByteSpan, Table, TableBuffer};
pub use rows::{DefinitionEntry, RecordEntry};

use bucket_core::{Error, Result};

/// One decoded field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Int(i64),
    Str(String),
}

impl From<i64> for Field {
    fn from(value: i64) -> Self {
        Field::Int(value)
    }
}

impl From<u64> for Field {
    fn from(value: u64) -> Self {
        Field::Int(value as i64)
    }
}

impl From<usize> for Field {
    fn from(value: usize) -> Self {
        Field::Int(value as i64)
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::Str(value.to_string())
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Field::Str(value)
    }
}

/// Typed row of a named table
pub trait TableRow: Sized {
    /// Table (and archive entry) name
    const TABLE: &'static str;

    /// Number of stored fields
    const ARITY: usize;

    /// Stored fields; the row index is never stored
    fn to_fields(&self) -> Vec<Field>;

    /// Rebuild a row at `index` within its readout
    fn from_fields(index: usize, fields: &mut FieldCursor) -> Result<Self>;
}

/// Sequential typed access to a decoded row
///
/// Errors carry the table name and the byte offset of the row.
pub struct FieldCursor {
    table: &'static str,
    offset: u64,
    fields: std::vec::IntoIter<Field>,
    position: usize,
}

impl FieldCursor {
    /// Wrap a decoded row, checking its arity
    pub fn new(
        table: &'static str,
        offset: u64,
        arity: usize,
        fields: Vec<Field>,
    ) -> Result<Self> {
        if fields.len() != arity {
            return Err(Error::malformed(
                table,
                offset,
                format!("expected {} fields, got {}", arity, fields.len()),
            ));
        }
        Ok(Self {
            table,
            offset,
            fields: fields.into_iter(),
            position: 0,
        })
    }

    fn next_field(&mut self) -> Result<Field> {
        let position = self.position;
        self.position += 1;
        self.fields.next().ok_or_else(|| {
            Error::malformed(self.table, self.offset, format!("missing field {}", position))
        })
    }

    pub fn int(&mut self) -> Result<i64> {
        match self.next_field()? {
            Field::Int(value) => Ok(value),
            Field::Str(value) => Err(Error::malformed(
                self.table,
                self.offset,
                format!("field {} should be an integer, got {:?}", self.position - 1, value),
            )),
        }
    }

    pub fn uint(&mut self) -> Result<u64> {
        let value = self.int()?;
        u64::try_from(value).map_err(|_| {
            Error::malformed(
                self.table,
                self.offset,
                format!("field {} is negative ({})", self.position - 1, value),
            )
        })
    }

    pub fn index(&mut self) -> Result<usize> {
        let value = self.uint()?;
        usize::try_from(value).map_err(|_| {
            Error::malformed(self.table, self.offset, format!("index {} too large", value))
        })
    }

    pub fn string(&mut self) -> Result<String> {
        match self.next_field()? {
            Field::Str(value) => Ok(value),
            Field::Int(value) => Err(Error::malformed(
                self.table,
                self.offset,
                format!("field {} should be a string, got {}", self.position - 1, value),
            )),
        }
    }

    pub fn span(&mut self) -> Result<ByteSpan> {
        let start = self.uint()?;
        let end = self.uint()?;
        if end < start {
            return Err(Error::malformed(
                self.table,
                self.offset,
                format!("span {}..{} ends before it starts", start, end),
            ));
        }
        Ok(ByteSpan { start, end })
    }
}

/// Decode a typed row from raw fields
pub fn typed_row<T: TableRow>(index: usize, offset: u64, fields: Vec<Field>) -> Result<T> {
    let mut cursor = FieldCursor::new(T::TABLE, offset, T::ARITY, fields)?;
    T::from_fields(index, &mut cursor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_arity() {
        let err = FieldCursor::new("goal", 7, 3, vec![Field::Int(1)]).err().unwrap();
        assert!(matches!(err, Error::MalformedTable { offset: 7, .. }));
    }

    #[test]
    fn test_cursor_kinds() {
        let mut cursor = FieldCursor::new(
            "goal",
            0,
            3,
            vec![Field::Int(-1), "a".into(), Field::Int(2)],
        )
        .unwrap();
        assert_eq!(cursor.int().unwrap(), -1);
        assert_eq!(cursor.string().unwrap(), "a");
        assert!(cursor.string().is_err());
    }

    #[test]
    fn test_cursor_rejects_negative_index() {
        let mut cursor = FieldCursor::new("axis", 0, 1, vec![Field::Int(-3)]).unwrap();
        assert!(matches!(cursor.index(), Err(Error::MalformedTable { .. })));
    }

    #[test]
    fn test_cursor_span() {
        let fields = vec![0u64.into(), 10u64.into(), 9u64.into(), 3u64.into()];
        let mut cursor = FieldCursor::new("definition", 0, 4, fields).unwrap();
        assert_eq!(cursor.span().unwrap(), ByteSpan { start: 0, end: 10 });
        assert!(cursor.span().is_err());
    }
}
