//! Row view and partial-row builder.
//!
//! A row is `C+1` strictly non-decreasing offsets; cell `i` spans
//! `[offsets[i], offsets[i+1])` of the underlying file. [`RowView`] decodes
//! cells lazily and caches the decoded [`Value`] the first time each column
//! is touched. [`RowSetter`] accumulates a partial row by column name before
//! it is written out by a `Writer`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use crate::codec::{CodecSpec, CodecTable, Value};
use crate::error::{FddError, SchemaError, StateError};

/// One column's name and codec, in schema order. Index in the owning
/// `Vec<ColumnDef>` is the column's position.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub codec: CodecSpec,
}

/// Schema-wide `name -> index` map, shared (not rebuilt per row) between a
/// `RowView`'s parent and every `RowSetter` it creates.
pub fn name_index_map(columns: &[ColumnDef]) -> HashMap<String, usize> {
    columns.iter().enumerate().map(|(i, c)| (c.name.clone(), i)).collect()
}

/// Backing store a `RowView` reads cells from and, if permitted, writes
/// same-width overwrites back into. Implemented by `reader::Reader` and by
/// a `Writer`'s still-open pending row.
pub trait CellSource {
    /// Raw bytes of cell `index`. Empty iff the cell's span is zero-length.
    fn cell_bytes(&self, index: usize) -> Result<Vec<u8>, FddError>;

    /// Length in bytes of cell `index`'s current on-disk span, without
    /// reading the payload.
    fn cell_len(&self, index: usize) -> Result<usize, FddError>;

    /// Replace cell `index`'s bytes in place. Implementations must reject a
    /// length that differs from `cell_len(index)` with
    /// `StateError::CellSizeMismatch`, and must reject the call entirely
    /// with `StateError::ReadOnly` when modification isn't permitted.
    fn overwrite_cell(&self, index: usize, bytes: &[u8]) -> Result<(), FddError>;
}

// ── RowView ──────────────────────────────────────────────────────────────────

/// A single row, decoded lazily and cached column-by-column.
pub struct RowView<'p> {
    columns: &'p [ColumnDef],
    codec_table: &'p CodecTable,
    source: &'p dyn CellSource,
    cache: RefCell<Vec<Option<Value>>>,
}

impl<'p> RowView<'p> {
    pub fn new(columns: &'p [ColumnDef], codec_table: &'p CodecTable, source: &'p dyn CellSource) -> Self {
        Self { columns, codec_table, source, cache: RefCell::new(vec![None; columns.len()]) }
    }

    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    fn codec_for(&self, index: usize) -> Arc<dyn crate::codec::Codec> {
        match &self.columns[index].codec {
            CodecSpec::Any => self.codec_table.system().clone(),
            other => other.codec(),
        }
    }

    /// Decode column `index`, filling and returning from the cache on repeat
    /// access. An empty byte range always decodes to `Value::Null`.
    pub fn get(&self, index: usize) -> Result<Value, FddError> {
        if index >= self.columns.len() {
            return Err(SchemaError::UnknownColumn(format!("#{index}")).into());
        }
        if let Some(v) = self.cache.borrow()[index].clone() {
            return Ok(v);
        }
        let bytes = self.source.cell_bytes(index)?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            self.codec_for(index).decode(&bytes)?
        };
        self.cache.borrow_mut()[index] = Some(value.clone());
        Ok(value)
    }

    pub fn get_named(&self, name: &str) -> Result<Value, FddError> {
        let index = self.index_of(name)?;
        self.get(index)
    }

    fn index_of(&self, name: &str) -> Result<usize, FddError> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| SchemaError::UnknownColumn(name.to_owned()).into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn values(&self) -> Result<Vec<Value>, FddError> {
        (0..self.columns.len()).map(|i| self.get(i)).collect()
    }

    pub fn items(&self) -> Result<Vec<(String, Value)>, FddError> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, c)| Ok((c.name.clone(), self.get(i)?)))
            .collect()
    }

    pub fn as_dict(&self) -> Result<HashMap<String, Value>, FddError> {
        Ok(self.items()?.into_iter().collect())
    }

    /// Overwrite a named cell in place. Only valid against a source that
    /// permits modification; re-encoding to a different byte length fails
    /// without touching the file (`StateError::CellSizeMismatch`).
    /// Bytes for copying this cell into another row without a needless
    /// decode/re-encode round trip: if the value was already decoded
    /// (cache hit) it is re-encoded, otherwise the raw on-disk bytes are
    /// returned untouched.
    pub fn raw_bytes_for_copy(&self, index: usize) -> Result<Vec<u8>, FddError> {
        if let Some(v) = self.cache.borrow()[index].clone() {
            return Ok(self.codec_for(index).encode(&v)?);
        }
        self.source.cell_bytes(index)
    }

    pub fn set_named(&self, name: &str, value: Value) -> Result<(), FddError> {
        let index = self.index_of(name)?;
        let encoded = self.codec_for(index).encode(&value)?;
        let existing_len = self.source.cell_len(index)?;
        if encoded.len() != existing_len {
            return Err(StateError::CellSizeMismatch { existing: existing_len, new: encoded.len() }.into());
        }
        self.source.overwrite_cell(index, &encoded)?;
        self.cache.borrow_mut()[index] = Some(value);
        Ok(())
    }
}

// ── RowSetter ────────────────────────────────────────────────────────────────

/// Partial-row builder. Created by a `Writer` the first time an absent key
/// is requested against a columnar schema; tracks which columns have been
/// set and auto-finalizes once every column is present.
#[derive(Debug)]
pub struct RowSetter {
    values: HashMap<usize, Value>,
    name_to_index: Arc<HashMap<String, usize>>,
    arity: usize,
    finalized: bool,
}

impl RowSetter {
    pub fn new(name_to_index: Arc<HashMap<String, usize>>, arity: usize) -> Self {
        Self { values: HashMap::new(), name_to_index, arity, finalized: false }
    }

    /// Record `value` for the named column. Returns `true` if this set
    /// completed the row (all `arity` columns now present) — the caller
    /// (`Writer`) must finalize immediately in that case.
    pub fn set_named(&mut self, name: &str, value: Value) -> Result<bool, FddError> {
        if self.finalized {
            return Err(StateError::AlreadyFinalized.into());
        }
        let index = *self
            .name_to_index
            .get(name)
            .ok_or_else(|| SchemaError::UnknownColumn(name.to_owned()))?;
        self.values.insert(index, value);
        Ok(self.is_complete())
    }

    pub fn is_complete(&self) -> bool {
        self.values.len() == self.arity
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Consume the setter, returning `index -> Value` for every column that
    /// was set. Columns never set are left absent — the caller treats a
    /// missing index as an empty cell.
    pub fn finalize(mut self) -> Result<HashMap<usize, Value>, FddError> {
        if self.finalized {
            return Err(StateError::AlreadyFinalized.into());
        }
        self.finalized = true;
        Ok(std::mem::take(&mut self.values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecTable;
    use std::cell::RefCell as StdRefCell;

    struct FakeSource {
        cells: Vec<Vec<u8>>,
        writable: bool,
        overwritten: StdRefCell<Vec<(usize, Vec<u8>)>>,
    }

    impl CellSource for FakeSource {
        fn cell_bytes(&self, index: usize) -> Result<Vec<u8>, FddError> {
            Ok(self.cells[index].clone())
        }
        fn cell_len(&self, index: usize) -> Result<usize, FddError> {
            Ok(self.cells[index].len())
        }
        fn overwrite_cell(&self, index: usize, bytes: &[u8]) -> Result<(), FddError> {
            if !self.writable {
                return Err(StateError::ReadOnly.into());
            }
            if bytes.len() != self.cells[index].len() {
                return Err(StateError::CellSizeMismatch {
                    existing: self.cells[index].len(),
                    new: bytes.len(),
                }
                .into());
            }
            self.overwritten.borrow_mut().push((index, bytes.to_vec()));
            Ok(())
        }
    }

    fn schema() -> Vec<ColumnDef> {
        vec![
            ColumnDef { name: "a".into(), codec: CodecSpec::Str },
            ColumnDef { name: "b".into(), codec: CodecSpec::I32 },
        ]
    }

    #[test]
    fn lazy_decode_and_cache() {
        let columns = schema();
        let table = CodecTable::default();
        let source = FakeSource { cells: vec![b"hi".to_vec(), 7i32.to_le_bytes().to_vec()], writable: false, overwritten: StdRefCell::new(vec![]) };
        let row = RowView::new(&columns, &table, &source);
        assert_eq!(row.get_named("a").unwrap(), Value::Str("hi".into()));
        assert_eq!(row.get(1).unwrap(), Value::Int(7));
        assert!(row.contains("b"));
        assert!(!row.contains("z"));
    }

    #[test]
    fn empty_cell_is_null() {
        let columns = schema();
        let table = CodecTable::default();
        let source = FakeSource { cells: vec![vec![], vec![]], writable: false, overwritten: StdRefCell::new(vec![]) };
        let row = RowView::new(&columns, &table, &source);
        assert_eq!(row.get(0).unwrap(), Value::Null);
    }

    #[test]
    fn overwrite_same_width_succeeds() {
        let columns = schema();
        let table = CodecTable::default();
        let source = FakeSource { cells: vec![b"hi".to_vec(), 7i32.to_le_bytes().to_vec()], writable: true, overwritten: StdRefCell::new(vec![]) };
        let row = RowView::new(&columns, &table, &source);
        row.set_named("a", Value::Str("by".into())).unwrap();
        assert_eq!(source.overwritten.borrow().len(), 1);
    }

    #[test]
    fn overwrite_different_width_fails_without_touching_source() {
        let columns = schema();
        let table = CodecTable::default();
        let source = FakeSource { cells: vec![b"hi".to_vec(), 7i32.to_le_bytes().to_vec()], writable: true, overwritten: StdRefCell::new(vec![]) };
        let row = RowView::new(&columns, &table, &source);
        let err = row.set_named("a", Value::Str("much longer".into())).unwrap_err();
        assert!(matches!(err, FddError::State(StateError::CellSizeMismatch { .. })));
        assert!(source.overwritten.borrow().is_empty());
    }

    #[test]
    fn row_setter_auto_completes() {
        let columns = schema();
        let map = Arc::new(name_index_map(&columns));
        let mut setter = RowSetter::new(map, 2);
        assert!(!setter.set_named("a", Value::Str("x".into())).unwrap());
        assert!(setter.set_named("b", Value::Int(1)).unwrap());
        let values = setter.finalize().unwrap();
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn row_setter_rejects_unknown_column() {
        let columns = schema();
        let map = Arc::new(name_index_map(&columns));
        let mut setter = RowSetter::new(map, 2);
        assert!(setter.set_named("zzz", Value::Null).is_err());
    }

    #[test]
    fn row_setter_rejects_use_after_finalize() {
        let columns = schema();
        let map = Arc::new(name_index_map(&columns));
        let mut setter = RowSetter::new(map, 2);
        setter.set_named("a", Value::Null).unwrap();
        let setter2 = RowSetter { finalized: true, ..setter };
        assert!(setter2.finalize().is_err());
    }
}
