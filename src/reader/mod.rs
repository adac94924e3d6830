//! Read-only, random-access view over a closed file.
//!
//! Opening parses the trailer (`layout`), loads the schema and every
//! property's byte range (lazily — values decode on first access), and
//! binds the requested split as the live index. Everything else — `get`,
//! splits, cell overwrite — is a lookup into that in-memory index plus a
//! seek-and-read against the file.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::codec::{default_table, CodecTable, Value};
use crate::error::{ConfigError, FddError, LookupError, SchemaError, StateError};
use crate::index::{GeneralIndex, IndexKind, Key};
use crate::layout::{self, SectionTable};
use crate::row::{CellSource, ColumnDef, RowView};

mod split_expr;
pub use split_expr::parse_split_expr;

#[derive(Clone)]
pub struct ReaderOptions {
    pub split: String,
    pub allow_cell_modification: bool,
    pub codec_table: Arc<CodecTable>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self { split: "all_rows".to_owned(), allow_cell_modification: false, codec_table: default_table() }
    }
}

/// Lazily-decoded property: the raw bytes are known at open time, the
/// value only once something asks for it.
struct PropertySlot {
    bytes: Vec<u8>,
    decoded: RefCell<Option<Value>>,
}

/// Wraps the open file descriptor with the PID it was opened under. Every
/// access re-checks `std::process::id()` and transparently reopens the
/// path across a fork — std has no `pthread_atfork` hook, so this is the
/// portable substitute.
pub struct FileHandle<R> {
    inner: RefCell<R>,
    path: Option<PathBuf>,
    opened_by_pid: u32,
}

impl FileHandle<File> {
    /// `allow_write` opens the file read-write so `overwrite_cell_at` can
    /// later succeed; plain read-only opens still work for every other
    /// operation, since nothing else ever writes through a `Reader`.
    fn open(path: &Path, allow_write: bool) -> Result<Self, FddError> {
        let file = std::fs::OpenOptions::new().read(true).write(allow_write).open(path)?;
        Ok(Self { inner: RefCell::new(file), path: Some(path.to_path_buf()), opened_by_pid: std::process::id() })
    }
}

impl<R: Read + Seek + Write> FileHandle<R> {
    pub fn wrap(inner: R) -> Self {
        Self { inner: RefCell::new(inner), path: None, opened_by_pid: std::process::id() }
    }

    /// Re-checks the creator PID and reopens from `path` if this handle
    /// crossed a fork boundary. No-op for in-memory / path-less handles.
    pub fn reopen_after_fork(&mut self) -> Result<(), FddError>
    where
        R: ReOpen,
    {
        let current = std::process::id();
        if current != self.opened_by_pid {
            if let Some(path) = &self.path {
                debug!(pid = current, "reopening file handle after fork");
                *self.inner.borrow_mut() = R::reopen(path)?;
                self.opened_by_pid = current;
            }
        }
        Ok(())
    }

    fn with_checked<T>(&self, f: impl FnOnce(&RefCell<R>) -> Result<T, FddError>) -> Result<T, FddError>
    where
        R: ReOpen,
    {
        if std::process::id() != self.opened_by_pid {
            if let Some(path) = &self.path {
                *self.inner.borrow_mut() = R::reopen(path)?;
            }
        }
        f(&self.inner)
    }
}

/// Types `FileHandle` can transparently reopen from a path after a fork.
pub trait ReOpen: Sized {
    fn reopen(path: &Path) -> Result<Self, FddError>;
}

impl ReOpen for File {
    /// Reopens read-write so a handle that allowed cell modification
    /// before a fork still allows it afterward.
    fn reopen(path: &Path) -> Result<Self, FddError> {
        std::fs::OpenOptions::new().read(true).write(true).open(path).map_err(FddError::Io)
    }
}

pub fn open<P: AsRef<Path>>(path: P, options: ReaderOptions) -> Result<Reader<File>, FddError> {
    let path = path.as_ref();
    let handle = FileHandle::open(path, options.allow_cell_modification)?;
    Reader::from_handle(handle, options)
}

pub struct Reader<R> {
    file: FileHandle<R>,
    columns: Option<Vec<ColumnDef>>,
    name_index: Option<HashMap<String, usize>>,
    properties: HashMap<String, PropertySlot>,
    table: SectionTable,
    live_index: IndexKind,
    live_split_name: String,
    codec_table: Arc<CodecTable>,
    allow_cell_modification: bool,
    /// Single-entry cache of the most recently looked-up row: its key,
    /// offsets, and already-read cell bytes. A repeat `get()` of the same
    /// key reuses these bytes instead of re-reading the file, mirroring
    /// the cached-row contract — a fresh `ReaderRow` is still handed back
    /// each call since Rust has no notion of returning one shared object
    /// behind a `&self` borrow, but its bytes come from the same cache.
    last_row_cache: RefCell<Option<(Key, Vec<u64>, Vec<Vec<u8>>)>>,
}

impl<R: Read + Seek + Write + ReOpen> Reader<R> {
    pub fn from_handle(handle: FileHandle<R>, options: ReaderOptions) -> Result<Self, FddError> {
        let (table, _tail) = handle.with_checked(|cell| Ok(layout::read_trailer(&mut *cell.borrow_mut())?))?;

        let columns = if let Some(range) = table.get(layout::TAG_COLUMN_DEF) {
            let bytes = handle.with_checked(|cell| layout::read_section(&mut *cell.borrow_mut(), range))?;
            Some(layout::decode_column_def(&bytes)?)
        } else {
            None
        };
        let name_index = columns.as_ref().map(|c| crate::row::name_index_map(c));

        let mut properties = HashMap::new();
        for name in table.property_names() {
            let range = table.require(&layout::prop_tag(name))?;
            let bytes = handle.with_checked(|cell| layout::read_section(&mut *cell.borrow_mut(), range))?;
            properties.insert(name.to_owned(), PropertySlot { bytes, decoded: RefCell::new(None) });
        }

        let mut reader = Self {
            file: handle,
            columns,
            name_index,
            properties,
            table,
            live_index: IndexKind::General(crate::index::GeneralIndex::new(crate::index::DEFAULT_WIDTH, 1)),
            live_split_name: String::new(),
            codec_table: options.codec_table,
            allow_cell_modification: options.allow_cell_modification,
            last_row_cache: RefCell::new(None),
        };
        reader.load_new_split(&options.split)?;
        Ok(reader)
    }

    fn arity(&self) -> usize {
        self.columns.as_ref().map(|c| c.len() + 1).unwrap_or(2)
    }

    pub fn len(&self) -> usize {
        self.live_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the currently loaded split is the positional `Keyless`
    /// variant — `MultiReader` uses this to decide whether `get` can take
    /// its fast virtual-position path across constituents.
    pub fn is_keyless_split(&self) -> bool {
        matches!(self.live_index, IndexKind::Keyless(_))
    }

    pub fn available_splits(&self) -> Vec<String> {
        self.table.split_names().map(|s| s.to_owned()).collect()
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.table.property_names()
    }

    pub fn columns(&self) -> Option<&[ColumnDef]> {
        self.columns.as_deref()
    }

    pub fn load_new_split(&mut self, expr: &str) -> Result<(), FddError> {
        let index = split_expr::resolve(self, expr)?;
        self.live_index = index;
        self.live_split_name = expr.to_owned();
        self.last_row_cache.borrow_mut().take();
        Ok(())
    }

    pub(crate) fn load_named_split(&self, name: &str) -> Result<IndexKind, FddError> {
        let range = self.table.require(&layout::split_tag(name))?;
        let bytes = self.file.with_checked(|cell| layout::read_section(&mut *cell.borrow_mut(), range))?;
        IndexKind::from_bytes(&bytes)
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        Key::try_from(key).map(|k| self.live_index.contains_key(&k)).unwrap_or(false)
    }

    pub fn keys(&self) -> Vec<Key> {
        self.live_index.keys()
    }

    fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>, FddError> {
        self.file.with_checked(|cell| {
            let mut f = cell.borrow_mut();
            f.seek(SeekFrom::Start(start))?;
            let mut buf = vec![0u8; (end - start) as usize];
            f.read_exact(&mut buf)?;
            Ok(buf)
        })
    }

    fn cells_for_offsets(&self, offsets: &[u64]) -> Result<Vec<Vec<u8>>, FddError> {
        offsets.windows(2).map(|w| self.read_range(w[0], w[1])).collect()
    }

    /// Resolve `key`, returning the matching row's cells as a `RowView`.
    /// If `key` isn't present but decomposes into `(row_key, column_name)`,
    /// the named cell is decoded and returned directly instead.
    pub fn get(&self, key: &Value) -> Result<RowOrCell<'_, R>, FddError> {
        let k = Key::try_from(key).ok();
        if let Some(k) = &k {
            if let Some(offsets) = self.live_index.get(k).map(|l| l.to_vec()) {
                let cached = self.last_row_cache.borrow();
                let reuse = cached.as_ref().filter(|(ck, co, _)| ck == k && co == &offsets).map(|(_, _, cc)| cc.clone());
                drop(cached);
                let cells = match reuse {
                    Some(cells) => cells,
                    None => self.cells_for_offsets(&offsets)?,
                };
                *self.last_row_cache.borrow_mut() = Some((k.clone(), offsets.clone(), cells.clone()));
                return Ok(RowOrCell::Row(ReaderRow {
                    reader: self,
                    key: k.clone(),
                    offsets,
                    cells: RefCell::new(cells.into_iter().map(Some).collect()),
                }));
            }
        }
        if let Some((row_key, column)) = decompose_row_column_key(key) {
            if let Some(offsets) = self.live_index.get(&row_key).map(|l| l.to_vec()) {
                let index = self
                    .name_index
                    .as_ref()
                    .and_then(|m| m.get(&column).copied())
                    .ok_or_else(|| SchemaError::UnknownColumn(column.clone()))?;
                let bytes = self.read_range(offsets[index], offsets[index + 1])?;
                let codec = self.columns.as_ref().expect("name_index implies columns")[index].codec.codec();
                let value = if bytes.is_empty() { Value::Null } else { codec.decode(&bytes)? };
                return Ok(RowOrCell::Cell(value));
            }
        }
        Err(LookupError::KeyNotFound.into())
    }

    pub fn get_cell(&self, key: &Value, column: &str) -> Result<Value, FddError> {
        match self.get(key)? {
            RowOrCell::Row(row) => row.row_view().get_named(column),
            RowOrCell::Cell(v) => Ok(v),
        }
    }

    pub fn property(&self, name: &str) -> Result<Value, FddError> {
        let slot = self.properties.get(name).ok_or_else(|| LookupError::SplitNotFound(name.to_owned()))?;
        if let Some(v) = slot.decoded.borrow().clone() {
            return Ok(v);
        }
        let v = if slot.bytes.is_empty() { Value::Null } else { self.codec_table.system().decode(&slot.bytes)? };
        *slot.decoded.borrow_mut() = Some(v.clone());
        Ok(v)
    }

    /// Rebuilds the currently loaded split as a `General` index keyed by
    /// `key_fn(row)` instead of each row's stored key, skipping rows for
    /// which `filter_fn` (if given) returns `false`. The rebuilt index
    /// takes over as the live index, same as `load_new_split`. A
    /// `Keyless`-backed source has no stable key identity to derive new
    /// keys from, so this is rejected rather than silently renumbering.
    pub fn load_keys<F, P>(&mut self, key_fn: F, filter_fn: Option<P>) -> Result<(), FddError>
    where
        F: Fn(&RowView) -> Value,
        P: Fn(&RowView) -> bool,
    {
        if matches!(self.live_index, IndexKind::Keyless(_)) {
            return Err(ConfigError::KeylessLoadKeys.into());
        }
        let arity = self.live_index.arity();
        let columns = self.columns.clone().unwrap_or_default();
        let mut rebuilt: GeneralIndex<Key> = GeneralIndex::new(crate::index::DEFAULT_WIDTH, arity);
        for key in self.live_index.keys() {
            let Some(offsets) = self.live_index.get(&key).map(|l| l.to_vec()) else { continue };
            let cells = self.cells_for_offsets(&offsets)?;
            let source = OwnedCells(cells);
            let row = RowView::new(&columns, &self.codec_table, &source);
            if let Some(filter) = &filter_fn {
                if !filter(&row) {
                    continue;
                }
            }
            let new_key = Key::try_from(&key_fn(&row))?;
            rebuilt.set(new_key, &offsets)?;
        }
        self.live_index = IndexKind::General(rebuilt);
        self.live_split_name = String::from("<load_keys>");
        self.last_row_cache.borrow_mut().take();
        Ok(())
    }

    fn overwrite_cell_at(&self, offsets: &[u64], index: usize, bytes: &[u8]) -> Result<(), FddError> {
        if !self.allow_cell_modification {
            return Err(crate::error::StateError::ReadOnly.into());
        }
        let (start, end) = (offsets[index], offsets[index + 1]);
        if bytes.len() as u64 != end - start {
            return Err(crate::error::StateError::CellSizeMismatch { existing: (end - start) as usize, new: bytes.len() }.into());
        }
        self.file.with_checked(|cell| {
            let mut f = cell.borrow_mut();
            f.seek(SeekFrom::Start(start))?;
            f.write_all(bytes)?;
            Ok(())
        })
    }
}

/// `Reader::get`'s result: a direct key hit resolves to a full row, a
/// `(row_key, column_name)` shape resolves straight to the decoded cell.
pub enum RowOrCell<'r, R> {
    Row(ReaderRow<'r, R>),
    Cell(Value),
}

/// Recognizes the `(row_key, column_name)` shape: a two-element JSON array
/// whose second element is a string. Only `Str`/`Int`-shaped row keys are
/// supported this way — `Bytes` keys have no unambiguous JSON literal.
fn decompose_row_column_key(key: &Value) -> Option<(Key, String)> {
    let Value::Any(serde_json::Value::Array(items)) = key else { return None };
    let [row_key, column] = <[serde_json::Value; 2]>::try_from(items.clone()).ok()?;
    let serde_json::Value::String(column) = column else { return None };
    let row_key = match row_key {
        serde_json::Value::String(s) => Key::Str(s),
        serde_json::Value::Number(n) => Key::Int(n.as_i64()? as i128),
        _ => return None,
    };
    Some((row_key, column))
}

/// A resolved row: owns its offsets and already-read cell bytes, exposed
/// as a `RowView` for lazy decode/cache.
pub struct ReaderRow<'r, R> {
    reader: &'r Reader<R>,
    key: Key,
    offsets: Vec<u64>,
    cells: RefCell<Vec<Option<Vec<u8>>>>,
}

impl<'r, R: Read + Seek + Write + ReOpen> ReaderRow<'r, R> {
    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn row_view(&self) -> RowView<'_> {
        let columns = self.reader.columns.as_deref().unwrap_or(&[]);
        RowView::new(columns, &self.reader.codec_table, self)
    }
}

impl<'r, R: Read + Seek + Write + ReOpen> CellSource for ReaderRow<'r, R> {
    fn cell_bytes(&self, index: usize) -> Result<Vec<u8>, FddError> {
        if let Some(b) = self.cells.borrow()[index].clone() {
            return Ok(b);
        }
        let (start, end) = (self.offsets[index], self.offsets[index + 1]);
        let bytes = self.reader.read_range(start, end)?;
        self.cells.borrow_mut()[index] = Some(bytes.clone());
        Ok(bytes)
    }

    fn cell_len(&self, index: usize) -> Result<usize, FddError> {
        Ok((self.offsets[index + 1] - self.offsets[index]) as usize)
    }

    fn overwrite_cell(&self, index: usize, bytes: &[u8]) -> Result<(), FddError> {
        self.reader.overwrite_cell_at(&self.offsets, index, bytes)?;
        self.cells.borrow_mut()[index] = Some(bytes.to_vec());
        Ok(())
    }
}

/// Read-only view over already-read cell bytes, used by `load_keys` to
/// build a `RowView` without re-seeking through a `ReaderRow`.
struct OwnedCells(Vec<Vec<u8>>);
impl CellSource for OwnedCells {
    fn cell_bytes(&self, index: usize) -> Result<Vec<u8>, FddError> {
        Ok(self.0[index].clone())
    }
    fn cell_len(&self, index: usize) -> Result<usize, FddError> {
        Ok(self.0[index].len())
    }
    fn overwrite_cell(&self, _index: usize, _bytes: &[u8]) -> Result<(), FddError> {
        Err(StateError::ReadOnly.into())
    }
}

/// Single crate-wide impl for the in-memory test harness type — every
/// module's tests share this one (a `Cursor` never crosses a fork, so
/// reopening it is never exercised).
#[cfg(test)]
impl ReOpen for std::io::Cursor<Vec<u8>> {
    fn reopen(_path: &Path) -> Result<Self, FddError> {
        unreachable!("in-memory reader under test is never reopened")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{RowItem, SplitSource, WriterOptions};
    use std::io::Cursor;

    #[test]
    fn schemaless_round_trip_in_memory() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut w = crate::writer::Writer::new(&mut buf, WriterOptions::default()).unwrap();
            w.set(Value::Str("a".into()), RowItem::Scalar(Value::Str("hello".into()))).unwrap();
            w.set(Value::Str("b".into()), RowItem::Scalar(Value::Str("world".into()))).unwrap();
            w.close().unwrap();
        }
        let handle = FileHandle::wrap(buf);
        let reader = Reader::from_handle(handle, ReaderOptions::default()).unwrap();
        assert_eq!(reader.len(), 2);
        let row = match reader.get(&Value::Str("b".into())).unwrap() {
            RowOrCell::Row(row) => row,
            RowOrCell::Cell(_) => panic!("expected a row"),
        };
        assert_eq!(row.row_view().get(0).unwrap(), Value::Str("world".into()));
    }

    #[test]
    fn repeat_get_reuses_cached_row_bytes() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut w = crate::writer::Writer::new(&mut buf, WriterOptions::default()).unwrap();
            w.set(Value::Str("a".into()), RowItem::Scalar(Value::Str("hello".into()))).unwrap();
            w.close().unwrap();
        }
        let handle = FileHandle::wrap(buf);
        let reader = Reader::from_handle(handle, ReaderOptions::default()).unwrap();

        assert!(reader.last_row_cache.borrow().is_none());
        let first = match reader.get(&Value::Str("a".into())).unwrap() {
            RowOrCell::Row(row) => row.row_view().get(0).unwrap(),
            RowOrCell::Cell(_) => panic!("expected a row"),
        };
        let cached_after_first = reader.last_row_cache.borrow().clone();
        assert!(matches!(&cached_after_first, Some((k, _, _)) if *k == Key::Str("a".into())));

        let second = match reader.get(&Value::Str("a".into())).unwrap() {
            RowOrCell::Row(row) => row.row_view().get(0).unwrap(),
            RowOrCell::Cell(_) => panic!("expected a row"),
        };
        assert_eq!(first, second);
        // Same key twice in a row leaves the cache entry's bytes untouched.
        assert_eq!(cached_after_first, *reader.last_row_cache.borrow());
    }

    #[test]
    fn row_key_column_name_shape_resolves_direct_cell() {
        let mut buf = Cursor::new(Vec::new());
        let columns = vec![crate::row::ColumnDef { name: "label".into(), codec: crate::codec::CodecSpec::Str }];
        {
            let mut w = crate::writer::Writer::new(
                &mut buf,
                WriterOptions { columns: Some(columns), ..WriterOptions::default() },
            )
            .unwrap();
            let mut row = HashMap::new();
            row.insert("label".to_string(), Value::Str("x".into()));
            w.set(Value::Str("a".into()), RowItem::Dict(row)).unwrap();
            w.close().unwrap();
        }
        let handle = FileHandle::wrap(buf);
        let reader = Reader::from_handle(handle, ReaderOptions::default()).unwrap();
        let key = Value::Any(serde_json::json!(["a", "label"]));
        match reader.get(&key).unwrap() {
            RowOrCell::Cell(v) => assert_eq!(v, Value::Str("x".into())),
            RowOrCell::Row(_) => panic!("expected a direct cell"),
        }
    }

    #[test]
    fn missing_key_is_lookup_error() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut w = crate::writer::Writer::new(&mut buf, WriterOptions::default()).unwrap();
            w.set(Value::Str("a".into()), RowItem::Scalar(Value::Null)).unwrap();
            w.close().unwrap();
        }
        let handle = FileHandle::wrap(buf);
        let reader = Reader::from_handle(handle, ReaderOptions::default()).unwrap();
        assert!(matches!(reader.get(&Value::Str("z".into())), Err(FddError::Lookup(LookupError::KeyNotFound))));
    }

    /// Stands in for a real `fork(2)`: forces `opened_by_pid` to a PID that
    /// isn't ours, then confirms `reopen_after_fork` transparently swaps in a
    /// fresh `File` from the same path and the handle keeps working.
    #[test]
    fn reopen_after_fork_recovers_a_stale_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fork.fdd");
        {
            let mut w = crate::writer::create(&path, WriterOptions::default()).unwrap();
            w.set(Value::Str("a".into()), RowItem::Scalar(Value::Str("hello".into()))).unwrap();
            w.close().unwrap();
        }

        let mut reader = open(&path, ReaderOptions::default()).unwrap();
        reader.file.opened_by_pid = reader.file.opened_by_pid.wrapping_add(1);
        reader.file.reopen_after_fork().unwrap();
        assert_eq!(reader.file.opened_by_pid, std::process::id());

        let row = match reader.get(&Value::Str("a".into())).unwrap() {
            RowOrCell::Row(row) => row,
            RowOrCell::Cell(_) => panic!("expected a row"),
        };
        assert_eq!(row.row_view().get(0).unwrap(), Value::Str("hello".into()));
    }

    #[test]
    fn load_keys_rekeys_by_column_value_and_applies_filter() {
        let mut buf = Cursor::new(Vec::new());
        let columns = vec![crate::row::ColumnDef { name: "n".into(), codec: crate::codec::CodecSpec::I32 }];
        {
            let mut w = crate::writer::Writer::new(
                &mut buf,
                WriterOptions { columns: Some(columns), ..WriterOptions::default() },
            )
            .unwrap();
            for (row_key, n) in [("a", 1), ("b", 2), ("c", 3)] {
                let mut row = HashMap::new();
                row.insert("n".to_string(), Value::Int(n));
                w.set(Value::Str(row_key.into()), RowItem::Dict(row)).unwrap();
            }
            w.close().unwrap();
        }
        let handle = FileHandle::wrap(buf);
        let mut reader = Reader::from_handle(handle, ReaderOptions::default()).unwrap();

        reader
            .load_keys(
                |row: &RowView| Value::Int(row.get_named("n").unwrap().as_int().unwrap() * 10),
                Some(|row: &RowView| row.get_named("n").unwrap().as_int().unwrap() != 2),
            )
            .unwrap();

        assert_eq!(reader.len(), 2);
        assert!(reader.contains_key(&Value::Int(10)));
        assert!(reader.contains_key(&Value::Int(30)));
        assert!(!reader.contains_key(&Value::Int(20)));
        assert!(!reader.contains_key(&Value::Str("a".into())));
    }

    #[test]
    fn load_keys_on_keyless_split_is_rejected() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut w = crate::writer::Writer::new(&mut buf, WriterOptions::default()).unwrap();
            w.set(Value::Int(0), RowItem::Scalar(Value::Str("x".into()))).unwrap();
            w.make_split("positional", SplitSource::Keys(vec![Value::Int(0)]), false, true, true).unwrap();
            w.close().unwrap();
        }
        let handle = FileHandle::wrap(buf);
        let mut reader = Reader::from_handle(handle, ReaderOptions::default()).unwrap();
        reader.load_new_split("positional").unwrap();
        assert!(reader.is_keyless_split());
        let err = reader.load_keys(|_: &RowView| Value::Int(0), None::<fn(&RowView) -> bool>).unwrap_err();
        assert!(matches!(err, FddError::Config(ConfigError::KeylessLoadKeys)));
    }
}
