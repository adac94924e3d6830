//! Append-only writer. A `Writer` owns the file exclusively for its whole
//! lifetime (spec.md's "no concurrent writers") and produces a valid file
//! only once `close()` runs to completion.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use crate::codec::{default_table, CodecTable, Value};
use crate::error::{ConfigError, FddError, LookupError, StateError};
use crate::index::{GeneralIndex, IndexKind, Key, KeylessIndex};
use crate::layout::{self, SectionTable};
use crate::row::{name_index_map, CellSource, ColumnDef, RowSetter, RowView};

/// Pending-setter count above which `close()` emits a diagnostic — a large
/// number of still-open partial rows usually indicates the caller forgot to
/// finish populating a columnar dataset before closing it.
pub const WARN_PENDING_SETTERS: usize = 1000;

/// The live row index's representation. Unlike a completed split (which may
/// also be `Sorted`), the index being appended to is always `Keyless` or
/// `General` — a binary-searchable `Sorted` index can only be built once,
/// from a finished key set.
enum LiveIndex {
    Keyless(KeylessIndex),
    General(GeneralIndex<Key>),
}

impl LiveIndex {
    fn len(&self) -> usize {
        match self {
            LiveIndex::Keyless(i) => i.len(),
            LiveIndex::General(i) => i.len(),
        }
    }

    fn contains_key(&self, key: &Key) -> bool {
        match self {
            LiveIndex::Keyless(i) => matches!(key, Key::Int(n) if *n >= 0 && i.contains_key(*n as usize)),
            LiveIndex::General(i) => i.contains_key(key),
        }
    }

    fn get(&self, key: &Key) -> Option<Vec<u64>> {
        match self {
            LiveIndex::Keyless(i) => match key {
                Key::Int(n) if *n >= 0 => i.get(*n as usize).map(|l| l.to_vec()),
                _ => None,
            },
            LiveIndex::General(i) => i.get(key).map(|l| l.to_vec()),
        }
    }

    fn insert(&mut self, key: &Key, offsets: &[u64]) -> Result<(), FddError> {
        match self {
            LiveIndex::Keyless(i) => match key {
                Key::Int(n) if *n >= 0 => i.set(*n as usize, offsets),
                _ => Err(ConfigError::InvalidOption("keyless row index requires integer positional keys".into()).into()),
            },
            LiveIndex::General(i) => i.insert_new(key.clone(), offsets),
        }
    }

    fn keys(&self) -> Vec<Key> {
        match self {
            LiveIndex::Keyless(i) => i.keys().map(|n| Key::Int(n as i128)).collect(),
            LiveIndex::General(i) => i.keys().cloned().collect(),
        }
    }

    fn into_index_kind(self) -> IndexKind {
        match self {
            LiveIndex::Keyless(i) => IndexKind::Keyless(i),
            LiveIndex::General(i) => IndexKind::General(i),
        }
    }
}

/// Choice of the live row index's representation, fixed at writer creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKeying {
    /// Keys are assigned positions `0, 1, 2, ...`; `set`'s key argument must
    /// equal the current row count.
    Keyless,
    /// Arbitrary hashable keys (the default).
    General,
}

#[derive(Clone)]
pub struct WriterOptions {
    pub columns: Option<Vec<ColumnDef>>,
    pub row_keying: RowKeying,
    pub overwrite: bool,
    pub allow_cell_modification: bool,
    pub offset_width: u8,
    pub codec_table: Arc<CodecTable>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            columns: None,
            row_keying: RowKeying::General,
            overwrite: false,
            allow_cell_modification: false,
            offset_width: crate::index::DEFAULT_WIDTH,
            codec_table: default_table(),
        }
    }
}

/// One row to append. `FromRow` copies a cell verbatim when it was never
/// decoded by the caller (cache miss) and re-encodes it when it was
/// (cache hit) — never a needless decode-then-re-encode round trip.
pub enum RowItem<'a> {
    Scalar(Value),
    Dict(HashMap<String, Value>),
    Tuple(Vec<Value>),
    FromRow(&'a RowView<'a>),
}

/// Where `make_split`/`add_to_split` draw their member rows from.
pub enum SplitSource<'a> {
    Keys(Vec<Value>),
    Predicate(Box<dyn Fn(&RowView) -> bool + 'a>),
}

pub fn create<P: AsRef<Path>>(path: P, options: WriterOptions) -> Result<Writer<File>, FddError> {
    let file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(options.overwrite)
        .create_new(!options.overwrite)
        .open(path)
        .map_err(FddError::Io)?;
    Writer::new(file, options)
}

/// Reopen a previously closed file for further appending. Parses the
/// existing trailer, loads every index/property into memory, and seeks to
/// the earliest metadata offset found in the section table so new rows
/// overwrite the old metadata region; a later `close()` re-emits
/// everything at the new tail and truncates away any leftover bytes.
pub fn reopen<P: AsRef<Path>>(path: P, options: WriterOptions) -> Result<Writer<File>, FddError> {
    let file = std::fs::OpenOptions::new().read(true).write(true).open(path).map_err(FddError::Io)?;
    Writer::from_existing(file, options)
}

pub struct Writer<W: Write + Seek + Read> {
    file: RefCell<W>,
    columns: Option<Vec<ColumnDef>>,
    name_to_index: Option<Arc<HashMap<String, usize>>>,
    row_index: LiveIndex,
    pending_setters: HashMap<Key, RowSetter>,
    splits: HashMap<String, IndexKind>,
    properties: HashMap<String, Value>,
    codec_table: Arc<CodecTable>,
    offset_width: u8,
    allow_cell_modification: bool,
    closed: bool,
}

impl<W: Write + Seek + Read> Writer<W> {
    pub fn new(file: W, options: WriterOptions) -> Result<Self, FddError> {
        let arity = options.columns.as_ref().map(|c| c.len() + 1).unwrap_or(2);
        let row_index = match options.row_keying {
            RowKeying::Keyless => LiveIndex::Keyless(KeylessIndex::new(options.offset_width, arity)),
            RowKeying::General => LiveIndex::General(GeneralIndex::new(options.offset_width, arity)),
        };
        let name_to_index = options.columns.as_ref().map(|c| Arc::new(name_index_map(c)));
        Ok(Self {
            file: RefCell::new(file),
            columns: options.columns,
            name_to_index,
            row_index,
            pending_setters: HashMap::new(),
            splits: HashMap::new(),
            properties: HashMap::new(),
            codec_table: options.codec_table,
            offset_width: options.offset_width,
            allow_cell_modification: options.allow_cell_modification,
            closed: false,
        })
    }

    /// Rebuild writer state from a closed file's trailer, resuming
    /// appends at the earliest metadata offset. A `Sorted` `all_rows`
    /// index (only possible if a prior writer built one directly — normal
    /// `close()` never does) is rehydrated into a `General` index, since
    /// the live row index must stay mutable.
    pub fn from_existing(mut file: W, options: WriterOptions) -> Result<Self, FddError> {
        let (table, table_start) = layout::read_trailer(&mut file)?;

        let columns = if let Some(range) = table.get(layout::TAG_COLUMN_DEF) {
            let bytes = layout::read_section(&mut file, range)?;
            Some(layout::decode_column_def(&bytes)?)
        } else {
            options.columns.clone()
        };
        let name_to_index = columns.as_ref().map(|c| Arc::new(name_index_map(c)));

        let mut properties = HashMap::new();
        for name in table.property_names() {
            let range = table.require(&layout::prop_tag(name))?;
            let bytes = layout::read_section(&mut file, range)?;
            let value = if bytes.is_empty() { Value::Null } else { options.codec_table.system().decode(&bytes)? };
            properties.insert(name.to_owned(), value);
        }

        let all_rows_range = table.require(&layout::split_tag("all_rows"))?;
        let all_rows_bytes = layout::read_section(&mut file, all_rows_range)?;
        let row_index = match IndexKind::from_bytes(&all_rows_bytes)? {
            IndexKind::Keyless(idx) => LiveIndex::Keyless(idx),
            IndexKind::General(idx) => LiveIndex::General(idx),
            IndexKind::Sorted(idx) => {
                let mut general = GeneralIndex::new(options.offset_width, idx.arity());
                for key in idx.keys() {
                    let offsets = idx.get(key).expect("key came from this index").to_vec();
                    general.insert_new(key.clone(), &offsets)?;
                }
                LiveIndex::General(general)
            }
        };

        let mut splits = HashMap::new();
        for name in table.split_names() {
            if name == "all_rows" {
                continue;
            }
            let range = table.require(&layout::split_tag(name))?;
            let bytes = layout::read_section(&mut file, range)?;
            splits.insert(name.to_owned(), IndexKind::from_bytes(&bytes)?);
        }

        let resume_at = table.all_ranges().map(|(start, _)| start).min().unwrap_or(table_start);
        file.seek(SeekFrom::Start(resume_at))?;

        Ok(Self {
            file: RefCell::new(file),
            columns,
            name_to_index,
            row_index,
            pending_setters: HashMap::new(),
            splits,
            properties,
            codec_table: options.codec_table,
            offset_width: options.offset_width,
            allow_cell_modification: options.allow_cell_modification,
            closed: false,
        })
    }

    fn arity(&self) -> usize {
        self.columns.as_ref().map(|c| c.len() + 1).unwrap_or(2)
    }

    fn codec_at(&self, index: usize) -> Arc<dyn crate::codec::Codec> {
        match &self.columns {
            Some(cols) => match &cols[index].codec {
                crate::codec::CodecSpec::Any => self.codec_table.system().clone(),
                other => other.codec(),
            },
            None => self.codec_table.system().clone(),
        }
    }

    fn cells_for_dict(&self, mut map: HashMap<String, Value>) -> Result<Vec<Vec<u8>>, FddError> {
        let columns = self.columns.as_ref().ok_or(crate::error::SchemaError::Schemaless)?;
        columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let v = map.remove(&c.name).unwrap_or(Value::Null);
                self.codec_at(i).encode(&v).map_err(FddError::from)
            })
            .collect()
    }

    fn cells_for_tuple(&self, vals: Vec<Value>) -> Result<Vec<Vec<u8>>, FddError> {
        let columns = self.columns.as_ref().ok_or(crate::error::SchemaError::Schemaless)?;
        if vals.len() != columns.len() {
            return Err(crate::error::SchemaError::Arity { expected: columns.len(), given: vals.len() }.into());
        }
        vals.iter().enumerate().map(|(i, v)| self.codec_at(i).encode(v).map_err(FddError::from)).collect()
    }

    fn cells_from_row(&self, row: &RowView) -> Result<Vec<Vec<u8>>, FddError> {
        (0..row.arity()).map(|i| row.raw_bytes_for_copy(i)).collect()
    }

    /// Append `cells` (one per column, `Scalar` rows have exactly one) to
    /// the file and register `key -> offsets` in the live row index.
    fn append_row(&mut self, key: Key, cells: Vec<Vec<u8>>) -> Result<(), FddError> {
        if self.closed {
            return Err(StateError::AppendAfterClose.into());
        }
        let mut file = self.file.borrow_mut();
        let mut offsets = Vec::with_capacity(cells.len() + 1);
        offsets.push(file.stream_position()?);
        for cell in &cells {
            file.write_all(cell)?;
            offsets.push(file.stream_position()?);
        }
        drop(file);
        self.row_index.insert(&key, &offsets)
    }

    pub fn set(&mut self, key: Value, item: RowItem) -> Result<(), FddError> {
        let key = Key::try_from(&key)?;
        if self.row_index.contains_key(&key) || self.pending_setters.contains_key(&key) {
            return Err(LookupError::DuplicateKey.into());
        }
        let cells = match item {
            RowItem::Scalar(v) => vec![self.codec_at(0).encode(&v)?],
            RowItem::Dict(map) => self.cells_for_dict(map)?,
            RowItem::Tuple(vals) => self.cells_for_tuple(vals)?,
            RowItem::FromRow(row) => self.cells_from_row(row)?,
        };
        self.append_row(key, cells)
    }

    /// Return the row's current offsets and cached bytes-in-flight as a
    /// `RowView` when the key is already complete, or hand back a mutable
    /// `RowSetter` for a new or in-progress columnar row. Schemaless
    /// writers never create setters — every `set` call there is already a
    /// complete row.
    pub fn get_or_create_setter(&mut self, key: Value) -> Result<&mut RowSetter, FddError> {
        let key = Key::try_from(&key)?;
        if self.row_index.contains_key(&key) {
            return Err(LookupError::DuplicateKey.into());
        }
        let name_to_index = self
            .name_to_index
            .clone()
            .ok_or(crate::error::SchemaError::Schemaless)?;
        let arity = self.arity() - 1;
        if !self.pending_setters.contains_key(&key) {
            self.pending_setters.insert(key.clone(), RowSetter::new(name_to_index, arity));
        }
        Ok(self.pending_setters.get_mut(&key).unwrap())
    }

    /// Finalize a pending setter, writing whatever was set (missing columns
    /// become empty cells). Called automatically by `get_or_create_setter`
    /// callers once a setter reports completion, and by `close()` for
    /// anything still open.
    pub fn finalize_setter(&mut self, key: Value) -> Result<(), FddError> {
        let key = Key::try_from(&key)?;
        let setter = self.pending_setters.remove(&key).ok_or(LookupError::KeyNotFound)?;
        let arity = self.arity() - 1;
        let mut values = setter.finalize()?;
        let cells = (0..arity)
            .map(|i| {
                let v = values.remove(&i).unwrap_or(Value::Null);
                self.codec_at(i).encode(&v).map_err(FddError::from)
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.append_row(key, cells)
    }

    /// Append a row built from an existing `RowView`'s cells (copied
    /// verbatim, no re-decode) plus one additional already-encoded cell.
    /// Used by `add_column` to extend a schema without touching the rest
    /// of a row's bytes.
    pub fn append_row_with_extra(&mut self, key: Value, base: &RowView, extra: Vec<u8>) -> Result<(), FddError> {
        let key = Key::try_from(&key)?;
        if self.row_index.contains_key(&key) || self.pending_setters.contains_key(&key) {
            return Err(LookupError::DuplicateKey.into());
        }
        let mut cells = self.cells_from_row(base)?;
        cells.push(extra);
        self.append_row(key, cells)
    }

    pub fn set_property(&mut self, name: &str, value: Value) {
        self.properties.insert(name.to_owned(), value);
    }

    pub fn get_property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn remove_property(&mut self, name: &str) -> Option<Value> {
        self.properties.remove(name)
    }

    /// Eagerly read every cell of an already-written row — used to build a
    /// throwaway `RowView` for split predicates. Writer-side rows are never
    /// large enough in number to need lazy per-cell I/O here the way a
    /// `Reader`'s do, since this only runs while building a split.
    fn read_cells(&self, offsets: &[u64]) -> Result<Vec<Vec<u8>>, FddError> {
        let mut file = self.file.borrow_mut();
        offsets
            .windows(2)
            .map(|w| {
                file.seek(SeekFrom::Start(w[0]))?;
                let mut buf = vec![0u8; (w[1] - w[0]) as usize];
                file.read_exact(&mut buf)?;
                Ok(buf)
            })
            .collect()
    }

    /// Build (or replace) a named split from an explicit key list or a
    /// predicate evaluated against every already-written row. `preserve_order`
    /// defaults the split to `General` (insertion order); passing `false`
    /// attempts the binary-searchable `Sorted` variant instead, falling back
    /// to `General` when the keys aren't comparable.
    pub fn make_split(
        &mut self,
        name: &str,
        rows: SplitSource,
        overwrite: bool,
        keyless: bool,
        preserve_order: bool,
    ) -> Result<(), FddError> {
        if self.splits.contains_key(name) && !overwrite {
            return Err(LookupError::SplitExists(name.to_owned()).into());
        }
        let keys: Vec<Key> = match rows {
            SplitSource::Keys(values) => values.iter().map(Key::try_from).collect::<Result<_, _>>()?,
            SplitSource::Predicate(pred) => {
                let mut matched = Vec::new();
                let columns = self.columns.clone().unwrap_or_default();
                for key in self.row_index.keys() {
                    let offsets = self.row_index.get(&key).unwrap();
                    let cells = self.read_cells(&offsets)?;
                    let source = OwnedCells(cells);
                    let row = RowView::new(&columns, &self.codec_table, &source);
                    if pred(&row) {
                        matched.push(key);
                    }
                }
                matched
            }
        };

        let arity = self.arity();
        let kind = if keyless {
            let mut idx = KeylessIndex::new(self.offset_width, arity);
            for key in &keys {
                let offsets = self.row_index.get(key).ok_or(LookupError::KeyNotFound)?;
                idx.push(&offsets)?;
            }
            IndexKind::Keyless(idx)
        } else if !preserve_order && keys.iter().all(|k| matches!(k, Key::Str(_) | Key::Int(_))) {
            let entries = keys
                .iter()
                .map(|k| self.row_index.get(k).map(|o| (k.clone(), o)).ok_or(LookupError::KeyNotFound))
                .collect::<Result<Vec<_>, _>>()?;
            IndexKind::Sorted(crate::index::SortedIndex::build(self.offset_width, arity, entries))
        } else {
            // `set`, not `insert_new`: a repeated key in `rows` keeps its
            // last occurrence rather than erroring, same as building the
            // dict comprehension the original keys the split from.
            let mut general = GeneralIndex::new(self.offset_width, arity);
            for key in &keys {
                let offsets = self.row_index.get(key).ok_or(LookupError::KeyNotFound)?;
                general.set(key.clone(), &offsets)?;
            }
            IndexKind::General(general)
        };

        self.splits.insert(name.to_owned(), kind);
        Ok(())
    }

    pub fn add_to_split(&mut self, name: &str, rows: SplitSource) -> Result<(), FddError> {
        let existing = self.splits.remove(name).ok_or_else(|| LookupError::SplitNotFound(name.to_owned()))?;
        let mut keys = existing.keys();
        let new_keys: Vec<Key> = match rows {
            SplitSource::Keys(values) => values.iter().map(Key::try_from).collect::<Result<_, _>>()?,
            SplitSource::Predicate(pred) => {
                let mut matched = Vec::new();
                let columns = self.columns.clone().unwrap_or_default();
                for key in self.row_index.keys() {
                    if keys.contains(&key) {
                        continue;
                    }
                    let offsets = self.row_index.get(&key).unwrap();
                    let cells = self.read_cells(&offsets)?;
                    let source = OwnedCells(cells);
                    let row = RowView::new(&columns, &self.codec_table, &source);
                    if pred(&row) {
                        matched.push(key);
                    }
                }
                matched
            }
        };
        keys.extend(new_keys);
        let keyless = matches!(existing, IndexKind::Keyless(_));
        let preserve_order = !matches!(existing, IndexKind::Sorted(_));
        self.splits.insert(name.to_owned(), existing);
        self.make_split(
            name,
            SplitSource::Keys(keys.into_iter().map(key_to_value).collect()),
            true,
            keyless,
            preserve_order,
        )
    }

    /// Flush every unfinished setter, write every section, the section
    /// table, and the 8-byte trailer, then truncate to the final length.
    pub fn close(mut self) -> Result<(), FddError>
    where
        W: Truncate,
    {
        if self.pending_setters.len() > WARN_PENDING_SETTERS {
            warn!(count = self.pending_setters.len(), "closing with a large number of unfinished row setters");
        }
        let pending_keys: Vec<Key> = self.pending_setters.keys().cloned().collect();
        for key in pending_keys {
            self.finalize_setter(key_to_value(key))?;
        }

        let mut table = SectionTable::new();
        if let Some(columns) = &self.columns {
            let range = layout::write_section(&mut *self.file.borrow_mut(), &layout::encode_column_def(columns)?)?;
            table.insert(layout::TAG_COLUMN_DEF, range);
            let names = columns.iter().map(|c| c.name.clone()).collect::<Vec<_>>();
            let bytes = serde_json::to_vec(&names).map_err(|e| crate::error::FormatError::CorruptSectionTable(e.to_string()))?;
            let range = layout::write_section(&mut *self.file.borrow_mut(), &bytes)?;
            table.insert(layout::TAG_COLUMNS, range);
        }

        for (name, value) in &self.properties {
            let bytes = self.codec_table.system().encode(value)?;
            let range = layout::write_section(&mut *self.file.borrow_mut(), &bytes)?;
            table.insert(layout::prop_tag(name), range);
        }

        let new_general_index = LiveIndex::General(GeneralIndex::new(self.offset_width, self.arity()));
        let row_index_kind = std::mem::replace(&mut self.row_index, new_general_index);
        let row_index_kind = row_index_kind.into_index_kind();
        let bytes = row_index_kind.to_bytes()?;
        let range = layout::write_section(&mut *self.file.borrow_mut(), &bytes)?;
        table.insert(layout::split_tag("all_rows"), range);

        for (name, kind) in &self.splits {
            let bytes = kind.to_bytes()?;
            let range = layout::write_section(&mut *self.file.borrow_mut(), &bytes)?;
            table.insert(layout::split_tag(name), range);
        }

        layout::write_trailer(&mut *self.file.borrow_mut(), &table)?;
        let final_len = self.file.borrow_mut().stream_position()?;
        self.file.borrow_mut().truncate_to(final_len)?;
        self.closed = true;
        Ok(())
    }
}

/// Eagerly-read row cells wrapped as a `CellSource` for split predicates.
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

fn key_to_value(key: Key) -> Value {
    match key {
        Key::Int(i) => Value::Int(i),
        Key::Str(s) => Value::Str(s),
        Key::Bytes(b) => Value::Bytes(b),
    }
}

/// Truncate a file-like sink to exactly `len` bytes. `Writer::close` needs
/// this to discard leftover bytes from a prior `reopen` whose old metadata
/// was longer than the freshly written metadata.
pub trait Truncate {
    fn truncate_to(&mut self, len: u64) -> std::io::Result<()>;
}

impl Truncate for File {
    fn truncate_to(&mut self, len: u64) -> std::io::Result<()> {
        self.set_len(len)
    }
}

/// Lets tests hold a `Writer<&mut Cursor<Vec<u8>>>` so the buffer can be
/// reopened as a `Reader` afterward without moving it into the writer.
impl<T: Truncate + ?Sized> Truncate for &mut T {
    fn truncate_to(&mut self, len: u64) -> std::io::Result<()> {
        (**self).truncate_to(len)
    }
}

/// Single crate-wide impl for the in-memory test harness type — every
/// module's tests share this one rather than each defining their own
/// (the trait is only implemented once per concrete type, crate-wide).
#[cfg(test)]
impl Truncate for std::io::Cursor<Vec<u8>> {
    fn truncate_to(&mut self, len: u64) -> std::io::Result<()> {
        self.get_mut().truncate(len as usize);
        Ok(())
    }
}

impl<W: Write + Seek + Read> Drop for Writer<W> {
    fn drop(&mut self) {
        if !self.closed {
            warn!("Writer dropped without close() — the file is not valid FDD until close() completes");
        }
    }
}
