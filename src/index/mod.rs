//! Packed index store — three memory-efficient encodings sharing one
//! packed little-endian integer buffer.
//!
//! [`IntList`] is the shared read view: given `(buffer, start, len, width)`,
//! `IntList::get(i)` reads a little-endian unsigned integer at
//! `start + i*width`. All three index kinds below store their row-offset
//! tuples in such a buffer and hand out `IntList` slices on lookup.

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::codec::Value;
use crate::error::{ConfigError, FddError, LookupError};

/// Default offset byte-width: 6 bytes supports files up to 2^48 bytes.
pub const DEFAULT_WIDTH: u8 = 6;

// ── Key ──────────────────────────────────────────────────────────────────────

/// A row or split key. Only the value shapes that are both hashable and
/// orderable qualify — `Float`, `Bool`, `Null`, and `Any` values can be
/// stored as row cells but never as keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Int(i128),
    Str(String),
    Bytes(Vec<u8>),
}

impl TryFrom<&Value> for Key {
    type Error = FddError;

    fn try_from(v: &Value) -> Result<Self, FddError> {
        match v {
            Value::Int(i) => Ok(Key::Int(*i)),
            Value::Str(s) => Ok(Key::Str(s.clone())),
            Value::Bytes(b) => Ok(Key::Bytes(b.clone())),
            other => Err(ConfigError::InvalidOption(format!("{other:?} cannot be used as a key")).into()),
        }
    }
}

impl From<Key> for Value {
    fn from(k: Key) -> Self {
        match k {
            Key::Int(i) => Value::Int(i),
            Key::Str(s) => Value::Str(s),
            Key::Bytes(b) => Value::Bytes(b),
        }
    }
}

// ── PackedBuffer ─────────────────────────────────────────────────────────────

/// Owns the raw bytes backing every `IntList` handed out by an index. Values
/// are stored little-endian, `width` bytes each.
#[derive(Debug, Clone, Default)]
pub struct PackedBuffer {
    bytes: Vec<u8>,
    width: u8,
}

impl PackedBuffer {
    pub fn new(width: u8) -> Self {
        Self { bytes: Vec::new(), width }
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn len_values(&self) -> usize {
        self.bytes.len() / self.width as usize
    }

    /// Append `vals` and return the starting value-index of the new slice.
    pub fn append(&mut self, vals: &[u64]) -> usize {
        let start = self.len_values();
        for v in vals {
            self.push_one(*v);
        }
        start
    }

    /// Overwrite the `vals.len()` values starting at value-index `start`.
    /// `start + vals.len()` must not exceed `len_values()`.
    pub fn overwrite(&mut self, start: usize, vals: &[u64]) {
        let w = self.width as usize;
        for (i, v) in vals.iter().enumerate() {
            let byte_off = (start + i) * w;
            self.bytes[byte_off..byte_off + w].copy_from_slice(&v.to_le_bytes()[..w]);
        }
    }

    fn push_one(&mut self, v: u64) {
        let w = self.width as usize;
        self.bytes.extend_from_slice(&v.to_le_bytes()[..w]);
    }

    /// Borrow an `IntList` view over `len` values starting at value-index
    /// `start`.
    pub fn slice(&self, start: usize, len: usize) -> IntList<'_> {
        IntList { buf: &self.bytes, start: start * self.width as usize, len, width: self.width }
    }

    pub fn raw(&self) -> &[u8] {
        &self.bytes
    }

    pub fn from_raw(bytes: Vec<u8>, width: u8) -> Self {
        Self { bytes, width }
    }
}

// ── IntList ──────────────────────────────────────────────────────────────────

/// Read-only random-access view of `len` fixed-width little-endian integers
/// starting at byte offset `start` within `buf`.
#[derive(Debug, Clone, Copy)]
pub struct IntList<'a> {
    buf: &'a [u8],
    start: usize,
    len: usize,
    width: u8,
}

impl<'a> IntList<'a> {
    pub fn len(&self) -> usize {
        self.len
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, i: usize) -> Result<u64, FddError> {
        if i >= self.len {
            return Err(LookupError::KeyNotFound.into());
        }
        let w = self.width as usize;
        let off = self.start + i * w;
        let mut buf = [0u8; 8];
        buf[..w].copy_from_slice(&self.buf[off..off + w]);
        Ok(u64::from_le_bytes(buf))
    }

    pub fn to_vec(&self) -> Vec<u64> {
        (0..self.len).map(|i| self.get(i).unwrap()).collect()
    }

    /// Cell `i`'s byte range, derived from consecutive offsets `[p_i, p_{i+1})`.
    /// `len()` must be `C+1` for a `C`-column row.
    pub fn cell_range(&self, i: usize) -> Result<(u64, u64), FddError> {
        Ok((self.get(i)?, self.get(i + 1)?))
    }
}

// ── RowIndex trait ───────────────────────────────────────────────────────────

/// Shared surface implemented by all three index kinds, enabling
/// transparent substitution (spec.md §4.2).
pub trait RowIndex<K> {
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn contains_key(&self, key: &K) -> bool;
    fn get(&self, key: &K) -> Option<IntList<'_>>;
    fn keys(&self) -> Box<dyn Iterator<Item = &K> + '_>;
}

// ── Keyless index ────────────────────────────────────────────────────────────

/// Keys are the positions `0..N-1`. Append-only: setting index `N` (current
/// length) extends the buffer; `i < N` rewrites in place; `i > N` errors.
#[derive(Debug, Clone, Default)]
pub struct KeylessIndex {
    buf: PackedBuffer,
    arity: usize, // C+1
}

impl KeylessIndex {
    pub fn new(width: u8, arity: usize) -> Self {
        Self { buf: PackedBuffer::new(width), arity }
    }

    pub fn from_parts(buf: PackedBuffer, arity: usize) -> Self {
        Self { buf, arity }
    }

    pub fn buffer(&self) -> &PackedBuffer {
        &self.buf
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn len(&self) -> usize {
        if self.arity == 0 {
            0
        } else {
            self.buf.len_values() / self.arity
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a new row's offsets (must be called in order `0, 1, 2, ...`).
    pub fn push(&mut self, offsets: &[u64]) -> Result<usize, FddError> {
        debug_assert_eq!(offsets.len(), self.arity);
        let idx = self.len();
        self.buf.append(offsets);
        Ok(idx)
    }

    /// Set row `i`'s offsets. `i == len()` extends; `i < len()` rewrites;
    /// `i > len()` is an error (append-only, no sparse holes).
    pub fn set(&mut self, i: usize, offsets: &[u64]) -> Result<(), FddError> {
        debug_assert_eq!(offsets.len(), self.arity);
        let n = self.len();
        if i == n {
            self.buf.append(offsets);
            Ok(())
        } else if i < n {
            self.buf.overwrite(i * self.arity, offsets);
            Ok(())
        } else {
            Err(LookupError::KeyNotFound.into())
        }
    }

    pub fn get(&self, i: usize) -> Option<IntList<'_>> {
        if i < self.len() {
            Some(self.buf.slice(i * self.arity, self.arity))
        } else {
            None
        }
    }

    pub fn contains_key(&self, i: usize) -> bool {
        i < self.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = usize> {
        0..self.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, IntList<'_>)> {
        (0..self.len()).map(move |i| (i, self.get(i).unwrap()))
    }
}

// ── Sorted-comparable index ──────────────────────────────────────────────────

/// Keys stored in sorted order; lookup via binary search. Built once from a
/// complete set of `(key, offsets)` pairs.
#[derive(Debug, Clone)]
pub struct SortedIndex<K> {
    keys: Vec<K>,
    buf: PackedBuffer,
    arity: usize,
}

impl<K: Ord + Clone> SortedIndex<K> {
    /// Build from an iterator of `(key, offsets)`. Fails at the call site
    /// (not here) if `K` turns out not to be comparable — callers needing
    /// that fallback should check before calling this constructor.
    pub fn build(width: u8, arity: usize, mut entries: Vec<(K, Vec<u64>)>) -> Self {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let mut buf = PackedBuffer::new(width);
        let mut keys = Vec::with_capacity(entries.len());
        for (k, offsets) in entries {
            debug_assert_eq!(offsets.len(), arity);
            buf.append(&offsets);
            keys.push(k);
        }
        Self { keys, buf, arity }
    }

    pub fn buffer(&self) -> &PackedBuffer {
        &self.buf
    }
    pub fn arity(&self) -> usize {
        self.arity
    }
    pub fn len(&self) -> usize {
        self.keys.len()
    }
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn position(&self, key: &K) -> Option<usize> {
        self.keys.binary_search(key).ok()
    }

    pub fn get(&self, key: &K) -> Option<IntList<'_>> {
        self.position(key).map(|i| self.buf.slice(i * self.arity, self.arity))
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.position(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.keys.iter()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, IntList<'_>)> {
        self.keys
            .iter()
            .enumerate()
            .map(move |(i, k)| (k, self.buf.slice(i * self.arity, self.arity)))
    }
}

// ── General index ────────────────────────────────────────────────────────────

/// Hash map `key -> dense slot`; row offsets live in insertion order in the
/// packed buffer. Supports arbitrary hashable keys.
#[derive(Debug, Clone, Default)]
pub struct GeneralIndex<K> {
    slots: HashMap<K, usize>,
    order: Vec<K>,
    buf: PackedBuffer,
    arity: usize,
}

impl<K: Eq + Hash + Clone> GeneralIndex<K> {
    pub fn new(width: u8, arity: usize) -> Self {
        Self { slots: HashMap::new(), order: Vec::new(), buf: PackedBuffer::new(width), arity }
    }

    pub fn buffer(&self) -> &PackedBuffer {
        &self.buf
    }
    pub fn arity(&self) -> usize {
        self.arity
    }
    pub fn len(&self) -> usize {
        self.order.len()
    }
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Insert or overwrite `key`'s offsets. New keys append to the buffer;
    /// repeated assignment rewrites the existing slot in place.
    pub fn set(&mut self, key: K, offsets: &[u64]) -> Result<(), FddError> {
        debug_assert_eq!(offsets.len(), self.arity);
        if let Some(&slot) = self.slots.get(&key) {
            self.buf.overwrite(slot * self.arity, offsets);
        } else {
            let slot = self.order.len();
            self.buf.append(offsets);
            self.order.push(key.clone());
            self.slots.insert(key, slot);
        }
        Ok(())
    }

    /// Insert a brand-new key; fails if the key already exists.
    pub fn insert_new(&mut self, key: K, offsets: &[u64]) -> Result<(), FddError> {
        if self.slots.contains_key(&key) {
            return Err(LookupError::DuplicateKey.into());
        }
        self.set(key, offsets)
    }

    pub fn get(&self, key: &K) -> Option<IntList<'_>> {
        self.slots.get(key).map(|&slot| self.buf.slice(slot * self.arity, self.arity))
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.order.iter()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, IntList<'_>)> {
        self.order.iter().map(move |k| (k, self.get(k).unwrap()))
    }
}

// ── IndexKind ────────────────────────────────────────────────────────────────

/// Discriminant byte for the on-disk split/row-index encoding (`layout`
/// module). A keyless buffer is prefixed with `0x01` and written raw;
/// sorted and general variants are `0x02`/`0x03` followed by a
/// system-codec-serialized envelope (see [`IndexKind::to_bytes`]).
pub const DISC_KEYLESS: u8 = 0x01;
pub const DISC_SORTED: u8 = 0x02;
pub const DISC_GENERAL: u8 = 0x03;

/// One row index or split, in whichever of the three representations its
/// key population required.
#[derive(Debug)]
pub enum IndexKind {
    Keyless(KeylessIndex),
    Sorted(SortedIndex<Key>),
    General(GeneralIndex<Key>),
}

#[derive(Serialize, Deserialize)]
struct KeyedEnvelope {
    width: u8,
    arity: usize,
    keys: Vec<Key>,
    buffer: Vec<u8>,
}

impl IndexKind {
    pub fn len(&self) -> usize {
        match self {
            IndexKind::Keyless(i) => i.len(),
            IndexKind::Sorted(i) => i.len(),
            IndexKind::General(i) => i.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of packed `u64`s per entry (`C+1` offsets for a `C`-column row).
    pub fn arity(&self) -> usize {
        match self {
            IndexKind::Keyless(i) => i.arity(),
            IndexKind::Sorted(i) => i.arity(),
            IndexKind::General(i) => i.arity(),
        }
    }

    pub fn get(&self, key: &Key) -> Option<IntList<'_>> {
        match self {
            IndexKind::Keyless(i) => match key {
                Key::Int(n) if *n >= 0 => i.get(*n as usize),
                _ => None,
            },
            IndexKind::Sorted(i) => i.get(key),
            IndexKind::General(i) => i.get(key),
        }
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> Vec<Key> {
        match self {
            IndexKind::Keyless(i) => i.keys().map(|n| Key::Int(n as i128)).collect(),
            IndexKind::Sorted(i) => i.keys().cloned().collect(),
            IndexKind::General(i) => i.keys().cloned().collect(),
        }
    }

    /// Serialize for the `layout` section table: leading discriminant byte
    /// plus payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FddError> {
        match self {
            IndexKind::Keyless(i) => {
                let mut out = vec![DISC_KEYLESS, i.buffer().width(), i.arity() as u8];
                out.extend_from_slice(i.buffer().raw());
                Ok(out)
            }
            IndexKind::Sorted(i) => {
                let entries: Vec<(Key, Vec<u64>)> =
                    i.iter().map(|(k, v)| (k.clone(), v.to_vec())).collect();
                let envelope = KeyedEnvelope {
                    width: i.buffer().width(),
                    arity: entries.first().map(|(_, v)| v.len()).unwrap_or(0),
                    keys: entries.iter().map(|(k, _)| k.clone()).collect(),
                    buffer: i.buffer().raw().to_vec(),
                };
                let mut out = vec![DISC_SORTED];
                out.extend(serde_json::to_vec(&envelope).map_err(|e| {
                    FddError::Format(crate::error::FormatError::CorruptSectionTable(e.to_string()))
                })?);
                Ok(out)
            }
            IndexKind::General(i) => {
                let envelope = KeyedEnvelope {
                    width: i.buffer().width(),
                    arity: i.arity(),
                    keys: i.keys().cloned().collect(),
                    buffer: i.buffer().raw().to_vec(),
                };
                let mut out = vec![DISC_GENERAL];
                out.extend(serde_json::to_vec(&envelope).map_err(|e| {
                    FddError::Format(crate::error::FormatError::CorruptSectionTable(e.to_string()))
                })?);
                Ok(out)
            }
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FddError> {
        use crate::error::FormatError;
        let (&disc, rest) = bytes.split_first().ok_or(FormatError::TruncatedTrailer)?;
        match disc {
            DISC_KEYLESS => {
                let (&width, rest) = rest.split_first().ok_or(FormatError::TruncatedTrailer)?;
                let (&arity, rest) = rest.split_first().ok_or(FormatError::TruncatedTrailer)?;
                let buf = PackedBuffer::from_raw(rest.to_vec(), width);
                Ok(IndexKind::Keyless(KeylessIndex::from_parts(buf, arity as usize)))
            }
            DISC_SORTED => {
                let envelope: KeyedEnvelope = serde_json::from_slice(rest)
                    .map_err(|e| FormatError::CorruptSectionTable(e.to_string()))?;
                let buf = PackedBuffer::from_raw(envelope.buffer, envelope.width);
                let entries: Vec<(Key, Vec<u64>)> = envelope
                    .keys
                    .into_iter()
                    .enumerate()
                    .map(|(i, k)| (k, buf.slice(i * envelope.arity, envelope.arity).to_vec()))
                    .collect();
                Ok(IndexKind::Sorted(SortedIndex::build(envelope.width, envelope.arity, entries)))
            }
            DISC_GENERAL => {
                let envelope: KeyedEnvelope = serde_json::from_slice(rest)
                    .map_err(|e| FormatError::CorruptSectionTable(e.to_string()))?;
                let buf = PackedBuffer::from_raw(envelope.buffer, envelope.width);
                let mut idx: GeneralIndex<Key> = GeneralIndex::new(envelope.width, envelope.arity);
                for (i, k) in envelope.keys.into_iter().enumerate() {
                    let offsets = buf.slice(i * envelope.arity, envelope.arity).to_vec();
                    idx.set(k, &offsets)?;
                }
                Ok(IndexKind::General(idx))
            }
            other => Err(FormatError::UnknownSplitDiscriminant(other).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyless_append_and_rewrite() {
        let mut idx = KeylessIndex::new(6, 2);
        idx.set(0, &[0, 10]).unwrap();
        idx.set(1, &[10, 20]).unwrap();
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.get(0).unwrap().to_vec(), vec![0, 10]);
        idx.set(0, &[0, 15]).unwrap(); // rewrite in place
        assert_eq!(idx.get(0).unwrap().to_vec(), vec![0, 15]);
        assert!(idx.set(5, &[1, 2]).is_err()); // sparse hole rejected
    }

    #[test]
    fn sorted_binary_search() {
        let entries = vec![
            ("b".to_string(), vec![10, 20]),
            ("a".to_string(), vec![0, 10]),
            ("c".to_string(), vec![20, 30]),
        ];
        let idx = SortedIndex::build(6, 2, entries);
        assert_eq!(idx.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(idx.get(&"b".to_string()).unwrap().to_vec(), vec![10, 20]);
        assert!(idx.get(&"z".to_string()).is_none());
    }

    #[test]
    fn general_insertion_order_and_rewrite() {
        let mut idx: GeneralIndex<String> = GeneralIndex::new(6, 2);
        idx.insert_new("x".into(), &[0, 5]).unwrap();
        idx.insert_new("y".into(), &[5, 9]).unwrap();
        assert_eq!(idx.keys().cloned().collect::<Vec<_>>(), vec!["x", "y"]);
        assert!(idx.insert_new("x".into(), &[0, 1]).is_err());
        idx.set("x".into(), &[0, 6]).unwrap(); // rewrite ok via set()
        assert_eq!(idx.get(&"x".to_string()).unwrap().to_vec(), vec![0, 6]);
    }

    #[test]
    fn out_of_range_access_fails() {
        let idx = KeylessIndex::new(6, 2);
        assert!(idx.get(0).is_none());
        let buf = PackedBuffer::new(6);
        let list = buf.slice(0, 0);
        assert!(list.get(0).is_err());
    }

    #[test]
    fn index_kind_general_round_trips_through_bytes() {
        let mut idx: GeneralIndex<Key> = GeneralIndex::new(6, 2);
        idx.insert_new(Key::Str("a".into()), &[0, 4]).unwrap();
        idx.insert_new(Key::Str("b".into()), &[4, 9]).unwrap();
        let kind = IndexKind::General(idx);
        let bytes = kind.to_bytes().unwrap();
        let back = IndexKind::from_bytes(&bytes).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.get(&Key::Str("b".into())).unwrap().to_vec(), vec![4, 9]);
    }

    #[test]
    fn index_kind_keyless_round_trips_through_bytes() {
        let mut idx = KeylessIndex::new(6, 2);
        idx.set(0, &[0, 3]).unwrap();
        idx.set(1, &[3, 8]).unwrap();
        let kind = IndexKind::Keyless(idx);
        let bytes = kind.to_bytes().unwrap();
        let back = IndexKind::from_bytes(&bytes).unwrap();
        assert_eq!(back.get(&Key::Int(1)).unwrap().to_vec(), vec![3, 8]);
    }
}
