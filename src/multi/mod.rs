//! Virtual concatenation of several closed files behind one `get`/`len`
//! surface, mirroring how a training job reads a dataset sharded across
//! many `.fdd` files without caring which shard a row landed in.

use tracing::warn;

use crate::codec::Value;
use crate::error::{FddError, LookupError};
use crate::index::Key;
use crate::reader::{ReOpen, Reader, RowOrCell};
use std::io::{Read, Seek, Write};

/// `Vec<Reader<R>>` plus precomputed prefix lengths for the keyless
/// positional fast path.
pub struct MultiReader<R> {
    readers: Vec<Reader<R>>,
    prefix_lens: Vec<usize>,
}

impl<R: Read + Seek + Write + ReOpen> MultiReader<R> {
    /// Wraps already-open readers. Emits `tracing::warn!` once if the
    /// constituents don't all agree on keyless-ness, since positional `get`
    /// silently becomes order-sensitive once any constituent is keyed.
    pub fn new(readers: Vec<Reader<R>>) -> Self {
        if readers.is_empty() {
            warn!("MultiReader constructed with zero constituents");
        }
        let all_keyless = readers.iter().all(Reader::is_keyless_split);
        let any_keyless = readers.iter().any(Reader::is_keyless_split);
        if any_keyless && !all_keyless {
            warn!(
                "MultiReader mixes keyless and keyed constituents; lookups against \
                 the keyless constituents become order-sensitive across the union"
            );
        }
        let mut prefix_lens = Vec::with_capacity(readers.len());
        let mut acc = 0usize;
        for r in &readers {
            prefix_lens.push(acc);
            acc += r.len();
        }
        Self { readers, prefix_lens }
    }

    pub fn len(&self) -> usize {
        self.readers.iter().map(Reader::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// If every constituent's loaded split is keyless, `key` is interpreted
    /// as a position into the virtual `0..len()` keyspace and resolved by
    /// subtracting constituent lengths in order. Otherwise the first
    /// constituent containing `key` as a real key wins.
    pub fn get(&self, key: &Value) -> Result<RowOrCell<'_, R>, FddError> {
        if self.readers.iter().all(Reader::is_keyless_split) {
            if let Value::Int(i) = key {
                if *i >= 0 {
                    return self.get_positional(*i as usize);
                }
            }
        }
        for reader in &self.readers {
            match reader.get(key) {
                Ok(row) => return Ok(row),
                Err(FddError::Lookup(LookupError::KeyNotFound)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(LookupError::KeyNotFound.into())
    }

    fn get_positional(&self, position: usize) -> Result<RowOrCell<'_, R>, FddError> {
        let slot = self
            .prefix_lens
            .iter()
            .enumerate()
            .rev()
            .find(|(_, &start)| start <= position)
            .map(|(i, _)| i)
            .ok_or(LookupError::KeyNotFound)?;
        let local = position - self.prefix_lens[slot];
        self.readers[slot].get(&Value::Int(local as i128))
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.get(key).is_ok()
    }

    /// Keys across every constituent, in constituent order — no cross-file
    /// dedup, matching `Reader::keys`'s "stored order" contract.
    pub fn keys(&self) -> Vec<Key> {
        self.readers.iter().flat_map(Reader::keys).collect()
    }
}
