//! On-disk layout: the section table and the 8-byte trailer that anchors it.
//!
//! ```text
//! row payloads
//! optional column_def bytes
//! property_0 .. property_n bytes
//! split_0 .. split_n bytes (incl. all_rows)
//! optional columns (ordered names) bytes
//! section_table bytes
//! 8-byte LE section_table length                      <- EOF
//! ```
//!
//! Every offset in the section table is a `(start, end)` byte range within
//! the file. The trailer is read back-to-front: the last 8 bytes give the
//! section table's length, which gives its start, which decodes to every
//! other section's range.

use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom, Write};

use serde::{Deserialize, Serialize};

use crate::error::{FddError, FormatError};
use crate::row::ColumnDef;

/// Length in bytes of the trailing section-table-length footer.
pub const TRAILER_LEN: u64 = 8;

pub const TAG_COLUMN_DEF: &str = "_column_def_";
pub const TAG_COLUMNS: &str = "_columns_";

pub fn prop_tag(name: &str) -> String {
    format!("_prop_{name}")
}

pub fn split_tag(name: &str) -> String {
    format!("_split_{name}")
}

/// `tag -> (start, end)` byte range. Serialized with the system codec
/// (JSON, via `serde_json`) as the last section before the trailer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionTable(BTreeMap<String, (u64, u64)>);

impl SectionTable {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, tag: impl Into<String>, range: (u64, u64)) {
        self.0.insert(tag.into(), range);
    }

    pub fn get(&self, tag: &str) -> Option<(u64, u64)> {
        self.0.get(tag).copied()
    }

    pub fn require(&self, tag: &str) -> Result<(u64, u64), FddError> {
        self.get(tag).ok_or_else(|| FormatError::MissingSection(tag.to_owned()).into())
    }

    pub fn tags_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0.keys().filter(move |k| k.starts_with(prefix)).map(|k| k.as_str())
    }

    pub fn split_names(&self) -> impl Iterator<Item = &str> {
        self.tags_with_prefix("_split_").map(|t| &t["_split_".len()..])
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.tags_with_prefix("_prop_").map(|t| &t["_prop_".len()..])
    }

    /// Every section's byte range. `Writer::reopen` uses the minimum start
    /// across these to find where row payloads end and metadata begins.
    pub fn all_ranges(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.0.values().copied()
    }
}

/// Append `bytes`, returning the `(start, end)` range it landed at.
pub fn write_section<W: Write + Seek>(w: &mut W, bytes: &[u8]) -> Result<(u64, u64), FddError> {
    let start = w.stream_position()?;
    w.write_all(bytes)?;
    let end = w.stream_position()?;
    Ok((start, end))
}

/// Read back the section table and the byte offset it starts at (i.e. the
/// tail boundary every prior section must fit before).
pub fn read_trailer<R: Read + Seek>(r: &mut R) -> Result<(SectionTable, u64), FddError> {
    let file_len = r.seek(SeekFrom::End(0))?;
    if file_len < TRAILER_LEN {
        return Err(FormatError::TruncatedTrailer.into());
    }
    r.seek(SeekFrom::End(-(TRAILER_LEN as i64)))?;
    let mut len_buf = [0u8; 8];
    r.read_exact(&mut len_buf)?;
    let table_len = u64::from_le_bytes(len_buf);

    if table_len > file_len - TRAILER_LEN {
        return Err(FormatError::SectionTableOverflow(table_len).into());
    }
    let table_start = file_len - TRAILER_LEN - table_len;
    r.seek(SeekFrom::Start(table_start))?;
    let mut table_buf = vec![0u8; table_len as usize];
    r.read_exact(&mut table_buf)?;

    let table: SectionTable = serde_json::from_slice(&table_buf)
        .map_err(|e| FormatError::CorruptSectionTable(e.to_string()))?;

    Ok((table, table_start))
}

/// Append the section table and its 8-byte length footer. Caller has
/// already written every section referenced by `table`.
pub fn write_trailer<W: Write + Seek>(w: &mut W, table: &SectionTable) -> Result<(), FddError> {
    let bytes = serde_json::to_vec(table)
        .map_err(|e| FormatError::CorruptSectionTable(e.to_string()))?;
    w.write_all(&bytes)?;
    w.write_all(&(bytes.len() as u64).to_le_bytes())?;
    Ok(())
}

/// Read a previously written section's raw bytes.
pub fn read_section<R: Read + Seek>(r: &mut R, range: (u64, u64)) -> Result<Vec<u8>, FddError> {
    let (start, end) = range;
    r.seek(SeekFrom::Start(start))?;
    let mut buf = vec![0u8; (end - start) as usize];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

/// `column_def` section codec: an ordered list of `(name, codec_name)`.
pub fn encode_column_def(columns: &[ColumnDef]) -> Result<Vec<u8>, FddError> {
    let pairs: Vec<(String, String)> =
        columns.iter().map(|c| (c.name.clone(), c.codec.name().to_owned())).collect();
    serde_json::to_vec(&pairs).map_err(|e| FormatError::CorruptSectionTable(e.to_string()).into())
}

pub fn decode_column_def(bytes: &[u8]) -> Result<Vec<ColumnDef>, FddError> {
    let pairs: Vec<(String, String)> =
        serde_json::from_slice(bytes).map_err(|e| FormatError::CorruptSectionTable(e.to_string()))?;
    pairs
        .into_iter()
        .map(|(name, codec_name)| {
            let codec = crate::codec::CodecSpec::from_name(&codec_name)
                .ok_or_else(|| crate::error::ConfigError::UnknownCodec(codec_name.clone()))?;
            Ok(ColumnDef { name, codec })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecSpec;
    use std::io::Cursor;

    #[test]
    fn trailer_round_trip() {
        let mut buf = Cursor::new(Vec::new());
        write_section(&mut buf, b"row payload").unwrap();
        let (start, end) = write_section(&mut buf, b"a split buffer").unwrap();

        let mut table = SectionTable::new();
        table.insert(split_tag("all_rows"), (start, end));
        write_trailer(&mut buf, &table).unwrap();

        let (read_back, _table_start) = read_trailer(&mut buf).unwrap();
        let range = read_back.require(&split_tag("all_rows")).unwrap();
        let bytes = read_section(&mut buf, range).unwrap();
        assert_eq!(bytes, b"a split buffer");
    }

    #[test]
    fn truncated_file_is_rejected() {
        let mut buf = Cursor::new(vec![0u8; 3]);
        assert!(matches!(read_trailer(&mut buf), Err(FddError::Format(FormatError::TruncatedTrailer))));
    }

    #[test]
    fn column_def_round_trips() {
        let columns = vec![
            ColumnDef { name: "x".into(), codec: CodecSpec::Str },
            ColumnDef { name: "y".into(), codec: CodecSpec::Float },
        ];
        let bytes = encode_column_def(&columns).unwrap();
        let back = decode_column_def(&bytes).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[1].name, "y");
        assert_eq!(back[1].codec.name(), "float");
    }
}
