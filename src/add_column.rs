//! Extend a closed dataset with one new column, leaving every existing
//! byte untouched: each row's existing cells are copied verbatim and a
//! freshly computed cell is appended after them.

use std::path::Path;

use crate::codec::{CodecSpec, Value};
use crate::error::{FddError, SchemaError};
use crate::index::{IndexKind, Key};
use crate::reader::{self, ReaderOptions, RowOrCell};
use crate::row::{ColumnDef, RowView};
use crate::writer::{self, SplitSource, WriterOptions};

/// Opens `src` read-only, creates `dst` (fails if it exists unless
/// `overwrite`), and for every row in `src`'s stored order appends `name`
/// computed by `data` from the row's existing values. Splits and
/// properties are carried over unchanged.
pub fn add_column(
    src: &Path,
    dst: &Path,
    name: &str,
    column_type: CodecSpec,
    data: impl Fn(&Key, &RowView) -> Value,
    overwrite: bool,
) -> Result<(), FddError> {
    let source = reader::open(src, ReaderOptions::default())?;
    let mut columns = source.columns().ok_or(SchemaError::Schemaless)?.to_vec();
    if columns.iter().any(|c| c.name == name) {
        return Err(SchemaError::DuplicateColumn(name.to_owned()).into());
    }
    columns.push(ColumnDef { name: name.to_owned(), codec: column_type.clone() });

    let options = WriterOptions { columns: Some(columns), overwrite, ..WriterOptions::default() };
    let mut dest = writer::create(dst, options)?;
    let codec = column_type.codec();

    for key in source.keys() {
        let key_value: Value = key.clone().into();
        let row = match source.get(&key_value)? {
            RowOrCell::Row(row) => row,
            RowOrCell::Cell(_) => unreachable!("all_rows keys always resolve to a row"),
        };
        let view = row.row_view();
        let extra = codec.encode(&data(&key, &view))?;
        dest.append_row_with_extra(key_value, &view, extra)?;
    }

    for split_name in source.available_splits() {
        if split_name == "all_rows" {
            continue;
        }
        let kind = source.load_named_split(&split_name)?;
        let keyless = matches!(kind, IndexKind::Keyless(_));
        let preserve_order = !matches!(kind, IndexKind::Sorted(_));
        let keys: Vec<Value> = kind.keys().into_iter().map(Value::from).collect();
        dest.make_split(&split_name, SplitSource::Keys(keys), true, keyless, preserve_order)?;
    }

    let property_names: Vec<String> = source.property_names().map(str::to_owned).collect();
    for name in property_names {
        let value = source.property(&name)?;
        dest.set_property(&name, value);
    }

    dest.close()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{RowItem, Writer};
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn appends_computed_column_and_preserves_rows() {
        let dir = tempdir().unwrap();
        let src_path = dir.path().join("src.fdd");
        let dst_path = dir.path().join("dst.fdd");

        let columns = vec![ColumnDef { name: "label".into(), codec: CodecSpec::Str }];
        let mut w = writer::create(&src_path, WriterOptions { columns: Some(columns), ..WriterOptions::default() }).unwrap();
        for (key, label) in [("a", "hi"), ("b", "world")] {
            let mut row = HashMap::new();
            row.insert("label".to_string(), Value::Str(label.into()));
            w.set(Value::Str(key.into()), RowItem::Dict(row)).unwrap();
        }
        w.close().unwrap();

        add_column(&src_path, &dst_path, "length", CodecSpec::I32, |_key, row| {
            let label = row.get_named("label").unwrap();
            Value::Int(label.as_str().unwrap().len() as i128)
        }, false)
        .unwrap();

        let reader = reader::open(&dst_path, ReaderOptions::default()).unwrap();
        assert_eq!(reader.len(), 2);
        let row_or_cell = reader.get(&Value::Str("b".into())).unwrap();
        let view = match &row_or_cell {
            RowOrCell::Row(r) => r.row_view(),
            RowOrCell::Cell(_) => panic!("expected a row"),
        };
        assert_eq!(view.get_named("label").unwrap(), Value::Str("world".into()));
        assert_eq!(view.get_named("length").unwrap(), Value::Int(5));
    }

    #[test]
    fn duplicate_column_name_is_rejected() {
        let dir = tempdir().unwrap();
        let src_path = dir.path().join("src.fdd");
        let dst_path = dir.path().join("dst.fdd");
        let columns = vec![ColumnDef { name: "n".into(), codec: CodecSpec::I32 }];
        let mut w = Writer::new(std::fs::File::create(&src_path).unwrap(), WriterOptions { columns: Some(columns), ..WriterOptions::default() }).unwrap();
        let mut row = HashMap::new();
        row.insert("n".to_string(), Value::Int(1));
        w.set(Value::Str("a".into()), RowItem::Dict(row)).unwrap();
        w.close().unwrap();

        let err = add_column(&src_path, &dst_path, "n", CodecSpec::I32, |_, _| Value::Null, false).unwrap_err();
        assert!(matches!(err, FddError::Schema(SchemaError::DuplicateColumn(_))));
    }
}
