//! Path-grammar entry point: `path[,path2,...][^split]` in one string,
//! mirroring the `^`-suffix filename the teacher's `with_key` accepts,
//! generalized with a comma-separated shard list ahead of it.

use std::fs::File;
use std::path::Path;

use crate::error::{ConfigError, FddError};
use crate::multi::MultiReader;
use crate::reader::{self, ReaderOptions};

/// Splits a path spec into its file paths and an optional trailing split
/// expression. The split suffix is found from the right: a predicate like
/// `name$col>5` can itself contain commas in string literals but never a
/// `^`, so `rsplit_once('^')` is unambiguous.
pub fn parse_path_spec(spec: &str) -> (Vec<&str>, Option<&str>) {
    let (paths_part, split) = match spec.rsplit_once('^') {
        Some((p, s)) => (p, Some(s)),
        None => (spec, None),
    };
    let paths = paths_part.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    (paths, split)
}

/// Opens every path named in `spec`, loads the `^`-suffixed split into each
/// constituent (falling back to `options.split` when no suffix is given),
/// and returns them behind one [`MultiReader`] — a lone path with no comma
/// still wraps exactly one constituent, so this is the single entry point
/// for the path grammar regardless of shard count.
pub fn open_path_spec<P: AsRef<Path>>(spec: P, options: ReaderOptions) -> Result<MultiReader<File>, FddError> {
    let spec = spec.as_ref().to_string_lossy().into_owned();
    let (paths, split) = parse_path_spec(&spec);
    if paths.is_empty() {
        return Err(ConfigError::InvalidOption("path spec names no files".into()).into());
    }
    let mut readers = Vec::with_capacity(paths.len());
    for path in paths {
        let mut reader = reader::open(path, options.clone())?;
        if let Some(split) = split {
            reader.load_new_split(split)?;
        }
        readers.push(reader);
    }
    Ok(MultiReader::new(readers))
}
