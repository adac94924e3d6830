//! # fdd — Freeze-Dried Data container format
//!
//! Format guarantees (frozen at format_version 1):
//! - All numeric fields are little-endian; never negotiated
//! - A file is append-only while open and read-only once `close()` completes
//! - The trailer is a fixed-width footer at EOF; the full section table is
//!   reconstructible by reading backward from EOF without a forward scan
//! - Row offsets are packed fixed-width integers (`index` module); three
//!   interchangeable representations (keyless/sorted/general) share one
//!   on-disk encoding via `IndexKind`
//! - A writer that does not reach a clean `close()` leaves an unreadable
//!   file — there is no crash recovery surface

pub mod add_column;
pub mod codec;
pub mod config;
pub mod error;
pub mod index;
pub mod layout;
pub mod multi;
pub mod reader;
pub mod row;
pub mod writer;

// Flat re-exports for the most common types.
pub use add_column::add_column;
pub use codec::{Codec, CodecSpec, CodecTable, Value};
pub use config::{open_path_spec, parse_path_spec};
pub use error::{FddError, Result};
pub use index::{IndexKind, Key};
pub use multi::MultiReader;
pub use reader::{open as open_reader, Reader, ReaderOptions, RowOrCell};
pub use row::{ColumnDef, RowView};
pub use writer::{create as create_writer, reopen as reopen_writer, RowItem, SplitSource, Writer, WriterOptions};
