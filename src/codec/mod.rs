//! Codec registry: named `(encode, decode)` pairs for cell values.
//!
//! # Identity rules
//! Every built-in codec is identified by a [`CodecSpec`] variant, the
//! direct on-disk analogue of a codec name. A [`CodecSpec::Custom`] pair
//! coexists with the built-ins and is never written to disk — it only
//! exists for the lifetime of the `Writer`/`Reader` that registered it, so
//! a file closed with custom codecs can only be reopened by a caller that
//! re-supplies the same pair under the same column name.
//!
//! # Endianness
//! Integer and float codecs are little-endian, fixed width. This is
//! frozen for format_version 1 and is never negotiated.

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Value ────────────────────────────────────────────────────────────────────

/// A decoded cell value. `Any` round-trips through the system codec
/// (`serde_json`) and can hold arbitrary structured data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Any(serde_json::Value),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_int(&self) -> Option<i128> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

// ── CodecSpec ────────────────────────────────────────────────────────────────

/// Named primitive codec, or a user-supplied pair. Mirrors the column
/// schema's codec-spec from spec.md §3.
#[derive(Clone)]
pub enum CodecSpec {
    Any,
    Str,
    StrCompressed,
    Bytes,
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    Float,
    Custom(Arc<dyn Codec>),
}

impl fmt::Debug for CodecSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecSpec::Custom(_) => write!(f, "Custom(..)"),
            other => write!(f, "{}", other.name()),
        }
    }
}

impl PartialEq for CodecSpec {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl CodecSpec {
    pub fn name(&self) -> &'static str {
        match self {
            CodecSpec::Any => "any",
            CodecSpec::Str => "str",
            CodecSpec::StrCompressed => "str_compressed",
            CodecSpec::Bytes => "bytes",
            CodecSpec::I8 => "i8",
            CodecSpec::I16 => "i16",
            CodecSpec::I32 => "i32",
            CodecSpec::I64 => "i64",
            CodecSpec::I128 => "i128",
            CodecSpec::U8 => "u8",
            CodecSpec::U16 => "u16",
            CodecSpec::U32 => "u32",
            CodecSpec::U64 => "u64",
            CodecSpec::U128 => "u128",
            CodecSpec::Float => "float",
            CodecSpec::Custom(_) => "custom",
        }
    }

    /// Resolve a built-in codec name. Returns `None` for `"custom"` — a
    /// custom codec can only be constructed by the caller, never by name.
    pub fn from_name(s: &str) -> Option<Self> {
        Some(match s {
            "any" => CodecSpec::Any,
            "str" => CodecSpec::Str,
            "str_compressed" => CodecSpec::StrCompressed,
            "bytes" => CodecSpec::Bytes,
            "i8" => CodecSpec::I8,
            "i16" => CodecSpec::I16,
            "i32" => CodecSpec::I32,
            "i64" => CodecSpec::I64,
            "i128" => CodecSpec::I128,
            "u8" => CodecSpec::U8,
            "u16" => CodecSpec::U16,
            "u32" => CodecSpec::U32,
            "u64" => CodecSpec::U64,
            "u128" => CodecSpec::U128,
            "float" => CodecSpec::Float,
            _ => return None,
        })
    }

    pub fn codec(&self) -> Arc<dyn Codec> {
        match self {
            CodecSpec::Any => Arc::new(AnyCodec),
            CodecSpec::Str => Arc::new(StrCodec),
            CodecSpec::StrCompressed => Arc::new(StrCompressedCodec),
            CodecSpec::Bytes => Arc::new(BytesCodec),
            CodecSpec::I8 => Arc::new(IntCodec { width: 1, signed: true }),
            CodecSpec::I16 => Arc::new(IntCodec { width: 2, signed: true }),
            CodecSpec::I32 => Arc::new(IntCodec { width: 4, signed: true }),
            CodecSpec::I64 => Arc::new(IntCodec { width: 8, signed: true }),
            CodecSpec::I128 => Arc::new(IntCodec { width: 16, signed: true }),
            CodecSpec::U8 => Arc::new(IntCodec { width: 1, signed: false }),
            CodecSpec::U16 => Arc::new(IntCodec { width: 2, signed: false }),
            CodecSpec::U32 => Arc::new(IntCodec { width: 4, signed: false }),
            CodecSpec::U64 => Arc::new(IntCodec { width: 8, signed: false }),
            CodecSpec::U128 => Arc::new(IntCodec { width: 16, signed: false }),
            CodecSpec::Float => Arc::new(FloatCodec),
            CodecSpec::Custom(c) => c.clone(),
        }
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("encode error: {0}")]
    Encode(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("unknown codec name '{0}'")]
    UnknownCodec(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

// ── Codec trait ──────────────────────────────────────────────────────────────

pub trait Codec: Send + Sync {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError>;
}

// ── Built-in codec implementations ──────────────────────────────────────────

/// The generic structured-object serializer. Every `Value` round-trips
/// through JSON; this is the fallback used for the section table,
/// `column_def`, and property blobs as well as user cells of type `any`.
pub struct AnyCodec;
impl Codec for AnyCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))
    }
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

pub struct StrCodec;
impl Codec for StrCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        match value {
            Value::Str(s) => Ok(s.as_bytes().to_vec()),
            Value::Null => Ok(Vec::new()),
            other => Err(CodecError::Encode(format!("expected str, got {other:?}"))),
        }
    }
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        String::from_utf8(bytes.to_vec())
            .map(Value::Str)
            .map_err(|e| CodecError::Decode(e.to_string()))
    }
}

pub struct StrCompressedCodec;
impl Codec for StrCompressedCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let s = match value {
            Value::Str(s) => s,
            Value::Null => return Ok(Vec::new()),
            other => return Err(CodecError::Encode(format!("expected str, got {other:?}"))),
        };
        let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
        enc.write_all(s.as_bytes())?;
        enc.finish().map_err(CodecError::Io)
    }
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        let mut dec = DeflateDecoder::new(bytes);
        let mut out = String::new();
        dec.read_to_string(&mut out)
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        Ok(Value::Str(out))
    }
}

pub struct BytesCodec;
impl Codec for BytesCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Null => Ok(Vec::new()),
            other => Err(CodecError::Encode(format!("expected bytes, got {other:?}"))),
        }
    }
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        Ok(Value::Bytes(bytes.to_vec()))
    }
}

pub struct IntCodec {
    pub width: usize,
    pub signed: bool,
}
impl Codec for IntCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let v = match value {
            Value::Int(i) => *i,
            Value::Null => return Ok(Vec::new()),
            other => return Err(CodecError::Encode(format!("expected int, got {other:?}"))),
        };
        let full = v.to_le_bytes(); // i128, 16 bytes
        if self.width == 16 {
            return Ok(full.to_vec());
        }
        let mut out = vec![0u8; self.width];
        out.copy_from_slice(&full[..self.width]);
        Ok(out)
    }
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        if bytes.len() != self.width {
            return Err(CodecError::Decode(format!(
                "expected {} bytes for int codec, got {}",
                self.width,
                bytes.len()
            )));
        }
        let mut buf = [0u8; 16];
        buf[..self.width].copy_from_slice(bytes);
        if self.signed && self.width < 16 {
            let sign_bit = bytes[self.width - 1] & 0x80 != 0;
            if sign_bit {
                for b in buf.iter_mut().skip(self.width) {
                    *b = 0xff;
                }
            }
        }
        Ok(Value::Int(i128::from_le_bytes(buf)))
    }
}

pub struct FloatCodec;
impl Codec for FloatCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        match value {
            Value::Float(f) => Ok(f.to_le_bytes().to_vec()),
            Value::Int(i) => Ok((*i as f64).to_le_bytes().to_vec()),
            Value::Null => Ok(Vec::new()),
            other => Err(CodecError::Encode(format!("expected float, got {other:?}"))),
        }
    }
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        if bytes.len() != 8 {
            return Err(CodecError::Decode(format!(
                "expected 8 bytes for float codec, got {}",
                bytes.len()
            )));
        }
        let arr: [u8; 8] = bytes.try_into().unwrap();
        Ok(Value::Float(f64::from_le_bytes(arr)))
    }
}

// ── Registry ─────────────────────────────────────────────────────────────────

/// Per-process (or per-open-call) table of resolvable codec names. The
/// system codec (used for the section table, `column_def`, and property
/// blobs) is always [`AnyCodec`].
#[derive(Clone)]
pub struct CodecTable {
    system: Arc<dyn Codec>,
}

impl Default for CodecTable {
    fn default() -> Self {
        Self { system: Arc::new(AnyCodec) }
    }
}

impl CodecTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn system(&self) -> &Arc<dyn Codec> {
        &self.system
    }

    /// Resolve a codec name to a `Codec` instance. Fails with
    /// `CodecError::UnknownCodec` for unrecognised names — callers needing
    /// a custom codec must hold a `CodecSpec::Custom` directly, names are
    /// never a path to custom codecs.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Codec>, CodecError> {
        CodecSpec::from_name(name)
            .map(|spec| spec.codec())
            .ok_or_else(|| CodecError::UnknownCodec(name.to_owned()))
    }
}

pub fn default_table() -> Arc<CodecTable> {
    Arc::new(CodecTable::default())
}
