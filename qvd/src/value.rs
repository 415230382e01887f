/// A single table cell, independent of how it is encoded on the wire.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Text(String),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// How symbol strings are decoded from the symbol region.
///
/// The original product reads symbol bytes as Latin-1 (one byte, one char)
/// while its own writer emits UTF-8; that mismatch is a source bug, not a
/// format requirement. `Utf8` matches the writer and is the default; `Latin1`
/// exists only to read files from producers that rely on the old behavior.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StringEncoding {
    #[default]
    Utf8,
    Latin1,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DecodeOptions {
    pub string_encoding: StringEncoding,
}

/// Header fields the codec has no business generating itself (a UUID, the
/// current time, the output file's name): supplied by the caller so the
/// codec stays free of a clock, RNG, or filesystem dependency.
#[derive(Clone, Debug, Default)]
pub struct EncodeMetadata {
    pub table_name: String,
    pub creator_doc: String,
    pub create_utc_time: String,
}
