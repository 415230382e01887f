// Distinguishable error kinds for the QVD codec, each carrying enough
// context to diagnose a rejected file without re-parsing it. Every
// construction is logged once, at the point of failure, so callers don't
// need to thread logging through every call site.

use tracing::error;

#[cfg(test)]
use test_log::test;

#[derive(Debug)]
pub enum ErrorKind {
    MalformedHeader(String),
    UnknownSymbolTag(u8),
    InvalidSymbolEncoding { column: String },
    SymbolRegionOverrun { column: String, declared: usize, consumed: usize },
    IndexOutOfRange { column: String, index: i64, symbol_count: usize },
    BitLayoutOverflow { column: String, bit_offset: u32, bit_width: u32, record_byte_size: u32 },
    WriteUnrepresentable(String),
    IoError(std::io::Error),
}

#[derive(Debug)]
pub struct Error(ErrorKind);

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn new(kind: ErrorKind) -> Error {
        error!(target: "qvd", "{:?}", kind);
        Error(kind)
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            ErrorKind::MalformedHeader(msg) => write!(f, "malformed header: {msg}"),
            ErrorKind::UnknownSymbolTag(tag) => write!(f, "unknown symbol tag: {tag}"),
            ErrorKind::InvalidSymbolEncoding { column } => {
                write!(f, "invalid symbol encoding in column {column:?}")
            }
            ErrorKind::SymbolRegionOverrun { column, declared, consumed } => write!(
                f,
                "symbol region overrun in column {column:?}: declared {declared} bytes, consumed {consumed}"
            ),
            ErrorKind::IndexOutOfRange { column, index, symbol_count } => write!(
                f,
                "index {index} out of range for column {column:?} ({symbol_count} symbols)"
            ),
            ErrorKind::BitLayoutOverflow { column, bit_offset, bit_width, record_byte_size } => write!(
                f,
                "bit layout overflow in column {column:?}: offset {bit_offset} + width {bit_width} exceeds {} bits",
                record_byte_size * 8
            ),
            ErrorKind::WriteUnrepresentable(msg) => write!(f, "value not representable: {msg}"),
            ErrorKind::IoError(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.0 {
            ErrorKind::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::new(ErrorKind::IoError(e))
    }
}

pub fn malformed_header(msg: impl Into<String>) -> Error {
    Error::new(ErrorKind::MalformedHeader(msg.into()))
}

pub fn unknown_symbol_tag(tag: u8) -> Error {
    Error::new(ErrorKind::UnknownSymbolTag(tag))
}

pub fn invalid_symbol_encoding(column: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidSymbolEncoding { column: column.into() })
}

pub fn symbol_region_overrun(column: impl Into<String>, declared: usize, consumed: usize) -> Error {
    Error::new(ErrorKind::SymbolRegionOverrun { column: column.into(), declared, consumed })
}

pub fn index_out_of_range(column: impl Into<String>, index: i64, symbol_count: usize) -> Error {
    Error::new(ErrorKind::IndexOutOfRange { column: column.into(), index, symbol_count })
}

pub fn bit_layout_overflow(
    column: impl Into<String>,
    bit_offset: u32,
    bit_width: u32,
    record_byte_size: u32,
) -> Error {
    Error::new(ErrorKind::BitLayoutOverflow {
        column: column.into(),
        bit_offset,
        bit_width,
        record_byte_size,
    })
}

pub fn write_unrepresentable(msg: impl Into<String>) -> Error {
    Error::new(ErrorKind::WriteUnrepresentable(msg.into()))
}

#[test]
fn test_error_display() {
    let e = malformed_header("missing CR LF NUL terminator");
    assert_eq!(e.to_string(), "malformed header: missing CR LF NUL terminator");

    let e = unknown_symbol_tag(3);
    assert_eq!(e.to_string(), "unknown symbol tag: 3");
}

#[test]
fn test_error_source_for_io() {
    let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short read");
    let e: Error = io_err.into();
    assert!(std::error::Error::source(&e).is_some());
}
