//! Codec for the QlikView Data (QVD) file format: a columnar,
//! symbol-deduplicated, bit-packed table representation.
//!
//! A QVD file is three sections back to back:
//!
//! ```text
//! [ XML header ] [ 0x0D 0x0A 0x00 ] [ symbol region ] [ index region ]
//! ```
//!
//! The header (`qvd::header`, private) fixes every offset, length, and bit
//! width the other two sections rely on. The symbol region
//! (`qvd::symbol_codec`) is a per-column, tag-prefixed stream of
//! deduplicated values; the index region (`qvd::index`) packs, for every
//! row, a variable-width bit slot per column holding that row's index into
//! its column's symbol sequence. `qvd::table` joins the three into the
//! public [`decode`]/[`encode`] entry points.
//!
//! This crate does not open files, does not parse the XML itself (it
//! consumes and produces a typed tree via `quick_xml`/`serde`), and has no
//! opinion on how callers store or slice the resulting [`Table`].

mod header;
mod index;
mod symbol;
mod symbol_codec;
mod table;
mod value;

pub use qvd_base::{Error, ErrorKind, Result};
pub use table::{decode, decode_with_options, encode, encode_with_metadata, Table};
pub use value::{DecodeOptions, EncodeMetadata, StringEncoding, Value};
