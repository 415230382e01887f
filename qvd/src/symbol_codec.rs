// The symbol region: a concatenation of per-column sub-regions, each a
// back-to-back run of tag-prefixed, variable-length values.

use rapidhash::RapidHashMap;

use qvd_base::{invalid_symbol_encoding, symbol_region_overrun, unknown_symbol_tag, Error};

use crate::header::LayoutDescriptor;
use crate::symbol::{classify, Symbol, TAG_DOUBLE, TAG_DUAL_DOUBLE, TAG_DUAL_INT, TAG_INT, TAG_STRING};
use crate::value::{DecodeOptions, StringEncoding, Value};

pub(crate) fn decode_symbol_table(
    symbol_region: &[u8],
    layout: &LayoutDescriptor,
    options: &DecodeOptions,
) -> Result<Vec<Vec<Symbol>>, Error> {
    let mut columns = Vec::with_capacity(layout.fields.len());
    for field in &layout.fields {
        let end = field.symbol_offset + field.symbol_length;
        if end > symbol_region.len() {
            return Err(symbol_region_overrun(
                field.name.clone(),
                field.symbol_length,
                symbol_region.len().saturating_sub(field.symbol_offset),
            ));
        }
        let region = &symbol_region[field.symbol_offset..end];
        columns.push(decode_column_symbols(region, &field.name, options)?);
    }
    Ok(columns)
}

fn decode_column_symbols(region: &[u8], column: &str, options: &DecodeOptions) -> Result<Vec<Symbol>, Error> {
    let mut symbols = Vec::new();
    let mut pos = 0usize;
    while pos < region.len() {
        let tag = region[pos];
        pos += 1;
        let symbol = match tag {
            TAG_INT => {
                let bytes = read_exact(region, &mut pos, 4, column)?;
                Symbol::Int(i32::from_le_bytes(bytes.try_into().unwrap()))
            }
            TAG_DOUBLE => {
                let bytes = read_exact(region, &mut pos, 8, column)?;
                Symbol::Double(f64::from_le_bytes(bytes.try_into().unwrap()))
            }
            TAG_STRING => Symbol::String(read_terminated_string(region, &mut pos, column, options)?),
            TAG_DUAL_INT => {
                let bytes = read_exact(region, &mut pos, 4, column)?;
                let i = i32::from_le_bytes(bytes.try_into().unwrap());
                let s = read_terminated_string(region, &mut pos, column, options)?;
                Symbol::DualInt(i, s)
            }
            TAG_DUAL_DOUBLE => {
                let bytes = read_exact(region, &mut pos, 8, column)?;
                let d = f64::from_le_bytes(bytes.try_into().unwrap());
                let s = read_terminated_string(region, &mut pos, column, options)?;
                Symbol::DualDouble(d, s)
            }
            other => return Err(unknown_symbol_tag(other)),
        };
        symbols.push(symbol);
    }
    Ok(symbols)
}

fn read_exact<'a>(region: &'a [u8], pos: &mut usize, n: usize, column: &str) -> Result<&'a [u8], Error> {
    if *pos + n > region.len() {
        return Err(symbol_region_overrun(column, region.len(), *pos + n));
    }
    let slice = &region[*pos..*pos + n];
    *pos += n;
    Ok(slice)
}

fn read_terminated_string(
    region: &[u8],
    pos: &mut usize,
    column: &str,
    options: &DecodeOptions,
) -> Result<String, Error> {
    let rest = &region[*pos..];
    let nul = memchr::memchr(0, rest).ok_or_else(|| invalid_symbol_encoding(column))?;
    let text_bytes = &rest[..nul];
    let s = match options.string_encoding {
        StringEncoding::Utf8 => std::str::from_utf8(text_bytes)
            .map_err(|_| invalid_symbol_encoding(column))?
            .to_string(),
        StringEncoding::Latin1 => text_bytes.iter().map(|&b| b as char).collect(),
    };
    *pos += nul + 1;
    Ok(s)
}

/// Deduplicates one column's raw values into an ordered `Symbol` sequence
/// (first-occurrence order) plus the per-row index into that sequence.
pub(crate) fn encode_column_symbols(values: &[Value]) -> (Vec<Symbol>, Vec<u32>) {
    let mut symbols: Vec<Symbol> = Vec::new();
    let mut index_of: RapidHashMap<crate::symbol::SymbolKey, u32> = RapidHashMap::default();
    let mut indices = Vec::with_capacity(values.len());

    for value in values {
        let symbol = classify(value);
        let key = symbol.dedup_key();
        let idx = match index_of.get(&key) {
            Some(&idx) => idx,
            None => {
                let idx = symbols.len() as u32;
                index_of.insert(key, idx);
                symbols.push(symbol);
                idx
            }
        };
        indices.push(idx);
    }

    (symbols, indices)
}

pub(crate) fn emit_symbols(symbols: &[Symbol]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for symbol in symbols {
        bytes.push(symbol.tag());
        match symbol {
            Symbol::Int(i) => bytes.extend_from_slice(&i.to_le_bytes()),
            Symbol::Double(d) => bytes.extend_from_slice(&d.to_le_bytes()),
            Symbol::String(s) => {
                bytes.extend_from_slice(s.as_bytes());
                bytes.push(0);
            }
            Symbol::DualInt(i, s) => {
                bytes.extend_from_slice(&i.to_le_bytes());
                bytes.extend_from_slice(s.as_bytes());
                bytes.push(0);
            }
            Symbol::DualDouble(d, s) => {
                bytes.extend_from_slice(&d.to_le_bytes());
                bytes.extend_from_slice(s.as_bytes());
                bytes.push(0);
            }
        }
    }
    bytes
}
