// Ties the header, symbol table, and index table together: RowAssembler on
// read, and the write-side orchestration of classify -> dedup -> bit-pack
// -> build header -> concatenate.

use tracing::debug;

use qvd_base::{malformed_header, write_unrepresentable, Error};

use crate::header::{build_header, parse_header, FieldDescriptor, LayoutDescriptor};
use crate::index::{decode_index_table, encode_index_table, plan_index_layout};
use crate::symbol_codec::{decode_symbol_table, emit_symbols, encode_column_symbols};
use crate::value::{DecodeOptions, EncodeMetadata, Value};

/// An ordered list of column names plus row-major cells, one per column.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

pub fn decode(bytes: &[u8]) -> Result<Table, Error> {
    decode_with_options(bytes, &DecodeOptions::default())
}

pub fn decode_with_options(bytes: &[u8], options: &DecodeOptions) -> Result<Table, Error> {
    let parsed = parse_header(bytes)?;
    let layout = parsed.layout;
    debug!(
        target: "qvd::decode",
        fields = layout.fields.len(),
        rows = layout.row_count,
        record_byte_size = layout.record_byte_size,
        "header parsed"
    );

    let symbol_region_end = parsed.symbol_region_start + layout.symbol_region_length;
    if symbol_region_end > bytes.len() {
        return Err(malformed_header("symbol region extends past end of file"));
    }
    let symbol_region = &bytes[parsed.symbol_region_start..symbol_region_end];
    let symbol_table = decode_symbol_table(symbol_region, &layout, options)?;

    // `NoOfSymbols` is a header-declared count, and `decode_index_table`'s
    // bounds check below trusts it. If a crafted file understates the
    // number of symbols actually present for a column, an index that looks
    // in-range against the declared count can still be out-of-range for the
    // `Vec` that was actually decoded; catch that here instead of panicking
    // on the lookup in the row-assembly loop further down.
    for (field, symbols) in layout.fields.iter().zip(&symbol_table) {
        if symbols.len() != field.symbol_count {
            return Err(malformed_header(format!(
                "field {:?}: NoOfSymbols declares {} symbols but the symbol region contains {}",
                field.name,
                field.symbol_count,
                symbols.len()
            )));
        }
    }

    let needed = layout.row_count * layout.record_byte_size as usize;
    if layout.index_region_length < needed || layout.index_region_length > needed + 1 {
        return Err(malformed_header(
            "row_count * record_byte_size is inconsistent with the declared index region length",
        ));
    }
    let index_region_start = symbol_region_end;
    if index_region_start + needed > bytes.len() {
        return Err(malformed_header("index region extends past end of file"));
    }
    let index_region_end = (index_region_start + layout.index_region_length).min(bytes.len());
    let index_region = &bytes[index_region_start..index_region_end];
    let index_table = decode_index_table(index_region, &layout)?;

    let columns = layout.fields.iter().map(|f| f.name.clone()).collect();
    let rows = index_table
        .into_iter()
        .map(|row| {
            row.into_iter()
                .enumerate()
                .map(|(c, idx)| symbol_table[c][idx as usize].primary_value())
                .collect()
        })
        .collect();

    Ok(Table { columns, rows })
}

pub fn encode(table: &Table) -> Result<Vec<u8>, Error> {
    encode_with_metadata(table, &EncodeMetadata::default())
}

pub fn encode_with_metadata(table: &Table, metadata: &EncodeMetadata) -> Result<Vec<u8>, Error> {
    let row_count = table.rows.len();
    for row in &table.rows {
        if row.len() != table.columns.len() {
            return Err(write_unrepresentable(
                "a row has a different number of cells than there are columns",
            ));
        }
    }

    let mut column_symbols = Vec::with_capacity(table.columns.len());
    let mut column_indices: Vec<Vec<u32>> = Vec::with_capacity(table.columns.len());
    for c in 0..table.columns.len() {
        let values: Vec<Value> = table.rows.iter().map(|row| row[c].clone()).collect();
        let (symbols, indices) = encode_column_symbols(&values);
        column_symbols.push(symbols);
        column_indices.push(indices);
    }

    let max_indices: Vec<u32> = column_indices
        .iter()
        .map(|idx| idx.iter().copied().max().unwrap_or(0))
        .collect();
    let index_layout = plan_index_layout(&max_indices);
    debug!(
        target: "qvd::encode",
        record_byte_size = index_layout.record_byte_size,
        bit_widths = ?index_layout.bit_widths,
        "index layout planned"
    );

    let mut rows_idx: Vec<Vec<u32>> = vec![Vec::with_capacity(table.columns.len()); row_count];
    for idx_col in &column_indices {
        for (r, &idx) in idx_col.iter().enumerate() {
            rows_idx[r].push(idx);
        }
    }
    let index_bytes = encode_index_table(&rows_idx, &index_layout);

    let mut symbol_bytes = Vec::new();
    let mut field_descriptors = Vec::with_capacity(table.columns.len());
    for (c, symbols) in column_symbols.iter().enumerate() {
        let emitted = emit_symbols(symbols);
        let offset = symbol_bytes.len();
        let length = emitted.len();
        symbol_bytes.extend_from_slice(&emitted);
        field_descriptors.push(FieldDescriptor {
            name: table.columns[c].clone(),
            symbol_offset: offset,
            symbol_length: length,
            bit_offset: index_layout.bit_offsets[c],
            bit_width: index_layout.bit_widths[c],
            bias: 0,
            symbol_count: symbols.len(),
        });
    }

    let layout = LayoutDescriptor {
        fields: field_descriptors,
        record_byte_size: index_layout.record_byte_size,
        row_count,
        symbol_region_length: symbol_bytes.len(),
        index_region_length: index_bytes.len(),
    };

    let header_body = build_header(&layout, metadata)?;

    let mut out = Vec::with_capacity(header_body.len() + 1 + symbol_bytes.len() + index_bytes.len());
    out.extend_from_slice(header_body.as_bytes());
    out.push(0); // the CR LF was written as part of the header body; this NUL completes the terminator.
    out.extend_from_slice(&symbol_bytes);
    out.extend_from_slice(&index_bytes);
    Ok(out)
}
