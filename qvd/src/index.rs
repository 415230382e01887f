// Bit-stuffed row records: each column occupies a variable-width slot at a
// declared bit offset, with a per-column bias applied after extraction.
//
// The format's reference semantics describe a byte-reverse then bit-reverse
// dance to build a little-endian bit array; that is equivalent to treating
// the record bytes directly as a little-endian bitfield (bit 0 = LSB of
// byte 0), which is what `get_bits`/`set_bits` do directly.

use qvd_base::{bit_layout_overflow, index_out_of_range, Error};

use crate::header::{FieldDescriptor, LayoutDescriptor};

fn get_bits(record: &[u8], bit_offset: u32, bit_width: u32) -> u64 {
    if bit_width == 0 {
        return 0;
    }
    let mut result: u64 = 0;
    let mut filled = 0u32;
    let mut pos = bit_offset;
    while filled < bit_width {
        let byte = record[(pos / 8) as usize];
        let bit_in_byte = pos % 8;
        let avail = 8 - bit_in_byte;
        let take = avail.min(bit_width - filled);
        let mask = ((1u16 << take) - 1) as u8;
        let chunk = (byte >> bit_in_byte) & mask;
        result |= (chunk as u64) << filled;
        filled += take;
        pos += take;
    }
    result
}

fn set_bits(record: &mut [u8], bit_offset: u32, bit_width: u32, value: u64) {
    if bit_width == 0 {
        return;
    }
    let mut filled = 0u32;
    let mut pos = bit_offset;
    while filled < bit_width {
        let byte_index = (pos / 8) as usize;
        let bit_in_byte = pos % 8;
        let avail = 8 - bit_in_byte;
        let take = avail.min(bit_width - filled);
        let mask = ((1u16 << take) - 1) as u8;
        let chunk = ((value >> filled) as u8) & mask;
        record[byte_index] |= chunk << bit_in_byte;
        filled += take;
        pos += take;
    }
}

fn check_field_fits(field: &FieldDescriptor, record_byte_size: u32) -> Result<(), Error> {
    let total_bits = record_byte_size * 8;
    if field.bit_width > 64 || field.bit_offset + field.bit_width > total_bits {
        return Err(bit_layout_overflow(
            field.name.clone(),
            field.bit_offset,
            field.bit_width,
            record_byte_size,
        ));
    }
    Ok(())
}

/// Decodes `row_count` fixed-width records into per-row, per-column symbol
/// indices (bias already applied). `bytes` must contain at least
/// `row_count * record_byte_size` bytes; a longer buffer (the one-byte
/// padding tolerance) is fine, the surplus is simply unread.
pub(crate) fn decode_index_table(bytes: &[u8], layout: &LayoutDescriptor) -> Result<Vec<Vec<i64>>, Error> {
    for field in &layout.fields {
        check_field_fits(field, layout.record_byte_size)?;
    }

    let rbs = layout.record_byte_size as usize;
    let mut rows = Vec::with_capacity(layout.row_count);
    for r in 0..layout.row_count {
        let start = r * rbs;
        let record = &bytes[start..start + rbs];
        let mut row = Vec::with_capacity(layout.fields.len());
        for field in &layout.fields {
            let raw = get_bits(record, field.bit_offset, field.bit_width) as i64;
            let index = raw + field.bias;
            if field.symbol_count > 0 && (index < 0 || index as usize >= field.symbol_count) {
                return Err(index_out_of_range(field.name.clone(), index, field.symbol_count));
            }
            row.push(index);
        }
        rows.push(row);
    }
    Ok(rows)
}

/// The bit layout an encoder settles on for one column, derived purely from
/// the largest index that column's rows ever use.
pub(crate) fn bit_width_for_max_index(max_idx: u32) -> u32 {
    if max_idx == 0 {
        0
    } else {
        32 - max_idx.leading_zeros()
    }
}

pub(crate) struct IndexLayout {
    pub bit_offsets: Vec<u32>,
    pub bit_widths: Vec<u32>,
    pub record_byte_size: u32,
}

/// Assigns bit offsets left-to-right (column 0 at the least-significant
/// end) from each column's maximum row index, per §4.5.
pub(crate) fn plan_index_layout(max_indices: &[u32]) -> IndexLayout {
    let bit_widths: Vec<u32> = max_indices.iter().map(|&m| bit_width_for_max_index(m)).collect();
    let mut bit_offsets = Vec::with_capacity(bit_widths.len());
    let mut acc = 0u32;
    for w in &bit_widths {
        bit_offsets.push(acc);
        acc += w;
    }
    let record_byte_size = acc.div_ceil(8);
    IndexLayout { bit_offsets, bit_widths, record_byte_size }
}

pub(crate) fn encode_index_table(rows: &[Vec<u32>], layout: &IndexLayout) -> Vec<u8> {
    let rbs = layout.record_byte_size as usize;
    let mut bytes = vec![0u8; rows.len() * rbs];
    for (r, row) in rows.iter().enumerate() {
        let record = &mut bytes[r * rbs..(r + 1) * rbs];
        for (c, &idx) in row.iter().enumerate() {
            set_bits(record, layout.bit_offsets[c], layout.bit_widths[c], idx as u64);
        }
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_byte_round_trip() {
        let mut record = [0u8; 1];
        set_bits(&mut record, 0, 3, 5);
        set_bits(&mut record, 3, 3, 2);
        assert_eq!(get_bits(&record, 0, 3), 5);
        assert_eq!(get_bits(&record, 3, 3), 2);
    }

    #[test]
    fn bit_packing_across_bytes_matches_reference_semantics() {
        // Scenario 5: two columns, bit_width = [5, 5], indices (31, 1).
        let layout = IndexLayout {
            bit_offsets: vec![0, 5],
            bit_widths: vec![5, 5],
            record_byte_size: 2,
        };
        let bytes = encode_index_table(&[vec![31, 1]], &layout);
        assert_eq!(bytes.len(), 2);

        let bit = |i: usize| (bytes[i / 8] >> (i % 8)) & 1;
        assert_eq!([bit(0), bit(1), bit(2), bit(3), bit(4)], [1, 1, 1, 1, 1]);
        assert_eq!([bit(5), bit(6), bit(7), bit(8), bit(9)], [1, 0, 0, 0, 0]);

        assert_eq!(get_bits(&bytes, 0, 5), 31);
        assert_eq!(get_bits(&bytes, 5, 5), 1);
    }

    #[test]
    fn bit_width_zero_for_single_symbol_column() {
        assert_eq!(bit_width_for_max_index(0), 0);
        assert_eq!(bit_width_for_max_index(1), 1);
        assert_eq!(bit_width_for_max_index(4), 3);
        assert_eq!(bit_width_for_max_index(31), 5);
    }

    #[test]
    fn bit_width_zero_decodes_as_index_zero() {
        let layout = LayoutDescriptor {
            fields: vec![FieldDescriptor {
                name: "only".into(),
                symbol_offset: 0,
                symbol_length: 0,
                bit_offset: 0,
                bit_width: 0,
                bias: 0,
                symbol_count: 1,
            }],
            record_byte_size: 0,
            row_count: 1,
            symbol_region_length: 0,
            index_region_length: 0,
        };
        let rows = decode_index_table(&[], &layout).expect("bit_width 0 should decode");
        assert_eq!(rows, vec![vec![0]]);
    }

    #[test]
    fn negative_bias_is_tolerated() {
        let layout = LayoutDescriptor {
            fields: vec![FieldDescriptor {
                name: "c".into(),
                symbol_offset: 0,
                symbol_length: 0,
                bit_offset: 0,
                bit_width: 3,
                bias: -2,
                symbol_count: 6,
            }],
            record_byte_size: 1,
            row_count: 1,
            symbol_region_length: 0,
            index_region_length: 1,
        };
        // raw index 2, bias -2 => final index 0
        let rows = decode_index_table(&[0b010], &layout).expect("should decode");
        assert_eq!(rows, vec![vec![0]]);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let layout = LayoutDescriptor {
            fields: vec![FieldDescriptor {
                name: "c".into(),
                symbol_offset: 0,
                symbol_length: 0,
                bit_offset: 0,
                bit_width: 3,
                bias: 0,
                symbol_count: 2,
            }],
            record_byte_size: 1,
            row_count: 1,
            symbol_region_length: 0,
            index_region_length: 1,
        };
        let err = decode_index_table(&[0b111], &layout).unwrap_err();
        assert!(matches!(
            err.kind(),
            qvd_base::ErrorKind::IndexOutOfRange { .. }
        ));
    }

    #[test]
    fn bit_layout_overflow_is_detected() {
        let layout = LayoutDescriptor {
            fields: vec![FieldDescriptor {
                name: "c".into(),
                symbol_offset: 0,
                symbol_length: 0,
                bit_offset: 6,
                bit_width: 4,
                bias: 0,
                symbol_count: 2,
            }],
            record_byte_size: 1,
            row_count: 1,
            symbol_region_length: 0,
            index_region_length: 1,
        };
        let err = decode_index_table(&[0], &layout).unwrap_err();
        assert!(matches!(
            err.kind(),
            qvd_base::ErrorKind::BitLayoutOverflow { .. }
        ));
    }
}
