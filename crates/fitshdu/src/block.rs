//! FITS block geometry: 2880-byte blocks of 36 80-byte records.

use alloc::vec::Vec;

/// FITS block size in bytes.
pub const BLOCK_SIZE: usize = 2880;

/// FITS card (header record) size in bytes.
pub const CARD_SIZE: usize = 80;

/// Number of records that fit in a single block.
pub const CARDS_PER_BLOCK: usize = BLOCK_SIZE / CARD_SIZE;

/// Padding byte used for header blocks (ASCII space).
pub const HEADER_PAD_BYTE: u8 = 0x20;

/// Padding byte used for data blocks (zero).
pub const DATA_PAD_BYTE: u8 = 0x00;

/// Returns the number of FITS blocks required to hold `num_bytes` bytes.
///
/// 0 bytes requires 0 blocks, 1 byte requires 1 block, 2880 bytes requires 1
/// block, 2881 bytes requires 2 blocks.
pub const fn blocks_needed(num_bytes: usize) -> usize {
    num_bytes.div_ceil(BLOCK_SIZE)
}

/// Returns the byte length, in whole blocks, required to hold `num_bytes`.
pub const fn padded_byte_len(num_bytes: usize) -> usize {
    blocks_needed(num_bytes) * BLOCK_SIZE
}

/// Number of header blocks needed for `records` records plus the END record.
pub const fn header_blocks(records: usize) -> usize {
    (records + 1).div_ceil(CARDS_PER_BLOCK)
}

/// Append `records`, an END record and space padding to `out`.
pub fn write_header_blocks(out: &mut Vec<u8>, records: &[[u8; CARD_SIZE]], end: &[u8; CARD_SIZE]) {
    let start = out.len();
    for record in records {
        out.extend_from_slice(record);
    }
    out.extend_from_slice(end);
    let written = out.len() - start;
    out.resize(start + padded_byte_len(written), HEADER_PAD_BYTE);
}

/// Append `data` to `out`, zero-padded to a whole number of blocks.
pub fn write_data_blocks(out: &mut Vec<u8>, data: &[u8]) {
    let start = out.len();
    out.extend_from_slice(data);
    out.resize(start + padded_byte_len(data.len()), DATA_PAD_BYTE);
}
