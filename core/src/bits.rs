//! Bit addressing inside byte buffers
//!
//! Bits are numbered MSB-first: bit 0 is the most significant bit of byte 0,
//! bit 8 the most significant bit of byte 1, and so on. Every frame layout in
//! this crate is described in these positions.

const BIT_MASK: [u8; 8] = [0x80, 0x40, 0x20, 0x10, 0x08, 0x04, 0x02, 0x01];

/// Read the bit at `index`
pub fn read_bit(buf: &[u8], index: usize) -> bool {
    buf[index >> 3] & BIT_MASK[index & 7] != 0
}

/// Write `value` into the bit at `index`
pub fn write_bit(buf: &mut [u8], index: usize, value: bool) {
    if value {
        buf[index >> 3] |= BIT_MASK[index & 7];
    } else {
        buf[index >> 3] &= !BIT_MASK[index & 7];
    }
}

/// Read `len` (<= 32) bits starting at `start`, first bit ends up most significant
pub fn read_bits(buf: &[u8], start: usize, len: usize) -> u32 {
    debug_assert!(len <= 32);
    let mut value = 0u32;
    for i in 0..len {
        value = (value << 1) | read_bit(buf, start + i) as u32;
    }
    value
}

/// Write the low `len` (<= 32) bits of `value` starting at `start`, most significant first
pub fn write_bits(buf: &mut [u8], start: usize, len: usize, value: u32) {
    debug_assert!(len <= 32);
    for i in 0..len {
        let bit = (value >> (len - 1 - i)) & 1 == 1;
        write_bit(buf, start + i, bit);
    }
}

/// Copy `len` bits from `src` at `src_start` into `dst` at `dst_start`
pub fn copy_bits(src: &[u8], src_start: usize, dst: &mut [u8], dst_start: usize, len: usize) {
    for i in 0..len {
        write_bit(dst, dst_start + i, read_bit(src, src_start + i));
    }
}

/// Unpack bytes into one bool per bit
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<bool> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for i in (0..8).rev() {
            bits.push((byte >> i) & 1 == 1);
        }
    }
    bits
}

/// Pack bools into bytes, padding the last byte with zero bits
pub fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; bits.len().div_ceil(8)];
    for (i, &bit) in bits.iter().enumerate() {
        write_bit(&mut bytes, i, bit);
    }
    bytes
}
