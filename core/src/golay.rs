//! Golay block codes
//!
//! The (23,12,7) code is the perfect binary Golay code with generator
//! polynomial x^11 + x^10 + x^6 + x^5 + x^4 + x^2 + 1. The (24,12) form adds an
//! even parity bit, and (20,8) is the (24,12) code shortened by four leading
//! zero data bits. Codewords are systematic with the data in the high bits.

use std::sync::OnceLock;

const GENERATOR: u32 = 0xC75;

/// Remainder of a 23-bit word divided by the generator polynomial
fn remainder(mut word: u32) -> u32 {
    for i in (11..23).rev() {
        if word & (1 << i) != 0 {
            word ^= GENERATOR << (i - 11);
        }
    }
    word & 0x7FF
}

/// Error pattern for every non-zero syndrome (all patterns of weight 1 to 3)
fn syndrome_table() -> &'static [u32; 2048] {
    static TABLE: OnceLock<[u32; 2048]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u32; 2048];
        for i in 0..23 {
            let p1 = 1u32 << i;
            table[remainder(p1) as usize] = p1;
            for j in (i + 1)..23 {
                let p2 = p1 | (1 << j);
                table[remainder(p2) as usize] = p2;
                for k in (j + 1)..23 {
                    let p3 = p2 | (1 << k);
                    table[remainder(p3) as usize] = p3;
                }
            }
        }
        table
    })
}

/// Encode 12 data bits into a 23-bit codeword
pub fn encode_23_12(data: u32) -> u32 {
    let shifted = (data & 0xFFF) << 11;
    shifted | remainder(shifted)
}

/// Decode a 23-bit codeword, correcting up to three bit errors
pub fn decode_23_12(codeword: u32) -> u32 {
    let codeword = codeword & 0x7F_FFFF;
    let syndrome = remainder(codeword);
    let corrected = if syndrome == 0 {
        codeword
    } else {
        codeword ^ syndrome_table()[syndrome as usize]
    };
    corrected >> 11
}

/// Encode 12 data bits into a 24-bit codeword (23-bit codeword + parity)
pub fn encode_24_12(data: u32) -> u32 {
    let cw = encode_23_12(data);
    (cw << 1) | (cw.count_ones() & 1)
}

/// Decode a 24-bit codeword, correcting up to three bit errors
pub fn decode_24_12(codeword: u32) -> u32 {
    decode_23_12((codeword >> 1) & 0x7F_FFFF)
}

/// Encode 8 data bits into a 20-bit codeword
pub fn encode_20_8(data: u8) -> u32 {
    encode_24_12(data as u32) & 0xF_FFFF
}

/// Decode a 20-bit codeword, correcting up to three bit errors
pub fn decode_20_8(codeword: u32) -> u8 {
    (decode_24_12(codeword & 0xF_FFFF) & 0xFF) as u8
}
