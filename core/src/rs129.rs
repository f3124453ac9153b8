//! Reed-Solomon (12,9) over GF(2^8) protecting DMR full link control
//!
//! Field polynomial x^8 + x^4 + x^3 + x^2 + 1, generator
//! (x + a)(x + a^2)(x + a^3) = x^3 + 14x^2 + 56x + 64.

const FIELD_POLY: u16 = 0x11D;
const GEN_G2: u8 = 14;
const GEN_G1: u8 = 56;
const GEN_G0: u8 = 64;

pub const DATA_BYTES: usize = 9;
pub const PARITY_BYTES: usize = 3;

fn gf256_mul(mut a: u8, mut b: u8) -> u8 {
    let mut product = 0u8;
    while b != 0 {
        if b & 1 != 0 {
            product ^= a;
        }
        let carry = a & 0x80 != 0;
        a <<= 1;
        if carry {
            a ^= (FIELD_POLY & 0xFF) as u8;
        }
        b >>= 1;
    }
    product
}

/// Compute the three parity bytes for nine data bytes
pub fn parity(data: &[u8; DATA_BYTES]) -> [u8; PARITY_BYTES] {
    let mut reg = [0u8; PARITY_BYTES];
    for &symbol in data {
        let feedback = symbol ^ reg[0];
        reg[0] = reg[1] ^ gf256_mul(feedback, GEN_G2);
        reg[1] = reg[2] ^ gf256_mul(feedback, GEN_G1);
        reg[2] = gf256_mul(feedback, GEN_G0);
    }
    reg
}

/// Verify twelve bytes laid out as data followed by parity
pub fn check(codeword: &[u8; DATA_BYTES + PARITY_BYTES]) -> bool {
    let mut data = [0u8; DATA_BYTES];
    data.copy_from_slice(&codeword[..DATA_BYTES]);
    parity(&data) == codeword[DATA_BYTES..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluate(codeword: &[u8], x: u8) -> u8 {
        codeword.iter().fold(0u8, |acc, &c| gf256_mul(acc, x) ^ c)
    }

    #[test]
    fn test_generator_coefficients() {
        assert_eq!(gf256_mul(gf256_mul(2, 4), 8), GEN_G0);
        assert_eq!(gf256_mul(2, 4) ^ gf256_mul(2, 8) ^ gf256_mul(4, 8), GEN_G1);
        assert_eq!(2 ^ 4 ^ 8, GEN_G2);
    }

    #[test]
    fn test_codeword_has_generator_roots() {
        let data = [0x00, 0x00, 0x20, 0x00, 0x00, 0x09, 0x23, 0x2A, 0x41];
        let p = parity(&data);
        assert_eq!(p, [0x89, 0xA6, 0x9A]);

        let mut cw = [0u8; 12];
        cw[..9].copy_from_slice(&data);
        cw[9..].copy_from_slice(&p);
        for root in [2u8, 4, 8] {
            assert_eq!(evaluate(&cw, root), 0);
        }
        assert!(check(&cw));
        cw[4] ^= 0x10;
        assert!(!check(&cw));
    }
}
