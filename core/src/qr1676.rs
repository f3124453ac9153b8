//! Quadratic residue (16,7,6) code protecting the DMR EMB word
//!
//! The (17,9,5) QR code with generator x^8 + x^5 + x^4 + x^3 + 1, extended by
//! an even parity bit and shortened by two data bits.

/// Parity contribution of each of the seven data bits, least significant first
const PARITY_BASIS: [u16; 7] = [0x073, 0x0E5, 0x1C9, 0x1E2, 0x1B7, 0x11E, 0x04F];

/// Encode 7 data bits into a 16-bit codeword (data in the high bits)
pub fn encode(data: u8) -> u16 {
    let data = data & 0x7F;
    let mut parity = 0u16;
    for (i, &p) in PARITY_BASIS.iter().enumerate() {
        if data & (1 << i) != 0 {
            parity ^= p;
        }
    }
    ((data as u16) << 9) | parity
}

/// Decode by nearest codeword. Returns `None` when more than two bits are wrong.
pub fn decode(codeword: u16) -> Option<u8> {
    let (data, distance) = (0u8..128)
        .map(|d| (d, (encode(d) ^ codeword).count_ones()))
        .min_by_key(|&(_, dist)| dist)?;
    (distance <= 2).then_some(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codewords() {
        assert_eq!(encode(0), 0x0000);
        assert_eq!(encode(1), 0x0273);
        assert_eq!(encode(3), 0x0696);
        assert_eq!(encode(0x11), 0x23C4);
        assert_eq!(encode(0x40), 0x804F);
    }

    #[test]
    fn test_minimum_distance_is_six() {
        for a in 0..128u8 {
            for b in (a + 1)..128u8 {
                assert!((encode(a) ^ encode(b)).count_ones() >= 6);
            }
        }
    }

    #[test]
    fn test_decode_corrects_two_errors() {
        for data in 0..128u8 {
            let cw = encode(data);
            assert_eq!(decode(cw), Some(data));
            assert_eq!(decode(cw ^ 0x8001), Some(data));
        }
    }
}
