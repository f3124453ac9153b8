//! Block product turbo code (196,96) carrying DMR full link control
//!
//! The 96 payload bits fill a 13 x 15 matrix (plus one leading reserved bit).
//! Rows 0-8 are Hamming (15,11,3) words, every column is a Hamming (13,9,3)
//! word, and the 196 bits are transmitted in the order `(i * 181) % 196`.

use crate::hamming;

pub const BPTC_BITS: usize = 196;
pub const PAYLOAD_BYTES: usize = 12;

const ROWS: usize = 13;
const DATA_ROWS: usize = 9;
const COLUMNS: usize = 15;
const CORRECTION_PASSES: usize = 3;

fn interleave_index(i: usize) -> usize {
    (i * 181) % BPTC_BITS
}

fn matrix_index(row: usize, column: usize) -> usize {
    1 + row * COLUMNS + column
}

/// Payload bit positions inside the deinterleaved matrix, in payload order
fn payload_positions() -> impl Iterator<Item = usize> {
    // Row 0 starts with three reserved bits
    (3..11)
        .map(|c| matrix_index(0, c))
        .chain((1..DATA_ROWS).flat_map(|r| (0..11).map(move |c| matrix_index(r, c))))
}

/// Encode 12 payload bytes into 196 transmit-order bits
pub fn encode(payload: &[u8; PAYLOAD_BYTES]) -> [bool; BPTC_BITS] {
    let mut matrix = [false; BPTC_BITS];
    for (n, pos) in payload_positions().enumerate() {
        matrix[pos] = payload[n / 8] & (0x80 >> (n % 8)) != 0;
    }

    for row in 0..DATA_ROWS {
        let start = matrix_index(row, 0);
        hamming::encode_15_11(&mut matrix[start..start + COLUMNS]);
    }

    for column in 0..COLUMNS {
        let mut word = [false; ROWS];
        for (row, bit) in word.iter_mut().enumerate() {
            *bit = matrix[matrix_index(row, column)];
        }
        hamming::encode_13_9(&mut word);
        for (row, bit) in word.iter().enumerate() {
            matrix[matrix_index(row, column)] = *bit;
        }
    }

    let mut raw = [false; BPTC_BITS];
    for (i, &bit) in matrix.iter().enumerate() {
        raw[interleave_index(i)] = bit;
    }
    raw
}

/// Decode 196 transmit-order bits, correcting what the row and column codes allow
pub fn decode(raw: &[bool; BPTC_BITS]) -> [u8; PAYLOAD_BYTES] {
    let mut matrix = [false; BPTC_BITS];
    for (i, bit) in matrix.iter_mut().enumerate() {
        *bit = raw[interleave_index(i)];
    }

    for _ in 0..CORRECTION_PASSES {
        let mut fixed_any = false;

        for column in 0..COLUMNS {
            let mut word = [false; ROWS];
            for (row, bit) in word.iter_mut().enumerate() {
                *bit = matrix[matrix_index(row, column)];
            }
            let before = word;
            hamming::decode_13_9(&mut word);
            if word != before {
                fixed_any = true;
                for (row, bit) in word.iter().enumerate() {
                    matrix[matrix_index(row, column)] = *bit;
                }
            }
        }

        for row in 0..DATA_ROWS {
            let start = matrix_index(row, 0);
            let before = matrix;
            hamming::decode_15_11(&mut matrix[start..start + COLUMNS]);
            if matrix != before {
                fixed_any = true;
            }
        }

        if !fixed_any {
            break;
        }
    }

    let mut payload = [0u8; PAYLOAD_BYTES];
    for (n, pos) in payload_positions().enumerate() {
        if matrix[pos] {
            payload[n / 8] |= 0x80 >> (n % 8);
        }
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: [u8; 12] = [
        0x00, 0x00, 0x20, 0x00, 0x00, 0x09, 0x23, 0x2A, 0x41, 0x6B, 0x7C, 0x91,
    ];

    #[test]
    fn test_payload_positions_count() {
        assert_eq!(payload_positions().count(), 96);
    }

    #[test]
    fn test_interleave_is_permutation() {
        let mut seen = [false; BPTC_BITS];
        for i in 0..BPTC_BITS {
            seen[interleave_index(i)] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_round_trip() {
        let raw = encode(&PAYLOAD);
        assert_eq!(decode(&raw), PAYLOAD);
    }

    #[test]
    fn test_corrects_scattered_errors() {
        let mut raw = encode(&PAYLOAD);
        for i in [3usize, 50, 101, 150, 190] {
            raw[i] = !raw[i];
        }
        assert_eq!(decode(&raw), PAYLOAD);
    }
}
