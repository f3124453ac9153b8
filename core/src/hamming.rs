//! Hamming codes used inside DMR BPTC and embedded LC matrices
//!
//! Each code is systematic: data bits first, parity bits after. A parity bit
//! is the XOR of the data bits listed for it.

struct HammingCode {
    data_bits: usize,
    checks: &'static [&'static [usize]],
}

const HAMMING_15_11_3: HammingCode = HammingCode {
    data_bits: 11,
    checks: &[
        &[0, 1, 2, 3, 5, 7, 8],
        &[1, 2, 3, 4, 6, 8, 9],
        &[2, 3, 4, 5, 7, 9, 10],
        &[0, 1, 2, 4, 6, 7, 10],
    ],
};

const HAMMING_13_9_3: HammingCode = HammingCode {
    data_bits: 9,
    checks: &[
        &[0, 1, 3, 5, 6],
        &[0, 1, 2, 4, 6, 7],
        &[0, 1, 2, 3, 5, 7, 8],
        &[0, 2, 4, 5, 8],
    ],
};

const HAMMING_16_11_4: HammingCode = HammingCode {
    data_bits: 11,
    checks: &[
        &[0, 1, 2, 3, 5, 7, 8],
        &[1, 2, 3, 4, 6, 8, 9],
        &[2, 3, 4, 5, 7, 9, 10],
        &[0, 1, 2, 4, 6, 7, 10],
        &[0, 2, 5, 6, 8, 9, 10],
    ],
};

impl HammingCode {
    fn len(&self) -> usize {
        self.data_bits + self.checks.len()
    }

    fn parity(&self, bits: &[bool], check: usize) -> bool {
        self.checks[check].iter().fold(false, |acc, &i| acc ^ bits[i])
    }

    fn encode(&self, bits: &mut [bool]) {
        for j in 0..self.checks.len() {
            bits[self.data_bits + j] = self.parity(bits, j);
        }
    }

    /// Syndrome column of a single bit position
    fn column(&self, position: usize) -> u32 {
        if position >= self.data_bits {
            return 1 << (position - self.data_bits);
        }
        let mut col = 0;
        for (j, check) in self.checks.iter().enumerate() {
            if check.contains(&position) {
                col |= 1 << j;
            }
        }
        col
    }

    /// Returns false when the word holds an uncorrectable error
    fn decode(&self, bits: &mut [bool]) -> bool {
        let mut syndrome = 0u32;
        for j in 0..self.checks.len() {
            if self.parity(bits, j) != bits[self.data_bits + j] {
                syndrome |= 1 << j;
            }
        }
        if syndrome == 0 {
            return true;
        }
        match (0..self.len()).find(|&p| self.column(p) == syndrome) {
            Some(p) => {
                bits[p] = !bits[p];
                true
            }
            None => false,
        }
    }
}

pub fn encode_15_11(bits: &mut [bool]) {
    HAMMING_15_11_3.encode(bits);
}

/// Corrects a single bit error in place
pub fn decode_15_11(bits: &mut [bool]) -> bool {
    HAMMING_15_11_3.decode(bits)
}

pub fn encode_13_9(bits: &mut [bool]) {
    HAMMING_13_9_3.encode(bits);
}

/// Corrects a single bit error in place
pub fn decode_13_9(bits: &mut [bool]) -> bool {
    HAMMING_13_9_3.decode(bits)
}

pub fn encode_16_11(bits: &mut [bool]) {
    HAMMING_16_11_4.encode(bits);
}

/// Corrects a single bit error in place; double errors are reported as uncorrectable
pub fn decode_16_11(bits: &mut [bool]) -> bool {
    HAMMING_16_11_4.decode(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(data: u32, len: usize, data_bits: usize) -> Vec<bool> {
        let mut bits = vec![false; len];
        for i in 0..data_bits {
            bits[i] = (data >> (data_bits - 1 - i)) & 1 == 1;
        }
        bits
    }

    #[test]
    fn test_columns_are_unique() {
        for code in [&HAMMING_15_11_3, &HAMMING_13_9_3, &HAMMING_16_11_4] {
            let cols: Vec<u32> = (0..code.len()).map(|p| code.column(p)).collect();
            for (i, a) in cols.iter().enumerate() {
                assert_ne!(*a, 0);
                assert!(!cols[i + 1..].contains(a));
            }
        }
    }

    #[test]
    fn test_15_11_single_error_correction() {
        let mut clean = word(0x5A3, 15, 11);
        encode_15_11(&mut clean);
        for p in 0..15 {
            let mut bits = clean.clone();
            bits[p] = !bits[p];
            assert!(decode_15_11(&mut bits));
            assert_eq!(bits, clean);
        }
    }

    #[test]
    fn test_13_9_single_error_correction() {
        let mut clean = word(0x1C5, 13, 9);
        encode_13_9(&mut clean);
        for p in 0..13 {
            let mut bits = clean.clone();
            bits[p] = !bits[p];
            assert!(decode_13_9(&mut bits));
            assert_eq!(bits, clean);
        }
    }

    #[test]
    fn test_16_11_corrects_one_detects_some_doubles() {
        let mut clean = word(0x2F1, 16, 11);
        encode_16_11(&mut clean);
        let mut bits = clean.clone();
        assert!(decode_16_11(&mut bits));
        bits[4] = !bits[4];
        assert!(decode_16_11(&mut bits));
        assert_eq!(bits, clean);

        // Two parity-bit errors produce a weight-2 syndrome matching no column
        let mut bits = clean.clone();
        bits[11] = !bits[11];
        bits[12] = !bits[12];
        assert!(!decode_16_11(&mut bits));
    }
}
