//! DMR embedded link control
//!
//! The LC of a voice transmission is repeated inside the voice bursts B-E of
//! every superframe so that late joiners can recover it. The 72 LC bits and a
//! 5-bit checksum fill a 16 x 8 matrix protected by Hamming (16,11,4) rows and
//! a column parity row. The matrix is interleaved and cut into four 32-bit
//! fragments.

use log::debug;

use crate::bits;
use crate::crc;
use crate::dmr_lc::{LinkControl, LC_BYTES};
use crate::hamming;

pub const FRAGMENT_BYTES: usize = 4;
pub const FRAGMENT_COUNT: usize = 4;

/// First bit of the 32-bit embedded fragment inside a voice burst
pub const FRAGMENT_START_BIT: usize = 116;
const FRAGMENT_BITS: usize = 32;

const MATRIX_BITS: usize = 128;
const ROW_BITS: usize = 16;
const HAMMING_ROWS: usize = 7;

/// Bit runs (start, length) of the LC bits in the matrix
const LC_RUNS: [(usize, usize); 7] = [
    (0, 11),
    (16, 11),
    (32, 10),
    (48, 10),
    (64, 10),
    (80, 10),
    (96, 10),
];

/// Checksum bit positions, most significant first
const CHECKSUM_POSITIONS: [usize; 5] = [42, 58, 74, 90, 106];

/// LC start/stop marker carried in the EMB
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lcss {
    Single = 0,
    First = 1,
    Last = 2,
    Continuation = 3,
}

impl Lcss {
    pub fn from_bits(value: u8) -> Self {
        match value & 0x03 {
            0 => Lcss::Single,
            1 => Lcss::First,
            2 => Lcss::Last,
            _ => Lcss::Continuation,
        }
    }

    /// Marker for fragment `index` (0-3) of an embedded LC
    pub fn for_fragment(index: usize) -> Self {
        match index {
            0 => Lcss::First,
            i if i + 1 == FRAGMENT_COUNT => Lcss::Last,
            _ => Lcss::Continuation,
        }
    }
}

fn interleave_order() -> [usize; MATRIX_BITS] {
    let mut order = [0usize; MATRIX_BITS];
    let mut b = 0;
    for slot in order.iter_mut() {
        *slot = b;
        b += 16;
        if b > 127 {
            b -= 127;
        }
    }
    order
}

/// Build the four transmit fragments for `lc`
pub fn encode(lc: &LinkControl) -> [[u8; FRAGMENT_BYTES]; FRAGMENT_COUNT] {
    let lc_bytes = lc.to_bytes();
    let checksum = crc::five_bit_checksum(&lc_bytes);

    let mut matrix = [false; MATRIX_BITS];
    let mut n = 0;
    for &(start, len) in LC_RUNS.iter() {
        for i in 0..len {
            matrix[start + i] = bits::read_bit(&lc_bytes, n);
            n += 1;
        }
    }
    for (i, &pos) in CHECKSUM_POSITIONS.iter().enumerate() {
        matrix[pos] = (checksum >> (4 - i)) & 1 == 1;
    }

    for row in 0..HAMMING_ROWS {
        let start = row * ROW_BITS;
        hamming::encode_16_11(&mut matrix[start..start + ROW_BITS]);
    }
    for column in 0..ROW_BITS {
        matrix[HAMMING_ROWS * ROW_BITS + column] =
            (0..HAMMING_ROWS).fold(false, |acc, row| acc ^ matrix[row * ROW_BITS + column]);
    }

    let mut transmit = [0u8; MATRIX_BITS / 8];
    for (a, &b) in interleave_order().iter().enumerate() {
        bits::write_bit(&mut transmit, a, matrix[b]);
    }

    let mut fragments = [[0u8; FRAGMENT_BYTES]; FRAGMENT_COUNT];
    for (i, fragment) in fragments.iter_mut().enumerate() {
        fragment.copy_from_slice(&transmit[i * FRAGMENT_BYTES..(i + 1) * FRAGMENT_BYTES]);
    }
    fragments
}

/// Copy a 32-bit fragment into the embedded field of a voice burst
pub fn write_fragment(burst: &mut [u8], fragment: &[u8; FRAGMENT_BYTES]) {
    bits::copy_bits(fragment, 0, burst, FRAGMENT_START_BIT, FRAGMENT_BITS);
}

pub fn read_fragment(burst: &[u8]) -> [u8; FRAGMENT_BYTES] {
    let mut fragment = [0u8; FRAGMENT_BYTES];
    bits::copy_bits(burst, FRAGMENT_START_BIT, &mut fragment, 0, FRAGMENT_BITS);
    fragment
}

fn decode_matrix(transmit: &[u8; MATRIX_BITS / 8]) -> Option<LinkControl> {
    let mut matrix = [false; MATRIX_BITS];
    for (a, &b) in interleave_order().iter().enumerate() {
        matrix[b] = bits::read_bit(transmit, a);
    }

    for row in 0..HAMMING_ROWS {
        let start = row * ROW_BITS;
        if !hamming::decode_16_11(&mut matrix[start..start + ROW_BITS]) {
            debug!("embedded LC row {} uncorrectable", row);
            return None;
        }
    }
    for column in 0..ROW_BITS {
        let parity =
            (0..HAMMING_ROWS).fold(false, |acc, row| acc ^ matrix[row * ROW_BITS + column]);
        if parity != matrix[HAMMING_ROWS * ROW_BITS + column] {
            debug!("embedded LC column {} parity mismatch", column);
            return None;
        }
    }

    let mut lc_bytes = [0u8; LC_BYTES];
    let mut n = 0;
    for &(start, len) in LC_RUNS.iter() {
        for i in 0..len {
            bits::write_bit(&mut lc_bytes, n, matrix[start + i]);
            n += 1;
        }
    }
    let checksum = CHECKSUM_POSITIONS
        .iter()
        .fold(0u8, |acc, &pos| (acc << 1) | matrix[pos] as u8);
    if checksum != crc::five_bit_checksum(&lc_bytes) {
        debug!("embedded LC checksum mismatch");
        return None;
    }

    LinkControl::from_bytes(&lc_bytes).ok()
}

/// Accumulates fragments from successive voice bursts
#[derive(Debug, Default)]
pub struct EmbeddedLcDecoder {
    transmit: [u8; MATRIX_BITS / 8],
    received: usize,
}

impl EmbeddedLcDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.transmit = [0u8; MATRIX_BITS / 8];
        self.received = 0;
    }

    /// Feed one fragment; returns the LC once the last fragment completes a valid matrix
    pub fn add_fragment(
        &mut self,
        lcss: Lcss,
        fragment: &[u8; FRAGMENT_BYTES],
    ) -> Option<LinkControl> {
        match lcss {
            Lcss::Single => return None,
            Lcss::First => {
                self.reset();
            }
            Lcss::Continuation | Lcss::Last => {
                if self.received == 0 || self.received >= FRAGMENT_COUNT {
                    // Joined mid-sequence
                    self.reset();
                    return None;
                }
            }
        }

        let start = self.received * FRAGMENT_BYTES;
        self.transmit[start..start + FRAGMENT_BYTES].copy_from_slice(fragment);
        self.received += 1;

        if lcss != Lcss::Last {
            return None;
        }
        let complete = self.received == FRAGMENT_COUNT;
        let transmit = self.transmit;
        self.reset();
        if complete {
            decode_matrix(&transmit)
        } else {
            None
        }
    }
}
