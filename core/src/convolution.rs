use crate::error::{GatewayError, Result};

/// Rate 1/2 convolutional code with constraint length 5, as used by YSF FICH and DCH
/// Generator polynomials: G1 = 1 + D^3 + D^4
///                        G2 = 1 + D + D^2 + D^4
///
/// This gives a Trellis with 16 states (2^4)
pub struct ConvolutionalEncoder {
    // Shift register, bit 0 holds the most recent input
    state: u8,
}

/// Represents a surviving path through the Trellis
#[derive(Clone)]
struct TrellisPath {
    metric: u32,
    bits: Vec<bool>,
}

/// Hard-decision Viterbi decoder for the YSF convolutional code
pub struct ViterbiDecoder {
    num_states: usize,
}

const NUM_STATES: usize = 16;

/// Output pair for an input bit leaving `state`
fn output_bits(state: u8, input: bool) -> (bool, bool) {
    let d = input as u8;
    let d1 = state & 1;
    let d2 = (state >> 1) & 1;
    let d3 = (state >> 2) & 1;
    let d4 = (state >> 3) & 1;
    let g1 = d ^ d3 ^ d4;
    let g2 = d ^ d1 ^ d2 ^ d4;
    (g1 == 1, g2 == 1)
}

fn next_state(state: u8, input: bool) -> u8 {
    ((state << 1) | input as u8) & 0x0F
}

impl Default for ConvolutionalEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConvolutionalEncoder {
    pub fn new() -> Self {
        Self { state: 0 }
    }

    /// Encode a single bit, returning 2 output bits
    pub fn encode_bit(&mut self, input: bool) -> [bool; 2] {
        let (g1, g2) = output_bits(self.state, input);
        self.state = next_state(self.state, input);
        [g1, g2]
    }

    /// Encode a bit sequence. Callers append the 4 zero tail bits themselves
    /// so the register ends in state 0.
    pub fn encode(&mut self, bits: &[bool]) -> Vec<bool> {
        let mut output = Vec::with_capacity(bits.len() * 2);
        for &bit in bits {
            output.extend_from_slice(&self.encode_bit(bit));
        }
        output
    }

    /// Reset encoder state for a new block
    pub fn reset(&mut self) {
        self.state = 0;
    }
}

impl Default for ViterbiDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ViterbiDecoder {
    pub fn new() -> Self {
        Self {
            num_states: NUM_STATES,
        }
    }

    /// Decode received bit pairs. The encoder is assumed to start and end in state 0.
    pub fn decode(&self, coded: &[bool]) -> Result<Vec<bool>> {
        if coded.len() % 2 != 0 {
            return Err(GatewayError::FrameLength {
                what: "convolutional codeword (bits)",
                expected: coded.len() + 1,
                actual: coded.len(),
            });
        }

        let mut paths: Vec<Option<TrellisPath>> = vec![None; self.num_states];
        paths[0] = Some(TrellisPath {
            metric: 0,
            bits: Vec::with_capacity(coded.len() / 2),
        });

        for pair in coded.chunks(2) {
            let mut next: Vec<Option<TrellisPath>> = vec![None; self.num_states];

            for (state, path) in paths.iter().enumerate() {
                let Some(path) = path else {
                    continue;
                };
                for input in [false, true] {
                    let (o1, o2) = output_bits(state as u8, input);
                    let branch = (o1 != pair[0]) as u32 + (o2 != pair[1]) as u32;
                    let metric = path.metric + branch;
                    let target = next_state(state as u8, input) as usize;

                    let better = match &next[target] {
                        Some(existing) => metric < existing.metric,
                        None => true,
                    };
                    if better {
                        let mut bits = path.bits.clone();
                        bits.push(input);
                        next[target] = Some(TrellisPath { metric, bits });
                    }
                }
            }

            paths = next;
        }

        // Prefer the zero state the tail bits drive into, fall back to the best metric
        let best = paths[0].take().or_else(|| {
            paths
                .into_iter()
                .flatten()
                .min_by_key(|p| p.metric)
        });
        Ok(best.map(|p| p.bits).unwrap_or_default())
    }
}
