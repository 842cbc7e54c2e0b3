//! Unpacking of the raw sample dump.
//!
//! After a trigger the device dumps 1024 samples of 24 bits each:
//!
//! ```text
//! byte 0: xx A5 A4 A3 A2 A1 A0      analog bits 0-5
//! byte 1: xx L1 L0 A9 A8 A7 A6      logic 0-1, analog bits 6-9
//! byte 2: xx L7 L6 L5 L4 L3 L2      logic 2-7
//! ```

pub const SAMPLES_PER_BLOCK: usize = 1024;
pub const BYTES_PER_SAMPLE: usize = 3;
pub const BLOCK_SIZE: usize = SAMPLES_PER_BLOCK * BYTES_PER_SAMPLE;

/// Receive buffer for one raw block, filled across several reads.
#[derive(Clone)]
pub struct RawSampleBlock {
    buffer: Box<[u8; BLOCK_SIZE]>,
    filled: usize,
}

impl std::fmt::Debug for RawSampleBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawSampleBlock")
            .field("filled", &self.filled)
            .finish_non_exhaustive()
    }
}

impl Default for RawSampleBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl RawSampleBlock {
    pub fn new() -> Self {
        Self {
            buffer: Box::new([0; BLOCK_SIZE]),
            filled: 0,
        }
    }

    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn remaining(&self) -> usize {
        BLOCK_SIZE - self.filled
    }

    pub fn is_full(&self) -> bool {
        self.filled == BLOCK_SIZE
    }

    /// Append as much of `data` as still fits and return the number of bytes
    /// taken. Anything past the end of the block is left to the caller.
    pub fn extend(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.remaining());
        self.buffer[self.filled..self.filled + n].copy_from_slice(&data[..n]);
        self.filled += n;
        n
    }

    pub fn reset(&mut self) {
        self.filled = 0;
    }

    /// The complete block, once all bytes have arrived.
    pub fn as_full(&self) -> Option<&[u8; BLOCK_SIZE]> {
        self.is_full().then_some(&*self.buffer)
    }
}

/// One block of decoded samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSamples {
    /// Eight logic inputs per sample, input 0 in bit 0.
    pub logic: Vec<u8>,
    /// Raw 10-bit ADC codes. See `frame` for conversion to millivolts.
    pub analog: Vec<u16>,
}

impl DecodedSamples {
    pub fn len(&self) -> usize {
        self.logic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logic.is_empty()
    }
}

/// Split one sample triple into its analog code and logic byte.
#[inline]
pub fn decode_sample(triple: [u8; 3]) -> (u16, u8) {
    let [b0, b1, b2] = triple;
    let analog = u16::from(b0 & 0x3f) | (u16::from(b1 & 0x0f) << 6);
    let logic = ((b1 & 0x30) >> 4) | ((b2 & 0x3f) << 2);
    (analog, logic)
}

/// Decode a full raw block into logic and analog arrays.
pub fn decode_block(block: &[u8; BLOCK_SIZE]) -> DecodedSamples {
    #[cfg(feature = "cpu-profiling")]
    let _span = tracy_client::Client::running()
        .map(|client| client.span_alloc(Some("decode_block"), "decode_block", file!(), line!(), 0));

    let mut logic = Vec::with_capacity(SAMPLES_PER_BLOCK);
    let mut analog = Vec::with_capacity(SAMPLES_PER_BLOCK);
    for triple in block.chunks_exact(BYTES_PER_SAMPLE) {
        let (a, l) = decode_sample([triple[0], triple[1], triple[2]]);
        analog.push(a);
        logic.push(l);
    }
    DecodedSamples { logic, analog }
}
