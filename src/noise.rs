//! Seeded pseudo-random streams used by the simulator.
//!
//! Every concern that needs randomness (connectivity, initial weights, synaptic failures, external noise,
//! tie-breaking, ...) owns its own [`RandomStream`], so that changing one experiment parameter never perturbs
//! unrelated draws. The underlying generator is the TT800 twisted GFSR: 25 words of state and a position
//! counter, fully determined by a 32-bit seed.
use std::collections::VecDeque;

use rand::{Error, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Number of 32-bit words in the TT800 state.
const TT800_N: usize = 25;
/// Shift between the two taps of the recurrence.
const TT800_M: usize = 7;
/// The twist matrix `a`.
const TT800_MAG01: [u32; 2] = [0x0, 0x8ebf_d028];
/// Increments used to spread the seed over the initial state.
const TT800_SEED_OFFSETS: [u32; TT800_N - 1] = [
    0x0b68_5215, 0xe76c_cae7, 0xaf3e_c239, 0x715f_ad23, 0x24a5_90ad, 0x69e4_b5ef, 0xbf45_6141, 0x96bc_1b7b,
    0xa7bd_f825, 0xc1de_75b7, 0x8858_a9c9, 0x2da8_7693, 0xb657_f9dd, 0xffdc_8a9f, 0x8121_da71, 0x8b82_3ecb,
    0x885d_05f5, 0x4e20_cd47, 0x5a9a_d5d9, 0x512c_0c03, 0xea85_7ccd, 0x4cc1_d30f, 0x8891_a8a1, 0xa6b7_aadb,
];
/// Number of outputs discarded right after seeding.
const TT800_WARMUP: usize = 100;

/// Probabilities above this value are treated as certain.
pub const ALMOST_ONE: f64 = 1.0 - 1e-8;
/// Correction keeping `rand_int` away from `high + 1`.
const RAND_INT_EPSILON: f64 = f32::EPSILON as f64;
/// Default number of draws pre-generated by a [`BernoulliBucket`].
pub const DEFAULT_BUCKET_CAPACITY: usize = 1000;

/// The TT800 generator.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Tt800 {
    state: [u32; TT800_N],
    position: usize,
}

impl Tt800 {
    /// Create a generator from a seed and discard the first outputs.
    pub fn new(seed: u32) -> Self {
        let mut state = [0_u32; TT800_N];
        state[0] = seed;
        for (k, offset) in TT800_SEED_OFFSETS.iter().enumerate() {
            state[k + 1] = offset.wrapping_add(state[k]);
        }

        let mut rng = Tt800 { state, position: 0 };
        for _ in 0..TT800_WARMUP {
            rng.next_u32();
        }
        rng
    }

    /// Generate the next 25 words at once.
    fn twist(&mut self) {
        for kk in 0..TT800_N - TT800_M {
            self.state[kk] = self.state[kk + TT800_M]
                ^ (self.state[kk] >> 1)
                ^ TT800_MAG01[(self.state[kk] % 2) as usize];
        }
        for kk in TT800_N - TT800_M..TT800_N {
            self.state[kk] = self.state[kk + TT800_M - TT800_N]
                ^ (self.state[kk] >> 1)
                ^ TT800_MAG01[(self.state[kk] % 2) as usize];
        }
        self.position = 0;
    }
}

impl RngCore for Tt800 {
    fn next_u32(&mut self) -> u32 {
        if self.position == TT800_N {
            self.twist();
        }
        let mut y = self.state[self.position];
        y ^= (y << 7) & 0x2b5b_2500;
        y ^= (y << 15) & 0xdb8b_0000;
        y ^= y >> 16;
        self.position += 1;
        y
    }

    fn next_u64(&mut self) -> u64 {
        let lo = self.next_u32() as u64;
        let hi = self.next_u32() as u64;
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for Tt800 {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Tt800::new(u32::from_le_bytes(seed))
    }
}

/// A seeded stream of uniform, normal, integer and Bernoulli draws.
///
/// A stream cannot exist without a seed, so it is never used uninitialized.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RandomStream {
    seed: u32,
    rng: Tt800,
}

impl RandomStream {
    /// Create a new stream from the given seed.
    pub fn new(seed: u32) -> Self {
        RandomStream {
            seed,
            rng: Tt800::new(seed),
        }
    }

    /// Reinitialize the stream; the subsequent draws only depend on `seed`.
    pub fn reset(&mut self, seed: u32) {
        self.seed = seed;
        self.rng = Tt800::new(seed);
    }

    /// Returns the seed of the last reset.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// A double in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.rng.next_u32() as f64 / 4_294_967_296.0
    }

    /// A double in [low, high).
    pub fn uniform(&mut self, low: f64, high: f64) -> f64 {
        self.next_f64() * (high - low) + low
    }

    /// A normal draw with mean `mu` and standard deviation `sigma` (Box-Muller, two uniforms per draw).
    pub fn normal(&mut self, mu: f64, sigma: f64) -> f64 {
        let u0 = self.next_f64();
        let u1 = self.next_f64();
        // 1 - u0 lies in (0, 1], so the logarithm is finite
        let radius = (-2.0 * (1.0 - u0).ln()).sqrt();
        radius * (std::f64::consts::TAU * u1).cos() * sigma + mu
    }

    /// An integer drawn uniformly from {low, ..., high}.
    pub fn rand_int(&mut self, low: i64, high: i64) -> i64 {
        let value = self
            .uniform(low as f64, high as f64 + 1.0 - RAND_INT_EPSILON)
            .floor() as i64;
        value.min(high)
    }

    /// Returns true with probability `p`; no draw is consumed when `p` is (almost) one.
    pub fn bernoulli(&mut self, p: f64) -> bool {
        p > ALMOST_ONE || self.next_f64() < p
    }
}

impl RngCore for RandomStream {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.rng.try_fill_bytes(dest)
    }
}

/// The independent purposes served by random streams.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum StreamKind {
    /// Which neurons connect to which.
    Connectivity,
    /// Initial synaptic weights.
    Weights,
    /// Axonal delays of the connections.
    Delays,
    /// Synaptic transmission failures.
    Transmission,
    /// Noise on external input patterns.
    External,
    /// Tie-breaking in competitive firing.
    TieBreak,
}

impl StreamKind {
    pub const ALL: [StreamKind; 6] = [
        StreamKind::Connectivity,
        StreamKind::Weights,
        StreamKind::Delays,
        StreamKind::Transmission,
        StreamKind::External,
        StreamKind::TieBreak,
    ];

    fn index(self) -> usize {
        match self {
            StreamKind::Connectivity => 0,
            StreamKind::Weights => 1,
            StreamKind::Delays => 2,
            StreamKind::Transmission => 3,
            StreamKind::External => 4,
            StreamKind::TieBreak => 5,
        }
    }
}

/// One random stream per [`StreamKind`], all derived from a master seed.
///
/// Each seed is drawn from its own ChaCha stream, so the seed of one kind does not depend on how many
/// kinds exist or on the order in which they are used.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct NoiseStreams {
    master_seed: u64,
    streams: Vec<RandomStream>,
}

impl NoiseStreams {
    pub fn new(master_seed: u64) -> Self {
        let streams = StreamKind::ALL
            .iter()
            .map(|kind| RandomStream::new(derive_seed(master_seed, *kind)))
            .collect();
        NoiseStreams {
            master_seed,
            streams,
        }
    }

    /// Returns the master seed the streams were derived from.
    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    pub fn get_mut(&mut self, kind: StreamKind) -> &mut RandomStream {
        &mut self.streams[kind.index()]
    }

    /// Reseed a single stream, leaving the others untouched.
    pub fn reset(&mut self, kind: StreamKind, seed: u32) {
        self.streams[kind.index()].reset(seed);
    }
}

/// Derive the seed of a stream kind from a master seed.
pub fn derive_seed(master_seed: u64, kind: StreamKind) -> u32 {
    let mut rng = ChaCha8Rng::seed_from_u64(master_seed);
    rng.set_stream(kind.index() as u64);
    rng.next_u32()
}

/// A source of synaptic transmission outcomes.
pub trait TransmissionSource {
    /// Returns true if a transmission with the given success rate goes through.
    fn transmits(&mut self, success_rate: f64) -> bool;
}

impl TransmissionSource for RandomStream {
    fn transmits(&mut self, success_rate: f64) -> bool {
        self.bernoulli(success_rate)
    }
}

/// Pre-generated Bernoulli draws for a single success probability.
///
/// Draws can be produced ahead of time (e.g., while waiting for an exchange of firing patterns) with
/// [`BernoulliBucket::fill`] and are then served in order; an empty bucket draws on demand from the same
/// stream, so the sequence of outcomes does not depend on when the bucket was filled.
#[derive(Debug, PartialEq, Clone)]
pub struct BernoulliBucket {
    stream: RandomStream,
    p: f64,
    capacity: usize,
    draws: VecDeque<bool>,
}

impl BernoulliBucket {
    pub fn new(p: f64, seed: u32, capacity: usize) -> Self {
        BernoulliBucket {
            stream: RandomStream::new(seed),
            p,
            capacity,
            draws: VecDeque::with_capacity(capacity),
        }
    }

    /// Change the success probability; pending draws are discarded.
    pub fn set_probability(&mut self, p: f64) {
        self.p = p;
        self.draws.clear();
    }

    /// Reseed the underlying stream; pending draws are discarded.
    pub fn reset_seed(&mut self, seed: u32) {
        self.stream.reset(seed);
        self.draws.clear();
    }

    pub fn probability(&self) -> f64 {
        self.p
    }

    /// Returns the number of pre-generated draws waiting to be used.
    pub fn available(&self) -> usize {
        self.draws.len()
    }

    /// Pre-generate up to `count` draws, without exceeding the bucket capacity.
    pub fn fill(&mut self, count: usize) {
        if is_certain(self.p) {
            return;
        }
        let count = count.min(self.capacity - self.draws.len());
        for _ in 0..count {
            let draw = self.stream.bernoulli(self.p);
            self.draws.push_back(draw);
        }
        log::debug!(
            "Bernoulli bucket refilled with {} draws ({} available)",
            count,
            self.draws.len()
        );
    }

    /// Returns the next outcome for the bucket probability.
    pub fn draw(&mut self) -> bool {
        if is_certain(self.p) {
            return true;
        }
        match self.draws.pop_front() {
            Some(draw) => draw,
            None => self.stream.bernoulli(self.p),
        }
    }
}

impl TransmissionSource for BernoulliBucket {
    /// Rates other than the bucket probability bypass the bucket.
    fn transmits(&mut self, success_rate: f64) -> bool {
        if (success_rate - self.p).abs() > f64::EPSILON {
            return self.stream.bernoulli(success_rate);
        }
        self.draw()
    }
}

fn is_certain(p: f64) -> bool {
    (1.0 - p).abs() < 1e-6
}
