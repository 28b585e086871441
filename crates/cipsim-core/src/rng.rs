//! Deterministic PRNG for recipe duration sampling.
//!
//! Uses the SplitMix64 algorithm: fast, 8 bytes of state, excellent
//! statistical properties. Normal draws use the Box-Muller transform, so the
//! same seed always yields the same sequence of target durations.

use crate::fixed::Ticks;

/// Rejection sampling gives up after this many draws and falls back to the
/// mean. Only reachable with degenerate bounds.
const MAX_REJECTIONS: u32 = 10_000;

/// SplitMix64 pseudo-random number generator.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SimRng {
    state: u64,
    /// Second Box-Muller output, kept for the next normal draw.
    #[serde(skip)]
    spare: Option<u64>,
}

impl SimRng {
    /// Create a new RNG with the given seed.
    pub fn new(seed: u64) -> Self {
        Self { state: seed, spare: None }
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform draw in `[0, 1)` with 53 bits of precision.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Standard normal draw (mean 0, stddev 1).
    pub fn standard_normal(&mut self) -> f64 {
        if let Some(bits) = self.spare.take() {
            return f64::from_bits(bits);
        }
        // u1 in (0, 1] so ln(u1) is finite.
        let u1 = 1.0 - self.next_f64();
        let u2 = self.next_f64();
        let radius = (-2.0 * u1.ln()).sqrt();
        let theta = std::f64::consts::TAU * u2;
        self.spare = Some((radius * theta.sin()).to_bits());
        radius * theta.cos()
    }

    /// Draw from `Normal(mean, stddev)` rounded to whole ticks, redrawing
    /// until the value lands in `[lower, upper]`.
    pub fn truncated_normal_ticks(
        &mut self,
        mean: Ticks,
        stddev: f64,
        lower: Ticks,
        upper: Ticks,
    ) -> Ticks {
        for _ in 0..MAX_REJECTIONS {
            let draw = (mean as f64 + stddev * self.standard_normal()).round();
            if draw >= lower as f64 && draw <= upper as f64 {
                return draw as Ticks;
            }
        }
        mean.clamp(lower, upper)
    }

    /// Get the internal state (for hashing).
    pub fn state(&self) -> u64 {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let mut a = SimRng::new(42);
        let mut b = SimRng::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_differ() {
        let mut a = SimRng::new(1);
        let mut b = SimRng::new(2);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn next_f64_in_unit_interval() {
        let mut rng = SimRng::new(7);
        for _ in 0..1000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn standard_normal_roughly_centred() {
        let mut rng = SimRng::new(12345);
        let n = 20_000;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for _ in 0..n {
            let v = rng.standard_normal();
            sum += v;
            sum_sq += v * v;
        }
        let mean = sum / n as f64;
        let var = sum_sq / n as f64 - mean * mean;
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((var - 1.0).abs() < 0.1, "variance {var}");
    }

    #[test]
    fn truncated_normal_respects_bounds() {
        let mut rng = SimRng::new(99);
        for _ in 0..2000 {
            let v = rng.truncated_normal_ticks(3480, 696.0, 2880, 7080);
            assert!((2880..=7080).contains(&v), "{v}");
        }
    }

    #[test]
    fn truncated_normal_degenerate_bounds() {
        let mut rng = SimRng::new(5);
        assert_eq!(rng.truncated_normal_ticks(600, 120.0, 600, 600), 600);
    }

    #[test]
    fn serialization_round_trip_continues_sequence() {
        let mut rng = SimRng::new(42);
        for _ in 0..50 {
            rng.next_u64();
        }
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: SimRng = serde_json::from_str(&json).unwrap();
        for _ in 0..10 {
            assert_eq!(rng.next_u64(), restored.next_u64());
        }
    }
}
