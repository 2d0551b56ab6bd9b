// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::OceError;

/// Deterministic SplitMix64 generator.
///
/// Used by the Isolation Forest for subsampling and split selection so that
/// a fixed run seed yields bit-identical results across runs and platforms.
#[derive(Clone, Copy, Debug)]
pub struct StableRng {
    state: u64,
}

impl StableRng {
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_add(0x9e3779b97f4a7c15),
        }
    }

    /// Derives an independent substream, e.g. one per tree.
    pub fn substream(&self, index: u64) -> Self {
        Self::new(
            self.state
                .wrapping_add(index.wrapping_mul(0xa0761d6478bd642f)),
        )
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9e3779b97f4a7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
        z ^ (z >> 31)
    }

    /// Uniform f64 in `[0, 1)` from the top 53 bits.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    pub fn gen_range(&mut self, upper_exclusive: usize) -> Result<usize, OceError> {
        if upper_exclusive == 0 {
            return Err(OceError::invalid_input(
                "StableRng.gen_range requires upper_exclusive >= 1; got 0",
            ));
        }

        let value = self.next_u64();
        let modulus = u64::try_from(upper_exclusive).map_err(|_| {
            OceError::invalid_input("rng upper_exclusive conversion overflow")
        })?;
        let sampled = value % modulus;
        usize::try_from(sampled)
            .map_err(|_| OceError::invalid_input("rng sampled index conversion overflow"))
    }

    /// Partial Fisher-Yates: draws `k` distinct indices out of `0..n`.
    pub fn sample_indices(&mut self, n: usize, k: usize) -> Result<Vec<usize>, OceError> {
        if k > n {
            return Err(OceError::invalid_input(format!(
                "cannot sample {k} distinct indices out of {n}"
            )));
        }
        let mut pool: Vec<usize> = (0..n).collect();
        for i in 0..k {
            let j = i + self.gen_range(n - i)?;
            pool.swap(i, j);
        }
        pool.truncate(k);
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::StableRng;

    #[test]
    fn same_seed_yields_identical_streams() {
        let mut a = StableRng::new(42);
        let mut b = StableRng::new(42);
        for _ in 0..64 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = StableRng::new(1);
        let mut b = StableRng::new(2);
        let same = (0..16).filter(|_| a.next_u64() == b.next_u64()).count();
        assert_eq!(same, 0);
    }

    #[test]
    fn next_f64_stays_in_unit_interval() {
        let mut rng = StableRng::new(7);
        for _ in 0..1000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v), "value {v} out of [0, 1)");
        }
    }

    #[test]
    fn gen_range_respects_bounds_and_rejects_zero() {
        let mut rng = StableRng::new(3);
        for _ in 0..100 {
            assert!(rng.gen_range(5).expect("range 5 should sample") < 5);
        }
        let err = rng.gen_range(0).expect_err("zero range must fail");
        assert!(err.to_string().contains("upper_exclusive >= 1"));
    }

    #[test]
    fn sample_indices_are_distinct_and_in_range() {
        let mut rng = StableRng::new(11);
        let picked = rng.sample_indices(100, 40).expect("sampling should succeed");
        assert_eq!(picked.len(), 40);
        let mut sorted = picked.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 40, "indices must be distinct");
        assert!(sorted.iter().all(|&i| i < 100));
    }

    #[test]
    fn sample_indices_rejects_oversized_request() {
        let mut rng = StableRng::new(11);
        let err = rng
            .sample_indices(3, 4)
            .expect_err("k > n must fail");
        assert!(err.to_string().contains("distinct indices"));
    }

    #[test]
    fn substreams_are_deterministic_and_independent() {
        let base = StableRng::new(99);
        let mut s0a = base.substream(0);
        let mut s0b = base.substream(0);
        let mut s1 = base.substream(1);
        assert_eq!(s0a.next_u64(), s0b.next_u64());
        assert_ne!(s0a.next_u64(), s1.next_u64());
    }
}
