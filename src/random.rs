use rand::Rng;

/// Randomness collaborator used by the analysis engine and the timing
/// refinement. Injected so tests can pin the draw.
pub trait RandomSource: Send + Sync {
    /// Uniform draw in `min..=max`.
    fn next_int(&self, min: i64, max: i64) -> i64;
}

/// Process-RNG backed source used in production wiring.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRngSource;

impl RandomSource for ThreadRngSource {
    fn next_int(&self, min: i64, max: i64) -> i64 {
        if min >= max {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_stay_in_range() {
        let source = ThreadRngSource;
        for _ in 0..100 {
            let v = source.next_int(0, 1000);
            assert!((0..=1000).contains(&v));
        }
    }

    #[test]
    fn degenerate_range_returns_min() {
        assert_eq!(ThreadRngSource.next_int(7, 7), 7);
    }
}
