//! Greedy credible levels.
//!
//! Pixels are ranked by descending probability; each pixel's credible level is
//! the running sum of probability up to and including itself in that ranking.
//! It is therefore the mass of the smallest highest-probability region that
//! contains the pixel. Exactly equal probabilities are ranked by ascending
//! pixel index, so the result is deterministic.
//!
//! The significance stored alongside a probability map is `1 - credible level`:
//! close to 1 at the most probable pixels, 0 where the probability vanishes.

/// Greedy credible level of every pixel of `p`.
///
/// Output has the same length and ordering as the input. `O(n log n)`.
pub fn credible_levels(p: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..p.len()).collect();
    order.sort_unstable_by(|&a, &b| p[b].total_cmp(&p[a]).then(a.cmp(&b)));

    let mut levels = vec![0.0; p.len()];
    let mut cumulative = 0.0;
    for idx in order {
        cumulative += p[idx];
        levels[idx] = cumulative;
    }
    levels
}

/// Significance (`1 - credible level`) of every pixel, clamped to `[0, 1]`.
pub fn significance(p: &[f64]) -> Vec<f64> {
    credible_levels(p)
        .into_iter()
        .map(|c| (1.0 - c).clamp(0.0, 1.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn random_probabilities(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::<f64>::new(0.0, 1.0).unwrap();
        let raw: Vec<f64> = (0..n).map(|_| normal.sample(&mut rng).abs()).collect();
        let total: f64 = raw.iter().sum();
        raw.into_iter().map(|v| v / total).collect()
    }

    #[test]
    fn small_example() {
        let p = [0.1, 0.4, 0.2, 0.3];
        let c = credible_levels(&p);
        let expected = [1.0, 0.4, 0.9, 0.7];
        for (a, b) in c.iter().zip(expected) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn ties_rank_lower_index_first() {
        let p = [0.25, 0.25, 0.25, 0.25];
        let c = credible_levels(&p);
        assert_eq!(c, vec![0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn non_decreasing_in_rank_order() {
        let p = random_probabilities(3072, 7);
        let c = credible_levels(&p);
        let mut order: Vec<usize> = (0..p.len()).collect();
        order.sort_by(|&a, &b| p[b].total_cmp(&p[a]).then(a.cmp(&b)));
        for pair in order.windows(2) {
            assert!(c[pair[1]] >= c[pair[0]]);
        }
        // The most probable pixel's level is its own probability
        assert!((c[order[0]] - p[order[0]]).abs() < 1e-15);
        assert!((c[*order.last().unwrap()] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn significance_bounded_and_peaks_at_max() {
        let p = random_probabilities(768, 42);
        let s = significance(&p);
        assert!(s.iter().all(|&v| (0.0..=1.0).contains(&v)));
        let (imax, pmax) = p
            .iter()
            .enumerate()
            .fold((0, 0.0), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
        assert!((s[imax] - (1.0 - pmax)).abs() < 1e-15);
    }

    #[test]
    fn empty_input() {
        assert!(credible_levels(&[]).is_empty());
    }
}
