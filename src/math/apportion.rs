use std::cmp::Ordering;

/// Largest-remainder apportionment of `total` across non-negative `weights`.
/// The returned parts always sum to `total` exactly. Negative weights are
/// treated as zero; fully degenerate weights (all zero) fall back to an even
/// spread so no caller has to special-case an empty census.
pub fn apportion(total: u32, weights: &[f64]) -> Vec<u32> {
    if weights.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0u32; weights.len()];
    if total == 0 {
        return out;
    }

    let clamped: Vec<f64> = weights.iter().map(|w| w.max(0.0)).collect();
    let sum: f64 = clamped.iter().sum();
    if sum <= 0.0 {
        return apportion(total, &vec![1.0; weights.len()]);
    }

    let mut fractions: Vec<(usize, f64)> = Vec::with_capacity(weights.len());
    let mut assigned: u32 = 0;
    for (i, w) in clamped.iter().enumerate() {
        let quota = total as f64 * w / sum;
        let floor = quota.floor().min(total as f64) as u32;
        out[i] = floor;
        assigned = assigned.saturating_add(floor);
        fractions.push((i, quota - quota.floor()));
    }

    // Hand out the integer residue to the largest fractional parts; ties go to
    // the lower index so the result is deterministic.
    fractions.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    let mut remainder = total.saturating_sub(assigned.min(total));
    while remainder > 0 {
        for (i, _) in &fractions {
            if remainder == 0 {
                break;
            }
            out[*i] += 1;
            remainder -= 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::apportion;

    #[test]
    fn parts_sum_to_total() {
        let parts = apportion(100, &[0.5, 0.3, 0.2]);
        assert_eq!(parts.iter().sum::<u32>(), 100);
        assert_eq!(parts, vec![50, 30, 20]);
    }

    #[test]
    fn residue_goes_to_largest_fractions() {
        // quotas 3.33.. each; two seats left over after flooring
        let parts = apportion(10, &[1.0, 1.0, 1.0]);
        assert_eq!(parts.iter().sum::<u32>(), 10);
        assert_eq!(parts, vec![4, 3, 3]);
    }

    #[test]
    fn zero_weights_spread_evenly() {
        let parts = apportion(9, &[0.0, 0.0, 0.0]);
        assert_eq!(parts, vec![3, 3, 3]);
    }

    #[test]
    fn negative_weights_are_ignored() {
        let parts = apportion(6, &[-1.0, 2.0, 1.0]);
        assert_eq!(parts, vec![0, 4, 2]);
    }

    #[test]
    fn empty_and_zero_totals() {
        assert!(apportion(5, &[]).is_empty());
        assert_eq!(apportion(0, &[1.0, 2.0]), vec![0, 0]);
    }
}
