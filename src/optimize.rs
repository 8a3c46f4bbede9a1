use anyhow::ensure;

use crate::math::apportion::apportion;
use crate::math::matrix::shape;
use crate::model::age::{BandedCounts, N_AGE_BANDS};

/// A vaccine-distribution problem: the transposed susceptible matrix
/// (bands x locations), the dose budget, and the activated prioritization
/// weight vectors (one sub-problem each).
#[derive(Debug, Clone)]
pub struct AllocationProblem {
    pub susceptibles: Vec<Vec<f64>>,
    pub available: u32,
    pub priorities: Vec<[f64; N_AGE_BANDS]>,
}

impl AllocationProblem {
    pub fn check(&self) -> anyhow::Result<(usize, usize)> {
        let (bands, locations) = shape(&self.susceptibles)?;
        ensure!(
            bands == N_AGE_BANDS,
            "susceptible matrix has {} band rows, expected {}",
            bands,
            N_AGE_BANDS
        );
        ensure!(
            self.susceptibles.iter().flatten().all(|v| *v >= 0.0),
            "susceptible counts must be non-negative"
        );
        Ok((bands, locations))
    }
}

/// Per-location age-banded dose counts plus the budget accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationResult {
    pub per_location: Vec<BandedCounts>,
    pub allocated: u32,
    pub leftover: u32,
}

/// The optimization seam. The default implementation below is a modest
/// deterministic allocator; anything smarter plugs in here.
pub trait VaccineSolver {
    fn solve(&self, problem: &AllocationProblem) -> anyhow::Result<AllocationResult>;
}

/// Splits the dose budget evenly across the activated sub-problems, scores
/// each (band, location) cell by `weight[band] * susceptibles[band][loc]`,
/// hands out doses proportionally to score, and caps every cell at its
/// susceptible count. The integer residue goes to the highest-scoring cells
/// that still have capacity. No activated weights means one uniform
/// sub-problem.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedPrioritySolver;

impl VaccineSolver for WeightedPrioritySolver {
    fn solve(&self, problem: &AllocationProblem) -> anyhow::Result<AllocationResult> {
        let (_, n_locations) = problem.check()?;

        let uniform = [[1.0; N_AGE_BANDS]];
        let sub_problems: &[[f64; N_AGE_BANDS]] = if problem.priorities.is_empty() {
            &uniform
        } else {
            &problem.priorities
        };

        // Remaining capacity per (location, band) cell, shared by every
        // sub-problem so the total never exceeds the susceptibles.
        let mut capacity = vec![[0u32; N_AGE_BANDS]; n_locations];
        for (band, row) in problem.susceptibles.iter().enumerate() {
            for (loc, v) in row.iter().enumerate() {
                capacity[loc][band] = v.floor().max(0.0) as u32;
            }
        }

        let budgets = apportion(problem.available, &vec![1.0; sub_problems.len()]);

        let mut allocation = vec![BandedCounts::zero(); n_locations];
        let mut leftover = 0u32;

        for (weights, budget) in sub_problems.iter().zip(budgets.iter()) {
            let mut scores: Vec<f64> = Vec::with_capacity(n_locations * N_AGE_BANDS);
            for loc in 0..n_locations {
                for band in 0..N_AGE_BANDS {
                    scores.push(weights[band] * problem.susceptibles[band][loc]);
                }
            }

            let targets = apportion(*budget, &scores);
            let mut unplaced = 0u32;
            for loc in 0..n_locations {
                for band in 0..N_AGE_BANDS {
                    let target = targets[loc * N_AGE_BANDS + band];
                    let granted = target.min(capacity[loc][band]);
                    allocation[loc].add(band, granted);
                    capacity[loc][band] -= granted;
                    unplaced += target - granted;
                }
            }

            // Capacity overflow drains to the best-scoring open cells; ties
            // break on (location, band) order so the result is deterministic.
            let mut order: Vec<usize> = (0..scores.len()).collect();
            order.sort_by(|a, b| {
                scores[*b]
                    .partial_cmp(&scores[*a])
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.cmp(b))
            });
            for cell in order {
                if unplaced == 0 {
                    break;
                }
                let (loc, band) = (cell / N_AGE_BANDS, cell % N_AGE_BANDS);
                let granted = unplaced.min(capacity[loc][band]);
                allocation[loc].add(band, granted);
                capacity[loc][band] -= granted;
                unplaced -= granted;
            }
            leftover += unplaced;
        }

        let allocated: u32 = allocation.iter().map(|b| b.total()).sum();
        ensure!(
            allocated + leftover == problem.available,
            "allocator lost doses: {} allocated + {} leftover != {} available",
            allocated,
            leftover,
            problem.available
        );

        Ok(AllocationResult {
            per_location: allocation,
            allocated,
            leftover,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{AllocationProblem, VaccineSolver, WeightedPrioritySolver};
    use crate::model::age::N_AGE_BANDS;

    fn problem(columns: Vec<[f64; N_AGE_BANDS]>, available: u32) -> AllocationProblem {
        // build bands x locations from per-location band columns
        let mut susceptibles = vec![vec![0.0; columns.len()]; N_AGE_BANDS];
        for (loc, col) in columns.iter().enumerate() {
            for (band, v) in col.iter().enumerate() {
                susceptibles[band][loc] = *v;
            }
        }
        AllocationProblem { susceptibles, available, priorities: Vec::new() }
    }

    #[test]
    fn never_exceeds_available_or_capacity() {
        let mut col = [0.0; N_AGE_BANDS];
        col[4] = 30.0;
        col[8] = 10.0;
        let p = problem(vec![col], 100);
        let result = WeightedPrioritySolver.solve(&p).expect("solve");
        assert_eq!(result.allocated, 40);
        assert_eq!(result.leftover, 60);
        assert_eq!(result.per_location[0].value(4), 30);
        assert_eq!(result.per_location[0].value(8), 10);
    }

    #[test]
    fn uniform_fallback_follows_susceptible_mass() {
        let mut a = [0.0; N_AGE_BANDS];
        a[2] = 300.0;
        let mut b = [0.0; N_AGE_BANDS];
        b[2] = 100.0;
        let p = problem(vec![a, b], 100);
        let result = WeightedPrioritySolver.solve(&p).expect("solve");
        assert_eq!(result.allocated, 100);
        assert_eq!(result.per_location[0].value(2), 75);
        assert_eq!(result.per_location[1].value(2), 25);
    }

    #[test]
    fn priorities_steer_doses_to_weighted_bands() {
        let mut col = [100.0; N_AGE_BANDS];
        col[0] = 100.0;
        let mut p = problem(vec![col], 90);
        let mut elderly = [0.0; N_AGE_BANDS];
        elderly[7] = 1.0;
        elderly[8] = 1.0;
        p.priorities = vec![elderly];
        let result = WeightedPrioritySolver.solve(&p).expect("solve");
        assert_eq!(result.allocated, 90);
        assert_eq!(result.per_location[0].value(7) + result.per_location[0].value(8), 90);
        assert_eq!(result.per_location[0].value(0), 0);
    }

    #[test]
    fn two_sub_problems_split_the_budget() {
        let col = [1000.0; N_AGE_BANDS];
        let mut p = problem(vec![col], 100);
        let mut young = [0.0; N_AGE_BANDS];
        young[0] = 1.0;
        let mut old = [0.0; N_AGE_BANDS];
        old[8] = 1.0;
        p.priorities = vec![young, old];
        let result = WeightedPrioritySolver.solve(&p).expect("solve");
        assert_eq!(result.per_location[0].value(0), 50);
        assert_eq!(result.per_location[0].value(8), 50);
        assert_eq!(result.leftover, 0);
    }

    #[test]
    fn deterministic_for_a_fixed_problem() {
        let mut a = [0.0; N_AGE_BANDS];
        a[1] = 17.0;
        a[5] = 23.0;
        let mut b = [0.0; N_AGE_BANDS];
        b[5] = 11.0;
        b[8] = 7.0;
        let p = problem(vec![a, b], 37);
        let first = WeightedPrioritySolver.solve(&p).expect("solve");
        let second = WeightedPrioritySolver.solve(&p).expect("solve");
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_wrong_band_count() {
        let p = AllocationProblem {
            susceptibles: vec![vec![1.0]; 3],
            available: 10,
            priorities: Vec::new(),
        };
        assert!(WeightedPrioritySolver.solve(&p).is_err());
    }
}
