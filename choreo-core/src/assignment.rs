//! Assignment solver: dancer id → end-position index under optimal / fixed / partial modes.

use crate::error::PlanError;
use crate::types::{AssignmentMode, DancerId, Position};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One dancer's resolved target, with the Euclidean cost actually paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub dancer: DancerId,
    pub end_index: usize,
    pub cost: f64,
}

/// Solve the assignment problem for the given start/end formations under `mode`.
/// Dancer ids are `1..=start.len()` in order.
pub fn solve(
    start: &[Position],
    end: &[Position],
    mode: &AssignmentMode,
) -> Result<Vec<Assignment>, PlanError> {
    if start.len() != end.len() {
        return Err(PlanError::ShapeMismatch {
            start: start.len(),
            end: end.len(),
        });
    }
    let n = start.len();
    match mode {
        AssignmentMode::Fixed => Ok(identity_assignment(start, end)),
        AssignmentMode::Optimal => Ok(optimal_assignment(start, end, &(0..n).collect::<Vec<_>>())),
        AssignmentMode::Partial { locked } => {
            for id in locked {
                if id.0 == 0 || id.0 as usize > n {
                    return Err(PlanError::ShapeMismatch { start: n, end: n });
                }
            }
            Ok(partial_assignment(start, end, locked))
        }
    }
}

fn identity_assignment(start: &[Position], end: &[Position]) -> Vec<Assignment> {
    start
        .iter()
        .zip(end.iter())
        .enumerate()
        .map(|(i, (s, e))| Assignment {
            dancer: DancerId((i + 1) as u32),
            end_index: i,
            cost: s.distance_squared(e),
        })
        .collect()
}

/// Optimal assignment restricted to `free_end_indices` (the caller supplies the full
/// index list for plain `optimal` mode, or the remainder for `partial` mode).
fn optimal_assignment(start: &[Position], end: &[Position], free_end_indices: &[usize]) -> Vec<Assignment> {
    let n = start.len();
    debug_assert_eq!(n, free_end_indices.len());

    // Build the cost matrix, squared Euclidean distance,
    // with a vanishing identity-preferring bias so exact ties resolve to identity.
    let mut max_cost = 0.0f64;
    let mut raw = vec![vec![0.0f64; n]; n];
    for (row, start_pos) in start.iter().enumerate() {
        for (col, &end_idx) in free_end_indices.iter().enumerate() {
            let c = start_pos.distance_squared(&end[end_idx]);
            raw[row][col] = c;
            if c > max_cost {
                max_cost = c;
            }
        }
    }
    let eps = 1e-9 * (1.0 + max_cost);
    let mut biased = raw.clone();
    for row in 0..n {
        for col in 0..n {
            if free_end_indices[col] != row {
                biased[row][col] += eps;
            }
        }
    }

    let col_of_row = hungarian(&biased);

    (0..n)
        .map(|row| {
            let col = col_of_row[row];
            let end_idx = free_end_indices[col];
            Assignment {
                dancer: DancerId((row + 1) as u32),
                end_index: end_idx,
                cost: raw[row][col],
            }
        })
        .collect()
}

fn partial_assignment(start: &[Position], end: &[Position], locked: &HashSet<DancerId>) -> Vec<Assignment> {
    let n = start.len();
    let mut result = vec![None; n];

    let mut locked_rows = HashSet::new();
    let mut used_end_indices = HashSet::new();
    for id in locked {
        let row = (id.0 - 1) as usize;
        locked_rows.insert(row);
        used_end_indices.insert(row);
        result[row] = Some(Assignment {
            dancer: *id,
            end_index: row,
            cost: start[row].distance_squared(&end[row]),
        });
    }

    let free_rows: Vec<usize> = (0..n).filter(|r| !locked_rows.contains(r)).collect();
    let free_end_indices: Vec<usize> = (0..n).filter(|c| !used_end_indices.contains(c)).collect();

    if !free_rows.is_empty() {
        let free_start: Vec<Position> = free_rows.iter().map(|&r| start[r]).collect();
        let sub = optimal_assignment(&free_start, end, &free_end_indices);
        for (local_row, assignment) in free_rows.iter().zip(sub.into_iter()) {
            result[*local_row] = Some(Assignment {
                dancer: DancerId((*local_row + 1) as u32),
                end_index: assignment.end_index,
                cost: assignment.cost,
            });
        }
    }

    result.into_iter().map(|a| a.expect("every row assigned")).collect()
}

/// Classic O(n^3) Hungarian algorithm (Kuhn-Munkres with potentials) for a square cost
/// matrix. Returns, for each row, the column it is matched to.
fn hungarian(cost: &[Vec<f64>]) -> Vec<usize> {
    let n = cost.len();
    if n == 0 {
        return Vec::new();
    }
    const INF: f64 = f64::INFINITY;
    // 1-indexed internal arrays, per the standard formulation of this algorithm.
    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; n + 1];
    let mut p = vec![0usize; n + 1]; // p[col] = row matched to that column (0 = unmatched)
    let mut way = vec![0usize; n + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![INF; n + 1];
        let mut used = vec![false; n + 1];
        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = INF;
            let mut j1 = 0usize;
            for j in 1..=n {
                if used[j] {
                    continue;
                }
                let cur = cost[i0 - 1][j - 1] - u[i0] - v[j];
                if cur < minv[j] {
                    minv[j] = cur;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }
            for j in 0..=n {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }
            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }
        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut col_of_row = vec![0usize; n];
    for j in 1..=n {
        if p[j] != 0 {
            col_of_row[p[j] - 1] = j - 1;
        }
    }
    col_of_row
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(pairs: &[(f64, f64)]) -> Vec<Position> {
        pairs.iter().map(|&(x, y)| Position::new(x, y)).collect()
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let start = positions(&[(0.0, 0.0)]);
        let end = positions(&[(0.0, 0.0), (1.0, 1.0)]);
        let err = solve(&start, &end, &AssignmentMode::Fixed).unwrap_err();
        assert!(matches!(err, PlanError::ShapeMismatch { start: 1, end: 2 }));
    }

    #[test]
    fn fixed_mode_is_identity() {
        let start = positions(&[(0.0, 0.0), (5.0, 5.0)]);
        let end = positions(&[(1.0, 1.0), (9.0, 9.0)]);
        let result = solve(&start, &end, &AssignmentMode::Fixed).unwrap();
        assert_eq!(result[0].end_index, 0);
        assert_eq!(result[1].end_index, 1);
    }

    #[test]
    fn optimal_mode_finds_crossing_free_swap() {
        // Two dancers on a line; their own positions are the cheaper match.
        let start = positions(&[(0.0, 0.0), (10.0, 0.0)]);
        let end = positions(&[(10.0, 0.0), (0.0, 0.0)]);
        let result = solve(&start, &end, &AssignmentMode::Optimal).unwrap();
        // Dancer 1 (at 0,0) should go to the end position at (0,0) — index 1 — since
        // that's cheaper than the swap-identity interpretation.
        let total: f64 = result.iter().map(|a| a.cost).sum();
        assert_eq!(total, 0.0);
    }

    #[test]
    fn optimal_cost_never_exceeds_fixed_cost() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};
        let mut rng = StdRng::seed_from_u64(12345);
        for n in 1..=12 {
            let start: Vec<Position> = (0..n).map(|_| Position::new(rng.random::<f64>() * 20.0, rng.random::<f64>() * 20.0)).collect();
            let end: Vec<Position> = (0..n).map(|_| Position::new(rng.random::<f64>() * 20.0, rng.random::<f64>() * 20.0)).collect();
            let fixed = solve(&start, &end, &AssignmentMode::Fixed).unwrap();
            let optimal = solve(&start, &end, &AssignmentMode::Optimal).unwrap();
            let fixed_cost: f64 = fixed.iter().map(|a| a.cost).sum();
            let optimal_cost: f64 = optimal.iter().map(|a| a.cost).sum();
            assert!(optimal_cost <= fixed_cost + 1e-6, "n={n}: optimal {optimal_cost} > fixed {fixed_cost}");
        }
    }

    #[test]
    fn optimal_assignment_is_a_permutation_for_random_inputs_up_to_twelve() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};
        let mut rng = StdRng::seed_from_u64(999);
        for n in 1..=12 {
            let start: Vec<Position> = (0..n).map(|_| Position::new(rng.random::<f64>() * 20.0, rng.random::<f64>() * 20.0)).collect();
            let end: Vec<Position> = (0..n).map(|_| Position::new(rng.random::<f64>() * 20.0, rng.random::<f64>() * 20.0)).collect();
            let result = solve(&start, &end, &AssignmentMode::Optimal).unwrap();
            let mut indices: Vec<usize> = result.iter().map(|a| a.end_index).collect();
            indices.sort_unstable();
            indices.dedup();
            assert_eq!(indices.len(), n, "n={n}: assignment was not a permutation");
        }
    }

    #[test]
    fn locked_id_out_of_range_is_a_shape_mismatch() {
        let start = positions(&[(0.0, 0.0), (5.0, 0.0)]);
        let end = positions(&[(1.0, 1.0), (6.0, 1.0)]);
        let locked: HashSet<DancerId> = [DancerId(99)].into_iter().collect();
        let err = solve(&start, &end, &AssignmentMode::Partial { locked }).unwrap_err();
        assert!(matches!(err, PlanError::ShapeMismatch { .. }));
    }

    #[test]
    fn optimal_assignment_is_a_permutation() {
        let start = positions(&[(0.0, 0.0), (5.0, 0.0), (10.0, 0.0), (15.0, 0.0)]);
        let end = positions(&[(15.0, 5.0), (0.0, 5.0), (10.0, 5.0), (5.0, 5.0)]);
        let result = solve(&start, &end, &AssignmentMode::Optimal).unwrap();
        let mut indices: Vec<usize> = result.iter().map(|a| a.end_index).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn partial_with_no_locks_equals_optimal() {
        let start = positions(&[(0.0, 0.0), (5.0, 0.0), (10.0, 0.0)]);
        let end = positions(&[(10.0, 5.0), (0.0, 5.0), (5.0, 5.0)]);
        let partial = solve(&start, &end, &AssignmentMode::Partial { locked: HashSet::new() }).unwrap();
        let optimal = solve(&start, &end, &AssignmentMode::Optimal).unwrap();
        assert_eq!(partial, optimal);
    }

    #[test]
    fn partial_with_all_locked_equals_fixed() {
        let start = positions(&[(0.0, 0.0), (5.0, 0.0), (10.0, 0.0)]);
        let end = positions(&[(10.0, 5.0), (0.0, 5.0), (5.0, 5.0)]);
        let all_locked: HashSet<DancerId> = (1..=3).map(DancerId).collect();
        let partial = solve(&start, &end, &AssignmentMode::Partial { locked: all_locked }).unwrap();
        let fixed = solve(&start, &end, &AssignmentMode::Fixed).unwrap();
        assert_eq!(partial, fixed);
    }

    #[test]
    fn partial_keeps_locked_identities_and_matches_remainder_optimally() {
        let start = positions(&[(0.0, 0.0), (5.0, 0.0), (10.0, 0.0), (15.0, 0.0)]);
        let end = positions(&[(15.0, 5.0), (0.0, 5.0), (10.0, 5.0), (5.0, 5.0)]);
        let locked: HashSet<DancerId> = [DancerId(1), DancerId(4)].into_iter().collect();
        let result = solve(&start, &end, &AssignmentMode::Partial { locked }).unwrap();
        assert_eq!(result[0].end_index, 0);
        assert_eq!(result[3].end_index, 3);
        let mut remaining: Vec<usize> = vec![result[1].end_index, result[2].end_index];
        remaining.sort_unstable();
        assert_eq!(remaining, vec![1, 2]);
    }
}
