//! Rectangular linear assignment problem solver (Hungarian algorithm,
//! O(n^3) via shortest augmenting paths with potentials).
//!
//! Used to pair up extra-occupied squares with missing-occupied squares
//! during correction-mode LED guidance, minimizing total Manhattan
//! distance. Mirrors `scipy.optimize.linear_sum_assignment`'s contract:
//! callers only need the assignment, not the solver internals.

/// Solve the assignment problem for a (possibly rectangular) cost matrix.
///
/// Returns, for each row, the assigned column index, or `None` if that row
/// has no counterpart (padding absorbed it). `cost` must be non-empty and
/// rectangular (every row the same length).
pub fn solve(cost: &[Vec<f64>]) -> Vec<Option<usize>> {
    let rows = cost.len();
    let cols = cost[0].len();
    let n = rows.max(cols);

    // Pad to a square matrix. Padding cells are zero-cost: they only ever
    // absorb the rows/columns that have no real counterpart, since any
    // real-to-real pairing with finite cost is preferred by the minimizer
    // whenever a real counterpart is available.
    let mut padded = vec![vec![0.0f64; n]; n];
    for (r, row) in cost.iter().enumerate() {
        padded[r][..cols].copy_from_slice(row);
    }

    let assignment = hungarian(&padded);

    (0..rows)
        .map(|r| {
            let c = assignment[r];
            if c < cols {
                Some(c)
            } else {
                None
            }
        })
        .collect()
}

/// Classic O(n^3) Hungarian algorithm on a square cost matrix. Returns
/// `col[row]` for every row. 1-indexed internally per the standard
/// formulation; translated back to 0-indexed on return.
fn hungarian(cost: &[Vec<f64>]) -> Vec<usize> {
    let n = cost.len();
    const INF: f64 = f64::INFINITY;

    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; n + 1];
    let mut p = vec![0usize; n + 1]; // p[j] = row assigned to column j
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
                if !used[j] {
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

    let mut result = vec![0usize; n];
    for j in 1..=n {
        if p[j] != 0 {
            result[p[j] - 1] = j - 1;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_trivial_square_matrix() {
        let cost = vec![vec![1.0, 2.0], vec![2.0, 1.0]];
        let result = solve(&cost);
        assert_eq!(result, vec![Some(0), Some(1)]);
    }

    #[test]
    fn prefers_lower_total_cost_over_identity() {
        let cost = vec![vec![1.0, 10.0], vec![10.0, 1.0]];
        assert_eq!(solve(&cost), vec![Some(0), Some(1)]);
        let cost2 = vec![vec![10.0, 1.0], vec![1.0, 10.0]];
        assert_eq!(solve(&cost2), vec![Some(1), Some(0)]);
    }

    #[test]
    fn rectangular_more_rows_than_cols_leaves_excess_unassigned() {
        // 3 extras, 1 missing: exactly one extra should pair up.
        let cost = vec![vec![5.0], vec![1.0], vec![9.0]];
        let result = solve(&cost);
        let assigned: Vec<_> = result.iter().filter(|a| a.is_some()).collect();
        assert_eq!(assigned.len(), 1);
        assert_eq!(result[1], Some(0)); // cheapest row gets the real column
    }

    #[test]
    fn rectangular_more_cols_than_rows_assigns_every_row() {
        let cost = vec![vec![4.0, 1.0, 9.0]];
        let result = solve(&cost);
        assert_eq!(result, vec![Some(1)]);
    }
}
