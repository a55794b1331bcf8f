//! Track/detection assignment helpers.
//!
//! Both solvers take a gated cost matrix `costs[track][detection]` in which
//! pairs that must never match hold `f64::MAX`. They return a vector of
//! length `n_tracks` where entry `i` is `Some(det_idx)` if track `i` was
//! assigned, or `None` otherwise.

/// Greedy nearest-neighbour assignment.
///
/// Gated pairs are taken in ascending `(cost, track, detection)` order; a
/// pair is accepted when neither side is already used. Track order is the
/// caller's (ascending id), which makes ties deterministic.
pub fn greedy_assign(costs: &[Vec<f64>], n_tracks: usize, n_obs: usize) -> Vec<Option<usize>> {
    let mut pairs: Vec<(f64, usize, usize)> = Vec::new();
    for (ti, row) in costs.iter().enumerate().take(n_tracks) {
        for (oi, &c) in row.iter().enumerate().take(n_obs) {
            if c < f64::MAX {
                pairs.push((c, ti, oi));
            }
        }
    }
    pairs.sort_by(|a, b| {
        a.0.total_cmp(&b.0)
            .then(a.1.cmp(&b.1))
            .then(a.2.cmp(&b.2))
    });

    let mut assignment = vec![None; n_tracks];
    let mut obs_used = vec![false; n_obs];
    for (_, ti, oi) in pairs {
        if assignment[ti].is_some() || obs_used[oi] {
            continue;
        }
        assignment[ti] = Some(oi);
        obs_used[oi] = true;
    }

    assignment
}

/// Hungarian algorithm (Kuhn–Munkres) for minimum-cost assignment.
///
/// The matrix is padded to square with a large penalty standing in for gated
/// cells; penalised pairs are dropped from the result. Among assignments
/// with the most gated matches, the total cost is minimal.
///
/// Complexity: O(n³) with `n = max(n_tracks, n_obs)`.
pub fn hungarian_assign(costs: &[Vec<f64>], n_tracks: usize, n_obs: usize) -> Vec<Option<usize>> {
    let n = n_tracks.max(n_obs);
    if n_tracks == 0 || n_obs == 0 {
        return vec![None; n_tracks];
    }

    // Penalty larger than any sum of real costs.
    let finite_sum: f64 = costs
        .iter()
        .flat_map(|row| row.iter().copied())
        .filter(|&c| c < f64::MAX)
        .map(f64::abs)
        .sum();
    let penalty = (finite_sum + 1.0) * (n as f64 + 1.0);

    let cost = |i: usize, j: usize| -> f64 {
        if i < n_tracks && j < n_obs && costs[i][j] < f64::MAX {
            costs[i][j]
        } else {
            penalty
        }
    };

    // 1-based potentials with a virtual column 0
    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; n + 1];
    let mut col_owner = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];

    for row in 1..=n {
        col_owner[0] = row;
        let mut j0 = 0usize;
        let mut min_to = vec![f64::INFINITY; n + 1];
        let mut used = vec![false; n + 1];

        loop {
            used[j0] = true;
            let i0 = col_owner[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;

            for j in 1..=n {
                if used[j] {
                    continue;
                }
                let reduced = cost(i0 - 1, j - 1) - u[i0] - v[j];
                if reduced < min_to[j] {
                    min_to[j] = reduced;
                    way[j] = j0;
                }
                if min_to[j] < delta {
                    delta = min_to[j];
                    j1 = j;
                }
            }

            for j in 0..=n {
                if used[j] {
                    u[col_owner[j]] += delta;
                    v[j] -= delta;
                } else {
                    min_to[j] -= delta;
                }
            }

            j0 = j1;
            if col_owner[j0] == 0 {
                break;
            }
        }

        // Unwind the augmenting path
        loop {
            let j1 = way[j0];
            col_owner[j0] = col_owner[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut assignment = vec![None; n_tracks];
    for j in 1..=n {
        let i = col_owner[j];
        if i == 0 {
            continue;
        }
        let (ti, oi) = (i - 1, j - 1);
        if ti < n_tracks && oi < n_obs && costs[ti][oi] < f64::MAX {
            assignment[ti] = Some(oi);
        }
    }
    assignment
}
