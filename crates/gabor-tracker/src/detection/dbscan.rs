//! Density-based clustering (DBSCAN) of 2-D points.
//!
//! Neighbourhoods are inclusive (`distance <= radius`) and contain the point
//! itself. A point is a core point when its neighbourhood holds at least
//! `min_points` members. Clusters are grown from core points in input order;
//! a border point reachable from several clusters joins the first one that
//! reaches it. Points reachable from no core point are noise.

use std::collections::HashMap;

/// Cluster label of a single point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterLabel {
    /// Not density-reachable from any core point
    Noise,
    /// Member of cluster `n` (0-based, in discovery order)
    Cluster(usize),
}

/// DBSCAN parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dbscan {
    radius: f32,
    min_points: usize,
}

impl Dbscan {
    /// Create a clusterer; callers validate `radius > 0` and `min_points > 0`.
    pub fn new(radius: f32, min_points: usize) -> Self {
        Self { radius, min_points }
    }

    /// Neighbourhood radius
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Core-point threshold
    pub fn min_points(&self) -> usize {
        self.min_points
    }

    /// Label every point.
    pub fn fit(&self, points: &[[f32; 2]]) -> Vec<ClusterLabel> {
        let neighbourhoods = self.neighbourhoods(points);
        let is_core: Vec<bool> = neighbourhoods
            .iter()
            .map(|n| n.len() >= self.min_points)
            .collect();

        let mut labels: Vec<Option<usize>> = vec![None; points.len()];
        let mut next_label = 0usize;
        let mut stack: Vec<usize> = Vec::new();

        for seed in 0..points.len() {
            if labels[seed].is_some() || !is_core[seed] {
                continue;
            }

            let mut i = seed;
            loop {
                if labels[i].is_none() {
                    labels[i] = Some(next_label);
                    if is_core[i] {
                        stack.extend(
                            neighbourhoods[i]
                                .iter()
                                .copied()
                                .filter(|&v| labels[v].is_none()),
                        );
                    }
                }
                match stack.pop() {
                    Some(v) => i = v,
                    None => break,
                }
            }
            next_label += 1;
        }

        labels
            .into_iter()
            .map(|l| l.map_or(ClusterLabel::Noise, ClusterLabel::Cluster))
            .collect()
    }

    /// Group point indices by cluster, in label order. Noise is dropped.
    pub fn clusters(&self, points: &[[f32; 2]]) -> Vec<Vec<usize>> {
        let labels = self.fit(points);
        let count = labels
            .iter()
            .filter_map(|l| match l {
                ClusterLabel::Cluster(c) => Some(c + 1),
                ClusterLabel::Noise => None,
            })
            .max()
            .unwrap_or(0);

        let mut groups = vec![Vec::new(); count];
        for (idx, label) in labels.iter().enumerate() {
            if let ClusterLabel::Cluster(c) = label {
                groups[*c].push(idx);
            }
        }
        groups
    }

    /// Radius neighbourhood of every point via a uniform grid with cell
    /// side `radius`; only the 3x3 surrounding cells are scanned.
    fn neighbourhoods(&self, points: &[[f32; 2]]) -> Vec<Vec<usize>> {
        let cell = self.radius.max(f32::EPSILON);
        let key = |p: &[f32; 2]| ((p[0] / cell).floor() as i64, (p[1] / cell).floor() as i64);

        let mut grid: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
        for (idx, p) in points.iter().enumerate() {
            grid.entry(key(p)).or_default().push(idx);
        }

        let r2 = self.radius * self.radius;
        points
            .iter()
            .map(|p| {
                let (cx, cy) = key(p);
                let mut found = Vec::new();
                for gx in cx - 1..=cx + 1 {
                    for gy in cy - 1..=cy + 1 {
                        let Some(bucket) = grid.get(&(gx, gy)) else {
                            continue;
                        };
                        for &j in bucket {
                            let q = &points[j];
                            let (dx, dy) = (p[0] - q[0], p[1] - q[1]);
                            if dx * dx + dy * dy <= r2 {
                                found.push(j);
                            }
                        }
                    }
                }
                found.sort_unstable();
                found
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(row: f32, col: f32, side: usize) -> Vec<[f32; 2]> {
        (0..side)
            .flat_map(|r| (0..side).map(move |c| [row + r as f32, col + c as f32]))
            .collect()
    }

    #[test]
    fn test_two_separated_blobs() {
        let mut points = blob(0.0, 0.0, 4);
        points.extend(blob(20.0, 20.0, 4));
        let clusters = Dbscan::new(3.0, 15).clusters(&points);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0], (0..16).collect::<Vec<_>>());
        assert_eq!(clusters[1], (16..32).collect::<Vec<_>>());
    }

    #[test]
    fn test_sparse_points_are_noise() {
        let points: Vec<[f32; 2]> = (0..10).map(|i| [i as f32 * 10.0, 0.0]).collect();
        let labels = Dbscan::new(3.0, 2).fit(&points);
        assert!(labels.iter().all(|l| *l == ClusterLabel::Noise));
    }

    #[test]
    fn test_neighbourhood_is_inclusive_and_counts_self() {
        // two points exactly `radius` apart, min_points 2: both core
        let points = vec![[0.0, 0.0], [3.0, 0.0]];
        let labels = Dbscan::new(3.0, 2).fit(&points);
        assert_eq!(labels, vec![ClusterLabel::Cluster(0), ClusterLabel::Cluster(0)]);

        // a single point with min_points 1 is its own cluster
        let labels = Dbscan::new(3.0, 1).fit(&[[5.0, 5.0]]);
        assert_eq!(labels, vec![ClusterLabel::Cluster(0)]);
    }

    #[test]
    fn test_border_point_joins_first_cluster() {
        // Core groups at x=0 and x=6; the border point at x=3 is within
        // radius of both cores but is not a core itself.
        let points = vec![
            [0.0, 0.0],
            [0.0, 0.5],
            [0.0, -0.5],
            [3.0, 0.0],
            [6.0, 0.0],
            [6.0, 0.5],
            [6.0, -0.5],
        ];
        let labels = Dbscan::new(3.0, 4).fit(&points);
        assert_eq!(labels[0], ClusterLabel::Cluster(0));
        assert_eq!(labels[3], ClusterLabel::Cluster(0));
        assert_eq!(labels[4], ClusterLabel::Cluster(1));
    }

    #[test]
    fn test_empty_input() {
        assert!(Dbscan::new(3.0, 15).clusters(&[]).is_empty());
    }
}
