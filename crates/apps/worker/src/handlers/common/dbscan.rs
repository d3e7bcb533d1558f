//! Plain DBSCAN over Euclidean distance.

use std::collections::VecDeque;

pub const NOISE: i32 = -1;
const UNVISITED: i32 = -2;

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

// A point is its own neighbour, as in the usual formulation.
fn region_query(points: &[Vec<f32>], idx: usize, eps: f32) -> Vec<usize> {
    points
        .iter()
        .enumerate()
        .filter(|(_, other)| euclidean(&points[idx], other) <= eps)
        .map(|(i, _)| i)
        .collect()
}

/// Labels each point with a cluster index starting at 0, or [`NOISE`].
///
/// Clusters are numbered in the order their first core point appears, so the
/// same input always gives the same labels.
#[must_use]
pub fn dbscan(points: &[Vec<f32>], eps: f32, min_samples: usize) -> Vec<i32> {
    let mut labels = vec![UNVISITED; points.len()];
    let mut next_label = 0;

    for i in 0..points.len() {
        if labels[i] != UNVISITED {
            continue;
        }
        let neighbours = region_query(points, i, eps);
        if neighbours.len() < min_samples {
            labels[i] = NOISE;
            continue;
        }

        labels[i] = next_label;
        let mut queue: VecDeque<usize> = neighbours.into();
        while let Some(j) = queue.pop_front() {
            if labels[j] == NOISE {
                // Border point, reachable but not core.
                labels[j] = next_label;
            }
            if labels[j] != UNVISITED {
                continue;
            }
            labels[j] = next_label;
            let reachable = region_query(points, j, eps);
            if reachable.len() >= min_samples {
                queue.extend(reachable);
            }
        }
        next_label += 1;
    }

    labels
}
