//! Candidate metric evaluation: collisions, symmetry, smoothness, crossings, timing.

use crate::collision::detect;
use crate::path::DancerPath;
use crate::types::{Position, Stage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateMetrics {
    pub collision_count: usize,
    pub symmetry_score: f64,
    pub path_smoothness: f64,
    pub crossing_count: usize,
    pub max_delay: f64,
    pub simultaneous_arrival: f64,
}

const ARRIVAL_EPS: f64 = 1e-9;

/// Evaluate every metric for one candidate's paths, against the assignment's straight
/// start→end chords (for crossing detection) and stage dimensions (for symmetry).
pub fn evaluate(paths: &[DancerPath], stage: &Stage, radius: f64, samples: usize, total_counts: f64) -> CandidateMetrics {
    let dense_grid = (2 * samples).max(4);
    CandidateMetrics {
        collision_count: detect(paths, radius, dense_grid).len(),
        symmetry_score: symmetry_score(paths, stage, dense_grid),
        path_smoothness: path_smoothness(paths),
        crossing_count: crossing_count(paths),
        max_delay: max_delay(paths),
        simultaneous_arrival: simultaneous_arrival(paths, total_counts),
    }
}

fn max_delay(paths: &[DancerPath]) -> f64 {
    paths.iter().map(|p| p.start_time).fold(0.0_f64, f64::max)
}

/// The instant a dancer is effectively "there": if start and end coincide the dancer
/// never needs to move, so its arrival is immediate; otherwise it arrives when its
/// path's last sample reaches the end position, at `t = totalCounts`.
fn arrival_time(path: &DancerPath, total_counts: f64) -> f64 {
    let start = path.start_point().position();
    let end = path.end_point().position();
    if start.approx_eq(&end, ARRIVAL_EPS) {
        path.start_time
    } else {
        total_counts
    }
}

fn simultaneous_arrival(paths: &[DancerPath], total_counts: f64) -> f64 {
    if paths.is_empty() {
        return 100.0;
    }
    let arrivals: Vec<f64> = paths.iter().map(|p| arrival_time(p, total_counts)).collect();
    let min = arrivals.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = arrivals.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let spread = (max - min).max(0.0);
    let half = total_counts / 2.0;
    if half <= 0.0 {
        return 100.0;
    }
    (100.0 * (1.0 - spread / half)).clamp(0.0, 100.0)
}

/// Sum of absolute turning angle between consecutive segments, averaged per dancer and
/// mapped through a saturating transform so a single runaway path can't blow past 0..100.
fn path_smoothness(paths: &[DancerPath]) -> f64 {
    if paths.is_empty() {
        return 100.0;
    }
    let mut total = 0.0;
    for path in paths {
        total += angular_change(path);
    }
    let avg = total / paths.len() as f64;
    100.0 / (1.0 + avg)
}

fn angular_change(path: &DancerPath) -> f64 {
    if path.points.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    let mut prev_dir: Option<(f64, f64)> = None;
    for w in path.points.windows(2) {
        let dx = w[1].x - w[0].x;
        let dy = w[1].y - w[0].y;
        let len = (dx * dx + dy * dy).sqrt();
        if len <= ARRIVAL_EPS {
            continue;
        }
        let dir = (dx / len, dy / len);
        if let Some((px, py)) = prev_dir {
            let dot = (px * dir.0 + py * dir.1).clamp(-1.0, 1.0);
            sum += dot.acos();
        }
        prev_dir = Some(dir);
    }
    sum
}

/// Pair each dancer with the start-formation dancer closest to its mirror point
/// `(W - x, y)`, greedily and without reuse; used only by `symmetry_score`.
fn mirror_pairs(paths: &[DancerPath], stage: &Stage) -> Vec<(usize, usize)> {
    let n = paths.len();
    let starts: Vec<Position> = paths.iter().map(|p| p.start_point().position()).collect();
    let mut used = vec![false; n];
    let mut pairs = Vec::new();
    for i in 0..n {
        if used[i] {
            continue;
        }
        let mirror = Position::new(stage.width - starts[i].x, starts[i].y);
        let mut best: Option<(usize, f64)> = None;
        for j in 0..n {
            if j == i || used[j] {
                continue;
            }
            let d = starts[j].distance(&mirror);
            if best.is_none_or(|(_, bd)| d < bd) {
                best = Some((j, d));
            }
        }
        if let Some((j, _)) = best {
            used[i] = true;
            used[j] = true;
            pairs.push((i, j));
        }
    }
    pairs
}

fn symmetry_score(paths: &[DancerPath], stage: &Stage, grid_samples: usize) -> f64 {
    let pairs = mirror_pairs(paths, stage);
    if pairs.is_empty() {
        return 100.0;
    }
    let t_max = paths.iter().map(|p| p.end_point().t).fold(0.0_f64, f64::max);
    let grid_samples = grid_samples.max(2);

    let mut total_deviation = 0.0;
    let mut samples_counted = 0usize;
    for (i, j) in &pairs {
        for step in 0..grid_samples {
            let frac = step as f64 / (grid_samples - 1) as f64;
            let t = t_max * frac;
            let pa = paths[*i].position_at(t);
            let pb = paths[*j].position_at(t);
            total_deviation += (stage.width - pa.x - pb.x).abs() + (pa.y - pb.y).abs();
            samples_counted += 1;
        }
    }
    if samples_counted == 0 {
        return 100.0;
    }
    let mean_deviation = total_deviation / samples_counted as f64;
    let threshold = stage.width / 3.0;
    if threshold <= 0.0 {
        return 100.0;
    }
    (100.0 * (1.0 - mean_deviation / threshold)).clamp(0.0, 100.0)
}

/// Proper intersection test for two line segments, excluding shared endpoints.
fn segments_cross(a0: &Position, a1: &Position, b0: &Position, b1: &Position) -> bool {
    fn orientation(p: &Position, q: &Position, r: &Position) -> f64 {
        (q.x - p.x) * (r.y - p.y) - (q.y - p.y) * (r.x - p.x)
    }
    fn on_segment(p: &Position, q: &Position, r: &Position) -> bool {
        r.x >= p.x.min(q.x) && r.x <= p.x.max(q.x) && r.y >= p.y.min(q.y) && r.y <= p.y.max(q.y)
    }

    let d1 = orientation(b0, b1, a0);
    let d2 = orientation(b0, b1, a1);
    let d3 = orientation(a0, a1, b0);
    let d4 = orientation(a0, a1, b1);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0)) && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0)) {
        return true;
    }
    // Collinear touches count only as a crossing when one segment's interior point lies
    // strictly inside the other, not at a shared endpoint.
    if d1 == 0.0 && on_segment(b0, b1, a0) && !a0.approx_eq(b0, ARRIVAL_EPS) && !a0.approx_eq(b1, ARRIVAL_EPS) {
        return true;
    }
    if d2 == 0.0 && on_segment(b0, b1, a1) && !a1.approx_eq(b0, ARRIVAL_EPS) && !a1.approx_eq(b1, ARRIVAL_EPS) {
        return true;
    }
    false
}

fn crossing_count(paths: &[DancerPath]) -> usize {
    let n = paths.len();
    let mut count = 0;
    for i in 0..n {
        for j in (i + 1)..n {
            let a0 = paths[i].start_point().position();
            let a1 = paths[i].end_point().position();
            let b0 = paths[j].start_point().position();
            let b1 = paths[j].end_point().position();
            if segments_cross(&a0, &a1, &b0, &b1) {
                count += 1;
            }
        }
    }
    count
}
