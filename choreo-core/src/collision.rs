//! Collision detection and resolution: staggered start times, then curved detours.

use crate::path::{curved, straight_line, DancerPath};
use crate::types::{DancerId, Position, Stage};
use std::cmp::Ordering;
use std::collections::HashMap;

/// A pair of dancers observed closer than the collision radius at some sampled instant.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionPair {
    pub a: DancerId,
    pub b: DancerId,
    pub min_distance: f64,
}

/// Sample `paths` on a regular time grid and report every pair that ever comes within
/// `radius` of each other, along with the minimum distance observed for that pair.
pub fn detect(paths: &[DancerPath], radius: f64, grid_samples: usize) -> Vec<CollisionPair> {
    let grid_samples = grid_samples.max(2);
    if paths.len() < 2 {
        return Vec::new();
    }
    let t_max = paths
        .iter()
        .map(|p| p.end_point().t)
        .fold(0.0_f64, f64::max);

    let mut pair_min: HashMap<(usize, usize), f64> = HashMap::new();
    for step in 0..grid_samples {
        let frac = step as f64 / (grid_samples - 1) as f64;
        let t = t_max * frac;
        let positions: Vec<Position> = paths.iter().map(|p| p.position_at(t)).collect();
        for i in 0..paths.len() {
            for j in (i + 1)..paths.len() {
                let d = positions[i].distance(&positions[j]);
                let entry = pair_min.entry((i, j)).or_insert(f64::INFINITY);
                if d < *entry {
                    *entry = d;
                }
            }
        }
    }

    let mut out: Vec<CollisionPair> = pair_min
        .into_iter()
        .filter(|(_, d)| *d < radius)
        .map(|((i, j), d)| CollisionPair {
            a: paths[i].dancer,
            b: paths[j].dancer,
            min_distance: d,
        })
        .collect();
    out.sort_by_key(|c| (c.a.0, c.b.0));
    out
}

fn index_of(paths: &[DancerPath], id: DancerId) -> usize {
    paths
        .iter()
        .position(|p| p.dancer == id)
        .expect("collision pair must reference a dancer present in the path set")
}

fn regenerate(
    path: &DancerPath,
    new_start_time: f64,
    curvature: f64,
    stage: &Stage,
    total_counts: f64,
    samples: usize,
) -> DancerPath {
    let start = path.start_point().position();
    let end = path.end_point().position();
    if curvature <= 0.0 {
        straight_line(path.dancer, &start, &end, new_start_time, total_counts, samples, path.speed, stage)
    } else {
        curved(
            path.dancer,
            &start,
            &end,
            new_start_time,
            total_counts,
            samples,
            path.speed,
            curvature,
            stage,
        )
    }
}

/// `Less` means `a` has strictly higher precedence (lower priority number, processed
/// first) than `b`. `None` if either dancer has no declared priority, or both tie.
fn priority_cmp(priority: Option<&HashMap<DancerId, u32>>, a: DancerId, b: DancerId) -> Option<Ordering> {
    let map = priority?;
    let pa = map.get(&a)?;
    let pb = map.get(&b)?;
    if pa == pb {
        None
    } else {
        Some(pa.cmp(pb))
    }
}

fn apply_delay_sweep(
    paths: &mut [DancerPath],
    collisions: &[CollisionPair],
    total_counts: f64,
    stage: &Stage,
    samples: usize,
    curvatures: &[f64],
    priority: Option<&HashMap<DancerId, u32>>,
) {
    let delta = 0.1 * total_counts;
    let cap = total_counts / 2.0;
    let mut to_delay: Vec<usize> = Vec::new();
    for pair in collisions {
        let ia = index_of(paths, pair.a);
        let ib = index_of(paths, pair.b);
        // A declared priority (ascending) takes precedence over the start_time/
        // arc_length fallback: the lower-priority-number dancer keeps moving, the
        // other yields.
        let later = match priority_cmp(priority, pair.a, pair.b) {
            Some(Ordering::Less) => ib,
            Some(Ordering::Greater) => ia,
            _ => {
                if paths[ia].start_time > paths[ib].start_time {
                    ia
                } else if paths[ib].start_time > paths[ia].start_time {
                    ib
                } else if paths[ia].arc_length() <= paths[ib].arc_length() {
                    ia
                } else {
                    ib
                }
            }
        };
        if !to_delay.contains(&later) {
            to_delay.push(later);
        }
    }
    for idx in to_delay {
        let new_start = (paths[idx].start_time + delta).min(cap);
        paths[idx] = regenerate(&paths[idx], new_start, curvatures[idx], stage, total_counts, samples);
    }
}

fn apply_curve_sweep(
    paths: &mut [DancerPath],
    collisions: &[CollisionPair],
    curvature: f64,
    stage: &Stage,
    total_counts: f64,
    samples: usize,
    curvatures: &mut [f64],
) {
    let mut involved: Vec<usize> = Vec::new();
    for pair in collisions {
        let ia = index_of(paths, pair.a);
        let ib = index_of(paths, pair.b);
        for idx in [ia, ib] {
            if !involved.contains(&idx) {
                involved.push(idx);
            }
        }
    }
    for idx in involved {
        curvatures[idx] = curvature;
        let start_time = paths[idx].start_time;
        paths[idx] = regenerate(&paths[idx], start_time, curvature, stage, total_counts, samples);
    }
}

/// Resolve collisions in place via a three-stage strategy. Returns the final
/// `collisionCount` (0 if fully resolved, or the count remaining once the attempt
/// budget is exhausted — never an error; collisions are data, not a failure mode).
///
/// `priority` is the per-dancer `dancerHints.priority` map from a `PreConstraint`, if
/// one is in effect; when two colliding dancers both declare a priority, the one with
/// the higher (ascending) value is delayed instead of the default start_time/arc_length
/// tie-break.
pub fn resolve(
    paths: &mut Vec<DancerPath>,
    stage: &Stage,
    total_counts: f64,
    samples: usize,
    radius: f64,
    attempt_budget: usize,
    priority: Option<&HashMap<DancerId, u32>>,
) -> usize {
    let mut curvatures = vec![0.0f64; paths.len()];
    let curve_levels = [0.3, 0.5, 0.8];
    let detection_grid = samples.max(2);
    let mut attempt = 0usize;
    loop {
        let collisions = detect(paths, radius, detection_grid);
        if collisions.is_empty() {
            return 0;
        }
        if attempt >= attempt_budget {
            return collisions.len();
        }
        let phase = attempt % 4;
        if phase == 0 {
            apply_delay_sweep(paths, &collisions, total_counts, stage, samples, &curvatures, priority);
        } else {
            let c = curve_levels[phase - 1];
            apply_curve_sweep(paths, &collisions, c, stage, total_counts, samples, &mut curvatures);
        }
        attempt += 1;
    }
}
