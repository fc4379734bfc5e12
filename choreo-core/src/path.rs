//! Time-parameterized path generation: straight-line and quadratic-Bézier detours.

use crate::types::{DancerId, Position, Stage};
use serde::{Deserialize, Serialize};

/// Perpendicular offset scale applied to curved detours.
const CURVE_KAPPA: f64 = 0.35;
/// Margin every generated point must stay within of the stage bounds.
const STAGE_MARGIN: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub x: f64,
    pub y: f64,
    pub t: f64,
}

impl PathPoint {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DancerPath {
    pub dancer: DancerId,
    pub points: Vec<PathPoint>,
    pub start_time: f64,
    pub speed: f64,
}

impl DancerPath {
    pub fn start_point(&self) -> &PathPoint {
        self.points.first().expect("a path always has >= 2 points")
    }

    pub fn end_point(&self) -> &PathPoint {
        self.points.last().expect("a path always has >= 2 points")
    }

    /// Sum of Euclidean segment lengths, used by the smoothness/symmetry metrics.
    pub fn arc_length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| w[0].position().distance(&w[1].position()))
            .sum()
    }

    /// Linearly interpolated position at time `t`, clamped to the path's own time range.
    pub fn position_at(&self, t: f64) -> Position {
        if t <= self.points[0].t {
            return self.points[0].position();
        }
        let last = self.points.len() - 1;
        if t >= self.points[last].t {
            return self.points[last].position();
        }
        for w in self.points.windows(2) {
            let (a, b) = (w[0], w[1]);
            if t >= a.t && t <= b.t {
                let span = b.t - a.t;
                let local_t = if span <= 0.0 { 0.0 } else { (t - a.t) / span };
                return a.position().lerp(&b.position(), local_t);
            }
        }
        self.points[last].position()
    }
}

/// Which side of the start→end segment a curved detour bows out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveSide {
    Left,
    Right,
}

/// Deterministic side choice: left-of-stage-center dancers curve left;
/// on the centerline, break the tie by dancer id parity.
pub fn curve_side_for(dancer: DancerId, start: &Position, stage: &Stage) -> CurveSide {
    let center_x = stage.width / 2.0;
    if start.x < center_x {
        CurveSide::Left
    } else if start.x > center_x {
        CurveSide::Right
    } else if dancer.0 % 2 == 1 {
        CurveSide::Left
    } else {
        CurveSide::Right
    }
}

fn clamp_to_stage(p: Position, stage: &Stage) -> Position {
    Position::new(
        p.x.clamp(-STAGE_MARGIN, stage.width + STAGE_MARGIN),
        p.y.clamp(-STAGE_MARGIN, stage.height + STAGE_MARGIN),
    )
}

/// Straight-line path with `samples` points spanning `[start_time, total_counts]`.
pub fn straight_line(
    dancer: DancerId,
    start: &Position,
    end: &Position,
    start_time: f64,
    total_counts: f64,
    samples: usize,
    speed: f64,
    stage: &Stage,
) -> DancerPath {
    let samples = samples.max(2);
    let mut points = Vec::with_capacity(samples);
    for i in 0..samples {
        let t_frac = i as f64 / (samples - 1) as f64;
        let t = start_time + (total_counts - start_time) * t_frac;
        let pos = clamp_to_stage(start.lerp(end, t_frac), stage);
        points.push(PathPoint { x: pos.x, y: pos.y, t });
    }
    // Exact endpoints regardless of clamping/rounding in the interior samples.
    points[0] = PathPoint { x: start.x, y: start.y, t: start_time };
    let last = points.len() - 1;
    points[last] = PathPoint { x: end.x, y: end.y, t: total_counts };
    DancerPath { dancer, points, start_time, speed }
}

/// Quadratic-Bézier detour path with a single control point offset perpendicular to the
/// start→end chord by `curvature * segment_length * CURVE_KAPPA`.
pub fn curved(
    dancer: DancerId,
    start: &Position,
    end: &Position,
    start_time: f64,
    total_counts: f64,
    samples: usize,
    speed: f64,
    curvature: f64,
    stage: &Stage,
) -> DancerPath {
    let samples = samples.max(2);
    let curvature = curvature.clamp(0.0, 1.0);
    let segment_length = start.distance(end);
    let (dx, dy) = start.unit_vector_to(end);
    let (perp_x, perp_y) = match curve_side_for(dancer, start, stage) {
        CurveSide::Left => (-dy, dx),
        CurveSide::Right => (dy, -dx),
    };
    let offset = curvature * segment_length * CURVE_KAPPA;
    let mid = start.lerp(end, 0.5);
    let control = Position::new(mid.x + perp_x * offset, mid.y + perp_y * offset);

    let mut points = Vec::with_capacity(samples);
    for i in 0..samples {
        let t_frac = i as f64 / (samples - 1) as f64;
        let t = start_time + (total_counts - start_time) * t_frac;
        let one_minus_t = 1.0 - t_frac;
        let x = one_minus_t * one_minus_t * start.x
            + 2.0 * one_minus_t * t_frac * control.x
            + t_frac * t_frac * end.x;
        let y = one_minus_t * one_minus_t * start.y
            + 2.0 * one_minus_t * t_frac * control.y
            + t_frac * t_frac * end.y;
        let pos = clamp_to_stage(Position::new(x, y), stage);
        points.push(PathPoint { x: pos.x, y: pos.y, t });
    }
    points[0] = PathPoint { x: start.x, y: start.y, t: start_time };
    let last = points.len() - 1;
    points[last] = PathPoint { x: end.x, y: end.y, t: total_counts };
    DancerPath { dancer, points, start_time, speed }
}
