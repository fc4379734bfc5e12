//! Candidate factory: runs assignment + path generation + collision resolution
//! K times under named strategy parameterizations.

use crate::assignment::{self, Assignment};
use crate::collision;
use crate::metrics::{self, CandidateMetrics};
use crate::path::{curved, straight_line, DancerPath};
use crate::preconstraint::{MovementOrder, PreConstraint};
use crate::types::{AssignmentMode, DancerId, Position, Stage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The closed set of strategy parameterizations a candidate can be built from.
/// Strings are only the boundary representation (`Serialize`/`Deserialize` via the
/// label), never the internal representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Strategy {
    DistanceLongestFirst,
    DistanceShortestFirst,
    TimingPriority,
    CurveAllowed,
    CenterPriority,
    ConstraintGuided(CurveBracket),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveBracket {
    Suggested,
    Lower,
    Upper,
}

impl Strategy {
    /// Stable string identifier; the boundary-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            Strategy::DistanceLongestFirst => "distance_longest_first",
            Strategy::DistanceShortestFirst => "distance_shortest_first",
            Strategy::TimingPriority => "timing_priority",
            Strategy::CurveAllowed => "curve_allowed",
            Strategy::CenterPriority => "center_priority",
            Strategy::ConstraintGuided(CurveBracket::Suggested) => "constraint_guided",
            Strategy::ConstraintGuided(CurveBracket::Lower) => "constraint_guided_lower",
            Strategy::ConstraintGuided(CurveBracket::Upper) => "constraint_guided_upper",
        }
    }
}

impl From<Strategy> for String {
    fn from(s: Strategy) -> Self {
        s.label().to_string()
    }
}

impl TryFrom<String> for Strategy {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "distance_longest_first" => Ok(Strategy::DistanceLongestFirst),
            "distance_shortest_first" => Ok(Strategy::DistanceShortestFirst),
            "timing_priority" => Ok(Strategy::TimingPriority),
            "curve_allowed" => Ok(Strategy::CurveAllowed),
            "center_priority" => Ok(Strategy::CenterPriority),
            "constraint_guided" => Ok(Strategy::ConstraintGuided(CurveBracket::Suggested)),
            "constraint_guided_lower" => Ok(Strategy::ConstraintGuided(CurveBracket::Lower)),
            "constraint_guided_upper" => Ok(Strategy::ConstraintGuided(CurveBracket::Upper)),
            other => Err(format!("unknown strategy label: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub strategy: Strategy,
    pub paths: Vec<DancerPath>,
    pub assignment: Vec<Assignment>,
    pub metrics: CandidateMetrics,
}

/// Everything the factory needs that does not vary across strategies.
pub struct FactoryParams<'a> {
    pub start: &'a [Position],
    pub end: &'a [Position],
    pub stage: &'a Stage,
    pub total_counts: f64,
    pub collision_radius: f64,
    pub samples_per_path: usize,
    pub assignment_mode: &'a AssignmentMode,
    pub resolver_attempt_budget: usize,
}

const BASELINE_STRATEGIES: [Strategy; 5] = [
    Strategy::DistanceLongestFirst,
    Strategy::DistanceShortestFirst,
    Strategy::TimingPriority,
    Strategy::CurveAllowed,
    Strategy::CenterPriority,
];

/// The five named strategies, each post-processed by the collision resolver and
/// evaluated.
pub fn generate_baseline_candidates(params: &FactoryParams) -> Result<Vec<Candidate>, crate::error::PlanError> {
    let assignment = assignment::solve(params.start, params.end, params.assignment_mode)?;
    BASELINE_STRATEGIES
        .iter()
        .map(|&strategy| Ok(build_baseline_candidate(strategy, &assignment, params)))
        .collect()
}

/// The `pre_and_rank` variant: 3 constraint-guided candidates plus 2 baselines
/// (`distance_longest_first`, `timing_priority`) for comparison.
pub fn generate_constraint_guided_candidates(
    params: &FactoryParams,
    pre_constraint: &PreConstraint,
) -> Result<Vec<Candidate>, crate::error::PlanError> {
    let assignment = assignment::solve(params.start, params.end, params.assignment_mode)?;

    let mut out = Vec::with_capacity(5);
    for bracket in [CurveBracket::Suggested, CurveBracket::Lower, CurveBracket::Upper] {
        out.push(build_constraint_guided_candidate(bracket, &assignment, params, pre_constraint));
    }
    out.push(build_baseline_candidate(Strategy::DistanceLongestFirst, &assignment, params));
    out.push(build_baseline_candidate(Strategy::TimingPriority, &assignment, params));
    Ok(out)
}

fn distance_from_center(pos: &Position, stage: &Stage) -> f64 {
    let center = Position::new(stage.width / 2.0, stage.height / 2.0);
    pos.distance(&center)
}

/// Ordering indices only affect initial generation order / determinism; the collision
/// resolver's own tie-breaking rules are order-independent by construction.
fn strategy_order(strategy: Strategy, assignment: &[Assignment], start: &[Position], end: &[Position], stage: &Stage) -> Vec<usize> {
    let n = assignment.len();
    let mut indices: Vec<usize> = (0..n).collect();
    match strategy {
        Strategy::DistanceLongestFirst | Strategy::CurveAllowed => {
            indices.sort_by(|&a, &b| {
                let da = start[a].distance(&end[assignment[a].end_index]);
                let db = start[b].distance(&end[assignment[b].end_index]);
                db.partial_cmp(&da).unwrap()
            });
        }
        Strategy::DistanceShortestFirst => {
            indices.sort_by(|&a, &b| {
                let da = start[a].distance(&end[assignment[a].end_index]);
                let db = start[b].distance(&end[assignment[b].end_index]);
                da.partial_cmp(&db).unwrap()
            });
        }
        Strategy::TimingPriority | Strategy::ConstraintGuided(_) => {}
        Strategy::CenterPriority => {
            indices.sort_by(|&a, &b| {
                let da = distance_from_center(&start[a], stage);
                let db = distance_from_center(&start[b], stage);
                da.partial_cmp(&db).unwrap()
            });
        }
    }
    indices
}

/// Derives a per-dancer start time from its rank in `order` (0 = moves first, spread
/// linearly across `min(0.4 * total_counts, total_counts / 2)`).
fn stagger_start_times(order: &[usize], total_counts: f64) -> Vec<f64> {
    let n = order.len();
    let mut start_times = vec![0.0; n];
    if n <= 1 {
        return start_times;
    }
    let span = (total_counts * 0.4).min(total_counts / 2.0);
    for (rank, &dancer_index) in order.iter().enumerate() {
        start_times[dancer_index] = span * (rank as f64) / ((n - 1) as f64);
    }
    start_times
}

fn build_baseline_candidate(strategy: Strategy, assignment: &[Assignment], params: &FactoryParams) -> Candidate {
    let order = strategy_order(strategy, assignment, params.start, params.end, params.stage);
    let start_times = if strategy == Strategy::TimingPriority {
        vec![0.0; assignment.len()]
    } else {
        stagger_start_times(&order, params.total_counts)
    };
    let curvature = if strategy == Strategy::CurveAllowed { 0.5 } else { 0.0 };

    let mut paths: Vec<DancerPath> = assignment
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let start = params.start[(a.dancer.0 - 1) as usize];
            let end = params.end[a.end_index];
            let start_time = start_times[i];
            if curvature > 0.0 {
                curved(a.dancer, &start, &end, start_time, params.total_counts, params.samples_per_path, 1.0, curvature, params.stage)
            } else {
                straight_line(a.dancer, &start, &end, start_time, params.total_counts, params.samples_per_path, 1.0, params.stage)
            }
        })
        .collect();

    let remaining = collision::resolve(
        &mut paths,
        params.stage,
        params.total_counts,
        params.samples_per_path,
        params.collision_radius,
        params.resolver_attempt_budget,
        None,
    );
    let _ = remaining; // final collisionCount is recomputed by the evaluator on the resolved paths

    let metrics = metrics::evaluate(&paths, params.stage, params.collision_radius, params.samples_per_path, params.total_counts);

    Candidate {
        id: strategy.label().to_string(),
        strategy,
        paths,
        assignment: assignment.to_vec(),
        metrics,
    }
}

fn build_constraint_guided_candidate(
    bracket: CurveBracket,
    assignment: &[Assignment],
    params: &FactoryParams,
    pre_constraint: &PreConstraint,
) -> Candidate {
    let strategy = Strategy::ConstraintGuided(bracket);
    let curvature = match bracket {
        CurveBracket::Suggested => pre_constraint.suggested_curve_amount,
        CurveBracket::Lower => (pre_constraint.suggested_curve_amount - 0.3).clamp(0.0, 1.0),
        CurveBracket::Upper => (pre_constraint.suggested_curve_amount + 0.3).clamp(0.0, 1.0),
    };

    let order = movement_order_indices(pre_constraint.movement_order, assignment, params.start, params.end, params.stage);
    let order_start_times = stagger_start_times(&order, params.total_counts);
    let half = params.total_counts / 2.0;

    let mut paths: Vec<DancerPath> = assignment
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let start = params.start[(a.dancer.0 - 1) as usize];
            let end = params.end[a.end_index];
            let hint = pre_constraint.hint_for(a.dancer);
            let start_time = ((hint.delay_ratio.clamp(0.0, 1.0) * half).min(half) + order_start_times[i]).min(half);
            let use_curve = hint.prefer_curve || curvature > 0.0;
            if use_curve {
                let c = if curvature > 0.0 { curvature } else { 0.5 };
                curved(a.dancer, &start, &end, start_time, params.total_counts, params.samples_per_path, 1.0, c, params.stage)
            } else {
                straight_line(a.dancer, &start, &end, start_time, params.total_counts, params.samples_per_path, 1.0, params.stage)
            }
        })
        .collect();

    let priority: HashMap<DancerId, u32> = pre_constraint
        .dancer_hints
        .iter()
        .filter_map(|(dancer, hint)| hint.priority.map(|p| (*dancer, p)))
        .collect();
    let priority_arg = if priority.is_empty() { None } else { Some(&priority) };

    collision::resolve(
        &mut paths,
        params.stage,
        params.total_counts,
        params.samples_per_path,
        params.collision_radius,
        params.resolver_attempt_budget,
        priority_arg,
    );

    let metrics = metrics::evaluate(&paths, params.stage, params.collision_radius, params.samples_per_path, params.total_counts);

    Candidate {
        id: strategy.label().to_string(),
        strategy,
        paths,
        assignment: assignment.to_vec(),
        metrics,
    }
}

fn movement_order_indices(
    order: MovementOrder,
    assignment: &[Assignment],
    start: &[Position],
    end: &[Position],
    stage: &Stage,
) -> Vec<usize> {
    let n = assignment.len();
    let mut indices: Vec<usize> = (0..n).collect();
    let center = Position::new(stage.width / 2.0, stage.height / 2.0);
    match order {
        MovementOrder::Simultaneous => {}
        MovementOrder::LongestFirst => indices.sort_by(|&a, &b| {
            let da = start[a].distance(&end[assignment[a].end_index]);
            let db = start[b].distance(&end[assignment[b].end_index]);
            db.partial_cmp(&da).unwrap()
        }),
        MovementOrder::ShortestFirst => indices.sort_by(|&a, &b| {
            let da = start[a].distance(&end[assignment[a].end_index]);
            let db = start[b].distance(&end[assignment[b].end_index]);
            da.partial_cmp(&db).unwrap()
        }),
        MovementOrder::CenterFirst => indices.sort_by(|&a, &b| {
            distance_from_center(&start[a], stage)
                .partial_cmp(&distance_from_center(&start[b], stage))
                .unwrap()
        }),
        MovementOrder::OuterFirst => indices.sort_by(|&a, &b| {
            distance_from_center(&start[b], stage)
                .partial_cmp(&distance_from_center(&start[a], stage))
                .unwrap()
        }),
        MovementOrder::WaveOutward => indices.sort_by(|&a, &b| {
            start[a].distance(&center).partial_cmp(&start[b].distance(&center)).unwrap()
        }),
        MovementOrder::WaveInward => indices.sort_by(|&a, &b| {
            start[b].distance(&center).partial_cmp(&start[a].distance(&center)).unwrap()
        }),
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AssignmentMode;

    fn small_params<'a>(start: &'a [Position], end: &'a [Position], stage: &'a Stage, mode: &'a AssignmentMode) -> FactoryParams<'a> {
        FactoryParams {
            start,
            end,
            stage,
            total_counts: 4.0,
            collision_radius: 0.5,
            samples_per_path: 10,
            assignment_mode: mode,
            resolver_attempt_budget: 8,
        }
    }

    #[test]
    fn generates_five_baseline_candidates_with_distinct_labels() {
        let start = vec![Position::new(1.0, 1.0), Position::new(3.0, 1.0)];
        let end = vec![Position::new(3.0, 3.0), Position::new(1.0, 3.0)];
        let stage = Stage { width: 4.0, height: 4.0 };
        let mode = AssignmentMode::Fixed;
        let params = small_params(&start, &end, &stage, &mode);
        let candidates = generate_baseline_candidates(&params).unwrap();
        assert_eq!(candidates.len(), 5);
        let mut labels: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), 5);
    }

    #[test]
    fn curve_allowed_candidate_has_no_collisions_for_the_swap_scenario() {
        let start = vec![Position::new(1.0, 2.0), Position::new(3.0, 2.0)];
        let end = vec![Position::new(3.0, 2.0), Position::new(1.0, 2.0)];
        let stage = Stage { width: 4.0, height: 4.0 };
        let mode = AssignmentMode::Fixed;
        let params = small_params(&start, &end, &stage, &mode);
        let candidates = generate_baseline_candidates(&params).unwrap();
        let curve_allowed = candidates.iter().find(|c| c.strategy == Strategy::CurveAllowed).unwrap();
        assert_eq!(curve_allowed.metrics.collision_count, 0);
    }

    #[test]
    fn baseline_strategies_produce_distinct_start_time_orderings() {
        let start = vec![
            Position::new(0.5, 0.5),
            Position::new(1.0, 1.0),
            Position::new(3.5, 3.5),
        ];
        let end = vec![
            Position::new(0.7, 0.5),
            Position::new(3.8, 3.8),
            Position::new(3.7, 3.5),
        ];
        let stage = Stage { width: 4.0, height: 4.0 };
        let mode = AssignmentMode::Fixed;
        let params = small_params(&start, &end, &stage, &mode);
        let candidates = generate_baseline_candidates(&params).unwrap();

        let longest = candidates.iter().find(|c| c.strategy == Strategy::DistanceLongestFirst).unwrap();
        let shortest = candidates.iter().find(|c| c.strategy == Strategy::DistanceShortestFirst).unwrap();
        let timing = candidates.iter().find(|c| c.strategy == Strategy::TimingPriority).unwrap();

        let longest_times: Vec<f64> = longest.paths.iter().map(|p| p.start_time).collect();
        let shortest_times: Vec<f64> = shortest.paths.iter().map(|p| p.start_time).collect();
        let timing_times: Vec<f64> = timing.paths.iter().map(|p| p.start_time).collect();

        assert_ne!(longest_times, shortest_times);
        assert!(timing_times.iter().all(|&t| t == 0.0));
    }

    #[test]
    fn constraint_guided_candidates_number_five_total() {
        let start = vec![Position::new(1.0, 1.0), Position::new(3.0, 1.0)];
        let end = vec![Position::new(3.0, 3.0), Position::new(1.0, 3.0)];
        let stage = Stage { width: 4.0, height: 4.0 };
        let mode = AssignmentMode::Fixed;
        let params = small_params(&start, &end, &stage, &mode);
        let pc = PreConstraint::default_fallback(2);
        let candidates = generate_constraint_guided_candidates(&params, &pc).unwrap();
        assert_eq!(candidates.len(), 5);
    }
}
