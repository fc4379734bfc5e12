//! Pluggable external collaborators: pre-constraint, ranking, and full-path
//! providers, plus the `LocalDeterministic` implementations used as the mandatory
//! fallback target when no external adapter is configured or the adapter fails.

use crate::candidate::Candidate;
use crate::error::ProviderError;
use crate::metrics::CandidateMetrics;
use crate::path::DancerPath;
use crate::preconstraint::PreConstraint;
use crate::types::{Position, Stage, UserPreference};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreConstraintRequest {
    pub start: Vec<Position>,
    pub end: Vec<Position>,
    pub stage: Stage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSummary {
    pub id: String,
    pub strategy: String,
    pub metrics: CandidateMetrics,
}

impl CandidateSummary {
    pub fn from_candidate(candidate: &Candidate) -> Self {
        Self {
            id: candidate.id.clone(),
            strategy: candidate.strategy.label().to_string(),
            metrics: candidate.metrics,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub id: String,
    pub rank: usize,
    pub score: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingResult {
    pub selected_id: String,
    pub ranked: Vec<RankedCandidate>,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullPathRequest {
    pub start: Vec<Position>,
    pub end: Vec<Position>,
    pub stage: Stage,
    pub total_counts: f64,
    pub collision_radius: f64,
    pub user_preference: UserPreference,
    /// Validation failures from the previous attempt, so a retried provider call can
    /// correct course. Empty on the first attempt.
    pub previous_errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderPlan {
    pub paths: Vec<DancerPath>,
    pub strategy: String,
    pub reasoning: String,
    pub confidence: f64,
}

#[async_trait]
pub trait PreConstraintProvider: Send + Sync {
    async fn propose(&self, req: &PreConstraintRequest) -> Result<PreConstraint, ProviderError>;
}

#[async_trait]
pub trait RankerProvider: Send + Sync {
    async fn rank(&self, summaries: &[CandidateSummary], pref: &UserPreference) -> Result<RankingResult, ProviderError>;
}

#[async_trait]
pub trait FullPathProvider: Send + Sync {
    async fn plan(&self, req: &FullPathRequest) -> Result<ProviderPlan, ProviderError>;
}

/// Never fails; used when no external collaborator is configured, and as the implicit
/// target of every fallback path.
pub struct LocalDeterministic;

#[async_trait]
impl PreConstraintProvider for LocalDeterministic {
    async fn propose(&self, req: &PreConstraintRequest) -> Result<PreConstraint, ProviderError> {
        Ok(PreConstraint::default_fallback(req.start.len()))
    }
}

#[async_trait]
impl RankerProvider for LocalDeterministic {
    async fn rank(&self, summaries: &[CandidateSummary], pref: &UserPreference) -> Result<RankingResult, ProviderError> {
        Ok(crate::ranker::local_rank_summaries(summaries, pref))
    }
}

#[async_trait]
impl FullPathProvider for LocalDeterministic {
    async fn plan(&self, req: &FullPathRequest) -> Result<ProviderPlan, ProviderError> {
        let assignment = crate::assignment::solve(&req.start, &req.end, &crate::types::AssignmentMode::Fixed)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        let paths: Vec<DancerPath> = assignment
            .iter()
            .map(|a| {
                crate::path::straight_line(
                    a.dancer,
                    &req.start[(a.dancer.0 - 1) as usize],
                    &req.end[a.end_index],
                    0.0,
                    req.total_counts,
                    20,
                    1.0,
                    &req.stage,
                )
            })
            .collect();
        Ok(ProviderPlan {
            paths,
            strategy: "local_deterministic".to_string(),
            reasoning: "no external full-path provider configured; used straight-line fixed assignment".to_string(),
            confidence: 1.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AssignmentMode;

    #[tokio::test]
    async fn local_deterministic_pre_constraint_never_fails() {
        let req = PreConstraintRequest {
            start: vec![Position::new(0.0, 0.0)],
            end: vec![Position::new(1.0, 1.0)],
            stage: Stage { width: 4.0, height: 4.0 },
        };
        let result = LocalDeterministic.propose(&req).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn local_deterministic_full_path_plan_spans_start_to_end() {
        let req = FullPathRequest {
            start: vec![Position::new(0.0, 0.0)],
            end: vec![Position::new(3.0, 3.0)],
            stage: Stage { width: 4.0, height: 4.0 },
            total_counts: 4.0,
            collision_radius: 0.5,
            user_preference: UserPreference::default(),
            previous_errors: vec![],
        };
        let plan = LocalDeterministic.plan(&req).await.unwrap();
        assert_eq!(plan.paths.len(), 1);
        assert_eq!(plan.paths[0].start_point().position(), Position::new(0.0, 0.0));
        assert_eq!(plan.paths[0].end_point().position(), Position::new(3.0, 3.0));
    }

    #[test]
    fn candidate_summary_carries_strategy_label() {
        use crate::assignment::Assignment;
        use crate::candidate::Strategy;
        use crate::types::DancerId;

        let candidate = Candidate {
            id: "curve_allowed".to_string(),
            strategy: Strategy::CurveAllowed,
            paths: vec![],
            assignment: vec![Assignment { dancer: DancerId(1), end_index: 0, cost: 0.0 }],
            metrics: CandidateMetrics {
                collision_count: 0,
                symmetry_score: 100.0,
                path_smoothness: 100.0,
                crossing_count: 0,
                max_delay: 0.0,
                simultaneous_arrival: 100.0,
            },
        };
        let summary = CandidateSummary::from_candidate(&candidate);
        assert_eq!(summary.strategy, "curve_allowed");
        let _ = AssignmentMode::Fixed;
    }
}
