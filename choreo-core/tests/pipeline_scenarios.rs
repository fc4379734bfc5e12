// End-to-end pipeline scenarios.

use async_trait::async_trait;
use choreo_core::assignment::solve;
use choreo_core::candidate::Strategy;
use choreo_core::config::Config;
use choreo_core::error::ProviderError;
use choreo_core::pipeline::{Coordinator, EnhancementUpdate, PlanRequest, ProviderStatus};
use choreo_core::provider::{CandidateSummary, RankedCandidate, RankerProvider, RankingResult};
use choreo_core::types::{AssignmentMode, DancerId, PipelineMode, Position, Stage, UserPreference};
use std::collections::HashSet;
use std::sync::Arc;

fn line_to_v_request() -> PlanRequest {
    let start_xs = [1.0, 2.3, 3.6, 4.9, 6.1, 7.4, 8.7, 10.0];
    let start: Vec<Position> = start_xs.iter().map(|&x| Position::new(x, 1.0)).collect();
    let end = vec![
        Position::new(1.0, 1.0),
        Position::new(2.1, 2.7),
        Position::new(3.3, 4.3),
        Position::new(4.4, 6.5),
        Position::new(5.6, 6.5),
        Position::new(6.7, 4.3),
        Position::new(7.9, 2.7),
        Position::new(9.0, 1.0),
    ];
    let mut req = PlanRequest::with_defaults(start, end, Stage { width: 10.0, height: 8.0 }, 8.0);
    req.assignment_mode = AssignmentMode::Fixed;
    req.mode = PipelineMode::LocalOnly;
    req
}

#[tokio::test]
async fn scenario_1_line_to_v_selects_a_collision_free_named_strategy() {
    let coordinator = Coordinator::new(Config::default());
    let (response, handle) = coordinator.run(line_to_v_request()).await.unwrap();
    assert!(handle.is_none());
    assert_eq!(response.selected.metrics.collision_count, 0);
    assert!(response.selected.metrics.simultaneous_arrival >= 60.0 - 1e-6);
    assert!(["distance_longest_first", "distance_shortest_first", "timing_priority", "curve_allowed", "center_priority"]
        .contains(&response.metadata.selected_strategy.as_str()));
}

#[tokio::test]
async fn scenario_3_identity_request_is_trivially_collision_free() {
    let positions: Vec<Position> = (0..6).map(|i| Position::new(1.0 + i as f64, 2.0)).collect();
    let req = PlanRequest::with_defaults(positions.clone(), positions, Stage { width: 10.0, height: 8.0 }, 8.0);
    let coordinator = Coordinator::new(Config::default());
    let (response, _) = coordinator.run(req).await.unwrap();
    for candidate in &response.candidates {
        assert_eq!(candidate.metrics.collision_count, 0);
        assert_eq!(candidate.metrics.crossing_count, 0);
        let total_distance: f64 = candidate.assignment.iter().map(|a| a.cost.sqrt()).sum();
        assert!(total_distance < 1e-6);
    }
    // Lexicographically first among the five baseline labels.
    assert_eq!(response.metadata.selected_strategy, "center_priority");
}

#[tokio::test]
async fn scenario_4_partial_assignment_keeps_locked_identities() {
    let start: Vec<Position> = (0..8).map(|i| Position::new(1.0 + i as f64, 1.0)).collect();
    let end: Vec<Position> = (0..8).map(|i| Position::new(1.0 + ((i + 3) % 8) as f64, 5.0)).collect();
    let locked: HashSet<DancerId> = [DancerId(1), DancerId(4)].into_iter().collect();
    let assignment = solve(&start, &end, &AssignmentMode::Partial { locked: locked.clone() }).unwrap();
    assert_eq!(assignment[0].end_index, 0);
    assert_eq!(assignment[3].end_index, 3);

    let mut req = PlanRequest::with_defaults(start, end, Stage { width: 10.0, height: 8.0 }, 8.0);
    req.assignment_mode = AssignmentMode::Partial { locked };
    let coordinator = Coordinator::new(Config::default());
    let (response, _) = coordinator.run(req).await.unwrap();
    assert_eq!(response.metadata.total_candidates, 5);
}

struct AgreesOnCurveAllowed;

#[async_trait]
impl RankerProvider for AgreesOnCurveAllowed {
    async fn rank(&self, summaries: &[CandidateSummary], _pref: &UserPreference) -> Result<RankingResult, ProviderError> {
        let chosen = summaries.iter().find(|s| s.strategy == "curve_allowed").expect("baseline includes curve_allowed");
        Ok(RankingResult {
            selected_id: chosen.id.clone(),
            ranked: vec![RankedCandidate { id: chosen.id.clone(), rank: 1, score: 95.0, reason: "external preference".to_string() }],
            explanation: "provider favors curve_allowed".to_string(),
        })
    }
}

#[tokio::test]
async fn scenario_5_external_ranker_disagreement_is_surfaced_via_the_enhancement_handle() {
    let mut req = PlanRequest::with_defaults(
        vec![Position::new(1.0, 2.0), Position::new(3.0, 2.0)],
        vec![Position::new(3.0, 2.0), Position::new(1.0, 2.0)],
        Stage { width: 4.0, height: 4.0 },
        4.0,
    );
    req.mode = PipelineMode::ExternalRank;
    let coordinator = Coordinator::new(Config::default()).with_ranker_provider(Arc::new(AgreesOnCurveAllowed));
    let (mut response, handle) = coordinator.run(req).await.unwrap();
    assert!(!response.metadata.used_external_ranker);
    let update = handle.unwrap().await_update().await;
    assert!(matches!(&update, EnhancementUpdate::Success(ranking) if ranking.selected_id == Strategy::CurveAllowed.label()));
    response.apply_enhancement(update, false);
    assert_eq!(response.metadata.selected_strategy, Strategy::CurveAllowed.label());
    assert!(response.metadata.used_external_ranker);
    assert_eq!(response.selected.strategy, Strategy::CurveAllowed);
}

struct AlwaysUnavailable;

#[async_trait]
impl RankerProvider for AlwaysUnavailable {
    async fn rank(&self, _summaries: &[CandidateSummary], _pref: &UserPreference) -> Result<RankingResult, ProviderError> {
        Err(ProviderError::Unavailable("scenario 6 simulated outage".to_string()))
    }
}

#[tokio::test]
async fn scenario_6_external_ranker_failure_falls_back_to_local_pick() {
    let mut req = PlanRequest::with_defaults(
        vec![Position::new(1.0, 2.0), Position::new(3.0, 2.0)],
        vec![Position::new(3.0, 2.0), Position::new(1.0, 2.0)],
        Stage { width: 4.0, height: 4.0 },
        4.0,
    );
    req.mode = PipelineMode::ExternalRank;
    let mut config = Config::default();
    config.provider.retries = 1;
    let coordinator = Coordinator::new(config).with_ranker_provider(Arc::new(AlwaysUnavailable));
    let (mut response, handle) = coordinator.run(req).await.unwrap();
    assert!(!response.metadata.used_external_ranker);
    let update = handle.unwrap().await_update().await;
    assert!(matches!(update, EnhancementUpdate::Failed(_)));
    response.apply_enhancement(update, false);
    assert!(!response.metadata.used_external_ranker);
    assert_eq!(response.metadata.provider_status, Some(ProviderStatus::ProviderUnavailable));
}
