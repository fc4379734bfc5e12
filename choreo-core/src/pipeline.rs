//! Pipeline coordinator: orchestrates assignment, candidate
//! generation, evaluation and ranking under one of four modes, with progressive
//! enhancement and provider timeout/retry/cancellation semantics.

use crate::candidate::{self, Candidate, FactoryParams};
use crate::config::Config;
use crate::error::{PlanError, ProviderError};
use crate::preconstraint::PreConstraint;
use crate::provider::{CandidateSummary, FullPathProvider, FullPathRequest, PreConstraintProvider, PreConstraintRequest, ProviderPlan, RankerProvider, RankingResult};
use crate::ranker;
use crate::types::{AssignmentMode, PipelineMode, Position, Stage, UserPreference};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A validated core request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub start_positions: Vec<Position>,
    pub end_positions: Vec<Position>,
    pub stage: Stage,
    pub total_counts: f64,
    pub collision_radius: f64,
    pub assignment_mode: AssignmentMode,
    pub mode: PipelineMode,
    pub user_preference: UserPreference,
    pub samples_per_path: usize,
}

impl PlanRequest {
    /// Every option enumerated, with sensible defaults (explicit configuration
    /// struct with every option enumerated and a `with_defaults` constructor").
    pub fn with_defaults(start_positions: Vec<Position>, end_positions: Vec<Position>, stage: Stage, total_counts: f64) -> Self {
        Self {
            start_positions,
            end_positions,
            stage,
            total_counts,
            collision_radius: 0.5,
            assignment_mode: AssignmentMode::Fixed,
            mode: PipelineMode::LocalOnly,
            user_preference: UserPreference::default(),
            samples_per_path: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProviderStatus {
    ProviderRejected,
    ProviderUnavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub total_candidates: usize,
    pub selected_strategy: String,
    pub compute_time_ms: u128,
    pub used_external_ranker: bool,
    pub pipeline_mode: PipelineMode,
    pub used_external_pre_constraint: bool,
    pub provider_status: Option<ProviderStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreResponse {
    pub selected: Candidate,
    pub candidates: Vec<Candidate>,
    pub ranking: Option<RankingResult>,
    pub metadata: ResponseMetadata,
}

impl CoreResponse {
    /// Merges a later-arriving enhancement update into this response. A successful
    /// external ranking reselects `selected`/`metadata.selected_strategy` to the
    /// provider's pick; a timeout or failure only tags `provider_status`, leaving the
    /// already-returned local selection untouched.
    pub fn apply_enhancement(&mut self, update: EnhancementUpdate, used_external_pre_constraint: bool) {
        match update {
            EnhancementUpdate::Success(ranking) => {
                if let Some(candidate) = self.candidates.iter().find(|c| c.id == ranking.selected_id).cloned() {
                    self.metadata.selected_strategy = candidate.id.clone();
                    self.selected = candidate;
                    self.metadata.used_external_ranker = true;
                    self.metadata.used_external_pre_constraint = used_external_pre_constraint;
                    self.metadata.provider_status = None;
                }
                self.ranking = Some(ranking);
            }
            EnhancementUpdate::Timeout => {
                self.metadata.provider_status = Some(ProviderStatus::ProviderUnavailable);
            }
            EnhancementUpdate::Failed(reason) => {
                self.metadata.provider_status = Some(if reason.starts_with("providerRejected") {
                    ProviderStatus::ProviderRejected
                } else {
                    ProviderStatus::ProviderUnavailable
                });
            }
        }
    }
}

/// A bounded, one-shot enhancement update delivered after the synchronous local
/// result, per the progressive enhancement contract.
#[derive(Debug, Clone, PartialEq)]
pub enum EnhancementUpdate {
    Success(RankingResult),
    Timeout,
    Failed(String),
}

/// Handle to a provider task launched after the local result was already returned.
/// Dropping it (or calling `abort`) cancels the task; the already-returned local
/// result remains valid regardless — a cancelled or aborted enhancement never
/// invalidates the local result already returned to the caller.
pub struct EnhancementHandle {
    receiver: oneshot::Receiver<EnhancementUpdate>,
    join: JoinHandle<()>,
}

impl EnhancementHandle {
    pub async fn await_update(self) -> EnhancementUpdate {
        match self.receiver.await {
            Ok(update) => update,
            Err(_) => EnhancementUpdate::Failed("enhancement task dropped its sender".to_string()),
        }
    }

    pub fn abort(&self) {
        self.join.abort();
    }
}

pub struct Coordinator {
    config: Config,
    pre_constraint_provider: Option<Arc<dyn PreConstraintProvider>>,
    ranker_provider: Option<Arc<dyn RankerProvider>>,
    full_path_provider: Option<Arc<dyn FullPathProvider>>,
}

impl Coordinator {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            pre_constraint_provider: None,
            ranker_provider: None,
            full_path_provider: None,
        }
    }

    pub fn with_ranker_provider(mut self, provider: Arc<dyn RankerProvider>) -> Self {
        self.ranker_provider = Some(provider);
        self
    }

    pub fn with_pre_constraint_provider(mut self, provider: Arc<dyn PreConstraintProvider>) -> Self {
        self.pre_constraint_provider = Some(provider);
        self
    }

    pub fn with_full_path_provider(mut self, provider: Arc<dyn FullPathProvider>) -> Self {
        self.full_path_provider = Some(provider);
        self
    }

    fn validate(&self, req: &PlanRequest) -> Result<(), PlanError> {
        if req.start_positions.len() != req.end_positions.len() {
            return Err(PlanError::ShapeMismatch {
                start: req.start_positions.len(),
                end: req.end_positions.len(),
            });
        }
        if req.total_counts <= 0.0 {
            return Err(PlanError::InvalidConfig(format!("totalCounts must be > 0, got {}", req.total_counts)));
        }
        if req.samples_per_path < 2 {
            return Err(PlanError::InvalidConfig(format!("samplesPerPath must be >= 2, got {}", req.samples_per_path)));
        }
        if req.collision_radius < 0.0 {
            return Err(PlanError::InvalidConfig(format!("collisionRadius must be >= 0, got {}", req.collision_radius)));
        }
        for (i, p) in req.start_positions.iter().enumerate() {
            if !req.stage.contains_with_margin(p, 0.5) {
                return Err(PlanError::OutOfBounds { dancer: (i + 1) as u32, position: *p });
            }
        }
        for (i, p) in req.end_positions.iter().enumerate() {
            if !req.stage.contains_with_margin(p, 0.5) {
                return Err(PlanError::OutOfBounds { dancer: (i + 1) as u32, position: *p });
            }
        }
        Ok(())
    }

    fn factory_params<'a>(&self, req: &'a PlanRequest) -> FactoryParams<'a> {
        FactoryParams {
            start: &req.start_positions,
            end: &req.end_positions,
            stage: &req.stage,
            total_counts: req.total_counts,
            collision_radius: req.collision_radius,
            samples_per_path: req.samples_per_path,
            assignment_mode: &req.assignment_mode,
            resolver_attempt_budget: self.config.pipeline.resolver_attempt_budget,
        }
    }

    fn local_response(
        &self,
        candidates: Vec<Candidate>,
        req: &PlanRequest,
        started: Instant,
        used_external_ranker: bool,
        used_external_pre_constraint: bool,
        provider_status: Option<ProviderStatus>,
    ) -> CoreResponse {
        let ranking = ranker::local_rank(&candidates, &req.user_preference);
        let selected = candidates
            .iter()
            .find(|c| c.id == ranking.selected_id)
            .cloned()
            .unwrap_or_else(|| candidates[0].clone());
        let metadata = ResponseMetadata {
            total_candidates: candidates.len(),
            selected_strategy: selected.id.clone(),
            compute_time_ms: started.elapsed().as_millis(),
            used_external_ranker,
            pipeline_mode: req.mode,
            used_external_pre_constraint,
            provider_status,
        };
        CoreResponse {
            selected,
            candidates,
            ranking: Some(ranking),
            metadata,
        }
    }

    /// Run the pipeline to completion for `local_only` and `external_full`; for
    /// `external_rank` and `pre_and_rank` the returned response is the local result,
    /// with an `EnhancementHandle` for a possibly-improved later ranking.
    pub async fn run(&self, req: PlanRequest) -> Result<(CoreResponse, Option<EnhancementHandle>), PlanError> {
        self.validate(&req)?;
        let started = Instant::now();

        match req.mode {
            PipelineMode::LocalOnly => {
                let candidates = candidate::generate_baseline_candidates(&self.factory_params(&req))?;
                let response = self.local_response(candidates, &req, started, false, false, None);
                Ok((response, None))
            }
            PipelineMode::ExternalRank => {
                let candidates = candidate::generate_baseline_candidates(&self.factory_params(&req))?;
                let response = self.local_response(candidates.clone(), &req, started, false, false, None);
                let handle = self.ranker_provider.clone().map(|provider| {
                    spawn_rank_enhancement(
                        candidates,
                        req.user_preference.clone(),
                        provider,
                        Duration::from_secs(self.config.provider.timeout_secs),
                        self.config.provider.retries,
                    )
                });
                Ok((response, handle))
            }
            PipelineMode::PreAndRank => {
                let default_pc = PreConstraint::default_fallback(req.start_positions.len());
                let candidates = candidate::generate_constraint_guided_candidates(&self.factory_params(&req), &default_pc)?;
                let response = self.local_response(candidates, &req, started, false, false, None);

                let handle = match (self.pre_constraint_provider.clone(), self.ranker_provider.clone()) {
                    (Some(pc_provider), Some(rank_provider)) => Some(spawn_pre_and_rank_enhancement(
                        req.clone(),
                        self.config.pipeline.resolver_attempt_budget,
                        pc_provider,
                        rank_provider,
                        Duration::from_secs(self.config.provider.timeout_secs),
                        self.config.provider.retries,
                    )),
                    _ => None,
                };
                Ok((response, handle))
            }
            PipelineMode::ExternalFull => {
                let response = self.run_external_full(&req, started).await?;
                Ok((response, None))
            }
        }
    }

    async fn run_external_full(&self, req: &PlanRequest, started: Instant) -> Result<CoreResponse, PlanError> {
        let Some(provider) = self.full_path_provider.clone() else {
            let candidates = candidate::generate_baseline_candidates(&self.factory_params(req))?;
            return Ok(self.local_response(candidates, req, started, false, false, Some(ProviderStatus::ProviderUnavailable)));
        };

        let timeout = Duration::from_secs(self.config.provider.timeout_secs);
        let retries = self.config.provider.retries;
        let mut previous_errors: Vec<String> = Vec::new();

        for _attempt in 0..=retries {
            let request = FullPathRequest {
                start: req.start_positions.clone(),
                end: req.end_positions.clone(),
                stage: req.stage,
                total_counts: req.total_counts,
                collision_radius: req.collision_radius,
                user_preference: req.user_preference.clone(),
                previous_errors: previous_errors.clone(),
            };
            match tokio::time::timeout(timeout, provider.plan(&request)).await {
                Ok(Ok(plan)) => match validate_provider_plan(&plan, req) {
                    Ok(()) => {
                        let candidate = build_provider_candidate(plan, req);
                        let metadata = ResponseMetadata {
                            total_candidates: 1,
                            selected_strategy: candidate.id.clone(),
                            compute_time_ms: started.elapsed().as_millis(),
                            used_external_ranker: false,
                            pipeline_mode: req.mode,
                            used_external_pre_constraint: false,
                            provider_status: None,
                        };
                        return Ok(CoreResponse {
                            candidates: vec![candidate.clone()],
                            selected: candidate,
                            ranking: None,
                            metadata,
                        });
                    }
                    Err(errors) => {
                        previous_errors = errors;
                    }
                },
                Ok(Err(_)) | Err(_) => {}
            }
        }

        // Every retry's provider plan failed validation (`previous_errors` holds the
        // last attempt's reasons); degrade to local_only and tag the response.
        let _ = previous_errors;
        let candidates = candidate::generate_baseline_candidates(&self.factory_params(req))?;
        Ok(self.local_response(candidates, req, started, false, false, Some(ProviderStatus::ProviderUnavailable)))
    }
}

fn validate_provider_plan(plan: &ProviderPlan, req: &PlanRequest) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    if plan.paths.len() != req.start_positions.len() {
        errors.push(format!("expected {} paths, got {}", req.start_positions.len(), plan.paths.len()));
        return Err(errors);
    }
    for path in &plan.paths {
        let idx = (path.dancer.0 - 1) as usize;
        if idx >= req.start_positions.len() {
            errors.push(format!("path references unknown dancer {}", path.dancer));
            continue;
        }
        if path.points.len() < 2 {
            errors.push(format!("dancer {} path has fewer than 2 points", path.dancer));
        }
        if let Some(first) = path.points.first() {
            if first.position().distance(&req.start_positions[idx]) > 0.5 {
                errors.push(format!("dancer {} path does not begin near its start position", path.dancer));
            }
            if (first.t - 0.0).abs() > 1e-6 {
                errors.push(format!("dancer {} path does not begin at t=0", path.dancer));
            }
        }
        if let Some(last) = path.points.last() {
            if (last.t - req.total_counts).abs() > 1e-6 {
                errors.push(format!("dancer {} path does not end at t=T", path.dancer));
            }
        }
        for point in &path.points {
            if !req.stage.contains_with_margin(&point.position(), 0.5) {
                errors.push(format!("dancer {} path leaves stage bounds", path.dancer));
                break;
            }
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn build_provider_candidate(plan: ProviderPlan, req: &PlanRequest) -> Candidate {
    use crate::assignment::Assignment;
    use crate::metrics;

    let assignment: Vec<Assignment> = plan
        .paths
        .iter()
        .map(|p| Assignment {
            dancer: p.dancer,
            end_index: (p.dancer.0 - 1) as usize,
            cost: p.start_point().position().distance_squared(&p.end_point().position()),
        })
        .collect();
    let metrics = metrics::evaluate(&plan.paths, &req.stage, req.collision_radius, req.samples_per_path, req.total_counts);
    Candidate {
        id: format!("provider:{}", plan.strategy),
        strategy: crate::candidate::Strategy::TimingPriority,
        paths: plan.paths,
        assignment,
        metrics,
    }
}

async fn call_with_timeout_retry<T, F, Fut>(mut make_call: F, timeout: Duration, retries: u32) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ProviderError>>,
{
    let mut last_err = ProviderError::Unavailable("provider was never invoked".to_string());
    for _ in 0..=retries {
        match tokio::time::timeout(timeout, make_call()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => last_err = e,
            Err(_) => last_err = ProviderError::Timeout,
        }
    }
    Err(last_err)
}

fn spawn_rank_enhancement(
    candidates: Vec<Candidate>,
    pref: UserPreference,
    provider: Arc<dyn RankerProvider>,
    timeout: Duration,
    retries: u32,
) -> EnhancementHandle {
    let (tx, rx) = oneshot::channel();
    let join = tokio::spawn(async move {
        let summaries: Vec<CandidateSummary> = candidates.iter().map(CandidateSummary::from_candidate).collect();
        let result = call_with_timeout_retry(
            || {
                let provider = provider.clone();
                let summaries = summaries.clone();
                let pref = pref.clone();
                async move { provider.rank(&summaries, &pref).await }
            },
            timeout,
            retries,
        )
        .await;

        let update = match result {
            Ok(ranking) if ranker::validate_external_result(&ranking, &candidates) => EnhancementUpdate::Success(ranking),
            Ok(_) => EnhancementUpdate::Failed("providerRejected".to_string()),
            Err(ProviderError::Timeout) => EnhancementUpdate::Timeout,
            Err(e) => EnhancementUpdate::Failed(format!("providerUnavailable: {e}")),
        };
        let _ = tx.send(update);
    });
    EnhancementHandle { receiver: rx, join }
}

fn spawn_pre_and_rank_enhancement(
    req: PlanRequest,
    resolver_attempt_budget: usize,
    pre_constraint_provider: Arc<dyn PreConstraintProvider>,
    ranker_provider: Arc<dyn RankerProvider>,
    timeout: Duration,
    retries: u32,
) -> EnhancementHandle {
    let (tx, rx) = oneshot::channel();
    let join = tokio::spawn(async move {
        let pc_request = PreConstraintRequest {
            start: req.start_positions.clone(),
            end: req.end_positions.clone(),
            stage: req.stage,
        };
        let pc_result = call_with_timeout_retry(
            || {
                let provider = pre_constraint_provider.clone();
                let request = pc_request.clone();
                async move { provider.propose(&request).await }
            },
            timeout,
            retries,
        )
        .await;

        let pre_constraint = match pc_result {
            Ok(pc) => pc,
            Err(ProviderError::Timeout) => {
                let _ = tx.send(EnhancementUpdate::Timeout);
                return;
            }
            Err(e) => {
                let _ = tx.send(EnhancementUpdate::Failed(format!("providerUnavailable: {e}")));
                return;
            }
        };

        let params = FactoryParams {
            start: &req.start_positions,
            end: &req.end_positions,
            stage: &req.stage,
            total_counts: req.total_counts,
            collision_radius: req.collision_radius,
            samples_per_path: req.samples_per_path,
            assignment_mode: &req.assignment_mode,
            resolver_attempt_budget,
        };
        let candidates = match candidate::generate_constraint_guided_candidates(&params, &pre_constraint) {
            Ok(c) => c,
            Err(e) => {
                let _ = tx.send(EnhancementUpdate::Failed(e.to_string()));
                return;
            }
        };

        let summaries: Vec<CandidateSummary> = candidates.iter().map(CandidateSummary::from_candidate).collect();
        let rank_result = call_with_timeout_retry(
            || {
                let provider = ranker_provider.clone();
                let summaries = summaries.clone();
                let pref = req.user_preference.clone();
                async move { provider.rank(&summaries, &pref).await }
            },
            timeout,
            retries,
        )
        .await;

        let update = match rank_result {
            Ok(ranking) if ranker::validate_external_result(&ranking, &candidates) => EnhancementUpdate::Success(ranking),
            Ok(_) => EnhancementUpdate::Failed("providerRejected".to_string()),
            Err(ProviderError::Timeout) => EnhancementUpdate::Timeout,
            Err(e) => EnhancementUpdate::Failed(format!("providerUnavailable: {e}")),
        };
        let _ = tx.send(update);
    });
    EnhancementHandle { receiver: rx, join }
}
