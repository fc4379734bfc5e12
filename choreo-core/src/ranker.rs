//! Candidate ranking: local weighted-sum scoring, with the external-provider
//! contract and its mandatory local fallback.

use crate::candidate::Candidate;
use crate::metrics::CandidateMetrics;
use crate::provider::{CandidateSummary, RankedCandidate, RankingResult};
use crate::types::UserPreference;

fn weights_for(pref: &UserPreference) -> (f64, f64, f64) {
    match pref.priority.as_deref() {
        Some("symmetry") => (0.3, 0.1, 0.1),
        Some("smoothness") => (0.1, 0.3, 0.1),
        Some("simultaneous") => (0.1, 0.1, 0.3),
        _ => (0.1, 0.1, 0.1),
    }
}

fn score(metrics: &CandidateMetrics, pref: &UserPreference) -> f64 {
    let (w_sym, w_smooth, w_sync) = weights_for(pref);
    let mut s = 100.0 - 30.0 * metrics.collision_count as f64 - 5.0 * metrics.crossing_count as f64
        + w_sym * metrics.symmetry_score
        + w_smooth * metrics.path_smoothness
        + w_sync * metrics.simultaneous_arrival;
    match pref.style.as_deref() {
        Some("synchronized") => s += 0.2 * metrics.simultaneous_arrival,
        Some("smooth") => s += 0.2 * metrics.path_smoothness,
        _ => {}
    }
    s
}

fn reason_for(id: &str, metrics: &CandidateMetrics, s: f64) -> String {
    format!(
        "{id}: score {s:.2} (collisions={}, crossings={}, symmetry={:.1}, smoothness={:.1}, simultaneous={:.1})",
        metrics.collision_count, metrics.crossing_count, metrics.symmetry_score, metrics.path_smoothness, metrics.simultaneous_arrival
    )
}

fn sort_key(id: &str, metrics: &CandidateMetrics, s: f64) -> (i64, usize, usize, String) {
    // Higher score first; `i64` bucketing of the (negated) score keeps the sort total
    // even though floats aren't `Ord`, with remaining ties broken deterministically.
    (-(s * 1_000_000.0) as i64, metrics.collision_count, metrics.crossing_count, id.to_string())
}

/// Score and order a list of `(id, strategy_label, metrics)` tuples — the shape shared
/// by both the full `Candidate` list and the provider-facing `CandidateSummary` list.
fn rank_entries(entries: &[(String, CandidateMetrics)], pref: &UserPreference) -> RankingResult {
    let mut scored: Vec<(String, f64, CandidateMetrics)> =
        entries.iter().map(|(id, m)| (id.clone(), score(m, pref), *m)).collect();
    scored.sort_by(|a, b| sort_key(&a.0, &a.2, a.1).cmp(&sort_key(&b.0, &b.2, b.1)));

    let ranked: Vec<RankedCandidate> = scored
        .iter()
        .enumerate()
        .map(|(i, (id, s, m))| RankedCandidate {
            id: id.clone(),
            rank: i + 1,
            score: *s,
            reason: reason_for(id, m, *s),
        })
        .collect();

    let selected_id = ranked.first().map(|r| r.id.clone()).unwrap_or_default();
    RankingResult {
        explanation: format!("local ranker selected '{selected_id}' by highest weighted score"),
        selected_id,
        ranked,
    }
}

/// The local, offline, deterministic ranker (the default implementation).
pub fn local_rank(candidates: &[Candidate], pref: &UserPreference) -> RankingResult {
    let entries: Vec<(String, CandidateMetrics)> = candidates.iter().map(|c| (c.id.clone(), c.metrics)).collect();
    rank_entries(&entries, pref)
}

/// Same scoring, operating on the provider wire shape (used by `LocalDeterministic`'s
/// `RankerProvider` impl, and by tests exercising the external-provider contract).
pub fn local_rank_summaries(summaries: &[CandidateSummary], pref: &UserPreference) -> RankingResult {
    let entries: Vec<(String, CandidateMetrics)> = summaries.iter().map(|s| (s.id.clone(), s.metrics)).collect();
    rank_entries(&entries, pref)
}

/// Outcome of attempting to use an external ranker, for the coordinator's status tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankSource {
    Local,
    External,
    ProviderRejected,
    ProviderUnavailable,
}

/// Validate an externally produced `RankingResult` against the candidate set: every
/// ranked id must be a known candidate id and the selected id must be among them.
/// Any violation rejects the whole result rather than accepting a partial one.
pub fn validate_external_result(result: &RankingResult, candidates: &[Candidate]) -> bool {
    let known: std::collections::HashSet<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
    known.contains(result.selected_id.as_str()) && result.ranked.iter().all(|r| known.contains(r.id.as_str()))
}
