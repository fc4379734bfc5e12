//! Pre-constraint records: advisory hints that bias the candidate factory.

use crate::types::DancerId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Ordering an advisor suggests the resolver/factory should favor when staggering
/// dancers' movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementOrder {
    Simultaneous,
    WaveOutward,
    WaveInward,
    CenterFirst,
    OuterFirst,
    LongestFirst,
    ShortestFirst,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DancerHints {
    pub priority: Option<u32>,
    pub prefer_curve: bool,
    pub delay_ratio: f64,
    pub avoid_center: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreConstraint {
    pub movement_order: MovementOrder,
    pub dancer_hints: HashMap<DancerId, DancerHints>,
    pub maintain_symmetry: bool,
    pub avoid_crossing: bool,
    pub prefer_smooth_paths: bool,
    pub suggested_curve_amount: f64,
    pub confidence: f64,
}

impl PreConstraint {
    /// The deterministic fallback used when no provider is configured, or when the
    /// provider fails: `longest_first` ordering with proportional delays.
    pub fn default_fallback(dancer_count: usize) -> Self {
        Self {
            movement_order: MovementOrder::LongestFirst,
            dancer_hints: (1..=dancer_count as u32)
                .map(|id| (DancerId(id), DancerHints::default()))
                .collect(),
            maintain_symmetry: false,
            avoid_crossing: false,
            prefer_smooth_paths: false,
            suggested_curve_amount: 0.0,
            confidence: 0.0,
        }
    }

    pub fn hint_for(&self, dancer: DancerId) -> DancerHints {
        self.dancer_hints.get(&dancer).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fallback_covers_every_dancer() {
        let pc = PreConstraint::default_fallback(4);
        for id in 1..=4 {
            assert!(pc.dancer_hints.contains_key(&DancerId(id)));
        }
        assert_eq!(pc.movement_order, MovementOrder::LongestFirst);
    }

    #[test]
    fn hint_for_unknown_dancer_is_default() {
        let pc = PreConstraint::default_fallback(1);
        assert_eq!(pc.hint_for(DancerId(99)), DancerHints::default());
    }
}
