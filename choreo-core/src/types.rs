//! Core geometric and identity types shared across the planner.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A point on the stage. `(0,0)` is bottom-left; x increases right, y increases up.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f64 {
        self.distance_squared(other).sqrt()
    }

    pub fn distance_squared(&self, other: &Position) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy
    }

    pub fn lerp(&self, other: &Position, t: f64) -> Position {
        Position {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Unit vector pointing from `self` to `other`. Zero vector if coincident.
    pub fn unit_vector_to(&self, other: &Position) -> (f64, f64) {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dist = (dx * dx + dy * dy).sqrt();
        if dist <= 0.0 {
            (0.0, 0.0)
        } else {
            (dx / dist, dy / dist)
        }
    }

    pub fn approx_eq(&self, other: &Position, eps: f64) -> bool {
        (self.x - other.x).abs() <= eps && (self.y - other.y).abs() <= eps
    }
}

/// Stage dimensions. Both must be positive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Stage {
    pub width: f64,
    pub height: f64,
}

impl Stage {
    /// True if `p` lies within the stage, expanded by `margin` on every side.
    pub fn contains_with_margin(&self, p: &Position, margin: f64) -> bool {
        p.x >= -margin && p.x <= self.width + margin && p.y >= -margin && p.y <= self.height + margin
    }
}

/// Identifies a single dancer. Dancer ids are 1-indexed per the formation input adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DancerId(pub u32);

impl std::fmt::Display for DancerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How dancers are mapped onto end-formation indices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum AssignmentMode {
    Optimal,
    Fixed,
    Partial { locked: HashSet<DancerId> },
}

impl Default for AssignmentMode {
    fn default() -> Self {
        AssignmentMode::Fixed
    }
}

/// The four pipeline orchestration modes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    LocalOnly,
    ExternalRank,
    PreAndRank,
    ExternalFull,
}

/// Advisory style/priority hints from the caller, forwarded to the ranker.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserPreference {
    pub style: Option<String>,
    pub priority: Option<String>,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_symmetric() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(3.0, 4.0);
        assert_eq!(a.distance(&b), 5.0);
        assert_eq!(a.distance(&b), b.distance(&a));
    }

    #[test]
    fn unit_vector_of_coincident_points_is_zero() {
        let a = Position::new(1.0, 1.0);
        assert_eq!(a.unit_vector_to(&a), (0.0, 0.0));
    }

    #[test]
    fn stage_margin_contains_just_outside_points() {
        let stage = Stage { width: 10.0, height: 8.0 };
        assert!(stage.contains_with_margin(&Position::new(-0.5, 0.0), 0.5));
        assert!(!stage.contains_with_margin(&Position::new(-0.51, 0.0), 0.5));
    }
}
