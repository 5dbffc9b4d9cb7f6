//! RSSI-like proximity signal shared by training and deployment.

use serde::{Deserialize, Serialize};

/// Signal strength for a link of length `distance`.
///
/// `1 - distance / max_distance` inside range, `0` outside, clamped to
/// `[0, 1]`. Degenerate ranges and non-finite distances yield `0`.
#[must_use]
pub fn signal(distance: f64, max_distance: f64) -> f64 {
    if !distance.is_finite() || !max_distance.is_finite() || max_distance <= 0.0 {
        return 0.0;
    }
    if distance > max_distance {
        return 0.0;
    }
    (1.0 - distance / max_distance).clamp(0.0, 1.0)
}

/// Neighbors heard within communication range.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NeighborSummary {
    pub count: usize,
    pub avg_signal: f64,
}

impl NeighborSummary {
    /// Aggregates link distances; only links strictly shorter than `range` count.
    #[must_use]
    pub fn from_distances(distances: impl IntoIterator<Item = f64>, range: f64) -> Self {
        let mut count = 0;
        let mut total = 0.0;
        for d in distances {
            if d.is_finite() && d < range {
                count += 1;
                total += signal(d, range);
            }
        }
        Self {
            count,
            avg_signal: if count > 0 { total / count as f64 } else { 0.0 },
        }
    }
}

/// Number of links strictly shorter than `range`.
#[must_use]
pub fn count_neighbors(distances: &[f64], range: f64) -> usize {
    distances
        .iter()
        .filter(|d| d.is_finite() && **d < range)
        .count()
}
