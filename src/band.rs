//! Confidence bands for a ranked candidate list.
//!
//! Bands are derived from "elbows": the largest relative drops between
//! neighbouring probabilities in a descending list. Candidates above a
//! steep first elbow are `Strong`, those between the first and second
//! elbow are `Moderate`, and everything else is `Weak`.

use serde::{Deserialize, Serialize};

/// Smallest relative drop that counts as an elbow.
pub const ELBOW_MIN_DROP: f64 = 0.20;

/// Smallest first-elbow drop that makes the leading segment `Strong`.
pub const STRONG_DROP: f64 = 0.30;

/// Visual confidence grouping of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    /// Above a steep first elbow.
    Strong,
    /// Above a shallow first elbow, or between the two elbows.
    Moderate,
    /// Everything else.
    Weak,
}

impl ConfidenceBand {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strong => "strong",
            Self::Moderate => "moderate",
            Self::Weak => "weak",
        }
    }
}

/// Assigns a band to each probability of a list sorted in descending order.
///
/// The output has the same length as the input. Lists with fewer than two
/// entries are all `Weak`.
#[must_use]
pub fn elbow_bands(probs: &[f64]) -> Vec<ConfidenceBand> {
    let mut bands = vec![ConfidenceBand::Weak; probs.len()];
    if probs.len() < 2 {
        return bands;
    }

    // drops[i] is the relative drop between probs[i] and probs[i + 1].
    let drops: Vec<f64> = probs
        .windows(2)
        .map(|w| ((w[0] - w[1]) / w[0].max(1e-9)).max(0.0))
        .collect();

    let mut ranked: Vec<usize> = (0..drops.len()).collect();
    ranked.sort_by(|&a, &b| drops[b].total_cmp(&drops[a]).then(a.cmp(&b)));

    let mut elbows: Vec<usize> = ranked
        .into_iter()
        .take(2)
        .filter(|&i| drops[i] >= ELBOW_MIN_DROP)
        .collect();
    elbows.sort_unstable();

    let Some(&first) = elbows.first() else {
        return bands;
    };
    let leading = if drops[first] >= STRONG_DROP {
        ConfidenceBand::Strong
    } else {
        ConfidenceBand::Moderate
    };
    for band in &mut bands[..=first] {
        *band = leading;
    }
    if let Some(&second) = elbows.get(1) {
        for band in &mut bands[first + 1..=second] {
            *band = ConfidenceBand::Moderate;
        }
    }
    bands
}
