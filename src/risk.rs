use crate::models::RiskLevel;

/// Weight given to shortage history versus enforcement history when the two
/// normalized counts are combined. The two weights sum to 1.
pub const SHORTAGE_WEIGHT: f64 = 0.7;
pub const ENFORCEMENT_WEIGHT: f64 = 0.3;

/// Band thresholds over the [0, 1] score scale. Boundary values belong to the
/// higher band: a score of exactly 0.7 is High, exactly 0.3 is Medium.
pub const HIGH_THRESHOLD: f64 = 0.7;
pub const MEDIUM_THRESHOLD: f64 = 0.3;

/// Dataset-observed maxima used for min-max normalization. Computed once per
/// snapshot and passed in explicitly so that `score` stays a pure function of
/// its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreScale {
    pub max_shortages: u64,
    pub max_enforcements: u64,
}

impl ScoreScale {
    /// Builds the scale from per-entity (shortage_count, enforcement_count)
    /// pairs. An empty iterator yields a zero scale, under which every entity
    /// scores 0.0.
    pub fn from_counts<I>(counts: I) -> ScoreScale
    where
        I: IntoIterator<Item = (u64, u64)>,
    {
        let mut scale = ScoreScale {
            max_shortages: 0,
            max_enforcements: 0,
        };
        for (shortages, enforcements) in counts {
            scale.max_shortages = scale.max_shortages.max(shortages);
            scale.max_enforcements = scale.max_enforcements.max(enforcements);
        }
        scale
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskScore {
    pub score: f64,
    pub level: RiskLevel,
}

/// Combines shortage and enforcement counts into a normalized [0, 1] score
/// and its band. Monotonically non-decreasing in both counts for a fixed
/// scale; (0, 0) always lands in Low.
pub fn score(shortages: u64, enforcements: u64, scale: &ScoreScale) -> RiskScore {
    let value = SHORTAGE_WEIGHT * normalize(shortages, scale.max_shortages)
        + ENFORCEMENT_WEIGHT * normalize(enforcements, scale.max_enforcements);
    RiskScore {
        score: value,
        level: band(value),
    }
}

pub fn band(score: f64) -> RiskLevel {
    if score >= HIGH_THRESHOLD {
        RiskLevel::High
    } else if score >= MEDIUM_THRESHOLD {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

fn normalize(count: u64, max: u64) -> f64 {
    if max == 0 {
        0.0
    } else {
        (count.min(max) as f64) / (max as f64)
    }
}
