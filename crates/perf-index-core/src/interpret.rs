use crate::features::FeatureVector;

pub const SCORE_MIN: u8 = 10;
pub const SCORE_MAX: u8 = 100;

const EXCELLENT_FLOOR: u8 = 80;
const GOOD_FLOOR: u8 = 60;

/// Rounds half away from zero, then clamps into `[SCORE_MIN, SCORE_MAX]`.
/// NaN lands on the floor.
pub fn clip_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return SCORE_MIN;
    }
    let clamped = raw
        .round()
        .clamp(f64::from(SCORE_MIN), f64::from(SCORE_MAX));
    clamped as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Excellent,
    Good,
    NeedsImprovement,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Excellent, Tier::Good, Tier::NeedsImprovement];

    pub fn from_score(score: u8) -> Self {
        if score >= EXCELLENT_FLOOR {
            Tier::Excellent
        } else if score >= GOOD_FLOOR {
            Tier::Good
        } else {
            Tier::NeedsImprovement
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tier::Excellent => "Excellent",
            Tier::Good => "Good",
            Tier::NeedsImprovement => "NeedsImprovement",
        }
    }
}

/// Advice rules, declared in the order they are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tip {
    StudyHours,
    Sleep,
    Practice,
    Revision,
}

impl Tip {
    pub const ALL: [Tip; 4] = [Tip::StudyHours, Tip::Sleep, Tip::Practice, Tip::Revision];

    pub fn applies(self, features: &FeatureVector) -> bool {
        match self {
            Tip::StudyHours => features.hours_studied < 4.0,
            Tip::Sleep => features.sleep_hours < 6.0,
            Tip::Practice => features.sample_papers < 3,
            Tip::Revision => features.previous_scores < 60,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Tip::StudyHours => "Increase study hours to 4-6 per day for better coverage.",
            Tip::Sleep => "Aim for 7-8 hours of sleep to improve focus and memory.",
            Tip::Practice => "Practice more full-length sample papers to build exam stamina.",
            Tip::Revision => "Review foundational topics and revise regularly.",
        }
    }
}

/// Evaluated against the raw inputs only; the predicted score plays no part.
pub fn tips(features: &FeatureVector) -> Vec<Tip> {
    Tip::ALL
        .into_iter()
        .filter(|tip| tip.applies(features))
        .collect()
}
