/// Number of inputs the linear model consumes.
pub const FEATURE_COUNT: usize = 5;

/// One of the model inputs, in the order the coefficients are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    HoursStudied,
    PreviousScores,
    Extracurricular,
    SleepHours,
    SamplePapers,
}

impl Feature {
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::HoursStudied,
        Feature::PreviousScores,
        Feature::Extracurricular,
        Feature::SleepHours,
        Feature::SamplePapers,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Feature::HoursStudied => "hours_studied",
            Feature::PreviousScores => "previous_scores",
            Feature::Extracurricular => "extracurricular",
            Feature::SleepHours => "sleep_hours",
            Feature::SamplePapers => "sample_papers",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Feature::HoursStudied => "Hours Studied",
            Feature::PreviousScores => "Previous Scores",
            Feature::Extracurricular => "Extracurricular",
            Feature::SleepHours => "Sleep Hours",
            Feature::SamplePapers => "Sample Papers",
        }
    }

    /// Column header used by the training dataset.
    pub fn column(self) -> &'static str {
        match self {
            Feature::HoursStudied => "Hours Studied",
            Feature::PreviousScores => "Previous Scores",
            Feature::Extracurricular => "Extracurricular Activities",
            Feature::SleepHours => "Sleep Hours",
            Feature::SamplePapers => "Sample Question Papers Practiced",
        }
    }

    /// Loose name match used when checking a serialized model's column list.
    /// Case, spaces, dashes and underscores are ignored.
    pub fn matches_name(self, name: &str) -> bool {
        let wanted = normalize_name(name);
        !wanted.is_empty()
            && (wanted == normalize_name(self.key()) || wanted == normalize_name(self.column()))
    }
}

fn normalize_name(raw: &str) -> String {
    raw.chars()
        .filter(|ch| ch.is_ascii_alphanumeric())
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}

/// Inputs describing one student. Built fresh for every prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub hours_studied: f64,
    pub previous_scores: u32,
    pub extracurricular: bool,
    pub sleep_hours: f64,
    pub sample_papers: u32,
}

impl FeatureVector {
    pub fn new(
        hours_studied: f64,
        previous_scores: u32,
        extracurricular: bool,
        sleep_hours: f64,
        sample_papers: u32,
    ) -> Self {
        Self {
            hours_studied,
            previous_scores,
            extracurricular,
            sleep_hours,
            sample_papers,
        }
    }

    pub fn value(&self, feature: Feature) -> f64 {
        match feature {
            Feature::HoursStudied => self.hours_studied,
            Feature::PreviousScores => f64::from(self.previous_scores),
            Feature::Extracurricular => {
                if self.extracurricular {
                    1.0
                } else {
                    0.0
                }
            }
            Feature::SleepHours => self.sleep_hours,
            Feature::SamplePapers => f64::from(self.sample_papers),
        }
    }

    /// Encoded values in `Feature::ALL` order.
    pub fn values(&self) -> [f64; FEATURE_COUNT] {
        Feature::ALL.map(|feature| self.value(feature))
    }
}
