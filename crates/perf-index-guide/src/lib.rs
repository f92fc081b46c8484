use perf_index_core::{Feature, FeatureVector, Tier};

pub const GUIDE_ABOUT_URI: &str = "perf-index://guide/about.md";
pub const GUIDE_FEATURES_URI: &str = "perf-index://guide/features.md";

pub const GUIDE_ABOUT_TEXT: &str = include_str!("../../../guide/about.md");
pub const GUIDE_FEATURES_TEXT: &str = include_str!("../../../guide/features.md");

pub const BALANCED_MESSAGE: &str = "Balanced inputs: keep up the good habits!";
pub const MODEL_MISSING_MESSAGE: &str =
    "Model not found. Make sure 'linear_regression_model.json' exists in the app directory.";

#[derive(Debug, Clone, Copy)]
pub struct GuideResource {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub mime_type: &'static str,
    pub text: &'static str,
}

static GUIDE_RESOURCES: [GuideResource; 2] = [
    GuideResource {
        uri: GUIDE_ABOUT_URI,
        name: "guide/about.md",
        description: "Dataset summary and score interpretation.",
        mime_type: "text/markdown",
        text: GUIDE_ABOUT_TEXT,
    },
    GuideResource {
        uri: GUIDE_FEATURES_URI,
        name: "guide/features.md",
        description: "What each input means and when advice is given.",
        mime_type: "text/markdown",
        text: GUIDE_FEATURES_TEXT,
    },
];

pub fn resources() -> &'static [GuideResource] {
    &GUIDE_RESOURCES
}

pub fn resource_text(uri: &str) -> Option<&'static str> {
    GUIDE_RESOURCES
        .iter()
        .find(|resource| resource.uri == uri)
        .map(|resource| resource.text)
}

pub fn tier_headline(tier: Tier) -> &'static str {
    match tier {
        Tier::Excellent => "Excellent: strong prospects based on the inputs.",
        Tier::Good => "Good: steady performance; slight improvements could help.",
        Tier::NeedsImprovement => {
            "Needs improvement: consider more study time and practice papers."
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Slider {
        min: f64,
        max: f64,
        default: f64,
        step: f64,
    },
    Choice {
        options: &'static [&'static str],
        default: &'static str,
    },
}

/// One input control of the prediction form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormField {
    pub feature: Feature,
    pub label: &'static str,
    pub help: &'static str,
    pub kind: FieldKind,
}

impl FormField {
    /// Bounds check for slider fields. Choice fields are boolean in the model,
    /// so any value passes.
    pub fn contains(&self, value: f64) -> bool {
        match self.kind {
            FieldKind::Slider { min, max, .. } => (min..=max).contains(&value),
            FieldKind::Choice { .. } => true,
        }
    }
}

const YES_NO: &[&str] = &["Yes", "No"];

static FORM_FIELDS: [FormField; 5] = [
    FormField {
        feature: Feature::HoursStudied,
        label: "Hours Studied per Day",
        help: "Total hours student studies each day.",
        kind: FieldKind::Slider {
            min: 0.0,
            max: 12.0,
            default: 5.0,
            step: 0.5,
        },
    },
    FormField {
        feature: Feature::PreviousScores,
        label: "Previous Test Scores",
        help: "Recent average test scores (0-100).",
        kind: FieldKind::Slider {
            min: 0.0,
            max: 100.0,
            default: 75.0,
            step: 1.0,
        },
    },
    FormField {
        feature: Feature::SamplePapers,
        label: "Sample Papers Practiced",
        help: "Number of full sample papers completed.",
        kind: FieldKind::Slider {
            min: 0.0,
            max: 20.0,
            default: 5.0,
            step: 1.0,
        },
    },
    FormField {
        feature: Feature::SleepHours,
        label: "Sleep Hours per Day",
        help: "Average daily sleep hours.",
        kind: FieldKind::Slider {
            min: 0.0,
            max: 12.0,
            default: 7.0,
            step: 0.5,
        },
    },
    FormField {
        feature: Feature::Extracurricular,
        label: "Extracurricular Activities",
        help: "Participation in sports, arts, clubs, etc.",
        kind: FieldKind::Choice {
            options: YES_NO,
            default: "Yes",
        },
    },
];

/// Form controls in display order, which differs from model order.
pub fn form_fields() -> &'static [FormField] {
    &FORM_FIELDS
}

pub fn form_field(feature: Feature) -> Option<&'static FormField> {
    FORM_FIELDS.iter().find(|field| field.feature == feature)
}

pub fn default_features() -> FeatureVector {
    FeatureVector::new(5.0, 75, true, 7.0, 5)
}
