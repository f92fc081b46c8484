use std::fmt::Write as _;

use perf_index_core::{Feature, FeatureVector, PredictionResult, SCORE_MAX, SCORE_MIN};
use perf_index_guide::{tier_headline, BALANCED_MESSAGE};
use serde_json::{json, Value};

/// Table row shown under the prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub feature: &'static str,
    pub value: String,
}

pub fn summary_rows(features: &FeatureVector) -> Vec<SummaryRow> {
    Feature::ALL
        .iter()
        .map(|feature| SummaryRow {
            feature: feature.label(),
            value: summary_value(*feature, features),
        })
        .collect()
}

fn summary_value(feature: Feature, features: &FeatureVector) -> String {
    match feature {
        Feature::HoursStudied => format!("{:.1} hrs", features.hours_studied),
        Feature::PreviousScores => format!("{}/100", features.previous_scores),
        Feature::Extracurricular => yes_no(features.extracurricular).to_string(),
        Feature::SleepHours => format!("{:.1} hrs", features.sleep_hours),
        Feature::SamplePapers => features.sample_papers.to_string(),
    }
}

pub fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

pub fn render_report(features: &FeatureVector, result: &PredictionResult) -> String {
    let rows = summary_rows(features);
    let width = rows
        .iter()
        .map(|row| row.feature.len())
        .max()
        .unwrap_or(0)
        .max("Feature".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "Predicted Performance Index: {} / {SCORE_MAX}",
        result.score
    );
    let _ = writeln!(out, "{}", tier_headline(result.tier));
    out.push('\n');
    let _ = writeln!(out, "{:<width$}  Value", "Feature");
    for row in &rows {
        let _ = writeln!(out, "{:<width$}  {}", row.feature, row.value);
    }
    out.push('\n');
    if result.is_balanced() {
        out.push_str(BALANCED_MESSAGE);
        out.push('\n');
    } else {
        out.push_str("Recommendations\n");
        for tip in &result.tips {
            let _ = writeln!(out, "- {}", tip.message());
        }
    }
    out
}

pub fn prediction_json(features: &FeatureVector, result: &PredictionResult) -> Value {
    let summary = summary_rows(features)
        .into_iter()
        .map(|row| json!({"feature": row.feature, "value": row.value}))
        .collect::<Vec<_>>();
    json!({
        "score": result.score,
        "raw_score": result.raw_score,
        "tier": result.tier.label(),
        "headline": tier_headline(result.tier),
        "tips": result.tip_messages(),
        "balanced": result.is_balanced(),
        "summary": summary,
        "gauge": {"min": SCORE_MIN, "max": SCORE_MAX, "value": result.score}
    })
}
