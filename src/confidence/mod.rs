//! GPS accuracy → trust score.
//!
//! Descriptive output for logs and the agent detail view. Nothing in the
//! indexing or query path reads it.

/// Score in [0, 100] for a GPS error radius in meters.
///
/// | accuracy (m)   | score                      |
/// |----------------|----------------------------|
/// | none           | 0                          |
/// | < 0            | 100 (high-confidence override) |
/// | 0 ..= 5        | 100 → 90                   |
/// | 5 ..= 20       | 90 → 50                    |
/// | 20 ..= 50      | 50 → 0                     |
/// | > 50           | 0                          |
///
/// The middle segments use the exact slopes 40/15 and 50/30 so the curve is
/// continuous and never rises as accuracy gets worse.
pub fn confidence_score(accuracy: Option<f64>) -> f64 {
    let Some(accuracy) = accuracy else {
        return 0.0;
    };
    if accuracy.is_nan() {
        return 0.0;
    }
    if accuracy < 0.0 {
        return 100.0;
    }

    let score = if accuracy <= 5.0 {
        100.0 - accuracy * 2.0
    } else if accuracy <= 20.0 {
        90.0 - 40.0 * (accuracy - 5.0) / 15.0
    } else if accuracy <= 50.0 {
        50.0 - 50.0 * (accuracy - 20.0) / 30.0
    } else {
        0.0
    };

    score.clamp(0.0, 100.0)
}

/// Formats a score as a whole percentage, e.g. `"90%"`.
pub fn format_percent(score: f64) -> String {
    format!("{:.0}%", score.clamp(0.0, 100.0))
}

/// `confidence_score` rendered with `format_percent`.
pub fn confidence_label(accuracy: Option<f64>) -> String {
    format_percent(confidence_score(accuracy))
}
