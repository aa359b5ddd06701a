//! Oracle verdict tokens → numeric scores.

pub const SURE: f64 = 10.0;
pub const LIKELY: f64 = 5.0;
pub const IMPOSSIBLE: f64 = 1.0;
pub const UNPARSEABLE: f64 = 0.0;

/// Score one verdict token. Total: anything unrecognized scores [`UNPARSEABLE`].
pub fn score(token: &str) -> f64 {
    match token.trim().to_lowercase().as_str() {
        "sure" => SURE,
        "likely" => LIKELY,
        "impossible" => IMPOSSIBLE,
        _ => UNPARSEABLE,
    }
}

/// Score a whole oracle response by its last non-empty line.
pub fn score_response(text: &str) -> f64 {
    let last = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .unwrap_or("");
    score(last)
}
