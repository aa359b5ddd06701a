use crate::arith::{self, FormulaError};
use crate::state::{strip_answer_marker, SearchState};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    NoAnswer,
    NumbersMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
    Formula {
        error: String,
    },
    WrongValue {
        value: String,
    },
}

impl From<FormulaError> for Rejection {
    fn from(e: FormulaError) -> Self {
        Rejection::Formula {
            error: e.to_string(),
        }
    }
}

fn literal_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+(?:\.\d+)?").ok()).as_ref()
}

/// Numeric literals in order of appearance, as text.
pub fn numeric_literals(s: &str) -> Vec<String> {
    let Some(re) = literal_re() else {
        return Vec::new();
    };
    re.find_iter(s).map(|m| m.as_str().to_string()).collect()
}

/// The formula part of an answer line: marker removed, cut at the first `=`.
pub fn formula_of(answer_line: &str) -> &str {
    let body = strip_answer_marker(answer_line);
    body.split('=').next().unwrap_or("").trim()
}

/// Check the final state's answer against its origin.
///
/// Literal multisets must match exactly (sorted as text), then the formula must evaluate
/// to exactly 24 under the restricted grammar.
pub fn check_answer(state: &SearchState) -> Result<(), Rejection> {
    let line = state.answer_line().ok_or(Rejection::NoAnswer)?;
    let formula = formula_of(line);

    let mut expected = numeric_literals(state.origin());
    let mut found = numeric_literals(formula);
    expected.sort();
    found.sort();
    if expected != found {
        return Err(Rejection::NumbersMismatch { expected, found });
    }

    let value = arith::eval_formula(formula)?;
    if arith::equals_int(&value, 24) {
        Ok(())
    } else {
        Err(Rejection::WrongValue {
            value: value.to_string(),
        })
    }
}

/// 1 for a verified answer, 0 otherwise (including no survivor at all).
pub fn verify(state: Option<&SearchState>) -> u8 {
    match state.map(check_answer) {
        Some(Ok(())) => 1,
        Some(Err(r)) => {
            tracing::debug!(rejection = ?r, "answer rejected");
            0
        }
        None => 0,
    }
}
