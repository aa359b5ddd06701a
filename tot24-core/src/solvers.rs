//! One-shot baselines (direct answer and chain-of-thought) plus a batch driver for the
//! beam search, all reporting the same correct/wrong counts.

use crate::arith::{self, eval_formula};
use crate::cache::{cache_key, ResponseCache, DEFAULT_TTL_SECS};
use crate::oracle::{Oracle, OracleError};
use crate::prompts;
use crate::state::{Puzzle, SearchState};
use crate::tree_search::BeamSearch;
use crate::verify;
use num_rational::BigRational;
use serde::Serialize;
use std::future::Future;

pub const DEFAULT_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptKind {
    Io,
    Cot,
}

impl PromptKind {
    /// Cache key prefix.
    pub fn prefix(self) -> &'static str {
        match self {
            PromptKind::Io => "ioprompt",
            PromptKind::Cot => "cotprompt",
        }
    }

    pub fn prompt(self, puzzle: &str) -> String {
        match self {
            PromptKind::Io => prompts::io_prompt(puzzle),
            PromptKind::Cot => prompts::cot_prompt(puzzle),
        }
    }

    /// The expression part of a response, before any evaluation.
    ///
    /// `Io`: everything left of the first `=`. `Cot`: the text after the first `Answer:`
    /// and left of the next `=`; `None` when there is no `Answer:`.
    pub fn formula(self, response: &str) -> Option<&str> {
        let tail = match self {
            PromptKind::Io => response,
            PromptKind::Cot => response.split_once("Answer:")?.1,
        };
        let f = tail.split('=').next().unwrap_or("").trim();
        Some(f)
    }
}

/// Value of a response's formula, or `None` when it cannot be evaluated.
pub fn evaluate_response(kind: PromptKind, response: &str) -> Option<BigRational> {
    let f = kind.formula(response)?;
    eval_formula(f).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cache,
    Oracle,
    Search,
}

#[derive(Debug, Clone, Serialize)]
pub struct SolveRecord {
    pub index: usize,
    pub input: String,
    pub response: String,
    pub source: Source,
    /// `None` when the formula did not parse or evaluate.
    pub value: Option<f64>,
    pub correct: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub method: String,
    pub records: Vec<SolveRecord>,
    pub correct: usize,
    pub wrong: usize,
    /// `correct / (correct + wrong)`, or 0 for an empty batch.
    pub accuracy: f64,
}

impl BatchReport {
    fn from_records(method: &str, records: Vec<SolveRecord>) -> Self {
        let correct = records.iter().filter(|r| r.correct).count();
        let wrong = records.len() - correct;
        let accuracy = if records.is_empty() {
            0.0
        } else {
            correct as f64 / records.len() as f64
        };
        tracing::info!(method, correct, wrong, accuracy, "batch done");
        Self {
            method: method.to_string(),
            records,
            correct,
            wrong,
            accuracy,
        }
    }
}

fn cached_response(cache: &dyn ResponseCache, key: &str) -> Option<String> {
    match cache.exists(key).and_then(|hit| match hit {
        true => cache.get(key),
        false => Ok(None),
    }) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(key, error = %e, "cache read failed; treating as miss");
            None
        }
    }
}

/// Run one pass of a direct solver over `puzzles`.
///
/// Responses are looked up in `cache` first; fresh responses are stored for a day and a
/// response whose formula cannot be evaluated has its entry expired immediately. The
/// first oracle failure aborts the pass.
pub async fn solve_batch(
    oracle: &dyn Oracle,
    cache: Option<&dyn ResponseCache>,
    puzzles: &[String],
    kind: PromptKind,
) -> Result<BatchReport, OracleError> {
    let mut records = Vec::with_capacity(puzzles.len());
    for (index, puzzle) in puzzles.iter().enumerate() {
        let key = cache_key(kind.prefix(), puzzle);
        let (response, source) = match cache.and_then(|c| cached_response(c, &key)) {
            Some(r) => (r, Source::Cache),
            None => {
                let r = oracle.generate(&kind.prompt(puzzle)).await?;
                if let Some(c) = cache {
                    if let Err(e) = c.set(&key, &r, DEFAULT_TTL_SECS) {
                        tracing::warn!(key, error = %e, "cache write failed");
                    }
                }
                (r, Source::Oracle)
            }
        };

        let value = evaluate_response(kind, &response);
        if value.is_none() {
            if let Some(c) = cache {
                if let Err(e) = c.expire(&key, 0) {
                    tracing::warn!(key, error = %e, "cache expire failed");
                }
            }
        }
        let correct = value.as_ref().is_some_and(|v| arith::equals_int(v, 24));
        tracing::info!(index, input = %puzzle, source = ?source, correct, "solved");
        records.push(SolveRecord {
            index,
            input: puzzle.clone(),
            response,
            source,
            value: value.as_ref().map(arith::to_f64),
            correct,
        });
    }
    Ok(BatchReport::from_records(kind.prefix(), records))
}

/// Run `f` up to `attempts` times (at least once), returning the first success or the
/// last error.
pub async fn with_retry<T, E, F, Fut>(attempts: usize, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < attempts => {
                tracing::warn!(attempt, attempts, error = %e, "batch failed; retrying");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

pub async fn naive_solve(
    oracle: &dyn Oracle,
    cache: Option<&dyn ResponseCache>,
    puzzles: &[String],
) -> Result<BatchReport, OracleError> {
    with_retry(DEFAULT_ATTEMPTS, move || {
        solve_batch(oracle, cache, puzzles, PromptKind::Io)
    })
    .await
}

pub async fn cot_solve(
    oracle: &dyn Oracle,
    cache: Option<&dyn ResponseCache>,
    puzzles: &[String],
) -> Result<BatchReport, OracleError> {
    with_retry(DEFAULT_ATTEMPTS, move || {
        solve_batch(oracle, cache, puzzles, PromptKind::Cot)
    })
    .await
}

/// Beam search + verification per puzzle. Malformed puzzles count as wrong.
pub async fn tot_solve(search: &BeamSearch, puzzles: &[String]) -> BatchReport {
    let mut records = Vec::with_capacity(puzzles.len());
    for (index, input) in puzzles.iter().enumerate() {
        let record = match Puzzle::parse(input) {
            Ok(p) => {
                let outcome = search.run(&p).await;
                let value = outcome
                    .final_state
                    .as_deref()
                    .and_then(SearchState::from_text)
                    .and_then(|s| s.answer_line().map(|l| verify::formula_of(l).to_string()))
                    .and_then(|f| eval_formula(&f).ok());
                SolveRecord {
                    index,
                    input: input.clone(),
                    response: outcome.final_state.unwrap_or_default(),
                    source: Source::Search,
                    value: value.as_ref().map(arith::to_f64),
                    correct: outcome.verified == 1,
                }
            }
            Err(e) => {
                tracing::warn!(index, input = %input, error = %e, "skipping malformed puzzle");
                SolveRecord {
                    index,
                    input: input.clone(),
                    response: String::new(),
                    source: Source::Search,
                    value: None,
                    correct: false,
                }
            }
        };
        records.push(record);
    }
    BatchReport::from_records("tot", records)
}
