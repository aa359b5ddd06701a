use crate::evaluate::evaluate;
use crate::expand::expand;
use crate::oracle::{Oracle, OracleError};
use crate::state::{Puzzle, SearchState};
use crate::verify;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("steps must be >= 1")]
    ZeroSteps,
    #[error("sample_size must be >= 1")]
    ZeroSampleSize,
}

/// Search bounds.
#[derive(Debug, Clone, Serialize)]
pub struct SearchConfig {
    /// Rounds of expand → evaluate → select. Always run in full.
    pub steps: usize,
    /// Beam width.
    pub sample_size: usize,
    /// Max oracle calls in flight; values below 1 are treated as 1.
    pub concurrency: usize,
    /// Deadline per round, shared by its expansion and evaluation phases.
    pub round_timeout: Option<Duration>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            steps: 4,
            sample_size: 5,
            concurrency: 4,
            round_timeout: None,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.steps == 0 {
            return Err(ConfigError::ZeroSteps);
        }
        if self.sample_size == 0 {
            return Err(ConfigError::ZeroSampleSize);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredState {
    pub state: SearchState,
    pub score: f64,
    /// Position in the round's expansion output; the tie-break for equal scores.
    pub emission_index: usize,
}

/// Keep the best `k`: score descending, then emission order.
pub fn select_top(mut candidates: Vec<ScoredState>, k: usize) -> Vec<ScoredState> {
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.emission_index.cmp(&b.emission_index))
    });
    candidates.truncate(k);
    candidates
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundSummary {
    pub round: usize,
    pub beam_in: usize,
    pub candidates: usize,
    pub survivors: usize,
    pub best_score: Option<f64>,
    pub oracle_calls: usize,
    pub oracle_failures: usize,
    pub timed_out: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub puzzle: String,
    pub config: SearchConfig,
    pub rounds: Vec<RoundSummary>,
    pub final_beam: Vec<ScoredState>,
    /// Text of the top survivor, if any.
    pub final_state: Option<String>,
    /// 1 if the top survivor carries a verified answer, else 0.
    pub verified: u8,
}

/// Counts calls and failures passing through to the wrapped oracle.
struct Metered {
    inner: Arc<dyn Oracle>,
    calls: AtomicUsize,
    failures: AtomicUsize,
}

impl Metered {
    fn snapshot(&self) -> (usize, usize) {
        (
            self.calls.load(Ordering::Relaxed),
            self.failures.load(Ordering::Relaxed),
        )
    }
}

#[async_trait]
impl Oracle for Metered {
    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let r = self.inner.generate(prompt).await;
        if r.is_err() {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        r
    }
}

/// Collect finished tasks until the set is empty or the deadline passes.
///
/// Returns `true` when the deadline cut the phase short; unfinished tasks are aborted.
async fn drain<T: 'static>(
    set: &mut JoinSet<T>,
    deadline: Option<Instant>,
    mut on_done: impl FnMut(T),
) -> bool {
    loop {
        let next = match deadline {
            Some(d) => match tokio::time::timeout_at(d, set.join_next()).await {
                Ok(n) => n,
                Err(_) => {
                    set.abort_all();
                    return true;
                }
            },
            None => set.join_next().await,
        };
        match next {
            None => return false,
            Some(Ok(v)) => on_done(v),
            Some(Err(e)) => tracing::warn!(error = %e, "search task did not complete"),
        }
    }
}

/// Depth-bounded beam search over oracle-proposed steps.
pub struct BeamSearch {
    oracle: Arc<dyn Oracle>,
    config: SearchConfig,
}

impl BeamSearch {
    pub fn new(oracle: Arc<dyn Oracle>, config: SearchConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { oracle, config })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    async fn expand_all(
        oracle: &Arc<dyn Oracle>,
        permits: &Arc<Semaphore>,
        beam: &[SearchState],
        deadline: Option<Instant>,
    ) -> (Vec<SearchState>, bool) {
        let mut set = JoinSet::new();
        for (i, s) in beam.iter().cloned().enumerate() {
            let oracle = oracle.clone();
            let permits = permits.clone();
            set.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                (i, expand(oracle.as_ref(), &s).await)
            });
        }
        let mut slots: Vec<Vec<SearchState>> = vec![Vec::new(); beam.len()];
        let timed_out = drain(&mut set, deadline, |(i, kids)| slots[i] = kids).await;
        (slots.into_iter().flatten().collect(), timed_out)
    }

    async fn evaluate_all(
        oracle: &Arc<dyn Oracle>,
        permits: &Arc<Semaphore>,
        candidates: &[SearchState],
        step_index: usize,
        deadline: Option<Instant>,
    ) -> (Vec<f64>, bool) {
        let mut set = JoinSet::new();
        for (i, s) in candidates.iter().cloned().enumerate() {
            let oracle = oracle.clone();
            let permits = permits.clone();
            set.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                (i, evaluate(oracle.as_ref(), &s, step_index).await)
            });
        }
        // Anything not scored by the deadline keeps 0.
        let mut scores = vec![0.0; candidates.len()];
        let timed_out = drain(&mut set, deadline, |(i, v)| scores[i] = v).await;
        (scores, timed_out)
    }

    /// Search from `puzzle` for exactly `steps` rounds, then verify the top survivor.
    pub async fn run(&self, puzzle: &Puzzle) -> SearchOutcome {
        let metered = Arc::new(Metered {
            inner: self.oracle.clone(),
            calls: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        });
        let oracle: Arc<dyn Oracle> = metered.clone();
        let permits = Arc::new(Semaphore::new(self.config.concurrency.max(1)));

        let mut beam = vec![ScoredState {
            state: SearchState::root(puzzle),
            score: 0.0,
            emission_index: 0,
        }];
        let mut rounds = Vec::with_capacity(self.config.steps);

        for step_index in 0..self.config.steps {
            let deadline = self.config.round_timeout.map(|t| Instant::now() + t);
            let (calls0, failures0) = metered.snapshot();
            let parents: Vec<SearchState> = beam.iter().map(|s| s.state.clone()).collect();

            let (candidates, expand_timed_out) =
                Self::expand_all(&oracle, &permits, &parents, deadline).await;
            let (scores, eval_timed_out) =
                Self::evaluate_all(&oracle, &permits, &candidates, step_index, deadline).await;

            let n_candidates = candidates.len();
            let scored: Vec<ScoredState> = candidates
                .into_iter()
                .zip(scores)
                .enumerate()
                .map(|(emission_index, (state, score))| ScoredState {
                    state,
                    score,
                    emission_index,
                })
                .collect();
            beam = select_top(scored, self.config.sample_size);

            let (calls1, failures1) = metered.snapshot();
            let summary = RoundSummary {
                round: step_index,
                beam_in: parents.len(),
                candidates: n_candidates,
                survivors: beam.len(),
                best_score: beam.first().map(|s| s.score),
                oracle_calls: calls1 - calls0,
                oracle_failures: failures1 - failures0,
                timed_out: expand_timed_out || eval_timed_out,
            };
            tracing::info!(
                puzzle = %puzzle,
                round = summary.round,
                beam_in = summary.beam_in,
                candidates = summary.candidates,
                survivors = summary.survivors,
                best_score = ?summary.best_score,
                oracle_calls = summary.oracle_calls,
                timed_out = summary.timed_out,
                "round done"
            );
            rounds.push(summary);
        }

        let top = beam.first().map(|s| &s.state);
        let verified = verify::verify(top);
        tracing::info!(puzzle = %puzzle, verified, "search finished");
        SearchOutcome {
            puzzle: puzzle.text.clone(),
            config: self.config.clone(),
            rounds,
            final_state: top.map(SearchState::text),
            final_beam: beam,
            verified,
        }
    }
}
