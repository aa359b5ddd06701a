use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tot24_core::tree_search::{BeamSearch, SearchConfig};
use tot24_core::{FnOracle, Oracle, OracleError, Puzzle};

fn input_of(prompt: &str) -> &str {
    prompt
        .rsplit("Input: ")
        .next()
        .and_then(|s| s.lines().next())
        .unwrap_or("")
        .trim()
}

fn last_line(prompt: &str) -> &str {
    prompt.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("").trim()
}

/// Deterministic oracle that walks `4 5 6 10` to 24 along one branch.
fn scripted(answer: &'static str) -> impl Fn(&str) -> Result<String, OracleError> + Send + Sync {
    move |p: &str| {
        let out = if p.ends_with("Judge:\n") {
            "sure"
        } else if p.ends_with("Possible next steps:\n") {
            match input_of(p) {
                "4 5 6 10" => "10 - 4 = 6 (left: 5 6 6)\n4 + 5 = 9 (left: 6 9 10)",
                "5 6 6" => "5 * 6 = 30 (left: 6 30)",
                "6 30" => "30 - 6 = 24 (left: 24)",
                _ => "",
            }
        } else if p.starts_with("Evaluate if given numbers") {
            match last_line(p) {
                "5 6 6" | "6 30" | "24" => "sure",
                _ => "impossible",
            }
        } else if p.contains("Steps:\n10 - 4 = 6") {
            answer
        } else {
            ""
        };
        Ok(out.to_string())
    }
}

fn search(oracle: impl Oracle + 'static, config: SearchConfig) -> BeamSearch {
    BeamSearch::new(Arc::new(oracle), config).unwrap()
}

fn puzzle() -> Puzzle {
    Puzzle::parse("4 5 6 10").unwrap()
}

#[tokio::test]
async fn scripted_walk_reaches_verified_answer() {
    let s = search(
        FnOracle::new(scripted("Answer: 5 * 6 - (10 - 4) = 24")),
        SearchConfig::default(),
    );
    let out = s.run(&puzzle()).await;
    assert_eq!(out.rounds.len(), 4);
    assert_eq!(out.verified, 1);
    assert_eq!(
        out.final_state.as_deref(),
        Some(
            "4 5 6 10\n10 - 4 = 6 (left: 5 6 6)\n5 * 6 = 30 (left: 6 30)\n30 - 6 = 24 (left: 24)\nAnswer: 5 * 6 - (10 - 4) = 24"
        )
    );
    assert_eq!(out.final_beam[0].score, 10.0);
    // Round 0 kept both proposals; the impossible one died with no children.
    assert_eq!(out.rounds[0].survivors, 2);
    assert_eq!(out.rounds[1].candidates, 1);
}

#[tokio::test]
async fn foreign_number_in_answer_is_not_verified() {
    // The oracle judge says "sure", but the formula uses numbers not in the puzzle.
    let s = search(
        FnOracle::new(scripted("Answer: 4 * 6 * 1 = 24")),
        SearchConfig::default(),
    );
    let out = s.run(&puzzle()).await;
    assert_eq!(out.final_beam[0].score, 10.0);
    assert_eq!(out.verified, 0);
}

#[tokio::test]
async fn beam_width_one_still_finds_the_branch() {
    let s = search(
        FnOracle::new(scripted("Answer: 5 * 6 - (10 - 4) = 24")),
        SearchConfig {
            sample_size: 1,
            concurrency: 1,
            ..SearchConfig::default()
        },
    );
    let out = s.run(&puzzle()).await;
    assert!(out.rounds.iter().all(|r| r.survivors <= 1));
    assert_eq!(out.verified, 1);
}

#[tokio::test]
async fn failing_oracle_empties_the_beam_but_runs_every_round() {
    let s = search(
        FnOracle::new(|_p: &str| Err(OracleError::Other("503".into()))),
        SearchConfig::default(),
    );
    let out = s.run(&puzzle()).await;
    assert_eq!(out.rounds.len(), 4);
    assert_eq!(out.rounds[0].oracle_failures, 1);
    assert!(out.final_beam.is_empty());
    assert_eq!(out.final_state, None);
    assert_eq!(out.verified, 0);
}

/// Proposes three steps; the earlier a candidate was emitted, the slower its evaluation.
struct InvertedLatency;

#[async_trait]
impl Oracle for InvertedLatency {
    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        if prompt.ends_with("Possible next steps:\n") {
            return Ok("4 + 5 = 9 (left: 6 9 10)\n10 - 4 = 6 (left: 5 6 6)\n6 - 5 = 1 (left: 1 4 10)"
                .to_string());
        }
        let delay = match last_line(prompt) {
            "6 9 10" => 300,
            "5 6 6" => 200,
            _ => 100,
        };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok("likely".to_string())
    }
}

#[tokio::test(start_paused = true)]
async fn completion_order_does_not_affect_selection() {
    let s = search(
        InvertedLatency,
        SearchConfig {
            steps: 1,
            sample_size: 3,
            concurrency: 3,
            round_timeout: None,
        },
    );
    let out = s.run(&puzzle()).await;
    let order: Vec<(usize, &str)> = out
        .final_beam
        .iter()
        .map(|s| (s.emission_index, s.state.last_line()))
        .collect();
    assert_eq!(
        order,
        vec![
            (0, "4 + 5 = 9 (left: 6 9 10)"),
            (1, "10 - 4 = 6 (left: 5 6 6)"),
            (2, "6 - 5 = 1 (left: 1 4 10)"),
        ]
    );
    assert!(out.final_beam.iter().all(|s| s.score == 5.0));
}

struct NeverAnswers;

#[async_trait]
impl Oracle for NeverAnswers {
    async fn generate(&self, _prompt: &str) -> Result<String, OracleError> {
        std::future::pending::<()>().await;
        Ok(String::new())
    }
}

#[tokio::test(start_paused = true)]
async fn round_deadline_abandons_unfinished_calls() {
    let s = search(
        NeverAnswers,
        SearchConfig {
            steps: 2,
            sample_size: 5,
            concurrency: 4,
            round_timeout: Some(Duration::from_millis(50)),
        },
    );
    let out = s.run(&puzzle()).await;
    assert_eq!(out.rounds.len(), 2);
    assert!(out.rounds[0].timed_out);
    assert_eq!(out.rounds[0].candidates, 0);
    assert_eq!(out.rounds[1].beam_in, 0);
    assert!(out.final_beam.is_empty());
    assert_eq!(out.verified, 0);
}

/// Proposes at once; every evaluation hangs.
struct StallsOnJudging;

#[async_trait]
impl Oracle for StallsOnJudging {
    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        if prompt.ends_with("Possible next steps:\n") {
            return Ok("10 - 4 = 6 (left: 5 6 6)\n4 + 5 = 9 (left: 6 9 10)".to_string());
        }
        std::future::pending::<()>().await;
        Ok("sure".to_string())
    }
}

#[tokio::test(start_paused = true)]
async fn deadline_during_evaluation_leaves_candidates_unscored() {
    let s = search(
        StallsOnJudging,
        SearchConfig {
            steps: 1,
            sample_size: 5,
            concurrency: 4,
            round_timeout: Some(Duration::from_millis(50)),
        },
    );
    let out = s.run(&puzzle()).await;
    assert_eq!(out.rounds[0].candidates, 2);
    assert!(out.rounds[0].timed_out);
    let scores: Vec<f64> = out.final_beam.iter().map(|s| s.score).collect();
    assert_eq!(scores, vec![0.0, 0.0]);
    assert_eq!(out.final_beam[0].emission_index, 0);
    assert_eq!(out.verified, 0);
}
