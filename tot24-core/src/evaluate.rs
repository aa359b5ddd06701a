use crate::oracle::{generate_or_empty, Oracle};
use crate::prompts;
use crate::state::{strip_answer_marker, SearchState, PUZZLE_SIZE};
use crate::verdict;

/// Whether `state` has the number count expected after `step_index + 1` steps.
///
/// Pure text check on single-space fields: any deviation in the oracle's step format
/// (an extra token in the `left:` list, a doubled space) prunes the branch.
pub fn count_consistent(state: &SearchState, step_index: usize) -> bool {
    state.remaining().split(' ').count() + step_index + 1 == PUZZLE_SIZE
}

/// Score one candidate produced in round `step_index`.
///
/// Answer lines are judged against the origin. Other states are first checked for a
/// consistent number count (no oracle call when inconsistent), then judged for
/// reachability. Oracle failures score 0.
pub async fn evaluate(oracle: &dyn Oracle, state: &SearchState, step_index: usize) -> f64 {
    if state.last_line_is_answer() {
        let answer = strip_answer_marker(state.last_line());
        let prompt = prompts::value_last_step_prompt(state.origin(), answer);
        let text = generate_or_empty(oracle, &prompt, "judge_answer").await;
        return verdict::score_response(&text);
    }

    if !count_consistent(state, step_index) {
        tracing::debug!(
            step_index,
            remaining = state.remaining(),
            "inconsistent number count; pruned without oracle call"
        );
        return verdict::UNPARSEABLE;
    }

    let prompt = prompts::value_prompt(state.remaining());
    let text = generate_or_empty(oracle, &prompt, "value").await;
    verdict::score_response(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::FnOracle;
    use crate::state::Puzzle;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn root() -> SearchState {
        SearchState::root(&Puzzle::parse("4 5 6 10").unwrap())
    }

    fn counting(reply: &'static str) -> (Arc<AtomicUsize>, impl crate::oracle::Oracle) {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let o = FnOracle::new(move |_p: &str| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(reply.to_string())
        });
        (calls, o)
    }

    #[tokio::test]
    async fn reachability_verdict_is_scored() {
        let (calls, o) = counting("5 + 6 + 6 = 17\nlikely\n");
        let s = root().with_line("10 - 4 = 6 (left: 5 6 6)");
        assert_eq!(evaluate(&o, &s, 0).await, 5.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn count_mismatch_skips_the_oracle() {
        let (calls, o) = counting("sure");
        // Three numbers left, but round 1 expects two.
        let s = root().with_line("10 - 4 = 6 (left: 5 6 6)");
        assert_eq!(evaluate(&o, &s, 1).await, 0.0);
        // Hallucinated extra number.
        let s = root().with_line("10 - 4 = 6 (left: 5 6 6 7)");
        assert_eq!(evaluate(&o, &s, 0).await, 0.0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stray_token_in_left_list_is_pruned() {
        // A trailing comment inside `left:` counts as a number token.
        let (calls, o) = counting("sure");
        let s = root().with_line("10 - 4 = 6 (left: 5 6 6 ok)");
        assert_eq!(evaluate(&o, &s, 0).await, 0.0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn doubled_space_in_left_list_is_pruned() {
        // An empty field between two spaces counts as a token.
        let (calls, o) = counting("sure");
        let s = root().with_line("10 - 4 = 6 (left: 5  6 6)");
        assert!(!count_consistent(&s, 0));
        assert_eq!(evaluate(&o, &s, 0).await, 0.0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn answer_line_is_judged_against_origin() {
        let o = FnOracle::new(|p: &str| {
            assert!(p.ends_with("Input: 4 5 6 10\nAnswer: 5 * 6 - (10 - 4) = 24\nJudge:\n"));
            Ok("sure".to_string())
        });
        let s = root()
            .with_line("10 - 4 = 6 (left: 5 6 6)")
            .with_line("5 * 6 = 30 (left: 6 30)")
            .with_line("30 - 6 = 24 (left: 24)")
            .with_line("Answer: 5 * 6 - (10 - 4) = 24");
        assert_eq!(evaluate(&o, &s, 3).await, 10.0);
    }

    #[tokio::test]
    async fn unparseable_verdict_scores_zero() {
        let (_calls, o) = counting("I am not sure what you mean");
        let s = root().with_line("10 - 4 = 6 (left: 5 6 6)");
        assert_eq!(evaluate(&o, &s, 0).await, 0.0);
    }
}
