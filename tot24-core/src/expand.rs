use crate::oracle::{generate_or_empty, Oracle};
use crate::prompts;
use crate::state::{contains_answer_marker, SearchState};

/// Pick the single line to append from a final-answer response.
///
/// First line mentioning `answer`, else the last non-empty line.
fn answer_line_of(text: &str) -> Option<&str> {
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines
        .iter()
        .copied()
        .find(|l| contains_answer_marker(l))
        .or_else(|| lines.last().copied())
}

/// Children of one state. One oracle call; never fails (an empty result drops the branch).
///
/// A state whose remaining numbers are exactly `24` asks for the final answer and yields
/// at most one child. Any other state yields one child per proposed step line.
pub async fn expand(oracle: &dyn Oracle, state: &SearchState) -> Vec<SearchState> {
    if state.is_at_target() {
        let prompt = prompts::final_answer_prompt(state.origin(), state.trail());
        let text = generate_or_empty(oracle, &prompt, "final_answer").await;
        return answer_line_of(&text)
            .map(|line| vec![state.with_line(line)])
            .unwrap_or_default();
    }

    let prompt = prompts::propose_prompt(state.remaining());
    let text = generate_or_empty(oracle, &prompt, "propose").await;
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| state.with_line(l))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{FnOracle, OracleError};
    use crate::state::Puzzle;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn root() -> SearchState {
        SearchState::root(&Puzzle::parse("4 5 6 10").unwrap())
    }

    #[tokio::test]
    async fn one_child_per_proposed_line() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let o = FnOracle::new(move |p: &str| {
            c.fetch_add(1, Ordering::SeqCst);
            assert!(p.ends_with("Input: 4 5 6 10\nPossible next steps:\n"));
            Ok("10 - 4 = 6 (left: 5 6 6)\n\n  5 + 6 = 11 (left: 4 10 11)  \n".to_string())
        });
        let parent = root();
        let kids = expand(&o, &parent).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(kids.len(), 2);
        for k in &kids {
            assert_eq!(k.trail().len(), parent.trail().len() + 1);
        }
        assert_eq!(kids[1].last_line(), "5 + 6 = 11 (left: 4 10 11)");
        assert_eq!(parent.trail().len(), 0);
    }

    #[tokio::test]
    async fn target_state_gets_one_answer_child() {
        let o = FnOracle::new(|p: &str| {
            assert!(p.contains("Steps:\n10 - 4 = 6 (left: 5 6 6)\n"));
            Ok("30 - 6 = 24 (left: 24)\nAnswer: 5 * 6 - (10 - 4) = 24\nInput: 1 1 1 1".to_string())
        });
        let s = root()
            .with_line("10 - 4 = 6 (left: 5 6 6)")
            .with_line("5 * 6 = 30 (left: 6 30)")
            .with_line("30 - 6 = 24 (left: 24)");
        let kids = expand(&o, &s).await;
        assert_eq!(kids.len(), 1);
        assert_eq!(kids[0].last_line(), "Answer: 5 * 6 - (10 - 4) = 24");
    }

    #[tokio::test]
    async fn oracle_failure_yields_no_children() {
        let o = FnOracle::new(|_p: &str| Err(OracleError::Other("rate limited".into())));
        assert!(expand(&o, &root()).await.is_empty());
        let s = root().with_line("1 * 24 = 24 (left: 24)");
        assert!(expand(&o, &s).await.is_empty());
    }
}
