use serde::{Deserialize, Serialize};

/// Number of literals in a puzzle.
pub const PUZZLE_SIZE: usize = 4;

/// The value every puzzle must reach, as it appears in oracle text.
pub const TARGET: &str = "24";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PuzzleError {
    #[error("expected 4 numbers, got {0}: {1:?}")]
    WrongCount(usize, String),
    #[error("not a number: {0:?}")]
    NotNumeric(String),
}

/// Split a number list on whitespace and commas.
pub fn number_tokens(s: &str) -> Vec<&str> {
    s.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect()
}

/// A root problem: exactly four numeric literals, kept as given text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Puzzle {
    pub text: String,
    pub numbers: Vec<String>,
}

impl Puzzle {
    pub fn parse(text: &str) -> Result<Self, PuzzleError> {
        let text = text.trim();
        let numbers: Vec<String> = number_tokens(text).into_iter().map(str::to_string).collect();
        if numbers.len() != PUZZLE_SIZE {
            return Err(PuzzleError::WrongCount(numbers.len(), text.to_string()));
        }
        for n in &numbers {
            if n.parse::<f64>().is_err() {
                return Err(PuzzleError::NotNumeric(n.clone()));
            }
        }
        Ok(Self {
            text: text.to_string(),
            numbers,
        })
    }
}

impl std::fmt::Display for Puzzle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// An append-only text trace: `origin`, then one line per step, then maybe an answer line.
///
/// Children are built with [`SearchState::with_line`]; a state is never mutated after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchState {
    lines: Vec<String>,
}

impl SearchState {
    pub fn root(puzzle: &Puzzle) -> Self {
        Self {
            lines: vec![puzzle.text.clone()],
        }
    }

    /// Rebuild a state from its newline-joined text (e.g. a saved trace).
    ///
    /// Blank lines are dropped. Returns `None` for text with no lines at all.
    pub fn from_text(text: &str) -> Option<Self> {
        let lines: Vec<String> = text
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        if lines.is_empty() {
            None
        } else {
            Some(Self { lines })
        }
    }

    pub fn with_line(&self, line: &str) -> Self {
        let mut lines = self.lines.clone();
        lines.push(line.trim().to_string());
        Self { lines }
    }

    pub fn origin(&self) -> &str {
        &self.lines[0]
    }

    /// Everything after `origin`: steps, plus the answer line once one was appended.
    pub fn trail(&self) -> &[String] {
        &self.lines[1..]
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn last_line(&self) -> &str {
        // `lines` is never empty.
        self.lines.last().map(String::as_str).unwrap_or("")
    }

    /// Numbers still available after the latest step.
    ///
    /// Text after the last `left: ` of the last line, up to `)`. A last line without that
    /// marker (including `origin` itself) is returned whole.
    pub fn remaining(&self) -> &str {
        let last = self.last_line();
        match last.rfind("left: ") {
            Some(i) => {
                let rest = &last[i + "left: ".len()..];
                rest.split(')').next().unwrap_or("").trim()
            }
            None => last.trim(),
        }
    }

    pub fn is_at_target(&self) -> bool {
        self.remaining() == TARGET
    }

    pub fn last_line_is_answer(&self) -> bool {
        contains_answer_marker(self.last_line())
    }

    /// The last line mentioning `answer`, if any.
    pub fn answer_line(&self) -> Option<&str> {
        self.lines
            .iter()
            .rev()
            .find(|l| contains_answer_marker(l))
            .map(String::as_str)
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl std::fmt::Display for SearchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text())
    }
}

pub(crate) fn contains_answer_marker(line: &str) -> bool {
    line.to_lowercase().contains("answer")
}

/// Remove a leading `Answer:` marker (any case) from an answer line.
pub fn strip_answer_marker(line: &str) -> &str {
    let t = line.trim();
    match t.to_ascii_lowercase().find("answer:") {
        Some(i) => t[i + "answer:".len()..].trim(),
        None => t,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn puzzle_accepts_spaces_and_commas() {
        let p = Puzzle::parse("3, 5, 10, 6").unwrap();
        assert_eq!(p.numbers, vec!["3", "5", "10", "6"]);
        assert_eq!(p.text, "3, 5, 10, 6");
    }

    #[test]
    fn puzzle_rejects_wrong_count() {
        assert!(matches!(
            Puzzle::parse("1 2 3"),
            Err(PuzzleError::WrongCount(3, _))
        ));
        assert!(matches!(
            Puzzle::parse("1 2 3 x"),
            Err(PuzzleError::NotNumeric(_))
        ));
    }

    #[test]
    fn remaining_follows_last_step() {
        let p = Puzzle::parse("4 5 6 10").unwrap();
        let s0 = SearchState::root(&p);
        assert_eq!(s0.remaining(), "4 5 6 10");
        let s1 = s0.with_line("10 - 4 = 6 (left: 5 6 6)");
        assert_eq!(s1.remaining(), "5 6 6");
        assert_eq!(s1.trail().len(), 1);
        assert_eq!(s0.trail().len(), 0);
        let s3 = s1
            .with_line("5 * 6 = 30 (left: 6 30)")
            .with_line("30 - 6 = 24 (left: 24)");
        assert!(s3.is_at_target());
    }

    #[test]
    fn answer_marker_is_case_insensitive() {
        let p = Puzzle::parse("4 5 6 10").unwrap();
        let s = SearchState::root(&p).with_line("ANSWER: 5 * 6 - (10 - 4) = 24");
        assert!(s.last_line_is_answer());
        assert_eq!(strip_answer_marker(s.last_line()), "5 * 6 - (10 - 4) = 24");
    }

    #[test]
    fn from_text_round_trips_lines() {
        let text = "4 5 6 10\n\n10 - 4 = 6 (left: 5 6 6)\n";
        let s = SearchState::from_text(text).unwrap();
        assert_eq!(s.origin(), "4 5 6 10");
        assert_eq!(s.text(), "4 5 6 10\n10 - 4 = 6 (left: 5 6 6)");
        assert!(SearchState::from_text("  \n").is_none());
    }

    #[test]
    fn serialized_state_is_rebuilt_through_from_text() {
        let p = Puzzle::parse("4 5 6 10").unwrap();
        let s = SearchState::root(&p).with_line("10 - 4 = 6 (left: 5 6 6)");
        let v = serde_json::to_value(&s).unwrap();
        let lines: Vec<String> = serde_json::from_value(v["lines"].clone()).unwrap();
        let back = SearchState::from_text(&lines.join("\n")).unwrap();
        assert_eq!(back, s);
        // An empty line list never becomes a state.
        assert!(SearchState::from_text(&Vec::<String>::new().join("\n")).is_none());
    }
}
