//! Few-shot prompt templates. Each has one or two `{}` slots, filled in order.

/// Direct answer, no working shown.
pub const IO_PROMPT: &str = "Use numbers and basic arithmetic operations (+ - * /) to obtain 24, give me the answer only, no need to explain.
Input: 4 4 6 8
Answer: (4 + 8) * (6 - 4) = 24
Input: 2 9 10 12
Answer: 2 * 12 * (10 - 9) = 24
Input: 4 9 10 13
Answer: (13 - 9) * (10 - 4) = 24
Input: 1 4 8 8
Answer: (8 / 4 + 1) * 8 = 24
Input: 5 5 5 9
Answer: 5 + 5 + 5 + 9 = 24
Input: {}
Answer:
";

/// Chain of thought: three steps, then the combined expression.
pub const COT_PROMPT: &str = "Use numbers and basic arithmetic operations (+ - * /) to obtain 24. Each step, you are only allowed to choose two of the remaining numbers to obtain a new number.
Input: 4 4 6 8
Steps:
4 + 8 = 12 (left: 4 6 12)
6 - 4 = 2 (left: 2 12)
2 * 12 = 24 (left: 24)
Answer: (6 - 4) * (4 + 8) = 24
Input: 2 9 10 12
Steps:
12 * 2 = 24 (left: 9 10 24)
10 - 9 = 1 (left: 1 24)
24 * 1 = 24 (left: 24)
Answer: (12 * 2) * (10 - 9) = 24
Input: 4 9 10 13
Steps:
13 - 10 = 3 (left: 3 4 9)
9 - 3 = 6 (left: 4 6)
4 * 6 = 24 (left: 24)
Answer: 4 * (9 - (13 - 10)) = 24
Input: 1 4 8 8
Steps:
8 / 4 = 2 (left: 1 2 8)
1 + 2 = 3 (left: 3 8)
3 * 8 = 24 (left: 24)
Answer: (1 + 8 / 4) * 8 = 24
Input: 5 5 5 9
Steps:
5 + 5 = 10 (left: 5 9 10)
10 + 5 = 15 (left: 9 15)
15 + 9 = 24 (left: 24)
Answer: ((5 + 5) + 5) + 9 = 24

Input: {}
";

/// One-shot list of possible next steps for a set of remaining numbers.
pub const PROPOSE_PROMPT: &str = "Input: 2 8 8 14
Possible next steps:
2 + 8 = 10 (left: 8 10 14)
8 / 2 = 4 (left: 4 8 14)
14 + 2 = 16 (left: 8 8 16)
2 * 8 = 16 (left: 8 14 16)
8 - 2 = 6 (left: 6 8 14)
14 - 8 = 6 (left: 2 6 8)
14 /  2 = 7 (left: 7 8 8)
14 - 2 = 12 (left: 8 8 12)

Input: 2 6 8
Possible next steps:
2 + 6 = 8 (left: 8 8)
2 * 6 = 12 (left: 8 12)
6 + 8 = 14 (left: 14)
6 * 8 = 48 (left: 48)
6 - 2 = 4 (left: 4 8)
6 / 2 = 3 (left: 3 8)
8 - 6 = 2 (left: 2 8)
8 * 6 = 48 (left: 2 48)
8 / 2 = 4 (left: 4 6)
8 + 2 = 10 (left: 10 6)
8 - 2 = 6 (left: 6 8)
8 * 2 = 16 (left: 16 6)

Input: 3 7
Possible next steps:
3 + 7 = 10 (left: 10)
3 * 7 = 21 (left: 21)
7 - 3 = 4 (left: 4)

Input: {}
Possible next steps:
";

/// Reachability judgement for a set of remaining numbers (sure/likely/impossible).
pub const VALUE_PROMPT: &str = "Evaluate if given numbers can reach 24 (sure/likely/impossible)
10 14
10 + 14 = 24
sure

11 12
11 + 12 = 23
12 - 11 = 1
11 * 12 = 132
11 / 12 = 0.91
impossible

4 4 10
4 + 4 + 10 = 8 + 10 = 18
4 * 10 - 4 = 40 - 4 = 36
(10 - 4) * 4 = 6 * 4 = 24
sure

4 9 11
9 + 11 + 4 = 20 + 4 = 24
sure

5 7 8
5 + 7 + 8 = 12 + 8 = 20
(8 - 5) * 7 = 3 * 7 = 21
I cannot obtain 24 now, but numbers are within a reasonable range
likely

5 6 6
5 + 6 + 6 = 17
(6 - 5) * 6 = 1 * 6 = 6
I cannot obtain 24 now, but numbers are within a reasonable range
likely

10 10 11
10 + 10 + 11 = 31
(11 - 10) * 10 = 10
10 10 10 are all too big
impossible

1 3 3
1 * 3 * 3 = 9
(1 + 3) * 3 = 12
1 3 3 are all too small
impossible

{}
";

/// Judge a finished answer against the input (sure/impossible). Two slots: input, answer.
pub const VALUE_LAST_STEP_PROMPT: &str = "Use numbers and basic arithmetic operations (+ - * /) to obtain 24. Given an input and an answer, give a judgement (sure/impossible) if the answer is correct, i.e. it uses each input exactly once and no other numbers, and reach 24.
Input: 4 4 6 8
Answer: (4 + 8) * (6 - 4) = 24
Judge:
sure
Input: 2 9 10 12
Answer: 2 * 12 * (10 - 9) = 24
Judge:
sure
Input: 4 9 10 13
Answer: (13 - 9) * (10 - 4) = 24
Judge:
sure
Input: 4 4 6 8
Answer: (4 + 8) * (6 - 4) + 1 = 25
Judge:
impossible
Input: 2 9 10 12
Answer: 2 * (12 - 10) = 24
Judge:
impossible
Input: 4 9 10 13
Answer: (13 - 4) * (10 - 9) = 24
Judge:
impossible
Input: {}
Answer: {}
Judge:
";

/// Fill `{}` slots left to right. Missing args leave the slot empty; extra args are ignored.
pub fn fill(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len() + args.iter().map(|a| a.len()).sum::<usize>());
    let mut args = args.iter();
    let mut rest = template;
    while let Some(i) = rest.find("{}") {
        out.push_str(&rest[..i]);
        if let Some(a) = args.next() {
            out.push_str(a);
        }
        rest = &rest[i + 2..];
    }
    out.push_str(rest);
    out
}

pub fn io_prompt(puzzle: &str) -> String {
    fill(IO_PROMPT, &[puzzle])
}

pub fn cot_prompt(puzzle: &str) -> String {
    fill(COT_PROMPT, &[puzzle])
}

/// The chain-of-thought prompt continued with the steps taken so far.
pub fn final_answer_prompt(origin: &str, trail: &[String]) -> String {
    let mut p = cot_prompt(origin);
    p.push_str("Steps:\n");
    for step in trail {
        p.push_str(step);
        p.push('\n');
    }
    p
}

pub fn propose_prompt(remaining: &str) -> String {
    fill(PROPOSE_PROMPT, &[remaining])
}

pub fn value_prompt(remaining: &str) -> String {
    fill(VALUE_PROMPT, &[remaining])
}

pub fn value_last_step_prompt(input: &str, answer: &str) -> String {
    fill(VALUE_LAST_STEP_PROMPT, &[input, answer])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_replaces_slots_in_order() {
        assert_eq!(fill("a {} b {} c", &["1", "2"]), "a 1 b 2 c");
        assert_eq!(fill("a {} b {}", &["1"]), "a 1 b ");
    }

    #[test]
    fn final_answer_prompt_appends_steps() {
        let trail = vec![
            "10 - 4 = 6 (left: 5 6 6)".to_string(),
            "5 * 6 = 30 (left: 6 30)".to_string(),
        ];
        let p = final_answer_prompt("4 5 6 10", &trail);
        assert!(p.ends_with("Input: 4 5 6 10\nSteps:\n10 - 4 = 6 (left: 5 6 6)\n5 * 6 = 30 (left: 6 30)\n"));
    }

    #[test]
    fn last_step_prompt_has_both_slots() {
        let p = value_last_step_prompt("4 5 6 10", "5 * 6 - (10 - 4) = 24");
        assert!(p.ends_with("Input: 4 5 6 10\nAnswer: 5 * 6 - (10 - 4) = 24\nJudge:\n"));
        assert!(!p.contains("{}"));
    }
}
