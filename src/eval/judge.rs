// ============================================================
// Layer 5 — Answer Judgers
// ============================================================
// Benchmark-specific correctness rules over a raw response.
// Every judger is a pure function with a closed outcome set:
// there is no "unknown", ambiguous responses fall to the
// stated default.
//
//   strict_choice  — first isolated uppercase letter == expected
//                    "The answer is B."  → 'B'
//                    "a"                 → no letter → incorrect
//   loose_answer   — expected text appears anywhere, any case
//   yes_no         — "no"/"not" anywhere → No, otherwise Yes

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Runs of ASCII letters. A run of length 1 is an isolated letter.
fn letter_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z]+").expect("static regex is valid"))
}

/// The first uppercase ASCII letter not adjacent to another
/// ASCII letter, e.g. the 'C' in "(C) a bicycle".
pub fn first_isolated_capital(response: &str) -> Option<char> {
    letter_runs()
        .find_iter(response)
        .map(|m| m.as_str())
        .filter(|run| run.len() == 1)
        .filter_map(|run| run.chars().next())
        .find(char::is_ascii_uppercase)
}

/// Multiple choice, strict: the first isolated letter must be the
/// expected choice letter.
pub fn strict_choice(expected: char, response: &str) -> bool {
    first_isolated_capital(response) == Some(expected)
}

/// Multiple choice, loose: the expected answer text appears in the
/// response, ignoring case.
pub fn loose_answer(expected_text: &str, response: &str) -> bool {
    response.to_lowercase().contains(&expected_text.to_lowercase())
}

/// Choice index → choice letter (0 → 'A').
pub fn choice_letter(index: usize) -> Option<char> {
    u8::try_from(index)
        .ok()
        .filter(|i| *i < 26)
        .map(|i| (b'A' + i) as char)
}

// ─── Yes / No ─────────────────────────────────────────────────────────────────
/// Binary label; Yes is the positive class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YesNo {
    No  = 0,
    Yes = 1,
}

impl YesNo {
    /// Ground truth from the expected answer string.
    pub fn from_answer(answer: &str) -> Self {
        if answer.trim().eq_ignore_ascii_case("yes") { Self::Yes } else { Self::No }
    }

    pub fn is_positive(self) -> bool {
        self == Self::Yes
    }

    pub fn as_label(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for YesNo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(if self.is_positive() { "yes" } else { "no" })
    }
}

const NEGATIONS: [&str; 2] = ["not", "no"];

/// Lowercase, drop commas, split on whitespace; any negation word
/// predicts No.
pub fn yes_no(response: &str) -> YesNo {
    let cleaned = response.to_lowercase().replace(',', "");
    if cleaned.split_whitespace().any(|w| NEGATIONS.contains(&w)) {
        YesNo::No
    } else {
        YesNo::Yes
    }
}
