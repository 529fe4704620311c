//! Consent classification
//!
//! Word-level lexical check of the respondent's reply to the disclosure.
//! Replies carrying both kinds of word, or neither, are ambiguous and are
//! resolved by the configured `ConsentPolicy`.

use interview_agent_config::ConsentPolicy;

const AFFIRMATIVE_WORDS: &[&str] = &[
    "yes", "yeah", "yep", "sure", "okay", "ok", "agree", "consent", "fine", "absolutely",
];

const NEGATIVE_WORDS: &[&str] = &["no", "nope", "don't", "dont", "disagree", "refuse", "decline", "not"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentDecision {
    Affirmative,
    Negative,
    Ambiguous,
}

impl ConsentDecision {
    /// Final yes/no once the ambiguity policy is applied
    pub fn resolve(self, policy: ConsentPolicy) -> bool {
        match self {
            ConsentDecision::Affirmative => true,
            ConsentDecision::Negative => false,
            ConsentDecision::Ambiguous => matches!(policy, ConsentPolicy::Affirmative),
        }
    }
}

pub fn classify_consent(reply: &str) -> ConsentDecision {
    let lowered = reply.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .collect();

    let affirmative = words.iter().any(|w| AFFIRMATIVE_WORDS.contains(w));
    let negative = words.iter().any(|w| NEGATIVE_WORDS.contains(w));

    match (affirmative, negative) {
        (true, false) => ConsentDecision::Affirmative,
        (false, true) => ConsentDecision::Negative,
        _ => ConsentDecision::Ambiguous,
    }
}
