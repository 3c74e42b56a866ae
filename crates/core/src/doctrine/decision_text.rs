//! Decision sentence checks and the deterministic rewrite.
//!
//! A compliant decision starts with an approved imperative verb (after an
//! optional "Within N days:" lead) and carries an explicit time-box.

use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

pub const APPROVED_VERBS: &[&str] = &[
    "add", "ask", "assign", "book", "bundle", "call", "cap", "check", "collect", "confirm",
    "cut", "drop", "email", "follow", "limit", "list", "lock", "move", "offer", "pause", "pick",
    "price", "prioritize", "quote", "raise", "remove", "reprice", "request", "require",
    "review", "run", "schedule", "send", "set", "shift", "start", "stop", "test", "text",
    "tighten", "update",
];

const FILLER_PREFIXES: &[&str] = &[
    "we should",
    "you should",
    "we need to",
    "need to",
    "make sure to",
    "i recommend",
    "we will",
    "please",
    "let's",
    "lets",
    "try to",
    "consider",
    "investigate",
    "look into",
    "maybe",
];

const FOLLOW_UP_FORMS: &[&str] = &["follow-ups", "follow ups", "followups", "follow-up", "follow up"];

const DEFAULT_VERB: &str = "Update";
const DEFAULT_ACTION: &str = "the open quotes older than 7 days";
const FOLLOW_UP_ACTION: &str = "on open quotes older than 7 days";
const TIMEBOX_LEAD: &str = "Within 7 days:";

const WITHIN_LEAD_PATTERN: &str = r"(?i)^\s*within\s+\d+\s*(minute|hour|day|week|month)s?\s*:?\s*";
const TIMEBOX_PATTERN: &str =
    r"(?i)\b(within|for the next|today|by end of day|this week|next)\b|\b\d+\s*(minute|hour|day|week)s?\b";
const LEADING_TIMEBOX_PATTERN: &str = r"(?i)^\s*(within\s+\d+\s*(minute|hour|day|week|month)s?|for the next\s+\d+\s*(minute|hour|day|week|month)s?|today|this week|next week|by end of day)\s*[:,]?\s*";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchReason {
    Verb,
    Timebox,
    Both,
}

impl PatchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verb => "verb",
            Self::Timebox => "timebox",
            Self::Both => "both",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionPatch {
    pub text: String,
    pub patched: bool,
    pub reason: Option<PatchReason>,
}

pub fn starts_with_approved_verb(decision: &str) -> bool {
    let remainder = match within_lead() {
        Some(pattern) => pattern.replace(decision, "").into_owned(),
        None => decision.to_string(),
    };
    first_word(&remainder).is_some_and(|word| is_approved_verb(&word))
}

pub fn is_time_boxed(decision: &str) -> bool {
    timebox().is_some_and(|pattern| pattern.is_match(decision))
}

/// Rewrites a decision into `Within 7 days: {Verb} {action}.`
pub fn normalize_decision_text(decision: &str) -> String {
    let mut remainder = clean(decision);
    loop {
        let stripped = strip_filler(strip_leading_timebox(&remainder));
        if stripped == remainder {
            break;
        }
        remainder = stripped;
    }

    let (verb, action) = split_verb_and_action(&remainder);
    let action = trim_trailing_punctuation(&action);
    let action = if action.is_empty() { DEFAULT_ACTION } else { action };
    format!("{TIMEBOX_LEAD} {verb} {action}.")
}

/// Leaves compliant text untouched; otherwise rewrites it and records which
/// predicate failed.
pub fn patch_decision_if_needed(decision: &str) -> DecisionPatch {
    let reason = match (starts_with_approved_verb(decision), is_time_boxed(decision)) {
        (true, true) => None,
        (false, true) => Some(PatchReason::Verb),
        (true, false) => Some(PatchReason::Timebox),
        (false, false) => Some(PatchReason::Both),
    };

    match reason {
        None => DecisionPatch { text: decision.to_string(), patched: false, reason: None },
        Some(reason) => DecisionPatch {
            text: normalize_decision_text(decision),
            patched: true,
            reason: Some(reason),
        },
    }
}

fn is_approved_verb(word: &str) -> bool {
    APPROVED_VERBS.contains(&word)
}

/// Lower-cased leading alphanumeric run of the first token.
fn first_word(text: &str) -> Option<String> {
    let token = text.split_whitespace().next()?;
    let word = token
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .chars()
        .take_while(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    (!word.is_empty()).then_some(word)
}

fn clean(decision: &str) -> String {
    let unified = decision
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");
    let collapsed = unified.split_whitespace().collect::<Vec<_>>().join(" ");
    let unquoted = collapsed.trim_matches(|c: char| c == '"' || c == '\'' || c == '`');
    trim_trailing_punctuation(unquoted).to_string()
}

fn trim_trailing_punctuation(text: &str) -> &str {
    text.trim().trim_end_matches(['.', '!', '?', ';', ',', ':']).trim_end()
}

fn strip_leading_timebox(text: &str) -> String {
    match leading_timebox() {
        Some(pattern) => pattern.replace(text, "").trim().to_string(),
        None => text.trim().to_string(),
    }
}

fn strip_filler(text: String) -> String {
    for filler in FILLER_PREFIXES {
        let Some(head) = text.get(..filler.len()) else {
            continue;
        };
        let boundary = text[filler.len()..].chars().next().map_or(true, |c| !c.is_alphanumeric());
        if head.eq_ignore_ascii_case(filler) && boundary {
            return text[filler.len()..]
                .trim_start_matches(|c: char| c.is_whitespace() || c == ',' || c == ':')
                .to_string();
        }
    }
    text
}

fn split_verb_and_action(remainder: &str) -> (String, String) {
    let lowered = remainder.to_lowercase();
    for form in FOLLOW_UP_FORMS {
        if let Some(rest) = lowered.strip_prefix(form) {
            if rest.chars().next().map_or(true, |c| !c.is_alphanumeric()) {
                let object = remainder.get(form.len()..).unwrap_or_default().trim();
                let action = if trim_trailing_punctuation(object).is_empty() {
                    FOLLOW_UP_ACTION.to_string()
                } else if object.to_lowercase().starts_with("on ")
                    || object.to_lowercase().starts_with("with ")
                {
                    object.to_string()
                } else {
                    format!("on {object}")
                };
                return ("Follow".to_string(), format!("up {action}"));
            }
        }
    }

    match first_word(remainder) {
        Some(word) if is_approved_verb(&word) => {
            let (token, rest) = remainder.split_once(char::is_whitespace).unwrap_or((remainder, ""));
            let token = token
                .trim_start_matches(|c: char| !c.is_alphanumeric())
                .trim_end_matches(['.', '!', '?', ';', ',', ':']);
            // Hyphenated verbs such as "check-in" keep their full token.
            let verb = if token.chars().count() > word.chars().count() {
                capitalize(token)
            } else {
                capitalize(&word)
            };
            (verb, rest.trim().to_string())
        }
        _ => (DEFAULT_VERB.to_string(), remainder.to_string()),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn within_lead() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(WITHIN_LEAD_PATTERN).ok()).as_ref()
}

fn timebox() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(TIMEBOX_PATTERN).ok()).as_ref()
}

fn leading_timebox() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(LEADING_TIMEBOX_PATTERN).ok()).as_ref()
}
