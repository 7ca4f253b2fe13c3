//! Tone and keyword heuristics shown next to a memory.
//!
//! Single pass over the plain text: markup is stripped, tone counts which
//! marker words occur at all, keywords are the most frequent tokens.

use serde::{Deserialize, Serialize};
use std::fmt;

const POSITIVE_WORDS: &[&str] = &[
    "温暖", "开心", "欣慰", "轻松", "感动", "愉快", "惊喜", "满足", "亲密",
];
const NEGATIVE_WORDS: &[&str] = &["担心", "焦虑", "疲惫", "遗憾", "失落", "难过", "沮丧"];
const TOKEN_SEPARATORS: &[char] = &[',', '.', ';', '!', '?', '，', '。', '！', '？'];

pub const KEYWORD_LIMIT: usize = 5;
pub const EMPTY_SUMMARY: &str = "尚未撰写详细内容";
const SUMMARY_MAX_CHARS: usize = 100;
const SUMMARY_CUT_CHARS: usize = 96;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Positive,
    Neutral,
    Negative,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "positive" => Some(Self::Positive),
            "neutral" => Some(Self::Neutral),
            "negative" => Some(Self::Negative),
            _ => None,
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryInsights {
    pub summary: String,
    pub tone: Tone,
    pub keywords: Vec<String>,
}

/// Insights for a memory body that may contain HTML.
pub fn insights_for(body: &str) -> MemoryInsights {
    let plain = plain_text(body);
    MemoryInsights {
        summary: summarize(&plain),
        tone: analyze_tone(&plain),
        keywords: generate_keywords(&plain),
    }
}

/// Replaces every `<...>` tag with a space and collapses whitespace.
pub fn plain_text(body: &str) -> String {
    strip_markup(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn analyze_tone(text: &str) -> Tone {
    let lower = text.to_lowercase();
    let score = |words: &[&str]| words.iter().filter(|word| lower.contains(*word)).count();
    let positive = score(POSITIVE_WORDS);
    let negative = score(NEGATIVE_WORDS);

    match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => Tone::Positive,
        std::cmp::Ordering::Less => Tone::Negative,
        std::cmp::Ordering::Equal => Tone::Neutral,
    }
}

/// Up to [`KEYWORD_LIMIT`] lowercase tokens of 2 to 8 characters, most
/// frequent first. Ties keep first-seen order.
pub fn generate_keywords(text: &str) -> Vec<String> {
    let stripped = strip_markup(text);
    let mut counts: Vec<(String, usize)> = Vec::new();

    for token in stripped.split(|ch: char| ch.is_whitespace() || TOKEN_SEPARATORS.contains(&ch)) {
        let length = token.chars().count();
        if !(2..=8).contains(&length) {
            continue;
        }
        let key = token.to_lowercase();
        match counts.iter_mut().find(|(word, _)| *word == key) {
            Some((_, count)) => *count += 1,
            None => counts.push((key, 1)),
        }
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(KEYWORD_LIMIT)
        .map(|(word, _)| word)
        .collect()
}

pub fn summarize(text: &str) -> String {
    let plain = plain_text(text);
    if plain.is_empty() {
        return EMPTY_SUMMARY.to_string();
    }
    if plain.chars().count() <= SUMMARY_MAX_CHARS {
        return plain;
    }
    let cut: String = plain.chars().take(SUMMARY_CUT_CHARS).collect();
    format!("{cut}...")
}

fn strip_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('<') {
        let Some(close) = rest[open..].find('>') else {
            break;
        };
        out.push_str(&rest[..open]);
        out.push(' ');
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    out
}
