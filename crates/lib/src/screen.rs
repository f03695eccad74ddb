//! Submission screening: ordered rule checks with per-reason feedback.
//!
//! Check order is part of the contract: empty text, spam patterns, blocked
//! keywords, minimum length, then topic keywords. A message failing several
//! rules is reported with the first failing reason.

use crate::config::FilterConfig;
use regex::Regex;

/// Topic vocabulary used when no include keywords are configured.
const DEFAULT_TOPIC_KEYWORDS: &[&str] = &[
    "apartment", "flat", "rent", "renting", "rental",
    "room", "studio", "bedroom", "sublet", "lease",
    "housing", "accommodation", "vuokra", "asunto",
    "1bdrm", "2bdrm", "3bdrm", "квартира", "комната", "аренда",
];

/// Spam and scam indicators, checked before any other content rule.
const BLOCKED_PATTERNS: &[&str] = &[
    r"bit\.ly", r"tinyurl", r"click here",
    r"earn money", r"make money fast", r"crypto",
    r"investment opportunity", r"guaranteed returns",
];

/// Minimum length applied when the config leaves minMessageLength at 0.
const DEFAULT_MIN_LENGTH: usize = 20;

/// Why a submission was rejected (or `Ok` when it passed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenReason {
    Empty,
    SpamPattern,
    BlockedKeyword,
    TooShort,
    OffTopic,
    Ok,
}

impl ScreenReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ScreenReason::Empty => "empty",
            ScreenReason::SpamPattern => "spam_pattern",
            ScreenReason::BlockedKeyword => "blocked_keyword",
            ScreenReason::TooShort => "too_short",
            ScreenReason::OffTopic => "off_topic",
            ScreenReason::Ok => "ok",
        }
    }
}

/// Outcome of screening one submission.
#[derive(Debug, Clone)]
pub struct ScreenDecision {
    pub accepted: bool,
    pub reason: ScreenReason,
    /// User-facing explanation, distinct per reason.
    pub message: String,
}

impl ScreenDecision {
    fn reject(reason: ScreenReason, message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason,
            message: message.into(),
        }
    }
}

/// Screens user submissions against spam patterns, keyword rules, and length.
pub struct Screener {
    blocked_patterns: Vec<Regex>,
    exclude_keywords: Vec<String>,
    topic_keywords: Vec<String>,
    min_length: usize,
}

impl Screener {
    /// Build a screener from filter config. Configured include keywords replace
    /// the built-in topic vocabulary; a zero minimum length falls back to 20.
    pub fn new(rules: &FilterConfig) -> Self {
        let blocked_patterns = BLOCKED_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(&format!("(?i){}", p)).ok())
            .collect();
        let topic_keywords = if rules.include_keywords.is_empty() {
            DEFAULT_TOPIC_KEYWORDS.iter().map(|s| s.to_string()).collect()
        } else {
            rules.include_keywords.clone()
        };
        let min_length = if rules.min_message_length == 0 {
            DEFAULT_MIN_LENGTH
        } else {
            rules.min_message_length
        };
        Self {
            blocked_patterns,
            exclude_keywords: rules.exclude_keywords.clone(),
            topic_keywords,
            min_length,
        }
    }

    /// Screen a submission, returning the first failing rule or an accept.
    pub fn screen(&self, text: &str) -> ScreenDecision {
        if text.trim().is_empty() {
            return ScreenDecision::reject(
                ScreenReason::Empty,
                "Your message is empty. Please include details about the listing.",
            );
        }

        if self.blocked_patterns.iter().any(|p| p.is_match(text)) {
            return ScreenDecision::reject(
                ScreenReason::SpamPattern,
                "Your message contains suspicious content and cannot be posted.",
            );
        }

        let text_lower = text.to_lowercase();

        if self
            .exclude_keywords
            .iter()
            .any(|kw| text_lower.contains(&kw.to_lowercase()))
        {
            return ScreenDecision::reject(
                ScreenReason::BlockedKeyword,
                "Your message contains blocked content and cannot be posted.",
            );
        }

        if text.chars().count() < self.min_length {
            return ScreenDecision::reject(
                ScreenReason::TooShort,
                format!(
                    "Your message is too short. Please include more details (minimum {} characters).",
                    self.min_length
                ),
            );
        }

        if !self
            .topic_keywords
            .iter()
            .any(|kw| text_lower.contains(&kw.to_lowercase()))
        {
            return ScreenDecision::reject(
                ScreenReason::OffTopic,
                "Your message doesn't appear to be about rentals or apartments. \
                 Please include the property type (apartment, flat, room, studio), \
                 terms (rent, lease, sublet), and details like price, location, and bedrooms.",
            );
        }

        ScreenDecision {
            accepted: true,
            reason: ScreenReason::Ok,
            message: "Your message has been approved.".to_string(),
        }
    }
}
