//! Tier limits and input validation.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Longest chat message accepted, in characters, regardless of tier.
pub const MAX_CHAT_LENGTH: usize = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Initiate,
    Scholar,
    Admin,
}

impl Tier {
    /// Parses a tier label case-insensitively. Unknown labels get the lowest tier.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "scholar" => Tier::Scholar,
            "admin" => Tier::Admin,
            _ => Tier::Initiate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierLimits {
    pub max_content_length: usize,
    pub daily_uploads: u32,
    pub daily_chats: u32,
    pub label: String,
}

pub fn limits_for(tier: Tier) -> TierLimits {
    let (max_content_length, daily_uploads, daily_chats, label) = match tier {
        Tier::Initiate => (50_000, 50, 100, "Initiate"),
        Tier::Scholar => (200_000, 200, 500, "Scholar"),
        Tier::Admin => (1_000_000, 10_000, 10_000, "Admin"),
    };
    TierLimits {
        max_content_length,
        daily_uploads,
        daily_chats,
        label: label.to_string(),
    }
}

/// What a piece of user input is about to be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputContext {
    Content,
    Chat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Validation {
    fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    fn reject(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(reason.into()),
        }
    }
}

fn injection_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)<\s*script\b|javascript\s*:|<\s*iframe\b|\bon[a-z]+\s*=\s*['\x22]|<[^>]*[\s/]on[a-z]+\s*=|\beval\s*\(|data\s*:\s*text/html",
        )
        .unwrap_or_else(|_| unreachable!("injection pattern is a valid literal"))
    })
}

pub fn validate_input(text: &str, context: InputContext, tier: Tier) -> Validation {
    if text.trim().is_empty() {
        return Validation::reject("Input cannot be empty.");
    }

    let length = text.chars().count();
    match context {
        InputContext::Content => {
            let limits = limits_for(tier);
            if length > limits.max_content_length {
                return Validation::reject(format!(
                    "Content is too long ({} characters). The {} tier allows up to {} characters.",
                    length, limits.label, limits.max_content_length
                ));
            }
        }
        InputContext::Chat => {
            if length > MAX_CHAT_LENGTH {
                return Validation::reject(format!(
                    "Message is too long ({} characters). Messages are limited to {} characters.",
                    length, MAX_CHAT_LENGTH
                ));
            }
        }
    }

    if injection_pattern().is_match(text) {
        return Validation::reject("Input contains disallowed markup or script.");
    }
    Validation::ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_grow_with_tier() {
        let initiate = limits_for(Tier::Initiate);
        let scholar = limits_for(Tier::Scholar);
        let admin = limits_for(Tier::Admin);
        assert_eq!(initiate.daily_uploads, 50);
        assert!(initiate.max_content_length < scholar.max_content_length);
        assert!(scholar.daily_chats < admin.daily_chats);
        assert_eq!(admin.label, "Admin");
    }

    #[test]
    fn tier_labels_parse_loosely() {
        assert_eq!(Tier::parse("Scholar"), Tier::Scholar);
        assert_eq!(Tier::parse(" ADMIN "), Tier::Admin);
        assert_eq!(Tier::parse("platinum"), Tier::Initiate);
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        let result = validate_input("  \n", InputContext::Chat, Tier::Admin);
        assert!(!result.valid);
        assert!(result.error.is_some());
    }

    #[test]
    fn content_length_depends_on_tier() {
        let text = "a".repeat(60_000);
        let initiate = validate_input(&text, InputContext::Content, Tier::Initiate);
        assert!(!initiate.valid);
        assert!(initiate.error.unwrap().contains("Initiate"));
        assert!(validate_input(&text, InputContext::Content, Tier::Scholar).valid);
    }

    #[test]
    fn chat_has_fixed_ceiling() {
        let text = "é".repeat(MAX_CHAT_LENGTH);
        assert!(validate_input(&text, InputContext::Chat, Tier::Initiate).valid);
        let longer = format!("{text}!");
        assert!(!validate_input(&longer, InputContext::Chat, Tier::Admin).valid);
    }

    #[test]
    fn rejects_script_injection() {
        for text in [
            "<script>alert(1)</script>",
            "click <a href=\"JavaScript:void(0)\">here</a>",
            "<img src=x onerror='steal()'>",
            "< iframe src=evil>",
            "eval (payload)",
            "<img src=x onerror=alert(1)>",
            "<body onload=steal()>",
            "<svg/onload=alert(1)>",
        ] {
            let result = validate_input(text, InputContext::Content, Tier::Initiate);
            assert!(!result.valid, "{text} should be rejected");
        }
    }

    #[test]
    fn ordinary_prose_passes() {
        let text = "The mitochondria is the powerhouse of the cell. Evaluate one option = two.";
        assert!(validate_input(text, InputContext::Content, Tier::Initiate).valid);
    }
}
