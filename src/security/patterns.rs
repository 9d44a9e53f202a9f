//! Named pattern policies for the security filter.
//!
//! A policy is data: an ordered list of case-insensitive regular expressions.
//! Matching is approximate by nature and produces both false positives and
//! false negatives, so policies are swappable through configuration.

use regex::{Regex, RegexBuilder};

/// Rules of the built-in `prompt-injection` policy, as `(name, pattern)`.
const PROMPT_INJECTION_RULES: &[(&str, &str)] = &[
    ("ignore-previous-instructions", r"ignore\s+previous\s+instructions"),
    ("forget-everything", r"forget\s+everything"),
    ("system-assignment", r#"system\s*[:=]\s*["'].*["']"#),
    ("role-assignment", r#"role\s*[:=]\s*["'].*["']"#),
    ("script-tag", r"<script[^>]*>"),
    ("javascript-uri", r"javascript:"),
    ("html-data-uri", r"data:text/html"),
    ("eval-call", r"eval\s*\("),
    ("prompt-injection", r"prompt\s*injection"),
    ("jailbreak", r"jailbreak"),
    ("remote-fetch", r"(curl|wget|fetch)\s+http"),
    ("base64", r"base64"),
    ("template-injection", r"\$\{.*\}"),
];

/// One compiled rule.
#[derive(Debug, Clone)]
pub struct PatternRule {
    name: String,
    regex: Regex,
}

impl PatternRule {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// An ordered, named set of suspicious-content rules.
#[derive(Debug, Clone)]
pub struct PatternPolicy {
    name: String,
    rules: Vec<PatternRule>,
}

impl PatternPolicy {
    /// Known prompt-injection phrasings, markup and script injection, shell
    /// fetches and template-injection syntax.
    pub fn prompt_injection() -> Self {
        let rules = PROMPT_INJECTION_RULES
            .iter()
            .map(|(name, pattern)| {
                compile(name, pattern).expect("built-in prompt-injection rules are valid regexes")
            })
            .collect();
        Self {
            name: "prompt-injection".to_string(),
            rules,
        }
    }

    /// Build a policy from raw patterns. Rules are named by their position.
    pub fn from_patterns<S: AsRef<str>>(name: &str, patterns: &[S]) -> Result<Self, regex::Error> {
        let rules = patterns
            .iter()
            .enumerate()
            .map(|(i, pattern)| compile(&format!("{name}-{i}"), pattern.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: name.to_string(),
            rules,
        })
    }

    /// Name of the first rule matching `text`, if any.
    pub fn first_match(&self, text: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.is_match(text))
            .map(PatternRule::name)
    }

    pub fn is_suspicious(&self, text: &str) -> bool {
        self.first_match(text).is_some()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }
}

impl Default for PatternPolicy {
    fn default() -> Self {
        Self::prompt_injection()
    }
}

fn compile(name: &str, pattern: &str) -> Result<PatternRule, regex::Error> {
    let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
    Ok(PatternRule {
        name: name.to_string(),
        regex,
    })
}
