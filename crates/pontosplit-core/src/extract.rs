//! Employee name extraction
//!
//! Timesheet pages pack the employee name between a numeric registration code
//! and the next field label, with no delimiter of its own. Each rule anchors on
//! the label before the name and on the set of labels that may follow it, and
//! captures the shortest run of letters in between.
//!
//! Rules are tried in a fixed order. Narrow rules come first so that a generic
//! `EMPREGADO:` rule cannot swallow text that a `LOCALIZAÇÃO:` rule would have
//! bounded correctly.

use lazy_static::lazy_static;
use regex::Regex;

use crate::normalize::collapse_upper;

/// A single extraction rule: one pattern with exactly one capture group
pub struct NameRule {
    pub description: &'static str,
    pub pattern: Regex,
}

impl NameRule {
    fn new(description: &'static str, pattern: &str) -> Self {
        Self {
            description,
            pattern: Regex::new(pattern).unwrap(),
        }
    }

    /// Captured name, trimmed, if the rule matches anywhere in `text`
    pub fn capture(&self, text: &str) -> Option<String> {
        self.pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
    }
}

lazy_static! {
    /// Rules for the classic timesheet layout, tried against normalized text
    static ref PRIMARY_RULES: Vec<NameRule> = vec![
        NameRule::new(
            "LOCALIZAÇÃO label, code, name bounded by id/CTPS/category/schedule",
            r"LOCALIZAÇÃO:\s*\d+\s+([A-ZÀ-Ý ]{5,}?)\s+(?:\d{5,}|CTPS:|MENSALISTA|CATEGORIA:|HORÁRIOS:)",
        ),
        NameRule::new(
            "EMPREGADO label, code, name bounded by role/location/CTPS/category",
            r"EMPREGADO:\s*\d+\s+([A-ZÀ-Ý ]{5,}?)\s+(?:CARGO:|LOCALIZAÇÃO:|CTPS:|CATEGORIA:)",
        ),
        NameRule::new(
            "EMPREGADO label followed by letters",
            r"EMPREGADO:\s*([A-ZÀ-Ý ]{5,})",
        ),
    ];

    /// Rules for the blank-template layout, where the name follows CADASTRO
    static ref SECONDARY_RULES: Vec<NameRule> = vec![
        NameRule::new(
            "CADASTRO label, code, name bounded by CNPJ",
            r"CADASTRO:\s*\d+\s+([A-ZÀ-Ý ]{5,}?)\s+CNPJ",
        ),
    ];
}

/// Primary rules in evaluation order
pub fn primary_rules() -> &'static [NameRule] {
    &PRIMARY_RULES
}

/// Secondary rules in evaluation order
pub fn secondary_rules() -> &'static [NameRule] {
    &SECONDARY_RULES
}

fn first_capture(rules: &[NameRule], text: &str) -> Option<String> {
    rules.iter().find_map(|rule| rule.capture(text))
}

/// Locate a candidate employee name.
///
/// Search order:
/// 1. primary rules against `normalized`
/// 2. secondary rules against `normalized`
/// 3. secondary rules against `raw`, whitespace-collapsed and upper-cased
///
/// `None` is an ordinary outcome, not a failure.
pub fn extract_name(normalized: &str, raw: Option<&str>) -> Option<String> {
    if let Some(name) = first_capture(&PRIMARY_RULES, normalized) {
        return Some(name);
    }

    if let Some(name) = first_capture(&SECONDARY_RULES, normalized) {
        return Some(name);
    }

    let raw = raw.filter(|r| !r.trim().is_empty())?;
    first_capture(&SECONDARY_RULES, &collapse_upper(raw))
}
