//! Free-text card fields into typed values. `None` always means "could not parse".

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:(\d+)h)?\s*(?:(\d+)m)?").unwrap());
static VOTES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d[\d,]*(?:\.\d+)?)\s*([KkMmBb])?").unwrap());
static RANK_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.\s*").unwrap());
static DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+\.?\d*|\.\d+)$").unwrap());

pub const MAX_RATING: f64 = 10.0;

/// How a magnitude suffix on a vote count is resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuffixRule {
    /// Multiply the parsed decimal: "1.2M" is 1_200_000.
    #[default]
    Scaled,
    /// Replace the letter with zeros, then strip non-digits: "1.2M" is 12_000_000.
    /// Matches data produced by earlier runs.
    Legacy,
}

/// "2h 15m" -> 135. A zero total is reported as absent.
pub fn normalize_duration(text: &str) -> Option<u32> {
    let caps = DURATION_RE.captures(text.trim())?;
    let part = |i: usize| -> Option<u32> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };
    let total = part(1)?.checked_mul(60)?.checked_add(part(2)?)?;
    (total > 0).then_some(total)
}

pub fn normalize_votes(text: &str, rule: SuffixRule) -> Option<u64> {
    match rule {
        SuffixRule::Scaled => scaled_votes(text),
        SuffixRule::Legacy => legacy_votes(text),
    }
}

fn scaled_votes(text: &str) -> Option<u64> {
    let caps = VOTES_RE.captures(text)?;
    let number: f64 = caps[1].replace(',', "").parse().ok()?;
    let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_uppercase()) {
        Some(s) if s == "K" => 1e3,
        Some(s) if s == "M" => 1e6,
        Some(s) if s == "B" => 1e9,
        _ => 1.0,
    };
    let votes = (number * multiplier).round();
    (votes.is_finite() && votes >= 1.0 && votes < u64::MAX as f64).then(|| votes as u64)
}

fn legacy_votes(text: &str) -> Option<u64> {
    let digits: String = text
        .replace('K', "000")
        .replace('M', "000000")
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse::<u64>().ok().filter(|&v| v > 0)
}

/// Strip a leading "12. " ranking prefix.
pub fn normalize_title(text: &str) -> String {
    RANK_PREFIX_RE.replace(text.trim(), "").trim().to_string()
}

/// Plain decimal in (0, 10].
pub fn normalize_rating(text: &str) -> Option<f64> {
    let text = text.trim();
    if !DECIMAL_RE.is_match(text) {
        return None;
    }
    text.parse::<f64>()
        .ok()
        .filter(|r| *r > 0.0 && *r <= MAX_RATING)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_forms() {
        assert_eq!(normalize_duration("2h 15m"), Some(135));
        assert_eq!(normalize_duration("2h15m"), Some(135));
        assert_eq!(normalize_duration("45m"), Some(45));
        assert_eq!(normalize_duration("3h"), Some(180));
        assert_eq!(normalize_duration(" 1h 5m "), Some(65));
    }

    #[test]
    fn duration_zero_or_garbage_is_absent() {
        assert_eq!(normalize_duration(""), None);
        assert_eq!(normalize_duration("0h 0m"), None);
        assert_eq!(normalize_duration("0m"), None);
        assert_eq!(normalize_duration("PG-13"), None);
        assert_eq!(normalize_duration("99999999999h"), None);
    }

    #[test]
    fn votes_scaled() {
        assert_eq!(normalize_votes("12K", SuffixRule::Scaled), Some(12_000));
        assert_eq!(normalize_votes("1.2M", SuffixRule::Scaled), Some(1_200_000));
        assert_eq!(normalize_votes("12.5K", SuffixRule::Scaled), Some(12_500));
        assert_eq!(normalize_votes(" (345K)", SuffixRule::Scaled), Some(345_000));
        assert_eq!(normalize_votes("1,234", SuffixRule::Scaled), Some(1_234));
        assert_eq!(normalize_votes("987", SuffixRule::Scaled), Some(987));
    }

    #[test]
    fn votes_legacy_inflates_fractions() {
        assert_eq!(normalize_votes("12K", SuffixRule::Legacy), Some(12_000));
        assert_eq!(normalize_votes("1.2M", SuffixRule::Legacy), Some(12_000_000));
        assert_eq!(normalize_votes("(2.5K)", SuffixRule::Legacy), Some(25_000));
    }

    #[test]
    fn votes_absent() {
        for rule in [SuffixRule::Scaled, SuffixRule::Legacy] {
            assert_eq!(normalize_votes("abc", rule), None);
            assert_eq!(normalize_votes("0", rule), None);
            assert_eq!(normalize_votes("", rule), None);
        }
        assert_eq!(normalize_votes("0.0004K", SuffixRule::Scaled), None);
    }

    #[test]
    fn title_prefix() {
        assert_eq!(normalize_title("12. Dune: Part Two"), "Dune: Part Two");
        assert_eq!(normalize_title("1.Civil War"), "Civil War");
        assert_eq!(normalize_title("Oppenheimer"), "Oppenheimer");
        assert_eq!(normalize_title("2001: A Space Odyssey"), "2001: A Space Odyssey");
    }

    #[test]
    fn rating_bounds() {
        assert_eq!(normalize_rating("8.6"), Some(8.6));
        assert_eq!(normalize_rating("10"), Some(10.0));
        assert_eq!(normalize_rating("7."), Some(7.0));
        assert_eq!(normalize_rating("0"), None);
        assert_eq!(normalize_rating("0.0"), None);
        assert_eq!(normalize_rating("n/a"), None);
        assert_eq!(normalize_rating("-3"), None);
        assert_eq!(normalize_rating("10.1"), None);
        assert_eq!(normalize_rating("1e1"), None);
    }
}
