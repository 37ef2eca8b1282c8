//! Rule-based auto-categorization scoring.

use regex::RegexBuilder;

use crate::CategoryRules;

const KEYWORD_POINTS: u32 = 10;
const MERCHANT_PATTERN_POINTS: u32 = 15;
const AMOUNT_RANGE_POINTS: u32 = 5;

/// Scores a transaction against one category's rules.
///
/// - every keyword found (case-insensitive) in `"<merchant> <description>"`
///   adds 10;
/// - every merchant pattern matching `merchant_name` adds 15. Patterns are
///   case-insensitive regexes; an invalid regex is matched as a plain
///   substring instead;
/// - an amount inside any configured range adds a flat 5.
///
/// A score of zero means the category is not a candidate.
pub fn score(
    rules: &CategoryRules,
    merchant_name: Option<&str>,
    description: Option<&str>,
    amount: Option<f64>,
) -> u32 {
    let merchant = merchant_name.unwrap_or_default();
    let haystack = format!("{merchant} {}", description.unwrap_or_default()).to_lowercase();

    let keyword_hits = rules
        .keywords
        .iter()
        .map(|keyword| keyword.trim().to_lowercase())
        .filter(|keyword| !keyword.is_empty() && haystack.contains(keyword.as_str()))
        .count() as u32;

    let pattern_hits = if merchant.is_empty() {
        0
    } else {
        rules
            .merchant_patterns
            .iter()
            .filter(|pattern| merchant_matches(pattern, merchant))
            .count() as u32
    };

    let in_range = amount.is_some_and(|amount| {
        rules
            .amount_ranges
            .iter()
            .any(|range| range.contains(amount))
    });

    keyword_hits * KEYWORD_POINTS
        + pattern_hits * MERCHANT_PATTERN_POINTS
        + if in_range { AMOUNT_RANGE_POINTS } else { 0 }
}

fn merchant_matches(pattern: &str, merchant: &str) -> bool {
    if pattern.trim().is_empty() {
        return false;
    }
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(re) => re.is_match(merchant),
        Err(_) => merchant.to_lowercase().contains(&pattern.to_lowercase()),
    }
}
