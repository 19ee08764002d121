//! Per-field comparison rules
//!
//! A [`FieldRegistry`] maps canonical field names to a label and a
//! [`Comparator`]. Scorers walk the registry instead of branching on field
//! names, so new field types only need a registry entry.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::script::ScriptNormalizer;
use crate::similarity::{jaro_winkler, text_similarity, to_percent};
use crate::types::{fields::*, FieldValue, Identifier};

/// Full match score
const FULL: u8 = 100;
/// Birth date score when year and month agree
const DATE_YEAR_MONTH: u8 = 80;
/// Birth date score when only the year agrees
const DATE_YEAR: u8 = 50;

/// Comparison rule for one field type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    /// Edit-distance similarity over normalized text
    Fuzzy,
    /// 100/0 on normalized equality
    Exact,
    /// 100/0 on equality of the digit sequences
    Digits,
    /// 100 when any identifier agrees on type and value
    Identifiers,
    /// Tiered year/month/day comparison
    Date,
}

/// Shared inputs for a comparison
#[derive(Debug, Clone, Copy)]
pub struct CompareContext<'a> {
    pub normalizer: &'a ScriptNormalizer,
    pub fuzzy_matching: bool,
}

impl Comparator {
    /// Score two values (0 - 100). `None` when they cannot be compared.
    pub fn score(self, a: FieldValue<'_>, b: FieldValue<'_>, ctx: &CompareContext<'_>) -> Option<u8> {
        match (self, a, b) {
            (Comparator::Identifiers, FieldValue::Identifiers(a), FieldValue::Identifiers(b)) => {
                identifiers_score(a, b, ctx.normalizer)
            }
            (_, FieldValue::Text(a), FieldValue::Text(b)) => self.score_text(a, b, ctx),
            _ => None,
        }
    }

    fn score_text(self, a: &str, b: &str, ctx: &CompareContext<'_>) -> Option<u8> {
        match self {
            Comparator::Fuzzy => {
                let a = ctx.normalizer.normalize(a);
                let b = ctx.normalizer.normalize(b);
                if a.is_empty() || b.is_empty() {
                    return None;
                }
                Some(text_similarity(&a, &b, ctx.fuzzy_matching))
            }
            Comparator::Exact => exact_score(a, b, ctx.normalizer),
            Comparator::Digits => {
                let digits_a = digits(a);
                let digits_b = digits(b);
                if digits_a.is_empty() || digits_b.is_empty() {
                    return exact_score(a, b, ctx.normalizer);
                }
                Some(if digits_a == digits_b { FULL } else { 0 })
            }
            Comparator::Date => Some(date_score(a, b)),
            Comparator::Identifiers => None,
        }
    }

    /// Agreement decision for the probabilistic scorer, with the per-field
    /// similarity (0 - 100) that backs it.
    ///
    /// Fuzzy fields agree when Jaro-Winkler clears `threshold`; every other
    /// comparator agrees only on a full score.
    pub fn agreement(
        self,
        a: FieldValue<'_>,
        b: FieldValue<'_>,
        ctx: &CompareContext<'_>,
        threshold: f64,
    ) -> Option<(bool, u8)> {
        match (self, a, b) {
            (Comparator::Fuzzy, FieldValue::Text(a), FieldValue::Text(b)) => {
                let a = ctx.normalizer.normalize(a);
                let b = ctx.normalizer.normalize(b);
                if a.is_empty() || b.is_empty() {
                    return None;
                }
                let similarity = jaro_winkler(&a, &b);
                Some((similarity >= threshold, to_percent(similarity)))
            }
            _ => self.score(a, b, ctx).map(|score| (score == FULL, score)),
        }
    }
}

fn exact_score(a: &str, b: &str, normalizer: &ScriptNormalizer) -> Option<u8> {
    let a = normalizer.normalize(a);
    let b = normalizer.normalize(b);
    if a.is_empty() || b.is_empty() {
        return None;
    }
    Some(if a == b { FULL } else { 0 })
}

fn digits(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn identifier_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn identifiers_score(a: &[Identifier], b: &[Identifier], normalizer: &ScriptNormalizer) -> Option<u8> {
    let canonical = |ids: &[Identifier]| -> Vec<(String, String)> {
        ids.iter()
            .map(|id| (normalizer.normalize(&id.id_type), identifier_value(&id.value)))
            .filter(|(_, value)| !value.is_empty())
            .collect()
    };

    let left = canonical(a);
    let right = canonical(b);
    if left.is_empty() || right.is_empty() {
        return None;
    }

    let agrees = left.iter().any(|id| right.contains(id));
    Some(if agrees { FULL } else { 0 })
}

/// A full or partial calendar date (`YYYY`, `YYYY-MM` or `YYYY-MM-DD`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialDate {
    pub year: i32,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl PartialDate {
    /// Parse an ISO date, ignoring any time part. `None` when malformed.
    pub fn parse(raw: &str) -> Option<Self> {
        let date_part = raw.trim().split(|c: char| c == 'T' || c == ' ').next()?;
        let mut parts = date_part.split('-');

        let year_part = parts.next()?;
        if year_part.len() != 4 || !year_part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let year: i32 = year_part.parse().ok()?;

        let month = match parts.next() {
            Some(part) => {
                let month = parse_component(part)?;
                if !(1..=12).contains(&month) {
                    return None;
                }
                Some(month)
            }
            None => None,
        };

        let day = match (parts.next(), month) {
            (Some(part), Some(month)) => {
                let day = parse_component(part)?;
                NaiveDate::from_ymd_opt(year, month, day)?;
                Some(day)
            }
            (Some(_), None) => return None,
            (None, _) => None,
        };

        if parts.next().is_some() {
            return None;
        }

        Some(Self { year, month, day })
    }
}

fn parse_component(part: &str) -> Option<u32> {
    if part.is_empty() || part.len() > 2 || !part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// Tiered birth date score: 100 same date, 80 same year and month, 50 same
/// year, 0 otherwise. Malformed dates never match.
pub fn date_score(a: &str, b: &str) -> u8 {
    if a.trim() == b.trim() {
        return FULL;
    }

    let (Some(a), Some(b)) = (PartialDate::parse(a), PartialDate::parse(b)) else {
        return 0;
    };

    if a.year != b.year {
        return 0;
    }
    match (a.month, b.month) {
        (Some(month_a), Some(month_b)) if month_a == month_b => DATE_YEAR_MONTH,
        _ => DATE_YEAR,
    }
}

/// Independent year/month/day agreement. Components missing on either side
/// are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateAgreement {
    pub year: Option<bool>,
    pub month: Option<bool>,
    pub day: Option<bool>,
}

/// Compare two birth dates component by component. Years agree within
/// `year_tolerance`; a malformed date counts as a year disagreement.
pub fn date_agreement(a: &str, b: &str, year_tolerance: u32) -> DateAgreement {
    let (Some(a), Some(b)) = (PartialDate::parse(a), PartialDate::parse(b)) else {
        return DateAgreement {
            year: Some(false),
            ..Default::default()
        };
    };

    let both = |x: Option<u32>, y: Option<u32>| match (x, y) {
        (Some(x), Some(y)) => Some(x == y),
        _ => None,
    };

    DateAgreement {
        year: Some(a.year.abs_diff(b.year) <= year_tolerance),
        month: both(a.month, b.month),
        day: both(a.day, b.day),
    }
}

/// Label and comparator registered for a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Human readable label reported in `matched_on`
    pub label: String,
    pub comparator: Comparator,
}

/// Ordered strategy table from field name to comparison rule
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    rules: Vec<(String, FieldRule)>,
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl FieldRegistry {
    /// Registry without any field
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Registry covering the canonical record fields
    pub fn standard() -> Self {
        Self::empty()
            .register(FIRST_NAME, "First Name", Comparator::Fuzzy)
            .register(MIDDLE_NAME, "Middle Name", Comparator::Fuzzy)
            .register(LAST_NAME, "Last Name", Comparator::Fuzzy)
            .register(BIRTH_DATE, "Birth Date", Comparator::Date)
            .register(BIRTH_YEAR, "Birth Year", Comparator::Exact)
            .register(BIRTH_MONTH, "Birth Month", Comparator::Exact)
            .register(BIRTH_DAY, "Birth Day", Comparator::Exact)
            .register(GENDER, "Gender", Comparator::Exact)
            .register(VILLAGE, "Village", Comparator::Fuzzy)
            .register(SUB_VILLAGE, "Sub-Village", Comparator::Fuzzy)
            .register(PHONE, "Phone", Comparator::Digits)
            .register(HOUSEHOLD_HEAD, "Household Head", Comparator::Fuzzy)
            .register(COMMUNITY_LEADER, "Community Leader", Comparator::Fuzzy)
            .register(IDENTIFIERS, "Identifiers", Comparator::Identifiers)
            .register(HOUSE_NUMBER, "House Number", Comparator::Exact)
    }

    /// Add or replace the rule for a field
    pub fn register(
        mut self,
        name: impl Into<String>,
        label: impl Into<String>,
        comparator: Comparator,
    ) -> Self {
        let name = name.into();
        let rule = FieldRule {
            label: label.into(),
            comparator,
        };
        match self.rules.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => *existing = rule,
            None => self.rules.push((name, rule)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldRule> {
        self.rules
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, rule)| rule)
    }

    /// Label and comparator for a field. Unregistered fields are compared
    /// as fuzzy text and labelled with their name.
    pub fn describe<'a>(&'a self, name: &'a str) -> (&'a str, Comparator) {
        match self.get(name) {
            Some(rule) => (rule.label.as_str(), rule.comparator),
            None => (name, Comparator::Fuzzy),
        }
    }

    /// Entries of `keyed` in registry order, then the unregistered ones in
    /// key order
    pub fn visit_order<'k, V>(&self, keyed: &'k BTreeMap<String, V>) -> Vec<(&'k str, &'k V)> {
        let mut ordered: Vec<(&'k str, &'k V)> = self
            .rules
            .iter()
            .filter_map(|(name, _)| keyed.get_key_value(name.as_str()))
            .map(|(name, value)| (name.as_str(), value))
            .collect();

        ordered.extend(
            keyed
                .iter()
                .filter(|(name, _)| self.get(name).is_none())
                .map(|(name, value)| (name.as_str(), value)),
        );

        ordered
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{Language, LanguageConfig};

    fn ctx(normalizer: &ScriptNormalizer) -> CompareContext<'_> {
        CompareContext {
            normalizer,
            fuzzy_matching: true,
        }
    }

    #[test]
    fn test_fuzzy_comparator() {
        let normalizer = ScriptNormalizer::default();
        let ctx = ctx(&normalizer);

        let score = Comparator::Fuzzy.score(FieldValue::Text("John"), FieldValue::Text(" jon "), &ctx);
        assert_eq!(score, Some(75));
    }

    #[test]
    fn test_exact_comparator() {
        let normalizer = ScriptNormalizer::default();
        let ctx = ctx(&normalizer);

        assert_eq!(
            Comparator::Exact.score(FieldValue::Text("Male"), FieldValue::Text("MALE "), &ctx),
            Some(100)
        );
        assert_eq!(
            Comparator::Exact.score(FieldValue::Text("Male"), FieldValue::Text("Female"), &ctx),
            Some(0)
        );
    }

    #[test]
    fn test_digits_comparator() {
        let normalizer = ScriptNormalizer::default();
        let ctx = ctx(&normalizer);

        assert_eq!(
            Comparator::Digits.score(
                FieldValue::Text("+251 911-234-567"),
                FieldValue::Text("251911234567"),
                &ctx
            ),
            Some(100)
        );
        assert_eq!(
            Comparator::Digits.score(FieldValue::Text("0911"), FieldValue::Text("0912"), &ctx),
            Some(0)
        );
    }

    #[test]
    fn test_identifiers_comparator() {
        let normalizer = ScriptNormalizer::default();
        let ctx = ctx(&normalizer);
        let a = vec![
            Identifier::new("MRN", "a-100"),
            Identifier::new("national_id", "55"),
        ];
        let b = vec![Identifier::new("mrn", "A100")];
        let c = vec![Identifier::new("passport", "A100")];

        assert_eq!(
            Comparator::Identifiers.score(FieldValue::Identifiers(&a), FieldValue::Identifiers(&b), &ctx),
            Some(100)
        );
        assert_eq!(
            Comparator::Identifiers.score(FieldValue::Identifiers(&a), FieldValue::Identifiers(&c), &ctx),
            Some(0)
        );
    }

    #[test]
    fn test_mismatched_value_kinds_are_not_comparable() {
        let normalizer = ScriptNormalizer::default();
        let ctx = ctx(&normalizer);
        let ids = vec![Identifier::new("mrn", "1")];

        assert_eq!(
            Comparator::Identifiers.score(FieldValue::Text("1"), FieldValue::Identifiers(&ids), &ctx),
            None
        );
    }

    #[test]
    fn test_partial_date_parse() {
        assert_eq!(
            PartialDate::parse("1980-05-01"),
            Some(PartialDate { year: 1980, month: Some(5), day: Some(1) })
        );
        assert_eq!(
            PartialDate::parse("1980-05"),
            Some(PartialDate { year: 1980, month: Some(5), day: None })
        );
        assert_eq!(
            PartialDate::parse("1980"),
            Some(PartialDate { year: 1980, month: None, day: None })
        );
        assert_eq!(
            PartialDate::parse("1980-05-01T00:00:00Z"),
            Some(PartialDate { year: 1980, month: Some(5), day: Some(1) })
        );
        assert_eq!(PartialDate::parse("1980-13-01"), None);
        assert_eq!(PartialDate::parse("1981-02-29"), None);
        assert_eq!(PartialDate::parse("80-05-01"), None);
        assert_eq!(PartialDate::parse("unknown"), None);
    }

    #[test]
    fn test_date_score_tiers() {
        assert_eq!(date_score("1980-05-01", "1980-05-01"), 100);
        assert_eq!(date_score("1980-05-01", "1980-05-20"), 80);
        assert_eq!(date_score("1980-05-01", "1980-11-01"), 50);
        assert_eq!(date_score("1980", "1980-05-01"), 50);
        assert_eq!(date_score("1980-05-01", "1981-05-01"), 0);
        assert_eq!(date_score("not a date", "1980-05-01"), 0);
    }

    #[test]
    fn test_date_agreement() {
        let agreement = date_agreement("1980-05-01", "1982-05-03", 3);
        assert_eq!(agreement.year, Some(true));
        assert_eq!(agreement.month, Some(true));
        assert_eq!(agreement.day, Some(false));

        let strict = date_agreement("1980-05-01", "1982-05-03", 1);
        assert_eq!(strict.year, Some(false));

        let wide = date_agreement("1980-05-01", "1990-01-01", 10);
        assert_eq!(wide.year, Some(true));

        let partial = date_agreement("1980", "1980-05-01", 3);
        assert_eq!(partial.month, None);
        assert_eq!(partial.day, None);

        let malformed = date_agreement("??", "1980-05-01", 3);
        assert_eq!(malformed.year, Some(false));
        assert_eq!(malformed.month, None);
    }

    #[test]
    fn test_fuzzy_agreement_uses_jaro_winkler() {
        let normalizer = ScriptNormalizer::new(LanguageConfig::new(Language::English));
        let ctx = ctx(&normalizer);

        let (agrees, score) = Comparator::Fuzzy
            .agreement(FieldValue::Text("John"), FieldValue::Text("Jon"), &ctx, 0.7)
            .unwrap();
        assert!(agrees);
        assert_eq!(score, 93);

        let (agrees, _) = Comparator::Exact
            .agreement(FieldValue::Text("M"), FieldValue::Text("F"), &ctx, 0.7)
            .unwrap();
        assert!(!agrees);
    }

    #[test]
    fn test_registry_order_and_fallback() {
        let registry = FieldRegistry::standard().register("kebele", "Kebele", Comparator::Exact);

        let mut weights = BTreeMap::new();
        weights.insert("zone".to_string(), 1.0);
        weights.insert(GENDER.to_string(), 1.0);
        weights.insert(FIRST_NAME.to_string(), 1.0);
        weights.insert("kebele".to_string(), 1.0);

        let order: Vec<&str> = registry.visit_order(&weights).into_iter().map(|(n, _)| n).collect();
        assert_eq!(order, vec![FIRST_NAME, GENDER, "kebele", "zone"]);

        assert_eq!(registry.describe("kebele"), ("Kebele", Comparator::Exact));
        assert_eq!(registry.describe("zone"), ("zone", Comparator::Fuzzy));
    }

    #[test]
    fn test_register_replaces_existing_rule() {
        let registry = FieldRegistry::standard().register(GENDER, "Sex", Comparator::Fuzzy);
        let standard = FieldRegistry::standard();

        assert_eq!(registry.len(), standard.len());
        assert_eq!(registry.describe(GENDER), ("Sex", Comparator::Fuzzy));
    }
}
