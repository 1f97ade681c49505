//! Day-granularity frequency patterns
//!
//! A frequency is a cron-like pattern of up to three whitespace-separated
//! fields: day-of-month, month and day-of-week. It is evaluated as if it were
//! the five-field cron expression `"* * <pattern>"`, so the minute and hour
//! dimensions always match and the pattern reduces to a pure test against a
//! calendar date. Matching takes an explicit date so callers inject "today"
//! and tests stay deterministic.
//!
//! Supported field syntax: `*`, `*/step`, explicit values, `lo-hi` ranges
//! (optionally with `/step`), and comma-separated lists of any of these.
//! Day-of-week runs 0-7 where both 0 and 7 mean Sunday. As in cron, when both
//! day-of-month and day-of-week are restricted, a date matches if either
//! field matches.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};

/// A single component of a frequency field
#[derive(Debug, Clone, PartialEq, Eq)]
enum Atom {
    /// `*`
    Any,
    /// `*/step`
    Step(u32),
    /// An explicit value
    Value(u32),
    /// `lo-hi`, inclusive
    Range(u32, u32),
    /// `lo-hi/step`
    RangeStep(u32, u32, u32),
}

impl Atom {
    fn matches(&self, value: u32, field_lo: u32) -> bool {
        match *self {
            Atom::Any => true,
            Atom::Step(step) => (value - field_lo) % step == 0,
            Atom::Value(v) => value == v,
            Atom::Range(lo, hi) => (lo..=hi).contains(&value),
            Atom::RangeStep(lo, hi, step) => (lo..=hi).contains(&value) && (value - lo) % step == 0,
        }
    }
}

/// One parsed frequency field with its permitted value bounds
#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    atoms: Vec<Atom>,
    lo: u32,
    hi: u32,
}

impl Field {
    fn parse(text: &str, lo: u32, hi: u32, name: &str) -> VaultResult<Self> {
        let mut atoms = Vec::new();
        for part in text.split(',') {
            atoms.push(parse_atom(part, lo, hi, name)?);
        }
        Ok(Self { atoms, lo, hi })
    }

    /// True when the field places no restriction at all
    fn is_wildcard(&self) -> bool {
        self.atoms.iter().all(|a| matches!(a, Atom::Any))
    }

    fn matches(&self, value: u32) -> bool {
        self.atoms.iter().any(|a| a.matches(value, self.lo))
    }
}

fn parse_atom(part: &str, lo: u32, hi: u32, name: &str) -> VaultResult<Atom> {
    let invalid = |detail: String| VaultError::Config(format!("invalid {} field [{}]: {}", name, part, detail));

    if part == "*" {
        return Ok(Atom::Any);
    }

    if let Some(step_text) = part.strip_prefix("*/") {
        let step = parse_bounded(step_text, 1, hi, name, part)?;
        return Ok(Atom::Step(step));
    }

    let (range_text, step) = match part.split_once('/') {
        Some((range, step_text)) => (range, Some(parse_bounded(step_text, 1, hi, name, part)?)),
        None => (part, None),
    };

    if let Some((lo_text, hi_text)) = range_text.split_once('-') {
        let range_lo = parse_bounded(lo_text, lo, hi, name, part)?;
        let range_hi = parse_bounded(hi_text, lo, hi, name, part)?;
        if range_lo > range_hi {
            return Err(invalid(format!("range start {} exceeds range end {}", range_lo, range_hi)));
        }
        return Ok(match step {
            Some(step) => Atom::RangeStep(range_lo, range_hi, step),
            None => Atom::Range(range_lo, range_hi),
        });
    }

    if step.is_some() {
        return Err(invalid("a step requires a range or `*`".to_string()));
    }

    Ok(Atom::Value(parse_bounded(range_text, lo, hi, name, part)?))
}

fn parse_bounded(text: &str, lo: u32, hi: u32, name: &str, part: &str) -> VaultResult<u32> {
    let value: u32 = text.parse().map_err(|_| {
        VaultError::Config(format!("invalid {} field [{}]: [{}] is not a number", name, part, text))
    })?;
    if value < lo || value > hi {
        return Err(VaultError::Config(format!(
            "invalid {} field [{}]: {} is outside {}-{}",
            name, part, value, lo, hi
        )));
    }
    Ok(value)
}

/// A parsed day-granularity frequency pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Frequency {
    pattern: String,
    day_of_month: Field,
    month: Field,
    day_of_week: Field,
}

impl Frequency {
    /// Parse a frequency pattern of up to three fields.
    ///
    /// Missing trailing fields and a fully empty pattern default to `*`.
    pub fn parse(pattern: &str) -> VaultResult<Self> {
        let fields: Vec<&str> = pattern.split_whitespace().collect();
        if fields.len() > 3 {
            return Err(VaultError::Config(format!(
                "frequency [{}] has {} fields, expected at most 3 (day-of-month, month, day-of-week)",
                pattern,
                fields.len()
            )));
        }

        let day_of_month = Field::parse(fields.first().copied().unwrap_or("*"), 1, 31, "day-of-month")?;
        let month = Field::parse(fields.get(1).copied().unwrap_or("*"), 1, 12, "month")?;
        let day_of_week = Field::parse(fields.get(2).copied().unwrap_or("*"), 0, 7, "day-of-week")?;

        let pattern = if fields.is_empty() {
            "* * *".to_string()
        } else {
            fields.join(" ")
        };

        Ok(Self {
            pattern,
            day_of_month,
            month,
            day_of_week,
        })
    }

    /// Check whether this pattern matches the given date.
    pub fn matches(&self, date: NaiveDate) -> bool {
        if !self.month.matches(date.month()) {
            return false;
        }

        let dom_matched = self.day_of_month.matches(date.day());
        // 0 and 7 both mean Sunday.
        let weekday = date.weekday().num_days_from_sunday();
        let dow_matched =
            self.day_of_week.matches(weekday) || (weekday == 0 && self.day_of_week.matches(7));

        if !self.day_of_month.is_wildcard() && !self.day_of_week.is_wildcard() {
            dom_matched || dow_matched
        } else {
            dom_matched && dow_matched
        }
    }

    /// The normalized pattern text
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl Default for Frequency {
    fn default() -> Self {
        Self::parse("* * *").expect("wildcard pattern is valid")
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

impl TryFrom<String> for Frequency {
    type Error = VaultError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Frequency> for String {
    fn from(value: Frequency) -> Self {
        value.pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_wildcard_matches_every_day() {
        let freq = Frequency::parse("* * *").unwrap();
        let mut day = date(2021, 1, 1);
        while day <= date(2021, 12, 31) {
            assert!(freq.matches(day), "expected {} to match", day);
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_sundays_only() {
        let freq = Frequency::parse("* * 0").unwrap();
        // 2020-12-27 was a Sunday.
        assert!(freq.matches(date(2020, 12, 27)));
        assert!(!freq.matches(date(2020, 12, 26)));
        assert!(!freq.matches(date(2020, 12, 28)));
        assert!(freq.matches(date(2021, 1, 3)));
    }

    #[test]
    fn test_seven_also_means_sunday() {
        let freq = Frequency::parse("* * 7").unwrap();
        assert!(freq.matches(date(2020, 12, 27)));
        assert!(!freq.matches(date(2020, 12, 28)));
    }

    #[test]
    fn test_first_of_every_third_month() {
        let freq = Frequency::parse("1 */3 *").unwrap();
        assert!(freq.matches(date(2021, 1, 1)));
        assert!(freq.matches(date(2021, 4, 1)));
        assert!(freq.matches(date(2021, 7, 1)));
        assert!(freq.matches(date(2021, 10, 1)));
        assert!(!freq.matches(date(2021, 2, 1)));
        assert!(!freq.matches(date(2021, 12, 1)));
        assert!(!freq.matches(date(2021, 1, 2)));
    }

    #[test]
    fn test_first_of_month() {
        let freq = Frequency::parse("1 * *").unwrap();
        assert!(freq.matches(date(2021, 3, 1)));
        assert!(!freq.matches(date(2021, 3, 2)));
    }

    #[test]
    fn test_ranges_and_lists() {
        let freq = Frequency::parse("1-5 * *").unwrap();
        assert!(freq.matches(date(2021, 6, 3)));
        assert!(!freq.matches(date(2021, 6, 6)));

        let freq = Frequency::parse("1,15 * *").unwrap();
        assert!(freq.matches(date(2021, 6, 1)));
        assert!(freq.matches(date(2021, 6, 15)));
        assert!(!freq.matches(date(2021, 6, 2)));

        let freq = Frequency::parse("1-10/3 * *").unwrap();
        assert!(freq.matches(date(2021, 6, 1)));
        assert!(freq.matches(date(2021, 6, 4)));
        assert!(!freq.matches(date(2021, 6, 2)));
        assert!(!freq.matches(date(2021, 6, 13)));
    }

    #[test]
    fn test_restricted_dom_and_dow_match_as_union() {
        // Standard cron: with both fields restricted, either may match.
        let freq = Frequency::parse("1 * 0").unwrap();
        // 2020-12-27: Sunday, not the 1st.
        assert!(freq.matches(date(2020, 12, 27)));
        // 2020-12-01: Tuesday the 1st.
        assert!(freq.matches(date(2020, 12, 1)));
        // 2020-12-02: Wednesday the 2nd.
        assert!(!freq.matches(date(2020, 12, 2)));
    }

    #[test]
    fn test_partial_and_empty_patterns_default_to_wildcards() {
        assert_eq!(Frequency::parse("").unwrap(), Frequency::default());
        assert_eq!(Frequency::parse("  ").unwrap(), Frequency::default());

        let freq = Frequency::parse("1").unwrap();
        assert!(freq.matches(date(2021, 2, 1)));
        assert!(!freq.matches(date(2021, 2, 2)));
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        assert!(Frequency::parse("* * * *").is_err());
        assert!(Frequency::parse("32 * *").is_err());
        assert!(Frequency::parse("* 13 *").is_err());
        assert!(Frequency::parse("* * 8").is_err());
        assert!(Frequency::parse("x * *").is_err());
        assert!(Frequency::parse("5-2 * *").is_err());
        assert!(Frequency::parse("*/0 * *").is_err());
        assert!(Frequency::parse("3/2 * *").is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let freq: Frequency = serde_yaml::from_str("\"* * 0\"").unwrap();
        assert_eq!(freq.pattern(), "* * 0");
        let text = serde_yaml::to_string(&freq).unwrap();
        assert!(text.contains("* * 0"));

        let result: Result<Frequency, _> = serde_yaml::from_str("\"bogus * *\"");
        assert!(result.is_err());
    }
}
