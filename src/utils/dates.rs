use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::{Captures, Regex};

use crate::utils::normalize::strip_accents;

const MIN_BIRTH_YEAR: i32 = 1900;

/// Birth-date layouts, tried in this order. The first layout that both matches and
/// validates wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateShape {
    /// `D/M/YYYY` or `D-M-YYYY`, day-first unless the components force a swap.
    SlashOrDash,
    /// `D.M.YYYY`
    Dotted,
    /// `D M YYYY`
    Spaced,
    /// `DDMMYYYY`
    Compact,
    /// `D de <mes> de YYYY` and `D <mes> YYYY`
    MonthName,
    /// `YYYY-MM-DD`
    Iso,
}

static DATE_PATTERNS: LazyLock<Vec<(DateShape, Regex)>> = LazyLock::new(|| {
    [
        (DateShape::SlashOrDash, r"^(\d{1,2})[/-](\d{1,2})[/-](\d{4})$"),
        (DateShape::Dotted, r"^(\d{1,2})\.(\d{1,2})\.(\d{4})$"),
        (DateShape::Spaced, r"^(\d{1,2}) (\d{1,2}) (\d{4})$"),
        (DateShape::Compact, r"^(\d{2})(\d{2})(\d{4})$"),
        (DateShape::MonthName, r"^(\d{1,2}) (?:de )?([a-z]+)\.? (?:de )?(\d{4})$"),
        (DateShape::Iso, r"^(\d{4})-(\d{1,2})-(\d{1,2})$"),
    ]
    .into_iter()
    .map(|(shape, pattern)| (shape, Regex::new(pattern).expect("valid date pattern")))
    .collect()
});

const MONTHS: [(&str, &str); 12] = [
    ("janeiro", "jan"),
    ("fevereiro", "fev"),
    ("marco", "mar"),
    ("abril", "abr"),
    ("maio", "mai"),
    ("junho", "jun"),
    ("julho", "jul"),
    ("agosto", "ago"),
    ("setembro", "set"),
    ("outubro", "out"),
    ("novembro", "nov"),
    ("dezembro", "dez"),
];

/// Month number for a Portuguese month name, full or three-letter, accents optional.
pub fn month_from_name(name: &str) -> Option<u32> {
    let name = strip_accents(name.trim()).to_lowercase();
    MONTHS
        .iter()
        .position(|(full, short)| name == *full || name == *short)
        .map(|idx| idx as u32 + 1)
}

fn number<T: std::str::FromStr>(caps: &Captures<'_>, idx: usize) -> Option<T> {
    caps.get(idx)?.as_str().parse().ok()
}

impl DateShape {
    /// Raw `(year, month, day)` for a structural match; calendar checks happen later.
    fn components(self, caps: &Captures<'_>) -> Option<(i32, u32, u32)> {
        match self {
            DateShape::SlashOrDash => {
                let first: u32 = number(caps, 1)?;
                let second: u32 = number(caps, 2)?;
                let year = number(caps, 3)?;
                // Both components <= 12 is ambiguous; day-first is the house default.
                let (day, month) = if first > 12 {
                    (first, second)
                } else if second > 12 {
                    (second, first)
                } else {
                    (first, second)
                };
                Some((year, month, day))
            }
            DateShape::Dotted | DateShape::Spaced | DateShape::Compact => {
                Some((number(caps, 3)?, number(caps, 2)?, number(caps, 1)?))
            }
            DateShape::MonthName => {
                let month = month_from_name(caps.get(2)?.as_str())?;
                Some((number(caps, 3)?, month, number(caps, 1)?))
            }
            DateShape::Iso => Some((number(caps, 1)?, number(caps, 2)?, number(caps, 3)?)),
        }
    }
}

fn prepare(text: &str) -> String {
    strip_accents(text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn validated(year: i32, month: u32, day: u32, today: NaiveDate) -> Option<NaiveDate> {
    if !(MIN_BIRTH_YEAR..=today.year()).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parses free-text birth dates relative to `today` (which bounds the accepted year range).
pub fn parse_birth_date_at(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let prepared = prepare(text);
    if prepared.is_empty() {
        return None;
    }
    DATE_PATTERNS.iter().find_map(|(shape, regex)| {
        let caps = regex.captures(&prepared)?;
        let (year, month, day) = shape.components(&caps)?;
        validated(year, month, day, today)
    })
}

pub fn parse_birth_date(text: &str) -> Option<NaiveDate> {
    parse_birth_date_at(text, crate::utils::time::today())
}

/// Whole years between `birth` and `today`; `None` for non-positive ages.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> Option<u32> {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    u32::try_from(age).ok().filter(|age| *age > 0)
}

/// Age for an ISO `YYYY-MM-DD` string.
pub fn calculate_age(iso_date: &str, today: NaiveDate) -> Option<u32> {
    let birth = NaiveDate::parse_from_str(iso_date.trim(), "%Y-%m-%d").ok()?;
    age_on(birth, today)
}
