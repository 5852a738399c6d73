use unicode_normalization::UnicodeNormalization;

fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&c)
}

fn is_dash_variant(c: char) -> bool {
    matches!(c, '\u{2013}' | '\u{2014}' | '\u{2015}')
}

/// Decomposes `input` and drops the combining diacritics, so `"João"` becomes `"Joao"`.
pub fn strip_accents(input: &str) -> String {
    input.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical form used for case and accent insensitive equality of role and city names.
pub fn normalize_text(input: &str) -> String {
    let cleaned: String = strip_accents(input)
        .chars()
        .map(|c| if is_dash_variant(c) { '-' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();
    collapse_whitespace(&cleaned).to_lowercase()
}

/// Keeps ASCII digits only. Used for CPF and phone comparison.
pub fn normalize_digits(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Digit-only form, or `None` when nothing is left.
pub fn digits_or_none(input: Option<&str>) -> Option<String> {
    input
        .map(normalize_digits)
        .filter(|digits| !digits.is_empty())
}

fn strip_parenthetical(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut depth = 0usize;
    for c in input.chars() {
        match c {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Like [`normalize_text`] but also drops parenthetical content such as `"(apelido)"`.
pub fn normalize_name_for_comparison(input: &str) -> String {
    normalize_text(&strip_parenthetical(input))
}

/// Formats a phone number as `+<country><digits>` for the messaging provider.
///
/// National trunk zeros are dropped; numbers that already carry the country code
/// (longer than a national number) are kept as they are.
pub fn normalize_phone_e164(input: &str, default_country_code: &str) -> Option<String> {
    let trimmed = input.trim();
    let digits = normalize_digits(trimmed);
    if digits.is_empty() {
        return None;
    }
    if trimmed.starts_with('+') {
        return Some(format!("+{}", digits));
    }
    let national = digits.trim_start_matches('0');
    if national.is_empty() {
        return None;
    }
    if national.len() > 11 && national.starts_with(default_country_code) {
        return Some(format!("+{}", national));
    }
    Some(format!("+{}{}", default_country_code, national))
}
