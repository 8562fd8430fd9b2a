//! Numeric normalisation for cells of ad-platform exports.
//!
//! Exports mix EU (`1.234,56`) and US (`1,234`) conventions and sometimes carry
//! currency symbols. Every function here is total: anything that does not
//! look like a number becomes `0.0` so one bad cell never aborts an analysis.
//!
//! The separator rules are a heuristic. A lone comma followed by exactly two
//! digits is read as a decimal separator, any other lone comma as a thousands
//! separator. When both `.` and `,` appear the EU convention wins, so a US
//! value such as `1,234.56` is misread; the exports carry no locale hint.

use serde_json::Value;

const CURRENCY_SYMBOLS: [char; 2] = ['€', '$'];

/// Normalise an optional raw cell. Missing cells count as zero.
pub fn normalize_field(raw: Option<&str>) -> f64 {
    raw.map_or(0.0, normalize_text)
}

/// Normalise a JSON cell: numbers pass through, strings go through
/// [`normalize_text`], everything else is zero.
pub fn normalize_value(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Value::String(s) => normalize_text(s),
        _ => 0.0,
    }
}

pub fn normalize_text(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "-" {
        return 0.0;
    }

    let cleaned: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && !CURRENCY_SYMBOLS.contains(c))
        .collect();

    parse_leading_float(&resolve_separators(&cleaned)).unwrap_or(0.0)
}

fn resolve_separators(text: &str) -> String {
    let has_dot = text.contains('.');
    let has_comma = text.contains(',');

    if has_dot && has_comma {
        // 歐式格式：點為千分位，逗號為小數點
        return text.replace('.', "").replace(',', ".");
    }

    if has_comma {
        if let Some((head, tail)) = text.rsplit_once(',') {
            if tail.len() == 2 && tail.bytes().all(|b| b.is_ascii_digit()) {
                return format!("{}.{}", head.replace(',', ""), tail);
            }
        }
        return text.replace(',', "");
    }

    text.to_string()
}

/// Parses the longest numeric prefix, so trailing units such as `12.5EUR`
/// still yield `12.5`.
fn parse_leading_float(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }

    if digits == 0 {
        return None;
    }

    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    text[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}
