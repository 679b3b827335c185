// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/// Parses the numeric prefix of an SVG length.
///
/// Accepts an optional sign, decimal digits and an optional fractional part.
/// Anything after the numeric prefix (a unit suffix, garbage) is ignored,
/// so `"12px"` parses as `12`. A value without a numeric prefix yields
/// `None` and callers supply their own default.
pub fn parse_length(value: &str) -> Option<f64> {
    let s = value.trim_start();
    let bytes = s.as_bytes();
    let mut pos = 0;

    if pos < bytes.len() && (bytes[pos] == b'-' || bytes[pos] == b'+') {
        pos += 1;
    }

    let int_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos == int_start {
        return None;
    }

    if pos < bytes.len() && bytes[pos] == b'.' {
        let frac_start = pos + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start {
            pos = frac_end;
        }
    }

    s[..pos].parse().ok()
}

/// Formats a coordinate for output.
///
/// Values that are integral (within rounding noise) print without a
/// fractional part; everything else prints with at most three decimals,
/// trailing zeros trimmed. Every emitted coordinate goes through this so
/// repeated compiles are byte-identical.
pub fn fmt_num(value: f64) -> String {
    let rounded = value.round();
    let tol = 1e-9 * value.abs().max(rounded.abs()).max(1.0);
    if (value - rounded).abs() <= tol {
        return format!("{}", rounded as i64);
    }

    let s = format!("{:.3}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_numeric_prefix() {
        assert_eq!(parse_length("12"), Some(12.0));
        assert_eq!(parse_length("12.5"), Some(12.5));
        assert_eq!(parse_length("12px"), Some(12.0));
        assert_eq!(parse_length("-4.25em"), Some(-4.25));
        assert_eq!(parse_length("+3"), Some(3.0));
        assert_eq!(parse_length(" 8 "), Some(8.0));
    }

    #[test]
    fn length_garbage_is_none() {
        assert_eq!(parse_length("abc"), None);
        assert_eq!(parse_length(""), None);
        assert_eq!(parse_length("."), None);
        assert_eq!(parse_length("-"), None);
        assert_eq!(parse_length("px12"), None);
    }

    #[test]
    fn number_formatting() {
        assert_eq!(fmt_num(0.0), "0");
        assert_eq!(fmt_num(-0.0), "0");
        assert_eq!(fmt_num(12.0), "12");
        assert_eq!(fmt_num(12.5), "12.5");
        assert_eq!(fmt_num(100.25), "100.25");
        assert_eq!(fmt_num(1.0 / 3.0), "0.333");
        assert_eq!(fmt_num(-2.5), "-2.5");
        assert_eq!(fmt_num(2.0000000001), "2");
    }
}
