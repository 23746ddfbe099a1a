//! Integer literal parsing shared by the parsers and the table loader
//!
//! Literals follow the usual prefix rules: `0x` hex, `0o` octal, `0b`
//! binary, otherwise decimal. A decimal literal may not carry leading zeros
//! (`010` is rejected, `0` and `00` are fine). Surrounding whitespace is
//! ignored.

fn split_literal(s: &str) -> Option<(bool, u32, &str)> {
    let s = s.trim();
    let (negative, body) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let prefix = body.get(..2).map(|p| p.to_ascii_lowercase());
    let (radix, digits) = match prefix.as_deref() {
        Some("0x") => (16, &body[2..]),
        Some("0o") => (8, &body[2..]),
        Some("0b") => (2, &body[2..]),
        _ => (10, body),
    };

    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return None;
    }
    if radix == 10 && digits.len() > 1 && digits.starts_with('0') && digits.bytes().any(|b| b != b'0')
    {
        return None;
    }
    Some((negative, radix, digits))
}

/// Parse an unsigned integer literal
pub fn parse_u64(s: &str) -> Option<u64> {
    let (negative, radix, digits) = split_literal(s)?;
    let value = u64::from_str_radix(digits, radix).ok()?;
    if negative && value != 0 {
        return None;
    }
    Some(value)
}

/// Parse a signed integer literal
pub fn parse_i64(s: &str) -> Option<i64> {
    let (negative, radix, digits) = split_literal(s)?;
    let magnitude = u64::from_str_radix(digits, radix).ok()?;
    if negative {
        0i64.checked_sub_unsigned(magnitude)
    } else {
        i64::try_from(magnitude).ok()
    }
}
