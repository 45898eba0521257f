//! Lexicographically sortable number encoding
//!
//! Turns a decimal literal into a string whose byte-wise order matches the
//! numeric order of the values, after the ELEN length-prefix scheme:
//!
//! | Value | Encoding |
//! |-------|----------|
//! | `0` | `=0` |
//! | `7` | `=7` |
//! | `10` | `=:210` |
//! | `1234567890` | `=::2101234567890` |
//! | `1.5` | `=1.5` |
//! | `-7` | `<2~` |
//! | `-10` | `<+789~` |
//! | `-1.5` | `<8.4~` |
//!
//! The first character is the sign marker: `<` for negative values and `=`
//! for the rest, so every negative value sorts before every non-negative one.
//! Integer digits are prefixed with their length, repeatedly, until the
//! outermost length is a single digit. Each prefix level adds one `:` marker
//! in front, so numbers with more digits sort after numbers with fewer. A
//! fraction is appended after `.`.
//!
//! Negative numbers complement every digit (`d -> 9 - d`), use `+` as level
//! marker (it sorts below the digits) and end with `~` so that a longer
//! fraction (a larger magnitude) sorts first.
//!
//! Literals are normalized before encoding: exponents are applied, leading
//! integer zeros and trailing fraction zeros are removed, `-0` is `0`.
//!
//! Exponents are expanded into digits, so their magnitude is capped at
//! [`MAX_EXPONENT`]. Literals such as `1e5000` or `1e-5000` are valid JSON
//! but are rejected with [`Error::InvalidInput`].

use crate::error::{Error, Result};

/// Sign marker of negative numbers
pub const NEGATIVE_SIGN: char = '<';

/// Sign marker of zero and positive numbers
pub const POSITIVE_SIGN: char = '=';

/// Level marker for non-negative numbers (sorts above the digits)
pub const POSITIVE_LEVEL: char = ':';

/// Level marker for negative numbers (sorts below the digits)
pub const NEGATIVE_LEVEL: char = '+';

/// Terminator appended to negative encodings
pub const NEGATIVE_TERMINATOR: char = '~';

/// Separator between integer and fraction digits
pub const FRACTION_SEPARATOR: char = '.';

/// Largest accepted decimal exponent magnitude
pub const MAX_EXPONENT: i64 = 4096;

/// A normalized decimal: sign, integer digits and fraction digits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decimal {
    /// True for values below zero
    pub negative: bool,
    /// Integer digits without leading zeros (`"0"` for zero)
    pub integer: String,
    /// Fraction digits without trailing zeros (may be empty)
    pub fraction: String,
}

impl Decimal {
    /// Parse and normalize a JSON-style number literal
    pub fn parse(literal: &str) -> Result<Self> {
        let invalid = || Error::invalid_input(format!("'{}' is not a number", literal));
        let bytes = literal.as_bytes();
        let mut pos = 0;

        let negative = bytes.first() == Some(&b'-');
        if negative {
            pos += 1;
        }

        let int_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        let int_digits = &literal[int_start..pos];
        if int_digits.is_empty() {
            return Err(invalid());
        }

        let mut frac_digits = "";
        if pos < bytes.len() && bytes[pos] == b'.' {
            pos += 1;
            let frac_start = pos;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
            frac_digits = &literal[frac_start..pos];
            if frac_digits.is_empty() {
                return Err(invalid());
            }
        }

        let mut exponent: i64 = 0;
        if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
            pos += 1;
            let mut exp_negative = false;
            if pos < bytes.len() && (bytes[pos] == b'+' || bytes[pos] == b'-') {
                exp_negative = bytes[pos] == b'-';
                pos += 1;
            }
            let exp_start = pos;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                let digit = i64::from(bytes[pos] - b'0');
                exponent = exponent * 10 + digit;
                if exponent > MAX_EXPONENT {
                    return Err(Error::invalid_input(format!(
                        "exponent of '{}' exceeds {}",
                        literal, MAX_EXPONENT
                    )));
                }
                pos += 1;
            }
            if pos == exp_start {
                return Err(invalid());
            }
            if exp_negative {
                exponent = -exponent;
            }
        }

        if pos != bytes.len() {
            return Err(invalid());
        }

        // Shift the decimal point by the exponent over the combined digits.
        let mut digits = String::with_capacity(int_digits.len() + frac_digits.len());
        digits.push_str(int_digits);
        digits.push_str(frac_digits);
        let point = int_digits.len() as i64 + exponent;

        let (integer, fraction) = if point <= 0 {
            let mut frac = "0".repeat((-point) as usize);
            frac.push_str(&digits);
            ("0".to_string(), frac)
        } else if point as usize >= digits.len() {
            let mut int = digits.clone();
            int.push_str(&"0".repeat(point as usize - digits.len()));
            (int, String::new())
        } else {
            let (i, f) = digits.split_at(point as usize);
            (i.to_string(), f.to_string())
        };

        let integer = match integer.trim_start_matches('0') {
            "" => "0".to_string(),
            trimmed => trimmed.to_string(),
        };
        let fraction = fraction.trim_end_matches('0').to_string();
        let negative = negative && !(integer == "0" && fraction.is_empty());

        Ok(Decimal {
            negative,
            integer,
            fraction,
        })
    }

    /// Canonical decimal text (`-12.5`, `0`, `100`)
    pub fn to_literal(&self) -> String {
        let mut out = String::with_capacity(self.integer.len() + self.fraction.len() + 2);
        if self.negative {
            out.push('-');
        }
        out.push_str(&self.integer);
        if !self.fraction.is_empty() {
            out.push(FRACTION_SEPARATOR);
            out.push_str(&self.fraction);
        }
        out
    }
}

/// Encode a non-negative digit string (no leading zeros) with length prefixes
fn encode_natural(digits: &str) -> String {
    let mut prefixes: Vec<String> = Vec::new();
    let mut len = digits.len();
    while len > 1 {
        let prefix = len.to_string();
        len = prefix.len();
        prefixes.push(prefix);
    }

    let mut out = String::with_capacity(digits.len() + prefixes.len() * 2);
    for _ in &prefixes {
        out.push(POSITIVE_LEVEL);
    }
    for prefix in prefixes.iter().rev() {
        out.push_str(prefix);
    }
    out.push_str(digits);
    out
}

/// Read an encoded natural number; returns (digits, rest)
fn decode_natural(encoded: &str) -> Result<(&str, &str)> {
    let corrupt = || Error::corruption(format!("invalid sortable number '{}'", encoded));
    let levels = encoded.chars().take_while(|c| *c == POSITIVE_LEVEL).count();
    let mut pos = levels;
    let mut len = 1usize;
    for _ in 0..levels {
        let end = pos.checked_add(len).ok_or_else(corrupt)?;
        let prefix = encoded.get(pos..end).ok_or_else(corrupt)?;
        if !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(corrupt());
        }
        len = prefix.parse().map_err(|_| corrupt())?;
        pos = end;
    }
    let end = pos.checked_add(len).ok_or_else(corrupt)?;
    let digits = encoded.get(pos..end).ok_or_else(corrupt)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(corrupt());
    }
    Ok((digits, &encoded[end..]))
}

fn complement(encoded: &str) -> String {
    encoded
        .chars()
        .map(|c| match c {
            '0'..='9' => (b'9' - (c as u8 - b'0')) as char,
            POSITIVE_LEVEL => NEGATIVE_LEVEL,
            NEGATIVE_LEVEL => POSITIVE_LEVEL,
            other => other,
        })
        .collect()
}

/// Encode a decimal literal into its sortable form
///
/// ```
/// use jsondb_core::encoding::encode;
///
/// assert!(encode("9").unwrap() < encode("10").unwrap());
/// assert!(encode("-10").unwrap() < encode("-9").unwrap());
/// assert!(encode("1.5").unwrap() < encode("2").unwrap());
/// ```
pub fn encode(literal: &str) -> Result<String> {
    Ok(encode_decimal(&Decimal::parse(literal)?))
}

/// Encode an already normalized decimal
pub fn encode_decimal(decimal: &Decimal) -> String {
    let mut body = encode_natural(&decimal.integer);
    if !decimal.fraction.is_empty() {
        body.push(FRACTION_SEPARATOR);
        body.push_str(&decimal.fraction);
    }
    let mut out = String::with_capacity(body.len() + 2);
    if decimal.negative {
        out.push(NEGATIVE_SIGN);
        out.push_str(&complement(&body));
        out.push(NEGATIVE_TERMINATOR);
    } else {
        out.push(POSITIVE_SIGN);
        out.push_str(&body);
    }
    out
}

/// Whether an encoded number is negative
pub fn is_negative(encoded: &str) -> bool {
    encoded.starts_with(NEGATIVE_SIGN)
}

/// Decode a sortable encoding back into canonical decimal text
pub fn decode(encoded: &str) -> Result<String> {
    let corrupt = || Error::corruption(format!("invalid sortable number '{}'", encoded));
    let (negative, body) = if let Some(rest) = encoded.strip_prefix(NEGATIVE_SIGN) {
        let inner = rest.strip_suffix(NEGATIVE_TERMINATOR).ok_or_else(corrupt)?;
        (true, complement(inner))
    } else if let Some(rest) = encoded.strip_prefix(POSITIVE_SIGN) {
        (false, rest.to_string())
    } else {
        return Err(corrupt());
    };

    let (integer, rest) = decode_natural(&body)?;
    let fraction = if rest.is_empty() {
        ""
    } else {
        match rest.strip_prefix(FRACTION_SEPARATOR) {
            Some(f) if !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()) => f,
            _ => return Err(corrupt()),
        }
    };

    Ok(Decimal {
        negative,
        integer: integer.to_string(),
        fraction: fraction.to_string(),
    }
    .to_literal())
}

/// Encode an array index
///
/// Indexes are never negative, so the sign marker is left out.
pub fn encode_index(index: u64) -> String {
    encode_natural(&index.to_string())
}

/// Decode an array index
pub fn decode_index(encoded: &str) -> Result<u64> {
    let (digits, rest) = decode_natural(encoded)?;
    if !rest.is_empty() {
        return Err(Error::corruption(format!(
            "invalid array index encoding '{}'",
            encoded
        )));
    }
    digits
        .parse()
        .map_err(|_| Error::corruption(format!("array index '{}' out of range", digits)))
}
