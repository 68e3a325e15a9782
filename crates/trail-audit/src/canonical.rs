//! Canonical JSON (RFC 8785 / JCS) serialization.
//!
//! The single place that turns a `serde_json::Value` into the exact bytes
//! that get hashed and signed.  Signer and verifier must agree byte-for-byte,
//! so every rule below follows the JSON Canonicalization Scheme:
//!
//! 1. Object members are sorted by the UTF-16 code units of their names.
//! 2. No whitespace between tokens.
//! 3. Strings escape only `"`, `\`, and U+0000..U+001F (using the short
//!    forms `\b \f \n \r \t` where they exist, `\u00xx` otherwise).
//! 4. Numbers are written as IEEE-754 doubles using the ECMAScript
//!    `Number.prototype.toString` algorithm.  Integers whose magnitude fits
//!    in 2^53 are written verbatim, which is the same thing.
//!
//! Serialization cannot fail: `serde_json::Value` never holds NaN or
//! infinities.

use std::fmt::Write;

use serde_json::{Number, Value};

/// Largest integer magnitude a double represents exactly.
const MAX_SAFE_INTEGER: u64 = 1 << 53;

/// Produce the canonical JSON text of `value`.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => write_number(out, n),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut members: Vec<(&String, &Value)> = map.iter().collect();
            members.sort_by(|(a, _), (b, _)| a.encode_utf16().cmp(b.encode_utf16()));

            out.push('{');
            for (i, (key, member)) in members.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, member);
            }
            out.push('}');
        }
    }
}

fn write_number(out: &mut String, n: &Number) {
    if let Some(u) = n.as_u64() {
        if u <= MAX_SAFE_INTEGER {
            let _ = write!(out, "{u}");
            return;
        }
    } else if let Some(i) = n.as_i64() {
        if i.unsigned_abs() <= MAX_SAFE_INTEGER {
            let _ = write!(out, "{i}");
            return;
        }
    }
    // Floats, and integers outside the exactly-representable range.
    match n.as_f64() {
        Some(f) => write_double(out, f),
        None => out.push_str(&n.to_string()),
    }
}

/// ECMAScript `Number::toString(10)` for a finite double.
fn write_double(out: &mut String, value: f64) {
    if value == 0.0 {
        // Covers -0 as well.
        out.push('0');
        return;
    }
    if value < 0.0 {
        out.push('-');
    }

    // `{:e}` yields the shortest round-trip digits, e.g. "1.2345e-7".
    let scientific = format!("{:e}", value.abs());
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        out.push_str(&scientific);
        return;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        out.push_str(&scientific);
        return;
    };

    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    // value = 0.d1d2...dk × 10^n
    let n = exponent + 1;

    if k <= n && n <= 21 {
        out.push_str(&digits);
        out.extend(std::iter::repeat('0').take((n - k) as usize));
    } else if 0 < n && n <= 21 {
        let (int_part, frac_part) = digits.split_at(n as usize);
        out.push_str(int_part);
        out.push('.');
        out.push_str(frac_part);
    } else if -6 < n && n <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat('0').take((-n) as usize));
        out.push_str(&digits);
    } else {
        let (first, rest) = digits.split_at(1);
        out.push_str(first);
        if !rest.is_empty() {
            out.push('.');
            out.push_str(rest);
        }
        let e = n - 1;
        let _ = write!(out, "e{}{}", if e >= 0 { '+' } else { '-' }, e.abs());
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c < '\u{0020}' => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn number(text: &str) -> String {
        let value: Value = serde_json::from_str(text).unwrap();
        canonical_json(&value)
    }

    #[test]
    fn sorted_keys_and_compact_output() {
        let v: Value = serde_json::from_str(r#"{ "z": 1, "a": [ 2, 3 ], "m": { "y": null, "b": true } }"#)
            .unwrap();
        assert_eq!(canonical_json(&v), r#"{"a":[2,3],"m":{"b":true,"y":null},"z":1}"#);
    }

    /// RFC 8785 §3.2.3: members are ordered by UTF-16 code units, which puts
    /// the surrogate-pair emoji before U+FB33.
    #[test]
    fn utf16_member_ordering() {
        let v = json!({
            "\u{20ac}": "Euro Sign",
            "\r": "Carriage Return",
            "\u{fb33}": "Hebrew Letter Dalet With Dagesh",
            "1": "One",
            "\u{1f600}": "Emoji: Grinning Face",
            "\u{0080}": "Control",
            "\u{00f6}": "Latin Small Letter O With Diaeresis"
        });
        let text = canonical_json(&v);
        let order = [
            "Carriage Return",
            "One",
            "Control",
            "Latin Small Letter O With Diaeresis",
            "Euro Sign",
            "Emoji: Grinning Face",
            "Hebrew Letter Dalet With Dagesh",
        ];
        let positions: Vec<usize> = order.iter().map(|s| text.find(s).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "got {text}");
    }

    /// Number vectors from RFC 8785 appendix B.
    #[test]
    fn ecmascript_number_formatting() {
        assert_eq!(number("0"), "0");
        assert_eq!(number("-0.0"), "0");
        assert_eq!(number("4.50"), "4.5");
        assert_eq!(number("2e-3"), "0.002");
        assert_eq!(number("0.000001"), "0.000001");
        assert_eq!(number("1e-7"), "1e-7");
        assert_eq!(number("1e21"), "1e+21");
        assert_eq!(number("1E30"), "1e+30");
        assert_eq!(number("1e20"), "100000000000000000000");
        assert_eq!(number("123456789012345680000"), "123456789012345680000");
        assert_eq!(number("333333333.33333329"), "333333333.3333333");
        assert_eq!(number("-1.5"), "-1.5");
        assert_eq!(number("5e-324"), "5e-324");
        assert_eq!(number("1.0"), "1");
    }

    #[test]
    fn integers_beyond_double_precision_use_double_form() {
        assert_eq!(number("9007199254740992"), "9007199254740992");
        assert_eq!(canonical_json(&json!(u64::MAX)), "18446744073709552000");
        assert_eq!(canonical_json(&json!(-42)), "-42");
    }

    #[test]
    fn string_escaping() {
        let v = json!("quote\" slash\\ nl\n tab\t bs\u{0008} ff\u{000C} ctl\u{0001} del\u{007f}");
        assert_eq!(
            canonical_json(&v),
            "\"quote\\\" slash\\\\ nl\\n tab\\t bs\\b ff\\f ctl\\u0001 del\u{007f}\""
        );
    }

    #[test]
    fn unicode_passes_through_unescaped() {
        assert_eq!(canonical_json(&json!({"k": "héllo 🌍"})), "{\"k\":\"héllo 🌍\"}");
    }

    #[test]
    fn whitespace_and_order_invariance() {
        let a: Value = serde_json::from_str(r#"{"x":1,"a":2}"#).unwrap();
        let b: Value = serde_json::from_str("{\n  \"a\" : 2,\n  \"x\" : 1\n}").unwrap();
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn empty_containers() {
        assert_eq!(canonical_json(&json!({})), "{}");
        assert_eq!(canonical_json(&json!([])), "[]");
    }
}
