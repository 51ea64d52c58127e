//! Segment abbreviation for over-long flattened keys

use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Start of string or underscore, followed by the character to upper-case
static CAMELIZE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:^|_)(.)").unwrap());

/// Lowercase ASCII letters
static LOWERCASE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z]").unwrap());

/// Upper camel case: `billing_address` becomes `BillingAddress`
pub fn camelize(word: &str) -> String {
    CAMELIZE_REGEX
        .replace_all(word, |caps: &Captures| caps[1].to_uppercase())
        .into_owned()
}

/// Abbreviate one key segment
///
/// Keeps the initials of the camel-cased segment (`billing_address` becomes
/// `ba`). Segments that collapse to fewer than two characters fall back to
/// their first three characters. The result is always lower case.
pub fn abbreviate(segment: &str) -> String {
    let camelized = camelize(segment);
    let reduced = LOWERCASE_REGEX.replace_all(&camelized, "");
    if reduced.chars().count() > 1 {
        reduced.to_lowercase()
    } else {
        segment.chars().take(3).collect::<String>().to_lowercase()
    }
}
