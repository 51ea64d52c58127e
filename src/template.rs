//! Object key templating
//!
//! Handles the `{stream}`, `{timestamp}` and `{date}` tokens of the naming
//! convention. Tokens are substituted literally; anything else in braces is
//! left untouched.

use crate::types::ObjectFormat;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Token replaced with the stream name
pub const STREAM_TOKEN: &str = "{stream}";

/// Token replaced with the batch timestamp
pub const TIMESTAMP_TOKEN: &str = "{timestamp}";

/// Token replaced with the batch date
pub const DATE_TOKEN: &str = "{date}";

/// Timestamp shared by every file of one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchStamp {
    /// `%Y%m%dT%H%M%S`
    pub timestamp: String,
    /// `%Y-%m-%d`
    pub date: String,
}

impl BatchStamp {
    /// Stamp for the current instant
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Stamp for a given instant
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self {
            timestamp: at.format("%Y%m%dT%H%M%S").to_string(),
            date: at.format("%Y-%m-%d").to_string(),
        }
    }

    /// Same instant, `n`-th repeat: `%Y%m%dT%H%M%S-{n}`
    #[must_use]
    pub fn with_sequence(&self, n: u32) -> Self {
        Self {
            timestamp: format!("{}-{n}", self.timestamp),
            date: self.date.clone(),
        }
    }
}

/// Issues batch stamps that never repeat back to back
///
/// Stamps have second resolution, so a stream flushing twice within one
/// second would reuse its buffer path and destination key. A repeated
/// timestamp gets a `-1`, `-2`, ... suffix instead. Clones share the
/// sequence.
#[derive(Debug, Clone, Default)]
pub struct StampSequence {
    last: Arc<Mutex<Option<(String, u32)>>>,
}

impl StampSequence {
    /// Create an empty sequence
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp to use for a batch that was stamped `stamp`
    pub fn next(&self, stamp: &BatchStamp) -> BatchStamp {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((timestamp, repeats)) = last.as_mut() {
            if *timestamp == stamp.timestamp {
                *repeats += 1;
                return stamp.with_sequence(*repeats);
            }
        }
        *last = Some((stamp.timestamp.clone(), 0));
        stamp.clone()
    }
}

/// Default naming convention for a format: `{stream}/{timestamp}.{ext}`
pub fn default_naming_convention(format: ObjectFormat) -> String {
    format!("{STREAM_TOKEN}/{TIMESTAMP_TOKEN}.{}", format.extension())
}

/// Substitute the known tokens in a naming convention
pub fn render(convention: &str, stream: &str, stamp: &BatchStamp) -> String {
    [
        (STREAM_TOKEN, stream),
        (TIMESTAMP_TOKEN, stamp.timestamp.as_str()),
        (DATE_TOKEN, stamp.date.as_str()),
    ]
    .iter()
    .fold(convention.to_string(), |key, (token, value)| {
        if key.contains(token) {
            key.replace(token, value)
        } else {
            key
        }
    })
}

/// Build the destination key of a batch object
///
/// The result is `{prefix}{rendered convention}`; with the default
/// convention that is `{prefix}{stream}/{timestamp}.{ext}`.
pub fn target_key(
    stream: &str,
    format: ObjectFormat,
    prefix: &str,
    stamp: &BatchStamp,
    naming_convention: Option<&str>,
) -> String {
    let key = match naming_convention {
        Some(convention) => render(convention, stream, stamp),
        None => render(&default_naming_convention(format), stream, stamp),
    };
    format!("{prefix}{key}")
}

/// Local buffer file of a batch: `{dir}/{stream}-{timestamp}.{ext}`
pub fn buffer_path(dir: &Path, stream: &str, stamp: &BatchStamp, format: ObjectFormat) -> PathBuf {
    dir.join(format!(
        "{stream}-{}.{}",
        stamp.timestamp,
        format.extension()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stamp() -> BatchStamp {
        BatchStamp::from_datetime(Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap())
    }

    #[test]
    fn test_stamp_format() {
        let stamp = stamp();
        assert_eq!(stamp.timestamp, "20240309T070501");
        assert_eq!(stamp.date, "2024-03-09");
    }

    #[test]
    fn test_repeated_stamp_gets_sequence_suffix() {
        let stamps = StampSequence::new();
        let later = BatchStamp::from_datetime(Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap());

        let issued: Vec<String> = [stamp(), stamp(), stamp(), later, stamp()]
            .iter()
            .map(|s| stamps.next(s).timestamp)
            .collect();

        assert_eq!(
            issued,
            vec![
                "20240309T070501",
                "20240309T070501-1",
                "20240309T070501-2",
                "20240309T070502",
                "20240309T070501",
            ]
        );
    }

    #[test]
    fn test_cloned_sequence_is_shared() {
        let stamps = StampSequence::new();
        stamps.next(&stamp());
        assert_eq!(stamps.clone().next(&stamp()).timestamp, "20240309T070501-1");
        assert_eq!(stamps.next(&stamp()).date, "2024-03-09");
    }

    #[test]
    fn test_naming_convention_replaces_tokens() {
        let key = render("test_{stream}_{timestamp}_test.csv", "the_stream", &stamp());
        assert_eq!(key, "test_the_stream_20240309T070501_test.csv");
    }

    #[test]
    fn test_naming_convention_date_token() {
        let key = render("{date}/{stream}.jsonl", "users", &stamp());
        assert_eq!(key, "2024-03-09/users.jsonl");
    }

    #[test]
    fn test_unknown_tokens_left_as_is() {
        let key = render("{stream}/{hour}/{timestamp}", "users", &stamp());
        assert_eq!(key, "users/{hour}/20240309T070501");
    }

    #[test]
    fn test_naming_convention_has_reasonable_default() {
        let key = target_key("the_stream", ObjectFormat::Csv, "", &stamp(), None);
        assert!(key.starts_with("the_stream"));
        assert!(key.ends_with(".csv"));
    }

    #[test]
    fn test_target_key_honors_prefix() {
        let key = target_key(
            "orders",
            ObjectFormat::Jsonl,
            "singer/analytics/",
            &stamp(),
            None,
        );
        assert_eq!(key, "singer/analytics/orders/20240309T070501.jsonl");
    }

    #[test]
    fn test_buffer_path() {
        let path = buffer_path(Path::new("/tmp/buf"), "orders", &stamp(), ObjectFormat::Csv);
        assert_eq!(path, PathBuf::from("/tmp/buf/orders-20240309T070501.csv"));
    }
}
