//! Small string and date helpers shared by the adapters and the renderer.

use chrono::NaiveDate;

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and a byte count
/// appended. Cuts fall on character boundaries, so Korean text is safe.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// The first 10 characters of a provider timestamp, or all of it if shorter.
pub fn date_prefix(timestamp: &str) -> &str {
    match timestamp.char_indices().nth(10) {
        Some((cut, _)) => &timestamp[..cut],
        None => timestamp,
    }
}

/// Report file name for `date`: `{prefix}MM_DD_YYYY.html`.
pub fn report_filename(prefix: &str, date: NaiveDate) -> String {
    format!("{}{}.html", prefix, date.format("%m_%d_%Y"))
}

/// Human-readable name of a search language code, used in the scoring prompt.
pub fn language_name(code: &str) -> &str {
    match code {
        "ko" => "Korean",
        "en" => "English",
        "ja" => "Japanese",
        "zh" => "Chinese",
        "de" => "German",
        "fr" => "French",
        "es" => "Spanish",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        let s = "에쓰오일 실적 발표";
        assert_eq!(truncate_for_log(s, 4), "에쓰오일…(+14 bytes)");
    }

    #[test]
    fn test_date_prefix() {
        assert_eq!(date_prefix("2023-03-02 07:41:00"), "2023-03-02");
        assert_eq!(date_prefix("2023-03"), "2023-03");
        assert_eq!(date_prefix(""), "");
    }

    #[test]
    fn test_report_filename() {
        let date = NaiveDate::from_ymd_opt(2023, 3, 2).unwrap();
        assert_eq!(report_filename("S_OIL_PSR_", date), "S_OIL_PSR_03_02_2023.html");
    }

    #[test]
    fn test_language_name() {
        assert_eq!(language_name("ko"), "Korean");
        assert_eq!(language_name("pt"), "pt");
    }
}
